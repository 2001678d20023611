//! In-process channel that records every publish.
//!
//! Used by the replay command and by tests that assert on publish order.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use crate::{DataChannel, DataPacket, InboundReceiver, InboundSender};

#[derive(Debug, Clone, PartialEq)]
pub struct PublishedPacket {
    pub topic: String,
    pub data: Vec<u8>,
}

impl PublishedPacket {
    /// The payload decoded as JSON, if it is JSON.
    pub fn json(&self) -> Option<serde_json::Value> {
        serde_json::from_slice(&self.data).ok()
    }

    /// The envelope `type` field, if present.
    pub fn message_type(&self) -> Option<String> {
        self.json()?.get("type")?.as_str().map(str::to_string)
    }
}

pub struct MemoryChannel {
    identity: String,
    published: Mutex<Vec<PublishedPacket>>,
    failing_topics: Mutex<HashSet<String>>,
    fail_all: Mutex<bool>,
    inbound_tx: InboundSender,
}

impl MemoryChannel {
    /// Create a channel for the local participant `identity`, returning it
    /// and the receiver that inbound packets are delivered to.
    pub fn new(identity: impl Into<String>) -> (Self, InboundReceiver) {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        (
            Self {
                identity: identity.into(),
                published: Mutex::new(Vec::new()),
                failing_topics: Mutex::new(HashSet::new()),
                fail_all: Mutex::new(false),
                inbound_tx,
            },
            inbound_rx,
        )
    }

    /// Deliver a packet as if a remote participant sent it. Returns false
    /// once the receiver is gone.
    pub fn inject(&self, packet: DataPacket) -> bool {
        self.inbound_tx.send(packet).is_ok()
    }

    /// Everything published so far, in order.
    pub fn published(&self) -> Vec<PublishedPacket> {
        self.published.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn published_on(&self, topic: &str) -> Vec<PublishedPacket> {
        self.published()
            .into_iter()
            .filter(|p| p.topic == topic)
            .collect()
    }

    /// Make publishes on `topic` fail until [`MemoryChannel::heal`].
    pub fn fail_topic(&self, topic: impl Into<String>) {
        self.failing_topics
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(topic.into());
    }

    /// Make every publish fail until [`MemoryChannel::heal`].
    pub fn fail_all(&self) {
        *self.fail_all.lock().unwrap_or_else(|e| e.into_inner()) = true;
    }

    pub fn heal(&self) {
        *self.fail_all.lock().unwrap_or_else(|e| e.into_inner()) = false;
        self.failing_topics.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    fn should_fail(&self, topic: &str) -> bool {
        *self.fail_all.lock().unwrap_or_else(|e| e.into_inner())
            || self
                .failing_topics
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .contains(topic)
    }
}

#[async_trait]
impl DataChannel for MemoryChannel {
    fn id(&self) -> &str {
        "memory"
    }

    fn local_identity(&self) -> Option<String> {
        Some(self.identity.clone())
    }

    async fn publish(&self, data: &[u8], topic: &str) -> anyhow::Result<()> {
        if self.should_fail(topic) {
            anyhow::bail!("publish on '{topic}' rejected by transport");
        }
        debug!(topic, bytes = data.len(), "memory channel publish");
        self.published
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(PublishedPacket {
                topic: topic.to_string(),
                data: data.to_vec(),
            });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_in_order() {
        let (channel, _rx) = MemoryChannel::new("agent");
        channel.publish(br#"{"type":"a"}"#, "t1").await.unwrap();
        channel.publish(b"raw", "t2").await.unwrap();

        let published = channel.published();
        assert_eq!(published.len(), 2);
        assert_eq!(published[0].message_type().as_deref(), Some("a"));
        assert_eq!(published[1].json(), None);
        assert_eq!(channel.published_on("t2").len(), 1);
        assert_eq!(channel.local_identity().as_deref(), Some("agent"));
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let (channel, _rx) = MemoryChannel::new("agent");
        channel.fail_topic("t1");
        assert!(channel.publish(b"{}", "t1").await.is_err());
        assert!(channel.publish(b"{}", "t2").await.is_ok());

        channel.fail_all();
        assert!(channel.publish(b"{}", "t2").await.is_err());

        channel.heal();
        assert!(channel.publish(b"{}", "t1").await.is_ok());
        assert_eq!(channel.published().len(), 2);
    }

    #[tokio::test]
    async fn test_inject_reaches_receiver() {
        let (channel, mut rx) = MemoryChannel::new("agent");
        assert!(channel.inject(DataPacket::new("topic", "student", b"hi".to_vec())));
        let packet = rx.recv().await.unwrap();
        assert_eq!(packet.topic(), "topic");
        assert_eq!(packet.sender(), "student");

        drop(rx);
        assert!(!channel.inject(DataPacket::new("topic", "student", b"x".to_vec())));
    }
}
