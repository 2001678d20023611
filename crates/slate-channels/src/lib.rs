//! Data-channel abstraction.
//!
//! A room transport (WebRTC data channel, websocket relay, test harness)
//! implements [`DataChannel`] for outbound publishes and feeds inbound
//! [`DataPacket`]s into an [`InboundSender`]. Everything above this crate is
//! transport-agnostic.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

pub mod memory;
pub mod replay;

pub use memory::{MemoryChannel, PublishedPacket};

/// One message received from the room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPacket {
    /// Topic the message was published on; `None` for untopiced packets.
    pub topic: Option<String>,
    /// Identity of the publishing participant, as reported by the transport.
    pub sender: Option<String>,
    pub data: Vec<u8>,
    pub received_at: DateTime<Utc>,
}

impl DataPacket {
    pub fn new(topic: impl Into<String>, sender: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: Some(topic.into()),
            sender: Some(sender.into()),
            data: data.into(),
            received_at: Utc::now(),
        }
    }

    pub fn topic(&self) -> &str {
        self.topic.as_deref().unwrap_or_default()
    }

    pub fn sender(&self) -> &str {
        self.sender.as_deref().unwrap_or("unknown")
    }
}

/// Receiver for inbound packets from a channel.
pub type InboundReceiver = mpsc::UnboundedReceiver<DataPacket>;

/// Sender for inbound packets (used by channel implementations).
pub type InboundSender = mpsc::UnboundedSender<DataPacket>;

/// Reliable broadcast publish primitive.
#[async_trait]
pub trait DataChannel: Send + Sync + 'static {
    /// Short identifier for logs (e.g. "memory", "livekit").
    fn id(&self) -> &str;

    /// Identity of the local participant, used for echo suppression.
    fn local_identity(&self) -> Option<String>;

    /// Publish `data` reliably on `topic`. Failures are not retried.
    async fn publish(&self, data: &[u8], topic: &str) -> anyhow::Result<()>;
}
