//! Request/response correlation for privileged teacher actions.
//!
//! The agent publishes a `teacher_action` request carrying a fresh request id
//! and waits for the teacher's client to publish a matching
//! `teacher_action_result`. Each id resolves at most once; the slot is gone
//! after resolution, timeout, or shutdown.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde_json::{Map, Value};
use slate_channels::DataChannel;
use slate_core::error::{Result, SlateError};
use slate_core::protocol::WireMessage;
use slate_core::session::SessionMetadata;
use slate_core::types::{TeacherActionRequest, TeacherActionResult};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

pub const TIMEOUT_MESSAGE: &str = "I could not confirm the action in time. Please try again.";
pub const CANCELLED_MESSAGE: &str = "The session ended before the action was confirmed.";

type PendingTable = HashMap<String, oneshot::Sender<TeacherActionResult>>;

/// Removes its request's slot when dropped, including when the waiting
/// future is cancelled.
struct PendingSlot<'a> {
    pending: &'a Mutex<PendingTable>,
    request_id: String,
}

impl Drop for PendingSlot<'_> {
    fn drop(&mut self) {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.request_id);
    }
}

pub struct TeacherActionBridge {
    channel: Arc<dyn DataChannel>,
    metadata: SessionMetadata,
    request_topic: String,
    timeout: Duration,
    pending: Mutex<PendingTable>,
}

impl TeacherActionBridge {
    pub fn new(
        channel: Arc<dyn DataChannel>,
        metadata: SessionMetadata,
        request_topic: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            channel,
            metadata,
            request_topic: request_topic.into(),
            timeout,
            pending: Mutex::new(HashMap::new()),
        }
    }

    fn pending(&self) -> MutexGuard<'_, PendingTable> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn metadata(&self) -> &SessionMetadata {
        &self.metadata
    }

    pub fn pending_count(&self) -> usize {
        self.pending().len()
    }

    /// Fails unless this is a teacher session.
    pub fn ensure_authorized(&self) -> Result<()> {
        if self.metadata.is_teacher() {
            Ok(())
        } else {
            Err(SlateError::Authorization(
                "teacher actions are only available in teacher sessions".into(),
            ))
        }
    }

    /// Publish `action` and wait for its result.
    ///
    /// A timeout is not an error: it yields a failed result with
    /// [`TIMEOUT_MESSAGE`].
    pub async fn send(&self, action: &str, args: Map<String, Value>) -> Result<TeacherActionResult> {
        self.ensure_authorized()?;

        let request_id = new_request_id();
        let (tx, rx) = oneshot::channel();
        self.pending().insert(request_id.clone(), tx);
        let _slot = PendingSlot {
            pending: &self.pending,
            request_id: request_id.clone(),
        };

        let request = WireMessage::TeacherAction(TeacherActionRequest {
            request_id: request_id.clone(),
            action: action.to_string(),
            args,
        });
        let published = match request.encode() {
            Ok(bytes) => self
                .channel
                .publish(&bytes, &self.request_topic)
                .await
                .map_err(|e| SlateError::Publish(e.to_string())),
            Err(e) => Err(e),
        };
        published?;
        info!(action, request_id = %request_id, "Teacher actions: published action");

        let outcome = tokio::time::timeout(self.timeout, rx).await;

        match outcome {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(_)) => {
                debug!(request_id = %request_id, "Teacher actions: pending request dropped");
                Ok(TeacherActionResult::failure(request_id, CANCELLED_MESSAGE))
            }
            Err(_) => {
                warn!(request_id = %request_id, "Teacher actions: timeout waiting for result");
                Ok(TeacherActionResult::failure(request_id, TIMEOUT_MESSAGE))
            }
        }
    }

    /// Fulfil the pending request matching `result.request_id`. Returns
    /// whether a waiter was found; unknown and already-resolved ids are
    /// ignored.
    pub fn resolve(&self, result: TeacherActionResult) -> bool {
        let Some(tx) = self.pending().remove(&result.request_id) else {
            debug!(
                request_id = %result.request_id,
                "Teacher actions: no pending request found"
            );
            return false;
        };
        let request_id = result.request_id.clone();
        if tx.send(result).is_err() {
            debug!(request_id = %request_id, "Teacher actions: waiter already gone");
            return false;
        }
        true
    }

    /// Drop every pending slot; their waiters return a failed result.
    pub fn cancel_all(&self) {
        let dropped = std::mem::take(&mut *self.pending());
        if !dropped.is_empty() {
            debug!(count = dropped.len(), "Teacher actions: dropping pending requests");
        }
    }
}

/// `teacher_action_<unix ms>_<8 hex chars>`.
fn new_request_id() -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "teacher_action_{}_{}",
        chrono::Utc::now().timestamp_millis(),
        &suffix[..8]
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use slate_channels::MemoryChannel;
    use slate_core::protocol::TEACHER_ACTION_TOPIC;

    fn bridge(role: &str) -> (Arc<TeacherActionBridge>, Arc<MemoryChannel>) {
        let (channel, _rx) = MemoryChannel::new("agent");
        let channel = Arc::new(channel);
        let bridge = TeacherActionBridge::new(
            channel.clone(),
            SessionMetadata::with_role(role),
            TEACHER_ACTION_TOPIC,
            Duration::from_secs(25),
        );
        (Arc::new(bridge), channel)
    }

    async fn published_request_id(channel: &MemoryChannel) -> String {
        loop {
            if let Some(packet) = channel.published_on(TEACHER_ACTION_TOPIC).last() {
                let json = packet.json().unwrap();
                return json["payload"]["requestId"].as_str().unwrap().to_string();
            }
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn test_request_id_shape() {
        let id = new_request_id();
        let parts: Vec<_> = id.rsplitn(2, '_').collect();
        assert_eq!(parts[0].len(), 8);
        assert!(parts[1].starts_with("teacher_action_"));
        assert_ne!(new_request_id(), new_request_id());
    }

    #[tokio::test]
    async fn test_non_teacher_is_rejected_without_publish() {
        let (bridge, channel) = bridge("student");
        let err = bridge.send("clock_in", Map::new()).await.unwrap_err();
        assert!(matches!(err, SlateError::Authorization(_)));
        assert!(channel.published().is_empty());
        assert_eq!(bridge.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolve_fulfils_waiter() {
        let (bridge, channel) = bridge("teacher");
        let sender = bridge.clone();
        let call = tokio::spawn(async move { sender.send("clock_in", Map::new()).await });

        let request_id = published_request_id(&channel).await;
        let packet = channel.published_on(TEACHER_ACTION_TOPIC).remove(0);
        assert_eq!(packet.message_type().as_deref(), Some("teacher_action"));
        assert_eq!(packet.json().unwrap()["payload"]["action"], "clock_in");

        assert!(bridge.resolve(TeacherActionResult {
            request_id: request_id.clone(),
            success: true,
            message: "done".into(),
        }));
        let result = call.await.unwrap().unwrap();
        assert!(result.success);
        assert_eq!(result.message, "done");

        // Second resolution for the same id is a no-op.
        assert!(!bridge.resolve(TeacherActionResult::failure(request_id, "late")));
        assert_eq!(bridge.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_aborted_caller_releases_slot() {
        let (bridge, channel) = bridge("teacher");
        let sender = bridge.clone();
        let call = tokio::spawn(async move { sender.send("clock_in", Map::new()).await });

        let request_id = published_request_id(&channel).await;
        assert_eq!(bridge.pending_count(), 1);

        call.abort();
        assert!(call.await.unwrap_err().is_cancelled());
        assert_eq!(bridge.pending_count(), 0);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(bridge.pending_count(), 0);
        assert!(!bridge.resolve(TeacherActionResult::failure(request_id, "late")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_yields_failure() {
        let (bridge, _channel) = bridge("teacher");
        let result = bridge.send("clock_in", Map::new()).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.message, TIMEOUT_MESSAGE);
        assert_eq!(bridge.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_id_is_ignored() {
        let (bridge, _channel) = bridge("teacher");
        assert!(!bridge.resolve(TeacherActionResult::failure("nope", "x")));
    }

    #[tokio::test]
    async fn test_publish_failure_clears_slot() {
        let (bridge, channel) = bridge("teacher");
        channel.fail_all();
        let err = bridge.send("clock_in", Map::new()).await.unwrap_err();
        assert!(matches!(err, SlateError::Publish(_)));
        assert_eq!(bridge.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_all_releases_waiters() {
        let (bridge, channel) = bridge("teacher");
        let sender = bridge.clone();
        let call = tokio::spawn(async move { sender.send("clock_in", Map::new()).await });
        published_request_id(&channel).await;

        bridge.cancel_all();
        let result = call.await.unwrap().unwrap();
        assert!(!result.success);
        assert_eq!(result.message, CANCELLED_MESSAGE);
    }
}
