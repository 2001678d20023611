//! Routes inbound data packets by topic and message type.

use std::sync::Arc;

use slate_channels::{DataPacket, InboundReceiver};
use slate_core::change::ChangeAction;
use slate_core::error::SlateError;
use slate_core::protocol::{parse_action_result, parse_image_request, parse_project};
use tracing::{debug, info, warn};

use crate::feedback::FeedbackTrigger;
use crate::session::SessionContext;

/// What the dispatcher did with a packet.
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    /// Sent by the local participant; ignored.
    Echo,
    /// A teacher action result; `resolved` is false for unknown ids.
    ActionResult { resolved: bool },
    ImageFeedback,
    /// Image request without a usable image, answered from the last board.
    RequestedFeedback,
    /// Board update stored and feedback rescheduled.
    ProjectUpdate(ChangeAction),
    Dropped,
}

pub struct Dispatcher {
    ctx: Arc<SessionContext>,
}

impl Dispatcher {
    pub fn new(ctx: Arc<SessionContext>) -> Self {
        Self { ctx }
    }

    /// Drain `rx` until every sender is gone.
    pub async fn run(self, mut rx: InboundReceiver) {
        while let Some(packet) = rx.recv().await {
            self.handle(&packet);
        }
        debug!("Inbound channel closed");
    }

    /// Handle one packet. Never fails; problems are logged and the packet
    /// dropped.
    pub fn handle(&self, packet: &DataPacket) -> Route {
        let topic = packet.topic();
        let sender = packet.sender();

        let local = self.ctx.local_identity();
        if local.is_some() && packet.sender == local {
            debug!(topic, sender, "Whiteboard: ignoring local echo");
            return Route::Echo;
        }

        let topics = &self.ctx.topics;
        if topic == topics.action_result {
            return self.handle_action_result(packet);
        }
        if topic == topics.image {
            return self.handle_image_request(packet);
        }
        if topics.project.iter().any(|t| t == topic) {
            return self.handle_project(packet);
        }

        debug!(topic, sender, "Dropping packet on unrouted topic");
        Route::Dropped
    }

    fn handle_action_result(&self, packet: &DataPacket) -> Route {
        match parse_action_result(&packet.data) {
            Ok(result) => Route::ActionResult {
                resolved: self.ctx.teacher_actions.resolve(result),
            },
            Err(e) => {
                debug!("Teacher actions: ignored malformed action result payload: {e}");
                Route::Dropped
            }
        }
    }

    fn handle_image_request(&self, packet: &DataPacket) -> Route {
        let sender = packet.sender().to_string();
        match parse_image_request(&packet.data) {
            Ok(data_url) => {
                self.ctx.feedback.schedule_image(data_url, sender);
                return Route::ImageFeedback;
            }
            Err(SlateError::Json(e)) => warn!("Whiteboard image: failed to parse JSON: {e}"),
            Err(e) => warn!("Whiteboard image: {e}"),
        }

        match self.ctx.store.latest() {
            Some(project) => {
                self.ctx
                    .feedback
                    .schedule_debounced(project, FeedbackTrigger::Requested, sender);
                Route::RequestedFeedback
            }
            None => {
                warn!("Whiteboard image: received request but no image and no cached project");
                Route::Dropped
            }
        }
    }

    fn handle_project(&self, packet: &DataPacket) -> Route {
        let project = match parse_project(&packet.data) {
            Ok(project) => project,
            Err(SlateError::Json(e)) => {
                warn!(topic = packet.topic(), "Whiteboard: failed to parse packet JSON: {e}");
                return Route::Dropped;
            }
            Err(e) => {
                debug!(topic = packet.topic(), "Whiteboard: ignored non-project message: {e}");
                return Route::Dropped;
            }
        };

        let action = self.ctx.store.apply(&project);
        info!(
            strokes = project.strokes.len(),
            texts = project.texts.len(),
            sender = packet.sender(),
            topic = packet.topic(),
            action = %action,
            "Whiteboard: received board update"
        );
        self.ctx.feedback.schedule_debounced(
            project,
            FeedbackTrigger::Change(action),
            packet.sender().to_string(),
        );
        Route::ProjectUpdate(action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reply::RecordingReplyGenerator;
    use serde_json::json;
    use slate_channels::MemoryChannel;
    use slate_core::config::Config;
    use slate_core::session::SessionMetadata;

    fn dispatcher() -> (Dispatcher, Arc<SessionContext>) {
        let (channel, _rx) = MemoryChannel::new("agent");
        let ctx = SessionContext::new(
            Arc::new(Config::default()),
            SessionMetadata::with_role("student"),
            Arc::new(channel),
            Arc::new(RecordingReplyGenerator::new()),
        );
        (Dispatcher::new(ctx.clone()), ctx)
    }

    fn packet(topic: &str, sender: &str, value: serde_json::Value) -> DataPacket {
        DataPacket::new(topic, sender, serde_json::to_vec(&value).unwrap())
    }

    #[tokio::test]
    async fn test_echo_suppressed_before_routing() {
        let (dispatcher, ctx) = dispatcher();
        let route = dispatcher.handle(&packet(
            "ai_tutor_whiteboard",
            "agent",
            json!({"type": "project", "payload": {"strokes": [{"id": "a"}]}}),
        ));
        assert_eq!(route, Route::Echo);
        assert!(!ctx.store.has_project());
    }

    #[tokio::test]
    async fn test_project_update_classified() {
        let (dispatcher, ctx) = dispatcher();
        let first = packet(
            "alluwal_whiteboard",
            "student",
            json!({"type": "project", "payload": {"strokes": [{"id": "a", "points": []}]}}),
        );
        assert_eq!(dispatcher.handle(&first), Route::ProjectUpdate(ChangeAction::Started));
        let second = packet(
            "ai_tutor_whiteboard",
            "student",
            json!({"type": "project", "payload": {"strokes": [], "texts": null}}),
        );
        assert_eq!(dispatcher.handle(&second), Route::ProjectUpdate(ChangeAction::Cleared));
        assert!(ctx.feedback.is_pending());
        ctx.shutdown();
    }

    #[tokio::test]
    async fn test_invalid_packets_dropped() {
        let (dispatcher, ctx) = dispatcher();
        let raw = DataPacket::new("ai_tutor_whiteboard", "student", b"{oops".to_vec());
        assert_eq!(dispatcher.handle(&raw), Route::Dropped);
        let permission = packet(
            "ai_tutor_whiteboard",
            "student",
            json!({"type": "student_drawing_permission", "payload": {"enabled": true}}),
        );
        assert_eq!(dispatcher.handle(&permission), Route::Dropped);
        let bad_texts = packet(
            "ai_tutor_whiteboard",
            "student",
            json!({"type": "project", "payload": {"strokes": [], "texts": 3}}),
        );
        assert_eq!(dispatcher.handle(&bad_texts), Route::Dropped);
        assert_eq!(dispatcher.handle(&packet("chat", "student", json!({}))), Route::Dropped);
        assert!(!ctx.store.has_project());
    }

    #[tokio::test]
    async fn test_image_request_routes() {
        let (dispatcher, ctx) = dispatcher();
        let no_image = packet("whiteboard_image", "student", json!({"image_base64": "%%%"}));
        assert_eq!(dispatcher.handle(&no_image), Route::Dropped);

        dispatcher.handle(&packet(
            "ai_tutor_whiteboard",
            "student",
            json!({"type": "project", "payload": {"strokes": []}}),
        ));
        assert_eq!(dispatcher.handle(&no_image), Route::RequestedFeedback);

        let image = packet("whiteboard_image", "student", json!({"image_base64": "aGVsbG8="}));
        assert_eq!(dispatcher.handle(&image), Route::ImageFeedback);
        ctx.shutdown();
    }

    #[tokio::test]
    async fn test_unknown_action_result() {
        let (dispatcher, _ctx) = dispatcher();
        let result = packet(
            "ai_tutor_teacher_action_results",
            "teacher-app",
            json!({"type": "teacher_action_result", "payload": {"requestId": "nope", "success": true}}),
        );
        assert_eq!(dispatcher.handle(&result), Route::ActionResult { resolved: false });
        let malformed = packet("ai_tutor_teacher_action_results", "teacher-app", json!({"type": "x"}));
        assert_eq!(dispatcher.handle(&malformed), Route::Dropped);
    }
}
