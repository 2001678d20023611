//! Per-session state, built when a room session starts and torn down at its end.

use std::sync::Arc;

use slate_canvas::RenderOptions;
use slate_channels::DataChannel;
use slate_core::config::Config;
use slate_core::session::SessionMetadata;
use slate_core::store::ProjectStore;
use slate_tools::{CapabilityTable, TeacherActionBridge, WhiteboardBridge};
use tracing::info;

use crate::feedback::FeedbackScheduler;
use crate::reply::ReplyGenerator;

/// Topic routing for inbound packets.
#[derive(Debug, Clone)]
pub struct Topics {
    pub project: Vec<String>,
    pub image: String,
    pub action_result: String,
}

pub struct SessionContext {
    pub config: Arc<Config>,
    pub metadata: SessionMetadata,
    pub topics: Topics,
    pub channel: Arc<dyn DataChannel>,
    pub store: Arc<ProjectStore>,
    pub whiteboard: Arc<WhiteboardBridge>,
    pub teacher_actions: Arc<TeacherActionBridge>,
    pub feedback: FeedbackScheduler,
    pub capabilities: CapabilityTable,
}

impl SessionContext {
    pub fn new(
        config: Arc<Config>,
        metadata: SessionMetadata,
        channel: Arc<dyn DataChannel>,
        reply: Arc<dyn ReplyGenerator>,
    ) -> Arc<Self> {
        let whiteboard_cfg = config.whiteboard();
        let actions_cfg = config.teacher_actions();
        let render_cfg = config.render();

        let topics = Topics {
            project: whiteboard_cfg.project_topics.clone(),
            image: whiteboard_cfg.image_topic.clone(),
            action_result: actions_cfg.result_topic.clone(),
        };

        let store = Arc::new(ProjectStore::new());
        let whiteboard = Arc::new(WhiteboardBridge::new(
            channel.clone(),
            store.clone(),
            topics.project.clone(),
        ));
        let teacher_actions = Arc::new(TeacherActionBridge::new(
            channel.clone(),
            metadata.clone(),
            actions_cfg.request_topic.clone(),
            config.action_timeout(),
        ));

        let render = render_cfg.enabled.then(|| RenderOptions::from(&render_cfg));
        let feedback = FeedbackScheduler::new(reply, config.debounce(), render);

        let mut capabilities = CapabilityTable::new(metadata.clone());
        capabilities.configure_whiteboard(whiteboard.clone());
        capabilities.configure_teacher_actions(teacher_actions.clone());

        info!(
            role = %metadata.role,
            identity = ?channel.local_identity(),
            channel = channel.id(),
            "Session started"
        );

        Arc::new(Self {
            config,
            metadata,
            topics,
            channel,
            store,
            whiteboard,
            teacher_actions,
            feedback,
            capabilities,
        })
    }

    pub fn local_identity(&self) -> Option<String> {
        self.channel.local_identity()
    }

    /// Cancel in-flight feedback and release every pending teacher action.
    pub fn shutdown(&self) {
        self.feedback.cancel();
        self.teacher_actions.cancel_all();
        info!("Session ended");
    }
}
