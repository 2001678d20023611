//! Seam to the external reply generator (the speaking model).

use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

/// What the reply generator is shown alongside its instructions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReplyInput {
    /// An image as a `data:` URL.
    Image { data_url: String },
    Text { text: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyRequest {
    pub instructions: String,
    pub input: ReplyInput,
    pub allow_interruptions: bool,
}

impl ReplyRequest {
    pub fn has_image(&self) -> bool {
        matches!(self.input, ReplyInput::Image { .. })
    }
}

#[async_trait]
pub trait ReplyGenerator: Send + Sync + 'static {
    async fn generate_reply(&self, request: ReplyRequest) -> anyhow::Result<()>;
}

/// Logs each request instead of speaking. Used by the replay command.
pub struct LogReplyGenerator;

#[async_trait]
impl ReplyGenerator for LogReplyGenerator {
    async fn generate_reply(&self, request: ReplyRequest) -> anyhow::Result<()> {
        let input = match &request.input {
            ReplyInput::Image { data_url } => format!("image ({} bytes of data URL)", data_url.len()),
            ReplyInput::Text { text } => text.clone(),
        };
        info!(instructions = %request.instructions, input = %input, "reply requested");
        Ok(())
    }
}

/// Keeps every request in memory.
#[derive(Default)]
pub struct RecordingReplyGenerator {
    requests: Mutex<Vec<ReplyRequest>>,
}

impl RecordingReplyGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> Vec<ReplyRequest> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl ReplyGenerator for RecordingReplyGenerator {
    async fn generate_reply(&self, request: ReplyRequest) -> anyhow::Result<()> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request);
        Ok(())
    }
}
