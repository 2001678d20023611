//! Agent capabilities: whiteboard mutations and teacher actions.
//!
//! The [`CapabilityTable`] is the seam to the language model's tool-calling
//! environment. It decodes a named call into a [`Capability`], runs it
//! against the configured bridges, and turns every failure into a
//! [`ToolOutput`] with `is_error` set.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use slate_core::error::{Result, SlateError};
use slate_core::session::SessionMetadata;
use tracing::{debug, warn};

pub mod capability;
pub mod teacher;
pub mod teacher_actions;
pub mod whiteboard;

pub use capability::Capability;
pub use teacher_actions::TeacherActionBridge;
pub use whiteboard::{EraseTarget, WhiteboardBridge};

/// Output from a capability invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub content: String,
    pub is_error: bool,
}

impl ToolOutput {
    pub fn ok(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: true,
        }
    }
}

/// Dispatches capability calls to the session's bridges.
pub struct CapabilityTable {
    metadata: SessionMetadata,
    whiteboard: Option<Arc<WhiteboardBridge>>,
    teacher_actions: Option<Arc<TeacherActionBridge>>,
}

impl CapabilityTable {
    pub fn new(metadata: SessionMetadata) -> Self {
        Self {
            metadata,
            whiteboard: None,
            teacher_actions: None,
        }
    }

    pub fn configure_whiteboard(&mut self, bridge: Arc<WhiteboardBridge>) {
        self.whiteboard = Some(bridge);
    }

    pub fn configure_teacher_actions(&mut self, bridge: Arc<TeacherActionBridge>) {
        self.teacher_actions = Some(bridge);
    }

    /// Tool definitions for the LLM API request.
    pub fn to_llm_tools(&self) -> Vec<serde_json::Value> {
        capability::descriptors()
            .into_iter()
            .map(|d| {
                serde_json::json!({
                    "name": d.name,
                    "description": d.description,
                    "input_schema": d.schema,
                })
            })
            .collect()
    }

    fn whiteboard(&self) -> Result<&WhiteboardBridge> {
        self.whiteboard
            .as_deref()
            .ok_or_else(|| SlateError::BridgeNotInitialized("whiteboard bridge is not initialized".into()))
    }

    fn teacher_actions(&self) -> Result<&TeacherActionBridge> {
        self.teacher_actions.as_deref().ok_or_else(|| {
            SlateError::BridgeNotInitialized("teacher action bridge is not initialized".into())
        })
    }

    /// Decode and run a named call. Never fails; errors come back as
    /// `is_error` output.
    pub async fn invoke(&self, name: &str, params: serde_json::Value) -> ToolOutput {
        let outcome = match Capability::parse(name, params) {
            Ok(capability) => self.execute(capability).await,
            Err(e) => Err(e),
        };
        match outcome {
            Ok(content) => {
                debug!(capability = name, "capability succeeded");
                ToolOutput::ok(content)
            }
            Err(e) => {
                warn!(capability = name, "capability failed: {e}");
                ToolOutput::error(match e {
                    SlateError::ActionFailed(message) => message,
                    other => other.to_string(),
                })
            }
        }
    }

    pub async fn execute(&self, capability: Capability) -> Result<String> {
        use Capability::*;
        if capability.is_teacher_action() && !self.metadata.is_teacher() {
            return Err(SlateError::Authorization(format!(
                "{} is only available in teacher sessions",
                capability.name()
            )));
        }
        match capability {
            WhiteboardSetStudentDrawing(a) => Ok(self.whiteboard()?.set_student_drawing(a.enabled).await?.into()),
            WhiteboardDrawLine(a) => Ok(self
                .whiteboard()?
                .draw_line(a.x1, a.y1, a.x2, a.y2, a.color_argb, a.stroke_width, a.lock_student_while_drawing)
                .await?
                .into()),
            WhiteboardDrawRectangle(a) => Ok(self
                .whiteboard()?
                .draw_rectangle(a.x1, a.y1, a.x2, a.y2, a.color_argb, a.stroke_width, a.lock_student_while_drawing)
                .await?
                .into()),
            WhiteboardWriteText(a) => Ok(self
                .whiteboard()?
                .write_text(&a.text, a.x, a.y, a.color_argb, a.font_size, a.lock_student_while_writing)
                .await?
                .into()),
            WhiteboardWriteEquation(a) => Ok(self
                .whiteboard()?
                .write_equation(&a.equation, a.x, a.y, a.color_argb, a.font_size, a.lock_student_while_writing)
                .await?
                .into()),
            WhiteboardEraseLast(a) => Ok(self
                .whiteboard()?
                .erase_last(a.count, EraseTarget::parse(&a.target), a.lock_student_while_drawing)
                .await?
                .to_string()),
            WhiteboardClear(a) => Ok(self.whiteboard()?.clear(a.lock_student_while_drawing).await?.into()),
            TeacherClockMeIn(a) => {
                let bridge = self.teacher_actions()?;
                let (action, args) = teacher::clock_in_request(&a);
                let result = bridge.send(action, args).await?;
                finish_teacher_action(result, "Clock-in completed successfully.", "Clock-in failed.")
            }
            TeacherRescheduleClass(a) => {
                let bridge = self.teacher_actions()?;
                let (action, args) = teacher::reschedule_request(&a, self.metadata.timezone())?;
                let result = bridge.send(action, args).await?;
                finish_teacher_action(result, "Class time changed successfully.", "Reschedule failed.")
            }
        }
    }
}

fn finish_teacher_action(
    result: slate_core::types::TeacherActionResult,
    success_default: &str,
    failure_default: &str,
) -> Result<String> {
    let message = result.message.trim();
    match (result.success, message.is_empty()) {
        (true, true) => Ok(success_default.to_string()),
        (true, false) => Ok(message.to_string()),
        (false, true) => Err(SlateError::ActionFailed(failure_default.to_string())),
        (false, false) => Err(SlateError::ActionFailed(message.to_string())),
    }
}
