//! Data-channel wire protocol.
//!
//! Every message except the image request is a JSON envelope of the form
//! `{"type": <message type>, "payload": <payload>}` published on a named
//! topic. Image requests are a flat object keyed by `image_base64`.

use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, SlateError};
use crate::types::{TeacherActionRequest, TeacherActionResult, WhiteboardProject};

/// Topics carrying whole-document project updates and drawing-permission control.
pub const WHITEBOARD_PROJECT_TOPICS: [&str; 2] = ["ai_tutor_whiteboard", "alluwal_whiteboard"];
pub const WHITEBOARD_IMAGE_TOPIC: &str = "whiteboard_image";
pub const TEACHER_ACTION_TOPIC: &str = "ai_tutor_teacher_actions";
pub const TEACHER_ACTION_RESULT_TOPIC: &str = "ai_tutor_teacher_action_results";

pub const MSG_TYPE_PROJECT: &str = "project";
pub const MSG_TYPE_STUDENT_DRAWING_PERMISSION: &str = "student_drawing_permission";
pub const MSG_TYPE_TEACHER_ACTION: &str = "teacher_action";
pub const MSG_TYPE_TEACHER_ACTION_RESULT: &str = "teacher_action_result";

pub const DEFAULT_IMAGE_MIME: &str = "image/png";

/// Outbound envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum WireMessage {
    Project(WhiteboardProject),
    StudentDrawingPermission { enabled: bool },
    TeacherAction(TeacherActionRequest),
    TeacherActionResult(TeacherActionResult),
}

impl WireMessage {
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(data)?)
    }

    pub fn message_type(&self) -> &'static str {
        match self {
            Self::Project(_) => MSG_TYPE_PROJECT,
            Self::StudentDrawingPermission { .. } => MSG_TYPE_STUDENT_DRAWING_PERMISSION,
            Self::TeacherAction(_) => MSG_TYPE_TEACHER_ACTION,
            Self::TeacherActionResult(_) => MSG_TYPE_TEACHER_ACTION_RESULT,
        }
    }
}

fn parse_object(data: &[u8]) -> Result<serde_json::Map<String, Value>> {
    match serde_json::from_slice::<Value>(data)? {
        Value::Object(map) => Ok(map),
        _ => Err(SlateError::Validation("packet is not a JSON object".into())),
    }
}

/// Split an envelope into its declared type and object payload.
fn parse_envelope(data: &[u8]) -> Result<(String, serde_json::Map<String, Value>)> {
    let mut packet = parse_object(data)?;
    let msg_type = packet
        .get("type")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    match packet.remove("payload") {
        Some(Value::Object(payload)) => Ok((msg_type, payload)),
        _ => Err(SlateError::Validation(format!(
            "message of type '{msg_type}' has no object payload"
        ))),
    }
}

/// Decode an inbound project update.
///
/// A `strokes` array is required. `texts` may be absent or null (treated as
/// empty) but any other non-array value rejects the message.
pub fn parse_project(data: &[u8]) -> Result<WhiteboardProject> {
    let (msg_type, mut payload) = parse_envelope(data)?;
    if msg_type != MSG_TYPE_PROJECT {
        return Err(SlateError::Validation(format!(
            "expected '{MSG_TYPE_PROJECT}' message, got '{msg_type}'"
        )));
    }
    if !payload.get("strokes").is_some_and(Value::is_array) {
        return Err(SlateError::Validation("project payload has no strokes array".into()));
    }
    match payload.get("texts") {
        None | Some(Value::Null) => {
            payload.insert("texts".into(), Value::Array(Vec::new()));
        }
        Some(Value::Array(_)) => {}
        Some(_) => {
            return Err(SlateError::Validation("project texts is not an array".into()));
        }
    }
    Ok(serde_json::from_value(Value::Object(payload))?)
}

/// Decode an inbound teacher action result.
///
/// The request id may be spelled `requestId` or `request_id`. `success` is
/// only true for a JSON `true`.
pub fn parse_action_result(data: &[u8]) -> Result<TeacherActionResult> {
    let (msg_type, payload) = parse_envelope(data)?;
    if msg_type != MSG_TYPE_TEACHER_ACTION_RESULT {
        return Err(SlateError::Validation(format!(
            "expected '{MSG_TYPE_TEACHER_ACTION_RESULT}' message, got '{msg_type}'"
        )));
    }

    let request_id = ["requestId", "request_id"]
        .iter()
        .filter_map(|key| payload.get(*key))
        .find_map(scalar_to_string)
        .map(|s| s.trim().to_string())
        .unwrap_or_default();
    if request_id.is_empty() {
        return Err(SlateError::Validation("action result missing request id".into()));
    }

    Ok(TeacherActionResult {
        request_id,
        success: payload.get("success") == Some(&Value::Bool(true)),
        message: payload
            .get("message")
            .and_then(scalar_to_string)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    })
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Extract the image of an explicit "look at my board" request as a data URL.
///
/// `image_base64` may already be a `data:` URL, which is passed through. A raw
/// base64 string must decode cleanly and is wrapped with `mime_type` (default
/// `image/png`).
pub fn parse_image_request(data: &[u8]) -> Result<String> {
    let packet = parse_object(data)?;
    let image = packet
        .get("image_base64")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| SlateError::Validation("image request has no image_base64".into()))?;

    if image.starts_with("data:") {
        return Ok(image.to_string());
    }

    let mime_type = packet
        .get("mime_type")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_IMAGE_MIME);

    base64::engine::general_purpose::STANDARD
        .decode(image)
        .map_err(|e| SlateError::Validation(format!("invalid base64 image payload: {e}")))?;

    Ok(format!("data:{mime_type};base64,{image}"))
}

/// Build a `data:` URL for encoded image bytes.
pub fn image_data_url(mime_type: &str, bytes: &[u8]) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    format!("data:{mime_type};base64,{encoded}")
}
