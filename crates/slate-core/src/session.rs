//! Session labeling derived from the job metadata attached to a room session.

use serde_json::{Map, Value};
use tracing::warn;

pub const TEACHER_ROLE: &str = "teacher";
pub const DEFAULT_TIMEZONE: &str = "UTC";

/// Who the agent is talking to in this session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionMetadata {
    /// Lowercased role label (`teacher`, `student`, or empty when unknown).
    pub role: String,
    pub user_name: Option<String>,
    pub user_timezone: Option<String>,
    /// The full metadata object as received.
    pub raw: Map<String, Value>,
}

impl SessionMetadata {
    /// Parse job metadata. Anything that is not a JSON object yields empty metadata.
    pub fn parse(metadata: &str) -> Self {
        match serde_json::from_str::<Value>(metadata) {
            Ok(Value::Object(map)) => Self::from_map(map),
            Ok(_) => {
                warn!("Job metadata is not a JSON object");
                Self::default()
            }
            Err(_) => Self::default(),
        }
    }

    pub fn from_map(raw: Map<String, Value>) -> Self {
        let role = ["user_role", "role"]
            .iter()
            .filter_map(|key| raw.get(*key))
            .find_map(non_empty_string)
            .map(|s| s.trim().to_lowercase())
            .unwrap_or_default();
        let user_name = raw.get("user_name").and_then(non_empty_string);
        let user_timezone = raw.get("user_timezone").and_then(non_empty_string);
        Self {
            role,
            user_name,
            user_timezone,
            raw,
        }
    }

    /// Metadata for a session with only a role label.
    pub fn with_role(role: &str) -> Self {
        Self {
            role: role.trim().to_lowercase(),
            ..Self::default()
        }
    }

    pub fn is_teacher(&self) -> bool {
        self.role == TEACHER_ROLE
    }

    /// Timezone for interpreting local times, falling back to UTC.
    pub fn timezone(&self) -> &str {
        self.user_timezone
            .as_deref()
            .map(str::trim)
            .filter(|tz| !tz.is_empty())
            .unwrap_or(DEFAULT_TIMEZONE)
    }
}

fn non_empty_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_teacher_role() {
        let meta = SessionMetadata::parse(
            r#"{"user_role": " Teacher ", "user_name": "Amina", "user_timezone": "Africa/Dakar"}"#,
        );
        assert!(meta.is_teacher());
        assert_eq!(meta.user_name.as_deref(), Some("Amina"));
        assert_eq!(meta.timezone(), "Africa/Dakar");
    }

    #[test]
    fn test_role_fallback_key() {
        let meta = SessionMetadata::parse(r#"{"user_role": "", "role": "student"}"#);
        assert_eq!(meta.role, "student");
        assert!(!meta.is_teacher());
    }

    #[test]
    fn test_invalid_metadata_is_empty() {
        assert_eq!(SessionMetadata::parse("not json"), SessionMetadata::default());
        assert_eq!(SessionMetadata::parse("[1, 2]"), SessionMetadata::default());
        assert_eq!(SessionMetadata::parse("").timezone(), "UTC");
    }

    #[test]
    fn test_with_role() {
        assert!(SessionMetadata::with_role("TEACHER").is_teacher());
    }
}
