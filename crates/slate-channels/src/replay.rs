//! JSON-lines session recordings.
//!
//! Each non-blank line is one inbound packet:
//!
//! ```json
//! {"topic": "ai_tutor_whiteboard", "sender": "student-1", "payload": {"type": "project", "payload": {"strokes": []}}, "delay_ms": 200}
//! ```
//!
//! `payload` is re-serialized as the packet bytes. A string payload is used
//! verbatim, so malformed packets can be recorded too. `delay_ms` is the
//! pause before the packet is delivered.

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::DataPacket;

#[derive(Debug, Clone, Deserialize)]
pub struct ReplayEntry {
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub sender: Option<String>,
    pub payload: Value,
    #[serde(default)]
    pub delay_ms: u64,
}

impl ReplayEntry {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn to_packet(&self) -> anyhow::Result<DataPacket> {
        let data = match &self.payload {
            Value::String(raw) => raw.as_bytes().to_vec(),
            other => serde_json::to_vec(other)?,
        };
        Ok(DataPacket {
            topic: self.topic.clone(),
            sender: self.sender.clone(),
            data,
            received_at: chrono::Utc::now(),
        })
    }
}

/// Parse a recording. Errors name the offending line.
pub fn parse_recording(input: &str) -> anyhow::Result<Vec<ReplayEntry>> {
    input
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty() && !line.trim_start().starts_with("//"))
        .map(|(idx, line)| {
            serde_json::from_str(line)
                .map_err(|e| anyhow::anyhow!("recording line {}: {e}", idx + 1))
        })
        .collect()
}
