//! Whiteboard document model shared by every participant in a room.
//!
//! Documents arrive from remote clients that are not under our control, so
//! decoding is lenient: a list that is missing or not an array becomes empty,
//! list entries that cannot be decoded are dropped, and scalar fields that
//! cannot be interpreted decode as `None`. Fields this crate does not know
//! about are carried through unchanged so a republished document does not
//! strip client-side data.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Version stamped on every document authored by the agent.
pub const PROJECT_VERSION: u32 = 2;

/// Maximum number of characters kept for a single text item.
pub const MAX_TEXT_CHARS: usize = 220;

pub const MIN_FONT_SIZE: f64 = 12.0;
pub const MAX_FONT_SIZE: f64 = 72.0;

pub const DEFAULT_STROKE_COLOR: u32 = 0xFF00_0000;
pub const DEFAULT_STROKE_WIDTH: f64 = 3.0;
pub const DEFAULT_TEXT_COLOR: u32 = 0xFF11_1827;
pub const DEFAULT_FONT_SIZE: f64 = 30.0;

/// A point on the board. Normalized points lie in `[0, 1]` on both axes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            extra: Map::new(),
        }
    }
}

/// A freehand or geometric stroke.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stroke {
    #[serde(
        default,
        deserialize_with = "lenient::id",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,

    #[serde(default, deserialize_with = "lenient::list")]
    pub points: Vec<Point>,

    /// Packed ARGB color.
    #[serde(
        default,
        deserialize_with = "lenient::color",
        skip_serializing_if = "Option::is_none"
    )]
    pub color: Option<u32>,

    #[serde(
        default,
        deserialize_with = "lenient::number",
        skip_serializing_if = "Option::is_none"
    )]
    pub stroke_width: Option<f64>,

    #[serde(
        default,
        deserialize_with = "lenient::flag",
        skip_serializing_if = "Option::is_none"
    )]
    pub normalized: Option<bool>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Stroke {
    pub fn new(id: impl Into<String>, points: Vec<Point>, color: u32, stroke_width: f64) -> Self {
        Self {
            id: Some(id.into()),
            points,
            color: Some(color),
            stroke_width: Some(stroke_width),
            normalized: Some(true),
            extra: Map::new(),
        }
    }

    /// Strokes use absolute pixel coordinates unless explicitly marked normalized.
    pub fn is_normalized(&self) -> bool {
        self.normalized == Some(true)
    }
}

/// A text label or equation placed on the board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextItem {
    #[serde(
        default,
        deserialize_with = "lenient::id",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,

    #[serde(default, deserialize_with = "lenient::text")]
    pub text: String,

    #[serde(
        default,
        deserialize_with = "lenient::number",
        skip_serializing_if = "Option::is_none"
    )]
    pub x: Option<f64>,

    #[serde(
        default,
        deserialize_with = "lenient::number",
        skip_serializing_if = "Option::is_none"
    )]
    pub y: Option<f64>,

    #[serde(
        default,
        deserialize_with = "lenient::color",
        skip_serializing_if = "Option::is_none"
    )]
    pub color: Option<u32>,

    #[serde(
        default,
        deserialize_with = "lenient::number",
        skip_serializing_if = "Option::is_none"
    )]
    pub font_size: Option<f64>,

    #[serde(
        default,
        deserialize_with = "lenient::flag",
        skip_serializing_if = "Option::is_none"
    )]
    pub normalized: Option<bool>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TextItem {
    pub fn new(id: impl Into<String>, text: impl Into<String>, x: f64, y: f64, color: u32, font_size: f64) -> Self {
        Self {
            id: Some(id.into()),
            text: text.into(),
            x: Some(x),
            y: Some(y),
            color: Some(color),
            font_size: Some(font_size),
            normalized: Some(true),
            extra: Map::new(),
        }
    }

    /// Text items are normalized unless explicitly marked otherwise.
    pub fn is_normalized(&self) -> bool {
        self.normalized != Some(false)
    }
}

/// The whole shared whiteboard document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhiteboardProject {
    #[serde(default, deserialize_with = "lenient::list")]
    pub strokes: Vec<Stroke>,

    #[serde(default, deserialize_with = "lenient::list")]
    pub texts: Vec<TextItem>,

    #[serde(default = "default_version", deserialize_with = "lenient::version")]
    pub version: u32,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_version() -> u32 {
    PROJECT_VERSION
}

impl Default for WhiteboardProject {
    fn default() -> Self {
        Self {
            strokes: Vec::new(),
            texts: Vec::new(),
            version: PROJECT_VERSION,
            extra: Map::new(),
        }
    }
}

impl WhiteboardProject {
    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty() && self.texts.is_empty()
    }

    pub fn stroke_ids(&self) -> HashSet<String> {
        self.strokes.iter().filter_map(|s| s.id.clone()).collect()
    }

    pub fn text_ids(&self) -> HashSet<String> {
        self.texts.iter().filter_map(|t| t.id.clone()).collect()
    }

    /// Union of stroke and text identifiers.
    pub fn item_ids(&self) -> HashSet<String> {
        let mut ids = self.stroke_ids();
        ids.extend(self.text_ids());
        ids
    }

    pub fn point_count(&self) -> usize {
        self.strokes.iter().map(|s| s.points.len()).sum()
    }
}

/// A privileged action the agent asks a teacher client to execute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherActionRequest {
    pub request_id: String,
    pub action: String,
    #[serde(default)]
    pub args: Map<String, Value>,
}

/// Outcome reported back for a [`TeacherActionRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherActionResult {
    pub request_id: String,
    pub success: bool,
    pub message: String,
}

impl TeacherActionResult {
    pub fn failure(request_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            success: false,
            message: message.into(),
        }
    }
}

/// Field decoders that never fail on a well-formed JSON value.
mod lenient {
    use serde::de::DeserializeOwned;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn id<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
    }

    pub fn text<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::String(s) => s,
            _ => String::new(),
        })
    }

    pub fn number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
            _ => None,
        })
    }

    /// Colors may arrive signed (`int32`) or unsigned; both pack the same bits.
    pub fn color<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
        let value = Value::deserialize(d)?;
        let Value::Number(n) = value else {
            return Ok(None);
        };
        if let Some(v) = n.as_i64() {
            return Ok(Some(v as u32));
        }
        if let Some(v) = n.as_u64() {
            return Ok(Some(v as u32));
        }
        Ok(n.as_f64().filter(|v| v.is_finite()).map(|v| v as i64 as u32))
    }

    pub fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
        Ok(Value::deserialize(d)?.as_bool())
    }

    pub fn version<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
        Ok(Value::deserialize(d)?
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(super::PROJECT_VERSION))
    }

    pub fn list<'de, D, T>(d: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        Ok(match Value::deserialize(d)? {
            Value::Array(items) => items
                .into_iter()
                .filter_map(|item| serde_json::from_value(item).ok())
                .collect(),
            _ => Vec::new(),
        })
    }
}
