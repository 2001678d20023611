//! Configuration loading and validation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::protocol::{
    TEACHER_ACTION_RESULT_TOPIC, TEACHER_ACTION_TOPIC, WHITEBOARD_IMAGE_TOPIC,
    WHITEBOARD_PROJECT_TOPICS,
};

pub const DEFAULT_DEBOUNCE_MS: u64 = 1200;
pub const DEFAULT_ACTION_TIMEOUT_MS: u64 = 25_000;
pub const DEFAULT_CANVAS_WIDTH: u32 = 1024;
pub const DEFAULT_CANVAS_HEIGHT: u32 = 768;
/// Largest accepted canvas side, in pixels.
pub const MAX_CANVAS_DIMENSION: u32 = 8192;

/// Top-level Slate configuration. Every section is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub whiteboard: Option<WhiteboardConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub teacher_actions: Option<TeacherActionsConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub render: Option<RenderConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhiteboardConfig {
    /// Topics carrying project updates; outbound board messages go to all of them.
    #[serde(default = "default_project_topics")]
    pub project_topics: Vec<String>,

    #[serde(default = "default_image_topic")]
    pub image_topic: String,

    /// Quiet interval before reacting to a burst of board edits.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for WhiteboardConfig {
    fn default() -> Self {
        Self {
            project_topics: default_project_topics(),
            image_topic: default_image_topic(),
            debounce_ms: DEFAULT_DEBOUNCE_MS,
        }
    }
}

fn default_project_topics() -> Vec<String> {
    WHITEBOARD_PROJECT_TOPICS.iter().map(|t| t.to_string()).collect()
}

fn default_image_topic() -> String {
    WHITEBOARD_IMAGE_TOPIC.into()
}

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeacherActionsConfig {
    #[serde(default = "default_request_topic")]
    pub request_topic: String,

    #[serde(default = "default_result_topic")]
    pub result_topic: String,

    /// How long to wait for a teacher client to report a result.
    #[serde(default = "default_action_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for TeacherActionsConfig {
    fn default() -> Self {
        Self {
            request_topic: default_request_topic(),
            result_topic: default_result_topic(),
            timeout_ms: DEFAULT_ACTION_TIMEOUT_MS,
        }
    }
}

fn default_request_topic() -> String {
    TEACHER_ACTION_TOPIC.into()
}

fn default_result_topic() -> String {
    TEACHER_ACTION_RESULT_TOPIC.into()
}

fn default_action_timeout_ms() -> u64 {
    DEFAULT_ACTION_TIMEOUT_MS
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Set to false to always send text-only board feedback.
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_canvas_width")]
    pub width: u32,

    #[serde(default = "default_canvas_height")]
    pub height: u32,

    /// TrueType font for board text; DejaVu Sans is searched for when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_path: Option<String>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            width: DEFAULT_CANVAS_WIDTH,
            height: DEFAULT_CANVAS_HEIGHT,
            font_path: None,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_canvas_width() -> u32 {
    DEFAULT_CANVAS_WIDTH
}

fn default_canvas_height() -> u32 {
    DEFAULT_CANVAS_HEIGHT
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log format: "plain" (default) or "json".
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Log level override (trace/debug/info/warn/error).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,

    /// Per-crate log level overrides (e.g. "slate_agent=debug").
    #[serde(default)]
    pub filters: Vec<String>,

    /// Output target: "stderr" (default) or "stdout".
    #[serde(default = "default_log_output")]
    pub output: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
            level: None,
            filters: Vec::new(),
            output: default_log_output(),
        }
    }
}

fn default_log_format() -> String {
    "plain".into()
}

fn default_log_output() -> String {
    "stderr".into()
}

/// Substitute `${ENV_VAR}` patterns in a string with their environment variable values.
fn substitute_env_vars(input: &str) -> String {
    let re = regex::Regex::new(r"\$\{([^}]+)\}").expect("static env-var pattern is valid");
    re.replace_all(input, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_default()
    })
    .into_owned()
}

impl Config {
    /// Load config from a JSON5 file, substituting `${ENV_VAR}` references.
    /// A missing file yields the defaults.
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)?;
        let substituted = substitute_env_vars(&raw);

        json5::from_str(&substituted).map_err(|e| crate::error::SlateError::Config(e.to_string()))
    }

    /// Default config file path: `~/.slate/config.json`.
    pub fn config_path() -> PathBuf {
        data_dir().join("config.json")
    }

    pub fn whiteboard(&self) -> WhiteboardConfig {
        self.whiteboard.clone().unwrap_or_default()
    }

    pub fn teacher_actions(&self) -> TeacherActionsConfig {
        self.teacher_actions.clone().unwrap_or_default()
    }

    pub fn render(&self) -> RenderConfig {
        self.render.clone().unwrap_or_default()
    }

    pub fn project_topics(&self) -> Vec<String> {
        self.whiteboard().project_topics
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(
            self.whiteboard
                .as_ref()
                .map(|w| w.debounce_ms)
                .unwrap_or(DEFAULT_DEBOUNCE_MS),
        )
    }

    pub fn action_timeout(&self) -> Duration {
        Duration::from_millis(
            self.teacher_actions
                .as_ref()
                .map(|t| t.timeout_ms)
                .unwrap_or(DEFAULT_ACTION_TIMEOUT_MS),
        )
    }

    /// Get a config value by dotted path (e.g. "whiteboard.debounce_ms").
    pub fn get_path(&self, path: &str) -> Option<serde_json::Value> {
        let json = serde_json::to_value(self).ok()?;
        let mut current = &json;
        for segment in path.split('.') {
            current = current.get(segment)?;
        }
        Some(current.clone())
    }

    /// Validate config, returning (warnings, errors).
    pub fn validate(&self) -> (Vec<String>, Vec<String>) {
        let mut warnings = Vec::new();
        let mut errors = Vec::new();

        if let Some(wb) = &self.whiteboard {
            if wb.project_topics.iter().all(|t| t.trim().is_empty()) {
                errors.push("whiteboard.project_topics must name at least one topic".to_string());
            }
            if wb.image_topic.trim().is_empty() {
                errors.push("whiteboard.image_topic cannot be empty".to_string());
            }
            if wb.debounce_ms == 0 {
                errors.push("whiteboard.debounce_ms cannot be 0".to_string());
            }
        }

        if let Some(ta) = &self.teacher_actions {
            if ta.request_topic.trim().is_empty() || ta.result_topic.trim().is_empty() {
                errors.push("teacher_actions topics cannot be empty".to_string());
            }
            if ta.timeout_ms == 0 {
                errors.push("teacher_actions.timeout_ms cannot be 0".to_string());
            }
        }

        if let Some(render) = &self.render {
            if render.width == 0 || render.height == 0 {
                errors.push(format!(
                    "render canvas must be non-empty, got {}x{}",
                    render.width, render.height
                ));
            } else if render.width > MAX_CANVAS_DIMENSION || render.height > MAX_CANVAS_DIMENSION {
                errors.push(format!(
                    "render canvas {}x{} exceeds the {MAX_CANVAS_DIMENSION}px limit",
                    render.width, render.height
                ));
            } else if (render.width, render.height) != (DEFAULT_CANVAS_WIDTH, DEFAULT_CANVAS_HEIGHT) {
                warnings.push(format!(
                    "render canvas {}x{} differs from the {}x{} clients draw on",
                    render.width, render.height, DEFAULT_CANVAS_WIDTH, DEFAULT_CANVAS_HEIGHT
                ));
            }
        }

        (warnings, errors)
    }

    /// Save config to a file.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Base directory for Slate data: `~/.slate/`
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".slate")
}
