use thiserror::Error;

#[derive(Debug, Error)]
pub enum SlateError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Bridge not initialized: {0}")]
    BridgeNotInitialized(String),

    #[error("Authorization error: {0}")]
    Authorization(String),

    #[error("Request timed out: {0}")]
    RequestTimeout(String),

    /// A privileged action ran but reported failure; the message is the
    /// executor's own wording.
    #[error("{0}")]
    ActionFailed(String),

    #[error("Render unavailable: {0}")]
    RenderUnavailable(String),

    #[error("Publish error: {0}")]
    Publish(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, SlateError>;
