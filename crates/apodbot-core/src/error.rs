//! Error taxonomy shared by every apodbot crate.

/// Convenience alias used across the workspace.
pub type Result<T> = std::result::Result<T, ApodError>;

/// All errors raised by apodbot components.
#[derive(Debug, thiserror::Error)]
pub enum ApodError {
    #[error("Invalid time format: {0}")]
    InvalidTimeFormat(String),

    #[error("Invalid date format: {0}")]
    InvalidDateFormat(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Fetch failed: {0}")]
    Fetch(String),

    /// Today's entry is not a still image. A terminal branch, not a fault.
    #[error("Media type mismatch: {0}")]
    MediaTypeMismatch(String),

    #[error("Compose failed: {0}")]
    Compose(String),

    #[error("Translate failed: {0}")]
    Translate(String),

    #[error("Schedule store corrupt: {0}")]
    StoreCorrupt(String),

    #[error("Channel error: {0}")]
    Channel(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ApodError {
    /// Whether the error came from a remote collaborator (fetch, translate, compose, send).
    pub fn is_collaborator_failure(&self) -> bool {
        matches!(
            self,
            ApodError::Fetch(_) | ApodError::Translate(_) | ApodError::Compose(_) | ApodError::Channel(_)
        )
    }
}
