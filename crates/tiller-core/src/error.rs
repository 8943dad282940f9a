use thiserror::Error;

/// Top-level error type for the Tiller system.
///
/// Each variant wraps a subsystem-specific failure. Subsystem crates define
/// their own error types and implement `From<SubsystemError> for TillerError`
/// so that the `?` operator works seamlessly across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TillerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Chat error: {0}")]
    Chat(String),

    #[error("Text generation error: {0}")]
    Generation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Shutdown in progress")]
    ShuttingDown,
}

impl From<toml::de::Error> for TillerError {
    fn from(err: toml::de::Error) -> Self {
        TillerError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for TillerError {
    fn from(err: toml::ser::Error) -> Self {
        TillerError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for TillerError {
    fn from(err: serde_json::Error) -> Self {
        TillerError::Serialization(err.to_string())
    }
}

/// Convenience result alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, TillerError>;
