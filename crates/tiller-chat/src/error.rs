//! Error types for the conversational surface.

use tiller_engine::EngineError;

/// Errors from the chat router.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("chat is disabled")]
    Disabled,
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("message exceeds maximum length of {0} characters")]
    MessageTooLong(usize),
    #[error("text generation failed: {0}")]
    Generation(String),
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
}
