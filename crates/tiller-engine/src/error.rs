//! Error types for the task engine.

use tiller_core::TillerError;
use uuid::Uuid;

/// Errors from task storage and engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Task not found: {0}")]
    TaskNotFound(Uuid),
    #[error("Store error: {0}")]
    Store(String),
    #[error("Core error: {0}")]
    Core(#[from] TillerError),
}

pub type Result<T> = std::result::Result<T, EngineError>;
