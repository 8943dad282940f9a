//! Shared domain types, configuration, and errors for Tiller.
//!
//! Tiller turns free-form chat text into tracked tasks with deterministic
//! rules: no network calls, no learned weights. This crate holds the task
//! model and the cross-cutting concerns the other crates build on.

pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use config::{ChatConfig, GeneralConfig, TillerConfig, UndoConfig};
pub use error::{Result, TillerError};
pub use logging::init_tracing;
pub use types::*;
