//! Conversational surface for Tiller.
//!
//! Routes each chat message through explicit tags, reschedule detection,
//! and intent classification, turning actionable messages into stored tasks
//! with soft, undoable confirmations.

pub mod error;
pub mod llm;
pub mod router;

pub use error::ChatError;
pub use llm::{ChatMessage, MessageRole, TextGenerator};
pub use router::{ChatReply, ChatRouter, ReplyKind, SuggestedAction};
