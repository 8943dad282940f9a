//! Task engine: storage, urgency, rescheduling, and undo.
//!
//! Everything here follows the undo-first safety model: inferred actions are
//! executed immediately, softly confirmed ("Added. Undo?"), and reversible
//! for a short window instead of gated behind blocking dialogs.
//!
//! Time-dependent operations take an explicit `now` in their `_at` variants
//! so behavior is reproducible; the plain variants use the wall clock.

pub mod error;
pub mod reschedule;
pub mod store;
pub mod undo;
pub mod urgency;

pub use error::{EngineError, Result};
pub use reschedule::{
    BulkRescheduleResult, RescheduleEngine, RescheduleIntent, RescheduleRequest, RescheduleResult,
};
pub use store::{InMemoryTaskStore, TaskStore};
pub use undo::{
    ActionRecord, ActionStatus, SoftConfirmation, Sweeper, TaskCompleteUndoHandler,
    TaskCreateUndoHandler, TaskRescheduleUndoHandler, UndoActionType, UndoHandler, UndoLedger,
};
pub use urgency::{UrgencyEngine, UrgencyReading};
