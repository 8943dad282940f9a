//! Deterministic intent classification and task extraction.
//!
//! Categorizes free-form chat messages into four buckets (conversational,
//! actionable, ambiguous, explicit command) using cheap signals only: regex
//! tables and fixed weights, no model calls. Confidence comes from a weighted
//! signal sum pushed through a sigmoid, so the same message always classifies
//! the same way.
//!
//! The extractor turns an actionable message into a structured task draft:
//! title, life domain, task type, due date, requester, and tags.

pub mod classifier;
pub mod extractor;
pub mod patterns;

pub use classifier::{ActionKind, IntentBucket, IntentClassifier, IntentResult};
pub use extractor::{TaskDraft, TaskExtractor};
pub use patterns::PatternLibrary;
