//! Natural-language rescheduling.
//!
//! Parses postponement phrases ("do this later", "push everything to
//! tomorrow", "not today") into a [`RescheduleRequest`], moves the matching
//! task or the whole due-today set, bumps the postponement count, and records
//! each move in the [`UndoLedger`](crate::undo::UndoLedger).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use tiller_core::{end_of_day, end_of_day_in, Task};

use crate::error::{EngineError, Result};
use crate::store::TaskStore;
use crate::undo::{reschedule_inverse, UndoActionType, UndoLedger};

/// Where a postponement phrase moves a task to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RescheduleIntent {
    /// Vague postponement; pushes out three days.
    Later,
    Tomorrow,
    NextWeek,
    /// "Not today"; lands on tomorrow.
    NotToday,
    /// Pushes out two days.
    Soon,
    /// Drops the absolute date entirely, keeping only the fuzzy label.
    Eventually,
    /// An explicit date the caller already resolved.
    Custom(DateTime<Utc>),
}

impl std::fmt::Display for RescheduleIntent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RescheduleIntent::Later => write!(f, "later"),
            RescheduleIntent::Tomorrow => write!(f, "tomorrow"),
            RescheduleIntent::NextWeek => write!(f, "next_week"),
            RescheduleIntent::NotToday => write!(f, "not_today"),
            RescheduleIntent::Soon => write!(f, "soon"),
            RescheduleIntent::Eventually => write!(f, "eventually"),
            RescheduleIntent::Custom(_) => write!(f, "custom"),
        }
    }
}

impl RescheduleIntent {
    /// New absolute due date and fuzzy label for a move made at `now`.
    pub fn resolve(&self, now: DateTime<Utc>) -> (Option<DateTime<Utc>>, Option<String>) {
        match self {
            RescheduleIntent::Tomorrow | RescheduleIntent::NotToday => {
                (Some(end_of_day_in(now, 1)), Some("tomorrow".to_string()))
            }
            RescheduleIntent::NextWeek => {
                (Some(end_of_day_in(now, 7)), Some("next week".to_string()))
            }
            RescheduleIntent::Soon => (Some(end_of_day_in(now, 2)), Some("soon".to_string())),
            RescheduleIntent::Later => (Some(end_of_day_in(now, 3)), Some("later".to_string())),
            RescheduleIntent::Eventually => (None, Some("eventually".to_string())),
            RescheduleIntent::Custom(date) => (Some(*date), None),
        }
    }
}

/// A parsed reschedule utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RescheduleRequest {
    /// Move every task due today.
    BulkToday(RescheduleIntent),
    /// Move one task, located by a free-text reference. The reference is
    /// empty when the phrase was purely deictic ("tomorrow instead").
    Single {
        intent: RescheduleIntent,
        reference: String,
    },
}

/// Outcome of a single-task move.
#[derive(Debug, Clone, Serialize)]
pub struct RescheduleResult {
    pub success: bool,
    pub task_id: Uuid,
    pub task_title: String,
    pub old_due_date: Option<DateTime<Utc>>,
    pub old_due_fuzzy: Option<String>,
    pub new_due_date: Option<DateTime<Utc>>,
    pub new_due_fuzzy: Option<String>,
    pub undo_token: String,
    pub message: String,
}

/// Outcome of a bulk move.
#[derive(Debug, Clone, Serialize)]
pub struct BulkRescheduleResult {
    pub success: bool,
    pub rescheduled_count: usize,
    pub results: Vec<RescheduleResult>,
    pub undo_token: Option<String>,
    pub message: String,
}

struct ReschedulePatterns {
    /// (pattern, intent) checked in order; first match wins.
    intents: Vec<(Regex, RescheduleIntent)>,
    /// Phrases that target the whole due-today set.
    bulk: Vec<Regex>,
    /// Extract a free-text task reference from the utterance.
    references: Vec<Regex>,
}

impl ReschedulePatterns {
    fn new() -> Self {
        let compile = |p: &str| {
            Regex::new(p).unwrap_or_else(|e| panic!("Invalid reschedule regex {:?}: {}", p, e))
        };
        Self {
            bulk: vec![
                compile(r"\b(?:push|move)\s+(?:everything|all|these)\s+(?:to\s+)?tomorrow\b"),
                compile(r"\b(?:not today|skip everything today)\b"),
            ],
            intents: vec![
                (
                    compile(r"\b(?:do|move|push|reschedule)\s+(?:this|that|it)\s+later\b"),
                    RescheduleIntent::Later,
                ),
                (
                    compile(r"\b(?:not today|skip today|tomorrow instead)\b"),
                    RescheduleIntent::NotToday,
                ),
                (
                    compile(r"\b(?:push|move)\s+(?:everything|all|these)\s+to\s+tomorrow\b"),
                    RescheduleIntent::Tomorrow,
                ),
                (
                    compile(r"\b(?:do|move|push)\s+(?:this|that|it)\s+tomorrow\b"),
                    RescheduleIntent::Tomorrow,
                ),
                (
                    compile(r"\b(?:move|push)\s+to\s+next\s+week\b"),
                    RescheduleIntent::NextWeek,
                ),
                (
                    compile(r"\b(?:do|move)\s+(?:this|that)\s+next\s+week\b"),
                    RescheduleIntent::NextWeek,
                ),
                (
                    compile(r"\b(?:do|schedule)\s+(?:this|that)\s+soon\b"),
                    RescheduleIntent::Soon,
                ),
                (
                    compile(r"\b(?:do|move)\s+(?:this|that)\s+eventually\b"),
                    RescheduleIntent::Eventually,
                ),
            ],
            references: vec![
                compile(r"(?:the\s+)?(.+?)(?:\s+task|\s+reminder|\s+item)?\s+(?:to|for)"),
                compile(r"(?:reschedule|move|push)\s+(?:the\s+)?(.+?)(?:\s+to|\s+until|$)"),
                compile(r"\bd[o']\s+(?:the\s+)?(.+?)\s+later"),
                compile(r"\bnot\s+(?:the\s+)?(.+?)\s+today"),
            ],
        }
    }
}

fn patterns() -> &'static ReschedulePatterns {
    use std::sync::OnceLock;
    static PATTERNS: OnceLock<ReschedulePatterns> = OnceLock::new();
    PATTERNS.get_or_init(ReschedulePatterns::new)
}

/// Parse a message into a reschedule request, if it is one.
///
/// Bulk phrasings are checked first so "push everything to tomorrow" reads
/// as a bulk move rather than a single-task one.
pub fn parse_intent(message: &str) -> Option<RescheduleRequest> {
    let message = message.to_lowercase();
    let pats = patterns();

    for pattern in &pats.bulk {
        if pattern.is_match(&message) {
            return Some(RescheduleRequest::BulkToday(RescheduleIntent::Tomorrow));
        }
    }

    for (pattern, intent) in &pats.intents {
        if pattern.is_match(&message) {
            let reference = extract_task_reference(&message).unwrap_or_default();
            return Some(RescheduleRequest::Single {
                intent: *intent,
                reference,
            });
        }
    }

    None
}

/// Pull the free-text task reference out of a postponement phrase.
pub fn extract_task_reference(message: &str) -> Option<String> {
    let message = message.to_lowercase();
    for pattern in &patterns().references {
        if let Some(caps) = pattern.captures(&message) {
            if let Some(m) = caps.get(1) {
                let reference = m.as_str().trim().to_string();
                if !reference.is_empty() {
                    return Some(reference);
                }
            }
        }
    }
    None
}

/// Moves tasks in time and makes each move undoable.
pub struct RescheduleEngine {
    store: Arc<dyn TaskStore>,
    ledger: Arc<UndoLedger>,
}

impl RescheduleEngine {
    pub fn new(store: Arc<dyn TaskStore>, ledger: Arc<UndoLedger>) -> Self {
        Self { store, ledger }
    }

    /// Move one task per the intent, evaluated at `now`.
    pub async fn reschedule_task_at(
        &self,
        task_id: Uuid,
        intent: RescheduleIntent,
        now: DateTime<Utc>,
    ) -> Result<RescheduleResult> {
        let mut task = self.store.get(task_id).await?;

        let old_due_date = task.due_date;
        let old_due_fuzzy = task.due_fuzzy.clone();
        let old_ignored_count = task.ignored_count;

        let (new_due_date, new_due_fuzzy) = intent.resolve(now);
        task.due_date = new_due_date;
        task.due_fuzzy = new_due_fuzzy.clone();
        task.ignored_count += 1;
        task.last_ignored_at = Some(now);
        task.updated_at = now;

        let title = task.title.clone();
        let inverse = {
            let mut snapshot = task.clone();
            snapshot.due_date = old_due_date;
            snapshot.due_fuzzy = old_due_fuzzy.clone();
            reschedule_inverse(&snapshot, old_ignored_count)
        };
        self.store.save(task).await?;

        let message = reschedule_message(&title, intent, new_due_fuzzy.as_deref());
        let record = self.ledger.record_action_at(
            UndoActionType::TaskReschedule,
            message.clone(),
            inverse,
            Some(task_id.to_string()),
            None,
            now,
        );

        info!(task_id = %task_id, intent = %intent, "Rescheduled task");
        Ok(RescheduleResult {
            success: true,
            task_id,
            task_title: title,
            old_due_date,
            old_due_fuzzy,
            new_due_date,
            new_due_fuzzy,
            undo_token: record.action_id,
            message,
        })
    }

    /// Move one task against the wall clock.
    pub async fn reschedule_task(
        &self,
        task_id: Uuid,
        intent: RescheduleIntent,
    ) -> Result<RescheduleResult> {
        self.reschedule_task_at(task_id, intent, Utc::now()).await
    }

    /// Move several tasks. Best effort: tasks that fail to move are left
    /// out of the result rather than failing the batch.
    pub async fn bulk_reschedule_at(
        &self,
        task_ids: &[Uuid],
        intent: RescheduleIntent,
        now: DateTime<Utc>,
    ) -> BulkRescheduleResult {
        let mut results = Vec::new();
        for &task_id in task_ids {
            match self.reschedule_task_at(task_id, intent, now).await {
                Ok(result) => results.push(result),
                Err(e) => warn!(task_id = %task_id, "Skipping task in bulk reschedule: {}", e),
            }
        }

        let count = results.len();
        if count == 0 {
            return BulkRescheduleResult {
                success: false,
                rescheduled_count: 0,
                results,
                undo_token: None,
                message: "No tasks were rescheduled".to_string(),
            };
        }

        let tokens: Vec<&str> = results.iter().map(|r| r.undo_token.as_str()).collect();
        let record = self.ledger.record_action_at(
            UndoActionType::BulkReschedule,
            format!("Moved {} tasks to {}", count, intent),
            json!({ "individual_tokens": tokens }),
            None,
            None,
            now,
        );

        BulkRescheduleResult {
            success: true,
            rescheduled_count: count,
            results,
            undo_token: Some(record.action_id),
            message: format!("Moved {} tasks to {}. Undo?", count, intent),
        }
    }

    /// Move everything due today (including fuzzy "today" tasks), evaluated
    /// at `now`.
    pub async fn reschedule_today_tasks_at(
        &self,
        intent: RescheduleIntent,
        now: DateTime<Utc>,
    ) -> Result<BulkRescheduleResult> {
        let due_today = self.store.due_by(end_of_day(now)).await?;
        if due_today.is_empty() {
            return Ok(BulkRescheduleResult {
                success: false,
                rescheduled_count: 0,
                results: Vec::new(),
                undo_token: None,
                message: "No tasks to reschedule for today".to_string(),
            });
        }

        let ids: Vec<Uuid> = due_today.iter().map(|t| t.id).collect();
        debug!(count = ids.len(), "Bulk rescheduling today's tasks");
        Ok(self.bulk_reschedule_at(&ids, intent, now).await)
    }

    /// Move everything due today against the wall clock.
    pub async fn reschedule_today_tasks(
        &self,
        intent: RescheduleIntent,
    ) -> Result<BulkRescheduleResult> {
        self.reschedule_today_tasks_at(intent, Utc::now()).await
    }

    /// Resolve a free-text reference to an incomplete task.
    ///
    /// A task id from the conversation context wins if the reference appears
    /// in that task's title. Otherwise tries an exact title match, then a
    /// substring match, then the task sharing the most words with the
    /// reference.
    pub async fn find_task_by_reference(
        &self,
        reference: &str,
        context_task_id: Option<Uuid>,
    ) -> Result<Task> {
        let reference = reference.trim().to_lowercase();

        if let Some(id) = context_task_id {
            if let Ok(task) = self.store.get(id).await {
                if !task.completed
                    && (reference.is_empty() || task.title.to_lowercase().contains(&reference))
                {
                    return Ok(task);
                }
            }
        }

        if reference.is_empty() {
            return Err(EngineError::Store(
                "Empty task reference with no context".to_string(),
            ));
        }

        let candidates = self.store.list_pending().await?;

        if let Some(task) = candidates
            .iter()
            .find(|t| t.title.to_lowercase() == reference)
        {
            return Ok(task.clone());
        }

        if let Some(task) = candidates
            .iter()
            .find(|t| t.title.to_lowercase().contains(&reference))
        {
            return Ok(task.clone());
        }

        let ref_words: std::collections::HashSet<&str> = reference.split_whitespace().collect();
        let mut best: Option<(&Task, usize)> = None;
        for task in &candidates {
            let title = task.title.to_lowercase();
            let title_words: std::collections::HashSet<&str> = title.split_whitespace().collect();
            let overlap = ref_words.intersection(&title_words).count();
            if overlap > 0 && best.map(|(_, n)| overlap > n).unwrap_or(true) {
                best = Some((task, overlap));
            }
        }

        match best {
            Some((task, _)) => Ok(task.clone()),
            None => Err(EngineError::Store(format!(
                "No task matching reference '{}'",
                reference
            ))),
        }
    }
}

fn reschedule_message(title: &str, intent: RescheduleIntent, fuzzy: Option<&str>) -> String {
    match intent {
        RescheduleIntent::Later => format!("Moved '{}' to later", title),
        RescheduleIntent::Tomorrow => format!("Added '{}' to tomorrow", title),
        RescheduleIntent::NotToday => format!("'{}' moved to tomorrow", title),
        RescheduleIntent::NextWeek => format!("'{}' scheduled for next week", title),
        RescheduleIntent::Soon => format!("'{}' marked for soon", title),
        RescheduleIntent::Eventually => format!("'{}' saved for eventually", title),
        RescheduleIntent::Custom(_) => {
            format!("Rescheduled '{}' to {}", title, fuzzy.unwrap_or("later"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryTaskStore;
    use crate::undo::{ActionStatus, TaskRescheduleUndoHandler};
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()
    }

    fn eod(y: i32, mo: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, 23, 59, 59).unwrap()
    }

    fn engine_with_store() -> (RescheduleEngine, Arc<InMemoryTaskStore>, Arc<UndoLedger>) {
        let store = Arc::new(InMemoryTaskStore::new());
        let ledger = Arc::new(UndoLedger::new(30));
        ledger.register_handler(
            UndoActionType::TaskReschedule,
            Arc::new(TaskRescheduleUndoHandler::new(store.clone())),
        );
        (
            RescheduleEngine::new(store.clone(), ledger.clone()),
            store,
            ledger,
        )
    }

    // =====================================================================
    // Intent resolution
    // =====================================================================

    #[test]
    fn test_intent_resolution_offsets() {
        let now = fixed_now();
        assert_eq!(
            RescheduleIntent::Later.resolve(now),
            (Some(eod(2024, 3, 4)), Some("later".to_string()))
        );
        assert_eq!(
            RescheduleIntent::Tomorrow.resolve(now),
            (Some(eod(2024, 3, 2)), Some("tomorrow".to_string()))
        );
        assert_eq!(
            RescheduleIntent::NextWeek.resolve(now),
            (Some(eod(2024, 3, 8)), Some("next week".to_string()))
        );
        assert_eq!(
            RescheduleIntent::NotToday.resolve(now),
            (Some(eod(2024, 3, 2)), Some("tomorrow".to_string()))
        );
        assert_eq!(
            RescheduleIntent::Soon.resolve(now),
            (Some(eod(2024, 3, 3)), Some("soon".to_string()))
        );
        assert_eq!(
            RescheduleIntent::Eventually.resolve(now),
            (None, Some("eventually".to_string()))
        );
        let date = eod(2024, 4, 15);
        assert_eq!(RescheduleIntent::Custom(date).resolve(now), (Some(date), None));
    }

    // =====================================================================
    // Phrase parsing
    // =====================================================================

    #[test]
    fn test_parse_bulk_phrases() {
        for message in [
            "push everything to tomorrow",
            "Move all to tomorrow",
            "not today",
            "skip everything today",
        ] {
            assert_eq!(
                parse_intent(message),
                Some(RescheduleRequest::BulkToday(RescheduleIntent::Tomorrow)),
                "message: {}",
                message
            );
        }
    }

    #[test]
    fn test_parse_single_intents() {
        match parse_intent("do this later") {
            Some(RescheduleRequest::Single { intent, reference }) => {
                assert_eq!(intent, RescheduleIntent::Later);
                assert_eq!(reference, "this");
            }
            other => panic!("Unexpected parse: {:?}", other),
        }

        match parse_intent("tomorrow instead") {
            Some(RescheduleRequest::Single { intent, reference }) => {
                assert_eq!(intent, RescheduleIntent::NotToday);
                assert_eq!(reference, "");
            }
            other => panic!("Unexpected parse: {:?}", other),
        }

        match parse_intent("push it tomorrow") {
            Some(RescheduleRequest::Single { intent, .. }) => {
                assert_eq!(intent, RescheduleIntent::Tomorrow)
            }
            other => panic!("Unexpected parse: {:?}", other),
        }

        match parse_intent("move to next week") {
            Some(RescheduleRequest::Single { intent, .. }) => {
                assert_eq!(intent, RescheduleIntent::NextWeek)
            }
            other => panic!("Unexpected parse: {:?}", other),
        }

        match parse_intent("do that eventually") {
            Some(RescheduleRequest::Single { intent, .. }) => {
                assert_eq!(intent, RescheduleIntent::Eventually)
            }
            other => panic!("Unexpected parse: {:?}", other),
        }
    }

    #[test]
    fn test_parse_non_reschedule_message() {
        assert_eq!(parse_intent("buy groceries from the market"), None);
        assert_eq!(parse_intent("hello there"), None);
        // A bare time word without a postponement verb is not a reschedule
        assert_eq!(parse_intent("remind me to call mom tomorrow"), None);
    }

    #[test]
    fn test_extract_task_reference() {
        assert_eq!(
            extract_task_reference("reschedule gym session until friday"),
            Some("gym session".to_string())
        );
        assert_eq!(
            extract_task_reference("do the laundry later"),
            Some("laundry".to_string())
        );
        assert_eq!(extract_task_reference("hello"), None);
    }

    // =====================================================================
    // Single reschedule
    // =====================================================================

    #[tokio::test]
    async fn test_reschedule_task_moves_and_bumps_ignored_count() {
        let (engine, store, _) = engine_with_store();
        let now = fixed_now();
        let mut task = Task::new("Do the laundry", now);
        task.due_date = Some(eod(2024, 3, 1));
        task.due_fuzzy = Some("today".to_string());
        let id = task.id;
        store.save(task).await.unwrap();

        let result = engine
            .reschedule_task_at(id, RescheduleIntent::Tomorrow, now)
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.old_due_date, Some(eod(2024, 3, 1)));
        assert_eq!(result.new_due_date, Some(eod(2024, 3, 2)));
        assert_eq!(result.message, "Added 'Do the laundry' to tomorrow");

        let saved = store.get(id).await.unwrap();
        assert_eq!(saved.due_date, Some(eod(2024, 3, 2)));
        assert_eq!(saved.due_fuzzy, Some("tomorrow".to_string()));
        assert_eq!(saved.ignored_count, 1);
        assert_eq!(saved.last_ignored_at, Some(now));
    }

    #[tokio::test]
    async fn test_reschedule_eventually_clears_due_date() {
        let (engine, store, _) = engine_with_store();
        let now = fixed_now();
        let mut task = Task::new("Clean the garage", now);
        task.due_date = Some(eod(2024, 3, 1));
        let id = task.id;
        store.save(task).await.unwrap();

        let result = engine
            .reschedule_task_at(id, RescheduleIntent::Eventually, now)
            .await
            .unwrap();
        assert!(result.new_due_date.is_none());
        assert_eq!(result.message, "'Clean the garage' saved for eventually");

        let saved = store.get(id).await.unwrap();
        assert!(saved.due_date.is_none());
        assert_eq!(saved.due_fuzzy, Some("eventually".to_string()));
    }

    #[tokio::test]
    async fn test_reschedule_custom_date() {
        let (engine, store, _) = engine_with_store();
        let now = fixed_now();
        let task = Task::new("File the taxes", now);
        let id = task.id;
        store.save(task).await.unwrap();

        let date = eod(2024, 4, 15);
        let result = engine
            .reschedule_task_at(id, RescheduleIntent::Custom(date), now)
            .await
            .unwrap();
        assert_eq!(result.new_due_date, Some(date));
        assert_eq!(result.message, "Rescheduled 'File the taxes' to later");

        let saved = store.get(id).await.unwrap();
        assert_eq!(saved.due_date, Some(date));
        assert!(saved.due_fuzzy.is_none());
    }

    #[tokio::test]
    async fn test_reschedule_missing_task_errors() {
        let (engine, _, _) = engine_with_store();
        let result = engine
            .reschedule_task_at(Uuid::new_v4(), RescheduleIntent::Later, fixed_now())
            .await;
        assert!(matches!(result, Err(EngineError::TaskNotFound(_))));
    }

    #[tokio::test]
    async fn test_reschedule_then_undo_restores_task() {
        let (engine, store, ledger) = engine_with_store();
        let now = fixed_now();
        let mut task = Task::new("Pay the rent", now);
        task.due_date = Some(eod(2024, 3, 1));
        task.due_fuzzy = Some("today".to_string());
        let id = task.id;
        store.save(task).await.unwrap();

        let result = engine
            .reschedule_task_at(id, RescheduleIntent::NextWeek, now)
            .await
            .unwrap();

        assert!(ledger.undo_at(&result.undo_token, now).await);

        let restored = store.get(id).await.unwrap();
        assert_eq!(restored.due_date, Some(eod(2024, 3, 1)));
        assert_eq!(restored.due_fuzzy, Some("today".to_string()));
        assert_eq!(restored.ignored_count, 0);
    }

    #[tokio::test]
    async fn test_reschedule_undo_reschedule_is_idempotent() {
        let (engine, store, ledger) = engine_with_store();
        let now = fixed_now();
        let mut task = Task::new("Pay the rent", now);
        task.due_date = Some(eod(2024, 3, 1));
        let id = task.id;
        store.save(task).await.unwrap();

        let first = engine
            .reschedule_task_at(id, RescheduleIntent::NextWeek, now)
            .await
            .unwrap();
        let after_first = store.get(id).await.unwrap();

        assert!(ledger.undo_at(&first.undo_token, now).await);

        let second = engine
            .reschedule_task_at(id, RescheduleIntent::NextWeek, now)
            .await
            .unwrap();
        let after_second = store.get(id).await.unwrap();

        assert_eq!(after_second.due_date, after_first.due_date);
        assert_eq!(after_second.due_fuzzy, after_first.due_fuzzy);
        assert_eq!(after_second.ignored_count, after_first.ignored_count);
        assert_eq!(second.message, first.message);
    }

    // =====================================================================
    // Bulk reschedule
    // =====================================================================

    #[tokio::test]
    async fn test_bulk_reschedule_skips_missing_tasks() {
        let (engine, store, _) = engine_with_store();
        let now = fixed_now();
        let task = Task::new("Do the laundry", now);
        let id = task.id;
        store.save(task).await.unwrap();

        let result = engine
            .bulk_reschedule_at(&[id, Uuid::new_v4()], RescheduleIntent::Tomorrow, now)
            .await;

        assert!(result.success);
        assert_eq!(result.rescheduled_count, 1);
        assert_eq!(result.message, "Moved 1 tasks to tomorrow. Undo?");
        assert!(result.undo_token.is_some());
    }

    #[tokio::test]
    async fn test_bulk_reschedule_empty() {
        let (engine, _, _) = engine_with_store();
        let result = engine
            .bulk_reschedule_at(&[], RescheduleIntent::Tomorrow, fixed_now())
            .await;
        assert!(!result.success);
        assert_eq!(result.rescheduled_count, 0);
        assert!(result.undo_token.is_none());
    }

    #[tokio::test]
    async fn test_reschedule_today_moves_due_and_fuzzy_today() {
        let (engine, store, _) = engine_with_store();
        let now = fixed_now();

        let mut due_today = Task::new("Do the laundry", now);
        due_today.due_date = Some(eod(2024, 3, 1));
        store.save(due_today).await.unwrap();

        let mut fuzzy_today = Task::new("Call the dentist", now);
        fuzzy_today.due_fuzzy = Some("today".to_string());
        store.save(fuzzy_today).await.unwrap();

        let mut due_later = Task::new("Write the report", now);
        due_later.due_date = Some(eod(2024, 3, 5));
        let later_id = due_later.id;
        store.save(due_later).await.unwrap();

        let result = engine
            .reschedule_today_tasks_at(RescheduleIntent::Tomorrow, now)
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.rescheduled_count, 2);

        let untouched = store.get(later_id).await.unwrap();
        assert_eq!(untouched.due_date, Some(eod(2024, 3, 5)));
        assert_eq!(untouched.ignored_count, 0);
    }

    #[tokio::test]
    async fn test_reschedule_today_with_nothing_due() {
        let (engine, _, _) = engine_with_store();
        let result = engine
            .reschedule_today_tasks_at(RescheduleIntent::Tomorrow, fixed_now())
            .await
            .unwrap();
        assert!(!result.success);
        assert_eq!(result.message, "No tasks to reschedule for today");
    }

    #[tokio::test]
    async fn test_bulk_undo_restores_all_moved_tasks() {
        let (engine, store, ledger) = engine_with_store();
        let now = fixed_now();

        let mut a = Task::new("Do the laundry", now);
        a.due_date = Some(eod(2024, 3, 1));
        let a_id = a.id;
        store.save(a).await.unwrap();

        let mut b = Task::new("Water the plants", now);
        b.due_date = Some(eod(2024, 3, 1));
        let b_id = b.id;
        store.save(b).await.unwrap();

        let result = engine
            .reschedule_today_tasks_at(RescheduleIntent::Later, now)
            .await
            .unwrap();
        let token = result.undo_token.unwrap();

        assert!(ledger.undo_at(&token, now).await);

        for id in [a_id, b_id] {
            let restored = store.get(id).await.unwrap();
            assert_eq!(restored.due_date, Some(eod(2024, 3, 1)));
            assert_eq!(restored.ignored_count, 0);
        }
        let records = ledger.recent_actions(None, 10);
        assert!(records.iter().all(|r| r.status == ActionStatus::Undone));
    }

    // =====================================================================
    // Reference resolution
    // =====================================================================

    #[tokio::test]
    async fn test_find_task_exact_then_substring_then_words() {
        let (engine, store, _) = engine_with_store();
        let now = fixed_now();

        store.save(Task::new("laundry", now)).await.unwrap();
        store
            .save(Task::new("Buy groceries from the market", now))
            .await
            .unwrap();
        store
            .save(Task::new("Call mom about dinner", now))
            .await
            .unwrap();

        let exact = engine.find_task_by_reference("laundry", None).await.unwrap();
        assert_eq!(exact.title, "laundry");

        let substring = engine
            .find_task_by_reference("groceries", None)
            .await
            .unwrap();
        assert_eq!(substring.title, "Buy groceries from the market");

        let words = engine
            .find_task_by_reference("dinner with mom", None)
            .await
            .unwrap();
        assert_eq!(words.title, "Call mom about dinner");
    }

    #[tokio::test]
    async fn test_find_task_prefers_context() {
        let (engine, store, _) = engine_with_store();
        let now = fixed_now();

        store.save(Task::new("Do the laundry", now)).await.unwrap();
        let context = Task::new("Fold the laundry", now);
        let context_id = context.id;
        store.save(context).await.unwrap();

        let found = engine
            .find_task_by_reference("laundry", Some(context_id))
            .await
            .unwrap();
        assert_eq!(found.id, context_id);
    }

    #[tokio::test]
    async fn test_find_task_ignores_completed() {
        let (engine, store, _) = engine_with_store();
        let now = fixed_now();
        let mut done = Task::new("laundry", now);
        done.completed = true;
        store.save(done).await.unwrap();

        assert!(engine.find_task_by_reference("laundry", None).await.is_err());
    }

    #[tokio::test]
    async fn test_find_task_no_match() {
        let (engine, store, _) = engine_with_store();
        store.save(Task::new("laundry", fixed_now())).await.unwrap();
        assert!(engine
            .find_task_by_reference("quarterly taxes", None)
            .await
            .is_err());
    }
}
