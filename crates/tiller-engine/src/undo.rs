//! Undo-first safety model.
//!
//! Every inferred action is executed immediately, recorded in the
//! [`UndoLedger`], and softly confirmed ("Added. Undo?"). The record stays
//! undoable for a short window (default 30 seconds); after that a background
//! [`Sweeper`] marks it expired. Reversibility replaces blocking
//! confirmation dialogs.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use tiller_core::{Task, UndoConfig};

use crate::store::TaskStore;

/// Kind of action recorded in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UndoActionType {
    TaskCreate,
    TaskUpdate,
    TaskDelete,
    TaskReschedule,
    TaskComplete,
    BulkReschedule,
    BulkComplete,
}

impl std::fmt::Display for UndoActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UndoActionType::TaskCreate => write!(f, "task_create"),
            UndoActionType::TaskUpdate => write!(f, "task_update"),
            UndoActionType::TaskDelete => write!(f, "task_delete"),
            UndoActionType::TaskReschedule => write!(f, "task_reschedule"),
            UndoActionType::TaskComplete => write!(f, "task_complete"),
            UndoActionType::BulkReschedule => write!(f, "bulk_reschedule"),
            UndoActionType::BulkComplete => write!(f, "bulk_complete"),
        }
    }
}

/// Lifecycle of a recorded action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    /// Proposed but not yet executed. Reserved for flows that stage
    /// actions before committing; nothing records in this state today.
    Pending,
    /// Executed; undoable until the window closes.
    Confirmed,
    /// Reversed by the user.
    Undone,
    /// The undo window closed.
    Expired,
}

/// One undoable action.
#[derive(Debug, Clone, Serialize)]
pub struct ActionRecord {
    pub action_id: String,
    pub action_type: UndoActionType,
    pub status: ActionStatus,
    pub description: String,
    /// Everything the matching handler needs to reverse the action.
    pub inverse_data: Value,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub entity_id: Option<String>,
    pub user_id: Option<String>,
    pub confirmation_message: String,
}

/// Non-blocking confirmation shown to the user after an action.
#[derive(Debug, Clone, Serialize)]
pub struct SoftConfirmation {
    pub action_id: String,
    pub message: String,
    pub undo_available: bool,
    pub expires_in_seconds: i64,
}

/// Reverses one kind of recorded action.
#[async_trait]
pub trait UndoHandler: Send + Sync {
    /// Apply the inverse of the recorded action. Returns false on failure.
    async fn undo(&self, inverse_data: &Value) -> bool;
}

/// Concurrent ledger of undoable actions.
pub struct UndoLedger {
    actions: Mutex<HashMap<String, ActionRecord>>,
    handlers: Mutex<HashMap<UndoActionType, Arc<dyn UndoHandler>>>,
    window_seconds: u64,
}

impl UndoLedger {
    /// Ledger with the given undo window in seconds.
    pub fn new(window_seconds: u64) -> Self {
        Self {
            actions: Mutex::new(HashMap::new()),
            handlers: Mutex::new(HashMap::new()),
            window_seconds,
        }
    }

    /// Ledger with the window from the undo config section.
    pub fn from_config(config: &UndoConfig) -> Self {
        Self::new(config.window_seconds)
    }

    /// Register the handler that reverses `action_type`.
    pub fn register_handler(&self, action_type: UndoActionType, handler: Arc<dyn UndoHandler>) {
        if let Ok(mut handlers) = self.handlers.lock() {
            handlers.insert(action_type, handler);
        }
    }

    /// Record an executed action, making it undoable until the window
    /// closes. Returns the record carrying the undo token.
    pub fn record_action_at(
        &self,
        action_type: UndoActionType,
        description: impl Into<String>,
        inverse_data: Value,
        entity_id: Option<String>,
        user_id: Option<String>,
        now: DateTime<Utc>,
    ) -> ActionRecord {
        let description = description.into();
        let action_id = format!(
            "{}_{}_{}",
            action_type,
            Uuid::new_v4(),
            entity_id.as_deref().unwrap_or("anon")
        );
        let record = ActionRecord {
            action_id: action_id.clone(),
            action_type,
            status: ActionStatus::Confirmed,
            confirmation_message: format!("{}. Undo?", description),
            description,
            inverse_data,
            created_at: now,
            expires_at: now + Duration::seconds(self.window_seconds as i64),
            entity_id,
            user_id,
        };

        if let Ok(mut actions) = self.actions.lock() {
            actions.insert(action_id.clone(), record.clone());
        }
        info!(action_id = %action_id, "Recorded action: {}", record.description);
        record
    }

    /// Record an action against the wall clock.
    pub fn record_action(
        &self,
        action_type: UndoActionType,
        description: impl Into<String>,
        inverse_data: Value,
        entity_id: Option<String>,
        user_id: Option<String>,
    ) -> ActionRecord {
        self.record_action_at(
            action_type,
            description,
            inverse_data,
            entity_id,
            user_id,
            Utc::now(),
        )
    }

    /// Undo an action by token, evaluated at `now`. Returns true on success.
    ///
    /// Every failure mode (unknown token, wrong status, expired window,
    /// missing handler, handler failure) returns false; the log line tells
    /// them apart. Bulk records fan out to their individual tokens.
    pub async fn undo_at(&self, action_id: &str, now: DateTime<Utc>) -> bool {
        self.undo_inner(action_id, now).await
    }

    /// Undo against the wall clock.
    pub async fn undo(&self, action_id: &str) -> bool {
        self.undo_at(action_id, Utc::now()).await
    }

    // Boxed for the bulk fan-out recursion.
    fn undo_inner<'a>(
        &'a self,
        action_id: &'a str,
        now: DateTime<Utc>,
    ) -> Pin<Box<dyn Future<Output = bool> + Send + 'a>> {
        Box::pin(async move {
            // Validate under the lock, then release it for the handler call.
            let record = {
                let mut actions = match self.actions.lock() {
                    Ok(a) => a,
                    Err(_) => return false,
                };
                let record = match actions.get_mut(action_id) {
                    Some(r) => r,
                    None => {
                        warn!(action_id, "Undo requested for unknown action");
                        return false;
                    }
                };
                if record.status != ActionStatus::Confirmed {
                    warn!(action_id, status = ?record.status, "Cannot undo action");
                    return false;
                }
                if now > record.expires_at {
                    record.status = ActionStatus::Expired;
                    warn!(action_id, "Undo window expired");
                    return false;
                }
                record.clone()
            };

            let success = match record.action_type {
                UndoActionType::BulkReschedule | UndoActionType::BulkComplete => {
                    self.undo_bulk(&record, now).await
                }
                _ => {
                    let handler = self
                        .handlers
                        .lock()
                        .ok()
                        .and_then(|h| h.get(&record.action_type).cloned());
                    match handler {
                        Some(handler) => handler.undo(&record.inverse_data).await,
                        None => {
                            error!(action_id, action_type = %record.action_type, "No undo handler registered");
                            false
                        }
                    }
                }
            };

            if success {
                // The sweeper may have flipped the record to Expired while the
                // handler ran; an undo that was validated in time still wins.
                if let Ok(mut actions) = self.actions.lock() {
                    if let Some(record) = actions.get_mut(action_id) {
                        if record.status != ActionStatus::Undone {
                            record.status = ActionStatus::Undone;
                        }
                    }
                }
                info!(action_id, "Undid action");
                true
            } else {
                error!(action_id, "Undo handler failed");
                false
            }
        })
    }

    /// Fan a bulk record out to its individual tokens. All must succeed.
    async fn undo_bulk(&self, record: &ActionRecord, now: DateTime<Utc>) -> bool {
        let tokens: Vec<String> = record
            .inverse_data
            .get("individual_tokens")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|t| t.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        let mut success = true;
        for token in &tokens {
            if !self.undo_inner(token, now).await {
                success = false;
            }
        }
        success
    }

    /// Whether the action is still undoable at `now`. Does not mutate.
    pub fn can_undo_at(&self, action_id: &str, now: DateTime<Utc>) -> bool {
        let actions = match self.actions.lock() {
            Ok(a) => a,
            Err(_) => return false,
        };
        match actions.get(action_id) {
            Some(record) => record.status == ActionStatus::Confirmed && now <= record.expires_at,
            None => false,
        }
    }

    /// Whether the action is still undoable against the wall clock.
    pub fn can_undo(&self, action_id: &str) -> bool {
        self.can_undo_at(action_id, Utc::now())
    }

    /// Soft confirmation for an action, if it is still undoable at `now`.
    pub fn soft_confirmation_at(
        &self,
        action_id: &str,
        now: DateTime<Utc>,
    ) -> Option<SoftConfirmation> {
        let actions = self.actions.lock().ok()?;
        let record = actions.get(action_id)?;
        if record.status != ActionStatus::Confirmed {
            return None;
        }
        let remaining = (record.expires_at - now).num_seconds();
        if remaining <= 0 {
            return None;
        }
        Some(SoftConfirmation {
            action_id: record.action_id.clone(),
            message: record.confirmation_message.clone(),
            undo_available: true,
            expires_in_seconds: remaining,
        })
    }

    /// User-facing message for an action: the soft confirmation while the
    /// window is open, a plain acknowledgement afterwards.
    pub fn undo_message_at(&self, action_id: &str, now: DateTime<Utc>) -> String {
        match self.soft_confirmation_at(action_id, now) {
            Some(confirmation) => confirmation.message,
            None => "Action completed.".to_string(),
        }
    }

    /// Most recent actions, newest first, optionally filtered by user.
    pub fn recent_actions(&self, user_id: Option<&str>, limit: usize) -> Vec<ActionRecord> {
        let actions = match self.actions.lock() {
            Ok(a) => a,
            Err(_) => return Vec::new(),
        };
        let mut records: Vec<ActionRecord> = actions
            .values()
            .filter(|r| user_id.map(|u| r.user_id.as_deref() == Some(u)).unwrap_or(true))
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records.truncate(limit);
        records
    }

    /// Mark confirmed records whose window has closed as expired.
    /// Returns how many records were flipped.
    pub fn sweep_expired_at(&self, now: DateTime<Utc>) -> usize {
        let mut actions = match self.actions.lock() {
            Ok(a) => a,
            Err(_) => return 0,
        };
        let mut flipped = 0;
        for record in actions.values_mut() {
            if record.status == ActionStatus::Confirmed && now > record.expires_at {
                record.status = ActionStatus::Expired;
                debug!(action_id = %record.action_id, "Action expired");
                flipped += 1;
            }
        }
        flipped
    }

    /// Sweep against the wall clock.
    pub fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(Utc::now())
    }
}

/// Background loop that periodically expires stale ledger records.
pub struct Sweeper {
    ledger: Arc<UndoLedger>,
    interval_seconds: u64,
    shutdown: Arc<Notify>,
}

impl Sweeper {
    pub fn new(ledger: Arc<UndoLedger>, interval_seconds: u64) -> Self {
        Self {
            ledger,
            interval_seconds,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Sweeper with the interval from the undo config section.
    pub fn from_config(ledger: Arc<UndoLedger>, config: &UndoConfig) -> Self {
        Self::new(ledger, config.sweep_interval_seconds)
    }

    /// Run the sweep loop until shutdown is signalled.
    pub async fn run(&self) {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(std::time::Duration::from_secs(self.interval_seconds)) => {
                    let flipped = self.ledger.sweep_expired();
                    if flipped > 0 {
                        debug!(count = flipped, "Swept expired actions");
                    }
                }
                _ = self.shutdown.notified() => return,
            }
        }
    }

    /// Signal the sweeper to shut down gracefully.
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }
}

// =============================================================================
// Undo handlers
// =============================================================================

/// Reverses a task creation by deleting the task.
pub struct TaskCreateUndoHandler {
    store: Arc<dyn TaskStore>,
}

impl TaskCreateUndoHandler {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl UndoHandler for TaskCreateUndoHandler {
    async fn undo(&self, inverse_data: &Value) -> bool {
        let task_id = match parse_task_id(inverse_data) {
            Some(id) => id,
            None => return false,
        };
        self.store.delete(task_id).await.is_ok()
    }
}

/// Reverses a task completion by reopening the task.
pub struct TaskCompleteUndoHandler {
    store: Arc<dyn TaskStore>,
}

impl TaskCompleteUndoHandler {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl UndoHandler for TaskCompleteUndoHandler {
    async fn undo(&self, inverse_data: &Value) -> bool {
        let task_id = match parse_task_id(inverse_data) {
            Some(id) => id,
            None => return false,
        };
        let mut task = match self.store.get(task_id).await {
            Ok(t) => t,
            Err(_) => return false,
        };
        task.completed = false;
        task.completed_at = None;
        task.updated_at = Utc::now();
        self.store.save(task).await.is_ok()
    }
}

/// Reverses a reschedule by restoring the previous due date, fuzzy label,
/// and ignored count.
pub struct TaskRescheduleUndoHandler {
    store: Arc<dyn TaskStore>,
}

impl TaskRescheduleUndoHandler {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl UndoHandler for TaskRescheduleUndoHandler {
    async fn undo(&self, inverse_data: &Value) -> bool {
        let task_id = match parse_task_id(inverse_data) {
            Some(id) => id,
            None => return false,
        };
        let mut task = match self.store.get(task_id).await {
            Ok(t) => t,
            Err(_) => return false,
        };

        task.due_date = inverse_data
            .get("old_due_date")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse::<DateTime<Utc>>().ok());
        task.due_fuzzy = inverse_data
            .get("old_due_fuzzy")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        task.ignored_count = inverse_data
            .get("ignored_count")
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as u32;
        task.updated_at = Utc::now();

        self.store.save(task).await.is_ok()
    }
}

fn parse_task_id(inverse_data: &Value) -> Option<Uuid> {
    inverse_data
        .get("task_id")
        .and_then(|v| v.as_str())
        .and_then(|s| Uuid::parse_str(s).ok())
}

/// Inverse payload for restoring a task's schedule.
pub fn reschedule_inverse(task: &Task, old_ignored_count: u32) -> Value {
    json!({
        "task_id": task.id.to_string(),
        "old_due_date": task.due_date.map(|d| d.to_rfc3339()),
        "old_due_fuzzy": task.due_fuzzy,
        "ignored_count": old_ignored_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryTaskStore;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()
    }

    struct AlwaysOk;
    #[async_trait]
    impl UndoHandler for AlwaysOk {
        async fn undo(&self, _inverse_data: &Value) -> bool {
            true
        }
    }

    struct AlwaysFail;
    #[async_trait]
    impl UndoHandler for AlwaysFail {
        async fn undo(&self, _inverse_data: &Value) -> bool {
            false
        }
    }

    // =====================================================================
    // Recording and soft confirmation
    // =====================================================================

    #[test]
    fn test_record_action_is_confirmed_with_window() {
        let ledger = UndoLedger::new(30);
        let now = fixed_now();
        let record = ledger.record_action_at(
            UndoActionType::TaskCreate,
            "Created task 'Buy milk'",
            json!({"task_id": "x"}),
            Some("x".to_string()),
            None,
            now,
        );

        assert_eq!(record.status, ActionStatus::Confirmed);
        assert_eq!(record.expires_at, now + Duration::seconds(30));
        assert_eq!(record.confirmation_message, "Created task 'Buy milk'. Undo?");
        assert!(record.action_id.starts_with("task_create_"));
        assert!(record.action_id.ends_with("_x"));
    }

    #[test]
    fn test_from_config_applies_window() {
        let config = UndoConfig {
            window_seconds: 5,
            sweep_interval_seconds: 60,
        };
        let ledger = UndoLedger::from_config(&config);
        let now = fixed_now();
        let record =
            ledger.record_action_at(UndoActionType::TaskCreate, "X", json!({}), None, None, now);

        assert_eq!(record.expires_at, now + Duration::seconds(5));
        assert!(ledger.can_undo_at(&record.action_id, now + Duration::seconds(5)));
        assert!(!ledger.can_undo_at(&record.action_id, now + Duration::seconds(6)));
    }

    #[test]
    fn test_soft_confirmation_inside_window() {
        let ledger = UndoLedger::new(30);
        let now = fixed_now();
        let record = ledger.record_action_at(
            UndoActionType::TaskCreate,
            "Created task 'Buy milk'",
            json!({}),
            None,
            None,
            now,
        );

        let confirmation = ledger
            .soft_confirmation_at(&record.action_id, now + Duration::seconds(10))
            .unwrap();
        assert_eq!(confirmation.message, "Created task 'Buy milk'. Undo?");
        assert!(confirmation.undo_available);
        assert_eq!(confirmation.expires_in_seconds, 20);
    }

    #[test]
    fn test_soft_confirmation_after_window_is_none() {
        let ledger = UndoLedger::new(30);
        let now = fixed_now();
        let record =
            ledger.record_action_at(UndoActionType::TaskCreate, "X", json!({}), None, None, now);
        assert!(ledger
            .soft_confirmation_at(&record.action_id, now + Duration::seconds(31))
            .is_none());
    }

    #[test]
    fn test_undo_message_falls_back_after_window() {
        let ledger = UndoLedger::new(30);
        let now = fixed_now();
        let record =
            ledger.record_action_at(UndoActionType::TaskCreate, "X", json!({}), None, None, now);
        assert_eq!(
            ledger.undo_message_at(&record.action_id, now),
            "X. Undo?"
        );
        assert_eq!(
            ledger.undo_message_at(&record.action_id, now + Duration::minutes(5)),
            "Action completed."
        );
        assert_eq!(ledger.undo_message_at("missing", now), "Action completed.");
    }

    // =====================================================================
    // Undo paths
    // =====================================================================

    #[tokio::test]
    async fn test_undo_success() {
        let ledger = UndoLedger::new(30);
        ledger.register_handler(UndoActionType::TaskCreate, Arc::new(AlwaysOk));
        let now = fixed_now();
        let record =
            ledger.record_action_at(UndoActionType::TaskCreate, "X", json!({}), None, None, now);

        assert!(ledger.undo_at(&record.action_id, now).await);

        // Second undo fails: status is already Undone
        assert!(!ledger.undo_at(&record.action_id, now).await);
    }

    #[tokio::test]
    async fn test_undo_unknown_token() {
        let ledger = UndoLedger::new(30);
        assert!(!ledger.undo_at("no_such_token", fixed_now()).await);
    }

    #[tokio::test]
    async fn test_undo_expired_window() {
        let ledger = UndoLedger::new(30);
        ledger.register_handler(UndoActionType::TaskCreate, Arc::new(AlwaysOk));
        let now = fixed_now();
        let record =
            ledger.record_action_at(UndoActionType::TaskCreate, "X", json!({}), None, None, now);

        assert!(!ledger.undo_at(&record.action_id, now + Duration::seconds(31)).await);

        // The failed undo marks the record expired
        let records = ledger.recent_actions(None, 10);
        assert_eq!(records[0].status, ActionStatus::Expired);
    }

    #[tokio::test]
    async fn test_undo_no_handler() {
        let ledger = UndoLedger::new(30);
        let now = fixed_now();
        let record =
            ledger.record_action_at(UndoActionType::TaskDelete, "X", json!({}), None, None, now);
        assert!(!ledger.undo_at(&record.action_id, now).await);
        // Record stays confirmed so a handler registered later could still run
        assert!(ledger.can_undo_at(&record.action_id, now));
    }

    #[tokio::test]
    async fn test_undo_handler_failure() {
        let ledger = UndoLedger::new(30);
        ledger.register_handler(UndoActionType::TaskCreate, Arc::new(AlwaysFail));
        let now = fixed_now();
        let record =
            ledger.record_action_at(UndoActionType::TaskCreate, "X", json!({}), None, None, now);
        assert!(!ledger.undo_at(&record.action_id, now).await);
        assert!(ledger.can_undo_at(&record.action_id, now));
    }

    #[tokio::test]
    async fn test_zero_window_expires_immediately() {
        let ledger = UndoLedger::new(0);
        ledger.register_handler(UndoActionType::TaskCreate, Arc::new(AlwaysOk));
        let now = fixed_now();
        let record =
            ledger.record_action_at(UndoActionType::TaskCreate, "X", json!({}), None, None, now);

        // Exactly at expires_at is still allowed (strict greater-than)
        assert!(ledger.can_undo_at(&record.action_id, now));
        assert!(!ledger.can_undo_at(&record.action_id, now + Duration::seconds(1)));
    }

    // =====================================================================
    // can_undo / recent / sweep
    // =====================================================================

    #[test]
    fn test_can_undo_does_not_mutate() {
        let ledger = UndoLedger::new(30);
        let now = fixed_now();
        let record =
            ledger.record_action_at(UndoActionType::TaskCreate, "X", json!({}), None, None, now);

        assert!(!ledger.can_undo_at(&record.action_id, now + Duration::minutes(5)));
        // Status is still Confirmed; only undo() and the sweeper flip it
        let records = ledger.recent_actions(None, 10);
        assert_eq!(records[0].status, ActionStatus::Confirmed);
    }

    #[test]
    fn test_recent_actions_newest_first_with_limit() {
        let ledger = UndoLedger::new(30);
        let now = fixed_now();
        for i in 0..5 {
            ledger.record_action_at(
                UndoActionType::TaskCreate,
                format!("Action {}", i),
                json!({}),
                None,
                None,
                now + Duration::seconds(i),
            );
        }

        let records = ledger.recent_actions(None, 3);
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].description, "Action 4");
        assert_eq!(records[2].description, "Action 2");
    }

    #[test]
    fn test_recent_actions_filters_by_user() {
        let ledger = UndoLedger::new(30);
        let now = fixed_now();
        ledger.record_action_at(
            UndoActionType::TaskCreate,
            "Mine",
            json!({}),
            None,
            Some("alice".to_string()),
            now,
        );
        ledger.record_action_at(
            UndoActionType::TaskCreate,
            "Theirs",
            json!({}),
            None,
            Some("bob".to_string()),
            now,
        );

        let records = ledger.recent_actions(Some("alice"), 10);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].description, "Mine");
    }

    #[test]
    fn test_sweep_expires_only_stale_confirmed() {
        let ledger = UndoLedger::new(30);
        let now = fixed_now();
        ledger.record_action_at(UndoActionType::TaskCreate, "Old", json!({}), None, None, now);
        ledger.record_action_at(
            UndoActionType::TaskCreate,
            "Fresh",
            json!({}),
            None,
            None,
            now + Duration::minutes(5),
        );

        let flipped = ledger.sweep_expired_at(now + Duration::minutes(1));
        assert_eq!(flipped, 1);

        let records = ledger.recent_actions(None, 10);
        let old = records.iter().find(|r| r.description == "Old").unwrap();
        let fresh = records.iter().find(|r| r.description == "Fresh").unwrap();
        assert_eq!(old.status, ActionStatus::Expired);
        assert_eq!(fresh.status, ActionStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_undone_survives_sweep() {
        let ledger = UndoLedger::new(30);
        ledger.register_handler(UndoActionType::TaskCreate, Arc::new(AlwaysOk));
        let now = fixed_now();
        let record =
            ledger.record_action_at(UndoActionType::TaskCreate, "X", json!({}), None, None, now);
        assert!(ledger.undo_at(&record.action_id, now).await);

        ledger.sweep_expired_at(now + Duration::minutes(5));
        let records = ledger.recent_actions(None, 10);
        assert_eq!(records[0].status, ActionStatus::Undone);
    }

    // =====================================================================
    // Bulk fan-out
    // =====================================================================

    #[tokio::test]
    async fn test_bulk_undo_fans_out() {
        let ledger = UndoLedger::new(30);
        ledger.register_handler(UndoActionType::TaskReschedule, Arc::new(AlwaysOk));
        let now = fixed_now();

        let a = ledger.record_action_at(
            UndoActionType::TaskReschedule,
            "A",
            json!({}),
            None,
            None,
            now,
        );
        let b = ledger.record_action_at(
            UndoActionType::TaskReschedule,
            "B",
            json!({}),
            None,
            None,
            now,
        );
        let bulk = ledger.record_action_at(
            UndoActionType::BulkReschedule,
            "Moved 2 tasks",
            json!({"individual_tokens": [a.action_id, b.action_id]}),
            None,
            None,
            now,
        );

        assert!(ledger.undo_at(&bulk.action_id, now).await);

        let records = ledger.recent_actions(None, 10);
        assert!(records.iter().all(|r| r.status == ActionStatus::Undone));
    }

    #[tokio::test]
    async fn test_bulk_undo_fails_when_member_fails() {
        let ledger = UndoLedger::new(30);
        ledger.register_handler(UndoActionType::TaskReschedule, Arc::new(AlwaysOk));
        let now = fixed_now();

        let a = ledger.record_action_at(
            UndoActionType::TaskReschedule,
            "A",
            json!({}),
            None,
            None,
            now,
        );
        let bulk = ledger.record_action_at(
            UndoActionType::BulkReschedule,
            "Moved tasks",
            json!({"individual_tokens": [a.action_id, "missing_token"]}),
            None,
            None,
            now,
        );

        assert!(!ledger.undo_at(&bulk.action_id, now).await);
    }

    // =====================================================================
    // Store-backed handlers
    // =====================================================================

    #[tokio::test]
    async fn test_task_create_undo_deletes_task() {
        let store = Arc::new(InMemoryTaskStore::new());
        let now = fixed_now();
        let task = Task::new("Buy milk", now);
        let id = task.id;
        store.save(task).await.unwrap();

        let handler = TaskCreateUndoHandler::new(store.clone());
        assert!(handler.undo(&json!({"task_id": id.to_string()})).await);
        assert!(store.get(id).await.is_err());
    }

    #[tokio::test]
    async fn test_task_create_undo_bad_payload() {
        let store = Arc::new(InMemoryTaskStore::new());
        let handler = TaskCreateUndoHandler::new(store);
        assert!(!handler.undo(&json!({})).await);
        assert!(!handler.undo(&json!({"task_id": "not-a-uuid"})).await);
    }

    #[tokio::test]
    async fn test_task_complete_undo_reopens_task() {
        let store = Arc::new(InMemoryTaskStore::new());
        let now = fixed_now();
        let mut task = Task::new("Buy milk", now);
        task.completed = true;
        task.completed_at = Some(now);
        let id = task.id;
        store.save(task).await.unwrap();

        let handler = TaskCompleteUndoHandler::new(store.clone());
        assert!(handler.undo(&json!({"task_id": id.to_string()})).await);

        let reopened = store.get(id).await.unwrap();
        assert!(!reopened.completed);
        assert!(reopened.completed_at.is_none());
    }

    #[tokio::test]
    async fn test_task_reschedule_undo_restores_schedule() {
        let store = Arc::new(InMemoryTaskStore::new());
        let now = fixed_now();
        let old_due = Utc.with_ymd_and_hms(2024, 3, 1, 23, 59, 59).unwrap();

        let mut task = Task::new("Buy milk", now);
        task.due_date = Some(now + Duration::days(1));
        task.ignored_count = 3;
        let id = task.id;
        store.save(task).await.unwrap();

        let handler = TaskRescheduleUndoHandler::new(store.clone());
        let inverse = json!({
            "task_id": id.to_string(),
            "old_due_date": old_due.to_rfc3339(),
            "old_due_fuzzy": "today",
            "ignored_count": 2,
        });
        assert!(handler.undo(&inverse).await);

        let restored = store.get(id).await.unwrap();
        assert_eq!(restored.due_date, Some(old_due));
        assert_eq!(restored.due_fuzzy, Some("today".to_string()));
        assert_eq!(restored.ignored_count, 2);
    }

    #[tokio::test]
    async fn test_task_reschedule_undo_restores_none_due() {
        let store = Arc::new(InMemoryTaskStore::new());
        let now = fixed_now();
        let mut task = Task::new("Buy milk", now);
        task.due_date = Some(now + Duration::days(1));
        let id = task.id;
        store.save(task).await.unwrap();

        let handler = TaskRescheduleUndoHandler::new(store.clone());
        let inverse = json!({
            "task_id": id.to_string(),
            "old_due_date": null,
            "old_due_fuzzy": null,
            "ignored_count": 0,
        });
        assert!(handler.undo(&inverse).await);

        let restored = store.get(id).await.unwrap();
        assert!(restored.due_date.is_none());
        assert!(restored.due_fuzzy.is_none());
    }

    // =====================================================================
    // Sweeper
    // =====================================================================

    #[tokio::test]
    async fn test_sweeper_shutdown() {
        let ledger = Arc::new(UndoLedger::new(30));
        let sweeper = Sweeper::new(ledger, 60);
        sweeper.shutdown();
        tokio::time::timeout(std::time::Duration::from_secs(2), sweeper.run())
            .await
            .expect("Sweeper should shut down within timeout");
    }

    #[tokio::test]
    async fn test_sweeper_from_config_shutdown() {
        let config = UndoConfig {
            window_seconds: 30,
            sweep_interval_seconds: 60,
        };
        let ledger = Arc::new(UndoLedger::from_config(&config));
        let sweeper = Sweeper::from_config(ledger, &config);
        sweeper.shutdown();
        tokio::time::timeout(std::time::Duration::from_secs(2), sweeper.run())
            .await
            .expect("Sweeper should shut down within timeout");
    }

    #[test]
    fn test_action_type_display() {
        assert_eq!(UndoActionType::TaskCreate.to_string(), "task_create");
        assert_eq!(UndoActionType::BulkReschedule.to_string(), "bulk_reschedule");
    }

    #[test]
    fn test_reschedule_inverse_payload() {
        let now = fixed_now();
        let mut task = Task::new("Buy milk", now);
        task.due_fuzzy = Some("today".to_string());
        let inverse = reschedule_inverse(&task, 2);
        assert_eq!(inverse["task_id"], task.id.to_string());
        assert_eq!(inverse["old_due_fuzzy"], "today");
        assert_eq!(inverse["ignored_count"], 2);
        assert!(inverse["old_due_date"].is_null());
    }
}
