//! Chat router: turns each incoming message into a reply and, when the
//! message is actionable, a stored task with an undo token.
//!
//! Routing order mirrors how specific the user's signal is: explicit
//! `@task` / `@reminder` / `@event` tags first, then reschedule phrases,
//! then the intent classifier, and finally free-form conversation through
//! the text-generation seam.

use std::sync::Arc;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use tiller_core::{ChatConfig, Task, TaskType, TillerConfig};
use tiller_engine::reschedule::{self, RescheduleRequest};
use tiller_engine::{
    RescheduleEngine, TaskCompleteUndoHandler, TaskCreateUndoHandler, TaskRescheduleUndoHandler,
    TaskStore, UndoActionType, UndoLedger, UrgencyEngine,
};
use tiller_intent::{ActionKind, IntentBucket, IntentClassifier, IntentResult, TaskExtractor};

use crate::error::ChatError;
use crate::llm::{ChatMessage, TextGenerator};

/// How the reply should be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyKind {
    /// Plain conversational text.
    Text,
    /// A task was created; the reply confirms it.
    TaskCreated,
    /// Something was changed and can be undone via the token.
    UndoableAction,
    /// The router is unsure and proposes an action for confirmation.
    Suggestion,
}

/// Action proposed for an ambiguous message.
#[derive(Debug, Clone, Serialize)]
pub struct SuggestedAction {
    pub kind: ActionKind,
    pub title: String,
    pub due_date: Option<DateTime<Utc>>,
    pub due_fuzzy: Option<String>,
    pub confidence: f64,
}

/// The router's answer to one message.
#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub text: String,
    pub kind: ReplyKind,
    pub task_id: Option<Uuid>,
    pub undo_token: Option<String>,
    pub suggested: Option<SuggestedAction>,
}

impl ChatReply {
    fn text_only(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: ReplyKind::Text,
            task_id: None,
            undo_token: None,
            suggested: None,
        }
    }
}

struct TagPatterns {
    find: Regex,
    strip: Regex,
    collapse: Regex,
}

fn tag_patterns() -> &'static TagPatterns {
    static PATTERNS: OnceLock<TagPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| TagPatterns {
        find: Regex::new(r"@(\w+)").expect("Invalid tag regex"),
        strip: Regex::new(r"@\w+").expect("Invalid tag strip regex"),
        collapse: Regex::new(r"\s+").expect("Invalid whitespace regex"),
    })
}

/// Split a message into its cleaned text and the explicit `@tags` it carried.
pub fn extract_explicit_tags(message: &str) -> (String, Vec<String>) {
    let pats = tag_patterns();
    let tags = pats
        .find
        .captures_iter(&message.to_lowercase())
        .map(|c| c[1].to_string())
        .collect();
    let clean = pats.strip.replace_all(message, "");
    let clean = pats.collapse.replace_all(clean.trim(), " ");
    (clean.trim().to_string(), tags)
}

/// Central chat entry point wiring classifier, extractor, reschedule engine,
/// and undo ledger.
pub struct ChatRouter {
    classifier: IntentClassifier,
    extractor: TaskExtractor,
    urgency: UrgencyEngine,
    reschedule: RescheduleEngine,
    store: Arc<dyn TaskStore>,
    ledger: Arc<UndoLedger>,
    generator: Option<Arc<dyn TextGenerator>>,
    config: ChatConfig,
}

impl ChatRouter {
    /// Build a router over the given store and ledger, registering the
    /// task undo handlers.
    pub fn new(store: Arc<dyn TaskStore>, ledger: Arc<UndoLedger>, config: ChatConfig) -> Self {
        ledger.register_handler(
            UndoActionType::TaskCreate,
            Arc::new(TaskCreateUndoHandler::new(store.clone())),
        );
        ledger.register_handler(
            UndoActionType::TaskReschedule,
            Arc::new(TaskRescheduleUndoHandler::new(store.clone())),
        );
        ledger.register_handler(
            UndoActionType::TaskComplete,
            Arc::new(TaskCompleteUndoHandler::new(store.clone())),
        );

        Self {
            classifier: IntentClassifier::new(),
            extractor: TaskExtractor::new(),
            urgency: UrgencyEngine,
            reschedule: RescheduleEngine::new(store.clone(), ledger.clone()),
            store,
            ledger,
            generator: None,
            config,
        }
    }

    /// Build a router over the given store, with the undo ledger sized from
    /// the config's undo section.
    pub fn from_config(store: Arc<dyn TaskStore>, config: &TillerConfig) -> Self {
        let ledger = Arc::new(UndoLedger::from_config(&config.undo));
        Self::new(store, ledger, config.chat.clone())
    }

    /// The undo ledger backing this router.
    pub fn ledger(&self) -> Arc<UndoLedger> {
        self.ledger.clone()
    }

    /// Attach a text-generation backend for conversational replies.
    pub fn with_generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Handle one message, anchoring all date resolution at `now`.
    ///
    /// `context_task_id` is the task the conversation was last about, used
    /// to resolve deictic reschedule phrases ("do that next week").
    pub async fn handle_message_at(
        &self,
        message: &str,
        context_task_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<ChatReply, ChatError> {
        if !self.config.enabled {
            return Err(ChatError::Disabled);
        }
        if message.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if message.len() > self.config.max_message_length {
            return Err(ChatError::MessageTooLong(self.config.max_message_length));
        }

        let (clean, tags) = extract_explicit_tags(message);

        if let Some(tag) = tags
            .iter()
            .find(|t| matches!(t.as_str(), "task" | "reminder" | "event"))
        {
            return self.handle_explicit_tag(tag, &clean, now).await;
        }

        if let Some(request) = reschedule::parse_intent(&clean) {
            if let Some(reply) = self.handle_reschedule(request, context_task_id, now).await? {
                return Ok(reply);
            }
        }

        let intent = self.classifier.classify_at(&clean, now);
        info!(
            bucket = %intent.bucket,
            confidence = intent.confidence,
            "Classified message"
        );

        match intent.bucket {
            IntentBucket::ExplicitCommand => self.handle_explicit_command(&clean, &intent, now).await,
            IntentBucket::Actionable => self.handle_actionable(&clean, &intent, now).await,
            IntentBucket::Ambiguous => Ok(self.handle_ambiguous(&intent)),
            IntentBucket::Conversational => Ok(self.conversational_reply(message).await),
        }
    }

    /// Handle one message against the wall clock.
    pub async fn handle_message(
        &self,
        message: &str,
        context_task_id: Option<Uuid>,
    ) -> Result<ChatReply, ChatError> {
        self.handle_message_at(message, context_task_id, Utc::now())
            .await
    }

    // -- Routing branches --

    async fn handle_explicit_tag(
        &self,
        tag: &str,
        clean: &str,
        now: DateTime<Utc>,
    ) -> Result<ChatReply, ChatError> {
        let intent = self.classifier.classify_at(clean, now);
        let mut task = self.build_task(clean, &intent, now);
        if tag == "reminder" {
            task.task_type = TaskType::Reminder;
        }
        let (task, token) = self.persist_task(task, format!("Created {}", tag), now).await?;

        Ok(ChatReply {
            text: format!("✓ Created {}: **{}**", tag, task.title),
            kind: ReplyKind::TaskCreated,
            task_id: Some(task.id),
            undo_token: Some(token),
            suggested: None,
        })
    }

    async fn handle_reschedule(
        &self,
        request: RescheduleRequest,
        context_task_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<Option<ChatReply>, ChatError> {
        match request {
            RescheduleRequest::BulkToday(intent) => {
                let result = self.reschedule.reschedule_today_tasks_at(intent, now).await?;
                if !result.success {
                    return Ok(Some(ChatReply::text_only(result.message)));
                }
                Ok(Some(ChatReply {
                    text: format!("📅 {}", result.message),
                    kind: ReplyKind::UndoableAction,
                    task_id: None,
                    undo_token: result.undo_token,
                    suggested: None,
                }))
            }
            RescheduleRequest::Single { intent, reference } => {
                // An unresolvable reference falls through to classification
                let task = match self
                    .reschedule
                    .find_task_by_reference(&reference, context_task_id)
                    .await
                {
                    Ok(task) => task,
                    Err(e) => {
                        debug!("No task for reschedule reference '{}': {}", reference, e);
                        return Ok(None);
                    }
                };
                let result = self.reschedule.reschedule_task_at(task.id, intent, now).await?;
                Ok(Some(ChatReply {
                    text: format!("📅 {}. Undo?", result.message),
                    kind: ReplyKind::UndoableAction,
                    task_id: Some(result.task_id),
                    undo_token: Some(result.undo_token),
                    suggested: None,
                }))
            }
        }
    }

    async fn handle_explicit_command(
        &self,
        clean: &str,
        intent: &IntentResult,
        now: DateTime<Utc>,
    ) -> Result<ChatReply, ChatError> {
        let task = self.build_task(clean, intent, now);
        let (task, token) = self.persist_task(task, "Created task".to_string(), now).await?;

        Ok(ChatReply {
            text: format!("✓ Created {}: **{}**", intent.action_kind, task.title),
            kind: ReplyKind::TaskCreated,
            task_id: Some(task.id),
            undo_token: Some(token),
            suggested: None,
        })
    }

    async fn handle_actionable(
        &self,
        clean: &str,
        intent: &IntentResult,
        now: DateTime<Utc>,
    ) -> Result<ChatReply, ChatError> {
        let task = self.build_task(clean, intent, now);
        let description = format!("Added to {}", task.domain);
        let (task, token) = self.persist_task(task, description, now).await?;

        let due_info = if let Some(due) = task.due_date {
            format!(" (due: {})", due.format("%B %d, %Y"))
        } else if let Some(ref fuzzy) = task.due_fuzzy {
            format!(" (due: {})", fuzzy)
        } else {
            String::new()
        };

        Ok(ChatReply {
            text: format!("✓ Added to {}: **{}**{}", task.domain, task.title, due_info),
            kind: ReplyKind::TaskCreated,
            task_id: Some(task.id),
            undo_token: Some(token),
            suggested: None,
        })
    }

    fn handle_ambiguous(&self, intent: &IntentResult) -> ChatReply {
        let suggested = SuggestedAction {
            kind: intent.action_kind,
            title: intent.extracted.title.clone(),
            due_date: intent.extracted.due_date,
            due_fuzzy: intent.extracted.due_fuzzy.clone(),
            confidence: intent.confidence,
        };

        ChatReply {
            text: format!(
                "That sounds like something to track. Should I add '**{}**' as a {}?\n\n\
                 Reply with 'yes' to confirm.",
                suggested.title, suggested.kind
            ),
            kind: ReplyKind::Suggestion,
            task_id: None,
            undo_token: None,
            suggested: Some(suggested),
        }
    }

    async fn conversational_reply(&self, message: &str) -> ChatReply {
        let text = match &self.generator {
            Some(generator) => {
                let history = [ChatMessage::user(message)];
                match generator.generate(&history).await {
                    Ok(reply) => reply,
                    Err(e) => {
                        warn!("Text generation failed: {}", e);
                        self.config.fallback_reply.clone()
                    }
                }
            }
            None => self.config.fallback_reply.clone(),
        };
        ChatReply::text_only(text)
    }

    // -- Task creation --

    fn build_task(&self, clean: &str, intent: &IntentResult, now: DateTime<Utc>) -> Task {
        let draft = self.extractor.extract(clean, intent, now);
        let mut task = draft.build(now);
        task.urgency = self.urgency.compute_urgency_at(&task, now);
        task
    }

    /// Save the task and record an undoable creation, returning the task
    /// and its undo token.
    async fn persist_task(
        &self,
        task: Task,
        description_prefix: String,
        now: DateTime<Utc>,
    ) -> Result<(Task, String), ChatError> {
        self.store.save(task.clone()).await?;
        let record = self.ledger.record_action_at(
            UndoActionType::TaskCreate,
            format!("{}: {}", description_prefix, task.title),
            json!({ "task_id": task.id.to_string() }),
            Some(task.id.to_string()),
            None,
            now,
        );
        Ok((task, record.action_id))
    }
}
