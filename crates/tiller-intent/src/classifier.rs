//! Multi-signal intent classification.
//!
//! Scores a message against the pattern tables, combines the per-table
//! strengths with fixed weights, and pushes the sum through a sigmoid to get
//! a confidence in 0..=1. Bucket selection then applies a small decision
//! ladder over the confidence and the individual signals.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::extractor;
use crate::patterns::PatternLibrary;

/// Classification bucket for a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentBucket {
    /// Plain chat, no action wanted.
    Conversational,
    /// Clear task or reminder.
    Actionable,
    /// Might be actionable, needs the user to confirm.
    Ambiguous,
    /// The user explicitly asked for a task or reminder.
    ExplicitCommand,
}

impl fmt::Display for IntentBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntentBucket::Conversational => write!(f, "conversational"),
            IntentBucket::Actionable => write!(f, "actionable"),
            IntentBucket::Ambiguous => write!(f, "ambiguous"),
            IntentBucket::ExplicitCommand => write!(f, "explicit_command"),
        }
    }
}

/// Kind of action a message suggests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    None,
    Task,
    Reminder,
    Event,
    Deadline,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionKind::None => write!(f, "none"),
            ActionKind::Task => write!(f, "task"),
            ActionKind::Reminder => write!(f, "reminder"),
            ActionKind::Event => write!(f, "event"),
            ActionKind::Deadline => write!(f, "deadline"),
        }
    }
}

/// Fields pulled from the message alongside classification.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractedFields {
    pub title: String,
    pub due_date: Option<DateTime<Utc>>,
    pub due_fuzzy: Option<String>,
    pub action_kind: ActionKind,
}

/// Outcome of classifying one message.
#[derive(Debug, Clone, Serialize)]
pub struct IntentResult {
    pub bucket: IntentBucket,
    pub confidence: f64,
    pub action_kind: ActionKind,
    /// Per-signal breakdown, keyed by signal name.
    pub scores: HashMap<String, f64>,
    pub extracted: ExtractedFields,
    pub reasoning: String,
}

/// Fixed weight applied to each signal when summing. Signals without a
/// weight contribute nothing to the confidence but still appear in the
/// breakdown.
fn weight_for(key: &str) -> f64 {
    match key {
        "future_time" => 0.40,
        "obligation_verb" => 0.30,
        "market_pattern" => 0.35,
        "action_verb" => 0.20,
        "reminder_keyword" => 0.15,
        "first_person" => 0.10,
        "informational_verb" => -0.50,
        "code_request" => -0.40,
        "question_pattern" => -0.30,
        "greeting" => -0.20,
        _ => 0.0,
    }
}

/// Sigmoid over the weighted sum, steepened so the buckets separate cleanly
/// around the decision boundary.
fn normalize(score: f64) -> f64 {
    let normalized = 1.0 / (1.0 + (-score * 3.0).exp());
    normalized.clamp(0.0, 1.0)
}

/// Deterministic rule-based intent classifier. No model calls.
pub struct IntentClassifier {
    patterns: PatternLibrary,
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl IntentClassifier {
    pub fn new() -> Self {
        Self {
            patterns: PatternLibrary::new(),
        }
    }

    /// Classify a message, resolving relative dates against the wall clock.
    pub fn classify(&self, message: &str) -> IntentResult {
        self.classify_at(message, Utc::now())
    }

    /// Classify a message, resolving relative dates against `now`.
    ///
    /// Same message and same `now` always produce the same result.
    pub fn classify_at(&self, message: &str, now: DateTime<Utc>) -> IntentResult {
        let text = message.to_lowercase();
        let text = text.trim();

        // Explicit commands short-circuit the scoring pipeline.
        if let Some((matched, kind)) = self.patterns.explicit_command(text) {
            let reasoning = format!("Explicit command detected: '{}'", matched);
            let mut scores = HashMap::new();
            scores.insert("explicit_command".to_string(), 1.0);
            let extracted = self.extract_fields(message, text, kind, now);
            debug!(bucket = "explicit_command", "Classified message");
            return IntentResult {
                bucket: IntentBucket::ExplicitCommand,
                confidence: 1.0,
                action_kind: kind,
                scores,
                extracted,
                reasoning,
            };
        }

        let mut scores = HashMap::new();
        scores.insert(
            "future_time".to_string(),
            PatternLibrary::max_strength(&self.patterns.temporal, text),
        );
        scores.insert(
            "obligation_verb".to_string(),
            PatternLibrary::max_strength(&self.patterns.obligation, text),
        );
        let (verb_strength, detected_kind) = self.patterns.best_action_verb(text);
        scores.insert("action_verb".to_string(), verb_strength);
        scores.insert(
            "reminder_keyword".to_string(),
            PatternLibrary::max_strength(&self.patterns.reminder, text),
        );
        scores.insert(
            "first_person".to_string(),
            PatternLibrary::max_strength(&self.patterns.first_person, text),
        );

        // Market patterns only enter the breakdown when they fire.
        let market = PatternLibrary::max_strength(&self.patterns.market, text);
        if market > 0.0 {
            scores.insert("market_pattern".to_string(), market);
        }

        scores.insert(
            "informational_verb".to_string(),
            PatternLibrary::max_strength(&self.patterns.informational, text),
        );
        scores.insert(
            "code_request".to_string(),
            PatternLibrary::max_strength(&self.patterns.code_request, text),
        );
        scores.insert(
            "question_pattern".to_string(),
            PatternLibrary::max_strength(&self.patterns.question, text),
        );
        scores.insert(
            "greeting".to_string(),
            PatternLibrary::max_strength(&self.patterns.greeting, text),
        );
        scores.insert(
            "completion_report".to_string(),
            PatternLibrary::max_strength(&self.patterns.completion, text),
        );

        let total: f64 = scores
            .iter()
            .map(|(key, value)| weight_for(key) * value)
            .sum();
        let confidence = normalize(total);

        let bucket = determine_bucket(confidence, &scores);
        let action_kind = self.determine_action_kind(detected_kind, &scores, text);
        let extracted = self.extract_fields(message, text, action_kind, now);
        let reasoning = build_reasoning(confidence, &scores);

        debug!(bucket = %bucket, confidence, "Classified message");

        IntentResult {
            bucket,
            confidence,
            action_kind,
            scores,
            extracted,
            reasoning,
        }
    }

    fn determine_action_kind(
        &self,
        detected: ActionKind,
        scores: &HashMap<String, f64>,
        text: &str,
    ) -> ActionKind {
        if scores.get("reminder_keyword").copied().unwrap_or(0.0) > 0.5 {
            return ActionKind::Reminder;
        }
        if self.patterns.event_words.is_match(text)
            && scores.get("future_time").copied().unwrap_or(0.0) > 0.5
        {
            return ActionKind::Event;
        }
        if self.patterns.deadline_words.is_match(text) {
            return ActionKind::Deadline;
        }
        if detected != ActionKind::None {
            return detected;
        }
        ActionKind::Task
    }

    fn extract_fields(
        &self,
        message: &str,
        text_lower: &str,
        action_kind: ActionKind,
        now: DateTime<Utc>,
    ) -> ExtractedFields {
        let due_date = extractor::resolve_due_date(text_lower, now);
        // A fuzzy label only stands in when no concrete date resolved.
        let due_fuzzy = if due_date.is_none() {
            extractor::resolve_fuzzy_time(text_lower)
        } else {
            None
        };
        ExtractedFields {
            title: extractor::extract_title(message),
            due_date,
            due_fuzzy,
            action_kind,
        }
    }
}

fn determine_bucket(confidence: f64, scores: &HashMap<String, f64>) -> IntentBucket {
    let get = |key: &str| scores.get(key).copied().unwrap_or(0.0);

    let anti = get("informational_verb") * 0.5
        + get("code_request") * 0.4
        + get("question_pattern") * 0.3
        + get("greeting") * 0.2;

    let positive = get("future_time") * 0.4
        + get("obligation_verb") * 0.3
        + get("action_verb") * 0.2
        + get("reminder_keyword") * 0.15;

    // Strong anti-signals override confidence entirely.
    if anti > 0.4 {
        return IntentBucket::Conversational;
    }
    if confidence <= 0.35 {
        return IntentBucket::Conversational;
    }
    if confidence >= 0.75 && positive > 0.5 {
        return IntentBucket::Actionable;
    }
    if confidence >= 0.70 && get("reminder_keyword") > 0.5 {
        return IntentBucket::Actionable;
    }
    // Shopping and errands are clear tasks even without obligation wording.
    if confidence >= 0.80 && get("market_pattern") >= 0.9 {
        return IntentBucket::Actionable;
    }
    if confidence < 0.60 && positive < 0.3 {
        return IntentBucket::Conversational;
    }
    IntentBucket::Ambiguous
}

fn build_reasoning(confidence: f64, scores: &HashMap<String, f64>) -> String {
    let get = |key: &str| scores.get(key).copied().unwrap_or(0.0);
    let mut reasons = Vec::new();

    if get("future_time") > 0.5 {
        reasons.push("future time reference");
    }
    if get("obligation_verb") > 0.5 {
        reasons.push("obligation verb");
    }
    if get("action_verb") > 0.5 {
        reasons.push("action verb");
    }
    if get("reminder_keyword") > 0.5 {
        reasons.push("reminder keyword");
    }
    if get("informational_verb") > 0.5 {
        reasons.push("informational request");
    }
    if get("code_request") > 0.5 {
        reasons.push("code request");
    }
    if get("question_pattern") > 0.5 {
        reasons.push("question pattern");
    }

    if reasons.is_empty() {
        format!("No strong signals detected (confidence: {:.2})", confidence)
    } else {
        format!(
            "Detected: {} (confidence: {:.2})",
            reasons.join(", "),
            confidence
        )
    }
}
