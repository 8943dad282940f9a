//! Structured task extraction.
//!
//! Turns a raw message into a [`TaskDraft`]: clean title, life domain, task
//! type, due date, requester, and tags. Pure text rules; relative dates are
//! resolved against an explicit `now` so extraction stays deterministic.

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;

use tiller_core::{end_of_day, end_of_day_in, Task, TaskDomain, TaskType};

use crate::classifier::{ActionKind, IntentResult};

/// Structured fields extracted from one message, ready to become a [`Task`].
#[derive(Debug, Clone, Serialize)]
pub struct TaskDraft {
    pub title: String,
    pub description: String,
    pub domain: TaskDomain,
    pub task_type: TaskType,
    pub due_date: Option<DateTime<Utc>>,
    pub due_fuzzy: Option<String>,
    pub requested_by: Option<String>,
    pub tags: Vec<String>,
}

impl TaskDraft {
    /// Materialize the draft into a task anchored at `now`.
    pub fn build(self, now: DateTime<Utc>) -> Task {
        let mut task = Task::new(self.title, now);
        task.description = Some(self.description);
        task.domain = self.domain;
        task.task_type = self.task_type;
        task.due_date = self.due_date;
        task.due_fuzzy = self.due_fuzzy;
        task.requested_by = self.requested_by;
        task.tags = self.tags;
        task
    }
}

struct ExtractionTables {
    title_prefixes: Vec<Regex>,
    time_markers: Vec<Regex>,
    due_today: Regex,
    due_tomorrow: Regex,
    due_day_after: Regex,
    due_in_days: Regex,
    due_next_week: Regex,
    fuzzy: Vec<(Regex, &'static str)>,
    requesters: Vec<(Regex, &'static str)>,
    domain_keywords: Vec<(TaskDomain, Vec<Regex>)>,
    tag_clusters: Vec<(&'static str, Vec<&'static str>)>,
}

fn tables() -> &'static ExtractionTables {
    static TABLES: OnceLock<ExtractionTables> = OnceLock::new();
    TABLES.get_or_init(build_tables)
}

fn compile(pat: &str) -> Regex {
    Regex::new(pat).expect("Invalid extraction regex")
}

fn build_tables() -> ExtractionTables {
    let title_prefixes = vec![
        compile(r"(?i)^(?:i need to|i have to|i must|i should|i gotta)\s+"),
        compile(r"(?i)^(?:remind me to|remember to|don'?t forget to)\s+"),
        compile(r"(?i)^(?:create a|add a|make a)\s+(?:task|reminder)\s+(?:to|for)?\s*"),
        compile(r"(?i)^(?:set a reminder to|set up a reminder for)\s*"),
        compile(
            r"(?i)^(?:my\s+)?(?:mother|mom|mum|father|dad|boss|professor)\s+(?:asked|told|wants)\s+(?:me\s+)?(?:to)?\s*",
        ),
    ];

    let time_markers = vec![
        compile(r"(?i)\s+by\s+(?:tomorrow|today|tonight|next|the end of)"),
        compile(r"(?i)\s+before\s+"),
        compile(r"(?i)\s+in\s+\d+\s+(?:days?|hours?|minutes?)"),
        compile(r"(?i)\s+this\s+(?:week|month|morning|afternoon|evening)"),
        compile(r"(?i)\s+on\s+(?:monday|tuesday|wednesday|thursday|friday|saturday|sunday)"),
    ];

    let fuzzy = vec![
        (compile(r"(?i)\bsoon\b"), "soon"),
        (compile(r"(?i)\bsometime\b"), "sometime"),
        (compile(r"(?i)\beventually\b"), "eventually"),
        (compile(r"(?i)\blater\b"), "later"),
        (compile(r"(?i)\bthis week\b"), "this week"),
        (compile(r"(?i)\bnext week\b"), "next week"),
        (compile(r"(?i)\bthis month\b"), "this month"),
    ];

    let requesters = vec![
        (compile(r"(?i)\b(?:mother|mom|mum|ma)\b"), "mother"),
        (compile(r"(?i)\b(?:father|dad|papa)\b"), "father"),
        (compile(r"(?i)\b(?:boss|manager|supervisor)\b"), "boss"),
        (compile(r"(?i)\b(?:professor|teacher|instructor)\b"), "professor"),
        (compile(r"(?i)\b(?:friend|colleague|peer)\b"), "friend"),
        (compile(r"(?i)\b(?:client|customer)\b"), "client"),
    ];

    let domain_words: Vec<(TaskDomain, Vec<&str>)> = vec![
        (
            TaskDomain::Household,
            vec![
                "mother", "father", "mom", "dad", "home", "house", "kitchen", "clean", "wash",
                "cylinder", "gas", "electricity", "water", "repair", "family", "parents",
                "groceries", "cooking", "laundry", "dishes", "room", "bed", "garden",
                "maintenance",
            ],
        ),
        (
            TaskDomain::Personal,
            vec![
                "hair", "doctor", "gym", "health", "appointment", "personal", "myself",
                "grooming", "exercise", "sleep", "dentist", "checkup", "workout", "run", "jog",
                "meditation", "therapy", "hospital",
            ],
        ),
        (
            TaskDomain::College,
            vec![
                "assignment", "assn", "exam", "test", "lecture", "class", "study", "college",
                "university", "course", "grade", "submit", "quiz", "homework", "professor",
                "teacher", "deadline", "semester", "credit", "gpa", "thesis",
            ],
        ),
        (
            TaskDomain::Project,
            vec![
                "project", "deliverable", "milestone", "client", "stakeholder", "presentation",
                "demo", "prototype", "deployment", "release", "feature", "bug", "issue",
                "ticket", "sprint",
            ],
        ),
        (
            TaskDomain::Finance,
            vec![
                "pay", "bill", "rent", "money", "bank", "loan", "emi", "salary", "expense",
                "budget", "insurance", "tax", "investment", "payment", "due", "fee", "charge",
                "transfer", "withdraw",
            ],
        ),
        (
            TaskDomain::Errands,
            vec![
                "buy", "shop", "purchase", "get", "pick up", "drop", "market", "store", "mall",
                "grocery", "pharmacy", "stationery", "deliver", "collect", "fetch", "bring",
            ],
        ),
    ];
    let domain_keywords = domain_words
        .into_iter()
        .map(|(domain, words)| {
            let regexes = words
                .iter()
                .map(|w| compile(&format!(r"(?i)\b{}\b", regex::escape(w))))
                .collect();
            (domain, regexes)
        })
        .collect();

    let tag_clusters = vec![
        ("urgent", vec!["urgent", "asap", "critical", "important", "priority"]),
        ("recurring", vec!["every", "daily", "weekly", "monthly", "regular"]),
        ("waiting", vec!["waiting", "pending", "blocked", "on hold"]),
        (
            "high-effort",
            vec!["big", "large", "complex", "difficult", "challenging"],
        ),
        (
            "quick",
            vec!["quick", "small", "easy", "simple", "fast", "5 min", "10 min"],
        ),
    ];

    ExtractionTables {
        title_prefixes,
        time_markers,
        due_today: compile(r"(?i)\btoday\b"),
        due_tomorrow: compile(r"(?i)\btomorrow\b"),
        due_day_after: compile(r"(?i)\bday after tomorrow\b"),
        due_in_days: compile(r"(?i)\bin\s+(\d+)\s+days?\b"),
        due_next_week: compile(r"(?i)\bnext week\b"),
        fuzzy,
        requesters,
        domain_keywords,
        tag_clusters,
    }
}

/// Extract a clean, capitalized title from the raw message.
///
/// Strips obligation and command prefixes, truncates at the first time
/// marker, and caps the length at 100 characters.
pub fn extract_title(message: &str) -> String {
    let t = tables();
    let mut title = message.to_string();

    for prefix in &t.title_prefixes {
        title = prefix.replace(&title, "").into_owned();
    }

    for marker in &t.time_markers {
        if let Some(m) = marker.find(&title) {
            title.truncate(m.start());
            title = title.trim().to_string();
        }
    }

    let mut title = title
        .trim()
        .trim_end_matches([',', '.', '!', '?', ';'])
        .to_string();

    let mut chars = title.chars();
    if let Some(first) = chars.next() {
        title = first.to_uppercase().collect::<String>() + chars.as_str();
    }

    if title.chars().count() > 100 {
        title = title.chars().take(97).collect::<String>() + "...";
    }

    if title.is_empty() {
        "Untitled Task".to_string()
    } else {
        title
    }
}

/// Resolve a relative due date against `now`, normalized to end of day.
///
/// "tomorrow" is checked before "day after tomorrow", so the longer phrase
/// resolves one day out. Returns `None` when no absolute date is found.
pub fn resolve_due_date(text: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let t = tables();

    if t.due_today.is_match(text) {
        return Some(end_of_day(now));
    }
    if t.due_tomorrow.is_match(text) {
        return Some(end_of_day_in(now, 1));
    }
    if t.due_day_after.is_match(text) {
        return Some(end_of_day_in(now, 2));
    }
    if let Some(caps) = t.due_in_days.captures(text) {
        if let Ok(days) = caps[1].parse::<i64>() {
            return Some(end_of_day_in(now, days));
        }
    }
    if t.due_next_week.is_match(text) {
        return Some(end_of_day_in(now, 7));
    }
    None
}

/// First matching fuzzy time label, in fixed table order.
pub fn resolve_fuzzy_time(text: &str) -> Option<String> {
    tables()
        .fuzzy
        .iter()
        .find(|(regex, _)| regex.is_match(text))
        .map(|(_, label)| label.to_string())
}

/// Resolves full task drafts from messages.
pub struct TaskExtractor;

impl Default for TaskExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Build a task draft from a message and its classification.
    pub fn extract(&self, message: &str, intent: &IntentResult, now: DateTime<Utc>) -> TaskDraft {
        let text = message.to_lowercase();
        let due_date = resolve_due_date(&text, now);
        // A fuzzy label only stands in when no concrete date resolved.
        let due_fuzzy = if due_date.is_none() {
            resolve_fuzzy_time(&text)
        } else {
            None
        };
        TaskDraft {
            title: extract_title(message),
            description: message.to_string(),
            domain: resolve_domain(&text),
            task_type: resolve_task_type(&text, intent.action_kind),
            due_date,
            due_fuzzy,
            requested_by: resolve_requester(&text),
            tags: resolve_tags(&text),
        }
    }
}

/// Most likely life domain by keyword hit count.
///
/// Ties break by the fixed priority order in
/// [`TaskDomain::PRIORITY_ORDER`]; no hits at all resolve to `Other`.
pub fn resolve_domain(text: &str) -> TaskDomain {
    let t = tables();
    let mut best = TaskDomain::Other;
    let mut best_count = 0usize;

    for domain in TaskDomain::PRIORITY_ORDER {
        let count: usize = t
            .domain_keywords
            .iter()
            .find(|(d, _)| *d == domain)
            .map(|(_, regexes)| regexes.iter().map(|r| r.find_iter(text).count()).sum())
            .unwrap_or(0);
        if count > best_count {
            best_count = count;
            best = domain;
        }
    }

    best
}

/// Resolve the task type from wording, with the classifier's action kind as
/// the strongest signal.
pub fn resolve_task_type(text: &str, kind: ActionKind) -> TaskType {
    if kind == ActionKind::Reminder {
        return TaskType::Reminder;
    }
    if ["remind", "reminder", "ping me", "notify me"]
        .iter()
        .any(|w| text.contains(w))
    {
        return TaskType::Reminder;
    }
    if ["maybe", "might", "possibly", "consider", "think about"]
        .iter()
        .any(|w| text.contains(w))
    {
        return TaskType::SoftTask;
    }
    if ["waiting for", "need to decide", "not sure", "later", "eventually"]
        .iter()
        .any(|w| text.contains(w))
    {
        return TaskType::OpenLoop;
    }
    if ["every", "daily", "weekly", "monthly", "each"]
        .iter()
        .any(|w| text.contains(w))
    {
        return TaskType::Reminder;
    }
    TaskType::Task
}

/// Who asked for this, when the message names them.
pub fn resolve_requester(text: &str) -> Option<String> {
    tables()
        .requesters
        .iter()
        .find(|(regex, _)| regex.is_match(text))
        .map(|(_, who)| who.to_string())
}

/// Tag clusters hit by the message, in fixed cluster order.
pub fn resolve_tags(text: &str) -> Vec<String> {
    tables()
        .tag_clusters
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|k| text.contains(k)))
        .map(|(tag, _)| tag.to_string())
        .collect()
}
