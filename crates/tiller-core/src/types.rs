//! Core domain types for task tracking.
//!
//! Defines the task model and its supporting enumerations.

use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// =============================================================================
// Enums
// =============================================================================

/// Life domain a task belongs to, resolved from keyword signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskDomain {
    Household,
    Personal,
    College,
    Project,
    Finance,
    Errands,
    Other,
}

impl TaskDomain {
    /// Fixed priority order used to break ties when several domains score
    /// equally. Earlier entries win.
    pub const PRIORITY_ORDER: [TaskDomain; 6] = [
        TaskDomain::Household,
        TaskDomain::Personal,
        TaskDomain::College,
        TaskDomain::Project,
        TaskDomain::Finance,
        TaskDomain::Errands,
    ];
}

impl fmt::Display for TaskDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskDomain::Household => write!(f, "household"),
            TaskDomain::Personal => write!(f, "personal"),
            TaskDomain::College => write!(f, "college"),
            TaskDomain::Project => write!(f, "project"),
            TaskDomain::Finance => write!(f, "finance"),
            TaskDomain::Errands => write!(f, "errands"),
            TaskDomain::Other => write!(f, "other"),
        }
    }
}

impl std::str::FromStr for TaskDomain {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "household" => Ok(TaskDomain::Household),
            "personal" => Ok(TaskDomain::Personal),
            "college" => Ok(TaskDomain::College),
            "project" => Ok(TaskDomain::Project),
            "finance" => Ok(TaskDomain::Finance),
            "errands" => Ok(TaskDomain::Errands),
            "other" => Ok(TaskDomain::Other),
            _ => Err(format!("Unknown task domain: {}", s)),
        }
    }
}

/// Kind of tracked item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Task,
    Reminder,
    SoftTask,
    OpenLoop,
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskType::Task => write!(f, "task"),
            TaskType::Reminder => write!(f, "reminder"),
            TaskType::SoftTask => write!(f, "soft_task"),
            TaskType::OpenLoop => write!(f, "open_loop"),
        }
    }
}

impl std::str::FromStr for TaskType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "task" => Ok(TaskType::Task),
            "reminder" => Ok(TaskType::Reminder),
            "soft_task" => Ok(TaskType::SoftTask),
            "open_loop" => Ok(TaskType::OpenLoop),
            _ => Err(format!("Unknown task type: {}", s)),
        }
    }
}

/// Ordinal urgency level derived from the continuous urgency score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrgencyLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl UrgencyLevel {
    /// Numeric weight used when ranking tasks against each other.
    pub fn as_score(&self) -> f64 {
        match self {
            UrgencyLevel::Critical => 1.0,
            UrgencyLevel::High => 0.75,
            UrgencyLevel::Medium => 0.5,
            UrgencyLevel::Low => 0.25,
        }
    }
}

impl fmt::Display for UrgencyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UrgencyLevel::Low => write!(f, "low"),
            UrgencyLevel::Medium => write!(f, "medium"),
            UrgencyLevel::High => write!(f, "high"),
            UrgencyLevel::Critical => write!(f, "critical"),
        }
    }
}

impl std::str::FromStr for UrgencyLevel {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(UrgencyLevel::Low),
            "medium" => Ok(UrgencyLevel::Medium),
            "high" => Ok(UrgencyLevel::High),
            "critical" => Ok(UrgencyLevel::Critical),
            _ => Err(format!("Unknown urgency level: {}", s)),
        }
    }
}

// =============================================================================
// Domain Structs
// =============================================================================

/// A tracked task with time-awareness and postponement history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub task_type: TaskType,
    pub domain: TaskDomain,

    /// Absolute due moment; always 23:59:59 of the resolved day.
    pub due_date: Option<DateTime<Utc>>,
    /// Fuzzy due label ("soon", "eventually") when no absolute date resolved.
    pub due_fuzzy: Option<String>,
    /// Estimated effort in minutes.
    pub estimated_effort: Option<u32>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,

    pub urgency: UrgencyLevel,

    pub requested_by: Option<String>,
    /// Ids of tasks this one blocks.
    pub blocking_tasks: Vec<Uuid>,

    pub completed: bool,
    /// How many times the user has postponed this task.
    pub ignored_count: u32,
    pub last_ignored_at: Option<DateTime<Utc>>,

    pub tags: Vec<String>,
    pub source_message_id: Option<Uuid>,
}

impl Task {
    /// Create a task with sensible defaults, anchored at `now`.
    pub fn new(title: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            description: None,
            task_type: TaskType::Task,
            domain: TaskDomain::Other,
            due_date: None,
            due_fuzzy: None,
            estimated_effort: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
            urgency: UrgencyLevel::Medium,
            requested_by: None,
            blocking_tasks: Vec::new(),
            completed: false,
            ignored_count: 0,
            last_ignored_at: None,
            tags: Vec::new(),
            source_message_id: None,
        }
    }
}

// =============================================================================
// Time helpers
// =============================================================================

/// Normalize a moment to 23:59:59 of its calendar day (UTC).
///
/// Every resolved due date in the system goes through this, so "tomorrow"
/// always means end of the next day rather than 24 hours from now.
pub fn end_of_day(moment: DateTime<Utc>) -> DateTime<Utc> {
    let eod = NaiveTime::from_hms_opt(23, 59, 59).expect("valid wall-clock time");
    moment.date_naive().and_time(eod).and_utc()
}

/// End of the day `days` days after `now`.
pub fn end_of_day_in(now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    end_of_day(now + Duration::days(days))
}
