//! Urgency computation for time-aware task prioritization.
//!
//! Urgency is a weighted blend of four factors: time proximity to the due
//! date (0.4), effort versus time available (0.2), how often the task has
//! been postponed (0.2), and how many other tasks it blocks (0.2). The
//! continuous score maps onto the four [`UrgencyLevel`] bands.

use chrono::{DateTime, Utc};

use tiller_core::{Task, UrgencyLevel};

/// Urgency detected from free text, with the keywords that drove it.
#[derive(Debug, Clone, PartialEq)]
pub struct UrgencyReading {
    pub level: UrgencyLevel,
    pub score: f64,
    pub keywords: Vec<String>,
}

const WEIGHT_TIME: f64 = 0.4;
const WEIGHT_EFFORT: f64 = 0.2;
const WEIGHT_IGNORED: f64 = 0.2;
const WEIGHT_BLOCKING: f64 = 0.2;

/// Computes task urgency and next-action recommendations.
pub struct UrgencyEngine;

impl Default for UrgencyEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl UrgencyEngine {
    pub fn new() -> Self {
        Self
    }

    /// Continuous urgency score in 0..=1 for a task, evaluated at `now`.
    pub fn urgency_score(&self, task: &Task, now: DateTime<Utc>) -> f64 {
        let mut score = 0.0;

        if let Some(due) = task.due_date {
            score += time_score(due, now) * WEIGHT_TIME;
        } else if let Some(fuzzy) = &task.due_fuzzy {
            score += fuzzy_time_score(fuzzy) * WEIGHT_TIME;
        }

        if let Some(effort) = task.estimated_effort {
            score += effort_score(effort, task.due_date, now) * WEIGHT_EFFORT;
        }

        if task.ignored_count > 0 {
            let ignored = (task.ignored_count as f64 / 5.0).min(1.0);
            score += ignored * WEIGHT_IGNORED;
        }

        if !task.blocking_tasks.is_empty() {
            let blocking = (task.blocking_tasks.len() as f64 / 3.0).min(1.0);
            score += blocking * WEIGHT_BLOCKING;
        }

        score
    }

    /// Urgency level for a task, evaluated at `now`.
    pub fn compute_urgency_at(&self, task: &Task, now: DateTime<Utc>) -> UrgencyLevel {
        score_to_level(self.urgency_score(task, now))
    }

    /// Urgency level for a task against the wall clock.
    pub fn compute_urgency(&self, task: &Task) -> UrgencyLevel {
        self.compute_urgency_at(task, Utc::now())
    }

    /// Recommend the best next task to work on.
    ///
    /// Ranks incomplete tasks by urgency, with a 0.2 bonus for tasks whose
    /// estimated effort fits in the available time. Strictly-greater
    /// comparison keeps the earliest task on score ties.
    pub fn next_action<'a>(
        &self,
        tasks: &'a [Task],
        time_available_minutes: u32,
    ) -> Option<&'a Task> {
        let mut best: Option<(&Task, f64)> = None;

        for task in tasks.iter().filter(|t| !t.completed) {
            let mut score = task.urgency.as_score();
            if let Some(effort) = task.estimated_effort {
                if effort <= time_available_minutes {
                    score += 0.2;
                }
            }
            match best {
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((task, score)),
            }
        }

        best.map(|(task, _)| task)
    }

    /// Detect urgency from free text by keyword.
    pub fn detect_urgency(&self, text: &str) -> UrgencyReading {
        let text_lower = text.to_lowercase();

        let keywords: [(&str, f64); 10] = [
            ("asap", 1.0),
            ("urgent", 0.9),
            ("critical", 0.9),
            ("immediately", 0.9),
            ("right now", 0.9),
            ("today", 0.85),
            ("tomorrow", 0.7),
            ("soon", 0.6),
            ("deadline", 0.8),
            ("due", 0.7),
        ];

        let mut max_score = 0.0f64;
        let mut found = Vec::new();
        for (keyword, score) in keywords {
            if text_lower.contains(keyword) {
                found.push(keyword.to_string());
                if score > max_score {
                    max_score = score;
                }
            }
        }

        let level = if max_score >= 0.8 {
            UrgencyLevel::Critical
        } else if max_score >= 0.6 {
            UrgencyLevel::High
        } else if max_score >= 0.4 {
            UrgencyLevel::Medium
        } else {
            UrgencyLevel::Low
        };

        UrgencyReading {
            level,
            score: max_score,
            keywords: found,
        }
    }
}

/// Time proximity ladder: overdue is maximal, then bands by hours remaining.
fn time_score(due: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let seconds = (due - now).num_seconds();
    if seconds < 0 {
        return 1.0;
    }
    let hours = seconds as f64 / 3600.0;
    if hours <= 24.0 {
        0.9
    } else if hours <= 48.0 {
        0.7
    } else if hours <= 168.0 {
        0.5
    } else if hours <= 336.0 {
        0.3
    } else {
        0.1
    }
}

/// Fixed urgency for fuzzy due labels; unknown labels score 0.3.
fn fuzzy_time_score(fuzzy: &str) -> f64 {
    match fuzzy.to_lowercase().as_str() {
        "asap" => 1.0,
        "urgent" => 0.9,
        "today" => 0.9,
        "tomorrow" => 0.7,
        "this week" => 0.5,
        "soon" => 0.4,
        "next week" => 0.3,
        "sometime" => 0.2,
        "later" => 0.1,
        "eventually" => 0.05,
        _ => 0.3,
    }
}

/// Effort against time available: the tighter the ratio, the higher the
/// score. Without a due date there is no ratio, so a moderate default.
fn effort_score(effort_minutes: u32, due: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
    let due = match due {
        Some(d) => d,
        None => return 0.3,
    };

    let available_hours = (due - now).num_seconds() as f64 / 3600.0;
    let effort_hours = effort_minutes as f64 / 60.0;
    let ratio = effort_hours / available_hours.max(1.0);

    if ratio >= 0.8 {
        1.0
    } else if ratio >= 0.5 {
        0.7
    } else if ratio >= 0.3 {
        0.5
    } else {
        0.2
    }
}

fn score_to_level(score: f64) -> UrgencyLevel {
    if score >= 0.8 {
        UrgencyLevel::Critical
    } else if score >= 0.6 {
        UrgencyLevel::High
    } else if score >= 0.3 {
        UrgencyLevel::Medium
    } else {
        UrgencyLevel::Low
    }
}
