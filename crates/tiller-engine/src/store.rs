//! Task storage.
//!
//! The engine talks to tasks through the [`TaskStore`] trait so the backing
//! store can be swapped; the in-memory implementation backs tests and
//! single-process deployments.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use tiller_core::Task;

use crate::error::{EngineError, Result};

/// Storage seam for tasks.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Fetch a task by id.
    async fn get(&self, id: Uuid) -> Result<Task>;

    /// Insert or replace a task by id.
    async fn save(&self, task: Task) -> Result<()>;

    /// Remove a task by id.
    async fn delete(&self, id: Uuid) -> Result<()>;

    /// All incomplete tasks.
    async fn list_pending(&self) -> Result<Vec<Task>>;

    /// Incomplete tasks due at or before `cutoff`, plus tasks whose fuzzy
    /// due label is "today".
    async fn due_by(&self, cutoff: DateTime<Utc>) -> Result<Vec<Task>>;
}

/// In-memory task store guarded by a mutex.
pub struct InMemoryTaskStore {
    tasks: Mutex<Vec<Task>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self {
            tasks: Mutex::new(Vec::new()),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<Task>>> {
        self.tasks
            .lock()
            .map_err(|e| EngineError::Store(format!("Lock poisoned: {}", e)))
    }
}

impl Default for InMemoryTaskStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn get(&self, id: Uuid) -> Result<Task> {
        let tasks = self.lock()?;
        tasks
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or(EngineError::TaskNotFound(id))
    }

    async fn save(&self, task: Task) -> Result<()> {
        let mut tasks = self.lock()?;
        match tasks.iter_mut().find(|t| t.id == task.id) {
            Some(existing) => *existing = task,
            None => tasks.push(task),
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let mut tasks = self.lock()?;
        let before = tasks.len();
        tasks.retain(|t| t.id != id);
        if tasks.len() == before {
            return Err(EngineError::TaskNotFound(id));
        }
        Ok(())
    }

    async fn list_pending(&self) -> Result<Vec<Task>> {
        let tasks = self.lock()?;
        Ok(tasks.iter().filter(|t| !t.completed).cloned().collect())
    }

    async fn due_by(&self, cutoff: DateTime<Utc>) -> Result<Vec<Task>> {
        let tasks = self.lock()?;
        Ok(tasks
            .iter()
            .filter(|t| !t.completed)
            .filter(|t| {
                t.due_date.map(|d| d <= cutoff).unwrap_or(false)
                    || t.due_fuzzy.as_deref() == Some("today")
            })
            .cloned()
            .collect())
    }
}
