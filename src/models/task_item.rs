//! # Project Task Board
//!
//! The registry instantiated for project tasks: an [`EntityStore`] of
//! [`TaskItem`] records plus mark-completed via compare-and-swap, a
//! priority-ordered pending stream, and a project summary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::RegistryConfig;
use crate::error::{RegistryError, Result};
use crate::query::QueryStream;
use crate::record::Record;
use crate::store::EntityStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskState {
    ToDo,
    InProgress,
    Completed,
}

/// Declaration order is priority order: `Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TaskPriority {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskItem {
    pub id: Option<Uuid>,
    pub name: String,
    pub state: TaskState,
    pub priority: TaskPriority,
    pub created_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
}

impl TaskItem {
    pub fn new(name: impl Into<String>, priority: TaskPriority, due_at: DateTime<Utc>) -> Self {
        Self {
            id: None,
            name: name.into(),
            state: TaskState::ToDo,
            priority,
            created_at: Utc::now(),
            due_at,
        }
    }
}

impl Record for TaskItem {
    fn id(&self) -> Option<Uuid> {
        self.id
    }

    fn assign_id(&mut self, id: Uuid) {
        self.id = Some(id);
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(RegistryError::invalid_argument(
                "name",
                "must not be blank",
            ));
        }
        Ok(())
    }

    fn label(&self) -> &str {
        &self.name
    }
}

/// Counts derived from the board; never stored back into it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSummary {
    pub total: usize,
    pub completed: usize,
    pub overdue: usize,
}

/// Task store plus board operations.
pub struct ProjectTaskBoard {
    store: EntityStore<TaskItem>,
}

impl ProjectTaskBoard {
    pub fn new() -> Self {
        Self {
            store: EntityStore::new(),
        }
    }

    pub fn with_config(config: RegistryConfig) -> Result<Self> {
        Ok(Self {
            store: EntityStore::with_config(config)?,
        })
    }

    /// The underlying store, for change subscriptions and raw access.
    pub fn store(&self) -> &EntityStore<TaskItem> {
        &self.store
    }

    pub fn add_task(&self, task: TaskItem) -> Result<Uuid> {
        self.store.insert(task)
    }

    pub fn remove_task(&self, id: Uuid) -> Result<bool> {
        self.store.remove(id)
    }

    /// Mark a task completed.
    ///
    /// Compare-and-swap against a fresh read, retried on a lost race so a
    /// concurrent field edit is never clobbered and the completion is never
    /// lost. Completing an already-completed task is a no-op.
    pub fn mark_completed(&self, id: Uuid) -> Result<()> {
        if id.is_nil() {
            return Err(RegistryError::invalid_argument("id", "must not be nil"));
        }

        loop {
            let current = self.store.get(id).ok_or_else(|| RegistryError::NotFound {
                entity: "task".to_string(),
                id: id.to_string(),
            })?;

            if current.state == TaskState::Completed {
                return Ok(());
            }

            let mut completed = current.clone();
            completed.state = TaskState::Completed;
            if self.store.compare_and_update(id, &current, completed)? {
                return Ok(());
            }
            // Lost the race; re-read and try again.
        }
    }

    /// Lazily-produced stream of to-do tasks, highest priority first.
    /// Priority ties keep insertion order.
    pub fn pending_tasks(&self, cancel: CancellationToken) -> QueryStream<TaskItem> {
        self.store
            .query()
            .filter(|task: &TaskItem| task.state == TaskState::ToDo)
            .order_by_desc(|task: &TaskItem| task.priority)
            .with_cancellation(cancel)
            .build()
    }

    /// Whole-board counts. Overdue excludes completed tasks.
    pub fn summary(&self) -> TaskSummary {
        let now = Utc::now();
        let mut summary = TaskSummary::default();
        for task in self.store.snapshot() {
            summary.total += 1;
            if task.state == TaskState::Completed {
                summary.completed += 1;
            } else if task.due_at < now {
                summary.overdue += 1;
            }
        }
        summary
    }
}

impl Default for ProjectTaskBoard {
    fn default() -> Self {
        Self::new()
    }
}
