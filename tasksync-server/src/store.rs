//! In-memory task repository with idempotency records.
//!
//! The [`TaskRepository`] holds the authoritative task list. Mutations may
//! carry an idempotency key; the outcome of the first request with a given
//! key is recorded and returned verbatim for every repeat, without applying
//! the mutation again. The check and the apply happen under one write lock.
//! Only the most recent [`DEFAULT_RECORD_LIMIT`] keys are kept.

use std::collections::{HashMap, VecDeque};

use chrono::Utc;
use tasksync_proto::task::{MAX_TITLE_LENGTH, validate_title_with};
use tasksync_proto::{NewTask, Task, TaskPatch, ValidationError};
use tokio::sync::RwLock;

/// Number of idempotency records kept before the oldest are evicted.
pub const DEFAULT_RECORD_LIMIT: usize = 10_000;

/// Errors a repository operation can produce.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepoError {
    /// No task has the requested id.
    #[error("task {0} not found")]
    NotFound(String),

    /// The request body failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// A state-changing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Create a task.
    Create(NewTask),
    /// Patch an existing task.
    Update {
        /// Target id (from the path).
        id: String,
        /// Fields to change.
        patch: TaskPatch,
    },
    /// Delete a task.
    Delete {
        /// Target id.
        id: String,
    },
}

/// Result of a mutation: the affected task (none for a delete) or an error.
pub type Outcome = Result<Option<Task>, RepoError>;

#[derive(Debug, Default)]
struct Inner {
    tasks: Vec<Task>,
    next_id: u64,
    applied: HashMap<String, Outcome>,
    /// Recorded keys, oldest first.
    applied_order: VecDeque<String>,
}

/// Authoritative task list, safe to share across handlers.
#[derive(Debug)]
pub struct TaskRepository {
    inner: RwLock<Inner>,
    max_title_len: usize,
    record_limit: usize,
}

impl Default for TaskRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskRepository {
    /// Creates an empty repository with the default title limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_title_len(MAX_TITLE_LENGTH)
    }

    /// Creates an empty repository with a custom title limit.
    #[must_use]
    pub fn with_max_title_len(max_title_len: usize) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            max_title_len,
            record_limit: DEFAULT_RECORD_LIMIT,
        }
    }

    /// Keeps at most `limit` idempotency records (at least one).
    #[must_use]
    pub fn with_record_limit(mut self, limit: usize) -> Self {
        self.record_limit = limit.max(1);
        self
    }

    /// All tasks, oldest first.
    pub async fn list(&self) -> Vec<Task> {
        self.inner.read().await.tasks.clone()
    }

    /// The task with `id`.
    ///
    /// # Errors
    ///
    /// Returns [`RepoError::NotFound`] if there is none.
    pub async fn get(&self, id: &str) -> Result<Task, RepoError> {
        self.inner
            .read()
            .await
            .tasks
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or_else(|| RepoError::NotFound(id.to_string()))
    }

    /// Applies `mutation`, or returns the recorded outcome if `key` was seen
    /// before.
    pub async fn apply(&self, key: Option<&str>, mutation: Mutation) -> Outcome {
        let mut inner = self.inner.write().await;
        if let Some(key) = key
            && let Some(recorded) = inner.applied.get(key)
        {
            tracing::debug!(key, "replayed request answered from record");
            return recorded.clone();
        }

        let outcome = inner.execute(mutation, self.max_title_len);
        if let Some(key) = key {
            inner.record(key, outcome.clone(), self.record_limit);
        }
        outcome
    }

    /// Number of recorded idempotency keys.
    pub async fn recorded_keys(&self) -> usize {
        self.inner.read().await.applied.len()
    }
}

impl Inner {
    fn record(&mut self, key: &str, outcome: Outcome, limit: usize) {
        self.applied.insert(key.to_string(), outcome);
        self.applied_order.push_back(key.to_string());
        while self.applied_order.len() > limit {
            if let Some(oldest) = self.applied_order.pop_front() {
                self.applied.remove(&oldest);
            }
        }
    }

    fn execute(&mut self, mutation: Mutation, max_title_len: usize) -> Outcome {
        match mutation {
            Mutation::Create(new) => {
                validate_title_with(&new.title, max_title_len)?;
                self.next_id += 1;
                let now = Utc::now();
                let task = Task {
                    id: format!("srv-{}", self.next_id),
                    title: new.title,
                    description: new.description,
                    completed: new.completed,
                    priority: new.priority,
                    created_at: now,
                    updated_at: new.updated_at.or(Some(now)),
                    synced: true,
                };
                tracing::info!(task_id = %task.id, "task created");
                self.tasks.push(task.clone());
                Ok(Some(task))
            }
            Mutation::Update { id, patch } => {
                if let Some(title) = &patch.title {
                    validate_title_with(title, max_title_len)?;
                }
                let task = self
                    .tasks
                    .iter_mut()
                    .find(|t| t.id == id)
                    .ok_or_else(|| RepoError::NotFound(id.clone()))?;
                patch.apply_to(task);
                if patch.updated_at.is_none() {
                    task.updated_at = Some(Utc::now());
                }
                tracing::info!(task_id = %id, "task updated");
                Ok(Some(task.clone()))
            }
            Mutation::Delete { id } => {
                let index = self
                    .tasks
                    .iter()
                    .position(|t| t.id == id)
                    .ok_or_else(|| RepoError::NotFound(id.clone()))?;
                self.tasks.remove(index);
                tracing::info!(task_id = %id, "task deleted");
                Ok(None)
            }
        }
    }
}
