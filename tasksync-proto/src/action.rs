//! Pending actions: local mutations awaiting remote acknowledgment.
//!
//! Every local create, update, or delete records one [`PendingAction`]. The
//! queue of actions is replayed in enqueue order, so an update never races
//! ahead of the create it depends on.
//!
//! Persisted JSON layout:
//!
//! ```json
//! { "id": "…", "type": "UPDATE", "task": { "id": "temp-…", "completed": true }, "timestamp": 1760000000000 }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::task::{Task, TaskPatch, TaskRef};

/// Kind of a pending action, without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    /// A task was created locally.
    Create,
    /// A task was updated locally.
    Update,
    /// A task was deleted locally.
    Delete,
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Create => write!(f, "CREATE"),
            Self::Update => write!(f, "UPDATE"),
            Self::Delete => write!(f, "DELETE"),
        }
    }
}

/// The mutation a pending action replays, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum PendingOp {
    /// Create the full task on the server.
    Create {
        /// The task as it was created locally.
        task: Task,
    },
    /// Apply the changed fields to the server copy.
    Update {
        /// Target id plus changed fields.
        task: TaskPatch,
    },
    /// Delete the task on the server.
    Delete {
        /// Target id.
        task: TaskRef,
    },
}

impl PendingOp {
    /// Returns the kind of this operation.
    #[must_use]
    pub const fn kind(&self) -> ActionKind {
        match self {
            Self::Create { .. } => ActionKind::Create,
            Self::Update { .. } => ActionKind::Update,
            Self::Delete { .. } => ActionKind::Delete,
        }
    }

    /// Returns the id of the task this operation targets.
    #[must_use]
    pub fn task_id(&self) -> &str {
        match self {
            Self::Create { task } => &task.id,
            Self::Update { task } => &task.id,
            Self::Delete { task } => &task.id,
        }
    }

    /// Rewrites the targeted task id, used when a temporary id is replaced
    /// by the server-assigned one.
    pub fn retarget(&mut self, new_id: &str) {
        match self {
            Self::Create { task } => new_id.clone_into(&mut task.id),
            Self::Update { task } => new_id.clone_into(&mut task.id),
            Self::Delete { task } => new_id.clone_into(&mut task.id),
        }
    }
}

/// A recorded local mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAction {
    /// Unique action id (UUID v7). Sent to the server as the idempotency key.
    pub id: String,
    /// The mutation to replay.
    #[serde(flatten)]
    pub op: PendingOp,
    /// Enqueue time in milliseconds since epoch.
    pub timestamp: i64,
}

impl PendingAction {
    /// Records `op` at time `now`.
    #[must_use]
    pub fn new(op: PendingOp, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            op,
            timestamp: now.timestamp_millis(),
        }
    }

    /// Records the creation of `task`.
    #[must_use]
    pub fn create(task: Task, now: DateTime<Utc>) -> Self {
        Self::new(PendingOp::Create { task }, now)
    }

    /// Records an update described by `patch`.
    #[must_use]
    pub fn update(patch: TaskPatch, now: DateTime<Utc>) -> Self {
        Self::new(PendingOp::Update { task: patch }, now)
    }

    /// Records the deletion of the task with the given id.
    #[must_use]
    pub fn delete(id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self::new(PendingOp::Delete { task: TaskRef { id: id.into() } }, now)
    }

    /// Returns the action kind.
    #[must_use]
    pub const fn kind(&self) -> ActionKind {
        self.op.kind()
    }

    /// Returns the id of the targeted task.
    #[must_use]
    pub fn task_id(&self) -> &str {
        self.op.task_id()
    }
}
