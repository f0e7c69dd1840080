//! Task store: the single owner of tasks, pending actions, and sync status.
//!
//! All mutations go through [`TaskStore`]. Each one is applied to memory
//! first, recorded as a [`PendingAction`], persisted, and then (when online)
//! drained against the remote service. See:
//! - [`mutate`] for the local mutations
//! - [`sync`] for the drain algorithm
//! - [`persist`] for loading and saving through a [`KeyValueStore`]
//!
//! The presentation layer reads snapshots through the accessors below and
//! consumes [`StoreEvent`]s from the receiver returned by [`TaskStore::new`].

pub mod mutate;
pub mod persist;
pub mod sync;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::atomic::AtomicBool;

use chrono::{DateTime, Utc};
use tasksync_proto::{PendingAction, Task, ValidationError};
use tokio::sync::{Mutex, mpsc};

use crate::remote::RemoteTaskService;
use crate::storage::KeyValueStore;

/// Errors surfaced to callers of store mutations.
///
/// Storage and sync failures are not errors here: they are logged and
/// reported through [`StoreEvent`] and [`SyncState::error`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The mutation was rejected before touching any state.
    #[error("invalid task: {0}")]
    Validation(#[from] ValidationError),
}

/// Status of connectivity and of the most recent remote operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncState {
    /// Last known connectivity.
    pub is_online: bool,
    /// A drain is in progress.
    pub is_loading: bool,
    /// Message of the last failed drain, cleared when a drain starts.
    pub error: Option<String>,
    /// Last successful full reconciliation, in epoch milliseconds.
    pub last_sync: Option<i64>,
}

impl SyncState {
    /// [`last_sync`](Self::last_sync) as a timestamp.
    #[must_use]
    pub fn last_sync_at(&self) -> Option<DateTime<Utc>> {
        self.last_sync.and_then(DateTime::<Utc>::from_timestamp_millis)
    }
}

/// Events emitted for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// The task list changed.
    TasksChanged,
    /// Connectivity flipped.
    ConnectivityChanged {
        /// New connectivity.
        online: bool,
    },
    /// A drain started.
    SyncStarted {
        /// Number of actions in the drained snapshot.
        pending: usize,
    },
    /// A drain finished and the task list was replaced by the server's.
    SyncCompleted {
        /// Number of actions acknowledged by the server.
        synced_actions: usize,
    },
    /// A drain aborted. The queue is unchanged.
    SyncFailed {
        /// Failure message, also stored in [`SyncState::error`].
        error: String,
    },
    /// A persistence read or write failed. In-memory state is unaffected.
    StorageFailed {
        /// Failure message.
        reason: String,
    },
}

/// State guarded by the store lock.
#[derive(Debug, Default)]
struct StoreState {
    tasks: Vec<Task>,
    pending: Vec<PendingAction>,
    sync: SyncState,
}

/// Explicit context object owning the task list and the pending-action
/// queue, wired to its storage and remote collaborators at construction.
///
/// The state lock is never held across a remote call or a storage write.
pub struct TaskStore<S, R> {
    /// Durable key/value storage.
    storage: S,
    /// Remote task service drained against.
    remote: R,
    /// Tasks, queue, and sync status.
    state: Mutex<StoreState>,
    /// Serializes storage writes so they land in snapshot order.
    persist_lock: Mutex<()>,
    /// A drain is running.
    draining: AtomicBool,
    /// A drain was requested while one was running.
    rerun: AtomicBool,
    /// Channel for emitting store events to the presentation layer.
    event_tx: mpsc::Sender<StoreEvent>,
}

impl<S: KeyValueStore, R: RemoteTaskService> TaskStore<S, R> {
    /// Creates an empty, offline store.
    ///
    /// Returns the store and a receiver for [`StoreEvent`]s. Events are
    /// dropped when the receiver is full or gone.
    pub fn new(storage: S, remote: R, event_buffer: usize) -> (Self, mpsc::Receiver<StoreEvent>) {
        let (event_tx, event_rx) = mpsc::channel(event_buffer.max(1));
        let store = Self {
            storage,
            remote,
            state: Mutex::new(StoreState::default()),
            persist_lock: Mutex::new(()),
            draining: AtomicBool::new(false),
            rerun: AtomicBool::new(false),
            event_tx,
        };
        (store, event_rx)
    }

    /// Snapshot of the task list, in insertion order.
    pub async fn tasks(&self) -> Vec<Task> {
        self.state.lock().await.tasks.clone()
    }

    /// The task with `id`, if present.
    pub async fn task(&self, id: &str) -> Option<Task> {
        self.state
            .lock()
            .await
            .tasks
            .iter()
            .find(|t| t.id == id)
            .cloned()
    }

    /// Snapshot of the pending-action queue, oldest first.
    pub async fn pending_actions(&self) -> Vec<PendingAction> {
        self.state.lock().await.pending.clone()
    }

    /// Snapshot of the sync status.
    pub async fn sync_state(&self) -> SyncState {
        self.state.lock().await.sync.clone()
    }

    /// Tasks whose title or description contains `query`, ignoring case.
    /// An empty query returns every task. Order is preserved.
    pub async fn search(&self, query: &str) -> Vec<Task> {
        self.state
            .lock()
            .await
            .tasks
            .iter()
            .filter(|t| t.matches(query))
            .cloned()
            .collect()
    }

    /// The storage collaborator.
    pub const fn storage(&self) -> &S {
        &self.storage
    }

    /// The remote collaborator.
    pub const fn remote(&self) -> &R {
        &self.remote
    }

    fn emit(&self, event: StoreEvent) {
        let _ = self.event_tx.try_send(event);
    }
}
