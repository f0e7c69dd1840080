//! Drain algorithm: replay the pending-action queue against the remote
//! service and reconcile with the server's task list.
//!
//! A drain works on a snapshot of the queue taken when it starts:
//! 1. Replay the snapshot strictly in FIFO order
//! 2. On the first failure, abort and leave the whole queue untouched
//! 3. When every action succeeded, fetch the server list, mark it synced,
//!    and remove exactly the snapshot from the queue
//! 4. Actions enqueued while the drain ran are replayed onto the fresh list
//!    and trigger another pass
//!
//! Replay is at-least-once: a failed drain re-sends actions that already
//! succeeded in it. Each call carries the action id as an idempotency key
//! so the server can recognize repeats.
//!
//! Only one drain runs at a time. A request that arrives while one runs is
//! folded into a single follow-up pass. The drain flag is held by a guard,
//! so a drain future dropped mid-pass releases it and clears `is_loading`.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use tasksync_proto::{NewTask, PendingAction, PendingOp, Task};
use tokio::sync::Mutex;

use super::{StoreEvent, StoreState, SyncState, TaskStore};
use crate::remote::{RemoteError, RemoteTaskService};
use crate::storage::KeyValueStore;

/// Result of one pass over a queue snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
enum DrainOutcome {
    /// Offline or nothing queued.
    Skipped,
    /// Every action succeeded and the list was reconciled.
    Completed {
        /// Actions enqueued during the drain are still waiting.
        more_pending: bool,
    },
    /// An action or the final fetch failed.
    Failed,
}

/// Ownership of the single drain slot. Dropping it, normally or because
/// the drain future was cancelled, clears `is_loading` and frees the slot.
struct DrainGuard<'a> {
    draining: &'a AtomicBool,
    state: &'a Mutex<StoreState>,
}

impl<'a> DrainGuard<'a> {
    fn acquire(draining: &'a AtomicBool, state: &'a Mutex<StoreState>) -> Option<Self> {
        if draining.swap(true, Ordering::AcqRel) {
            return None;
        }
        Some(Self { draining, state })
    }
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        // Only the slot holder sets `is_loading`, so any true value here is ours.
        // If the lock is busy, the next pass clears it instead.
        if let Ok(mut state) = self.state.try_lock() {
            state.sync.is_loading = false;
        }
        self.draining.store(false, Ordering::Release);
    }
}

impl<S: KeyValueStore, R: RemoteTaskService> TaskStore<S, R> {
    /// Drains the pending-action queue if online and non-empty.
    ///
    /// Never fails: errors are recorded in [`SyncState::error`] and emitted
    /// as [`StoreEvent::SyncFailed`]. If a drain is already running, this
    /// schedules one more pass on it and returns immediately.
    pub async fn sync_with_server(&self) {
        loop {
            let Some(guard) = DrainGuard::acquire(&self.draining, &self.state) else {
                self.rerun.store(true, Ordering::Release);
                tracing::debug!("drain already running, follow-up scheduled");
                return;
            };
            self.rerun.store(false, Ordering::Release);
            let outcome = self.drain_once().await;
            drop(guard);

            // A caller that lost the race for the slot may set `rerun` after
            // it was read, so a clean pass also looks at the queue itself.
            let again = match outcome {
                DrainOutcome::Failed => self.rerun.swap(false, Ordering::AcqRel),
                DrainOutcome::Completed { more_pending: true } => true,
                DrainOutcome::Skipped | DrainOutcome::Completed { more_pending: false } => {
                    self.rerun.swap(false, Ordering::AcqRel) || self.has_drainable_work().await
                }
            };
            if !again {
                break;
            }
        }
    }

    async fn has_drainable_work(&self) -> bool {
        let state = self.state.lock().await;
        state.sync.is_online && !state.pending.is_empty()
    }

    /// Clears the last error and drains again. Returns the resulting status.
    pub async fn retry_sync(&self) -> SyncState {
        self.state.lock().await.sync.error = None;
        tracing::info!("sync retry requested");
        self.sync_with_server().await;
        self.sync_state().await
    }

    async fn drain_once(&self) -> DrainOutcome {
        let snapshot = {
            let mut state = self.state.lock().await;
            if !state.sync.is_online || state.pending.is_empty() {
                state.sync.is_loading = false;
                return DrainOutcome::Skipped;
            }
            state.sync.is_loading = true;
            state.sync.error = None;
            state.pending.clone()
        };
        let count = snapshot.len();
        tracing::info!(pending = count, "drain started");
        self.emit(StoreEvent::SyncStarted { pending: count });

        let mut remap = HashMap::new();
        for action in &snapshot {
            if let Err(e) = self.replay(action, &mut remap).await {
                tracing::warn!(
                    action_id = %action.id,
                    kind = %action.kind(),
                    task_id = %action.task_id(),
                    error = %e,
                    "drain aborted"
                );
                return self.fail_drain(&e).await;
            }
        }

        let server_tasks = match self.remote.list().await {
            Ok(tasks) => tasks,
            Err(e) => {
                tracing::warn!(error = %e, "fetching task list after drain failed");
                return self.fail_drain(&e).await;
            }
        };

        let more_pending = {
            let mut state = self.state.lock().await;
            let drained: HashSet<&str> = snapshot.iter().map(|a| a.id.as_str()).collect();
            state.pending.retain(|a| !drained.contains(a.id.as_str()));
            for action in &mut state.pending {
                remap_action(action, &remap);
            }
            state.tasks = rebase(server_tasks, &state.pending);
            state.sync.last_sync = Some(Utc::now().timestamp_millis());
            state.sync.is_loading = false;
            state.sync.error = None;
            !state.pending.is_empty()
        };

        tracing::info!(synced_actions = count, more_pending, "drain completed");
        self.emit(StoreEvent::SyncCompleted {
            synced_actions: count,
        });
        self.emit(StoreEvent::TasksChanged);
        self.persist().await;
        DrainOutcome::Completed { more_pending }
    }

    /// Sends one action, rewriting its target through `remap` first.
    /// Records a new mapping when a CREATE gets a server id.
    async fn replay(
        &self,
        action: &PendingAction,
        remap: &mut HashMap<String, String>,
    ) -> Result<(), RemoteError> {
        let mut op = action.op.clone();
        if let Some(id) = remap.get(op.task_id()) {
            op.retarget(id);
        }

        match &op {
            PendingOp::Create { task } => {
                let created = self
                    .remote
                    .create(&NewTask::from(task), &action.id)
                    .await?;
                tracing::debug!(task_id = %task.id, server_id = %created.id, "create acknowledged");
                if created.id != task.id {
                    remap.insert(task.id.clone(), created.id);
                }
            }
            PendingOp::Update { task: patch } => {
                if patch.id.is_empty() {
                    tracing::debug!(action_id = %action.id, "update without id skipped");
                    return Ok(());
                }
                self.remote.update(&patch.id, patch, &action.id).await?;
            }
            PendingOp::Delete { task } => {
                if task.id.is_empty() {
                    tracing::debug!(action_id = %action.id, "delete without id skipped");
                    return Ok(());
                }
                match self.remote.delete(&task.id, &action.id).await {
                    Ok(()) => {}
                    Err(e) if e.is_not_found() => {
                        tracing::debug!(task_id = %task.id, "delete target already gone");
                    }
                    Err(e) => return Err(e),
                }
            }
        }
        Ok(())
    }

    async fn fail_drain(&self, error: &RemoteError) -> DrainOutcome {
        let message = error.to_string();
        {
            let mut state = self.state.lock().await;
            state.sync.is_loading = false;
            state.sync.error = Some(message.clone());
        }
        self.emit(StoreEvent::SyncFailed { error: message });
        DrainOutcome::Failed
    }
}

fn remap_action(action: &mut PendingAction, remap: &HashMap<String, String>) {
    if let Some(id) = remap.get(action.task_id()) {
        let id = id.clone();
        action.op.retarget(&id);
    }
}

/// Marks `server` synced and replays still-queued local mutations on top of
/// it, so optimistic state stays visible until those actions drain.
pub(crate) fn rebase(server: Vec<Task>, pending: &[PendingAction]) -> Vec<Task> {
    let mut tasks: Vec<Task> = server
        .into_iter()
        .map(|mut t| {
            t.synced = true;
            t
        })
        .collect();

    for action in pending {
        match &action.op {
            PendingOp::Create { task } => {
                if !tasks.iter().any(|t| t.id == task.id) {
                    let mut local = task.clone();
                    local.synced = false;
                    tasks.push(local);
                }
            }
            PendingOp::Update { task: patch } => {
                if let Some(task) = tasks.iter_mut().find(|t| t.id == patch.id) {
                    patch.apply_to(task);
                    task.synced = false;
                }
            }
            PendingOp::Delete { task } => tasks.retain(|t| t.id != task.id),
        }
    }
    tasks
}
