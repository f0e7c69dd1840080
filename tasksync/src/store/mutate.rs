//! Local mutations.
//!
//! Every mutation follows the same steps:
//! 1. Validate the input (title rules)
//! 2. Apply it to the in-memory list and enqueue one [`PendingAction`]
//! 3. Persist (best effort, awaited)
//! 4. Drain the queue if online

use chrono::Utc;
use tasksync_proto::task::validate_title;
use tasksync_proto::{PendingAction, Task, TaskDraft, TaskPatch};

use super::{StoreError, StoreEvent, TaskStore};
use crate::remote::RemoteTaskService;
use crate::storage::KeyValueStore;

impl<S: KeyValueStore, R: RemoteTaskService> TaskStore<S, R> {
    /// Replaces the task list wholesale and persists it. The queue is not
    /// touched.
    pub async fn set_tasks(&self, tasks: Vec<Task>) {
        let count = tasks.len();
        self.state.lock().await.tasks = tasks;
        tracing::debug!(count, "task list replaced");
        self.emit(StoreEvent::TasksChanged);
        self.persist().await;
    }

    /// Creates a task from `draft` with a temporary id and enqueues a
    /// CREATE carrying the full task.
    ///
    /// Returns the task as added locally.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Validation`] if the title is empty or too long.
    /// State is unchanged in that case.
    pub async fn add_task(&self, draft: TaskDraft) -> Result<Task, StoreError> {
        validate_title(&draft.title)?;
        let now = Utc::now();
        let task = Task::from_draft(draft, now);
        let action = PendingAction::create(task.clone(), now);
        tracing::debug!(task_id = %task.id, action_id = %action.id, "task added");

        let online = {
            let mut state = self.state.lock().await;
            state.tasks.push(task.clone());
            state.pending.push(action);
            state.sync.is_online
        };
        self.after_mutation(online).await;
        Ok(task)
    }

    /// Merges `patch` into the task with `id`, bumps `updatedAt`, marks it
    /// unsynced, and enqueues an UPDATE with the changed fields.
    ///
    /// The patch's own `id` is ignored. Returns the updated task, or `None`
    /// (without error) if no task has `id`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Validation`] if the patch sets an invalid title.
    pub async fn update_task(
        &self,
        id: &str,
        mut patch: TaskPatch,
    ) -> Result<Option<Task>, StoreError> {
        if let Some(title) = &patch.title {
            validate_title(title)?;
        }
        let now = Utc::now();
        id.clone_into(&mut patch.id);
        patch.updated_at = Some(now);

        let (updated, online) = {
            let mut state = self.state.lock().await;
            let Some(task) = state.tasks.iter_mut().find(|t| t.id == id) else {
                tracing::debug!(task_id = %id, "update of unknown task ignored");
                return Ok(None);
            };
            patch.apply_to(task);
            task.synced = false;
            let updated = task.clone();
            let action = PendingAction::update(patch, now);
            tracing::debug!(task_id = %id, action_id = %action.id, "task updated");
            state.pending.push(action);
            (updated, state.sync.is_online)
        };
        self.after_mutation(online).await;
        Ok(Some(updated))
    }

    /// Removes the task with `id` and enqueues a DELETE carrying only the id.
    ///
    /// Returns `false` (and enqueues nothing) if no task has `id`.
    pub async fn delete_task(&self, id: &str) -> bool {
        let online = {
            let mut state = self.state.lock().await;
            let Some(index) = state.tasks.iter().position(|t| t.id == id) else {
                tracing::debug!(task_id = %id, "delete of unknown task ignored");
                return false;
            };
            state.tasks.remove(index);
            let action = PendingAction::delete(id, Utc::now());
            tracing::debug!(task_id = %id, action_id = %action.id, "task deleted");
            state.pending.push(action);
            state.sync.is_online
        };
        self.after_mutation(online).await;
        true
    }

    /// Flips `completed` on the task with `id`.
    ///
    /// Returns the updated task, or `None` if no task has `id`.
    pub async fn toggle_task_complete(&self, id: &str) -> Option<Task> {
        let current = self.task(id).await?.completed;
        let patch = TaskPatch::new(id).completed(!current);
        // A completed-only patch carries no title, so validation cannot fail.
        self.update_task(id, patch).await.ok().flatten()
    }

    /// Records connectivity. A false-to-true transition with a non-empty
    /// queue triggers a drain.
    pub async fn set_online_status(&self, online: bool) {
        let (was_online, has_pending) = {
            let mut state = self.state.lock().await;
            let was = state.sync.is_online;
            state.sync.is_online = online;
            (was, !state.pending.is_empty())
        };
        if was_online == online {
            return;
        }
        tracing::info!(online, has_pending, "online status changed");
        self.emit(StoreEvent::ConnectivityChanged { online });
        if online && has_pending {
            self.sync_with_server().await;
        }
    }

    async fn after_mutation(&self, online: bool) {
        self.emit(StoreEvent::TasksChanged);
        self.persist().await;
        if online {
            self.sync_with_server().await;
        }
    }
}
