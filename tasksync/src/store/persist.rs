//! Loading and saving store state through a [`KeyValueStore`].
//!
//! Three keys are written on every mutation: [`TASKS_KEY`],
//! [`PENDING_ACTIONS_KEY`], and [`LAST_SYNC_KEY`] (epoch millis, removed when
//! there has been no sync). Failures never reach the caller of a mutation;
//! they are logged and emitted as [`StoreEvent::StorageFailed`].

use chrono::Utc;
use tasksync_proto::codec::{self, CodecError};
use tasksync_proto::{PendingAction, Task};

use super::sync::rebase;
use super::{StoreEvent, TaskStore};
use crate::remote::RemoteTaskService;
use crate::storage::{
    KeyValueStore, LAST_SYNC_KEY, PENDING_ACTIONS_KEY, StorageError, TASKS_KEY,
};

fn encode_error(key: &str, e: &CodecError) -> StorageError {
    StorageError::Corrupt {
        key: key.to_string(),
        reason: e.to_string(),
    }
}

impl<S: KeyValueStore, R: RemoteTaskService> TaskStore<S, R> {
    /// Writes tasks, pending actions, and the last sync time.
    ///
    /// Writes are serialized, so a later snapshot never gets overwritten by
    /// an earlier one.
    ///
    /// # Errors
    ///
    /// Returns the first [`StorageError`] hit. Keys written before it keep
    /// their new value.
    pub async fn save_to_storage(&self) -> Result<(), StorageError> {
        let _guard = self.persist_lock.lock().await;
        let (tasks, pending, last_sync) = {
            let state = self.state.lock().await;
            (
                codec::encode_tasks(&state.tasks).map_err(|e| encode_error(TASKS_KEY, &e))?,
                codec::encode_actions(&state.pending)
                    .map_err(|e| encode_error(PENDING_ACTIONS_KEY, &e))?,
                state.sync.last_sync,
            )
        };

        self.storage.set(TASKS_KEY, &tasks).await?;
        self.storage.set(PENDING_ACTIONS_KEY, &pending).await?;
        match last_sync {
            Some(millis) => self.storage.set(LAST_SYNC_KEY, &millis.to_string()).await?,
            None => self.storage.remove(LAST_SYNC_KEY).await?,
        }
        tracing::trace!("state persisted");
        Ok(())
    }

    /// Hydrates the store at startup.
    ///
    /// When online, the task list comes from the remote service (every task
    /// marked synced, then persisted with a fresh `lastSync`). Offline or on
    /// fetch failure, the persisted list is used. Pending actions and
    /// `lastSync` always come from storage; queued actions are replayed on
    /// top of a fetched list. A non-empty queue is drained if online.
    pub async fn load_from_storage(&self) {
        let online = self.state.lock().await.sync.is_online;

        let fetched = if online {
            match self.remote.list().await {
                Ok(tasks) => Some(tasks),
                Err(e) => {
                    tracing::warn!(error = %e, "remote fetch failed, using stored tasks");
                    None
                }
            }
        } else {
            None
        };

        let pending = self.read_pending().await;
        let stored_last_sync = self.read_last_sync().await;
        let from_remote = fetched.is_some();
        let tasks = match fetched {
            Some(server) => rebase(server, &pending),
            None => self.read_tasks().await,
        };

        let has_pending = !pending.is_empty();
        {
            let mut state = self.state.lock().await;
            tracing::info!(
                tasks = tasks.len(),
                pending = pending.len(),
                from_remote,
                "state loaded"
            );
            state.tasks = tasks;
            state.pending = pending;
            state.sync.last_sync = if from_remote {
                Some(Utc::now().timestamp_millis())
            } else {
                stored_last_sync
            };
        }
        self.emit(StoreEvent::TasksChanged);

        if from_remote {
            self.persist().await;
        }
        if online && has_pending {
            self.sync_with_server().await;
        }
    }

    /// Saves, reporting failure through logs and events only.
    pub(crate) async fn persist(&self) {
        if let Err(e) = self.save_to_storage().await {
            tracing::warn!(error = %e, "failed to persist state");
            self.emit(StoreEvent::StorageFailed {
                reason: e.to_string(),
            });
        }
    }

    async fn read_key(&self, key: &str) -> Option<String> {
        match self.storage.get(key).await {
            Ok(value) => value,
            Err(e) => {
                self.report_read_failure(&e);
                None
            }
        }
    }

    async fn read_tasks(&self) -> Vec<Task> {
        let Some(text) = self.read_key(TASKS_KEY).await else {
            return Vec::new();
        };
        codec::decode_tasks(&text).unwrap_or_else(|e| {
            self.report_read_failure(&StorageError::Corrupt {
                key: TASKS_KEY.to_string(),
                reason: e.to_string(),
            });
            Vec::new()
        })
    }

    async fn read_pending(&self) -> Vec<PendingAction> {
        let Some(text) = self.read_key(PENDING_ACTIONS_KEY).await else {
            return Vec::new();
        };
        codec::decode_actions(&text).unwrap_or_else(|e| {
            self.report_read_failure(&StorageError::Corrupt {
                key: PENDING_ACTIONS_KEY.to_string(),
                reason: e.to_string(),
            });
            Vec::new()
        })
    }

    async fn read_last_sync(&self) -> Option<i64> {
        let text = self.read_key(LAST_SYNC_KEY).await?;
        match text.trim().parse::<i64>() {
            Ok(millis) => Some(millis),
            Err(e) => {
                self.report_read_failure(&StorageError::Corrupt {
                    key: LAST_SYNC_KEY.to_string(),
                    reason: e.to_string(),
                });
                None
            }
        }
    }

    fn report_read_failure(&self, error: &StorageError) {
        tracing::warn!(error = %error, "failed to read persisted state");
        self.emit(StoreEvent::StorageFailed {
            reason: error.to_string(),
        });
    }
}
