//! Integration tests for persisting store state to disk and loading it
//! back in a fresh process.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use tasksync::remote::{HttpTaskService, RetryConfig};
use tasksync::storage::{FileStore, KeyValueStore, LAST_SYNC_KEY, PENDING_ACTIONS_KEY, TASKS_KEY};
use tasksync::store::{StoreEvent, TaskStore};
use tasksync_proto::codec;
use tasksync_proto::{TaskDraft, TaskPatch};
use tasksync_server::server::start_server_with_state;
use tasksync_server::store::TaskRepository;
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

type Store = TaskStore<FileStore, HttpTaskService>;

fn remote(base_url: &str) -> HttpTaskService {
    HttpTaskService::new(
        base_url,
        Duration::from_secs(5),
        RetryConfig {
            max_attempts: 1,
            delay: Duration::from_millis(10),
        },
    )
    .unwrap()
}

/// A store over `dir` whose remote is a closed local port.
async fn unreachable_store(dir: &std::path::Path) -> (Store, mpsc::Receiver<StoreEvent>) {
    let storage = FileStore::open(dir).await.unwrap();
    TaskStore::new(storage, remote("http://127.0.0.1:9"), 64)
}

async fn start_repo_server() -> (String, Arc<TaskRepository>) {
    let repo = Arc::new(TaskRepository::new());
    let (addr, _handle) = start_server_with_state("127.0.0.1:0", Arc::clone(&repo))
        .await
        .expect("server should start");
    (format!("http://{addr}"), repo)
}

// ===========================================================================
// Tests
// ===========================================================================

#[tokio::test]
async fn fresh_instance_restores_tasks_and_queue() {
    let tmp = tempfile::tempdir().unwrap();

    let (tasks, pending) = {
        let (store, _rx) = unreachable_store(tmp.path()).await;
        let task = store.add_task(TaskDraft::new("Buy milk")).await.unwrap();
        store
            .update_task(&task.id, TaskPatch::new("").completed(true))
            .await
            .unwrap();
        (store.tasks().await, store.pending_actions().await)
    };

    let (store, _rx) = unreachable_store(tmp.path()).await;
    assert!(store.tasks().await.is_empty());
    store.load_from_storage().await;

    assert_eq!(store.tasks().await, tasks);
    assert_eq!(store.pending_actions().await, pending);
    assert!(store.sync_state().await.last_sync.is_none());
}

#[tokio::test]
async fn keys_are_written_as_json_files() {
    let tmp = tempfile::tempdir().unwrap();
    let (store, _rx) = unreachable_store(tmp.path()).await;
    store.add_task(TaskDraft::new("Buy milk")).await.unwrap();

    let storage = FileStore::open(tmp.path()).await.unwrap();
    let tasks = storage.get(TASKS_KEY).await.unwrap().unwrap();
    assert_eq!(codec::decode_tasks(&tasks).unwrap(), store.tasks().await);
    let pending = storage.get(PENDING_ACTIONS_KEY).await.unwrap().unwrap();
    assert_eq!(
        codec::decode_actions(&pending).unwrap(),
        store.pending_actions().await
    );
    assert!(storage.get(LAST_SYNC_KEY).await.unwrap().is_none());
    assert!(tmp.path().join("tasks.json").is_file());
}

#[tokio::test]
async fn restart_online_drains_queue_from_previous_session() {
    let tmp = tempfile::tempdir().unwrap();
    {
        let (store, _rx) = unreachable_store(tmp.path()).await;
        store.add_task(TaskDraft::new("Buy milk")).await.unwrap();
        store.add_task(TaskDraft::new("Buy bread")).await.unwrap();
    }

    let (base_url, repo) = start_repo_server().await;
    let storage = FileStore::open(tmp.path()).await.unwrap();
    let (store, _rx) = TaskStore::new(storage, remote(&base_url), 64);
    store.set_online_status(true).await;
    store.load_from_storage().await;

    assert!(store.pending_actions().await.is_empty());
    assert_eq!(repo.list().await.len(), 2);
    let tasks = store.tasks().await;
    assert!(tasks.iter().all(|t| t.synced));

    // The drained state is what the next session sees.
    let (next, _rx) = unreachable_store(tmp.path()).await;
    next.load_from_storage().await;
    assert_eq!(next.tasks().await, tasks);
    assert!(next.pending_actions().await.is_empty());
    assert_eq!(
        next.sync_state().await.last_sync,
        store.sync_state().await.last_sync
    );
}

#[tokio::test]
async fn unreachable_server_falls_back_to_stored_tasks() {
    let tmp = tempfile::tempdir().unwrap();
    let saved = {
        let (store, _rx) = unreachable_store(tmp.path()).await;
        store.add_task(TaskDraft::new("Buy milk")).await.unwrap();
        store.tasks().await
    };

    let (store, mut rx) = unreachable_store(tmp.path()).await;
    store.set_online_status(true).await;
    store.load_from_storage().await;

    assert_eq!(store.tasks().await, saved);
    assert_eq!(store.pending_actions().await.len(), 1);
    assert!(store.sync_state().await.error.is_some());

    let mut failed = false;
    while let Ok(event) = rx.try_recv() {
        failed |= matches!(event, StoreEvent::SyncFailed { .. });
    }
    assert!(failed);
}

#[tokio::test]
async fn corrupt_file_loads_as_empty() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(tmp.path().join("tasks.json"), "{ not json").unwrap();

    let (store, mut rx) = unreachable_store(tmp.path()).await;
    store.load_from_storage().await;

    assert!(store.tasks().await.is_empty());
    let mut reported = false;
    while let Ok(event) = rx.try_recv() {
        reported |= matches!(event, StoreEvent::StorageFailed { .. });
    }
    assert!(reported);
}
