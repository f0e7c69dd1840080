//! Integration tests for draining the pending-action queue.
//!
//! Uses the in-process server behind a wrapper that can fail or pause
//! individual mutating calls.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tasksync::remote::{HttpTaskService, RemoteError, RemoteTaskService, RetryConfig};
use tasksync::storage::InMemoryStore;
use tasksync::store::{StoreEvent, TaskStore};
use tasksync_proto::task::is_temporary_id;
use tasksync_proto::{NewTask, Priority, Task, TaskDraft, TaskPatch};
use tasksync_server::server::start_server_with_state;
use tasksync_server::store::TaskRepository;
use tokio::sync::{Notify, Semaphore, mpsc};

// ---------------------------------------------------------------------------
// Remote wrapper
// ---------------------------------------------------------------------------

/// Forwards to the real service, failing the mutating calls whose
/// (zero-based) index is listed and optionally pausing the first create.
struct Faulty {
    inner: HttpTaskService,
    mutating_calls: AtomicUsize,
    fail_at: Mutex<HashSet<usize>>,
    pause_first_create: AtomicBool,
    entered: Notify,
    gate: Semaphore,
}

impl Faulty {
    fn new(inner: HttpTaskService) -> Self {
        Self {
            inner,
            mutating_calls: AtomicUsize::new(0),
            fail_at: Mutex::new(HashSet::new()),
            pause_first_create: AtomicBool::new(false),
            entered: Notify::new(),
            gate: Semaphore::new(0),
        }
    }

    fn fail_calls(&self, indices: &[usize]) {
        self.fail_at.lock().extend(indices.iter().copied());
    }

    fn check(&self) -> Result<(), RemoteError> {
        let index = self.mutating_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_at.lock().remove(&index) {
            return Err(RemoteError::Server {
                status: 503,
                message: "injected".to_string(),
            });
        }
        Ok(())
    }
}

impl RemoteTaskService for Faulty {
    async fn list(&self) -> Result<Vec<Task>, RemoteError> {
        self.inner.list().await
    }

    async fn get(&self, id: &str) -> Result<Task, RemoteError> {
        self.inner.get(id).await
    }

    async fn create(&self, task: &NewTask, key: &str) -> Result<Task, RemoteError> {
        if self.pause_first_create.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            self.gate.acquire().await.expect("gate open").forget();
        }
        self.check()?;
        self.inner.create(task, key).await
    }

    async fn update(&self, id: &str, patch: &TaskPatch, key: &str) -> Result<Task, RemoteError> {
        self.check()?;
        self.inner.update(id, patch, key).await
    }

    async fn delete(&self, id: &str, key: &str) -> Result<(), RemoteError> {
        self.check()?;
        self.inner.delete(id, key).await
    }

    async fn health_check(&self) -> bool {
        self.inner.health_check().await
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

type Store = TaskStore<InMemoryStore, Arc<Faulty>>;

async fn setup() -> (
    Arc<Store>,
    mpsc::Receiver<StoreEvent>,
    Arc<Faulty>,
    Arc<TaskRepository>,
) {
    let repo = Arc::new(TaskRepository::new());
    let (addr, _handle) = start_server_with_state("127.0.0.1:0", Arc::clone(&repo))
        .await
        .expect("server should start");
    let http = HttpTaskService::new(
        format!("http://{addr}"),
        Duration::from_secs(5),
        RetryConfig {
            max_attempts: 1,
            delay: Duration::from_millis(10),
        },
    )
    .unwrap();
    let remote = Arc::new(Faulty::new(http));
    let (store, rx) = TaskStore::new(InMemoryStore::new(), Arc::clone(&remote), 256);
    (Arc::new(store), rx, remote, repo)
}

fn collect(rx: &mut mpsc::Receiver<StoreEvent>) -> Vec<StoreEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

// ===========================================================================
// Tests
// ===========================================================================

#[tokio::test]
async fn buy_milk_round_trip() {
    let (store, mut rx, _remote, repo) = setup().await;

    let local = store
        .add_task(TaskDraft::new("Buy milk").with_priority(Priority::High))
        .await
        .unwrap();
    assert!(is_temporary_id(&local.id));
    assert!(!local.synced);
    assert_eq!(store.pending_actions().await.len(), 1);

    store.set_online_status(true).await;

    let tasks = store.tasks().await;
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].id, "srv-1");
    assert_eq!(tasks[0].priority, Priority::High);
    assert!(tasks[0].synced);
    assert!(store.pending_actions().await.is_empty());
    assert_eq!(repo.list().await.len(), 1);

    let events = collect(&mut rx);
    assert!(events.contains(&StoreEvent::ConnectivityChanged { online: true }));
    assert!(events.contains(&StoreEvent::SyncStarted { pending: 1 }));
    assert!(events.contains(&StoreEvent::SyncCompleted { synced_actions: 1 }));
}

#[tokio::test]
async fn failure_mid_drain_keeps_whole_queue_and_retry_does_not_duplicate() {
    let (store, mut rx, remote, repo) = setup().await;

    let milk = store.add_task(TaskDraft::new("Buy milk")).await.unwrap();
    store.add_task(TaskDraft::new("Buy bread")).await.unwrap();
    store
        .update_task(&milk.id, TaskPatch::new("").title("Buy oat milk"))
        .await
        .unwrap();
    let queued = store.pending_actions().await;
    assert_eq!(queued.len(), 3);

    remote.fail_calls(&[1]);
    store.set_online_status(true).await;

    assert_eq!(store.pending_actions().await, queued);
    let state = store.sync_state().await;
    assert!(state.error.is_some());
    assert!(!state.is_loading);
    assert!(state.last_sync.is_none());
    assert!(
        collect(&mut rx)
            .iter()
            .any(|e| matches!(e, StoreEvent::SyncFailed { .. }))
    );
    // The first create reached the server before the failure.
    assert_eq!(repo.list().await.len(), 1);

    let state = store.retry_sync().await;
    assert!(state.error.is_none());
    assert!(store.pending_actions().await.is_empty());

    let server = repo.list().await;
    let titles: Vec<&str> = server.iter().map(|t| t.title.as_str()).collect();
    assert_eq!(titles, vec!["Buy oat milk", "Buy bread"]);
    assert_eq!(store.tasks().await.len(), 2);
}

#[tokio::test]
async fn update_and_delete_follow_server_id_of_created_task() {
    let (store, _rx, _remote, repo) = setup().await;

    let keep = store.add_task(TaskDraft::new("Keep")).await.unwrap();
    let discard = store.add_task(TaskDraft::new("Drop")).await.unwrap();
    store.toggle_task_complete(&keep.id).await.unwrap();
    store.delete_task(&discard.id).await;

    store.set_online_status(true).await;

    let server = repo.list().await;
    assert_eq!(server.len(), 1);
    assert_eq!(server[0].title, "Keep");
    assert!(server[0].completed);
    let local = store.tasks().await;
    assert_eq!(local.len(), 1);
    assert_eq!(local[0].id, server[0].id);
    assert!(local[0].completed && local[0].synced);
}

#[tokio::test]
async fn set_online_status_is_idempotent() {
    let (store, mut rx, _remote, _repo) = setup().await;

    store.set_online_status(true).await;
    store.set_online_status(true).await;
    store.set_online_status(false).await;
    store.set_online_status(false).await;

    let transitions: Vec<StoreEvent> = collect(&mut rx)
        .into_iter()
        .filter(|e| matches!(e, StoreEvent::ConnectivityChanged { .. }))
        .collect();
    assert_eq!(
        transitions,
        vec![
            StoreEvent::ConnectivityChanged { online: true },
            StoreEvent::ConnectivityChanged { online: false },
        ]
    );
}

#[tokio::test]
async fn mutation_during_drain_is_synced_by_follow_up_pass() {
    let (store, _rx, remote, repo) = setup().await;

    store.add_task(TaskDraft::new("First")).await.unwrap();
    remote.pause_first_create.store(true, Ordering::SeqCst);

    let draining = {
        let store = Arc::clone(&store);
        tokio::spawn(async move { store.set_online_status(true).await })
    };
    remote.entered.notified().await;

    // The drain is parked inside the first create.
    store.add_task(TaskDraft::new("Second")).await.unwrap();
    assert_eq!(store.pending_actions().await.len(), 2);
    assert!(store.sync_state().await.is_loading);

    remote.gate.add_permits(1);
    draining.await.unwrap();

    assert!(store.pending_actions().await.is_empty());
    let titles: Vec<String> = repo.list().await.into_iter().map(|t| t.title).collect();
    assert_eq!(titles, vec!["First", "Second"]);
    let local = store.tasks().await;
    assert_eq!(local.len(), 2);
    assert!(local.iter().all(|t| t.synced && !is_temporary_id(&t.id)));
}

#[tokio::test]
async fn going_offline_stops_draining_new_mutations() {
    let (store, _rx, _remote, repo) = setup().await;

    store.set_online_status(true).await;
    store.add_task(TaskDraft::new("Online")).await.unwrap();
    assert_eq!(repo.list().await.len(), 1);

    store.set_online_status(false).await;
    store.add_task(TaskDraft::new("Offline")).await.unwrap();
    assert_eq!(repo.list().await.len(), 1);
    assert_eq!(store.pending_actions().await.len(), 1);
}

#[tokio::test]
async fn cancelled_drain_does_not_block_later_syncs() {
    let (store, _rx, remote, repo) = setup().await;

    store.add_task(TaskDraft::new("First")).await.unwrap();
    remote.pause_first_create.store(true, Ordering::SeqCst);

    // The drain parks inside the first create and is dropped by the timeout.
    let timed_out = tokio::time::timeout(Duration::from_millis(200), store.set_online_status(true))
        .await
        .is_err();
    assert!(timed_out);

    let state = store.sync_state().await;
    assert!(state.is_online);
    assert!(!state.is_loading);
    assert_eq!(store.pending_actions().await.len(), 1);

    store.add_task(TaskDraft::new("Second")).await.unwrap();
    store.sync_with_server().await;

    assert!(store.pending_actions().await.is_empty());
    assert!(!store.sync_state().await.is_loading);
    let titles: Vec<String> = repo.list().await.into_iter().map(|t| t.title).collect();
    assert_eq!(titles, vec!["First", "Second"]);
}

#[tokio::test]
async fn aborted_drain_task_releases_the_drain() {
    let (store, _rx, remote, repo) = setup().await;

    store.add_task(TaskDraft::new("First")).await.unwrap();
    remote.pause_first_create.store(true, Ordering::SeqCst);

    let draining = {
        let store = Arc::clone(&store);
        tokio::spawn(async move { store.set_online_status(true).await })
    };
    remote.entered.notified().await;
    assert!(store.sync_state().await.is_loading);

    draining.abort();
    assert!(draining.await.unwrap_err().is_cancelled());
    assert!(!store.sync_state().await.is_loading);

    let state = store.retry_sync().await;
    assert!(state.error.is_none());
    assert!(state.last_sync.is_some());
    assert!(store.pending_actions().await.is_empty());
    assert_eq!(repo.list().await.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_online_mutations_leave_nothing_queued() {
    let (store, _rx, _remote, repo) = setup().await;
    store.set_online_status(true).await;

    let handles: Vec<_> = (0..24)
        .map(|i| {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                store
                    .add_task(TaskDraft::new(format!("Task {i}")))
                    .await
                    .unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    assert!(store.pending_actions().await.is_empty());
    assert!(!store.sync_state().await.is_loading);
    assert_eq!(repo.list().await.len(), 24);
    let local = store.tasks().await;
    assert_eq!(local.len(), 24);
    assert!(local.iter().all(|t| t.synced));
}
