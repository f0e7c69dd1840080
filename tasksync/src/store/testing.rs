//! In-process remote double for store unit tests.

use std::collections::VecDeque;

use chrono::Utc;
use parking_lot::Mutex;
use tasksync_proto::{NewTask, Task, TaskPatch};
use tokio::sync::mpsc;

use super::{StoreEvent, TaskStore};
use crate::remote::{RemoteError, RemoteTaskService};
use crate::storage::InMemoryStore;

#[derive(Default)]
struct Server {
    tasks: Vec<Task>,
    next_id: u64,
    calls: Vec<String>,
    script: VecDeque<Option<RemoteError>>,
    list_error: Option<RemoteError>,
}

/// Remote that keeps tasks in memory and can be told to fail specific calls.
#[derive(Default)]
pub(crate) struct ScriptedRemote {
    server: Mutex<Server>,
}

impl ScriptedRemote {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Outcomes for the next mutating calls, in order. `None` lets the call
    /// through; calls past the end of the script succeed.
    pub(crate) fn script(&self, outcomes: Vec<Option<RemoteError>>) {
        self.server.lock().script = outcomes.into();
    }

    pub(crate) fn fail_list(&self, error: Option<RemoteError>) {
        self.server.lock().list_error = error;
    }

    pub(crate) fn seed(&self, task: Task) {
        self.server.lock().tasks.push(task);
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.server.lock().calls.clone()
    }

    pub(crate) fn mutating_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| !c.starts_with("list"))
            .collect()
    }

    fn begin(&self, call: String) -> Result<(), RemoteError> {
        let mut server = self.server.lock();
        server.calls.push(call);
        match server.script.pop_front() {
            Some(Some(e)) => Err(e),
            _ => Ok(()),
        }
    }
}

fn not_found(id: &str) -> RemoteError {
    RemoteError::Client {
        status: 404,
        message: format!("task {id} not found"),
    }
}

impl RemoteTaskService for ScriptedRemote {
    async fn list(&self) -> Result<Vec<Task>, RemoteError> {
        let mut server = self.server.lock();
        server.calls.push("list".to_string());
        if let Some(e) = server.list_error.clone() {
            return Err(e);
        }
        Ok(server.tasks.clone())
    }

    async fn get(&self, id: &str) -> Result<Task, RemoteError> {
        let server = self.server.lock();
        server
            .tasks
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or_else(|| not_found(id))
    }

    async fn create(&self, task: &NewTask, _key: &str) -> Result<Task, RemoteError> {
        self.begin(format!("create {}", task.title))?;
        let mut server = self.server.lock();
        server.next_id += 1;
        let created = Task {
            id: format!("srv-{}", server.next_id),
            title: task.title.clone(),
            description: task.description.clone(),
            completed: task.completed,
            priority: task.priority,
            created_at: Utc::now(),
            updated_at: task.updated_at,
            synced: false,
        };
        server.tasks.push(created.clone());
        Ok(created)
    }

    async fn update(&self, id: &str, patch: &TaskPatch, _key: &str) -> Result<Task, RemoteError> {
        self.begin(format!("update {id}"))?;
        let mut server = self.server.lock();
        let task = server
            .tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| not_found(id))?;
        patch.apply_to(task);
        Ok(task.clone())
    }

    async fn delete(&self, id: &str, _key: &str) -> Result<(), RemoteError> {
        self.begin(format!("delete {id}"))?;
        let mut server = self.server.lock();
        let before = server.tasks.len();
        server.tasks.retain(|t| t.id != id);
        if server.tasks.len() == before {
            return Err(not_found(id));
        }
        Ok(())
    }

    async fn health_check(&self) -> bool {
        true
    }
}

pub(crate) type TestStore = TaskStore<InMemoryStore, ScriptedRemote>;

pub(crate) fn offline_store() -> (TestStore, mpsc::Receiver<StoreEvent>) {
    TaskStore::new(InMemoryStore::new(), ScriptedRemote::new(), 64)
}

pub(crate) async fn online_store() -> (TestStore, mpsc::Receiver<StoreEvent>) {
    let (store, rx) = offline_store();
    store.set_online_status(true).await;
    (store, rx)
}

pub(crate) fn drain_events(rx: &mut mpsc::Receiver<StoreEvent>) -> Vec<StoreEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
