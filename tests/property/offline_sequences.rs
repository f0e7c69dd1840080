//! Property-based tests for offline mutation sequences.
//!
//! Uses proptest to verify, for any sequence of add / update / toggle /
//! delete issued while offline:
//! 1. The queue holds exactly one action per mutation, in issue order.
//! 2. The task list reflects each surviving task exactly once, in order.
//! 3. Saving and loading into a fresh store reproduces both.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;
use tasksync::remote::{HttpTaskService, RetryConfig};
use tasksync::storage::InMemoryStore;
use tasksync::store::TaskStore;
use tasksync_proto::{ActionKind, PendingAction, Task, TaskDraft, TaskPatch};

// --- Strategies ---

#[derive(Debug, Clone)]
enum Op {
    Add(String),
    Rename(usize, String),
    Toggle(usize),
    Delete(usize),
}

fn arb_title() -> impl Strategy<Value = String> {
    "[a-z][a-z ]{0,15}"
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => arb_title().prop_map(Op::Add),
        2 => (0usize..64, arb_title()).prop_map(|(i, t)| Op::Rename(i, t)),
        2 => (0usize..64).prop_map(Op::Toggle),
        2 => (0usize..64).prop_map(Op::Delete),
    ]
}

// --- Harness ---

type Store = TaskStore<Arc<InMemoryStore>, HttpTaskService>;

/// A store that stays offline; the remote is never contacted.
fn offline_store(storage: &Arc<InMemoryStore>) -> Store {
    let remote = HttpTaskService::new(
        "http://127.0.0.1:9",
        Duration::from_millis(100),
        RetryConfig {
            max_attempts: 1,
            delay: Duration::from_millis(1),
        },
    )
    .unwrap();
    TaskStore::new(Arc::clone(storage), remote, 16).0
}

/// Expected list entry: id, title, completed.
type Expected = (String, String, bool);

struct Run {
    expected: Vec<Expected>,
    kinds: Vec<ActionKind>,
    tasks: Vec<Task>,
    pending: Vec<PendingAction>,
    reloaded_tasks: Vec<Task>,
    reloaded_pending: Vec<PendingAction>,
}

async fn apply(store: &Store, op: Op, expected: &mut Vec<Expected>, kinds: &mut Vec<ActionKind>) {
    // Ops that target a task fall back to an add while the list is empty.
    let op = match op {
        Op::Rename(_, title) if expected.is_empty() => Op::Add(title),
        Op::Toggle(_) | Op::Delete(_) if expected.is_empty() => Op::Add("fallback".into()),
        op => op,
    };

    match op {
        Op::Add(title) => {
            let task = store.add_task(TaskDraft::new(title.clone())).await.unwrap();
            expected.push((task.id, title, false));
            kinds.push(ActionKind::Create);
        }
        Op::Rename(i, title) => {
            let index = i % expected.len();
            let id = expected[index].0.clone();
            store
                .update_task(&id, TaskPatch::new("").title(title.clone()))
                .await
                .unwrap()
                .unwrap();
            expected[index].1 = title;
            kinds.push(ActionKind::Update);
        }
        Op::Toggle(i) => {
            let index = i % expected.len();
            let id = expected[index].0.clone();
            store.toggle_task_complete(&id).await.unwrap();
            expected[index].2 = !expected[index].2;
            kinds.push(ActionKind::Update);
        }
        Op::Delete(i) => {
            let index = i % expected.len();
            let (id, _, _) = expected.remove(index);
            assert!(store.delete_task(&id).await);
            kinds.push(ActionKind::Delete);
        }
    }
}

fn run(ops: Vec<Op>) -> Run {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    runtime.block_on(async move {
        let storage = Arc::new(InMemoryStore::new());
        let store = offline_store(&storage);
        let mut expected = Vec::new();
        let mut kinds = Vec::new();
        for op in ops {
            apply(&store, op, &mut expected, &mut kinds).await;
        }
        store.save_to_storage().await.unwrap();

        let fresh = offline_store(&storage);
        fresh.load_from_storage().await;

        Run {
            expected,
            kinds,
            tasks: store.tasks().await,
            pending: store.pending_actions().await,
            reloaded_tasks: fresh.tasks().await,
            reloaded_pending: fresh.pending_actions().await,
        }
    })
}

// --- Properties ---

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// One queued action per mutation, list membership and order match the
    /// model, and a fresh instance restores the same state.
    #[test]
    fn offline_sequence_queues_every_mutation(ops in prop::collection::vec(arb_op(), 0..40)) {
        let issued = ops.len();
        let run = run(ops);

        prop_assert_eq!(run.pending.len(), issued);
        let kinds: Vec<ActionKind> = run.pending.iter().map(PendingAction::kind).collect();
        prop_assert_eq!(&kinds, &run.kinds);
        let action_ids: HashSet<&str> = run.pending.iter().map(|a| a.id.as_str()).collect();
        prop_assert_eq!(action_ids.len(), issued);

        let listed: Vec<Expected> = run
            .tasks
            .iter()
            .map(|t| (t.id.clone(), t.title.clone(), t.completed))
            .collect();
        prop_assert_eq!(&listed, &run.expected);
        prop_assert!(run.tasks.iter().all(|t| !t.synced));

        prop_assert_eq!(&run.reloaded_tasks, &run.tasks);
        prop_assert_eq!(&run.reloaded_pending, &run.pending);
    }
}
