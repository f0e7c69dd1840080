//! Subcommands of the `tasksync` binary and their execution against a
//! [`TaskStore`].

use std::io::Write;

use tasksync_proto::{Priority, Task, TaskDraft, TaskPatch};

use crate::remote::RemoteTaskService;
use crate::storage::KeyValueStore;
use crate::store::{StoreError, SyncState, TaskStore};

/// Errors reported by a CLI command.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// The store rejected the mutation.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// No task has the given id.
    #[error("no task with id {0}")]
    NotFound(String),

    /// `update` was given no fields to change.
    #[error("nothing to update (pass --title, --description, --priority, or --completed)")]
    EmptyUpdate,

    /// The drain failed. Pending actions are kept for the next run.
    #[error("sync failed: {0}")]
    SyncFailed(String),

    /// Writing output failed.
    #[error("output error: {0}")]
    Io(#[from] std::io::Error),
}

/// A `tasksync` subcommand.
#[derive(clap::Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List tasks, optionally filtered.
    List {
        /// Only show tasks whose title or description contains this text.
        #[arg(long)]
        search: Option<String>,
    },
    /// Add a task.
    Add {
        /// Task title.
        title: String,
        /// Task description.
        #[arg(long)]
        description: Option<String>,
        /// Priority (low, medium, high).
        #[arg(long)]
        priority: Option<Priority>,
    },
    /// Change fields of a task.
    Update {
        /// Task id.
        id: String,
        /// New title.
        #[arg(long)]
        title: Option<String>,
        /// New description.
        #[arg(long, conflicts_with = "clear_description")]
        description: Option<String>,
        /// Remove the description.
        #[arg(long)]
        clear_description: bool,
        /// New priority (low, medium, high).
        #[arg(long)]
        priority: Option<Priority>,
        /// Mark completed or not.
        #[arg(long)]
        completed: Option<bool>,
    },
    /// Flip a task between done and not done.
    Toggle {
        /// Task id.
        id: String,
    },
    /// Delete a task.
    Delete {
        /// Task id.
        id: String,
    },
    /// Replay pending actions against the server now.
    Sync,
    /// Show connectivity and queue status.
    Status,
}

impl Default for Command {
    fn default() -> Self {
        Self::List { search: None }
    }
}

/// Runs `command` against `store`, writing human-readable output to `out`.
///
/// # Errors
///
/// Returns [`CliError`] if the command is rejected, targets an unknown
/// task, or a requested sync fails.
pub async fn execute<S, R, W>(
    store: &TaskStore<S, R>,
    command: Command,
    out: &mut W,
) -> Result<(), CliError>
where
    S: KeyValueStore,
    R: RemoteTaskService,
    W: Write,
{
    match command {
        Command::List { search } => {
            let tasks = match search.as_deref() {
                Some(query) => store.search(query).await,
                None => store.tasks().await,
            };
            if tasks.is_empty() {
                writeln!(out, "no tasks")?;
            }
            for task in &tasks {
                writeln!(out, "{}", format_task(task))?;
            }
        }
        Command::Add {
            title,
            description,
            priority,
        } => {
            let mut draft = TaskDraft::new(title).with_priority(priority.unwrap_or_default());
            draft.description = description;
            let added = store.add_task(draft).await?;
            writeln!(out, "added {}", format_task(&added))?;
        }
        Command::Update {
            id,
            title,
            description,
            clear_description,
            priority,
            completed,
        } => {
            let mut patch = TaskPatch::new(&id);
            patch.title = title;
            patch.description = if clear_description {
                Some(None)
            } else {
                description.map(Some)
            };
            patch.priority = priority;
            patch.completed = completed;
            if patch.is_empty() {
                return Err(CliError::EmptyUpdate);
            }
            let Some(updated) = store.update_task(&id, patch).await? else {
                return Err(CliError::NotFound(id));
            };
            let shown = store.task(&id).await.unwrap_or(updated);
            writeln!(out, "updated {}", format_task(&shown))?;
        }
        Command::Toggle { id } => {
            let Some(toggled) = store.toggle_task_complete(&id).await else {
                return Err(CliError::NotFound(id));
            };
            // Re-read so a completed drain shows as synced.
            let shown = store.task(&id).await.unwrap_or(toggled);
            writeln!(out, "{}", format_task(&shown))?;
        }
        Command::Delete { id } => {
            if !store.delete_task(&id).await {
                return Err(CliError::NotFound(id));
            }
            writeln!(out, "deleted {id}")?;
        }
        Command::Sync => {
            let pending = store.pending_actions().await.len();
            let state = store.retry_sync().await;
            if let Some(error) = state.error {
                return Err(CliError::SyncFailed(error));
            }
            if state.is_online {
                writeln!(out, "synced {pending} action(s)")?;
            } else {
                writeln!(out, "offline, {pending} pending action(s) kept")?;
            }
        }
        Command::Status => {
            let pending = store.pending_actions().await.len();
            writeln!(out, "{}", format_status(&store.sync_state().await, pending))?;
        }
    }
    Ok(())
}

/// One-line rendering: `[x] id  title (priority)`, with `*` for unsynced.
#[must_use]
pub fn format_task(task: &Task) -> String {
    let mark = if task.completed { 'x' } else { ' ' };
    let unsynced = if task.synced { "" } else { " *" };
    let mut line = format!(
        "[{mark}] {}  {} ({}){unsynced}",
        task.id, task.title, task.priority
    );
    if let Some(description) = &task.description {
        line.push_str("\n      ");
        line.push_str(description);
    }
    line
}

fn format_status(state: &SyncState, pending: usize) -> String {
    let connectivity = if state.is_online { "online" } else { "offline" };
    let last_sync = state
        .last_sync_at()
        .map_or_else(|| "never".to_string(), |t| t.to_rfc3339());
    let mut status =
        format!("{connectivity}, {pending} pending action(s), last sync: {last_sync}");
    if let Some(error) = &state.error {
        status.push_str("\nlast error: ");
        status.push_str(error);
    }
    status
}
