//! Shared data model for `TaskSync`: tasks, patches, pending actions, and
//! the JSON codec for persisted state.

pub mod action;
pub mod codec;
pub mod task;

pub use action::{ActionKind, PendingAction, PendingOp};
pub use task::{NewTask, Priority, Task, TaskDraft, TaskPatch, TaskRef, ValidationError};
