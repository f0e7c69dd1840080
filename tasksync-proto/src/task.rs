//! Task model shared by the `TaskSync` client and server.
//!
//! A [`Task`] lives in one of two id spaces: client-generated temporary ids
//! (see [`temporary_id`]) for tasks the server has not acknowledged yet, and
//! server-assigned ids once synced. Partial updates travel as a typed
//! [`TaskPatch`] instead of an open-ended map.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Maximum allowed task title length in characters.
pub const MAX_TITLE_LENGTH: usize = 256;

/// Prefix carried by every client-generated task id.
pub const TEMP_ID_PREFIX: &str = "temp-";

/// Generates a fresh temporary task id.
///
/// The suffix is a UUID v7, so the id embeds the creation timestamp and stays
/// unique for creations within the same millisecond.
#[must_use]
pub fn temporary_id() -> String {
    format!("{TEMP_ID_PREFIX}{}", Uuid::now_v7())
}

/// Returns `true` if `id` was generated locally and never acknowledged.
#[must_use]
pub fn is_temporary_id(id: &str) -> bool {
    id.starts_with(TEMP_ID_PREFIX)
}

/// Error returned when task input fails validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// The title is empty or whitespace only.
    #[error("task title cannot be empty")]
    EmptyTitle,
    /// The title exceeds [`MAX_TITLE_LENGTH`] characters.
    #[error("task title too long ({len} characters, max {max})")]
    TitleTooLong {
        /// Actual length in characters.
        len: usize,
        /// Maximum allowed length in characters.
        max: usize,
    },
}

/// Validates a task title against [`MAX_TITLE_LENGTH`].
///
/// # Errors
///
/// See [`validate_title_with`].
pub fn validate_title(title: &str) -> Result<(), ValidationError> {
    validate_title_with(title, MAX_TITLE_LENGTH)
}

/// Validates a task title against a custom character limit.
///
/// # Errors
///
/// Returns [`ValidationError::EmptyTitle`] if the trimmed title is empty, or
/// [`ValidationError::TitleTooLong`] if it has more than `max` characters.
pub fn validate_title_with(title: &str, max: usize) -> Result<(), ValidationError> {
    if title.trim().is_empty() {
        return Err(ValidationError::EmptyTitle);
    }
    let len = title.chars().count();
    if len > max {
        return Err(ValidationError::TitleTooLong { len, max });
    }
    Ok(())
}

/// Task priority.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Low priority.
    Low,
    /// Medium priority (default).
    #[default]
    Medium,
    /// High priority.
    High,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(format!("unknown priority: {other}")),
        }
    }
}

/// A to-do item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Temporary (`temp-…`) or server-assigned identifier.
    pub id: String,
    /// Non-empty title.
    pub title: String,
    /// Optional free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether the task is done.
    #[serde(default)]
    pub completed: bool,
    /// Task priority.
    #[serde(default)]
    pub priority: Priority,
    /// When the task was created.
    pub created_at: DateTime<Utc>,
    /// When the task was last mutated locally.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// `true` iff the server has acknowledged the current local state.
    #[serde(default)]
    pub synced: bool,
}

impl Task {
    /// Builds a new, unsynced task with a temporary id from a draft.
    #[must_use]
    pub fn from_draft(draft: TaskDraft, now: DateTime<Utc>) -> Self {
        Self {
            id: temporary_id(),
            title: draft.title,
            description: draft.description,
            completed: false,
            priority: draft.priority,
            created_at: now,
            updated_at: Some(now),
            synced: false,
        }
    }

    /// Returns `true` if the title or description contains `needle`
    /// (case-insensitive). An empty needle matches everything.
    #[must_use]
    pub fn matches(&self, needle: &str) -> bool {
        let needle = needle.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        self.title.to_lowercase().contains(&needle)
            || self
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(&needle))
    }
}

/// Caller-supplied fields for a task that does not exist yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskDraft {
    /// Task title.
    pub title: String,
    /// Optional description.
    pub description: Option<String>,
    /// Task priority.
    pub priority: Priority,
}

impl TaskDraft {
    /// Creates a medium-priority draft with no description.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}

/// Body of a create call: a task minus its id and creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    /// Task title.
    pub title: String,
    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether the task is done.
    #[serde(default)]
    pub completed: bool,
    /// Task priority.
    #[serde(default)]
    pub priority: Priority,
    /// Last local mutation time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<&Task> for NewTask {
    fn from(task: &Task) -> Self {
        Self {
            title: task.title.clone(),
            description: task.description.clone(),
            completed: task.completed,
            priority: task.priority,
            updated_at: task.updated_at,
        }
    }
}

/// Explicit partial update of a task.
///
/// Absent fields are left untouched. `description: Some(None)` clears the
/// description, which JSON expresses as `"description": null`. Unknown keys
/// are rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TaskPatch {
    /// Target task id. Empty when the patch travels as a request body whose
    /// path already names the task.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// New title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// New description, or `Some(None)` to clear it.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_present"
    )]
    pub description: Option<Option<String>>,
    /// New completion flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    /// New priority.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    /// Mutation time stamped by the client.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl TaskPatch {
    /// Creates an empty patch targeting `id`.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Sets the title.
    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Sets or clears the description.
    #[must_use]
    pub fn description(mut self, description: Option<String>) -> Self {
        self.description = Some(description);
        self
    }

    /// Sets the completion flag.
    #[must_use]
    pub const fn completed(mut self, completed: bool) -> Self {
        self.completed = Some(completed);
        self
    }

    /// Sets the priority.
    #[must_use]
    pub const fn priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Returns `true` if no task field would change.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.completed.is_none()
            && self.priority.is_none()
    }

    /// Merges the patch into `task`. The id is never touched.
    pub fn apply_to(&self, task: &mut Task) {
        if let Some(title) = &self.title {
            task.title.clone_from(title);
        }
        if let Some(description) = &self.description {
            task.description.clone_from(description);
        }
        if let Some(completed) = self.completed {
            task.completed = completed;
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(updated_at) = self.updated_at {
            task.updated_at = Some(updated_at);
        }
    }
}

/// Id-only reference to a task, used as the payload of a delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRef {
    /// Target task id.
    pub id: String,
}

/// Deserializes a present field (even `null`) as `Some(_)`, so that an
/// explicit `null` can be told apart from an absent key.
fn deserialize_present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}
