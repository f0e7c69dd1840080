//! JSON encoding for persisted `TaskSync` state.
//!
//! The durable store holds three JSON blobs: the ordered task list, the
//! ordered pending-action queue, and the last successful sync time in epoch
//! milliseconds. These helpers keep the error type uniform across them.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::action::PendingAction;
use crate::task::Task;

/// Error type for codec encode/decode operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Serialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
    /// The blob is not valid JSON for the expected type.
    #[error("malformed blob: {0}")]
    Malformed(String),
}

/// Encodes any serializable value as a JSON string.
///
/// # Errors
///
/// Returns `CodecError::Serialization` if the value cannot be serialized.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String, CodecError> {
    serde_json::to_string(value).map_err(|e| CodecError::Serialization(e.to_string()))
}

/// Decodes a JSON string into `T`.
///
/// # Errors
///
/// Returns `CodecError::Malformed` if the text cannot be deserialized.
pub fn decode<T: DeserializeOwned>(text: &str) -> Result<T, CodecError> {
    serde_json::from_str(text).map_err(|e| CodecError::Malformed(e.to_string()))
}

/// Encodes an ordered task list.
///
/// # Errors
///
/// Returns `CodecError::Serialization` if serialization fails.
pub fn encode_tasks(tasks: &[Task]) -> Result<String, CodecError> {
    encode(tasks)
}

/// Decodes an ordered task list.
///
/// # Errors
///
/// Returns `CodecError::Malformed` if the blob is not a task array.
pub fn decode_tasks(text: &str) -> Result<Vec<Task>, CodecError> {
    decode(text)
}

/// Encodes the pending-action queue, front first.
///
/// # Errors
///
/// Returns `CodecError::Serialization` if serialization fails.
pub fn encode_actions<'a, I>(actions: I) -> Result<String, CodecError>
where
    I: IntoIterator<Item = &'a PendingAction>,
{
    let actions: Vec<&PendingAction> = actions.into_iter().collect();
    encode(&actions)
}

/// Decodes the pending-action queue, front first.
///
/// # Errors
///
/// Returns `CodecError::Malformed` if the blob is not an action array.
pub fn decode_actions(text: &str) -> Result<Vec<PendingAction>, CodecError> {
    decode(text)
}
