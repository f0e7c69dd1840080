//! Durable key/value storage for the task store.
//!
//! Defines the [`KeyValueStore`] trait the task store persists through, plus
//! two implementations:
//! - [`memory::InMemoryStore`]: in-process map, used by tests
//! - [`file::FileStore`]: one JSON file per key under a data directory
//!
//! Values are opaque JSON strings; encoding lives in
//! [`tasksync_proto::codec`].

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::InMemoryStore;

/// Key holding the ordered task list.
pub const TASKS_KEY: &str = "tasks";

/// Key holding the ordered pending-action queue.
pub const PENDING_ACTIONS_KEY: &str = "pendingActions";

/// Key holding the last successful sync time (epoch milliseconds).
pub const LAST_SYNC_KEY: &str = "lastSync";

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The underlying storage is full or unavailable.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// A write operation failed.
    #[error("write failed: {0}")]
    WriteFailed(String),

    /// A read operation failed.
    #[error("read failed: {0}")]
    ReadFailed(String),

    /// A stored value could not be decoded.
    #[error("corrupt value under {key}: {reason}")]
    Corrupt {
        /// Key whose value is corrupt.
        key: String,
        /// Decoder message.
        reason: String,
    },
}

/// Async key/value persistence.
///
/// Implementations must make a completed [`set`](KeyValueStore::set) visible
/// to every later [`get`](KeyValueStore::get), including from a fresh
/// instance over the same backing medium.
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`, or `None` if absent.
    fn get(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<Option<String>, StorageError>> + Send;

    /// Store `value` under `key`, replacing any previous value.
    fn set(
        &self,
        key: &str,
        value: &str,
    ) -> impl std::future::Future<Output = Result<(), StorageError>> + Send;

    /// Remove the value under `key`. Removing an absent key succeeds.
    fn remove(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<(), StorageError>> + Send;
}

impl<S: KeyValueStore> KeyValueStore for std::sync::Arc<S> {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        (**self).remove(key).await
    }
}
