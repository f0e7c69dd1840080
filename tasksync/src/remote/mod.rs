//! Remote task service: CRUD over the server's `tasks` resource.
//!
//! Defines the [`RemoteTaskService`] trait the sync engine drains the
//! pending-action queue against. Concrete implementations include:
//! - [`http::HttpTaskService`]: JSON over HTTP via `reqwest`
//!
//! Failures are classified so callers can tell transient from permanent
//! errors: [`RemoteError::Network`] and [`RemoteError::Server`] are retried
//! by [`retry::with_retry`]; [`RemoteError::Client`] fails immediately.

pub mod http;
pub mod retry;

use std::time::Duration;

use tasksync_proto::{NewTask, Task, TaskPatch};

pub use http::HttpTaskService;
pub use retry::with_retry;

/// Errors that can occur when talking to the remote task service.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    /// No response was received (connection refused, DNS, timeout).
    #[error("network error: {0}")]
    Network(String),

    /// The server answered with a 5xx status.
    #[error("server error ({status}): {message}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Response body or reason phrase.
        message: String,
    },

    /// The server rejected the request with a 4xx status.
    #[error("client error ({status}): {message}")]
    Client {
        /// HTTP status code.
        status: u16,
        /// Response body or reason phrase.
        message: String,
    },

    /// The response body could not be decoded.
    #[error("invalid response body: {0}")]
    Decode(String),
}

impl RemoteError {
    /// Whether this error is transient and the call may be retried.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Server { .. })
    }

    /// HTTP status code carried by the error, if any.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Server { status, .. } | Self::Client { status, .. } => Some(*status),
            Self::Network(_) | Self::Decode(_) => None,
        }
    }

    /// Whether the server reported the target as not found.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Client { status: 404, .. })
    }
}

/// Configuration for the bounded retry applied to every remote call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total number of attempts, including the first.
    pub max_attempts: u32,
    /// Fixed delay between attempts.
    pub delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(1000),
        }
    }
}

/// CRUD over the remote `tasks` collection.
///
/// Each mutating call carries an idempotency key (the pending action's id)
/// so a server that records keys can recognize a replayed request.
pub trait RemoteTaskService: Send + Sync {
    /// Fetch the authoritative task list.
    fn list(&self) -> impl std::future::Future<Output = Result<Vec<Task>, RemoteError>> + Send;

    /// Fetch a single task.
    fn get(
        &self,
        id: &str,
    ) -> impl std::future::Future<Output = Result<Task, RemoteError>> + Send;

    /// Create a task and return the server's copy (with its assigned id).
    fn create(
        &self,
        task: &NewTask,
        idempotency_key: &str,
    ) -> impl std::future::Future<Output = Result<Task, RemoteError>> + Send;

    /// Apply a partial update and return the server's copy.
    fn update(
        &self,
        id: &str,
        patch: &TaskPatch,
        idempotency_key: &str,
    ) -> impl std::future::Future<Output = Result<Task, RemoteError>> + Send;

    /// Delete a task.
    fn delete(
        &self,
        id: &str,
        idempotency_key: &str,
    ) -> impl std::future::Future<Output = Result<(), RemoteError>> + Send;

    /// Returns `true` if the service answers its health endpoint.
    fn health_check(&self) -> impl std::future::Future<Output = bool> + Send;
}

impl<R: RemoteTaskService> RemoteTaskService for std::sync::Arc<R> {
    async fn list(&self) -> Result<Vec<Task>, RemoteError> {
        (**self).list().await
    }

    async fn get(&self, id: &str) -> Result<Task, RemoteError> {
        (**self).get(id).await
    }

    async fn create(&self, task: &NewTask, idempotency_key: &str) -> Result<Task, RemoteError> {
        (**self).create(task, idempotency_key).await
    }

    async fn update(
        &self,
        id: &str,
        patch: &TaskPatch,
        idempotency_key: &str,
    ) -> Result<Task, RemoteError> {
        (**self).update(id, patch, idempotency_key).await
    }

    async fn delete(&self, id: &str, idempotency_key: &str) -> Result<(), RemoteError> {
        (**self).delete(id, idempotency_key).await
    }

    async fn health_check(&self) -> bool {
        (**self).health_check().await
    }
}
