//! HTTP implementation of [`RemoteTaskService`].
//!
//! Routes, relative to the base URL:
//!
//! | Operation | Request |
//! |-----------|---------|
//! | list      | `GET /tasks` |
//! | get       | `GET /tasks/{id}` |
//! | create    | `POST /tasks` |
//! | update    | `PUT /tasks/{id}` |
//! | delete    | `DELETE /tasks/{id}` |
//! | health    | `GET /health` |
//!
//! Mutating requests carry the action id in an `Idempotency-Key` header.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use tasksync_proto::{NewTask, Task, TaskPatch};

use super::{RemoteError, RemoteTaskService, RetryConfig, with_retry};

/// Header carrying the pending action id on mutating requests.
pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// JSON-over-HTTP task service client.
#[derive(Debug, Clone)]
pub struct HttpTaskService {
    client: Client,
    base_url: String,
    /// `{base_url}/tasks`, parsed once so ids can be appended as segments.
    tasks_url: Url,
    retry: RetryConfig,
}

impl HttpTaskService {
    /// Build a client for the service at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::Network`] if the HTTP client cannot be built or
    /// `base_url` is not a valid base URL.
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        retry: RetryConfig,
    ) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Network(format!("failed to build HTTP client: {e}")))?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let tasks_url = Url::parse(&format!("{base_url}/tasks"))
            .map_err(|e| RemoteError::Network(format!("invalid base URL {base_url}: {e}")))?;
        if tasks_url.cannot_be_a_base() {
            return Err(RemoteError::Network(format!(
                "invalid base URL {base_url}: cannot carry a path"
            )));
        }
        tracing::debug!(%base_url, ?timeout, max_attempts = retry.max_attempts, "http task service ready");
        Ok(Self {
            client,
            base_url,
            tasks_url,
            retry,
        })
    }

    /// Base URL without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// URL of one task; `id` is percent-encoded as a single path segment.
    fn task_url(&self, id: &str) -> Url {
        let mut url = self.tasks_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.push(id);
        }
        url
    }

    /// Send the request built by `build`, retrying transient failures.
    async fn execute(
        &self,
        operation: &str,
        build: impl Fn() -> RequestBuilder + Send + Sync,
    ) -> Result<Response, RemoteError> {
        with_retry(&self.retry, operation, || {
            let request = build();
            async move {
                let response = request.send().await.map_err(network_error)?;
                check_status(response).await
            }
        })
        .await
    }
}

fn network_error(e: reqwest::Error) -> RemoteError {
    RemoteError::Network(e.to_string())
}

async fn check_status(response: Response) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let code = status.as_u16();
    let body = response.text().await.unwrap_or_default();
    let message = if body.is_empty() {
        status.canonical_reason().unwrap_or("unknown").to_string()
    } else {
        body
    };
    if status.is_server_error() {
        Err(RemoteError::Server {
            status: code,
            message,
        })
    } else {
        Err(RemoteError::Client {
            status: code,
            message,
        })
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, RemoteError> {
    response
        .json::<T>()
        .await
        .map_err(|e| RemoteError::Decode(e.to_string()))
}

impl RemoteTaskService for HttpTaskService {
    async fn list(&self) -> Result<Vec<Task>, RemoteError> {
        let url = self.url("/tasks");
        let response = self.execute("list", || self.client.get(&url)).await?;
        decode(response).await
    }

    async fn get(&self, id: &str) -> Result<Task, RemoteError> {
        let url = self.task_url(id);
        let response = self.execute("get", || self.client.get(url.clone())).await?;
        decode(response).await
    }

    async fn create(&self, task: &NewTask, idempotency_key: &str) -> Result<Task, RemoteError> {
        let url = self.url("/tasks");
        let response = self
            .execute("create", || {
                self.client
                    .post(&url)
                    .header(IDEMPOTENCY_HEADER, idempotency_key)
                    .json(task)
            })
            .await?;
        decode(response).await
    }

    async fn update(
        &self,
        id: &str,
        patch: &TaskPatch,
        idempotency_key: &str,
    ) -> Result<Task, RemoteError> {
        let url = self.task_url(id);
        let response = self
            .execute("update", || {
                self.client
                    .put(url.clone())
                    .header(IDEMPOTENCY_HEADER, idempotency_key)
                    .json(patch)
            })
            .await?;
        decode(response).await
    }

    async fn delete(&self, id: &str, idempotency_key: &str) -> Result<(), RemoteError> {
        let url = self.task_url(id);
        self.execute("delete", || {
            self.client
                .delete(url.clone())
                .header(IDEMPOTENCY_HEADER, idempotency_key)
        })
        .await?;
        Ok(())
    }

    async fn health_check(&self) -> bool {
        match self.client.get(self.url("/health")).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::trace!(error = %e, "health check failed");
                false
            }
        }
    }
}
