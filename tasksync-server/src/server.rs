//! HTTP front end for the [`TaskRepository`].
//!
//! Routes:
//!
//! | Method   | Path          | Success            |
//! |----------|---------------|--------------------|
//! | `GET`    | `/health`     | 200                |
//! | `GET`    | `/tasks`      | 200, task list     |
//! | `POST`   | `/tasks`      | 201, created task  |
//! | `GET`    | `/tasks/{id}` | 200, task          |
//! | `PUT`    | `/tasks/{id}` | 200, updated task  |
//! | `DELETE` | `/tasks/{id}` | 204                |
//!
//! Unknown ids answer 404, invalid titles 422. Mutations honour an
//! `Idempotency-Key` header: a repeated key gets the recorded response.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tasksync_proto::{NewTask, Task, TaskPatch};

use crate::store::{Mutation, Outcome, RepoError, TaskRepository};

/// Header carrying the client's idempotency key.
pub const IDEMPOTENCY_HEADER: &str = "idempotency-key";

#[derive(serde::Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for RepoError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        };
        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Builds the router over `repo`.
#[must_use]
pub fn router(repo: Arc<TaskRepository>) -> axum::Router {
    axum::Router::new()
        .route("/health", get(health))
        .route("/tasks", get(list_tasks).post(create_task))
        .route(
            "/tasks/{id}",
            get(get_task).put(update_task).delete(delete_task),
        )
        .with_state(repo)
}

/// Starts the task server on the given address and returns the bound address
/// and a join handle.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server(
    addr: &str,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    start_server_with_state(addr, Arc::new(TaskRepository::new())).await
}

/// Starts the task server over an existing repository.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server_with_state(
    addr: &str,
    repo: Arc<TaskRepository>,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    let app = router(repo);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "task server error");
        }
    });

    Ok((bound_addr, handle))
}

/// Starts the task server in-process for testing on an OS-assigned port.
#[cfg(test)]
pub async fn start_test_server() -> (std::net::SocketAddr, tokio::task::JoinHandle<()>) {
    start_server("127.0.0.1:0")
        .await
        .expect("failed to start test server")
}

fn idempotency_key(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(IDEMPOTENCY_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|k| !k.is_empty())
}

fn respond(success: StatusCode, outcome: Outcome) -> Response {
    match outcome {
        Ok(Some(task)) => (success, Json(task)).into_response(),
        Ok(None) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            tracing::debug!(error = %e, "request rejected");
            e.into_response()
        }
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn list_tasks(State(repo): State<Arc<TaskRepository>>) -> Json<Vec<Task>> {
    Json(repo.list().await)
}

async fn get_task(
    State(repo): State<Arc<TaskRepository>>,
    Path(id): Path<String>,
) -> Result<Json<Task>, RepoError> {
    repo.get(&id).await.map(Json)
}

async fn create_task(
    State(repo): State<Arc<TaskRepository>>,
    headers: HeaderMap,
    Json(new): Json<NewTask>,
) -> Response {
    let outcome = repo
        .apply(idempotency_key(&headers), Mutation::Create(new))
        .await;
    respond(StatusCode::CREATED, outcome)
}

async fn update_task(
    State(repo): State<Arc<TaskRepository>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(patch): Json<TaskPatch>,
) -> Response {
    let outcome = repo
        .apply(idempotency_key(&headers), Mutation::Update { id, patch })
        .await;
    respond(StatusCode::OK, outcome)
}

async fn delete_task(
    State(repo): State<Arc<TaskRepository>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let outcome = repo
        .apply(idempotency_key(&headers), Mutation::Delete { id })
        .await;
    respond(StatusCode::NO_CONTENT, outcome)
}
