use crate::auth::CurrentUser;
use crate::task::{NewTask, Task, TaskPatch, TaskService, TaskServiceError, TaskState};
use crate::web::api::{ErrorResponse, MessageResponse, invalid_json};
use axum::{
    Router,
    extract::{Extension, Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::Json,
    routing::{get, put},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

type ApiError = (StatusCode, Json<ErrorResponse>);

/// JSON representation of a Task for API responses. The owner is never exposed.
#[derive(Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TaskJson {
    /// Unique identifier for the task
    pub id: Uuid,
    /// Title of the task
    pub title: String,
    /// Free-form description, empty when none was given
    pub description: String,
    /// Whether the task has been completed
    pub completed: bool,
    /// When the task was created
    pub created_at: DateTime<Utc>,
}

impl From<Task> for TaskJson {
    fn from(task: Task) -> Self {
        Self {
            id: task.id(),
            title: task.title().to_string(),
            description: task.description().to_string(),
            completed: task.completed(),
            created_at: task.created_at(),
        }
    }
}

/// Maps a service error to the status code and body returned to the client.
fn error_response(err: TaskServiceError) -> ApiError {
    match err {
        TaskServiceError::Validation(message) => (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("VALIDATION_ERROR", message)),
        ),
        TaskServiceError::NotFound(_) => {
            (StatusCode::NOT_FOUND, Json(ErrorResponse::task_not_found()))
        }
        TaskServiceError::Database(err) => {
            tracing::error!("Task store failure: {}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::internal()),
            )
        }
    }
}

/// Parses a task ID from the path. Malformed IDs are reported exactly like missing tasks.
fn parse_task_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw)
        .map_err(|_| (StatusCode::NOT_FOUND, Json(ErrorResponse::task_not_found())))
}

/// Handler for GET /api/tasks - Returns the caller's tasks, newest first.
#[tracing::instrument(
    skip(state, user),
    fields(user_id = %user.id, username = %user.username)
)]
#[utoipa::path(
    get,
    path = "/api/tasks",
    responses(
        (status = 200, description = "Tasks owned by the caller, newest first", body = [TaskJson]),
        (status = 401, description = "Missing or invalid bearer token", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Tasks"
)]
pub async fn list_tasks_handler(
    State(state): State<Arc<TaskState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<Vec<TaskJson>>, ApiError> {
    let service = TaskService::new(&state.db);
    let tasks = service.list_tasks(user.id).await.map_err(error_response)?;
    Ok(Json(tasks.into_iter().map(TaskJson::from).collect()))
}

/// Handler for POST /api/tasks - Creates a task owned by the caller.
#[tracing::instrument(
    skip(state, user, payload),
    fields(user_id = %user.id, username = %user.username)
)]
#[utoipa::path(
    post,
    path = "/api/tasks",
    request_body = NewTask,
    responses(
        (status = 201, description = "Task created", body = TaskJson),
        (status = 400, description = "Title missing or blank, or body is not valid JSON", body = ErrorResponse),
        (status = 401, description = "Missing or invalid bearer token", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Tasks"
)]
pub async fn create_task_handler(
    State(state): State<Arc<TaskState>>,
    Extension(user): Extension<CurrentUser>,
    payload: Result<Json<NewTask>, JsonRejection>,
) -> Result<(StatusCode, Json<TaskJson>), ApiError> {
    let Json(payload) = payload.map_err(invalid_json)?;
    let service = TaskService::new(&state.db);
    let task = service
        .create_task(user.id, payload)
        .await
        .map_err(error_response)?;
    Ok((StatusCode::CREATED, Json(TaskJson::from(task))))
}

/// Handler for PUT /api/tasks/{id} - Applies a sparse patch to one of the caller's tasks.
#[tracing::instrument(
    skip(state, user, patch),
    fields(user_id = %user.id, username = %user.username)
)]
#[utoipa::path(
    put,
    path = "/api/tasks/{id}",
    params(
        ("id" = String, Path, description = "ID of the task to update")
    ),
    request_body = TaskPatch,
    responses(
        (status = 200, description = "Task updated", body = TaskJson),
        (status = 400, description = "Blank title supplied, or body is not valid JSON", body = ErrorResponse),
        (status = 401, description = "Missing or invalid bearer token", body = ErrorResponse),
        (status = 404, description = "No such task owned by the caller", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Tasks"
)]
pub async fn update_task_handler(
    State(state): State<Arc<TaskState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    patch: Result<Json<TaskPatch>, JsonRejection>,
) -> Result<Json<TaskJson>, ApiError> {
    let id = parse_task_id(&id)?;
    let Json(patch) = patch.map_err(invalid_json)?;
    let service = TaskService::new(&state.db);
    let task = service
        .update_task(user.id, id, patch)
        .await
        .map_err(error_response)?;
    Ok(Json(TaskJson::from(task)))
}

/// Handler for DELETE /api/tasks/{id} - Permanently removes one of the caller's tasks.
#[tracing::instrument(
    skip(state, user),
    fields(user_id = %user.id, username = %user.username)
)]
#[utoipa::path(
    delete,
    path = "/api/tasks/{id}",
    params(
        ("id" = String, Path, description = "ID of the task to delete")
    ),
    responses(
        (status = 200, description = "Task deleted", body = MessageResponse),
        (status = 401, description = "Missing or invalid bearer token", body = ErrorResponse),
        (status = 404, description = "No such task owned by the caller", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Tasks"
)]
pub async fn delete_task_handler(
    State(state): State<Arc<TaskState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = parse_task_id(&id)?;
    let service = TaskService::new(&state.db);
    service
        .delete_task(user.id, id)
        .await
        .map_err(error_response)?;
    Ok(Json(MessageResponse::new("Task deleted successfully")))
}

/// Creates and returns the tasks API router.
pub fn create_api_router(state: Arc<TaskState>) -> Router {
    Router::new()
        .route("/tasks", get(list_tasks_handler).post(create_task_handler))
        .route(
            "/tasks/{id}",
            put(update_task_handler).delete(delete_task_handler),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_id_is_reported_as_not_found() {
        let (status, Json(body)) = parse_task_id("not-a-uuid").unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.error, "NOT_FOUND");
    }

    #[test]
    fn database_errors_do_not_leak_details() {
        let err = TaskServiceError::Database(sea_orm::DbErr::Custom(
            "connection refused at 10.0.0.3".to_string(),
        ));
        let (status, Json(body)) = error_response(err);

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body.message.contains("10.0.0.3"));
    }

    #[test]
    fn task_json_uses_camel_case_and_omits_owner() {
        let task = Task::new(
            Uuid::now_v7(),
            "Buy milk".to_string(),
            String::new(),
            false,
            Uuid::now_v7(),
            Utc::now(),
        );
        let value = serde_json::to_value(TaskJson::from(task)).unwrap();
        let object = value.as_object().unwrap();

        assert!(object.contains_key("createdAt"));
        assert!(!object.contains_key("owner_id"));
        assert!(!object.contains_key("ownerId"));
        assert_eq!(object.len(), 5);
    }
}
