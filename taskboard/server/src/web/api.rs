use std::sync::Arc;

use crate::{
    auth::{self, AuthState},
    task::{self, TaskState},
    user::{self, UserState},
};

use axum::{
    Json, Router,
    extract::rejection::JsonRejection,
    http::StatusCode,
    middleware::{from_fn, from_fn_with_state},
    routing::get,
};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, ToSchema};

/// JSON response for API errors
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
        }
    }

    pub fn unauthorized() -> Self {
        Self::new(
            "UNAUTHORIZED",
            "Authentication required to access this resource",
        )
    }

    pub fn task_not_found() -> Self {
        Self::new("NOT_FOUND", "Task not found")
    }

    pub fn invalid_body() -> Self {
        Self::new(
            "VALIDATION_ERROR",
            "Request body must be a JSON object with correctly typed fields",
        )
    }

    pub fn internal() -> Self {
        Self::new(
            "INTERNAL_ERROR",
            "An unexpected error occurred while processing your request. Please try again later.",
        )
    }
}

/// Maps a JSON body rejection to a 400 with a generic message. The serde detail is only logged.
pub fn invalid_json(rejection: JsonRejection) -> (StatusCode, Json<ErrorResponse>) {
    tracing::debug!("Rejected request body: {}", rejection.body_text());
    (StatusCode::BAD_REQUEST, Json(ErrorResponse::invalid_body()))
}

/// JSON response carrying a short confirmation message.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        user::api::v1::register_handler,
        user::api::v1::login_handler,
        task::api::v1::list_tasks_handler,
        task::api::v1::create_task_handler,
        task::api::v1::update_task_handler,
        task::api::v1::delete_task_handler,
    ),
    components(schemas(
        ErrorResponse,
        MessageResponse,
        task::NewTask,
        task::TaskPatch,
        task::api::v1::TaskJson,
        user::api::v1::CredentialsRequest,
        user::api::v1::UserJson,
        user::api::v1::LoginResponse,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "Tasks", description = "Per-user task management"),
        (name = "Users", description = "Account registration and login")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[tracing::instrument]
pub async fn openapi_handler() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Creates the API routes for JSON API endpoints.
pub fn create_api_router(
    auth_state: Arc<AuthState>,
    user_state: UserState,
    task_state: Arc<TaskState>,
) -> Router {
    let users_router = user::api::v1::create_api_router(user_state);
    let tasks_router = task::api::v1::create_api_router(task_state)
        .route_layer(from_fn(auth::api::v1::require_auth_middleware));
    let public_routes = users_router;
    let protected_routes = tasks_router;
    let api_routes = public_routes.merge(protected_routes);
    Router::new()
        .nest("/api", api_routes)
        .route("/api-docs/openapi.json", get(openapi_handler))
        .layer(ServiceBuilder::new().layer(from_fn_with_state(
            auth_state,
            auth::api::v1::auth_user_middleware,
        )))
}
