use crate::auth::CurrentUser;
use crate::user::{User, UserService, UserServiceError, UserState};
use crate::web::api::{ErrorResponse, invalid_json};
use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    routing::post,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

type ApiError = (StatusCode, Json<ErrorResponse>);

/// JSON request payload for registering and logging in.
#[derive(Deserialize, ToSchema)]
pub struct CredentialsRequest {
    pub username: String,
    pub password: String,
}

/// JSON response describing a registered user.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserJson {
    pub id: Uuid,
    pub username: String,
}

impl From<User> for UserJson {
    fn from(user: User) -> Self {
        Self {
            id: user.id(),
            username: user.username().to_string(),
        }
    }
}

/// JSON response for successful API login
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
}

fn error_response(err: UserServiceError) -> ApiError {
    match err {
        UserServiceError::Validation(message) => (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("VALIDATION_ERROR", message)),
        ),
        UserServiceError::UsernameTaken(_) => (
            StatusCode::CONFLICT,
            Json(ErrorResponse::new(
                "USERNAME_TAKEN",
                "That username is already registered",
            )),
        ),
        UserServiceError::InvalidCredentials => (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse::new(
                "INVALID_CREDENTIALS",
                "Invalid username or password",
            )),
        ),
        err @ (UserServiceError::PasswordHash(_) | UserServiceError::Database(_)) => {
            tracing::error!("User account failure: {}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::internal()),
            )
        }
    }
}

/// Handler for POST /api/users/register - Creates a user account.
#[tracing::instrument(skip(state, payload))]
#[utoipa::path(
    post,
    path = "/api/users/register",
    request_body = CredentialsRequest,
    responses(
        (status = 201, description = "Account created", body = UserJson),
        (status = 400, description = "Username or password missing", body = ErrorResponse),
        (status = 409, description = "Username already registered", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Users"
)]
pub async fn register_handler(
    State(state): State<UserState>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<UserJson>), ApiError> {
    let Json(payload) = payload.map_err(invalid_json)?;
    let service = UserService::new(&state.db);
    let user = service
        .register(payload.username, &payload.password)
        .await
        .map_err(error_response)?;
    tracing::info!("Registered user {}", user.username());
    Ok((StatusCode::CREATED, Json(UserJson::from(user))))
}

/// Handles JSON login requests and returns a JWT token.
/// Validates credentials and returns either a success response with token or an error.
#[tracing::instrument(skip(state, payload))]
#[utoipa::path(
    post,
    path = "/api/users/login",
    request_body = CredentialsRequest,
    responses(
        (status = 200, description = "Bearer token issued", body = LoginResponse),
        (status = 401, description = "Invalid username or password", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Users"
)]
pub async fn login_handler(
    State(state): State<UserState>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let Json(payload) = payload.map_err(invalid_json)?;
    let service = UserService::new(&state.db);
    let user = service
        .authenticate(&payload.username, &payload.password)
        .await
        .map_err(error_response)?;

    let token = state
        .auth
        .issue_token(&CurrentUser::from(user))
        .map_err(|err| {
            tracing::error!("Failed to issue token: {}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new(
                    "JWT_ERROR",
                    "Failed to generate authentication token",
                )),
            )
        })?;

    Ok(Json(LoginResponse { token }))
}

/// Creates and returns the users API router.
pub fn create_api_router(state: UserState) -> Router {
    Router::new()
        .route("/users/register", post(register_handler))
        .route("/users/login", post(login_handler))
        .with_state(state)
}
