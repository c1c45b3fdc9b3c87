use crate::auth::{AuthState, CurrentUser};
use crate::web::api::ErrorResponse;
use axum::{
    Json,
    extract::{Request, State},
    http::{HeaderMap, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

/// Extracts the bearer token from an Authorization header value.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// API authentication middleware that extracts the current user from Authorization Bearer header.
/// Sets the CurrentUser extension if a valid JWT token is found in the Authorization header.
pub async fn auth_user_middleware(
    State(state): State<Arc<AuthState>>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(token) = bearer_token(&headers) {
        match state.verify_token(token) {
            Ok(current_user) => {
                request.extensions_mut().insert(current_user);
            }
            Err(err) => tracing::debug!("Rejected bearer token: {}", err),
        }
    }

    next.run(request).await
}

/// Middleware that ensures the current user is authenticated.
/// Returns UNAUTHORIZED if the CurrentUser extension is not found in the request.
/// This middleware should be applied after auth_user_middleware.
pub async fn require_auth_middleware(request: Request, next: Next) -> Response {
    let is_authenticated = request.extensions().get::<CurrentUser>().is_some();

    if !is_authenticated {
        return (StatusCode::UNAUTHORIZED, Json(ErrorResponse::unauthorized())).into_response();
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::extract::Extension;
    use axum::http::Request;
    use axum::middleware::{from_fn, from_fn_with_state};
    use tower::ServiceExt;
    use uuid::Uuid;

    fn test_app(auth_state: Arc<AuthState>) -> axum::Router {
        // Layers are applied in reverse order (bottom to top)
        axum::Router::new()
            .route(
                "/protected",
                axum::routing::get(|Extension(user): Extension<CurrentUser>| async move {
                    user.username
                }),
            )
            .layer(from_fn(require_auth_middleware))
            .layer(from_fn_with_state(auth_state, auth_user_middleware))
    }

    fn auth_state() -> Arc<AuthState> {
        Arc::new(AuthState {
            jwt_secret: "test_secret".to_string(),
            token_ttl: chrono::Duration::hours(1),
        })
    }

    #[tokio::test]
    async fn auth_middlewares_work_together() {
        let auth_state = auth_state();
        let app = test_app(auth_state.clone());

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/protected")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let user = CurrentUser::new(Uuid::now_v7(), "alice".to_string());
        let token = auth_state.issue_token(&user).unwrap();
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/protected")
                    .header("authorization", format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(body, "alice");
    }

    #[tokio::test]
    async fn rejects_token_without_bearer_scheme() {
        let auth_state = auth_state();
        let user = CurrentUser::new(Uuid::now_v7(), "alice".to_string());
        let token = auth_state.issue_token(&user).unwrap();

        let response = test_app(auth_state)
            .oneshot(
                Request::builder()
                    .uri("/protected")
                    .header("authorization", token)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn can_extract_bearer_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, "Bearer abc.def".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("abc.def"));

        headers.insert(header::AUTHORIZATION, "Bearer ".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, "Basic YWxhZGRpbg==".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);
    }
}
