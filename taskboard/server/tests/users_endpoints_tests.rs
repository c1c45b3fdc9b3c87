use axum::Router;
use axum::http::{Method, StatusCode};
use insta::assert_json_snapshot;
use serde_json::{Value, json};
use taskboard_server::web::create_app;

mod common;

use common::send;

async fn setup() -> anyhow::Result<Router> {
    let db = common::setup_db().await?;
    Ok(create_app(&common::test_config(), db))
}

async fn register(app: &Router, username: &str, password: &str) -> (StatusCode, Value) {
    send(
        app,
        Method::POST,
        "/api/users/register",
        None,
        Some(json!({"username": username, "password": password})),
    )
    .await
}

async fn login(app: &Router, username: &str, password: &str) -> (StatusCode, Value) {
    send(
        app,
        Method::POST,
        "/api/users/login",
        None,
        Some(json!({"username": username, "password": password})),
    )
    .await
}

#[tokio::test]
async fn can_register_and_login() {
    let app = setup().await.expect("Failed to setup test app");

    let (status, user) = register(&app, "alice", "correct horse").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(user["username"], "alice");
    assert!(user["id"].is_string());
    assert!(user.get("password_hash").is_none());

    let (status, body) = login(&app, "alice", "correct horse").await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().expect("token should be a string");

    // The issued token opens the task routes.
    let authorization = format!("Bearer {}", token);
    let (status, created) = send(
        &app,
        Method::POST,
        "/api/tasks",
        Some(&authorization),
        Some(json!({"title": "First task"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, tasks) = send(&app, Method::GET, "/api/tasks", Some(&authorization), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tasks, json!([created]));
}

#[tokio::test]
async fn cannot_register_taken_username() {
    let app = setup().await.expect("Failed to setup test app");
    register(&app, "alice", "first").await;

    let (status, body) = register(&app, "alice", "second").await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_json_snapshot!("username_taken", body);
}

#[tokio::test]
async fn cannot_register_without_username_or_password() {
    let app = setup().await.expect("Failed to setup test app");

    let (status, body) = register(&app, "  ", "secret").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "VALIDATION_ERROR");

    let (status, body) = register(&app, "alice", "").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn rejects_credentials_body_missing_fields() {
    let app = setup().await.expect("Failed to setup test app");

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/users/register",
        None,
        Some(json!({"username": "alice"})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn wrong_password_and_unknown_user_are_rejected_alike() {
    let app = setup().await.expect("Failed to setup test app");
    register(&app, "alice", "correct horse").await;

    let (wrong_status, wrong_body) = login(&app, "alice", "battery staple").await;
    let (unknown_status, unknown_body) = login(&app, "mallory", "correct horse").await;

    assert_eq!(wrong_status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_body, unknown_body);
    assert_json_snapshot!("invalid_credentials", wrong_body);
}
