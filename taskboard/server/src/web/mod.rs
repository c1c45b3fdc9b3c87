use axum::Router;
use axum::http::header;
use migration::MigratorTrait;
use sea_orm::{Database, DatabaseConnection};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::sensitive_headers::SetSensitiveHeadersLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{AuthState, FilteredMakeSpan};
use crate::config::{self, Config};
use crate::task::TaskState;
use crate::user::UserState;

pub mod api;

#[tracing::instrument(skip(config))]
pub async fn start_web_server(config: config::Config) -> anyhow::Result<()> {
    let server_address = format!("0.0.0.0:{}", &config.port);
    let listener = tokio::net::TcpListener::bind(&server_address).await?;
    tracing::info!("Web server running on http://{}", server_address);

    let db = Database::connect(&config.db_url).await?;
    migration::Migrator::up(&db, None).await?;
    tracing::info!("Database migrations applied successfully");

    let app = create_app(&config, db);

    axum::serve(listener, app).await?;
    Ok(())
}

/// Builds the full application router around an already migrated database.
pub fn create_app(config: &Config, db: DatabaseConnection) -> Router {
    let auth_state = Arc::new(AuthState::from_config(config));
    let db = Arc::new(db);

    let user_state = UserState {
        db: db.clone(),
        auth: auth_state.clone(),
    };
    let task_state = Arc::new(TaskState { db });

    let api_router = api::create_api_router(auth_state, user_state, task_state);

    Router::new()
        .route("/health", axum::routing::get(health_check_handler))
        .merge(api_router)
        .layer(
            ServiceBuilder::new()
                .layer(SetSensitiveHeadersLayer::new([header::AUTHORIZATION]))
                .layer(TraceLayer::new_for_http().make_span_with(FilteredMakeSpan))
                .layer(CorsLayer::permissive()),
        )
}

#[tracing::instrument]
pub async fn health_check_handler() -> &'static str {
    "OK"
}
