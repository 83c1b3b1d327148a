// src/api/mod.rs — Local HTTP adapter over the active session
//
// Lets a browser or editor front-end drive the session: read snapshots,
// ask/retry/cancel/clear, submit feedback, and follow updates over SSE.

pub mod auth;
pub mod handlers;
pub mod types;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::{middleware, Router};
use tower_http::cors::CorsLayer;

use crate::feedback::FeedbackRecorder;
use crate::infra::config::ApiConfig;
use crate::session::SessionHandle;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub session: SessionHandle,
    pub recorder: Arc<FeedbackRecorder>,
    pub token: Option<String>,
}

/// Build the axum router with all API routes.
pub fn build_router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any);

    let protected = Router::new()
        .route("/api/v1/session", get(handlers::get_session))
        .route("/api/v1/session/events", get(handlers::session_events))
        .route("/api/v1/ask", post(handlers::ask))
        .route("/api/v1/retry", post(handlers::retry))
        .route("/api/v1/cancel", post(handlers::cancel))
        .route("/api/v1/clear", post(handlers::clear))
        .route("/api/v1/feedback", post(handlers::feedback))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_token,
        ));

    Router::new()
        .route("/api/v1/health", get(handlers::health))
        .merge(protected)
        .layer(cors)
        .with_state(state)
}

/// Serve the API on localhost until the process exits.
pub async fn start_server(config: &ApiConfig, state: ApiState) -> anyhow::Result<()> {
    let addr = format!("127.0.0.1:{}", config.port);
    let router = build_router(state);

    tracing::info!("API server listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}
