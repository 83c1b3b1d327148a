// src/api/handlers.rs

use std::convert::Infallible;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures::Stream;
use tokio::sync::broadcast::error::RecvError;

use crate::api::{types::*, ApiState};
use crate::feedback::{FeedbackRecord, FeedbackSubmission, Verdict};
use crate::infra::errors::QaError;
use crate::session::Session;

type ApiResult<T> = Result<Json<T>, ApiError>;

/// GET /api/v1/health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// GET /api/v1/session — Current session snapshot.
pub async fn get_session(State(state): State<ApiState>) -> ApiResult<Session> {
    state.session.snapshot().await.map(Json).map_err(api_error)
}

/// POST /api/v1/ask — Start a new question, superseding the current one.
pub async fn ask(
    State(state): State<ApiState>,
    Json(body): Json<AskRequest>,
) -> ApiResult<Session> {
    state
        .session
        .submit(body.question)
        .await
        .map(Json)
        .map_err(api_error)
}

/// POST /api/v1/retry
pub async fn retry(State(state): State<ApiState>) -> ApiResult<Session> {
    state.session.retry().await.map(Json).map_err(api_error)
}

/// POST /api/v1/cancel
pub async fn cancel(State(state): State<ApiState>) -> ApiResult<Session> {
    state.session.cancel().await.map(Json).map_err(api_error)
}

/// POST /api/v1/clear — Drop the current session and return to idle.
pub async fn clear(State(state): State<ApiState>) -> ApiResult<Session> {
    state.session.clear().await.map(Json).map_err(api_error)
}

/// POST /api/v1/feedback — Record which answer was better.
pub async fn feedback(
    State(state): State<ApiState>,
    Json(body): Json<FeedbackRequest>,
) -> ApiResult<FeedbackRecord> {
    let verdict: Verdict = body.verdict.parse().map_err(api_error)?;
    let snapshot = state.session.snapshot().await.map_err(api_error)?;

    if snapshot.id.as_deref() != Some(body.session_id.as_str()) {
        return Err(api_error(QaError::StaleSession {
            session_id: body.session_id,
        }));
    }

    let submission =
        FeedbackSubmission::for_session(&snapshot, verdict, body.comment).map_err(api_error)?;
    state
        .recorder
        .submit(submission)
        .await
        .map(Json)
        .map_err(api_error)
}

/// GET /api/v1/session/events — One `session` event per snapshot.
pub async fn session_events(
    State(state): State<ApiState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // Subscribe before reading the snapshot so no update falls in between.
    let mut updates = state.session.subscribe();
    let initial = state.session.snapshot().await.ok();

    let stream = async_stream::stream! {
        if let Some(session) = initial {
            yield Ok(session_event(&session));
        }
        loop {
            match updates.recv().await {
                Ok(session) => yield Ok(session_event(&session)),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Session event subscriber lagged, {} updates skipped", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

fn session_event(session: &Session) -> Event {
    Event::default()
        .event("session")
        .json_data(session)
        .unwrap_or_else(|_| Event::default().event("session").data("{}"))
}
