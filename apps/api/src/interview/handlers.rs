//! Axum route handlers for the Interview API.

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::stream::Stream;
use serde::Deserialize;
use tokio_stream::wrappers::WatchStream;
use tokio_stream::StreamExt;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::interview::session::{Pane, SessionView};
use crate::reveal::RevealFrame;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    pub answer: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/interviews
///
/// Creates a session and asks its first question.
pub async fn handle_start(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<SessionView>), AppError> {
    let view = state.interview.start().await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// GET /api/v1/interviews/:id
pub async fn handle_get_interview(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(state.interview.view(id)?))
}

/// DELETE /api/v1/interviews/:id
pub async fn handle_end_interview(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.interview.end(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/interviews/:id/next
pub async fn handle_next_question(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(state.interview.next_question(id).await?))
}

/// POST /api/v1/interviews/:id/skip
///
/// Same flow as next; logged separately.
pub async fn handle_skip_question(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    info!("Interview {id}: question skipped");
    Ok(Json(state.interview.next_question(id).await?))
}

/// PUT /api/v1/interviews/:id/answer
pub async fn handle_draft_answer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<AnswerRequest>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(state.interview.update_answer(id, request.answer)?))
}

/// POST /api/v1/interviews/:id/submit
pub async fn handle_submit_answer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<AnswerRequest>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(state.interview.submit_answer(id, request.answer).await?))
}

/// POST /api/v1/interviews/:id/feedback/detailed
pub async fn handle_detailed_feedback(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(state.interview.detailed_feedback(id).await?))
}

/// GET /api/v1/interviews/:id/surfaces/:surface
pub async fn handle_surface_snapshot(
    State(state): State<AppState>,
    Path((id, pane)): Path<(Uuid, Pane)>,
) -> Result<Json<RevealFrame>, AppError> {
    let surface = state
        .interview
        .sessions()
        .surface(id, pane)
        .ok_or_else(|| AppError::NotFound(format!("Interview {id} not found")))?;
    Ok(Json(surface.snapshot()))
}

/// GET /api/v1/interviews/:id/surfaces/:surface/events
///
/// SSE stream of frames, starting with the current one.
pub async fn handle_surface_events(
    State(state): State<AppState>,
    Path((id, pane)): Path<(Uuid, Pane)>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let surface = state
        .interview
        .sessions()
        .surface(id, pane)
        .ok_or_else(|| AppError::NotFound(format!("Interview {id} not found")))?;

    let stream = WatchStream::new(surface.subscribe()).map(|frame| {
        let json = serde_json::to_string(&frame).unwrap_or_default();
        Ok(Event::default().event("frame").data(json))
    });

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    ))
}
