use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentStudent;
use crate::core::state::AppState;
use crate::schemas::session::{
    AnswerSelect, FocusEventReport, SessionResponse, SubmitPreviewResponse, SubmitResponse,
};
use crate::services::exam_session::SessionHandle;

pub(super) async fn get_session(
    Path(session_id): Path<String>,
    CurrentStudent(student): CurrentStudent,
    State(state): State<AppState>,
) -> Result<Json<SessionResponse>, ApiError> {
    let handle = owned_session(&state, &session_id, &student.id).await?;
    Ok(Json(SessionResponse::from(handle.view())))
}

pub(super) async fn select_answer(
    Path(session_id): Path<String>,
    CurrentStudent(student): CurrentStudent,
    State(state): State<AppState>,
    Json(payload): Json<AnswerSelect>,
) -> Result<Json<SessionResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let handle = owned_session(&state, &session_id, &student.id).await?;

    let view = handle.select_answer(payload.question_id, payload.option_index).await?;
    Ok(Json(SessionResponse::from(view)))
}

pub(super) async fn record_focus_event(
    Path(session_id): Path<String>,
    CurrentStudent(student): CurrentStudent,
    State(state): State<AppState>,
    Json(payload): Json<FocusEventReport>,
) -> Result<StatusCode, ApiError> {
    let handle = owned_session(&state, &session_id, &student.id).await?;
    handle.record_focus(payload.event).await;
    Ok(StatusCode::ACCEPTED)
}

pub(super) async fn submit_preview(
    Path(session_id): Path<String>,
    CurrentStudent(student): CurrentStudent,
    State(state): State<AppState>,
) -> Result<Json<SubmitPreviewResponse>, ApiError> {
    let handle = owned_session(&state, &session_id, &student.id).await?;
    Ok(Json(SubmitPreviewResponse::from(handle.submit_preview())))
}

/// Manual submission. Waits for the persistence outcome so the response carries either
/// the result or the retryable error.
pub(super) async fn submit(
    Path(session_id): Path<String>,
    CurrentStudent(student): CurrentStudent,
    State(state): State<AppState>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let handle = owned_session(&state, &session_id, &student.id).await?;

    let disposition = handle.submit().await;
    let view = handle.settled().await;

    Ok(Json(SubmitResponse { outcome: disposition.as_str(), session: SessionResponse::from(view) }))
}

pub(super) async fn teardown_session(
    Path(session_id): Path<String>,
    CurrentStudent(student): CurrentStudent,
    State(state): State<AppState>,
) -> Result<Json<SessionResponse>, ApiError> {
    let handle = owned_session(&state, &session_id, &student.id).await?;
    handle.teardown().await;
    Ok(Json(SessionResponse::from(handle.view())))
}

async fn owned_session(
    state: &AppState,
    session_id: &str,
    student_id: &str,
) -> Result<Arc<SessionHandle>, ApiError> {
    match state.sessions().get(session_id).await {
        Some(handle) if handle.candidate_id() == student_id => Ok(handle),
        // Other candidates' sessions are indistinguishable from missing ones.
        _ => Err(ApiError::NotFound("Session not found".to_string())),
    }
}
