use axum::extract::State;
use axum::{routing::get, Json, Router};

use crate::api::errors::ApiError;
use crate::api::guards::CurrentStudent;
use crate::core::state::AppState;
use crate::schemas::attempt::AttemptResponse;

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/me", get(list_my_attempts))
}

async fn list_my_attempts(
    CurrentStudent(student): CurrentStudent,
    State(state): State<AppState>,
) -> Result<Json<Vec<AttemptResponse>>, ApiError> {
    let attempts = state
        .store()
        .list_student_attempts(&student.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list attempts"))?;

    Ok(Json(
        attempts.into_iter().map(|attempt| AttemptResponse::from_attempt(attempt, None)).collect(),
    ))
}
