use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::{CurrentStudent, CurrentTeacher, CurrentUser};
use crate::core::state::AppState;
use crate::core::time::now_utc;
use crate::db::models::ExamDefinition;
use crate::db::types::{ExamWindow, Role};
use crate::schemas::attempt::{AttemptResponse, ExamAnalyticsResponse};
use crate::schemas::exam::{ExamCreate, ExamResponse, ExamSummaryResponse, QuestionCreate};
use crate::schemas::session::SessionResponse;
use crate::services::{analytics, exam_window::exam_window};

pub(super) async fn create_exam(
    CurrentTeacher(teacher): CurrentTeacher,
    State(state): State<AppState>,
    Json(payload): Json<ExamCreate>,
) -> Result<(StatusCode, Json<ExamResponse>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let exam = ExamDefinition {
        id: Uuid::new_v4().to_string(),
        title: payload.title,
        description: payload.description,
        start_time: payload.start_time,
        duration_minutes: payload.duration_minutes,
        questions: payload.questions.into_iter().map(QuestionCreate::into_question).collect(),
        creator_id: teacher.id,
        stopped: false,
        created_at: now_utc(),
    };

    state
        .store()
        .create_exam(&exam)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to create exam"))?;

    tracing::info!(
        exam_id = %exam.id,
        creator_id = %exam.creator_id,
        questions = exam.questions.len(),
        "Exam created"
    );

    Ok((StatusCode::CREATED, Json(ExamResponse::from_exam(exam, now_utc(), true))))
}

pub(super) async fn list_exams(
    CurrentUser(_user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<ExamSummaryResponse>>, ApiError> {
    let exams =
        state.store().list_exams().await.map_err(|e| ApiError::internal(e, "Failed to list exams"))?;
    let now = now_utc();

    Ok(Json(exams.iter().map(|exam| ExamSummaryResponse::from_exam(exam, now)).collect()))
}

pub(super) async fn get_exam(
    Path(exam_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<ExamResponse>, ApiError> {
    let exam = load_exam(&state, &exam_id).await?;
    let reveal_answers = user.role == Role::Teacher;

    Ok(Json(ExamResponse::from_exam(exam, now_utc(), reveal_answers)))
}

pub(super) async fn stop_exam(
    Path(exam_id): Path<String>,
    CurrentTeacher(teacher): CurrentTeacher,
    State(state): State<AppState>,
) -> Result<Json<ExamResponse>, ApiError> {
    let mut exam = load_exam(&state, &exam_id).await?;
    require_creator(&exam, &teacher.id)?;

    let updated = state
        .store()
        .set_stopped(&exam_id, true)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to stop exam"))?;
    if !updated {
        return Err(ApiError::NotFound("Exam not found".to_string()));
    }
    exam.stopped = true;

    tracing::info!(exam_id = %exam.id, teacher_id = %teacher.id, "Exam stopped by examiner");

    Ok(Json(ExamResponse::from_exam(exam, now_utc(), true)))
}

pub(super) async fn delete_exam(
    Path(exam_id): Path<String>,
    CurrentTeacher(teacher): CurrentTeacher,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    let exam = load_exam(&state, &exam_id).await?;
    require_creator(&exam, &teacher.id)?;

    let deleted = state
        .store()
        .delete_exam(&exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to delete exam"))?;
    if !deleted {
        return Err(ApiError::NotFound("Exam not found".to_string()));
    }

    tracing::info!(exam_id = %exam_id, teacher_id = %teacher.id, "Exam deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub(super) async fn list_exam_attempts(
    Path(exam_id): Path<String>,
    CurrentTeacher(_teacher): CurrentTeacher,
    State(state): State<AppState>,
) -> Result<Json<Vec<AttemptResponse>>, ApiError> {
    let exam = load_exam(&state, &exam_id).await?;
    let attempts = state
        .store()
        .list_attempts(Some(&exam_id))
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list attempts"))?;

    let threshold = analytics::pass_threshold(&exam, state.settings().analytics().pass_ratio);
    Ok(Json(
        attempts
            .into_iter()
            .map(|attempt| AttemptResponse::from_attempt(attempt, Some(threshold)))
            .collect(),
    ))
}

pub(super) async fn exam_analytics(
    Path(exam_id): Path<String>,
    CurrentTeacher(_teacher): CurrentTeacher,
    State(state): State<AppState>,
) -> Result<Json<ExamAnalyticsResponse>, ApiError> {
    let exam = load_exam(&state, &exam_id).await?;
    let attempts = state
        .store()
        .list_attempts(Some(&exam_id))
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list attempts"))?;

    let Some(summary) =
        analytics::summarize(&exam, &attempts, state.settings().analytics().pass_ratio)
    else {
        return Err(ApiError::NotFound("No attempts recorded for this exam yet".to_string()));
    };

    Ok(Json(ExamAnalyticsResponse::new(exam.id, summary)))
}

pub(super) async fn start_session(
    Path(exam_id): Path<String>,
    CurrentStudent(student): CurrentStudent,
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    let exam = load_exam(&state, &exam_id).await?;

    match exam_window(&exam, now_utc()) {
        ExamWindow::Live => {}
        ExamWindow::Upcoming => {
            return Err(ApiError::Conflict("Exam has not started yet".to_string()));
        }
        ExamWindow::Ended => return Err(ApiError::Conflict("Exam has ended".to_string())),
    }

    let previous = state
        .store()
        .list_student_attempts(&student.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load attempts"))?;
    if previous.iter().any(|attempt| attempt.exam_id == exam.id) {
        return Err(ApiError::Conflict("exam already submitted".to_string()));
    }

    let handle = state.sessions().start(exam, student).await?;

    Ok((StatusCode::CREATED, Json(SessionResponse::from(handle.view()))))
}

async fn load_exam(state: &AppState, exam_id: &str) -> Result<ExamDefinition, ApiError> {
    state
        .store()
        .read_exam(exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch exam"))?
        .ok_or_else(|| ApiError::NotFound("Exam not found".to_string()))
}

fn require_creator(exam: &ExamDefinition, teacher_id: &str) -> Result<(), ApiError> {
    if exam.creator_id == teacher_id {
        Ok(())
    } else {
        Err(ApiError::Forbidden("Only the exam's creator can manage it"))
    }
}
