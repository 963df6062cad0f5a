use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_offset;
use crate::db::types::{SessionPhase, SubmitReason};
use crate::services::exam_session::{SessionResult, SessionView, SubmitPreview};
use crate::services::violation_monitor::FocusEvent;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct AnswerSelect {
    #[serde(alias = "questionId")]
    #[validate(length(min = 1, message = "question_id must not be empty"))]
    pub(crate) question_id: String,
    #[serde(alias = "optionIndex", alias = "selectedIndex")]
    pub(crate) option_index: usize,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FocusEventReport {
    pub(crate) event: FocusEvent,
}

#[derive(Debug, Serialize)]
pub(crate) struct SessionResultResponse {
    pub(crate) attempt_id: String,
    pub(crate) score: f64,
    pub(crate) max_score: f64,
    pub(crate) percentage: u32,
    pub(crate) reason: SubmitReason,
    pub(crate) ended_at: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct SessionResponse {
    pub(crate) session_id: String,
    pub(crate) exam_id: String,
    pub(crate) phase: SessionPhase,
    pub(crate) started_at: String,
    pub(crate) remaining_seconds: u64,
    pub(crate) violations: u32,
    pub(crate) answers: BTreeMap<String, usize>,
    pub(crate) answered: usize,
    pub(crate) total_questions: usize,
    pub(crate) expired: bool,
    pub(crate) torn_down: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) result: Option<SessionResultResponse>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SubmitResponse {
    pub(crate) outcome: &'static str,
    pub(crate) session: SessionResponse,
}

#[derive(Debug, Serialize)]
pub(crate) struct SubmitPreviewResponse {
    pub(crate) unanswered: usize,
    pub(crate) message: String,
}

impl From<SessionResult> for SessionResultResponse {
    fn from(result: SessionResult) -> Self {
        Self {
            attempt_id: result.attempt_id,
            score: result.score,
            max_score: result.max_score,
            percentage: result.percentage,
            reason: result.reason,
            ended_at: format_offset(result.ended_at),
        }
    }
}

impl From<SessionView> for SessionResponse {
    fn from(view: SessionView) -> Self {
        let answered = view.answered();
        Self {
            session_id: view.session_id,
            exam_id: view.exam_id,
            phase: view.phase,
            started_at: format_offset(view.started_at),
            remaining_seconds: view.remaining_seconds,
            violations: view.violations,
            answers: view.answers,
            answered,
            total_questions: view.total_questions,
            expired: view.expired,
            torn_down: view.torn_down,
            last_error: view.last_error,
            result: view.result.map(SessionResultResponse::from),
        }
    }
}

impl From<SubmitPreview> for SubmitPreviewResponse {
    fn from(preview: SubmitPreview) -> Self {
        Self { unanswered: preview.unanswered, message: preview.message }
    }
}
