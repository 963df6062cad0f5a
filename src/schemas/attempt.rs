use std::collections::BTreeMap;

use serde::Serialize;

use crate::core::time::format_offset;
use crate::db::models::Attempt;
use crate::db::types::SubmitReason;
use crate::services::analytics::{ExamAnalytics, QuestionStats};
use crate::services::scoring::ScoreSummary;

#[derive(Debug, Serialize)]
pub(crate) struct AttemptResponse {
    pub(crate) id: String,
    pub(crate) exam_id: String,
    pub(crate) student_id: String,
    pub(crate) student_name: String,
    pub(crate) roll_no: Option<String>,
    pub(crate) started_at: String,
    pub(crate) ended_at: String,
    pub(crate) time_taken_seconds: f64,
    pub(crate) answers: BTreeMap<String, usize>,
    pub(crate) score: f64,
    pub(crate) max_score: f64,
    pub(crate) percentage: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) passed: Option<bool>,
    pub(crate) tab_switch_count: u32,
    pub(crate) submit_reason: SubmitReason,
}

impl AttemptResponse {
    pub(crate) fn from_attempt(attempt: Attempt, pass_threshold: Option<f64>) -> Self {
        let summary = ScoreSummary { score: attempt.score, max_score: attempt.max_score };
        Self {
            time_taken_seconds: attempt.time_taken_seconds(),
            started_at: format_offset(attempt.started_at),
            ended_at: format_offset(attempt.ended_at),
            percentage: summary.display_percentage(),
            passed: pass_threshold.map(|threshold| attempt.score >= threshold),
            id: attempt.id,
            exam_id: attempt.exam_id,
            student_id: attempt.student_id,
            student_name: attempt.student_name,
            roll_no: attempt.roll_no,
            answers: attempt.answers,
            score: attempt.score,
            max_score: attempt.max_score,
            tab_switch_count: attempt.tab_switch_count,
            submit_reason: attempt.submit_reason,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct QuestionStatsResponse {
    pub(crate) question_id: String,
    pub(crate) label: String,
    pub(crate) text: String,
    pub(crate) correct_count: usize,
    pub(crate) wrong_count: usize,
    pub(crate) success_rate: f64,
}

#[derive(Debug, Serialize)]
pub(crate) struct ExamAnalyticsResponse {
    pub(crate) exam_id: String,
    pub(crate) total_attempts: usize,
    pub(crate) average_score: f64,
    pub(crate) highest_score: f64,
    pub(crate) lowest_score: f64,
    pub(crate) pass_threshold: f64,
    pub(crate) pass_count: usize,
    pub(crate) fail_count: usize,
    pub(crate) average_time_taken: f64,
    pub(crate) min_time_taken: f64,
    pub(crate) max_time_taken: f64,
    pub(crate) question_stats: Vec<QuestionStatsResponse>,
    pub(crate) most_correct: Option<QuestionStatsResponse>,
    pub(crate) most_wrong: Option<QuestionStatsResponse>,
}

impl From<QuestionStats> for QuestionStatsResponse {
    fn from(stats: QuestionStats) -> Self {
        Self {
            question_id: stats.question_id,
            label: stats.label,
            text: stats.text,
            correct_count: stats.correct_count,
            wrong_count: stats.wrong_count,
            success_rate: stats.success_rate,
        }
    }
}

impl ExamAnalyticsResponse {
    pub(crate) fn new(exam_id: String, analytics: ExamAnalytics) -> Self {
        Self {
            exam_id,
            total_attempts: analytics.attempts,
            average_score: analytics.average_score,
            highest_score: analytics.highest_score,
            lowest_score: analytics.lowest_score,
            pass_threshold: analytics.pass_threshold,
            pass_count: analytics.pass_count,
            fail_count: analytics.fail_count,
            average_time_taken: analytics.average_time_seconds,
            min_time_taken: analytics.min_time_seconds,
            max_time_taken: analytics.max_time_seconds,
            question_stats: analytics.questions.into_iter().map(QuestionStatsResponse::from).collect(),
            most_correct: analytics.most_correct.map(QuestionStatsResponse::from),
            most_wrong: analytics.most_wrong.map(QuestionStatsResponse::from),
        }
    }
}
