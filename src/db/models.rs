use std::collections::BTreeMap;

use sqlx::types::Json;
use sqlx::FromRow;
use time::{Duration, OffsetDateTime};

use crate::db::types::{Role, SubmitReason};

/// Question id -> selected option index.
pub(crate) type AnswerSet = BTreeMap<String, usize>;

/// Who is sitting the exam, taken from verified request identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Candidate {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) role: Role,
    pub(crate) roll_no: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Question {
    pub(crate) id: String,
    pub(crate) text: String,
    pub(crate) options: Vec<String>,
    pub(crate) correct_option_index: usize,
    pub(crate) marks: f64,
    pub(crate) negative_marks: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ExamDefinition {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) description: String,
    pub(crate) start_time: OffsetDateTime,
    pub(crate) duration_minutes: i32,
    pub(crate) questions: Vec<Question>,
    pub(crate) creator_id: String,
    pub(crate) stopped: bool,
    pub(crate) created_at: OffsetDateTime,
}

impl ExamDefinition {
    pub(crate) fn question(&self, question_id: &str) -> Option<&Question> {
        self.questions.iter().find(|question| question.id == question_id)
    }

    pub(crate) fn end_time(&self) -> OffsetDateTime {
        self.start_time + Duration::minutes(i64::from(self.duration_minutes))
    }

    pub(crate) fn total_marks(&self) -> f64 {
        self.questions.iter().map(|question| question.marks).sum()
    }
}

/// Persisted record of one finished exam session. `id` is the session id.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Attempt {
    pub(crate) id: String,
    pub(crate) exam_id: String,
    pub(crate) student_id: String,
    pub(crate) student_name: String,
    pub(crate) roll_no: Option<String>,
    pub(crate) started_at: OffsetDateTime,
    pub(crate) ended_at: OffsetDateTime,
    pub(crate) answers: AnswerSet,
    pub(crate) score: f64,
    pub(crate) max_score: f64,
    pub(crate) tab_switch_count: u32,
    pub(crate) submit_reason: SubmitReason,
}

impl Attempt {
    pub(crate) fn time_taken_seconds(&self) -> f64 {
        (self.ended_at - self.started_at).as_seconds_f64()
    }
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct ExamRow {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) description: String,
    pub(crate) start_time: OffsetDateTime,
    pub(crate) duration_minutes: i32,
    pub(crate) creator_id: String,
    pub(crate) is_stopped: bool,
    pub(crate) created_at: OffsetDateTime,
}

impl ExamRow {
    pub(crate) fn into_definition(self, questions: Vec<QuestionRow>) -> ExamDefinition {
        let mut questions = questions;
        questions.sort_by_key(|question| question.position);

        ExamDefinition {
            id: self.id,
            title: self.title,
            description: self.description,
            start_time: self.start_time,
            duration_minutes: self.duration_minutes,
            questions: questions.into_iter().map(Question::from).collect(),
            creator_id: self.creator_id,
            stopped: self.is_stopped,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct QuestionRow {
    pub(crate) id: String,
    pub(crate) position: i32,
    pub(crate) text: String,
    pub(crate) options: Json<Vec<String>>,
    pub(crate) correct_option_index: i32,
    pub(crate) marks: f64,
    pub(crate) negative_marks: f64,
}

impl From<QuestionRow> for Question {
    fn from(row: QuestionRow) -> Self {
        Self {
            id: row.id,
            text: row.text,
            options: row.options.0,
            // Rows are constrained to >= 0; a corrupt value simply never matches.
            correct_option_index: usize::try_from(row.correct_option_index).unwrap_or(usize::MAX),
            marks: row.marks,
            negative_marks: row.negative_marks,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct AttemptRow {
    pub(crate) id: String,
    pub(crate) exam_id: String,
    pub(crate) student_id: String,
    pub(crate) student_name: String,
    pub(crate) roll_no: Option<String>,
    pub(crate) started_at: OffsetDateTime,
    pub(crate) ended_at: OffsetDateTime,
    pub(crate) answers: Json<AnswerSet>,
    pub(crate) score: f64,
    pub(crate) max_score: f64,
    pub(crate) tab_switch_count: i32,
    pub(crate) submit_reason: SubmitReason,
}

impl From<AttemptRow> for Attempt {
    fn from(row: AttemptRow) -> Self {
        Self {
            id: row.id,
            exam_id: row.exam_id,
            student_id: row.student_id,
            student_name: row.student_name,
            roll_no: row.roll_no,
            started_at: row.started_at,
            ended_at: row.ended_at,
            answers: row.answers.0,
            score: row.score,
            max_score: row.max_score,
            tab_switch_count: u32::try_from(row.tab_switch_count).unwrap_or(0),
            submit_reason: row.submit_reason,
        }
    }
}
