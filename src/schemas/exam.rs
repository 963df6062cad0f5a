use std::collections::HashSet;

use serde::de::Error as _;
use serde::{Deserialize, Serialize};
use time::{
    format_description::well_known::Rfc3339, macros::format_description, OffsetDateTime,
    PrimitiveDateTime,
};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::core::time::format_offset;
use crate::db::models::{ExamDefinition, Question};
use crate::db::types::ExamWindow;
use crate::services::exam_window::exam_window;

#[derive(Debug, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_question"))]
pub(crate) struct QuestionCreate {
    #[serde(default)]
    pub(crate) id: Option<String>,
    #[validate(length(min = 1, message = "text must not be empty"))]
    pub(crate) text: String,
    #[validate(length(min = 1, message = "options must not be empty"))]
    pub(crate) options: Vec<String>,
    #[serde(alias = "correctOptionIndex")]
    pub(crate) correct_option_index: usize,
    #[validate(range(exclusive_min = 0.0, message = "marks must be positive"))]
    pub(crate) marks: f64,
    #[serde(default, alias = "negativeMarks")]
    #[validate(range(min = 0.0, message = "negative_marks must be non-negative"))]
    pub(crate) negative_marks: f64,
}

#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "validate_unique_question_ids"))]
pub(crate) struct ExamCreate {
    #[validate(length(min = 1, message = "title must not be empty"))]
    pub(crate) title: String,
    #[serde(default)]
    pub(crate) description: String,
    #[serde(alias = "startTime", deserialize_with = "deserialize_offset_datetime_flexible")]
    pub(crate) start_time: OffsetDateTime,
    #[serde(alias = "durationMinutes")]
    #[validate(range(min = 1, message = "duration_minutes must be positive"))]
    pub(crate) duration_minutes: i32,
    #[validate(length(min = 1, message = "an exam needs at least one question"))]
    #[validate(nested)]
    pub(crate) questions: Vec<QuestionCreate>,
}

impl QuestionCreate {
    pub(crate) fn into_question(self) -> Question {
        Question {
            id: self
                .id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            text: self.text,
            options: self.options,
            correct_option_index: self.correct_option_index,
            marks: self.marks,
            negative_marks: self.negative_marks,
        }
    }
}

fn validate_question(question: &QuestionCreate) -> Result<(), ValidationError> {
    if question.correct_option_index >= question.options.len() {
        let mut error = ValidationError::new("correct_option_index");
        error.message = Some("correct_option_index must point at one of the options".into());
        return Err(error);
    }
    if question.options.iter().any(|option| option.trim().is_empty()) {
        let mut error = ValidationError::new("options");
        error.message = Some("options must not be blank".into());
        return Err(error);
    }
    Ok(())
}

fn validate_unique_question_ids(exam: &ExamCreate) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    let duplicate = exam
        .questions
        .iter()
        .filter_map(|question| question.id.as_deref())
        .any(|id| !seen.insert(id));

    if duplicate {
        let mut error = ValidationError::new("questions");
        error.message = Some("question ids must be unique".into());
        return Err(error);
    }
    Ok(())
}

#[derive(Debug, Serialize)]
pub(crate) struct QuestionResponse {
    pub(crate) id: String,
    pub(crate) text: String,
    pub(crate) options: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) correct_option_index: Option<usize>,
    pub(crate) marks: f64,
    pub(crate) negative_marks: f64,
}

#[derive(Debug, Serialize)]
pub(crate) struct ExamResponse {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) description: String,
    pub(crate) start_time: String,
    pub(crate) end_time: String,
    pub(crate) duration_minutes: i32,
    pub(crate) creator_id: String,
    pub(crate) is_stopped: bool,
    pub(crate) status: ExamWindow,
    pub(crate) total_marks: f64,
    pub(crate) question_count: usize,
    pub(crate) questions: Vec<QuestionResponse>,
    pub(crate) created_at: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct ExamSummaryResponse {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) description: String,
    pub(crate) start_time: String,
    pub(crate) end_time: String,
    pub(crate) duration_minutes: i32,
    pub(crate) creator_id: String,
    pub(crate) is_stopped: bool,
    pub(crate) status: ExamWindow,
    pub(crate) total_marks: f64,
    pub(crate) question_count: usize,
}

impl ExamResponse {
    /// Students never see the correct option.
    pub(crate) fn from_exam(exam: ExamDefinition, now: OffsetDateTime, reveal_answers: bool) -> Self {
        let status = exam_window(&exam, now);
        let total_marks = exam.total_marks();
        let end_time = format_offset(exam.end_time());

        Self {
            id: exam.id,
            title: exam.title,
            description: exam.description,
            start_time: format_offset(exam.start_time),
            end_time,
            duration_minutes: exam.duration_minutes,
            creator_id: exam.creator_id,
            is_stopped: exam.stopped,
            status,
            total_marks,
            question_count: exam.questions.len(),
            questions: exam
                .questions
                .into_iter()
                .map(|question| QuestionResponse {
                    id: question.id,
                    text: question.text,
                    options: question.options,
                    correct_option_index: reveal_answers.then_some(question.correct_option_index),
                    marks: question.marks,
                    negative_marks: question.negative_marks,
                })
                .collect(),
            created_at: format_offset(exam.created_at),
        }
    }
}

impl ExamSummaryResponse {
    pub(crate) fn from_exam(exam: &ExamDefinition, now: OffsetDateTime) -> Self {
        Self {
            id: exam.id.clone(),
            title: exam.title.clone(),
            description: exam.description.clone(),
            start_time: format_offset(exam.start_time),
            end_time: format_offset(exam.end_time()),
            duration_minutes: exam.duration_minutes,
            creator_id: exam.creator_id.clone(),
            is_stopped: exam.stopped,
            status: exam_window(exam, now),
            total_marks: exam.total_marks(),
            question_count: exam.questions.len(),
        }
    }
}

fn parse_offset_datetime_flexible(raw: &str) -> Option<OffsetDateTime> {
    if let Ok(value) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(value);
    }

    // datetime-local inputs arrive without an offset; treat them as UTC.
    if let Ok(value) = PrimitiveDateTime::parse(
        raw,
        &format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    ) {
        return Some(value.assume_utc());
    }
    PrimitiveDateTime::parse(raw, &format_description!("[year]-[month]-[day]T[hour]:[minute]"))
        .ok()
        .map(PrimitiveDateTime::assume_utc)
}

fn deserialize_offset_datetime_flexible<'de, D>(deserializer: D) -> Result<OffsetDateTime, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_offset_datetime_flexible(&raw)
        .ok_or_else(|| D::Error::custom(format!("invalid datetime: {raw}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(questions: serde_json::Value) -> serde_json::Value {
        serde_json::json!({
            "title": "Algebra",
            "startTime": "2025-03-01T09:00",
            "durationMinutes": 30,
            "questions": questions,
        })
    }

    #[test]
    fn accepts_camel_case_and_local_datetime() {
        let exam: ExamCreate = serde_json::from_value(payload(serde_json::json!([
            {"text": "2+2", "options": ["3", "4"], "correctOptionIndex": 1, "marks": 1}
        ])))
        .unwrap();

        assert!(exam.validate().is_ok());
        assert_eq!(format_offset(exam.start_time), "2025-03-01T09:00:00Z");
        assert_eq!(exam.questions[0].negative_marks, 0.0);
    }

    #[test]
    fn rejects_out_of_range_correct_option() {
        let exam: ExamCreate = serde_json::from_value(payload(serde_json::json!([
            {"text": "2+2", "options": ["3", "4"], "correct_option_index": 2, "marks": 1}
        ])))
        .unwrap();

        assert!(exam.validate().is_err());
    }

    #[test]
    fn rejects_empty_question_list_and_duplicate_ids() {
        let empty: ExamCreate = serde_json::from_value(payload(serde_json::json!([]))).unwrap();
        assert!(empty.validate().is_err());

        let duplicate: ExamCreate = serde_json::from_value(payload(serde_json::json!([
            {"id": "a", "text": "x", "options": ["1"], "correct_option_index": 0, "marks": 1},
            {"id": "a", "text": "y", "options": ["1"], "correct_option_index": 0, "marks": 1}
        ])))
        .unwrap();
        assert!(duplicate.validate().is_err());
    }

    #[test]
    fn missing_question_ids_are_generated() {
        let question = QuestionCreate {
            id: None,
            text: "x".to_string(),
            options: vec!["a".to_string()],
            correct_option_index: 0,
            marks: 1.0,
            negative_marks: 0.0,
        };
        assert!(!question.into_question().id.is_empty());
    }
}
