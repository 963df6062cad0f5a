use sqlx::types::Json;
use sqlx::PgPool;

use crate::db::models::{Question, QuestionRow};

pub(crate) const COLUMNS: &str =
    "id, position, text, options, correct_option_index, marks, negative_marks";

pub(crate) async fn list_by_exam(
    executor: impl sqlx::PgExecutor<'_>,
    exam_id: &str,
) -> Result<Vec<QuestionRow>, sqlx::Error> {
    sqlx::query_as::<_, QuestionRow>(&format!(
        "SELECT {COLUMNS} FROM questions WHERE exam_id = $1 ORDER BY position"
    ))
    .bind(exam_id)
    .fetch_all(executor)
    .await
}

/// Loads questions for many exams at once, keyed by exam id.
pub(crate) async fn list_by_exams(
    pool: &PgPool,
    exam_ids: &[String],
) -> Result<Vec<(String, QuestionRow)>, sqlx::Error> {
    if exam_ids.is_empty() {
        return Ok(Vec::new());
    }

    #[derive(sqlx::FromRow)]
    struct Row {
        exam_id: String,
        #[sqlx(flatten)]
        question: QuestionRow,
    }

    let rows = sqlx::query_as::<_, Row>(&format!(
        "SELECT exam_id, {COLUMNS} FROM questions WHERE exam_id = ANY($1) ORDER BY exam_id, position"
    ))
    .bind(exam_ids)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|row| (row.exam_id, row.question)).collect())
}

pub(crate) async fn insert(
    executor: impl sqlx::PgExecutor<'_>,
    exam_id: &str,
    position: i32,
    question: &Question,
) -> Result<(), sqlx::Error> {
    let correct_option_index = i32::try_from(question.correct_option_index)
        .map_err(|err| sqlx::Error::Encode(Box::new(err)))?;

    sqlx::query(
        "INSERT INTO questions (
            id, exam_id, position, text, options, correct_option_index, marks, negative_marks
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8)",
    )
    .bind(&question.id)
    .bind(exam_id)
    .bind(position)
    .bind(&question.text)
    .bind(Json(&question.options))
    .bind(correct_option_index)
    .bind(question.marks)
    .bind(question.negative_marks)
    .execute(executor)
    .await?;
    Ok(())
}
