use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::db::models::{Attempt, AttemptRow};

pub(crate) const COLUMNS: &str = "\
    id, exam_id, student_id, student_name, roll_no, started_at, ended_at, \
    answers, score, max_score, tab_switch_count, submit_reason";

/// Returns false when an attempt with the same id already exists.
pub(crate) async fn create_if_absent(pool: &PgPool, attempt: &Attempt) -> Result<bool, sqlx::Error> {
    let tab_switch_count =
        i32::try_from(attempt.tab_switch_count).map_err(|err| sqlx::Error::Encode(Box::new(err)))?;

    let result = sqlx::query(
        "INSERT INTO attempts (
            id, exam_id, student_id, student_name, roll_no, started_at, ended_at,
            answers, score, max_score, tab_switch_count, submit_reason
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12)
        ON CONFLICT (id) DO NOTHING",
    )
    .bind(&attempt.id)
    .bind(&attempt.exam_id)
    .bind(&attempt.student_id)
    .bind(&attempt.student_name)
    .bind(attempt.roll_no.as_deref())
    .bind(attempt.started_at)
    .bind(attempt.ended_at)
    .bind(Json(&attempt.answers))
    .bind(attempt.score)
    .bind(attempt.max_score)
    .bind(tab_switch_count)
    .bind(attempt.submit_reason)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub(crate) async fn list(
    pool: &PgPool,
    exam_id: Option<&str>,
    student_id: Option<&str>,
) -> Result<Vec<AttemptRow>, sqlx::Error> {
    let mut builder =
        QueryBuilder::<Postgres>::new(format!("SELECT {COLUMNS} FROM attempts WHERE TRUE"));

    if let Some(exam_id) = exam_id {
        builder.push(" AND exam_id = ");
        builder.push_bind(exam_id);
    }
    if let Some(student_id) = student_id {
        builder.push(" AND student_id = ");
        builder.push_bind(student_id);
    }

    builder.push(" ORDER BY ended_at");
    builder.build_query_as::<AttemptRow>().fetch_all(pool).await
}
