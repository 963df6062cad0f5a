use sqlx::PgPool;
use time::OffsetDateTime;

use crate::db::models::ExamRow;

pub(crate) const COLUMNS: &str = "\
    id, title, description, start_time, duration_minutes, creator_id, is_stopped, created_at";

pub(crate) struct CreateExam<'a> {
    pub(crate) id: &'a str,
    pub(crate) title: &'a str,
    pub(crate) description: &'a str,
    pub(crate) start_time: OffsetDateTime,
    pub(crate) duration_minutes: i32,
    pub(crate) creator_id: &'a str,
    pub(crate) created_at: OffsetDateTime,
}

pub(crate) async fn find_by_id(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
) -> Result<Option<ExamRow>, sqlx::Error> {
    sqlx::query_as::<_, ExamRow>(&format!("SELECT {COLUMNS} FROM exams WHERE id = $1"))
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub(crate) async fn list_all(pool: &PgPool) -> Result<Vec<ExamRow>, sqlx::Error> {
    sqlx::query_as::<_, ExamRow>(&format!("SELECT {COLUMNS} FROM exams ORDER BY start_time DESC"))
        .fetch_all(pool)
        .await
}

pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    exam: CreateExam<'_>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO exams (
            id, title, description, start_time, duration_minutes, creator_id, is_stopped, created_at
        ) VALUES ($1,$2,$3,$4,$5,$6,FALSE,$7)",
    )
    .bind(exam.id)
    .bind(exam.title)
    .bind(exam.description)
    .bind(exam.start_time)
    .bind(exam.duration_minutes)
    .bind(exam.creator_id)
    .bind(exam.created_at)
    .execute(executor)
    .await?;
    Ok(())
}

pub(crate) async fn set_stopped(pool: &PgPool, id: &str, stopped: bool) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE exams SET is_stopped = $1 WHERE id = $2")
        .bind(stopped)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub(crate) async fn delete_by_id(pool: &PgPool, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM exams WHERE id = $1").bind(id).execute(pool).await?;
    Ok(result.rows_affected() > 0)
}
