use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;

use super::{ExamStore, StoreError};
use crate::db::models::{Attempt, ExamDefinition, QuestionRow};
use crate::repositories;

#[derive(Clone)]
pub(crate) struct PgExamStore {
    pool: PgPool,
}

impl PgExamStore {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ExamStore for PgExamStore {
    async fn read_exam(&self, exam_id: &str) -> Result<Option<ExamDefinition>, StoreError> {
        let Some(exam) = repositories::exams::find_by_id(&self.pool, exam_id).await? else {
            return Ok(None);
        };
        let questions = repositories::questions::list_by_exam(&self.pool, exam_id).await?;
        Ok(Some(exam.into_definition(questions)))
    }

    async fn save_attempt(&self, attempt: &Attempt) -> Result<(), StoreError> {
        let inserted = repositories::attempts::create_if_absent(&self.pool, attempt).await?;
        if !inserted {
            tracing::warn!(
                attempt_id = %attempt.id,
                exam_id = %attempt.exam_id,
                "Attempt already stored; keeping the existing row"
            );
        }
        Ok(())
    }

    async fn list_attempts(&self, exam_id: Option<&str>) -> Result<Vec<Attempt>, StoreError> {
        let rows = repositories::attempts::list(&self.pool, exam_id, None).await?;
        Ok(rows.into_iter().map(Attempt::from).collect())
    }

    async fn list_student_attempts(&self, student_id: &str) -> Result<Vec<Attempt>, StoreError> {
        let rows = repositories::attempts::list(&self.pool, None, Some(student_id)).await?;
        Ok(rows.into_iter().map(Attempt::from).collect())
    }

    async fn create_exam(&self, exam: &ExamDefinition) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        repositories::exams::create(
            &mut *tx,
            repositories::exams::CreateExam {
                id: &exam.id,
                title: &exam.title,
                description: &exam.description,
                start_time: exam.start_time,
                duration_minutes: exam.duration_minutes,
                creator_id: &exam.creator_id,
                created_at: exam.created_at,
            },
        )
        .await?;

        for (position, question) in exam.questions.iter().enumerate() {
            let position = i32::try_from(position)
                .map_err(|_| StoreError::Unavailable("too many questions".to_string()))?;
            repositories::questions::insert(&mut *tx, &exam.id, position, question).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn list_exams(&self) -> Result<Vec<ExamDefinition>, StoreError> {
        let exams = repositories::exams::list_all(&self.pool).await?;
        let ids: Vec<String> = exams.iter().map(|exam| exam.id.clone()).collect();

        let mut questions: HashMap<String, Vec<QuestionRow>> = HashMap::new();
        for (exam_id, question) in repositories::questions::list_by_exams(&self.pool, &ids).await? {
            questions.entry(exam_id).or_default().push(question);
        }

        Ok(exams
            .into_iter()
            .map(|exam| {
                let rows = questions.remove(&exam.id).unwrap_or_default();
                exam.into_definition(rows)
            })
            .collect())
    }

    async fn set_stopped(&self, exam_id: &str, stopped: bool) -> Result<bool, StoreError> {
        Ok(repositories::exams::set_stopped(&self.pool, exam_id, stopped).await?)
    }

    async fn delete_exam(&self, exam_id: &str) -> Result<bool, StoreError> {
        Ok(repositories::exams::delete_by_id(&self.pool, exam_id).await?)
    }

    async fn health(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
