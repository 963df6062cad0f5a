//! Persistence boundary for exam sessions.
//!
//! The session controller only needs `read_exam` (re-read on every remote-stop poll)
//! and `save_attempt`. The remaining operations serve authoring and analytics.

mod memory;
mod postgres;

use async_trait::async_trait;
use thiserror::Error;

use crate::db::models::{Attempt, ExamDefinition};

pub(crate) use memory::MemoryExamStore;
pub(crate) use postgres::PgExamStore;

#[derive(Debug, Error)]
pub(crate) enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub(crate) trait ExamStore: Send + Sync {
    async fn read_exam(&self, exam_id: &str) -> Result<Option<ExamDefinition>, StoreError>;

    /// Saving the same attempt id twice keeps the first row and still reports success.
    async fn save_attempt(&self, attempt: &Attempt) -> Result<(), StoreError>;

    async fn list_attempts(&self, exam_id: Option<&str>) -> Result<Vec<Attempt>, StoreError>;

    async fn list_student_attempts(&self, student_id: &str) -> Result<Vec<Attempt>, StoreError>;

    async fn create_exam(&self, exam: &ExamDefinition) -> Result<(), StoreError>;

    async fn list_exams(&self) -> Result<Vec<ExamDefinition>, StoreError>;

    /// Returns false when the exam does not exist.
    async fn set_stopped(&self, exam_id: &str, stopped: bool) -> Result<bool, StoreError>;

    /// Returns false when the exam does not exist.
    async fn delete_exam(&self, exam_id: &str) -> Result<bool, StoreError>;

    async fn health(&self) -> Result<(), StoreError>;
}
