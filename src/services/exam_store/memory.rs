use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{ExamStore, StoreError};
use crate::db::models::{Attempt, ExamDefinition};

/// Process-local store for development (`EXAMPRO_STORE=memory`) and tests.
#[derive(Default)]
pub(crate) struct MemoryExamStore {
    exams: RwLock<Vec<ExamDefinition>>,
    attempts: RwLock<Vec<Attempt>>,
}

impl MemoryExamStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub(crate) async fn attempt_count(&self) -> usize {
        self.attempts.read().await.len()
    }
}

#[async_trait]
impl ExamStore for MemoryExamStore {
    async fn read_exam(&self, exam_id: &str) -> Result<Option<ExamDefinition>, StoreError> {
        Ok(self.exams.read().await.iter().find(|exam| exam.id == exam_id).cloned())
    }

    async fn save_attempt(&self, attempt: &Attempt) -> Result<(), StoreError> {
        let mut attempts = self.attempts.write().await;
        if attempts.iter().any(|existing| existing.id == attempt.id) {
            tracing::warn!(attempt_id = %attempt.id, "Attempt already stored; keeping the existing row");
            return Ok(());
        }
        attempts.push(attempt.clone());
        Ok(())
    }

    async fn list_attempts(&self, exam_id: Option<&str>) -> Result<Vec<Attempt>, StoreError> {
        let attempts = self.attempts.read().await;
        Ok(attempts
            .iter()
            .filter(|attempt| exam_id.map_or(true, |id| attempt.exam_id == id))
            .cloned()
            .collect())
    }

    async fn list_student_attempts(&self, student_id: &str) -> Result<Vec<Attempt>, StoreError> {
        let attempts = self.attempts.read().await;
        Ok(attempts.iter().filter(|attempt| attempt.student_id == student_id).cloned().collect())
    }

    async fn create_exam(&self, exam: &ExamDefinition) -> Result<(), StoreError> {
        let mut exams = self.exams.write().await;
        if exams.iter().any(|existing| existing.id == exam.id) {
            return Err(StoreError::Unavailable(format!("exam {} already exists", exam.id)));
        }
        exams.push(exam.clone());
        Ok(())
    }

    async fn list_exams(&self) -> Result<Vec<ExamDefinition>, StoreError> {
        let mut exams = self.exams.read().await.clone();
        exams.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(exams)
    }

    async fn set_stopped(&self, exam_id: &str, stopped: bool) -> Result<bool, StoreError> {
        let mut exams = self.exams.write().await;
        match exams.iter_mut().find(|exam| exam.id == exam_id) {
            Some(exam) => {
                exam.stopped = stopped;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_exam(&self, exam_id: &str) -> Result<bool, StoreError> {
        let mut exams = self.exams.write().await;
        let before = exams.len();
        exams.retain(|exam| exam.id != exam_id);
        Ok(exams.len() != before)
    }

    async fn health(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;

    #[tokio::test]
    async fn saving_same_attempt_twice_keeps_one() {
        let store = MemoryExamStore::new();
        let attempt = test_support::sample_attempt("session-1", "exam-1");

        store.save_attempt(&attempt).await.expect("first save");
        store.save_attempt(&attempt).await.expect("second save");

        assert_eq!(store.attempt_count().await, 1);
    }

    #[tokio::test]
    async fn stop_flag_is_visible_to_readers() {
        let store = MemoryExamStore::new();
        let exam = test_support::sample_exam("exam-1", 30);
        store.create_exam(&exam).await.expect("create");

        assert!(!store.read_exam("exam-1").await.unwrap().unwrap().stopped);
        assert!(store.set_stopped("exam-1", true).await.unwrap());
        assert!(store.read_exam("exam-1").await.unwrap().unwrap().stopped);
        assert!(!store.set_stopped("missing", true).await.unwrap());
    }

    #[tokio::test]
    async fn list_attempts_filters_by_exam() {
        let store = MemoryExamStore::new();
        store.save_attempt(&test_support::sample_attempt("s1", "exam-1")).await.unwrap();
        store.save_attempt(&test_support::sample_attempt("s2", "exam-2")).await.unwrap();

        assert_eq!(store.list_attempts(None).await.unwrap().len(), 2);
        let filtered = store.list_attempts(Some("exam-2")).await.unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].id, "s2");
    }
}
