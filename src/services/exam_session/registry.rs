use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::RwLock;
use tokio::time::Instant;
use uuid::Uuid;

use super::controller::{SessionHandle, SessionTimings};
use crate::db::models::{Candidate, ExamDefinition};
use crate::db::types::SessionPhase;
use crate::services::exam_store::ExamStore;

#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum StartError {
    #[error("an exam session is already open for this exam")]
    AlreadyOpen(String),
    #[error("exam already submitted")]
    AlreadySubmitted,
}

/// Live and recently closed sessions, keyed by session id.
pub(crate) struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<SessionHandle>>>,
    store: Arc<dyn ExamStore>,
    timings: SessionTimings,
    retention: Duration,
}

impl SessionRegistry {
    pub(crate) fn new(store: Arc<dyn ExamStore>, timings: SessionTimings, retention: Duration) -> Self {
        Self { sessions: RwLock::new(HashMap::new()), store, timings, retention }
    }

    /// At most one session per (exam, candidate). A session torn down without submitting
    /// may be replaced; a finished one may not.
    pub(crate) async fn start(
        &self,
        exam: ExamDefinition,
        candidate: Candidate,
    ) -> Result<Arc<SessionHandle>, StartError> {
        let mut sessions = self.sessions.write().await;

        let mut replaced = Vec::new();
        for handle in sessions.values() {
            if handle.exam_id() != exam.id || handle.candidate_id() != candidate.id {
                continue;
            }
            let view = handle.view();
            match view.phase {
                SessionPhase::Finished => return Err(StartError::AlreadySubmitted),
                SessionPhase::Running if view.torn_down && handle.is_closed() => {
                    replaced.push(view.session_id);
                }
                _ => return Err(StartError::AlreadyOpen(view.session_id)),
            }
        }
        for session_id in replaced {
            sessions.remove(&session_id);
        }

        let session_id = Uuid::new_v4().to_string();
        let handle = Arc::new(SessionHandle::spawn(
            session_id.clone(),
            exam,
            candidate,
            self.store.clone(),
            self.timings,
        ));
        sessions.insert(session_id, handle.clone());
        Ok(handle)
    }

    pub(crate) async fn get(&self, session_id: &str) -> Option<Arc<SessionHandle>> {
        self.sessions.read().await.get(session_id).cloned()
    }

    /// Drops closed sessions whose views have been retained for longer than the retention window.
    pub(crate) async fn prune(&self) -> usize {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();

        sessions.retain(|_, handle| match handle.view().closed_at {
            Some(closed_at) => now.saturating_duration_since(closed_at) < self.retention,
            None => true,
        });

        let pruned = before - sessions.len();
        if pruned > 0 {
            metrics::counter!("exam_sessions_pruned_total").increment(pruned as u64);
            tracing::debug!(pruned, remaining = sessions.len(), "Pruned closed exam sessions");
        }
        pruned
    }

    /// Tears down every session. Running sessions are not submitted.
    pub(crate) async fn teardown_all(&self) {
        let handles: Vec<Arc<SessionHandle>> =
            self.sessions.write().await.drain().map(|(_, handle)| handle).collect();
        let count = handles.len();

        for handle in handles {
            handle.teardown().await;
        }

        if count > 0 {
            tracing::info!(count, "Tore down exam sessions");
        }
    }
}
