use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};

use crate::services::exam_store::ExamStore;

/// Background task that re-reads the exam's `stopped` flag on a fixed interval.
///
/// Every poll that observes the flag sends a trigger; the session decides whether it wins.
pub(crate) struct RemoteStopPoller {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl RemoteStopPoller {
    pub(crate) fn spawn(
        store: Arc<dyn ExamStore>,
        session_id: String,
        exam_id: String,
        period: Duration,
        triggers: mpsc::Sender<()>,
    ) -> Self {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let task =
            tokio::spawn(poll_loop(store, session_id, exam_id, period, triggers, shutdown_rx));
        Self { shutdown, task }
    }

    /// Signals the poll loop and waits for it to exit.
    pub(crate) async fn stop(self) {
        self.shutdown.send_replace(true);
        if let Err(err) = self.task.await {
            tracing::error!(error = %err, "Remote stop poller join failed");
        }
    }
}

async fn poll_loop(
    store: Arc<dyn ExamStore>,
    session_id: String,
    exam_id: String,
    period: Duration,
    triggers: mpsc::Sender<()>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; the first read happens one period in.
    ticker.tick().await;

    loop {
        tokio::select! {
            biased;
            _ = stop_requested(&mut shutdown) => break,
            _ = ticker.tick() => {}
        }

        let read = tokio::select! {
            biased;
            _ = stop_requested(&mut shutdown) => break,
            read = timeout(period, store.read_exam(&exam_id)) => read,
        };

        match read {
            Ok(Ok(Some(exam))) if exam.stopped => {
                tracing::info!(session_id, exam_id, "Exam stopped by examiner");
                match triggers.try_send(()) {
                    Ok(()) | Err(mpsc::error::TrySendError::Full(())) => {}
                    Err(mpsc::error::TrySendError::Closed(())) => break,
                }
            }
            Ok(Ok(Some(_))) => {}
            Ok(Ok(None)) => {
                tracing::warn!(session_id, exam_id, "Exam no longer exists; continuing to poll");
            }
            Ok(Err(err)) => {
                tracing::warn!(session_id, exam_id, error = %err, "Failed to read exam stop flag");
            }
            Err(_) => {
                tracing::warn!(session_id, exam_id, "Timed out reading exam stop flag");
            }
        }
    }

    tracing::debug!(session_id, exam_id, "Remote stop poller exited");
}

async fn stop_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stopped| *stopped).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::exam_store::MemoryExamStore;
    use crate::test_support;

    #[tokio::test(start_paused = true)]
    async fn sends_trigger_within_one_period_of_stop() {
        let store = Arc::new(MemoryExamStore::new());
        store.create_exam(&test_support::sample_exam("exam-1", 30)).await.unwrap();
        let (tx, mut rx) = mpsc::channel(1);

        let poller = RemoteStopPoller::spawn(
            store.clone(),
            "session-1".to_string(),
            "exam-1".to_string(),
            Duration::from_secs(5),
            tx,
        );

        tokio::time::sleep(Duration::from_secs(12)).await;
        assert!(rx.try_recv().is_err());

        store.set_stopped("exam-1", true).await.unwrap();
        let started = tokio::time::Instant::now();
        rx.recv().await.expect("trigger");
        assert!(started.elapsed() <= Duration::from_secs(5));

        poller.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stop_joins_the_task() {
        let store = Arc::new(MemoryExamStore::new());
        let (tx, _rx) = mpsc::channel(1);
        let poller = RemoteStopPoller::spawn(
            store,
            "session-1".to_string(),
            "missing".to_string(),
            Duration::from_secs(5),
            tx,
        );

        tokio::time::sleep(Duration::from_secs(11)).await;
        poller.stop().await;
    }
}
