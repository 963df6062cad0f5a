use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::core::state::AppState;

/// Starts the background maintenance loops. They exit once `shutdown` flips to `true`.
pub(crate) fn spawn(state: AppState, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
    tokio::spawn(prune_sessions_loop(state, shutdown))
}

async fn prune_sessions_loop(state: AppState, mut shutdown: watch::Receiver<bool>) {
    let period = state.settings().session().prune_interval();
    let mut tick = interval(period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::debug!(period_seconds = period.as_secs(), "Session prune loop started");
    loop {
        if *shutdown.borrow() {
            break;
        }
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tick.tick() => {
                state.sessions().prune().await;
            }
        }
    }
    tracing::debug!("Session prune loop stopped");
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::test_support;

    #[tokio::test(start_paused = true)]
    async fn prunes_closed_sessions_until_shutdown() {
        let ctx = test_support::setup_test_context_with(|| {
            std::env::set_var("SESSION_RETENTION_SECONDS", "0");
        })
        .await;
        let exam = test_support::sample_exam("exam-1", 30);
        ctx.state.store().create_exam(&exam).await.unwrap();

        let handle =
            ctx.state.sessions().start(exam, test_support::sample_student()).await.unwrap();
        handle.teardown().await;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = spawn(ctx.state.clone(), shutdown_rx);

        for _ in 0..5 {
            if ctx.state.sessions().get(handle.id()).await.is_none() {
                break;
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
        assert!(ctx.state.sessions().get(handle.id()).await.is_none());

        shutdown_tx.send_replace(true);
        task.await.unwrap();
    }
}
