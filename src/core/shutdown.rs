use tokio::signal;
use tokio::sync::watch;

/// Broadcasts process shutdown to the HTTP server, the scheduler and live sessions.
#[derive(Clone)]
pub(crate) struct Shutdown {
    tx: watch::Sender<bool>,
}

impl Shutdown {
    pub(crate) fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    pub(crate) fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub(crate) async fn triggered(&self) {
        let mut rx = self.subscribe();
        // Sender lives in self, so wait_for cannot observe a closed channel here.
        let _ = rx.wait_for(|stopped| *stopped).await;
    }
}

/// Waits for Ctrl+C or SIGTERM, then fires `shutdown`.
pub(crate) async fn listen_for_signals(shutdown: Shutdown) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!(signal = "ctrl_c", "shutdown signal received"),
        _ = terminate => tracing::info!(signal = "sigterm", "shutdown signal received"),
        _ = shutdown.triggered() => return,
    }

    shutdown.trigger();
}
