pub(crate) mod api;
pub(crate) mod core;
pub(crate) mod db;
pub(crate) mod repositories;
pub(crate) mod schemas;
pub(crate) mod services;
pub(crate) mod tasks;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use crate::core::config::{Settings, StoreBackend};
use crate::core::shutdown::{self, Shutdown};
use crate::core::{state::AppState, telemetry};
use crate::services::exam_store::{ExamStore, MemoryExamStore, PgExamStore};

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;
    core::metrics::init(&settings)?;

    let store = build_store(&settings).await?;
    let state = AppState::new(settings, store);

    let shutdown = Shutdown::new();
    tokio::spawn(shutdown::listen_for_signals(shutdown.clone()));
    let scheduler = tasks::scheduler::spawn(state.clone(), shutdown.subscribe());

    let app = api::router::router(state.clone());
    let listener = tokio::net::TcpListener::bind(state.settings().server_addr()).await?;

    tracing::info!(
        host = %state.settings().server_host(),
        port = state.settings().server_port(),
        environment = %state.settings().runtime().environment.as_str(),
        store = %state.settings().store().backend.as_str(),
        "ExamPro API listening"
    );

    let server_shutdown = shutdown.clone();
    let result = axum::serve(listener, app)
        .with_graceful_shutdown(async move { server_shutdown.triggered().await })
        .await;

    // Server errors end the process too.
    shutdown.trigger();
    state.sessions().teardown_all().await;
    if let Err(err) = scheduler.await {
        tracing::error!(error = %err, "Scheduler join failed");
    }
    tracing::info!("ExamPro API stopped");

    result?;

    Ok(())
}

async fn build_store(settings: &Settings) -> anyhow::Result<Arc<dyn ExamStore>> {
    match settings.store().backend {
        StoreBackend::Postgres => {
            let pool = db::init_pool(settings).await?;
            db::run_migrations(&pool).await?;
            tracing::info!("Postgres exam store ready");
            Ok(Arc::new(PgExamStore::new(pool)))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory exam store; data is lost on restart");
            Ok(Arc::new(MemoryExamStore::new()))
        }
    }
}
