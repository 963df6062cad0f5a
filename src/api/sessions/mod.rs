mod handlers;

use axum::{routing::get, routing::post, routing::put, Router};

use crate::core::state::AppState;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/:session_id", get(handlers::get_session).delete(handlers::teardown_session))
        .route("/:session_id/answers", put(handlers::select_answer))
        .route("/:session_id/focus-events", post(handlers::record_focus_event))
        .route("/:session_id/submit-preview", get(handlers::submit_preview))
        .route("/:session_id/submit", post(handlers::submit))
}

#[cfg(test)]
mod tests;
