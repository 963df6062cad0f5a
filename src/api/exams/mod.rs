mod handlers;

use axum::{routing::get, routing::post, Router};

use crate::core::state::AppState;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::create_exam).get(handlers::list_exams))
        .route("/:exam_id", get(handlers::get_exam).delete(handlers::delete_exam))
        .route("/:exam_id/stop", post(handlers::stop_exam))
        .route("/:exam_id/attempts", get(handlers::list_exam_attempts))
        .route("/:exam_id/analytics", get(handlers::exam_analytics))
        .route("/:exam_id/sessions", post(handlers::start_session))
}
