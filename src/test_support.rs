use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request},
    Router,
};
use time::{Duration, OffsetDateTime};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::api;
use crate::core::{config::Settings, security, state::AppState};
use crate::db::models::{Attempt, Candidate, ExamDefinition, Question};
use crate::db::types::{Role, SubmitReason};
use crate::services::exam_store::MemoryExamStore;

const TEST_SECRET_KEY: &str = "test-secret";

pub(crate) struct TestContext {
    pub(crate) state: AppState,
    pub(crate) app: Router,
    _guard: OwnedMutexGuard<()>,
}

pub(crate) async fn env_lock() -> OwnedMutexGuard<()> {
    static LOCK: OnceLock<Arc<Mutex<()>>> = OnceLock::new();
    let lock = LOCK.get_or_init(|| Arc::new(Mutex::new(()))).clone();
    lock.lock_owned().await
}

pub(crate) fn set_test_env() {
    std::env::set_var("EXAMPRO_ENV", "test");
    std::env::set_var("EXAMPRO_STRICT_CONFIG", "0");
    std::env::set_var("SECRET_KEY", TEST_SECRET_KEY);
    std::env::set_var("ALGORITHM", "HS256");
    std::env::set_var("EXAMPRO_STORE", "memory");
    std::env::set_var("PROMETHEUS_ENABLED", "0");
    std::env::remove_var("API_V1_STR");
    std::env::remove_var("BACKEND_CORS_ORIGINS");
    std::env::remove_var("PASS_RATIO");
    std::env::remove_var("SESSION_TICK_MILLIS");
    std::env::remove_var("SESSION_RETENTION_SECONDS");
    std::env::remove_var("EXAMPRO_LOG_LEVEL");
    std::env::remove_var("EXAMPRO_LOG_JSON");
}

pub(crate) async fn setup_test_context() -> TestContext {
    setup_test_context_with(|| {}).await
}

/// Like [`setup_test_context`], with `configure` run after the test env is set.
pub(crate) async fn setup_test_context_with(configure: impl FnOnce()) -> TestContext {
    let guard = env_lock().await;
    set_test_env();
    configure();

    let settings = Settings::load().expect("settings");
    let state = AppState::new(settings, Arc::new(MemoryExamStore::new()));
    let app = api::router::router(state.clone());

    TestContext { state, app, _guard: guard }
}

/// Two questions worth 3 marks in total; the exam opened a minute ago.
pub(crate) fn sample_exam(id: &str, duration_minutes: i32) -> ExamDefinition {
    let now = OffsetDateTime::now_utc();
    ExamDefinition {
        id: id.to_string(),
        title: "Sample exam".to_string(),
        description: "Arithmetic warm-up".to_string(),
        start_time: now - Duration::minutes(1),
        duration_minutes,
        questions: vec![
            Question {
                id: "q1".to_string(),
                text: "2 + 2 = ?".to_string(),
                options: vec!["4".to_string(), "5".to_string(), "22".to_string()],
                correct_option_index: 0,
                marks: 2.0,
                negative_marks: 0.5,
            },
            Question {
                id: "q2".to_string(),
                text: "3 * 3 = ?".to_string(),
                options: vec!["6".to_string(), "9".to_string(), "33".to_string()],
                correct_option_index: 1,
                marks: 1.0,
                negative_marks: 0.0,
            },
        ],
        creator_id: sample_teacher().id,
        stopped: false,
        created_at: now - Duration::minutes(5),
    }
}

pub(crate) fn sample_student() -> Candidate {
    Candidate {
        id: "student-1".to_string(),
        name: "Asha Rao".to_string(),
        role: Role::Student,
        roll_no: Some("R-17".to_string()),
    }
}

pub(crate) fn other_student() -> Candidate {
    Candidate {
        id: "student-2".to_string(),
        name: "Ben Ito".to_string(),
        role: Role::Student,
        roll_no: None,
    }
}

pub(crate) fn sample_teacher() -> Candidate {
    Candidate {
        id: "teacher-1".to_string(),
        name: "Dr. Mehta".to_string(),
        role: Role::Teacher,
        roll_no: None,
    }
}

pub(crate) fn sample_attempt(id: &str, exam_id: &str) -> Attempt {
    let student = sample_student();
    let started_at = OffsetDateTime::now_utc() - Duration::minutes(20);
    Attempt {
        id: id.to_string(),
        exam_id: exam_id.to_string(),
        student_id: student.id,
        student_name: student.name,
        roll_no: student.roll_no,
        started_at,
        ended_at: started_at + Duration::minutes(10),
        answers: BTreeMap::from([("q1".to_string(), 0)]),
        score: 2.0,
        max_score: 3.0,
        tab_switch_count: 0,
        submit_reason: SubmitReason::Manual,
    }
}

pub(crate) fn bearer_token(candidate: &Candidate, settings: &Settings) -> String {
    security::create_access_token(candidate, settings, Duration::hours(1)).expect("token")
}

pub(crate) fn json_request(
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);

    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    if let Some(body) = body {
        let bytes = serde_json::to_vec(&body).expect("serialize body");
        builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(bytes))
            .expect("request body")
    } else {
        builder.body(Body::empty()).expect("request body")
    }
}

pub(crate) async fn read_json(response: axum::response::Response<Body>) -> serde_json::Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.expect("response body");
    serde_json::from_slice(&body).unwrap_or_else(|err| {
        let body_text = String::from_utf8_lossy(&body);
        panic!("json parse: {err}; body: {body_text}");
    })
}
