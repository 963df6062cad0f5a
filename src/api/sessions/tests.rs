use axum::http::{Method, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use crate::test_support::{self, TestContext};

async fn start_session(ctx: &TestContext, token: &str) -> String {
    let exam = test_support::sample_exam("exam-1", 30);
    ctx.state.store().create_exam(&exam).await.expect("seed exam");

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/exams/exam-1/sessions",
            Some(token),
            None,
        ))
        .await
        .expect("start session");
    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::CREATED, "response: {body}");
    body["session_id"].as_str().expect("session id").to_string()
}

async fn send(
    ctx: &TestContext,
    method: Method,
    uri: &str,
    token: &str,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(method, uri, Some(token), body))
        .await
        .expect("request");
    let status = response.status();
    if status == StatusCode::ACCEPTED || status == StatusCode::NO_CONTENT {
        return (status, serde_json::Value::Null);
    }
    (status, test_support::read_json(response).await)
}

#[tokio::test]
async fn full_exam_flow_records_one_attempt() {
    let ctx = test_support::setup_test_context().await;
    let token = test_support::bearer_token(&test_support::sample_student(), ctx.state.settings());
    let session_id = start_session(&ctx, &token).await;
    let base = format!("/api/v1/sessions/{session_id}");

    let (status, body) = send(
        &ctx,
        Method::PUT,
        &format!("{base}/answers"),
        &token,
        Some(json!({"questionId": "q1", "optionIndex": 0})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["answered"], 1);

    let (status, preview) = send(&ctx, Method::GET, &format!("{base}/submit-preview"), &token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(preview["unanswered"], 1);
    assert!(preview["message"].as_str().unwrap().contains("1 unanswered question(s)"));

    let (status, _) = send(
        &ctx,
        Method::POST,
        &format!("{base}/focus-events"),
        &token,
        Some(json!({"event": "hidden"})),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    // Commands are handled in order, so this view already reflects the focus event.
    let (status, body) = send(
        &ctx,
        Method::PUT,
        &format!("{base}/answers"),
        &token,
        Some(json!({"question_id": "q2", "option_index": 2})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["violations"], 1);
    assert_eq!(body["answers"], json!({"q1": 0, "q2": 2}));

    let (status, body) = send(&ctx, Method::POST, &format!("{base}/submit"), &token, None).await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["outcome"], "accepted");
    assert_eq!(body["session"]["phase"], "finished");
    assert_eq!(body["session"]["result"]["score"], 2.0);
    assert_eq!(body["session"]["result"]["max_score"], 3.0);
    assert_eq!(body["session"]["result"]["percentage"], 67);
    assert_eq!(body["session"]["result"]["reason"], "manual");
    assert_eq!(body["session"]["result"]["attempt_id"], session_id.as_str());

    let (status, body) = send(&ctx, Method::POST, &format!("{base}/submit"), &token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "already-finished");

    let (status, _) = send(
        &ctx,
        Method::PUT,
        &format!("{base}/answers"),
        &token,
        Some(json!({"question_id": "q2", "option_index": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, attempts) = send(&ctx, Method::GET, "/api/v1/attempts/me", &token, None).await;
    assert_eq!(status, StatusCode::OK);
    let attempts = attempts.as_array().expect("attempt list").clone();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0]["id"], session_id.as_str());
    assert_eq!(attempts[0]["tab_switch_count"], 1);
    assert_eq!(attempts[0]["answers"], json!({"q1": 0, "q2": 2}));
    assert!(attempts[0].get("passed").is_none());
}

#[tokio::test]
async fn invalid_answers_are_rejected() {
    let ctx = test_support::setup_test_context().await;
    let token = test_support::bearer_token(&test_support::sample_student(), ctx.state.settings());
    let session_id = start_session(&ctx, &token).await;
    let uri = format!("/api/v1/sessions/{session_id}/answers");

    let (status, _) = send(
        &ctx,
        Method::PUT,
        &uri,
        &token,
        Some(json!({"question_id": "q9", "option_index": 0})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &ctx,
        Method::PUT,
        &uri,
        &token,
        Some(json!({"question_id": "q1", "option_index": 3})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) =
        send(&ctx, Method::GET, &format!("/api/v1/sessions/{session_id}"), &token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["answered"], 0);

    ctx.state.sessions().teardown_all().await;
}

#[tokio::test]
async fn sessions_are_private_to_their_candidate() {
    let ctx = test_support::setup_test_context().await;
    let owner = test_support::bearer_token(&test_support::sample_student(), ctx.state.settings());
    let other = test_support::bearer_token(&test_support::other_student(), ctx.state.settings());
    let session_id = start_session(&ctx, &owner).await;

    let (status, _) =
        send(&ctx, Method::GET, &format!("/api/v1/sessions/{session_id}"), &other, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) =
        send(&ctx, Method::POST, &format!("/api/v1/sessions/{session_id}/submit"), &other, None)
            .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&ctx, Method::GET, "/api/v1/sessions/unknown", &owner, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    ctx.state.sessions().teardown_all().await;
}

#[tokio::test]
async fn teardown_closes_without_submitting() {
    let ctx = test_support::setup_test_context().await;
    let token = test_support::bearer_token(&test_support::sample_student(), ctx.state.settings());
    let session_id = start_session(&ctx, &token).await;
    let base = format!("/api/v1/sessions/{session_id}");

    let (status, body) = send(&ctx, Method::DELETE, &base, &token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["torn_down"], true);
    assert_eq!(body["phase"], "running");

    let (status, body) = send(&ctx, Method::POST, &format!("{base}/submit"), &token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "closed");

    let attempts = ctx.state.store().list_student_attempts("student-1").await.unwrap();
    assert!(attempts.is_empty());

    // A torn-down session can be replaced by a fresh one.
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/exams/exam-1/sessions",
            Some(&token),
            None,
        ))
        .await
        .expect("restart session");
    assert_eq!(response.status(), StatusCode::CREATED);

    ctx.state.sessions().teardown_all().await;
}
