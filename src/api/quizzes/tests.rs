use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use serde_json::json;
use time::Duration;
use tower::ServiceExt;

use crate::db::models::{Module, User};
use crate::db::types::{QuizStatus, UserRole};
use crate::repositories;
use crate::repositories::quizzes::QuizFields;
use crate::test_support::{self, TestContext, TEST_PROGRAM};

use super::PASSCODE_HEADER;

struct Classroom {
    teacher: User,
    student: User,
    module: Module,
}

async fn classroom(ctx: &TestContext) -> Classroom {
    let pool = ctx.state.db();
    let teacher =
        test_support::insert_user(pool, UserRole::Teacher, "turing@example.edu", "teach-pass-1")
            .await;
    let student =
        test_support::insert_user(pool, UserRole::Student, "ada@example.edu", "learn-pass-1")
            .await;
    let module = test_support::insert_module(pool, &teacher, "SE2010").await;
    test_support::insert_mcq(pool, &module, "Which keyword moves ownership?", "move", "ref").await;
    test_support::insert_mcq(pool, &module, "Which trait enables `?`?", "Try", "Into").await;
    Classroom { teacher, student, module }
}

fn quiz_body(
    module: &Module,
    academic_year: i32,
    show_results_immediately: bool,
) -> serde_json::Value {
    json!({
        "title": "Ownership checkpoint",
        "module_id": module.id,
        "start_time": "2025-03-01T09:10:00Z",
        "end_time": "2025-03-01T10:10:00Z",
        "duration_minutes": 30,
        "passcode": "open-sesame",
        "eligibility": [
            { "program": TEST_PROGRAM, "academic_year": academic_year, "semester": 1 }
        ],
        "show_results_immediately": show_results_immediately
    })
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
        .expect("response");
    let status = response.status();
    (status, test_support::read_json(response).await)
}

async fn fetch_questions(
    ctx: &TestContext,
    quiz_id: &str,
    token: &str,
    passcode: &str,
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method(Method::GET)
        .uri(format!("/api/v1/quizzes/{quiz_id}/questions"))
        .header("authorization", format!("Bearer {token}"))
        .header(PASSCODE_HEADER, passcode)
        .body(Body::empty())
        .expect("request");
    let response = ctx.app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    (status, test_support::read_json(response).await)
}

async fn create_quiz(ctx: &TestContext, token: &str, body: serde_json::Value) -> String {
    let (status, body) = send(ctx, Method::POST, "/api/v1/quizzes", token, Some(body)).await;
    assert_eq!(status, StatusCode::CREATED, "response: {body}");
    body["data"]["id"].as_str().expect("quiz id").to_string()
}

#[tokio::test]
async fn listing_quizzes_requires_authentication() {
    let ctx = test_support::lazy_context();

    let response = ctx
        .app
        .oneshot(test_support::json_request(Method::GET, "/api/v1/quizzes", None, None))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL test database"]
async fn quiz_window_gates_questions_and_submission() {
    let ctx = test_support::setup_test_context().await;
    let class = classroom(&ctx).await;
    let teacher_token = test_support::bearer_token(&class.teacher, ctx.state.settings());
    let student_token = test_support::bearer_token(&class.student, ctx.state.settings());

    let quiz_id = create_quiz(&ctx, &teacher_token, quiz_body(&class.module, 2, true)).await;

    ctx.clock.advance(Duration::minutes(5));
    let (status, body) = fetch_questions(&ctx, &quiz_id, &student_token, "open-sesame").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Quiz is not currently active");

    ctx.clock.advance(Duration::minutes(25));
    let (status, _) = fetch_questions(&ctx, &quiz_id, &student_token, "wrong").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = fetch_questions(&ctx, &quiz_id, &student_token, "open-sesame").await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    let questions = body["data"]["questions"].as_array().expect("questions");
    assert_eq!(questions.len(), 2);
    assert_eq!(body["data"]["quiz"]["status"], "active");
    assert!(body["data"]["quiz"].get("passcode").is_none());
    assert!(questions.iter().all(|question| question.get("options").is_some()));
    assert!(!body.to_string().contains("is_correct"));

    let move_question = questions
        .iter()
        .find(|question| question["text"] == "Which keyword moves ownership?")
        .expect("move question");
    let submission = json!({
        "answers": [{ "question_id": move_question["id"], "answer": "move" }],
        "time_taken_seconds": 600
    });

    let (status, body) = send(
        &ctx,
        Method::POST,
        &format!("/api/v1/quizzes/{quiz_id}/submit"),
        &student_token,
        Some(submission.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "response: {body}");
    assert_eq!(body["data"]["score"], 2.0);
    assert_eq!(body["data"]["total_marks"], 4.0);
    assert_eq!(body["data"]["percentage"], 50.0);
    assert_eq!(body["data"]["grade"], "C-");

    let (status, _) = send(
        &ctx,
        Method::POST,
        &format!("/api/v1/quizzes/{quiz_id}/submit"),
        &student_token,
        Some(submission),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = fetch_questions(&ctx, &quiz_id, &student_token, "open-sesame").await;
    assert_eq!(status, StatusCode::CONFLICT);

    ctx.clock.advance(Duration::minutes(60));
    let (status, body) =
        send(&ctx, Method::GET, &format!("/api/v1/quizzes/{quiz_id}"), &teacher_token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "completed");
    assert_eq!(body["data"]["passcode"], "open-sesame");

    let (status, body) = send(
        &ctx,
        Method::GET,
        &format!("/api/v1/quizzes/{quiz_id}/results"),
        &teacher_token,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["summary"]["submissions"], 1);
    assert_eq!(body["data"]["summary"]["average_percentage"], 50.0);
    assert_eq!(body["data"]["results"][0]["student_name"], "Test student");
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL test database"]
async fn ineligible_student_is_refused_before_window_and_passcode() {
    let ctx = test_support::setup_test_context().await;
    let class = classroom(&ctx).await;
    let teacher_token = test_support::bearer_token(&class.teacher, ctx.state.settings());
    let student_token = test_support::bearer_token(&class.student, ctx.state.settings());

    let quiz_id = create_quiz(&ctx, &teacher_token, quiz_body(&class.module, 3, true)).await;

    let (status, _) = fetch_questions(&ctx, &quiz_id, &student_token, "wrong").await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&ctx, Method::GET, "/api/v1/quizzes", &student_token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total_count"], 0);
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL test database"]
async fn started_quiz_is_frozen_and_cancel_hides_it_from_students() {
    let ctx = test_support::setup_test_context().await;
    let class = classroom(&ctx).await;
    let teacher_token = test_support::bearer_token(&class.teacher, ctx.state.settings());
    let student_token = test_support::bearer_token(&class.student, ctx.state.settings());

    let quiz_id = create_quiz(&ctx, &teacher_token, quiz_body(&class.module, 2, true)).await;
    let uri = format!("/api/v1/quizzes/{quiz_id}");

    let (status, body) =
        send(&ctx, Method::PATCH, &uri, &teacher_token, Some(json!({ "title": "Renamed" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["title"], "Renamed");

    let (_, body) = send(&ctx, Method::GET, "/api/v1/quizzes", &student_token, None).await;
    assert_eq!(body["data"]["total_count"], 1);

    ctx.clock.advance(Duration::minutes(15));
    let (status, body) =
        send(&ctx, Method::PATCH, &uri, &teacher_token, Some(json!({ "title": "Too late" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Quiz has already started and can no longer be modified");

    let (status, _) = send(&ctx, Method::DELETE, &uri, &teacher_token, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) =
        send(&ctx, Method::POST, &format!("{uri}/cancel"), &teacher_token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "cancelled");

    let (status, _) =
        send(&ctx, Method::POST, &format!("{uri}/cancel"), &teacher_token, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = send(&ctx, Method::GET, "/api/v1/quizzes", &student_token, None).await;
    assert_eq!(body["data"]["total_count"], 0);
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL test database"]
async fn quiz_needs_a_module_with_questions() {
    let ctx = test_support::setup_test_context().await;
    let class = classroom(&ctx).await;
    let teacher_token = test_support::bearer_token(&class.teacher, ctx.state.settings());
    let empty = test_support::insert_module(ctx.state.db(), &class.teacher, "SE2020").await;

    let (status, body) = send(
        &ctx,
        Method::POST,
        "/api/v1/quizzes",
        &teacher_token,
        Some(quiz_body(&empty, 2, true)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Module has no active questions");
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL test database"]
async fn status_filter_follows_the_clock() {
    let ctx = test_support::setup_test_context().await;
    let class = classroom(&ctx).await;
    let teacher_token = test_support::bearer_token(&class.teacher, ctx.state.settings());
    create_quiz(&ctx, &teacher_token, quiz_body(&class.module, 2, true)).await;

    ctx.clock.advance(Duration::minutes(30));
    let (status, body) =
        send(&ctx, Method::GET, "/api/v1/quizzes?status=active", &teacher_token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total_count"], 1);
    let (_, body) =
        send(&ctx, Method::GET, "/api/v1/quizzes?status=scheduled", &teacher_token, None).await;
    assert_eq!(body["data"]["total_count"], 0);

    ctx.clock.advance(Duration::minutes(60));
    let (_, body) =
        send(&ctx, Method::GET, "/api/v1/quizzes?status=active", &teacher_token, None).await;
    assert_eq!(body["data"]["total_count"], 0);
    let (_, body) =
        send(&ctx, Method::GET, "/api/v1/quizzes?status=completed", &teacher_token, None).await;
    assert_eq!(body["data"]["total_count"], 1);
    assert_eq!(body["data"]["items"][0]["status"], "completed");
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL test database"]
async fn stale_edit_does_not_revive_a_cancelled_quiz() {
    let ctx = test_support::setup_test_context().await;
    let class = classroom(&ctx).await;
    let teacher_token = test_support::bearer_token(&class.teacher, ctx.state.settings());
    let quiz_id = create_quiz(&ctx, &teacher_token, quiz_body(&class.module, 2, true)).await;

    let pool = ctx.state.db();
    let loaded = repositories::quizzes::find_by_id(pool, &quiz_id)
        .await
        .expect("query")
        .expect("quiz");

    let (status, _) = send(
        &ctx,
        Method::POST,
        &format!("/api/v1/quizzes/{quiz_id}/cancel"),
        &teacher_token,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let mut fields = QuizFields::from_quiz(&loaded);
    fields.title = "Edited after cancel".to_string();
    let written = repositories::quizzes::update(pool, &quiz_id, fields, ctx.state.now())
        .await
        .expect("update");
    assert!(written.is_none());

    let stored = repositories::quizzes::find_by_id(pool, &quiz_id)
        .await
        .expect("query")
        .expect("quiz");
    assert_eq!(stored.status, QuizStatus::Cancelled);
    assert_eq!(stored.title, "Ownership checkpoint");
}
