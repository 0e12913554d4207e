use axum::http::{Method, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use crate::db::types::UserRole;
use crate::repositories;
use crate::test_support;

#[tokio::test]
async fn listing_modules_requires_authentication() {
    let ctx = test_support::lazy_context();

    let response = ctx
        .app
        .oneshot(test_support::json_request(Method::GET, "/api/v1/modules", None, None))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL test database"]
async fn module_edit_updates_question_copies_together() {
    let ctx = test_support::setup_test_context().await;
    let pool = ctx.state.db();
    let teacher =
        test_support::insert_user(pool, UserRole::Teacher, "liskov@example.edu", "teach-pass-1")
            .await;
    let module = test_support::insert_module(pool, &teacher, "SE2050").await;
    let question =
        test_support::insert_mcq(pool, &module, "Which type owns a heap string?", "String", "&str")
            .await;
    let token = test_support::bearer_token(&teacher, ctx.state.settings());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::PATCH,
            &format!("/api/v1/modules/{}", module.id),
            Some(&token),
            Some(json!({ "code": "se3050", "academic_year": 3 })),
        ))
        .await
        .expect("update module");
    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["data"]["code"], "SE3050");

    let stored = repositories::questions::find_owned(pool, &question.id, &teacher.id)
        .await
        .expect("query")
        .expect("question");
    assert_eq!(stored.module_code, "SE3050");
    assert_eq!(stored.academic_year, 3);
    assert_eq!(stored.semester, 1);
}
