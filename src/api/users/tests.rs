use axum::http::{Method, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use crate::db::types::UserRole;
use crate::test_support;

#[tokio::test]
async fn listing_users_requires_authentication() {
    let ctx = test_support::lazy_context();

    let response = ctx
        .app
        .oneshot(test_support::json_request(Method::GET, "/api/v1/users", None, None))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL test database"]
async fn admin_creates_student_with_generated_password() {
    let ctx = test_support::setup_test_context().await;
    let admin =
        test_support::insert_user(ctx.state.db(), UserRole::Admin, "root@example.edu", "admin-pass-1")
            .await;
    let token = test_support::bearer_token(&admin, ctx.state.settings());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/users",
            Some(&token),
            Some(json!({
                "name": "Ada Lovelace",
                "email": "Ada@Example.edu",
                "role": "student",
                "studentId": "IT23000001",
                "enrollmentYear": 2023,
                "program": test_support::TEST_PROGRAM,
                "academicYear": 2,
                "semester": 1
            })),
        ))
        .await
        .expect("create user");

    let status = response.status();
    let created = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::CREATED, "response: {created}");
    assert_eq!(created["data"]["email"], "ada@example.edu");
    assert_eq!(created["data"]["student_id"], "IT23000001");
    assert!(created["data"].get("hashed_password").is_none());

    let password = ctx.notifier.last_secret_for("ada@example.edu").expect("temporary password");
    let response = ctx
        .app
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "email": "ada@example.edu", "password": password })),
        ))
        .await
        .expect("login");
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL test database"]
async fn admin_update_merges_profile_and_delete_is_soft_by_default() {
    let ctx = test_support::setup_test_context().await;
    let admin =
        test_support::insert_user(ctx.state.db(), UserRole::Admin, "root@example.edu", "admin-pass-1")
            .await;
    let student =
        test_support::insert_user(ctx.state.db(), UserRole::Student, "ada@example.edu", "pass-123")
            .await;
    let token = test_support::bearer_token(&admin, ctx.state.settings());
    let uri = format!("/api/v1/users/{}", student.id);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::PATCH,
            &uri,
            Some(&token),
            Some(json!({ "semester": 2 })),
        ))
        .await
        .expect("update user");
    let status = response.status();
    let updated = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "response: {updated}");
    assert_eq!(updated["data"]["semester"], 2);
    assert_eq!(updated["data"]["program"], test_support::TEST_PROGRAM);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(Method::DELETE, &uri, Some(&token), None))
        .await
        .expect("soft delete");
    assert_eq!(response.status(), StatusCode::OK);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(Method::GET, &uri, Some(&token), None))
        .await
        .expect("get user");
    let body = test_support::read_json(response).await;
    assert_eq!(body["data"]["status"], "inactive");

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::DELETE,
            &format!("{uri}?permanent=true"),
            Some(&token),
            None,
        ))
        .await
        .expect("hard delete");
    assert_eq!(response.status(), StatusCode::OK);

    let response = ctx
        .app
        .oneshot(test_support::json_request(Method::GET, &uri, Some(&token), None))
        .await
        .expect("get deleted user");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL test database"]
async fn non_admins_cannot_manage_users() {
    let ctx = test_support::setup_test_context().await;
    let teacher =
        test_support::insert_user(ctx.state.db(), UserRole::Teacher, "grace@example.edu", "pass-123")
            .await;
    let token = test_support::bearer_token(&teacher, ctx.state.settings());

    let response = ctx
        .app
        .oneshot(test_support::json_request(Method::GET, "/api/v1/users", Some(&token), None))
        .await
        .expect("list users");

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
