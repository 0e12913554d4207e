use std::sync::{Arc, OnceLock};

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request},
    Router,
};
use sqlx::PgPool;
use time::macros::datetime;
use time::PrimitiveDateTime;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::api;
use crate::core::security::{self, TokenSubject};
use crate::core::time::ManualClock;
use crate::core::{config::Settings, redis::RedisHandle, state::AppState};
use crate::db::models::{McqOption, Module, Question, User};
use crate::db::types::{AccountStatus, QuestionType, UserRole};
use crate::repositories;
use crate::repositories::users::ProfileColumns;
use crate::services::notifier::testing::RecordingNotifier;

pub(crate) const TEST_NOW: PrimitiveDateTime = datetime!(2025-03-01 09:00);
pub(crate) const TEST_PROGRAM: &str = "BSc Software Engineering";

pub(crate) struct TestContext {
    pub(crate) state: AppState,
    pub(crate) app: Router,
    pub(crate) clock: Arc<ManualClock>,
    pub(crate) notifier: Arc<RecordingNotifier>,
    _guard: Option<OwnedMutexGuard<()>>,
}

/// Serializes tests that truncate the shared test database.
async fn db_lock() -> OwnedMutexGuard<()> {
    static LOCK: OnceLock<Arc<Mutex<()>>> = OnceLock::new();
    let lock = LOCK.get_or_init(|| Arc::new(Mutex::new(()))).clone();
    lock.lock_owned().await
}

/// Router over a pool that never connects; only for requests rejected before the store.
pub(crate) fn lazy_context() -> TestContext {
    let settings = Settings::for_tests();
    let db = PgPool::connect_lazy(&settings.database().database_url()).expect("lazy pool");
    build_context(settings, db, None)
}

/// Router over a migrated, emptied test database.
pub(crate) async fn setup_test_context() -> TestContext {
    let guard = db_lock().await;
    let settings = Settings::for_tests();

    let db = crate::db::init_pool(&settings).await.expect("db pool");
    crate::db::run_migrations(&db).await.expect("migrations");
    reset_db(&db).await.expect("reset db");

    build_context(settings, db, Some(guard))
}

fn build_context(
    settings: Settings,
    db: PgPool,
    guard: Option<OwnedMutexGuard<()>>,
) -> TestContext {
    let redis = RedisHandle::new(settings.redis().redis_url());
    let clock = Arc::new(ManualClock::new(TEST_NOW));
    let notifier = Arc::new(RecordingNotifier::default());

    let state = AppState::new(settings, db, redis, clock.clone(), notifier.clone());
    let app = api::router::router(state.clone());

    TestContext { state, app, clock, notifier, _guard: guard }
}

pub(crate) async fn reset_db(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("TRUNCATE results, quizzes, questions, modules, users RESTART IDENTITY CASCADE")
        .execute(pool)
        .await?;
    Ok(())
}

pub(crate) async fn insert_user(
    pool: &PgPool,
    role: UserRole,
    email: &str,
    password: &str,
) -> User {
    let hashed_password = security::hash_password(password).expect("hash password");
    let local_part = email.split('@').next().unwrap_or(email).to_uppercase();

    let profile = match role {
        UserRole::Student => ProfileColumns {
            student_id: Some(format!("ST-{local_part}")),
            enrollment_year: Some(2023),
            program: Some(TEST_PROGRAM.to_string()),
            academic_year: Some(2),
            semester: Some(1),
            ..ProfileColumns::default()
        },
        UserRole::Teacher => ProfileColumns {
            employee_id: Some(format!("EMP-{local_part}")),
            department: Some("Computing".to_string()),
            subjects: vec!["Systems Programming".to_string()],
            ..ProfileColumns::default()
        },
        UserRole::Admin => ProfileColumns::default(),
    };

    repositories::users::create(
        pool,
        repositories::users::CreateUser {
            id: &Uuid::new_v4().to_string(),
            name: &format!("Test {}", role.as_str()),
            email,
            hashed_password,
            role,
            status: AccountStatus::Active,
            profile,
            created_at: TEST_NOW,
        },
    )
    .await
    .expect("insert user")
}

pub(crate) async fn insert_module(pool: &PgPool, owner: &User, code: &str) -> Module {
    repositories::modules::create(
        pool,
        repositories::modules::CreateModule {
            id: &Uuid::new_v4().to_string(),
            code,
            name: "Systems Programming",
            academic_year: 2,
            semester: 1,
            credits: 4,
            created_by: &owner.id,
            created_at: TEST_NOW,
        },
    )
    .await
    .expect("insert module")
}

pub(crate) async fn insert_mcq(
    pool: &PgPool,
    module: &Module,
    text: &str,
    correct: &str,
    wrong: &str,
) -> Question {
    repositories::questions::create(
        pool,
        repositories::questions::CreateQuestion {
            id: &Uuid::new_v4().to_string(),
            module_id: &module.id,
            module_code: &module.code,
            academic_year: module.academic_year,
            semester: module.semester,
            question_type: QuestionType::Mcq,
            text,
            options: vec![
                McqOption { text: correct.to_string(), is_correct: true },
                McqOption { text: wrong.to_string(), is_correct: false },
            ],
            reference_answer: None,
            marks: 2.0,
            created_by: &module.created_by,
            created_at: TEST_NOW,
        },
    )
    .await
    .expect("insert question")
}

pub(crate) fn bearer_token(user: &User, settings: &Settings) -> String {
    let subject = TokenSubject { id: &user.id, email: &user.email, role: user.role };
    security::issue_token_pair(subject, settings).expect("token").access_token
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
