use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use time::PrimitiveDateTime;

use crate::db::models::{EligibilityEntry, Quiz};
use crate::db::types::QuizStatus;
use crate::tasks::scheduler::QuizWindow;

const COLUMNS: &str = "\
    id, title, module_id, module_code, question_count, start_time, end_time, duration_minutes, \
    instructions, passcode, eligibility, shuffle_questions, show_results_immediately, \
    allow_late_submission, max_attempts, status, is_active, created_by, created_at, updated_at";

/// Every writable quiz column; used for both inserts and full updates.
pub(crate) struct QuizFields {
    pub(crate) title: String,
    pub(crate) module_id: String,
    pub(crate) module_code: String,
    pub(crate) question_count: i32,
    pub(crate) start_time: PrimitiveDateTime,
    pub(crate) end_time: PrimitiveDateTime,
    pub(crate) duration_minutes: i32,
    pub(crate) instructions: String,
    pub(crate) passcode: String,
    pub(crate) eligibility: Vec<EligibilityEntry>,
    pub(crate) shuffle_questions: bool,
    pub(crate) show_results_immediately: bool,
    pub(crate) allow_late_submission: bool,
    pub(crate) max_attempts: i32,
    pub(crate) status: QuizStatus,
}

impl QuizFields {
    pub(crate) fn from_quiz(quiz: &Quiz) -> Self {
        Self {
            title: quiz.title.clone(),
            module_id: quiz.module_id.clone(),
            module_code: quiz.module_code.clone(),
            question_count: quiz.question_count,
            start_time: quiz.start_time,
            end_time: quiz.end_time,
            duration_minutes: quiz.duration_minutes,
            instructions: quiz.instructions.clone(),
            passcode: quiz.passcode.clone(),
            eligibility: quiz.eligibility.0.clone(),
            shuffle_questions: quiz.shuffle_questions,
            show_results_immediately: quiz.show_results_immediately,
            allow_late_submission: quiz.allow_late_submission,
            max_attempts: quiz.max_attempts,
            status: quiz.status,
        }
    }
}

pub(crate) async fn create(
    pool: &PgPool,
    id: &str,
    created_by: &str,
    fields: QuizFields,
    now: PrimitiveDateTime,
) -> Result<Quiz, sqlx::Error> {
    sqlx::query_as::<_, Quiz>(&format!(
        "INSERT INTO quizzes (
            id, title, module_id, module_code, question_count, start_time, end_time,
            duration_minutes, instructions, passcode, eligibility, shuffle_questions,
            show_results_immediately, allow_late_submission, max_attempts, status, is_active,
            created_by, created_at, updated_at
         ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,TRUE,$17,$18,$18)
         RETURNING {COLUMNS}",
    ))
    .bind(id)
    .bind(fields.title)
    .bind(fields.module_id)
    .bind(fields.module_code)
    .bind(fields.question_count)
    .bind(fields.start_time)
    .bind(fields.end_time)
    .bind(fields.duration_minutes)
    .bind(fields.instructions)
    .bind(fields.passcode)
    .bind(Json(fields.eligibility))
    .bind(fields.shuffle_questions)
    .bind(fields.show_results_immediately)
    .bind(fields.allow_late_submission)
    .bind(fields.max_attempts)
    .bind(fields.status)
    .bind(created_by)
    .bind(now)
    .fetch_one(pool)
    .await
}

/// Full-row edit. Returns `None` when the quiz was cancelled in the meantime.
pub(crate) async fn update(
    pool: &PgPool,
    id: &str,
    fields: QuizFields,
    now: PrimitiveDateTime,
) -> Result<Option<Quiz>, sqlx::Error> {
    sqlx::query_as::<_, Quiz>(&format!(
        "UPDATE quizzes SET
            title = $1,
            module_id = $2,
            module_code = $3,
            question_count = $4,
            start_time = $5,
            end_time = $6,
            duration_minutes = $7,
            instructions = $8,
            passcode = $9,
            eligibility = $10,
            shuffle_questions = $11,
            show_results_immediately = $12,
            allow_late_submission = $13,
            max_attempts = $14,
            status = $15,
            updated_at = $16
         WHERE id = $17 AND status <> 'cancelled'
         RETURNING {COLUMNS}",
    ))
    .bind(fields.title)
    .bind(fields.module_id)
    .bind(fields.module_code)
    .bind(fields.question_count)
    .bind(fields.start_time)
    .bind(fields.end_time)
    .bind(fields.duration_minutes)
    .bind(fields.instructions)
    .bind(fields.passcode)
    .bind(Json(fields.eligibility))
    .bind(fields.shuffle_questions)
    .bind(fields.show_results_immediately)
    .bind(fields.allow_late_submission)
    .bind(fields.max_attempts)
    .bind(fields.status)
    .bind(now)
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Any quiz that has not been soft-deleted.
pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Quiz>, sqlx::Error> {
    sqlx::query_as::<_, Quiz>(&format!(
        "SELECT {COLUMNS} FROM quizzes WHERE id = $1 AND is_active = TRUE"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn find_by_ids(pool: &PgPool, ids: &[String]) -> Result<Vec<Quiz>, sqlx::Error> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    sqlx::query_as::<_, Quiz>(&format!("SELECT {COLUMNS} FROM quizzes WHERE id = ANY($1)"))
        .bind(ids)
        .fetch_all(pool)
        .await
}

/// Who may see a listing: the owning teacher, or a student matching an eligibility entry.
pub(crate) enum QuizAudience {
    Owner(String),
    Student(EligibilityEntry),
}

pub(crate) struct ListQuizzesParams {
    pub(crate) audience: QuizAudience,
    /// Matched against the status derived at `now`, not the stored column.
    pub(crate) status: Option<QuizStatus>,
    pub(crate) now: PrimitiveDateTime,
    pub(crate) module_id: Option<String>,
    pub(crate) search: Option<String>,
    pub(crate) skip: i64,
    pub(crate) limit: i64,
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, params: &ListQuizzesParams) {
    builder.push(" WHERE is_active = TRUE");
    match &params.audience {
        QuizAudience::Owner(owner_id) => {
            builder.push(" AND created_by = ");
            builder.push_bind(owner_id.clone());
        }
        QuizAudience::Student(entry) => {
            builder.push(" AND status <> 'cancelled' AND eligibility @> ");
            builder.push_bind(Json(vec![entry.clone()]));
        }
    }
    match params.status {
        None => {}
        Some(QuizStatus::Cancelled) => {
            builder.push(" AND status = 'cancelled'");
        }
        Some(QuizStatus::Scheduled) => {
            builder.push(" AND status <> 'cancelled' AND start_time > ");
            builder.push_bind(params.now);
        }
        Some(QuizStatus::Active) => {
            builder.push(" AND status <> 'cancelled' AND start_time <= ");
            builder.push_bind(params.now);
            builder.push(" AND end_time >= ");
            builder.push_bind(params.now);
        }
        Some(QuizStatus::Completed) => {
            builder.push(" AND status <> 'cancelled' AND end_time < ");
            builder.push_bind(params.now);
        }
    }
    if let Some(module_id) = params.module_id.clone() {
        builder.push(" AND module_id = ");
        builder.push_bind(module_id);
    }
    if let Some(search) = params.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        builder.push(" AND title ILIKE ");
        builder.push_bind(format!("%{search}%"));
    }
}

pub(crate) async fn list(
    pool: &PgPool,
    params: &ListQuizzesParams,
) -> Result<Vec<Quiz>, sqlx::Error> {
    let mut builder = QueryBuilder::<Postgres>::new(format!("SELECT {COLUMNS} FROM quizzes"));
    push_filters(&mut builder, params);
    builder.push(" ORDER BY start_time DESC OFFSET ");
    builder.push_bind(params.skip.max(0));
    builder.push(" LIMIT ");
    builder.push_bind(params.limit.clamp(1, 1000));

    builder.build_query_as::<Quiz>().fetch_all(pool).await
}

pub(crate) async fn count(pool: &PgPool, params: &ListQuizzesParams) -> Result<i64, sqlx::Error> {
    let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM quizzes");
    push_filters(&mut builder, params);
    builder.build_query_scalar::<i64>().fetch_one(pool).await
}

pub(crate) async fn list_open_windows(pool: &PgPool) -> Result<Vec<QuizWindow>, sqlx::Error> {
    let rows = sqlx::query_as::<_, (String, QuizStatus, PrimitiveDateTime, PrimitiveDateTime)>(
        "SELECT id, status, start_time, end_time FROM quizzes WHERE status <> 'cancelled'",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(id, status, start_time, end_time)| QuizWindow { id, status, start_time, end_time })
        .collect())
}

/// Status write that never overwrites a cancellation made in the meantime.
pub(crate) async fn set_status_unless_cancelled(
    pool: &PgPool,
    id: &str,
    status: QuizStatus,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE quizzes SET status = $1, updated_at = $2
         WHERE id = $3 AND status <> 'cancelled'",
    )
    .bind(status)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub(crate) async fn cancel(
    pool: &PgPool,
    id: &str,
    now: PrimitiveDateTime,
) -> Result<Quiz, sqlx::Error> {
    sqlx::query_as::<_, Quiz>(&format!(
        "UPDATE quizzes SET status = $1, updated_at = $2 WHERE id = $3 RETURNING {COLUMNS}"
    ))
    .bind(QuizStatus::Cancelled)
    .bind(now)
    .bind(id)
    .fetch_one(pool)
    .await
}

pub(crate) async fn soft_delete(
    pool: &PgPool,
    id: &str,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE quizzes SET is_active = FALSE, status = $1, updated_at = $2 WHERE id = $3",
    )
    .bind(QuizStatus::Cancelled)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

pub(crate) async fn count_active_for_module(
    pool: &PgPool,
    module_id: &str,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM quizzes
         WHERE module_id = $1 AND is_active = TRUE AND status IN ('scheduled', 'active')",
    )
    .bind(module_id)
    .fetch_one(pool)
    .await
}
