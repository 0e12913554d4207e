use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use time::PrimitiveDateTime;

use crate::db::models::{AnswerRecord, QuizResult};

const COLUMNS: &str = "\
    id, quiz_id, student_id, teacher_id, answers, score, total_marks, percentage, grade, \
    time_taken_seconds, started_at, submitted_at, created_at";

pub(crate) struct CreateResult<'a> {
    pub(crate) id: &'a str,
    pub(crate) quiz_id: &'a str,
    pub(crate) student_id: &'a str,
    pub(crate) teacher_id: &'a str,
    pub(crate) answers: Vec<AnswerRecord>,
    pub(crate) score: f64,
    pub(crate) total_marks: f64,
    pub(crate) percentage: f64,
    pub(crate) grade: &'a str,
    pub(crate) time_taken_seconds: i32,
    pub(crate) started_at: Option<PrimitiveDateTime>,
    pub(crate) submitted_at: PrimitiveDateTime,
    pub(crate) created_at: PrimitiveDateTime,
}

/// Fails with a unique violation on `results_student_quiz_key` for a repeat submission.
pub(crate) async fn create(
    pool: &PgPool,
    params: CreateResult<'_>,
) -> Result<QuizResult, sqlx::Error> {
    sqlx::query_as::<_, QuizResult>(&format!(
        "INSERT INTO results (
            id, quiz_id, student_id, teacher_id, answers, score, total_marks, percentage,
            grade, time_taken_seconds, started_at, submitted_at, created_at
         ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13)
         RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.quiz_id)
    .bind(params.student_id)
    .bind(params.teacher_id)
    .bind(Json(params.answers))
    .bind(params.score)
    .bind(params.total_marks)
    .bind(params.percentage)
    .bind(params.grade)
    .bind(params.time_taken_seconds)
    .bind(params.started_at)
    .bind(params.submitted_at)
    .bind(params.created_at)
    .fetch_one(pool)
    .await
}

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<QuizResult>, sqlx::Error> {
    sqlx::query_as::<_, QuizResult>(&format!("SELECT {COLUMNS} FROM results WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn exists_for(
    pool: &PgPool,
    student_id: &str,
    quiz_id: &str,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS (SELECT 1 FROM results WHERE student_id = $1 AND quiz_id = $2)",
    )
    .bind(student_id)
    .bind(quiz_id)
    .fetch_one(pool)
    .await
}

pub(crate) async fn list_for_student(
    pool: &PgPool,
    student_id: &str,
    skip: i64,
    limit: i64,
) -> Result<Vec<QuizResult>, sqlx::Error> {
    sqlx::query_as::<_, QuizResult>(&format!(
        "SELECT {COLUMNS} FROM results
         WHERE student_id = $1
         ORDER BY submitted_at DESC
         OFFSET $2 LIMIT $3"
    ))
    .bind(student_id)
    .bind(skip.max(0))
    .bind(limit.clamp(1, 1000))
    .fetch_all(pool)
    .await
}

pub(crate) async fn count_for_student(pool: &PgPool, student_id: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM results WHERE student_id = $1")
        .bind(student_id)
        .fetch_one(pool)
        .await
}

pub(crate) async fn list_for_quiz(
    pool: &PgPool,
    quiz_id: &str,
) -> Result<Vec<QuizResult>, sqlx::Error> {
    sqlx::query_as::<_, QuizResult>(&format!(
        "SELECT {COLUMNS} FROM results WHERE quiz_id = $1 ORDER BY percentage DESC, submitted_at"
    ))
    .bind(quiz_id)
    .fetch_all(pool)
    .await
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct ResultSummaryRow {
    pub(crate) submissions: i64,
    pub(crate) average_percentage: Option<f64>,
    pub(crate) highest_percentage: Option<f64>,
    pub(crate) lowest_percentage: Option<f64>,
}

pub(crate) async fn summary_for_quiz(
    pool: &PgPool,
    quiz_id: &str,
) -> Result<ResultSummaryRow, sqlx::Error> {
    sqlx::query_as::<_, ResultSummaryRow>(
        "SELECT COUNT(*) AS submissions,
                AVG(percentage) AS average_percentage,
                MAX(percentage) AS highest_percentage,
                MIN(percentage) AS lowest_percentage
         FROM results
         WHERE quiz_id = $1",
    )
    .bind(quiz_id)
    .fetch_one(pool)
    .await
}
