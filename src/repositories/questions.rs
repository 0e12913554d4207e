use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::db::models::{McqOption, Question};
use crate::db::types::QuestionType;

const COLUMNS: &str = "\
    id, module_id, module_code, academic_year, semester, question_type, text, options, \
    reference_answer, marks, is_active, created_by, created_at, updated_at";

pub(crate) struct CreateQuestion<'a> {
    pub(crate) id: &'a str,
    pub(crate) module_id: &'a str,
    pub(crate) module_code: &'a str,
    pub(crate) academic_year: i32,
    pub(crate) semester: i32,
    pub(crate) question_type: QuestionType,
    pub(crate) text: &'a str,
    pub(crate) options: Vec<McqOption>,
    pub(crate) reference_answer: Option<&'a str>,
    pub(crate) marks: f64,
    pub(crate) created_by: &'a str,
    pub(crate) created_at: time::PrimitiveDateTime,
}

pub(crate) async fn create(
    pool: &PgPool,
    params: CreateQuestion<'_>,
) -> Result<Question, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!(
        "INSERT INTO questions (
            id, module_id, module_code, academic_year, semester, question_type, text, options,
            reference_answer, marks, is_active, created_by, created_at, updated_at
         ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,TRUE,$11,$12,$12)
         RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.module_id)
    .bind(params.module_code)
    .bind(params.academic_year)
    .bind(params.semester)
    .bind(params.question_type)
    .bind(params.text)
    .bind(Json(params.options))
    .bind(params.reference_answer)
    .bind(params.marks)
    .bind(params.created_by)
    .bind(params.created_at)
    .fetch_one(pool)
    .await
}

pub(crate) async fn find_owned(
    pool: &PgPool,
    id: &str,
    owner_id: &str,
) -> Result<Option<Question>, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!(
        "SELECT {COLUMNS} FROM questions WHERE id = $1 AND created_by = $2 AND is_active = TRUE"
    ))
    .bind(id)
    .bind(owner_id)
    .fetch_optional(pool)
    .await
}

/// Active questions of a module, oldest first.
pub(crate) async fn list_active_for_module(
    pool: &PgPool,
    module_id: &str,
) -> Result<Vec<Question>, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!(
        "SELECT {COLUMNS} FROM questions
         WHERE module_id = $1 AND is_active = TRUE
         ORDER BY created_at, id"
    ))
    .bind(module_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn count_active_for_module(
    pool: &PgPool,
    module_id: &str,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM questions WHERE module_id = $1 AND is_active = TRUE",
    )
    .bind(module_id)
    .fetch_one(pool)
    .await
}

pub(crate) struct ListQuestionsParams {
    pub(crate) owner_id: String,
    pub(crate) module_id: Option<String>,
    pub(crate) question_type: Option<QuestionType>,
    pub(crate) search: Option<String>,
    pub(crate) skip: i64,
    pub(crate) limit: i64,
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, params: &ListQuestionsParams) {
    builder.push(" WHERE is_active = TRUE AND created_by = ");
    builder.push_bind(params.owner_id.clone());
    if let Some(module_id) = params.module_id.clone() {
        builder.push(" AND module_id = ");
        builder.push_bind(module_id);
    }
    if let Some(question_type) = params.question_type {
        builder.push(" AND question_type = ");
        builder.push_bind(question_type);
    }
    if let Some(search) = params.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        builder.push(" AND text ILIKE ");
        builder.push_bind(format!("%{search}%"));
    }
}

pub(crate) async fn list(
    pool: &PgPool,
    params: &ListQuestionsParams,
) -> Result<Vec<Question>, sqlx::Error> {
    let mut builder = QueryBuilder::<Postgres>::new(format!("SELECT {COLUMNS} FROM questions"));
    push_filters(&mut builder, params);
    builder.push(" ORDER BY created_at DESC OFFSET ");
    builder.push_bind(params.skip.max(0));
    builder.push(" LIMIT ");
    builder.push_bind(params.limit.clamp(1, 1000));

    builder.build_query_as::<Question>().fetch_all(pool).await
}

pub(crate) async fn count(pool: &PgPool, params: &ListQuestionsParams) -> Result<i64, sqlx::Error> {
    let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM questions");
    push_filters(&mut builder, params);
    builder.build_query_scalar::<i64>().fetch_one(pool).await
}

/// Full replacement of the editable fields; callers merge the patch first.
pub(crate) struct UpdateQuestion {
    pub(crate) question_type: QuestionType,
    pub(crate) text: String,
    pub(crate) options: Vec<McqOption>,
    pub(crate) reference_answer: Option<String>,
    pub(crate) marks: f64,
    pub(crate) updated_at: time::PrimitiveDateTime,
}

pub(crate) async fn update(
    pool: &PgPool,
    id: &str,
    params: UpdateQuestion,
) -> Result<Question, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!(
        "UPDATE questions SET
            question_type = $1,
            text = $2,
            options = $3,
            reference_answer = $4,
            marks = $5,
            updated_at = $6
         WHERE id = $7
         RETURNING {COLUMNS}",
    ))
    .bind(params.question_type)
    .bind(params.text)
    .bind(Json(params.options))
    .bind(params.reference_answer)
    .bind(params.marks)
    .bind(params.updated_at)
    .bind(id)
    .fetch_one(pool)
    .await
}

pub(crate) async fn deactivate(
    pool: &PgPool,
    id: &str,
    now: time::PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE questions SET is_active = FALSE, updated_at = $1 WHERE id = $2")
        .bind(now)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}
