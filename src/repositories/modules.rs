use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::db::models::Module;

const COLUMNS: &str =
    "id, code, name, academic_year, semester, credits, is_active, created_by, created_at, updated_at";

pub(crate) struct CreateModule<'a> {
    pub(crate) id: &'a str,
    pub(crate) code: &'a str,
    pub(crate) name: &'a str,
    pub(crate) academic_year: i32,
    pub(crate) semester: i32,
    pub(crate) credits: i32,
    pub(crate) created_by: &'a str,
    pub(crate) created_at: time::PrimitiveDateTime,
}

pub(crate) struct UpdateModule {
    pub(crate) code: Option<String>,
    pub(crate) name: Option<String>,
    pub(crate) academic_year: Option<i32>,
    pub(crate) semester: Option<i32>,
    pub(crate) credits: Option<i32>,
    pub(crate) updated_at: time::PrimitiveDateTime,
}

pub(crate) async fn create(pool: &PgPool, params: CreateModule<'_>) -> Result<Module, sqlx::Error> {
    sqlx::query_as::<_, Module>(&format!(
        "INSERT INTO modules (
            id, code, name, academic_year, semester, credits, is_active, created_by,
            created_at, updated_at
         ) VALUES ($1,$2,$3,$4,$5,$6,TRUE,$7,$8,$8)
         RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.code)
    .bind(params.name)
    .bind(params.academic_year)
    .bind(params.semester)
    .bind(params.credits)
    .bind(params.created_by)
    .bind(params.created_at)
    .fetch_one(pool)
    .await
}

/// Active module owned by `owner_id`.
pub(crate) async fn find_owned(
    pool: &PgPool,
    id: &str,
    owner_id: &str,
) -> Result<Option<Module>, sqlx::Error> {
    sqlx::query_as::<_, Module>(&format!(
        "SELECT {COLUMNS} FROM modules WHERE id = $1 AND created_by = $2 AND is_active = TRUE"
    ))
    .bind(id)
    .bind(owner_id)
    .fetch_optional(pool)
    .await
}

pub(crate) struct ListModulesParams {
    pub(crate) owner_id: String,
    pub(crate) search: Option<String>,
    pub(crate) academic_year: Option<i32>,
    pub(crate) semester: Option<i32>,
    pub(crate) skip: i64,
    pub(crate) limit: i64,
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, params: &ListModulesParams) {
    builder.push(" WHERE is_active = TRUE AND created_by = ");
    builder.push_bind(params.owner_id.clone());
    if let Some(search) = params.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{search}%");
        builder.push(" AND (code ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR name ILIKE ");
        builder.push_bind(pattern);
        builder.push(")");
    }
    if let Some(year) = params.academic_year {
        builder.push(" AND academic_year = ");
        builder.push_bind(year);
    }
    if let Some(semester) = params.semester {
        builder.push(" AND semester = ");
        builder.push_bind(semester);
    }
}

pub(crate) async fn list(
    pool: &PgPool,
    params: &ListModulesParams,
) -> Result<Vec<Module>, sqlx::Error> {
    let mut builder = QueryBuilder::<Postgres>::new(format!("SELECT {COLUMNS} FROM modules"));
    push_filters(&mut builder, params);
    builder.push(" ORDER BY academic_year, semester, code OFFSET ");
    builder.push_bind(params.skip.max(0));
    builder.push(" LIMIT ");
    builder.push_bind(params.limit.clamp(1, 1000));

    builder.build_query_as::<Module>().fetch_all(pool).await
}

pub(crate) async fn count(pool: &PgPool, params: &ListModulesParams) -> Result<i64, sqlx::Error> {
    let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM modules");
    push_filters(&mut builder, params);
    builder.build_query_scalar::<i64>().fetch_one(pool).await
}

pub(crate) async fn update(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    params: UpdateModule,
) -> Result<Module, sqlx::Error> {
    sqlx::query_as::<_, Module>(&format!(
        "UPDATE modules SET
            code = COALESCE($1, code),
            name = COALESCE($2, name),
            academic_year = COALESCE($3, academic_year),
            semester = COALESCE($4, semester),
            credits = COALESCE($5, credits),
            updated_at = $6
         WHERE id = $7
         RETURNING {COLUMNS}",
    ))
    .bind(params.code)
    .bind(params.name)
    .bind(params.academic_year)
    .bind(params.semester)
    .bind(params.credits)
    .bind(params.updated_at)
    .bind(id)
    .fetch_one(executor)
    .await
}

/// Keep the denormalized copies on questions and quizzes in sync after a module edit.
pub(crate) async fn sync_question_copies(
    executor: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    module: &Module,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE questions SET module_code = $1, academic_year = $2, semester = $3
         WHERE module_id = $4",
    )
    .bind(&module.code)
    .bind(module.academic_year)
    .bind(module.semester)
    .bind(&module.id)
    .execute(&mut **executor)
    .await?;

    sqlx::query("UPDATE quizzes SET module_code = $1 WHERE module_id = $2")
        .bind(&module.code)
        .bind(&module.id)
        .execute(&mut **executor)
        .await?;

    Ok(())
}

pub(crate) async fn deactivate(
    pool: &PgPool,
    id: &str,
    now: time::PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE modules SET is_active = FALSE, updated_at = $1 WHERE id = $2")
        .bind(now)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}
