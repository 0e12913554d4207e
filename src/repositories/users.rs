use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::db::models::User;
use crate::db::types::{AccountStatus, UserRole};
use crate::services::account_security::{LoginGuard, OneTimeCode, OtpPurpose};
use crate::services::accounts::AccountProfile;

const COLUMNS: &str = "\
    id, name, email, hashed_password, role, status, \
    failed_login_attempts, locked_until, last_login_at, \
    password_change_otp_hash, password_change_otp_expires_at, password_change_otp_attempts, \
    forgot_password_otp_hash, forgot_password_otp_expires_at, forgot_password_otp_attempts, \
    student_id, enrollment_year, program, academic_year, semester, \
    employee_id, department, subjects, created_at, updated_at";

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("SELECT {COLUMNS} FROM users WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("SELECT {COLUMNS} FROM users WHERE lower(email) = lower($1)"))
        .bind(email)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn find_names_by_ids(
    pool: &PgPool,
    ids: &[String],
) -> Result<Vec<(String, String, Option<String>)>, sqlx::Error> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    sqlx::query_as::<_, (String, String, Option<String>)>(
        "SELECT id, name, student_id FROM users WHERE id = ANY($1)",
    )
    .bind(ids)
    .fetch_all(pool)
    .await
}

/// Role-specific columns; only those matching the role are expected to be set.
#[derive(Debug, Clone, Default)]
pub(crate) struct ProfileColumns {
    pub(crate) student_id: Option<String>,
    pub(crate) enrollment_year: Option<i32>,
    pub(crate) program: Option<String>,
    pub(crate) academic_year: Option<i32>,
    pub(crate) semester: Option<i32>,
    pub(crate) employee_id: Option<String>,
    pub(crate) department: Option<String>,
    pub(crate) subjects: Vec<String>,
}

impl From<&AccountProfile> for ProfileColumns {
    fn from(profile: &AccountProfile) -> Self {
        match profile {
            AccountProfile::Student(student) => Self {
                student_id: Some(student.student_id.clone()),
                enrollment_year: Some(student.enrollment_year),
                program: Some(student.program.clone()),
                academic_year: Some(student.academic_year),
                semester: Some(student.semester),
                ..Self::default()
            },
            AccountProfile::Teacher(teacher) => Self {
                employee_id: Some(teacher.employee_id.clone()),
                department: Some(teacher.department.clone()),
                subjects: teacher.subjects.clone(),
                ..Self::default()
            },
            AccountProfile::Admin => Self::default(),
        }
    }
}

pub(crate) struct CreateUser<'a> {
    pub(crate) id: &'a str,
    pub(crate) name: &'a str,
    pub(crate) email: &'a str,
    pub(crate) hashed_password: String,
    pub(crate) role: UserRole,
    pub(crate) status: AccountStatus,
    pub(crate) profile: ProfileColumns,
    pub(crate) created_at: time::PrimitiveDateTime,
}

pub(crate) async fn create(pool: &PgPool, params: CreateUser<'_>) -> Result<User, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        "INSERT INTO users (
            id, name, email, hashed_password, role, status,
            student_id, enrollment_year, program, academic_year, semester,
            employee_id, department, subjects, created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$15)
        RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.name)
    .bind(params.email)
    .bind(params.hashed_password)
    .bind(params.role)
    .bind(params.status)
    .bind(params.profile.student_id)
    .bind(params.profile.enrollment_year)
    .bind(params.profile.program)
    .bind(params.profile.academic_year)
    .bind(params.profile.semester)
    .bind(params.profile.employee_id)
    .bind(params.profile.department)
    .bind(Json(params.profile.subjects))
    .bind(params.created_at)
    .fetch_one(pool)
    .await
}

/// Full replacement of the editable account fields; callers merge before calling.
pub(crate) struct UpdateUser {
    pub(crate) name: String,
    pub(crate) email: String,
    pub(crate) role: UserRole,
    pub(crate) status: AccountStatus,
    pub(crate) profile: ProfileColumns,
    pub(crate) hashed_password: Option<String>,
    pub(crate) updated_at: time::PrimitiveDateTime,
}

pub(crate) async fn update(pool: &PgPool, id: &str, params: UpdateUser) -> Result<User, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        "UPDATE users SET
            name = $1,
            email = $2,
            role = $3,
            status = $4,
            student_id = $5,
            enrollment_year = $6,
            program = $7,
            academic_year = $8,
            semester = $9,
            employee_id = $10,
            department = $11,
            subjects = $12,
            hashed_password = COALESCE($13, hashed_password),
            updated_at = $14
         WHERE id = $15
         RETURNING {COLUMNS}",
    ))
    .bind(params.name)
    .bind(params.email)
    .bind(params.role)
    .bind(params.status)
    .bind(params.profile.student_id)
    .bind(params.profile.enrollment_year)
    .bind(params.profile.program)
    .bind(params.profile.academic_year)
    .bind(params.profile.semester)
    .bind(params.profile.employee_id)
    .bind(params.profile.department)
    .bind(Json(params.profile.subjects))
    .bind(params.hashed_password)
    .bind(params.updated_at)
    .bind(id)
    .fetch_one(pool)
    .await
}

pub(crate) async fn save_login_guard(
    pool: &PgPool,
    id: &str,
    guard: &LoginGuard,
    now: time::PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE users SET
            failed_login_attempts = $1,
            locked_until = $2,
            last_login_at = $3,
            updated_at = $4
         WHERE id = $5",
    )
    .bind(guard.failed_attempts)
    .bind(guard.locked_until)
    .bind(guard.last_login_at)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

fn otp_columns(purpose: OtpPurpose) -> (&'static str, &'static str, &'static str) {
    match purpose {
        OtpPurpose::PasswordChange => (
            "password_change_otp_hash",
            "password_change_otp_expires_at",
            "password_change_otp_attempts",
        ),
        OtpPurpose::ForgotPassword => (
            "forgot_password_otp_hash",
            "forgot_password_otp_expires_at",
            "forgot_password_otp_attempts",
        ),
    }
}

pub(crate) async fn save_otp(
    pool: &PgPool,
    id: &str,
    purpose: OtpPurpose,
    code: &OneTimeCode,
    now: time::PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    let (hash_col, expires_col, attempts_col) = otp_columns(purpose);
    sqlx::query(&format!(
        "UPDATE users SET
            {hash_col} = $1,
            {expires_col} = $2,
            {attempts_col} = $3,
            updated_at = $4
         WHERE id = $5",
    ))
    .bind(code.code_hash.as_deref())
    .bind(code.expires_at)
    .bind(code.attempts)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Store a new password digest, clear the code slot for `purpose` and lift any lockout.
pub(crate) async fn set_password(
    pool: &PgPool,
    id: &str,
    hashed_password: &str,
    purpose: OtpPurpose,
    now: time::PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    let (hash_col, expires_col, attempts_col) = otp_columns(purpose);
    sqlx::query(&format!(
        "UPDATE users SET
            hashed_password = $1,
            {hash_col} = NULL,
            {expires_col} = NULL,
            {attempts_col} = 0,
            failed_login_attempts = 0,
            locked_until = NULL,
            updated_at = $2
         WHERE id = $3",
    ))
    .bind(hashed_password)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

#[derive(Debug, Default)]
pub(crate) struct ListUsersParams {
    pub(crate) search: Option<String>,
    pub(crate) role: Option<UserRole>,
    pub(crate) status: Option<AccountStatus>,
    pub(crate) skip: i64,
    pub(crate) limit: i64,
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, params: &ListUsersParams) {
    if let Some(search) = params.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{search}%");
        builder.push(" AND (name ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR email ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR student_id ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR employee_id ILIKE ");
        builder.push_bind(pattern);
        builder.push(")");
    }
    if let Some(role) = params.role {
        builder.push(" AND role = ");
        builder.push_bind(role);
    }
    if let Some(status) = params.status {
        builder.push(" AND status = ");
        builder.push_bind(status);
    }
}

pub(crate) async fn list(pool: &PgPool, params: &ListUsersParams) -> Result<Vec<User>, sqlx::Error> {
    let mut builder = QueryBuilder::<Postgres>::new(format!("SELECT {COLUMNS} FROM users WHERE TRUE"));
    push_filters(&mut builder, params);

    builder.push(" ORDER BY created_at DESC OFFSET ");
    builder.push_bind(params.skip.max(0));
    builder.push(" LIMIT ");
    builder.push_bind(params.limit.clamp(1, 1000));

    builder.build_query_as::<User>().fetch_all(pool).await
}

pub(crate) async fn count(pool: &PgPool, params: &ListUsersParams) -> Result<i64, sqlx::Error> {
    let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM users WHERE TRUE");
    push_filters(&mut builder, params);
    builder.build_query_scalar::<i64>().fetch_one(pool).await
}

pub(crate) async fn deactivate(
    pool: &PgPool,
    id: &str,
    now: time::PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE users SET status = $1, updated_at = $2 WHERE id = $3")
        .bind(AccountStatus::Inactive)
        .bind(now)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub(crate) async fn delete(pool: &PgPool, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM users WHERE id = $1").bind(id).execute(pool).await?;
    Ok(result.rows_affected() > 0)
}
