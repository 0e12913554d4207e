use axum::{
    extract::{Path, State},
    routing::get,
    Router,
};
use uuid::Uuid;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentAdmin;
use crate::api::pagination::{self, PaginatedResponse};
use crate::api::response::ApiResponse;
use crate::api::validation::{validate_password_strength, ApiQuery, ValidatedJson};
use crate::core::security;
use crate::core::state::AppState;
use crate::db::models::User;
use crate::repositories;
use crate::schemas::user::{
    AdminUserCreate, AdminUserUpdate, DeleteUserQuery, UserListQuery, UserResponse,
};
use crate::services::account_security::generate_temporary_password;
use crate::services::accounts::{normalize_email, AccountProfile, ProfileFields};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/:user_id", get(get_user).patch(update_user).delete(delete_user))
}

async fn list_users(
    State(state): State<AppState>,
    CurrentAdmin(_admin): CurrentAdmin,
    ApiQuery(params): ApiQuery<UserListQuery>,
) -> Result<ApiResponse<PaginatedResponse<UserResponse>>, ApiError> {
    let (skip, limit) = pagination::clamp(params.skip, params.limit);
    let filters = repositories::users::ListUsersParams {
        search: params.search,
        role: params.role,
        status: params.status,
        skip,
        limit,
    };

    let users = repositories::users::list(state.db(), &filters)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list users"))?;
    let total_count = repositories::users::count(state.db(), &filters)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count users"))?;

    let items = users.into_iter().map(UserResponse::from_db).collect();
    Ok(ApiResponse::ok("Users retrieved", PaginatedResponse::new(items, total_count, skip, limit)))
}

async fn create_user(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    ValidatedJson(payload): ValidatedJson<AdminUserCreate>,
) -> Result<ApiResponse<UserResponse>, ApiError> {
    let profile = AccountProfile::build(payload.role, &payload.profile)?;

    let (password, generated) = match payload.password {
        Some(password) => {
            validate_password_strength("password", &password)?;
            (password, false)
        }
        None => (generate_temporary_password(), true),
    };

    let hashed_password = security::hash_password(&password)
        .map_err(|e| ApiError::internal(e, "Failed to hash password"))?;

    let user = repositories::users::create(
        state.db(),
        repositories::users::CreateUser {
            id: &Uuid::new_v4().to_string(),
            name: payload.name.trim(),
            email: &normalize_email(&payload.email),
            hashed_password,
            role: profile.role(),
            status: payload.status,
            profile: (&profile).into(),
            created_at: state.now(),
        },
    )
    .await
    .map_err(|e| ApiError::from_db(e, "Failed to create user"))?;

    if generated {
        if let Err(err) =
            state.notifier().send_temporary_password(&user.email, &user.name, &password).await
        {
            tracing::warn!(error = %err, user_id = %user.id, "Failed to deliver temporary password");
        }
    }

    tracing::info!(
        admin_id = %admin.id,
        user_id = %user.id,
        role = user.role.as_str(),
        "Account created by admin"
    );

    Ok(ApiResponse::created("User created", UserResponse::from_db(user)))
}

async fn get_user(
    State(state): State<AppState>,
    CurrentAdmin(_admin): CurrentAdmin,
    Path(user_id): Path<String>,
) -> Result<ApiResponse<UserResponse>, ApiError> {
    let user = fetch_user(&state, &user_id).await?;
    Ok(ApiResponse::ok("User retrieved", UserResponse::from_db(user)))
}

async fn update_user(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Path(user_id): Path<String>,
    ValidatedJson(payload): ValidatedJson<AdminUserUpdate>,
) -> Result<ApiResponse<UserResponse>, ApiError> {
    let user = fetch_user(&state, &user_id).await?;

    let role = payload.role.unwrap_or(user.role);
    let fields = ProfileFields::from_row(&user).merged_with(payload.profile);
    let profile = AccountProfile::build(role, &fields)?;

    let hashed_password = match payload.password.as_deref() {
        Some(password) => {
            validate_password_strength("password", password)?;
            let hashed = security::hash_password(password)
                .map_err(|e| ApiError::internal(e, "Failed to hash password"))?;
            Some(hashed)
        }
        None => None,
    };

    let updated = repositories::users::update(
        state.db(),
        &user.id,
        repositories::users::UpdateUser {
            name: payload.name.map(|name| name.trim().to_string()).unwrap_or(user.name),
            email: payload.email.as_deref().map(normalize_email).unwrap_or(user.email),
            role: profile.role(),
            status: payload.status.unwrap_or(user.status),
            profile: (&profile).into(),
            hashed_password,
            updated_at: state.now(),
        },
    )
    .await
    .map_err(|e| ApiError::from_db(e, "Failed to update user"))?;

    tracing::info!(admin_id = %admin.id, user_id = %updated.id, "Account updated by admin");
    Ok(ApiResponse::ok("User updated", UserResponse::from_db(updated)))
}

async fn delete_user(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Path(user_id): Path<String>,
    ApiQuery(params): ApiQuery<DeleteUserQuery>,
) -> Result<ApiResponse<()>, ApiError> {
    if admin.id == user_id {
        return Err(ApiError::BadRequest("You cannot delete your own account".to_string()));
    }

    let (found, message) = if params.permanent {
        let deleted = repositories::users::delete(state.db(), &user_id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to delete user"))?;
        (deleted, "User permanently deleted")
    } else {
        let deactivated = repositories::users::deactivate(state.db(), &user_id, state.now())
            .await
            .map_err(|e| ApiError::internal(e, "Failed to deactivate user"))?;
        (deactivated, "User deactivated")
    };

    if !found {
        return Err(ApiError::NotFound("User not found".to_string()));
    }

    tracing::info!(
        admin_id = %admin.id,
        user_id = %user_id,
        permanent = params.permanent,
        "Account removed by admin"
    );
    Ok(ApiResponse::ok(message, ()))
}

async fn fetch_user(state: &AppState, user_id: &str) -> Result<User, ApiError> {
    repositories::users::find_by_id(state.db(), user_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load user"))?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))
}

#[cfg(test)]
mod tests;
