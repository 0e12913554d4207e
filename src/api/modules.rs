use axum::{
    extract::{Path, State},
    routing::get,
    Router,
};
use uuid::Uuid;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentTeacher;
use crate::api::pagination::{self, PaginatedResponse};
use crate::api::response::ApiResponse;
use crate::api::validation::{ApiQuery, ValidatedJson};
use crate::core::state::AppState;
use crate::db::models::Module;
use crate::repositories;
use crate::schemas::module::{
    normalize_code, ModuleCreate, ModuleListQuery, ModuleResponse, ModuleUpdate,
};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_modules).post(create_module))
        .route("/:module_id", get(get_module).patch(update_module).delete(delete_module))
}

async fn list_modules(
    State(state): State<AppState>,
    CurrentTeacher(teacher): CurrentTeacher,
    ApiQuery(params): ApiQuery<ModuleListQuery>,
) -> Result<ApiResponse<PaginatedResponse<ModuleResponse>>, ApiError> {
    let (skip, limit) = pagination::clamp(params.skip, params.limit);
    let filters = repositories::modules::ListModulesParams {
        owner_id: teacher.id,
        search: params.search,
        academic_year: params.academic_year,
        semester: params.semester,
        skip,
        limit,
    };

    let modules = repositories::modules::list(state.db(), &filters)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list modules"))?;
    let total_count = repositories::modules::count(state.db(), &filters)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count modules"))?;

    let items = modules.into_iter().map(ModuleResponse::from_db).collect();
    Ok(ApiResponse::ok("Modules retrieved", PaginatedResponse::new(items, total_count, skip, limit)))
}

async fn create_module(
    State(state): State<AppState>,
    CurrentTeacher(teacher): CurrentTeacher,
    ValidatedJson(payload): ValidatedJson<ModuleCreate>,
) -> Result<ApiResponse<ModuleResponse>, ApiError> {
    let module = repositories::modules::create(
        state.db(),
        repositories::modules::CreateModule {
            id: &Uuid::new_v4().to_string(),
            code: &normalize_code(&payload.code),
            name: payload.name.trim(),
            academic_year: payload.academic_year,
            semester: payload.semester,
            credits: payload.credits,
            created_by: &teacher.id,
            created_at: state.now(),
        },
    )
    .await
    .map_err(|e| ApiError::from_db(e, "Failed to create module"))?;

    tracing::info!(teacher_id = %teacher.id, module_id = %module.id, "Module created");
    Ok(ApiResponse::created("Module created", ModuleResponse::from_db(module)))
}

async fn get_module(
    State(state): State<AppState>,
    CurrentTeacher(teacher): CurrentTeacher,
    Path(module_id): Path<String>,
) -> Result<ApiResponse<ModuleResponse>, ApiError> {
    let module = fetch_owned_module(&state, &module_id, &teacher.id).await?;
    Ok(ApiResponse::ok("Module retrieved", ModuleResponse::from_db(module)))
}

async fn update_module(
    State(state): State<AppState>,
    CurrentTeacher(teacher): CurrentTeacher,
    Path(module_id): Path<String>,
    ValidatedJson(payload): ValidatedJson<ModuleUpdate>,
) -> Result<ApiResponse<ModuleResponse>, ApiError> {
    let module = fetch_owned_module(&state, &module_id, &teacher.id).await?;

    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start module transaction"))?;
    let updated = repositories::modules::update(
        &mut *tx,
        &module.id,
        repositories::modules::UpdateModule {
            code: payload.code.as_deref().map(normalize_code),
            name: payload.name.map(|name| name.trim().to_string()),
            academic_year: payload.academic_year,
            semester: payload.semester,
            credits: payload.credits,
            updated_at: state.now(),
        },
    )
    .await
    .map_err(|e| ApiError::from_db(e, "Failed to update module"))?;

    let copies_changed = updated.code != module.code
        || updated.academic_year != module.academic_year
        || updated.semester != module.semester;
    if copies_changed {
        repositories::modules::sync_question_copies(&mut tx, &updated)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to sync module copies"))?;
    }
    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit module update"))?;

    Ok(ApiResponse::ok("Module updated", ModuleResponse::from_db(updated)))
}

async fn delete_module(
    State(state): State<AppState>,
    CurrentTeacher(teacher): CurrentTeacher,
    Path(module_id): Path<String>,
) -> Result<ApiResponse<()>, ApiError> {
    let module = fetch_owned_module(&state, &module_id, &teacher.id).await?;

    let questions = repositories::questions::count_active_for_module(state.db(), &module.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count module questions"))?;
    if questions > 0 {
        return Err(ApiError::BadRequest(format!(
            "Module still has {questions} active question(s); delete them first"
        )));
    }

    let quizzes = repositories::quizzes::count_active_for_module(state.db(), &module.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count module quizzes"))?;
    if quizzes > 0 {
        return Err(ApiError::BadRequest(
            "Module is used by scheduled or active quizzes".to_string(),
        ));
    }

    repositories::modules::deactivate(state.db(), &module.id, state.now())
        .await
        .map_err(|e| ApiError::internal(e, "Failed to delete module"))?;

    tracing::info!(teacher_id = %teacher.id, module_id = %module.id, "Module deleted");
    Ok(ApiResponse::ok("Module deleted", ()))
}

pub(crate) async fn fetch_owned_module(
    state: &AppState,
    module_id: &str,
    owner_id: &str,
) -> Result<Module, ApiError> {
    repositories::modules::find_owned(state.db(), module_id, owner_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load module"))?
        .ok_or_else(|| ApiError::NotFound("Module not found".to_string()))
}

#[cfg(test)]
mod tests;
