use axum::{
    extract::{Path, State},
    routing::get,
    Router,
};
use uuid::Uuid;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentTeacher;
use crate::api::modules::fetch_owned_module;
use crate::api::pagination::{self, PaginatedResponse};
use crate::api::response::ApiResponse;
use crate::api::validation::{ApiQuery, ValidatedJson};
use crate::core::state::AppState;
use crate::db::models::Question;
use crate::db::types::QuestionType;
use crate::repositories;
use crate::schemas::question::{
    check_question_shape, OptionInput, QuestionBody, QuestionCreate, QuestionListQuery,
    QuestionResponse, QuestionUpdate,
};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_questions).post(create_question))
        .route(
            "/:question_id",
            get(get_question).patch(update_question).delete(delete_question),
        )
}

async fn list_questions(
    State(state): State<AppState>,
    CurrentTeacher(teacher): CurrentTeacher,
    ApiQuery(params): ApiQuery<QuestionListQuery>,
) -> Result<ApiResponse<PaginatedResponse<QuestionResponse>>, ApiError> {
    let (skip, limit) = pagination::clamp(params.skip, params.limit);
    let filters = repositories::questions::ListQuestionsParams {
        owner_id: teacher.id,
        module_id: params.module_id,
        question_type: params.question_type,
        search: params.search,
        skip,
        limit,
    };

    let questions = repositories::questions::list(state.db(), &filters)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list questions"))?;
    let total_count = repositories::questions::count(state.db(), &filters)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count questions"))?;

    let items = questions.into_iter().map(QuestionResponse::from_db).collect();
    Ok(ApiResponse::ok(
        "Questions retrieved",
        PaginatedResponse::new(items, total_count, skip, limit),
    ))
}

async fn create_question(
    State(state): State<AppState>,
    CurrentTeacher(teacher): CurrentTeacher,
    ValidatedJson(payload): ValidatedJson<QuestionCreate>,
) -> Result<ApiResponse<QuestionResponse>, ApiError> {
    let module = fetch_owned_module(&state, &payload.module_id, &teacher.id).await?;
    let body = shaped(
        payload.question_type,
        &payload.options,
        payload.reference_answer.as_deref(),
    )?;

    let question = repositories::questions::create(
        state.db(),
        repositories::questions::CreateQuestion {
            id: &Uuid::new_v4().to_string(),
            module_id: &module.id,
            module_code: &module.code,
            academic_year: module.academic_year,
            semester: module.semester,
            question_type: payload.question_type,
            text: payload.text.trim(),
            options: body.options,
            reference_answer: body.reference_answer.as_deref(),
            marks: payload.marks,
            created_by: &teacher.id,
            created_at: state.now(),
        },
    )
    .await
    .map_err(|e| ApiError::from_db(e, "Failed to create question"))?;

    tracing::info!(
        teacher_id = %teacher.id,
        question_id = %question.id,
        module_id = %module.id,
        "Question created"
    );
    Ok(ApiResponse::created("Question created", QuestionResponse::from_db(question)))
}

async fn get_question(
    State(state): State<AppState>,
    CurrentTeacher(teacher): CurrentTeacher,
    Path(question_id): Path<String>,
) -> Result<ApiResponse<QuestionResponse>, ApiError> {
    let question = fetch_owned_question(&state, &question_id, &teacher.id).await?;
    Ok(ApiResponse::ok("Question retrieved", QuestionResponse::from_db(question)))
}

async fn update_question(
    State(state): State<AppState>,
    CurrentTeacher(teacher): CurrentTeacher,
    Path(question_id): Path<String>,
    ValidatedJson(payload): ValidatedJson<QuestionUpdate>,
) -> Result<ApiResponse<QuestionResponse>, ApiError> {
    let question = fetch_owned_question(&state, &question_id, &teacher.id).await?;

    let question_type = payload.question_type.unwrap_or(question.question_type);
    if question_type != question.question_type {
        ensure_module_not_in_quiz(&state, &question.module_id).await?;
    }
    let options = match payload.options {
        Some(options) => options,
        None => question
            .options
            .0
            .iter()
            .map(|option| OptionInput { text: option.text.clone(), is_correct: option.is_correct })
            .collect(),
    };
    let reference_answer = payload.reference_answer.or_else(|| question.reference_answer.clone());
    let body = shaped(question_type, &options, reference_answer.as_deref())?;

    let updated = repositories::questions::update(
        state.db(),
        &question.id,
        repositories::questions::UpdateQuestion {
            question_type,
            text: payload.text.map(|text| text.trim().to_string()).unwrap_or(question.text),
            options: body.options,
            reference_answer: body.reference_answer,
            marks: payload.marks.unwrap_or(question.marks),
            updated_at: state.now(),
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to update question"))?;

    Ok(ApiResponse::ok("Question updated", QuestionResponse::from_db(updated)))
}

async fn delete_question(
    State(state): State<AppState>,
    CurrentTeacher(teacher): CurrentTeacher,
    Path(question_id): Path<String>,
) -> Result<ApiResponse<()>, ApiError> {
    let question = fetch_owned_question(&state, &question_id, &teacher.id).await?;
    ensure_module_not_in_quiz(&state, &question.module_id).await?;

    repositories::questions::deactivate(state.db(), &question.id, state.now())
        .await
        .map_err(|e| ApiError::internal(e, "Failed to delete question"))?;

    Ok(ApiResponse::ok("Question deleted", ()))
}

/// Rejects edits that would change what a scheduled or active quiz grades against.
async fn ensure_module_not_in_quiz(state: &AppState, module_id: &str) -> Result<(), ApiError> {
    let quizzes = repositories::quizzes::count_active_for_module(state.db(), module_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count module quizzes"))?;
    if quizzes > 0 {
        return Err(ApiError::BadRequest(
            "Module is used by scheduled or active quizzes".to_string(),
        ));
    }
    Ok(())
}

fn shaped(
    question_type: QuestionType,
    options: &[OptionInput],
    reference_answer: Option<&str>,
) -> Result<QuestionBody, ApiError> {
    check_question_shape(question_type, options, reference_answer).map_err(|message| {
        let field = match question_type {
            QuestionType::Mcq => "options",
            QuestionType::Structured | QuestionType::Essay => "reference_answer",
        };
        ApiError::field(field, message)
    })
}

async fn fetch_owned_question(
    state: &AppState,
    question_id: &str,
    owner_id: &str,
) -> Result<Question, ApiError> {
    repositories::questions::find_owned(state.db(), question_id, owner_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load question"))?
        .ok_or_else(|| ApiError::NotFound("Question not found".to_string()))
}
