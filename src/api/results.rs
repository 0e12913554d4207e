use std::collections::HashMap;

use axum::{
    extract::{Path, State},
    routing::get,
    Router,
};
use serde::Deserialize;

use crate::api::errors::ApiError;
use crate::api::guards::{CurrentStudent, CurrentUser};
use crate::api::pagination::{self, PaginatedResponse};
use crate::api::response::ApiResponse;
use crate::api::validation::ApiQuery;
use crate::core::state::AppState;
use crate::db::models::{Quiz, QuizResult};
use crate::repositories;
use crate::schemas::result::{ResultResponse, StudentResultView, SubmissionReceipt};
use crate::services::quiz_lifecycle;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/me", get(my_results))
        .route("/:result_id", get(get_result))
}

#[derive(Debug, Deserialize)]
struct MyResultsQuery {
    #[serde(default)]
    skip: i64,
    #[serde(default = "pagination::default_limit")]
    limit: i64,
}

async fn my_results(
    State(state): State<AppState>,
    CurrentStudent(student, _profile): CurrentStudent,
    ApiQuery(params): ApiQuery<MyResultsQuery>,
) -> Result<ApiResponse<PaginatedResponse<StudentResultView>>, ApiError> {
    let (skip, limit) = pagination::clamp(params.skip, params.limit);

    let results = repositories::results::list_for_student(state.db(), &student.id, skip, limit)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list results"))?;
    let total_count = repositories::results::count_for_student(state.db(), &student.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count results"))?;

    let quiz_ids: Vec<String> = results.iter().map(|result| result.quiz_id.clone()).collect();
    let quizzes: HashMap<String, Quiz> = repositories::quizzes::find_by_ids(state.db(), &quiz_ids)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load quizzes"))?
        .into_iter()
        .map(|quiz| (quiz.id.clone(), quiz))
        .collect();

    let now = state.now();
    let items = results
        .into_iter()
        .map(|result| {
            let released = quizzes
                .get(&result.quiz_id)
                .map_or(true, |quiz| quiz_lifecycle::results_released(quiz, now));
            student_view(result, released)
        })
        .collect();

    Ok(ApiResponse::ok("Results retrieved", PaginatedResponse::new(items, total_count, skip, limit)))
}

async fn get_result(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(result_id): Path<String>,
) -> Result<ApiResponse<StudentResultView>, ApiError> {
    let result = repositories::results::find_by_id(state.db(), &result_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load result"))?
        .ok_or_else(|| ApiError::NotFound("Result not found".to_string()))?;

    if result.teacher_id == user.id {
        return Ok(ApiResponse::ok(
            "Result retrieved",
            StudentResultView::Released(ResultResponse::from_db(result)),
        ));
    }

    if result.student_id != user.id {
        return Err(ApiError::Forbidden("You do not have access to this result"));
    }

    let quiz = repositories::quizzes::find_by_ids(state.db(), std::slice::from_ref(&result.quiz_id))
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load quiz"))?
        .into_iter()
        .next();
    let released =
        quiz.as_ref().map_or(true, |quiz| quiz_lifecycle::results_released(quiz, state.now()));

    Ok(ApiResponse::ok("Result retrieved", student_view(result, released)))
}

/// Full result once released, otherwise only a receipt.
pub(crate) fn student_view(result: QuizResult, released: bool) -> StudentResultView {
    if released {
        StudentResultView::Released(ResultResponse::from_db(result))
    } else {
        StudentResultView::Withheld(SubmissionReceipt::from_db(&result))
    }
}
