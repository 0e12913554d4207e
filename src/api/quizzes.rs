use std::collections::HashMap;

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    routing::{get, post},
    Router,
};
use uuid::Uuid;

use crate::api::errors::ApiError;
use crate::api::guards::{CurrentStudent, CurrentTeacher, CurrentUser};
use crate::api::modules::fetch_owned_module;
use crate::api::pagination::{self, PaginatedResponse};
use crate::api::response::ApiResponse;
use crate::api::results::student_view;
use crate::api::validation::{ApiQuery, ValidatedJson};
use crate::core::metrics;
use crate::core::state::AppState;
use crate::db::models::{EligibilityEntry, Module, Quiz, User};
use crate::db::types::UserRole;
use crate::repositories;
use crate::repositories::quizzes::{QuizAudience, QuizFields};
use crate::schemas::question::StudentQuestionView;
use crate::schemas::quiz::{
    PasscodeRequest, QuizCreate, QuizListQuery, QuizQuestionsResponse, QuizResponse,
    QuizSummary, QuizUpdate, QuizView,
};
use crate::schemas::result::{
    QuizResultsResponse, ResultResponse, ResultSummary, StudentResultRow, StudentResultView,
    SubmitRequest,
};
use crate::services::accounts::{Account, StudentProfile};
use crate::services::grading::{self, SubmittedAnswer};
use crate::services::quiz_lifecycle::{self as lifecycle, AccessDenied, LifecycleError};

/// Header carrying the quiz passcode when fetching questions.
pub(crate) const PASSCODE_HEADER: &str = "x-quiz-passcode";

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_quizzes).post(create_quiz))
        .route("/:quiz_id", get(get_quiz).patch(update_quiz).delete(delete_quiz))
        .route("/:quiz_id/cancel", post(cancel_quiz))
        .route("/:quiz_id/verify-passcode", post(verify_passcode))
        .route("/:quiz_id/questions", get(quiz_questions))
        .route("/:quiz_id/submit", post(submit_quiz))
        .route("/:quiz_id/results", get(quiz_results))
}

enum Viewer {
    Teacher(User),
    Student(StudentProfile),
}

fn viewer(user: User) -> Result<Viewer, ApiError> {
    match user.role {
        UserRole::Teacher => Ok(Viewer::Teacher(user)),
        UserRole::Student => {
            let account = Account::try_from(user)
                .map_err(|e| ApiError::internal(e, "Stored student profile is invalid"))?;
            account
                .profile
                .as_student()
                .cloned()
                .map(Viewer::Student)
                .ok_or(ApiError::Forbidden("Student access required"))
        }
        UserRole::Admin => Err(ApiError::Forbidden("Teacher or student access required")),
    }
}

async fn list_quizzes(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiQuery(params): ApiQuery<QuizListQuery>,
) -> Result<ApiResponse<PaginatedResponse<QuizView>>, ApiError> {
    let (skip, limit) = pagination::clamp(params.skip, params.limit);
    let viewer = viewer(user)?;
    let audience = match &viewer {
        Viewer::Teacher(teacher) => QuizAudience::Owner(teacher.id.clone()),
        Viewer::Student(profile) => QuizAudience::Student(EligibilityEntry {
            program: profile.program.clone(),
            academic_year: profile.academic_year,
            semester: profile.semester,
        }),
    };
    let filters = repositories::quizzes::ListQuizzesParams {
        audience,
        status: params.status,
        now: state.now(),
        module_id: params.module_id,
        search: params.search,
        skip,
        limit,
    };

    let quizzes = repositories::quizzes::list(state.db(), &filters)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list quizzes"))?;
    let total_count = repositories::quizzes::count(state.db(), &filters)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count quizzes"))?;

    let mut items = Vec::with_capacity(quizzes.len());
    for quiz in quizzes {
        let quiz = with_current_status(&state, quiz).await;
        items.push(match viewer {
            Viewer::Teacher(_) => QuizView::Owner(QuizResponse::from_db(quiz)),
            Viewer::Student(_) => QuizView::Student(QuizSummary::from_db(quiz)),
        });
    }

    Ok(ApiResponse::ok("Quizzes retrieved", PaginatedResponse::new(items, total_count, skip, limit)))
}

async fn create_quiz(
    State(state): State<AppState>,
    CurrentTeacher(teacher): CurrentTeacher,
    ValidatedJson(payload): ValidatedJson<QuizCreate>,
) -> Result<ApiResponse<QuizResponse>, ApiError> {
    let now = state.now();
    lifecycle::validate_new_window(now, payload.start_time, payload.end_time)?;
    let (module, question_count) = quiz_module(&state, &payload.module_id, &teacher.id).await?;

    let fields = QuizFields {
        title: payload.title.trim().to_string(),
        module_id: module.id,
        module_code: module.code,
        question_count,
        start_time: payload.start_time,
        end_time: payload.end_time,
        duration_minutes: payload.duration_minutes,
        instructions: payload.instructions,
        passcode: payload.passcode,
        eligibility: payload.eligibility.into_iter().map(|entry| entry.into_entry()).collect(),
        shuffle_questions: payload.shuffle_questions,
        show_results_immediately: payload.show_results_immediately,
        allow_late_submission: payload.allow_late_submission,
        max_attempts: payload.max_attempts,
        status: lifecycle::derive_status(now, payload.start_time, payload.end_time),
    };

    let quiz = repositories::quizzes::create(
        state.db(),
        &Uuid::new_v4().to_string(),
        &teacher.id,
        fields,
        now,
    )
    .await
    .map_err(|e| ApiError::from_db(e, "Failed to create quiz"))?;

    tracing::info!(
        teacher_id = %teacher.id,
        quiz_id = %quiz.id,
        module_id = %quiz.module_id,
        question_count = quiz.question_count,
        "Quiz scheduled"
    );
    Ok(ApiResponse::created("Quiz created", QuizResponse::from_db(quiz)))
}

async fn get_quiz(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(quiz_id): Path<String>,
) -> Result<ApiResponse<QuizView>, ApiError> {
    let quiz = fetch_quiz(&state, &quiz_id).await?;

    let view = match viewer(user)? {
        Viewer::Teacher(teacher) => {
            if quiz.created_by != teacher.id {
                return Err(quiz_not_found());
            }
            QuizView::Owner(QuizResponse::from_db(with_current_status(&state, quiz).await))
        }
        Viewer::Student(profile) => {
            if !lifecycle::is_student_eligible(&quiz.eligibility, &profile) {
                return Err(AccessDenied::NotEligible.into());
            }
            QuizView::Student(QuizSummary::from_db(with_current_status(&state, quiz).await))
        }
    };

    Ok(ApiResponse::ok("Quiz retrieved", view))
}

async fn update_quiz(
    State(state): State<AppState>,
    CurrentTeacher(teacher): CurrentTeacher,
    Path(quiz_id): Path<String>,
    ValidatedJson(payload): ValidatedJson<QuizUpdate>,
) -> Result<ApiResponse<QuizResponse>, ApiError> {
    let quiz = fetch_owned_quiz(&state, &quiz_id, &teacher.id).await?;
    let now = state.now();
    lifecycle::ensure_editable(&quiz, now)?;

    let mut fields = QuizFields::from_quiz(&quiz);

    if let Some(module_id) = payload.module_id.filter(|id| *id != quiz.module_id) {
        let (module, question_count) = quiz_module(&state, &module_id, &teacher.id).await?;
        fields.module_id = module.id;
        fields.module_code = module.code;
        fields.question_count = question_count;
    }

    if payload.start_time.is_some() || payload.end_time.is_some() {
        fields.start_time = payload.start_time.unwrap_or(quiz.start_time);
        fields.end_time = payload.end_time.unwrap_or(quiz.end_time);
        lifecycle::validate_new_window(now, fields.start_time, fields.end_time)?;
    }

    if let Some(title) = payload.title {
        fields.title = title.trim().to_string();
    }
    if let Some(duration_minutes) = payload.duration_minutes {
        fields.duration_minutes = duration_minutes;
    }
    if let Some(instructions) = payload.instructions {
        fields.instructions = instructions;
    }
    if let Some(passcode) = payload.passcode {
        fields.passcode = passcode;
    }
    if let Some(eligibility) = payload.eligibility {
        fields.eligibility = eligibility.into_iter().map(|entry| entry.into_entry()).collect();
    }
    if let Some(shuffle_questions) = payload.shuffle_questions {
        fields.shuffle_questions = shuffle_questions;
    }
    if let Some(show_results_immediately) = payload.show_results_immediately {
        fields.show_results_immediately = show_results_immediately;
    }
    if let Some(allow_late_submission) = payload.allow_late_submission {
        fields.allow_late_submission = allow_late_submission;
    }
    if let Some(max_attempts) = payload.max_attempts {
        fields.max_attempts = max_attempts;
    }

    fields.status = lifecycle::refresh_status(quiz.status, now, fields.start_time, fields.end_time);

    let updated = repositories::quizzes::update(state.db(), &quiz.id, fields, now)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to update quiz"))?
        .ok_or(LifecycleError::Cancelled)?;

    Ok(ApiResponse::ok("Quiz updated", QuizResponse::from_db(updated)))
}

async fn delete_quiz(
    State(state): State<AppState>,
    CurrentTeacher(teacher): CurrentTeacher,
    Path(quiz_id): Path<String>,
) -> Result<ApiResponse<()>, ApiError> {
    let quiz = fetch_owned_quiz(&state, &quiz_id, &teacher.id).await?;
    let now = state.now();
    if lifecycle::has_started(now, quiz.start_time) {
        return Err(LifecycleError::AlreadyStarted.into());
    }

    repositories::quizzes::soft_delete(state.db(), &quiz.id, now)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to delete quiz"))?;

    tracing::info!(teacher_id = %teacher.id, quiz_id = %quiz.id, "Quiz deleted");
    Ok(ApiResponse::ok("Quiz deleted", ()))
}

async fn cancel_quiz(
    State(state): State<AppState>,
    CurrentTeacher(teacher): CurrentTeacher,
    Path(quiz_id): Path<String>,
) -> Result<ApiResponse<QuizResponse>, ApiError> {
    let quiz = fetch_owned_quiz(&state, &quiz_id, &teacher.id).await?;
    let now = state.now();
    lifecycle::ensure_cancellable(&quiz, now)?;

    let cancelled = repositories::quizzes::cancel(state.db(), &quiz.id, now)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to cancel quiz"))?;

    tracing::info!(teacher_id = %teacher.id, quiz_id = %quiz.id, "Quiz cancelled");
    Ok(ApiResponse::ok("Quiz cancelled", QuizResponse::from_db(cancelled)))
}

async fn verify_passcode(
    State(state): State<AppState>,
    CurrentStudent(student, profile): CurrentStudent,
    Path(quiz_id): Path<String>,
    ValidatedJson(payload): ValidatedJson<PasscodeRequest>,
) -> Result<ApiResponse<QuizSummary>, ApiError> {
    let quiz = with_current_status(&state, fetch_quiz(&state, &quiz_id).await?).await;

    if let Err(denied) = lifecycle::check_access(&quiz, &profile, &payload.passcode, state.now()) {
        tracing::info!(
            student_id = %student.id,
            quiz_id = %quiz.id,
            reason = %denied,
            "Quiz access denied"
        );
        return Err(denied.into());
    }

    Ok(ApiResponse::ok("Passcode verified", QuizSummary::from_db(quiz)))
}

async fn quiz_questions(
    State(state): State<AppState>,
    CurrentStudent(student, profile): CurrentStudent,
    Path(quiz_id): Path<String>,
    headers: HeaderMap,
) -> Result<ApiResponse<QuizQuestionsResponse>, ApiError> {
    let quiz = with_current_status(&state, fetch_quiz(&state, &quiz_id).await?).await;
    let passcode = headers
        .get(PASSCODE_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    lifecycle::check_access(&quiz, &profile, passcode, state.now())?;

    let submitted = repositories::results::exists_for(state.db(), &student.id, &quiz.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to check previous submissions"))?;
    if submitted {
        return Err(ApiError::Conflict("You have already submitted this quiz".to_string()));
    }

    let mut questions = repositories::questions::list_active_for_module(state.db(), &quiz.module_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load questions"))?;
    if quiz.shuffle_questions {
        lifecycle::shuffle(&mut questions);
    }

    Ok(ApiResponse::ok(
        "Quiz questions retrieved",
        QuizQuestionsResponse {
            quiz: QuizSummary::from_db(quiz),
            questions: questions.into_iter().map(StudentQuestionView::from_db).collect(),
        },
    ))
}

async fn submit_quiz(
    State(state): State<AppState>,
    CurrentStudent(student, profile): CurrentStudent,
    Path(quiz_id): Path<String>,
    ValidatedJson(payload): ValidatedJson<SubmitRequest>,
) -> Result<ApiResponse<StudentResultView>, ApiError> {
    let quiz = fetch_quiz(&state, &quiz_id).await?;
    let now = state.now();

    if !lifecycle::is_student_eligible(&quiz.eligibility, &profile) {
        return Err(AccessDenied::NotEligible.into());
    }
    lifecycle::ensure_submission_open(&quiz, now)?;

    let questions = repositories::questions::list_active_for_module(state.db(), &quiz.module_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load questions"))?;
    let answers: Vec<SubmittedAnswer> = payload
        .answers
        .into_iter()
        .map(|answer| SubmittedAnswer { question_id: answer.question_id, answer: answer.answer })
        .collect();
    let graded = grading::grade_submission(&questions, &answers)?;

    let result = repositories::results::create(
        state.db(),
        repositories::results::CreateResult {
            id: &Uuid::new_v4().to_string(),
            quiz_id: &quiz.id,
            student_id: &student.id,
            teacher_id: &quiz.created_by,
            answers: graded.answers,
            score: graded.score,
            total_marks: graded.total_marks,
            percentage: graded.percentage,
            grade: graded.grade.as_str(),
            time_taken_seconds: payload.time_taken_seconds,
            started_at: payload.started_at,
            submitted_at: payload.submitted_at.filter(|at| *at <= now).unwrap_or(now),
            created_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::from_db(e, "Failed to save result"))?;

    metrics::record_submission(graded.grade.as_str());
    tracing::info!(
        student_id = %student.id,
        quiz_id = %quiz.id,
        percentage = result.percentage,
        grade = %result.grade,
        "Quiz submitted"
    );

    let view = student_view(result, lifecycle::results_released(&quiz, now));
    Ok(ApiResponse::created("Quiz submitted", view))
}

async fn quiz_results(
    State(state): State<AppState>,
    CurrentTeacher(teacher): CurrentTeacher,
    Path(quiz_id): Path<String>,
) -> Result<ApiResponse<QuizResultsResponse>, ApiError> {
    let quiz = fetch_owned_quiz(&state, &quiz_id, &teacher.id).await?;

    let results = repositories::results::list_for_quiz(state.db(), &quiz.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load results"))?;
    let summary = repositories::results::summary_for_quiz(state.db(), &quiz.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to summarize results"))?;

    let student_ids: Vec<String> = results.iter().map(|result| result.student_id.clone()).collect();
    let names: HashMap<String, (String, Option<String>)> =
        repositories::users::find_names_by_ids(state.db(), &student_ids)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to load students"))?
            .into_iter()
            .map(|(id, name, student_number)| (id, (name, student_number)))
            .collect();

    let rows = results
        .into_iter()
        .map(|result| {
            let (student_name, student_number) = match names.get(&result.student_id) {
                Some((name, number)) => (Some(name.clone()), number.clone()),
                None => (None, None),
            };
            StudentResultRow {
                student_id: result.student_id.clone(),
                student_name,
                student_number,
                result: ResultResponse::from_db(result),
            }
        })
        .collect();

    Ok(ApiResponse::ok(
        "Quiz results retrieved",
        QuizResultsResponse {
            quiz_id: quiz.id,
            title: quiz.title,
            summary: ResultSummary {
                submissions: summary.submissions,
                average_percentage: grading::round2(summary.average_percentage.unwrap_or(0.0)),
                highest_percentage: grading::round2(summary.highest_percentage.unwrap_or(0.0)),
                lowest_percentage: grading::round2(summary.lowest_percentage.unwrap_or(0.0)),
            },
            results: rows,
        },
    ))
}

/// Quiz with its status re-derived from the clock; drift is written back best-effort.
pub(crate) async fn with_current_status(state: &AppState, mut quiz: Quiz) -> Quiz {
    let now = state.now();
    let status = lifecycle::refresh_status(quiz.status, now, quiz.start_time, quiz.end_time);
    if status != quiz.status {
        if let Err(err) =
            repositories::quizzes::set_status_unless_cancelled(state.db(), &quiz.id, status, now)
                .await
        {
            tracing::warn!(error = %err, quiz_id = %quiz.id, "Failed to persist derived quiz status");
        }
        quiz.status = status;
    }
    quiz
}

async fn quiz_module(
    state: &AppState,
    module_id: &str,
    owner_id: &str,
) -> Result<(Module, i32), ApiError> {
    let module = fetch_owned_module(state, module_id, owner_id).await?;
    let question_count = repositories::questions::count_active_for_module(state.db(), &module.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count module questions"))?;
    if question_count == 0 {
        return Err(ApiError::BadRequest("Module has no active questions".to_string()));
    }
    let question_count = i32::try_from(question_count)
        .map_err(|e| ApiError::internal(e, "Question count out of range"))?;
    Ok((module, question_count))
}

fn quiz_not_found() -> ApiError {
    ApiError::NotFound("Quiz not found".to_string())
}

async fn fetch_quiz(state: &AppState, quiz_id: &str) -> Result<Quiz, ApiError> {
    repositories::quizzes::find_by_id(state.db(), quiz_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load quiz"))?
        .ok_or_else(quiz_not_found)
}

async fn fetch_owned_quiz(
    state: &AppState,
    quiz_id: &str,
    owner_id: &str,
) -> Result<Quiz, ApiError> {
    let quiz = fetch_quiz(state, quiz_id).await?;
    if quiz.created_by != owner_id {
        return Err(quiz_not_found());
    }
    Ok(quiz)
}

#[cfg(test)]
mod tests;
