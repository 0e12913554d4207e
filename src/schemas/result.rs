use serde::{Deserialize, Serialize};
use time::PrimitiveDateTime;
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::{AnswerRecord, QuizResult};
use crate::schemas::datetime;

#[derive(Debug, Clone, Deserialize, Validate)]
pub(crate) struct AnswerInput {
    #[serde(alias = "questionId")]
    #[validate(length(min = 1, message = "question_id is required"))]
    pub(crate) question_id: String,
    #[serde(default)]
    #[validate(length(max = 20000, message = "answer is too long"))]
    pub(crate) answer: String,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct SubmitRequest {
    #[serde(default)]
    #[validate(nested)]
    pub(crate) answers: Vec<AnswerInput>,
    #[serde(default, alias = "startedAt", deserialize_with = "datetime::deserialize_option")]
    pub(crate) started_at: Option<PrimitiveDateTime>,
    #[serde(default, alias = "submittedAt", deserialize_with = "datetime::deserialize_option")]
    pub(crate) submitted_at: Option<PrimitiveDateTime>,
    #[serde(default, alias = "timeTaken", alias = "timeTakenSeconds")]
    #[validate(range(min = 0, message = "time_taken_seconds must not be negative"))]
    pub(crate) time_taken_seconds: i32,
}

#[derive(Debug, Serialize)]
pub(crate) struct ResultResponse {
    pub(crate) id: String,
    pub(crate) quiz_id: String,
    pub(crate) student_id: String,
    pub(crate) answers: Vec<AnswerRecord>,
    pub(crate) score: f64,
    pub(crate) total_marks: f64,
    pub(crate) percentage: f64,
    pub(crate) grade: String,
    pub(crate) needs_review: bool,
    pub(crate) time_taken_seconds: i32,
    pub(crate) started_at: Option<String>,
    pub(crate) submitted_at: String,
}

impl ResultResponse {
    pub(crate) fn from_db(result: QuizResult) -> Self {
        let needs_review = result.answers.iter().any(|answer| answer.needs_review);
        Self {
            id: result.id,
            quiz_id: result.quiz_id,
            student_id: result.student_id,
            answers: result.answers.0,
            score: result.score,
            total_marks: result.total_marks,
            percentage: result.percentage,
            grade: result.grade,
            needs_review,
            time_taken_seconds: result.time_taken_seconds,
            started_at: result.started_at.map(format_primitive),
            submitted_at: format_primitive(result.submitted_at),
        }
    }
}

/// Returned to students while scores are withheld.
#[derive(Debug, Serialize)]
pub(crate) struct SubmissionReceipt {
    pub(crate) id: String,
    pub(crate) quiz_id: String,
    pub(crate) submitted_at: String,
    pub(crate) results_available: bool,
}

impl SubmissionReceipt {
    pub(crate) fn from_db(result: &QuizResult) -> Self {
        Self {
            id: result.id.clone(),
            quiz_id: result.quiz_id.clone(),
            submitted_at: format_primitive(result.submitted_at),
            results_available: false,
        }
    }
}

/// Either the full result or a receipt, depending on the quiz's release rule.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub(crate) enum StudentResultView {
    Released(ResultResponse),
    Withheld(SubmissionReceipt),
}

#[derive(Debug, Serialize)]
pub(crate) struct StudentResultRow {
    pub(crate) student_id: String,
    pub(crate) student_name: Option<String>,
    pub(crate) student_number: Option<String>,
    #[serde(flatten)]
    pub(crate) result: ResultResponse,
}

#[derive(Debug, Serialize)]
pub(crate) struct ResultSummary {
    pub(crate) submissions: i64,
    pub(crate) average_percentage: f64,
    pub(crate) highest_percentage: f64,
    pub(crate) lowest_percentage: f64,
}

#[derive(Debug, Serialize)]
pub(crate) struct QuizResultsResponse {
    pub(crate) quiz_id: String,
    pub(crate) title: String,
    pub(crate) summary: ResultSummary,
    pub(crate) results: Vec<StudentResultRow>,
}
