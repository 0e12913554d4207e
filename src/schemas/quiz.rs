use serde::{Deserialize, Serialize};
use time::PrimitiveDateTime;
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::{EligibilityEntry, Quiz};
use crate::db::types::QuizStatus;
use crate::schemas::datetime;
use crate::schemas::question::StudentQuestionView;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub(crate) struct EligibilityInput {
    #[serde(alias = "course", alias = "degree")]
    #[validate(length(min = 1, max = 200, message = "program is required"))]
    pub(crate) program: String,
    #[serde(alias = "academicYear", alias = "year")]
    #[validate(range(min = 1, max = 4, message = "academic_year must be between 1 and 4"))]
    pub(crate) academic_year: i32,
    #[validate(range(min = 1, max = 2, message = "semester must be 1 or 2"))]
    pub(crate) semester: i32,
}

impl EligibilityInput {
    pub(crate) fn into_entry(self) -> EligibilityEntry {
        EligibilityEntry {
            program: self.program.trim().to_string(),
            academic_year: self.academic_year,
            semester: self.semester,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct QuizCreate {
    #[validate(length(min = 3, max = 200, message = "title must be 3-200 characters"))]
    pub(crate) title: String,
    #[serde(alias = "moduleId")]
    #[validate(length(min = 1, message = "module_id is required"))]
    pub(crate) module_id: String,
    #[serde(alias = "startTime", deserialize_with = "datetime::deserialize")]
    pub(crate) start_time: PrimitiveDateTime,
    #[serde(alias = "endTime", deserialize_with = "datetime::deserialize")]
    pub(crate) end_time: PrimitiveDateTime,
    #[serde(alias = "durationMinutes", alias = "duration")]
    #[validate(range(min = 1, max = 1440, message = "duration_minutes must be 1-1440"))]
    pub(crate) duration_minutes: i32,
    #[serde(default)]
    #[validate(length(max = 5000, message = "instructions must be at most 5000 characters"))]
    pub(crate) instructions: String,
    #[validate(length(min = 4, max = 50, message = "passcode must be 4-50 characters"))]
    pub(crate) passcode: String,
    #[validate(length(min = 1, message = "at least one eligibility entry is required"), nested)]
    pub(crate) eligibility: Vec<EligibilityInput>,
    #[serde(default, alias = "shuffleQuestions")]
    pub(crate) shuffle_questions: bool,
    #[serde(default = "default_true", alias = "showResultsImmediately")]
    pub(crate) show_results_immediately: bool,
    #[serde(default, alias = "allowLateSubmission")]
    pub(crate) allow_late_submission: bool,
    #[serde(default = "default_max_attempts", alias = "maxAttempts")]
    #[validate(range(min = 1, max = 10, message = "max_attempts must be 1-10"))]
    pub(crate) max_attempts: i32,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub(crate) struct QuizUpdate {
    #[serde(default)]
    #[validate(length(min = 3, max = 200, message = "title must be 3-200 characters"))]
    pub(crate) title: Option<String>,
    #[serde(default, alias = "moduleId")]
    pub(crate) module_id: Option<String>,
    #[serde(default, alias = "startTime", deserialize_with = "datetime::deserialize_option")]
    pub(crate) start_time: Option<PrimitiveDateTime>,
    #[serde(default, alias = "endTime", deserialize_with = "datetime::deserialize_option")]
    pub(crate) end_time: Option<PrimitiveDateTime>,
    #[serde(default, alias = "durationMinutes", alias = "duration")]
    #[validate(range(min = 1, max = 1440, message = "duration_minutes must be 1-1440"))]
    pub(crate) duration_minutes: Option<i32>,
    #[serde(default)]
    #[validate(length(max = 5000, message = "instructions must be at most 5000 characters"))]
    pub(crate) instructions: Option<String>,
    #[serde(default)]
    #[validate(length(min = 4, max = 50, message = "passcode must be 4-50 characters"))]
    pub(crate) passcode: Option<String>,
    #[serde(default)]
    #[validate(length(min = 1, message = "at least one eligibility entry is required"), nested)]
    pub(crate) eligibility: Option<Vec<EligibilityInput>>,
    #[serde(default, alias = "shuffleQuestions")]
    pub(crate) shuffle_questions: Option<bool>,
    #[serde(default, alias = "showResultsImmediately")]
    pub(crate) show_results_immediately: Option<bool>,
    #[serde(default, alias = "allowLateSubmission")]
    pub(crate) allow_late_submission: Option<bool>,
    #[serde(default, alias = "maxAttempts")]
    #[validate(range(min = 1, max = 10, message = "max_attempts must be 1-10"))]
    pub(crate) max_attempts: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct QuizListQuery {
    #[serde(default)]
    pub(crate) status: Option<QuizStatus>,
    #[serde(default, alias = "moduleId")]
    pub(crate) module_id: Option<String>,
    #[serde(default)]
    pub(crate) search: Option<String>,
    #[serde(default)]
    pub(crate) skip: i64,
    #[serde(default = "crate::api::pagination::default_limit")]
    pub(crate) limit: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct PasscodeRequest {
    #[validate(length(min = 1, message = "passcode is required"))]
    pub(crate) passcode: String,
}

/// Owner view of a quiz, passcode included.
#[derive(Debug, Serialize)]
pub(crate) struct QuizResponse {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) module_id: String,
    pub(crate) module_code: String,
    pub(crate) question_count: i32,
    pub(crate) start_time: String,
    pub(crate) end_time: String,
    pub(crate) duration_minutes: i32,
    pub(crate) instructions: String,
    pub(crate) passcode: String,
    pub(crate) eligibility: Vec<EligibilityEntry>,
    pub(crate) shuffle_questions: bool,
    pub(crate) show_results_immediately: bool,
    pub(crate) allow_late_submission: bool,
    pub(crate) max_attempts: i32,
    pub(crate) status: QuizStatus,
    pub(crate) created_by: String,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
}

impl QuizResponse {
    pub(crate) fn from_db(quiz: Quiz) -> Self {
        Self {
            id: quiz.id,
            title: quiz.title,
            module_id: quiz.module_id,
            module_code: quiz.module_code,
            question_count: quiz.question_count,
            start_time: format_primitive(quiz.start_time),
            end_time: format_primitive(quiz.end_time),
            duration_minutes: quiz.duration_minutes,
            instructions: quiz.instructions,
            passcode: quiz.passcode,
            eligibility: quiz.eligibility.0,
            shuffle_questions: quiz.shuffle_questions,
            show_results_immediately: quiz.show_results_immediately,
            allow_late_submission: quiz.allow_late_submission,
            max_attempts: quiz.max_attempts,
            status: quiz.status,
            created_by: quiz.created_by,
            created_at: format_primitive(quiz.created_at),
            updated_at: format_primitive(quiz.updated_at),
        }
    }
}

/// Student view of a quiz: schedule and rules, never the passcode.
#[derive(Debug, Serialize)]
pub(crate) struct QuizSummary {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) module_code: String,
    pub(crate) question_count: i32,
    pub(crate) start_time: String,
    pub(crate) end_time: String,
    pub(crate) duration_minutes: i32,
    pub(crate) instructions: String,
    pub(crate) show_results_immediately: bool,
    pub(crate) allow_late_submission: bool,
    pub(crate) status: QuizStatus,
}

impl QuizSummary {
    pub(crate) fn from_db(quiz: Quiz) -> Self {
        Self {
            id: quiz.id,
            title: quiz.title,
            module_code: quiz.module_code,
            question_count: quiz.question_count,
            start_time: format_primitive(quiz.start_time),
            end_time: format_primitive(quiz.end_time),
            duration_minutes: quiz.duration_minutes,
            instructions: quiz.instructions,
            show_results_immediately: quiz.show_results_immediately,
            allow_late_submission: quiz.allow_late_submission,
            status: quiz.status,
        }
    }
}

/// Owner or student rendering of the same quiz.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub(crate) enum QuizView {
    Owner(QuizResponse),
    Student(QuizSummary),
}

#[derive(Debug, Serialize)]
pub(crate) struct QuizQuestionsResponse {
    pub(crate) quiz: QuizSummary,
    pub(crate) questions: Vec<StudentQuestionView>,
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> i32 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn create_payload() -> serde_json::Value {
        serde_json::json!({
            "title": "Midterm",
            "moduleId": "module-1",
            "startTime": "2025-03-01T09:10:00Z",
            "endTime": "2025-03-01T10:10",
            "durationMinutes": 60,
            "passcode": "open-sesame",
            "eligibility": [
                {"program": "BSc Software Engineering", "academic_year": 3, "semester": 1}
            ]
        })
    }

    #[test]
    fn create_applies_defaults_and_parses_times() {
        let payload: QuizCreate = serde_json::from_value(create_payload()).expect("payload");
        assert!(payload.validate().is_ok());
        assert_eq!(payload.start_time, datetime!(2025-03-01 09:10));
        assert_eq!(payload.end_time, datetime!(2025-03-01 10:10));
        assert!(payload.show_results_immediately);
        assert!(!payload.allow_late_submission);
        assert_eq!(payload.max_attempts, 1);
    }

    #[test]
    fn create_requires_eligibility() {
        let mut raw = create_payload();
        raw["eligibility"] = serde_json::json!([]);
        let payload: QuizCreate = serde_json::from_value(raw).expect("payload");
        let errors = payload.validate().unwrap_err();
        assert!(errors.errors().contains_key("eligibility"));
    }

    #[test]
    fn nested_eligibility_is_validated() {
        let mut raw = create_payload();
        raw["eligibility"] =
            serde_json::json!([{"program": "BSc", "academic_year": 7, "semester": 1}]);
        let payload: QuizCreate = serde_json::from_value(raw).expect("payload");
        assert!(payload.validate().is_err());
    }

    #[test]
    fn update_rejects_empty_eligibility_but_allows_omitting_it() {
        let payload: QuizUpdate =
            serde_json::from_value(serde_json::json!({ "eligibility": [] })).expect("payload");
        let errors = payload.validate().unwrap_err();
        assert!(errors.errors().contains_key("eligibility"));

        let payload: QuizUpdate =
            serde_json::from_value(serde_json::json!({ "title": "Renamed" })).expect("payload");
        assert!(payload.validate().is_ok());
    }

    #[test]
    fn summary_omits_passcode() {
        let payload: QuizCreate = serde_json::from_value(create_payload()).expect("payload");
        let quiz = Quiz {
            id: "quiz-1".to_string(),
            title: payload.title,
            module_id: payload.module_id,
            module_code: "SE3010".to_string(),
            question_count: 3,
            start_time: payload.start_time,
            end_time: payload.end_time,
            duration_minutes: payload.duration_minutes,
            instructions: payload.instructions,
            passcode: payload.passcode,
            eligibility: sqlx::types::Json(Vec::new()),
            shuffle_questions: false,
            show_results_immediately: true,
            allow_late_submission: false,
            max_attempts: 1,
            status: QuizStatus::Scheduled,
            is_active: true,
            created_by: "teacher-1".to_string(),
            created_at: payload.start_time,
            updated_at: payload.start_time,
        };
        let value = serde_json::to_value(QuizSummary::from_db(quiz)).unwrap();
        assert!(value.get("passcode").is_none());
        assert_eq!(value["status"], "scheduled");
    }
}
