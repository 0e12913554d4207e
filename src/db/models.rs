use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use time::PrimitiveDateTime;

use crate::db::types::{AccountStatus, QuestionType, QuizStatus, UserRole};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct User {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) email: String,
    pub(crate) hashed_password: String,
    pub(crate) role: UserRole,
    pub(crate) status: AccountStatus,
    pub(crate) failed_login_attempts: i32,
    pub(crate) locked_until: Option<PrimitiveDateTime>,
    pub(crate) last_login_at: Option<PrimitiveDateTime>,
    pub(crate) password_change_otp_hash: Option<String>,
    pub(crate) password_change_otp_expires_at: Option<PrimitiveDateTime>,
    pub(crate) password_change_otp_attempts: i32,
    pub(crate) forgot_password_otp_hash: Option<String>,
    pub(crate) forgot_password_otp_expires_at: Option<PrimitiveDateTime>,
    pub(crate) forgot_password_otp_attempts: i32,
    pub(crate) student_id: Option<String>,
    pub(crate) enrollment_year: Option<i32>,
    pub(crate) program: Option<String>,
    pub(crate) academic_year: Option<i32>,
    pub(crate) semester: Option<i32>,
    pub(crate) employee_id: Option<String>,
    pub(crate) department: Option<String>,
    pub(crate) subjects: Json<Vec<String>>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Module {
    pub(crate) id: String,
    pub(crate) code: String,
    pub(crate) name: String,
    pub(crate) academic_year: i32,
    pub(crate) semester: i32,
    pub(crate) credits: i32,
    pub(crate) is_active: bool,
    pub(crate) created_by: String,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct McqOption {
    pub(crate) text: String,
    pub(crate) is_correct: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Question {
    pub(crate) id: String,
    pub(crate) module_id: String,
    pub(crate) module_code: String,
    pub(crate) academic_year: i32,
    pub(crate) semester: i32,
    pub(crate) question_type: QuestionType,
    pub(crate) text: String,
    pub(crate) options: Json<Vec<McqOption>>,
    pub(crate) reference_answer: Option<String>,
    pub(crate) marks: f64,
    pub(crate) is_active: bool,
    pub(crate) created_by: String,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

/// One (program, year, semester) triple a quiz is open to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct EligibilityEntry {
    pub(crate) program: String,
    pub(crate) academic_year: i32,
    pub(crate) semester: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Quiz {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) module_id: String,
    pub(crate) module_code: String,
    pub(crate) question_count: i32,
    pub(crate) start_time: PrimitiveDateTime,
    pub(crate) end_time: PrimitiveDateTime,
    pub(crate) duration_minutes: i32,
    pub(crate) instructions: String,
    pub(crate) passcode: String,
    pub(crate) eligibility: Json<Vec<EligibilityEntry>>,
    pub(crate) shuffle_questions: bool,
    pub(crate) show_results_immediately: bool,
    pub(crate) allow_late_submission: bool,
    pub(crate) max_attempts: i32,
    pub(crate) status: QuizStatus,
    pub(crate) is_active: bool,
    pub(crate) created_by: String,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

/// Snapshot of one graded answer inside a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct AnswerRecord {
    pub(crate) question_id: String,
    pub(crate) question_type: QuestionType,
    pub(crate) student_answer: String,
    pub(crate) is_correct: bool,
    pub(crate) marks_awarded: f64,
    pub(crate) max_marks: f64,
    pub(crate) needs_review: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct QuizResult {
    pub(crate) id: String,
    pub(crate) quiz_id: String,
    pub(crate) student_id: String,
    pub(crate) teacher_id: String,
    pub(crate) answers: Json<Vec<AnswerRecord>>,
    pub(crate) score: f64,
    pub(crate) total_marks: f64,
    pub(crate) percentage: f64,
    pub(crate) grade: String,
    pub(crate) time_taken_seconds: i32,
    pub(crate) started_at: Option<PrimitiveDateTime>,
    pub(crate) submitted_at: PrimitiveDateTime,
    pub(crate) created_at: PrimitiveDateTime,
}
