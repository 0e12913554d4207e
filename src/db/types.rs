use serde::{Deserialize, Serialize};
use sqlx::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "userrole", rename_all = "lowercase")]
pub(crate) enum UserRole {
    Admin,
    Teacher,
    Student,
}

impl UserRole {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Teacher => "teacher",
            UserRole::Student => "student",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "accountstatus", rename_all = "lowercase")]
pub(crate) enum AccountStatus {
    Active,
    Inactive,
    Suspended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "questiontype")]
pub(crate) enum QuestionType {
    #[serde(rename = "MCQ")]
    #[sqlx(rename = "MCQ")]
    Mcq,
    Structured,
    Essay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "quizstatus", rename_all = "lowercase")]
pub(crate) enum QuizStatus {
    Scheduled,
    Active,
    Completed,
    Cancelled,
}

impl QuizStatus {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            QuizStatus::Scheduled => "scheduled",
            QuizStatus::Active => "active",
            QuizStatus::Completed => "completed",
            QuizStatus::Cancelled => "cancelled",
        }
    }
}
