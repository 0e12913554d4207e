use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::User;
use crate::db::types::{AccountStatus, UserRole};
use crate::services::accounts::ProfileFields;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct AdminUserCreate {
    #[validate(length(min = 2, max = 100, message = "name must be 2-100 characters"))]
    pub(crate) name: String,
    #[validate(email(message = "email must be a valid address"))]
    pub(crate) email: String,
    /// Generated and delivered through the notifier when omitted.
    #[serde(default)]
    #[validate(length(min = 8, max = 128, message = "password must be 8-128 characters"))]
    pub(crate) password: Option<String>,
    pub(crate) role: UserRole,
    #[serde(default = "default_status")]
    pub(crate) status: AccountStatus,
    #[serde(flatten)]
    pub(crate) profile: ProfileFields,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct AdminUserUpdate {
    #[serde(default)]
    #[validate(length(min = 2, max = 100, message = "name must be 2-100 characters"))]
    pub(crate) name: Option<String>,
    #[serde(default)]
    #[validate(email(message = "email must be a valid address"))]
    pub(crate) email: Option<String>,
    #[serde(default)]
    #[validate(length(min = 8, max = 128, message = "password must be 8-128 characters"))]
    pub(crate) password: Option<String>,
    #[serde(default)]
    pub(crate) role: Option<UserRole>,
    #[serde(default)]
    pub(crate) status: Option<AccountStatus>,
    #[serde(flatten)]
    pub(crate) profile: ProfileFields,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserListQuery {
    #[serde(default)]
    pub(crate) search: Option<String>,
    #[serde(default)]
    pub(crate) role: Option<UserRole>,
    #[serde(default)]
    pub(crate) status: Option<AccountStatus>,
    #[serde(default)]
    pub(crate) skip: i64,
    #[serde(default = "crate::api::pagination::default_limit")]
    pub(crate) limit: i64,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct DeleteUserQuery {
    #[serde(default)]
    pub(crate) permanent: bool,
}

/// Public view of an account; never carries the password digest or code slots.
#[derive(Debug, Serialize)]
pub(crate) struct UserResponse {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) email: String,
    pub(crate) role: UserRole,
    pub(crate) status: AccountStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) student_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) enrollment_year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) program: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) academic_year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) semester: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) employee_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) department: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub(crate) subjects: Vec<String>,
    pub(crate) last_login_at: Option<String>,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
}

impl UserResponse {
    pub(crate) fn from_db(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
            status: user.status,
            student_id: user.student_id,
            enrollment_year: user.enrollment_year,
            program: user.program,
            academic_year: user.academic_year,
            semester: user.semester,
            employee_id: user.employee_id,
            department: user.department,
            subjects: user.subjects.0,
            last_login_at: user.last_login_at.map(format_primitive),
            created_at: format_primitive(user.created_at),
            updated_at: format_primitive(user.updated_at),
        }
    }
}

fn default_status() -> AccountStatus {
    AccountStatus::Active
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_create_accepts_flattened_profile() {
        let payload: AdminUserCreate = serde_json::from_value(serde_json::json!({
            "name": "Ada Lovelace",
            "email": "ada@example.edu",
            "role": "student",
            "studentId": "IT21000001",
            "enrollment_year": 2021,
            "program": "BSc Software Engineering",
            "academic_year": 3,
            "semester": 1
        }))
        .expect("payload");

        assert!(payload.validate().is_ok());
        assert_eq!(payload.status, AccountStatus::Active);
        assert!(payload.password.is_none());
        assert_eq!(payload.profile.student_id.as_deref(), Some("IT21000001"));
    }

    #[test]
    fn admin_create_rejects_bad_email() {
        let payload: AdminUserCreate = serde_json::from_value(serde_json::json!({
            "name": "Ada",
            "email": "not-an-email",
            "role": "admin"
        }))
        .expect("payload");

        let errors = payload.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("email"));
    }
}
