//! Role-specific account attributes.
//!
//! Rows in `users` are flat; handlers work with [`AccountProfile`], which only
//! exists when the attributes required by the role are present and valid.

use serde::Deserialize;
use thiserror::Error;

use crate::db::models::User;
use crate::db::types::UserRole;

const MIN_ENROLLMENT_YEAR: i32 = 1990;
const MAX_ENROLLMENT_YEAR: i32 = 2100;

#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum ProfileError {
    #[error("{0} is required for this role")]
    Missing(&'static str),
    #[error("{field} is invalid: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ProfileError {
    pub(crate) fn field(&self) -> &'static str {
        match self {
            ProfileError::Missing(field) => field,
            ProfileError::Invalid { field, .. } => field,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StudentProfile {
    pub(crate) student_id: String,
    pub(crate) enrollment_year: i32,
    pub(crate) program: String,
    pub(crate) academic_year: i32,
    pub(crate) semester: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TeacherProfile {
    pub(crate) employee_id: String,
    pub(crate) department: String,
    pub(crate) subjects: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum AccountProfile {
    Student(StudentProfile),
    Teacher(TeacherProfile),
    Admin,
}

/// Raw, possibly incomplete role attributes as they arrive from a request or row.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ProfileFields {
    #[serde(default, alias = "studentId")]
    pub(crate) student_id: Option<String>,
    #[serde(default, alias = "enrollmentYear")]
    pub(crate) enrollment_year: Option<i32>,
    #[serde(default, alias = "course")]
    pub(crate) program: Option<String>,
    #[serde(default, alias = "academicYear", alias = "year")]
    pub(crate) academic_year: Option<i32>,
    #[serde(default)]
    pub(crate) semester: Option<i32>,
    #[serde(default, alias = "employeeId")]
    pub(crate) employee_id: Option<String>,
    #[serde(default)]
    pub(crate) department: Option<String>,
    #[serde(default)]
    pub(crate) subjects: Option<Vec<String>>,
}

impl ProfileFields {
    pub(crate) fn from_row(user: &User) -> Self {
        Self {
            student_id: user.student_id.clone(),
            enrollment_year: user.enrollment_year,
            program: user.program.clone(),
            academic_year: user.academic_year,
            semester: user.semester,
            employee_id: user.employee_id.clone(),
            department: user.department.clone(),
            subjects: Some(user.subjects.0.clone()),
        }
    }

    /// Overlay `patch` on top of `self`; fields absent from the patch are kept.
    pub(crate) fn merged_with(self, patch: ProfileFields) -> Self {
        Self {
            student_id: patch.student_id.or(self.student_id),
            enrollment_year: patch.enrollment_year.or(self.enrollment_year),
            program: patch.program.or(self.program),
            academic_year: patch.academic_year.or(self.academic_year),
            semester: patch.semester.or(self.semester),
            employee_id: patch.employee_id.or(self.employee_id),
            department: patch.department.or(self.department),
            subjects: patch.subjects.or(self.subjects),
        }
    }
}

impl StudentProfile {
    pub(crate) fn new(
        student_id: &str,
        enrollment_year: i32,
        program: &str,
        academic_year: i32,
        semester: i32,
    ) -> Result<Self, ProfileError> {
        let student_id = non_empty("student_id", student_id)?;
        let program = non_empty("program", program)?;

        if !(MIN_ENROLLMENT_YEAR..=MAX_ENROLLMENT_YEAR).contains(&enrollment_year) {
            return Err(ProfileError::Invalid {
                field: "enrollment_year",
                reason: format!("must be between {MIN_ENROLLMENT_YEAR} and {MAX_ENROLLMENT_YEAR}"),
            });
        }
        validate_year_and_semester(academic_year, semester)?;

        Ok(Self { student_id, enrollment_year, program, academic_year, semester })
    }
}

impl TeacherProfile {
    pub(crate) fn new(
        employee_id: &str,
        department: &str,
        subjects: &[String],
    ) -> Result<Self, ProfileError> {
        let employee_id = non_empty("employee_id", employee_id)?;
        let department = non_empty("department", department)?;

        let mut cleaned: Vec<String> = Vec::with_capacity(subjects.len());
        for subject in subjects {
            let subject = subject.trim();
            if !subject.is_empty() && !cleaned.iter().any(|existing| existing == subject) {
                cleaned.push(subject.to_string());
            }
        }

        Ok(Self { employee_id, department, subjects: cleaned })
    }
}

impl AccountProfile {
    /// Build the profile required by `role`; fields belonging to other roles are ignored.
    pub(crate) fn build(role: UserRole, fields: &ProfileFields) -> Result<Self, ProfileError> {
        match role {
            UserRole::Admin => Ok(AccountProfile::Admin),
            UserRole::Student => {
                let student = StudentProfile::new(
                    fields.student_id.as_deref().ok_or(ProfileError::Missing("student_id"))?,
                    fields.enrollment_year.ok_or(ProfileError::Missing("enrollment_year"))?,
                    fields.program.as_deref().ok_or(ProfileError::Missing("program"))?,
                    fields.academic_year.ok_or(ProfileError::Missing("academic_year"))?,
                    fields.semester.ok_or(ProfileError::Missing("semester"))?,
                )?;
                Ok(AccountProfile::Student(student))
            }
            UserRole::Teacher => {
                let teacher = TeacherProfile::new(
                    fields.employee_id.as_deref().ok_or(ProfileError::Missing("employee_id"))?,
                    fields.department.as_deref().ok_or(ProfileError::Missing("department"))?,
                    fields.subjects.as_deref().unwrap_or(&[]),
                )?;
                Ok(AccountProfile::Teacher(teacher))
            }
        }
    }

    pub(crate) fn from_row(user: &User) -> Result<Self, ProfileError> {
        Self::build(user.role, &ProfileFields::from_row(user))
    }

    pub(crate) fn role(&self) -> UserRole {
        match self {
            AccountProfile::Student(_) => UserRole::Student,
            AccountProfile::Teacher(_) => UserRole::Teacher,
            AccountProfile::Admin => UserRole::Admin,
        }
    }

    pub(crate) fn as_student(&self) -> Option<&StudentProfile> {
        match self {
            AccountProfile::Student(student) => Some(student),
            _ => None,
        }
    }
}

/// A stored user whose role-specific columns agree with its role.
#[derive(Debug, Clone)]
pub(crate) struct Account {
    pub(crate) user: User,
    pub(crate) profile: AccountProfile,
}

impl TryFrom<User> for Account {
    type Error = ProfileError;

    fn try_from(user: User) -> Result<Self, Self::Error> {
        let profile = AccountProfile::from_row(&user)?;
        Ok(Self { user, profile })
    }
}

pub(crate) fn validate_year_and_semester(
    academic_year: i32,
    semester: i32,
) -> Result<(), ProfileError> {
    if !(1..=4).contains(&academic_year) {
        return Err(ProfileError::Invalid {
            field: "academic_year",
            reason: "must be between 1 and 4".to_string(),
        });
    }
    if !(1..=2).contains(&semester) {
        return Err(ProfileError::Invalid {
            field: "semester",
            reason: "must be 1 or 2".to_string(),
        });
    }
    Ok(())
}

/// Emails compare case-insensitively; they are stored lowercased.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn non_empty(field: &'static str, value: &str) -> Result<String, ProfileError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ProfileError::Missing(field));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student_fields() -> ProfileFields {
        ProfileFields {
            student_id: Some(" IT21000001 ".to_string()),
            enrollment_year: Some(2021),
            program: Some("BSc Software Engineering".to_string()),
            academic_year: Some(3),
            semester: Some(1),
            ..ProfileFields::default()
        }
    }

    #[test]
    fn student_profile_requires_every_student_field() {
        let profile = AccountProfile::build(UserRole::Student, &student_fields()).expect("profile");
        let student = profile.as_student().expect("student");
        assert_eq!(student.student_id, "IT21000001");
        assert_eq!(profile.role(), UserRole::Student);

        let missing = ProfileFields { program: None, ..student_fields() };
        assert_eq!(
            AccountProfile::build(UserRole::Student, &missing),
            Err(ProfileError::Missing("program"))
        );
    }

    #[test]
    fn student_year_and_semester_are_bounded() {
        let bad_year = ProfileFields { academic_year: Some(5), ..student_fields() };
        let err = AccountProfile::build(UserRole::Student, &bad_year).unwrap_err();
        assert_eq!(err.field(), "academic_year");

        let bad_semester = ProfileFields { semester: Some(3), ..student_fields() };
        let err = AccountProfile::build(UserRole::Student, &bad_semester).unwrap_err();
        assert_eq!(err.field(), "semester");
    }

    #[test]
    fn teacher_profile_ignores_student_fields_and_dedups_subjects() {
        let fields = ProfileFields {
            employee_id: Some("EMP-42".to_string()),
            department: Some("Computing".to_string()),
            subjects: Some(vec!["OOP".into(), " OOP ".into(), "".into(), "DSA".into()]),
            ..student_fields()
        };
        let profile = AccountProfile::build(UserRole::Teacher, &fields).expect("profile");
        let AccountProfile::Teacher(teacher) = profile else {
            panic!("expected teacher profile");
        };
        assert_eq!(teacher.subjects, vec!["OOP".to_string(), "DSA".to_string()]);
    }

    #[test]
    fn teacher_requires_employee_id() {
        let fields = ProfileFields { department: Some("Computing".into()), ..Default::default() };
        assert_eq!(
            AccountProfile::build(UserRole::Teacher, &fields),
            Err(ProfileError::Missing("employee_id"))
        );
    }

    #[test]
    fn admin_needs_no_attributes() {
        let profile = AccountProfile::build(UserRole::Admin, &ProfileFields::default());
        assert_eq!(profile, Ok(AccountProfile::Admin));
    }

    #[test]
    fn merge_keeps_existing_values() {
        let patched = student_fields()
            .merged_with(ProfileFields { semester: Some(2), ..ProfileFields::default() });
        assert_eq!(patched.semester, Some(2));
        assert_eq!(patched.academic_year, Some(3));
    }

    #[test]
    fn emails_are_normalized() {
        assert_eq!(normalize_email("  Ada@Example.EDU "), "ada@example.edu");
    }
}
