use std::sync::atomic::{AtomicBool, Ordering};

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use validator::{ValidationErrors, ValidationErrorsKind};

use crate::api::response::envelope;
use crate::core::security::TokenError;
use crate::db;
use crate::services::account_security::OtpError;
use crate::services::accounts::ProfileError;
use crate::services::grading::GradingError;
use crate::services::quiz_lifecycle::{AccessDenied, LifecycleError};

static EXPOSE_INTERNAL: AtomicBool = AtomicBool::new(true);

/// Whether 500 responses carry the failing context or a generic message.
pub(crate) fn expose_internal_details(expose: bool) {
    EXPOSE_INTERNAL.store(expose, Ordering::Relaxed);
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct FieldError {
    pub(crate) field: String,
    pub(crate) message: String,
}

#[derive(Debug)]
pub(crate) enum ApiError {
    Validation(Vec<FieldError>),
    BadRequest(String),
    Unauthorized(&'static str),
    Forbidden(&'static str),
    NotFound(String),
    Conflict(String),
    TooManyRequests(&'static str),
    Internal(String),
}

impl ApiError {
    /// Log the underlying error with context and return an `Internal` variant.
    pub(crate) fn internal(err: impl std::fmt::Display, context: &str) -> Self {
        tracing::error!(error = %err, "{context}");
        Self::Internal(context.to_string())
    }

    /// Unique violations become a 409; everything else is logged as internal.
    pub(crate) fn from_db(err: sqlx::Error, context: &str) -> Self {
        match db::unique_violation(&err) {
            Some(constraint) => Self::Conflict(conflict_message(&constraint).to_string()),
            None => Self::internal(err, context),
        }
    }

    pub(crate) fn field(field: &str, message: impl Into<String>) -> Self {
        Self::Validation(vec![FieldError { field: field.to_string(), message: message.into() }])
    }

    pub(crate) fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn conflict_message(constraint: &str) -> &'static str {
    match constraint {
        "users_email_key" => "An account with this email already exists",
        "users_student_id_key" => "An account with this student ID already exists",
        "users_employee_id_key" => "An account with this employee ID already exists",
        "modules_owner_code_key" => "You already have a module with this code for that term",
        "results_student_quiz_key" => "You have already submitted this quiz",
        _ => "Resource already exists",
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            ApiError::Validation(errors) => {
                envelope::<()>(status, "Validation failed".to_string(), None, Some(errors))
            }
            ApiError::Unauthorized(message) => {
                let mut response = envelope::<()>(status, message.to_string(), None, None);
                response
                    .headers_mut()
                    .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
                response
            }
            ApiError::Forbidden(message) | ApiError::TooManyRequests(message) => {
                envelope::<()>(status, message.to_string(), None, None)
            }
            ApiError::BadRequest(message)
            | ApiError::NotFound(message)
            | ApiError::Conflict(message) => envelope::<()>(status, message, None, None),
            ApiError::Internal(message) => {
                tracing::error!(error = %message, "Internal server error");
                let message = if EXPOSE_INTERNAL.load(Ordering::Relaxed) {
                    message
                } else {
                    "Internal server error".to_string()
                };
                envelope::<()>(status, message, None, None)
            }
        }
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        let mut fields = Vec::new();
        collect_field_errors(None, &errors, &mut fields);
        fields.sort_by(|a, b| a.field.cmp(&b.field));
        ApiError::Validation(fields)
    }
}

fn collect_field_errors(prefix: Option<&str>, errors: &ValidationErrors, out: &mut Vec<FieldError>) {
    for (field, kind) in errors.errors() {
        let path = match prefix {
            Some(prefix) => format!("{prefix}.{field}"),
            None => field.to_string(),
        };
        match kind {
            ValidationErrorsKind::Field(items) => {
                for item in items {
                    let message = item
                        .message
                        .as_ref()
                        .map(|message| message.to_string())
                        .unwrap_or_else(|| format!("{path} is invalid"));
                    out.push(FieldError { field: path.clone(), message });
                }
            }
            ValidationErrorsKind::Struct(inner) => collect_field_errors(Some(&path), inner, out),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    collect_field_errors(Some(&format!("{path}[{index}]")), inner, out);
                }
            }
        }
    }
}

impl From<ProfileError> for ApiError {
    fn from(err: ProfileError) -> Self {
        ApiError::field(err.field(), err.to_string())
    }
}

impl From<LifecycleError> for ApiError {
    fn from(err: LifecycleError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<GradingError> for ApiError {
    fn from(err: GradingError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<AccessDenied> for ApiError {
    fn from(err: AccessDenied) -> Self {
        match err {
            AccessDenied::NotEligible => ApiError::Forbidden("You are not eligible for this quiz"),
            AccessDenied::NotActive => ApiError::BadRequest(err.to_string()),
            AccessDenied::WrongPasscode => ApiError::Unauthorized("Invalid quiz passcode"),
        }
    }
}

impl From<OtpError> for ApiError {
    fn from(err: OtpError) -> Self {
        match err {
            OtpError::TooManyAttempts => {
                ApiError::TooManyRequests("Too many incorrect attempts; request a new code")
            }
            OtpError::NoCode | OtpError::Expired | OtpError::Mismatch => {
                ApiError::BadRequest(err.to_string())
            }
        }
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => ApiError::Unauthorized("Token has expired"),
            TokenError::Invalid => ApiError::Unauthorized("Invalid authentication credentials"),
            TokenError::Encoding | TokenError::UnsupportedAlgorithm(_) => {
                ApiError::internal(err, "Failed to handle token")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Inner {
        #[validate(range(min = 1, message = "year must be positive"))]
        year: i32,
    }

    #[derive(Validate)]
    struct Outer {
        #[validate(length(min = 3, message = "title is too short"))]
        title: String,
        #[validate(nested)]
        entries: Vec<Inner>,
    }

    #[test]
    fn validation_errors_are_flattened_with_paths() {
        let payload = Outer { title: "x".to_string(), entries: vec![Inner { year: 0 }] };
        let ApiError::Validation(fields) = ApiError::from(payload.validate().unwrap_err()) else {
            panic!("expected validation error");
        };

        assert_eq!(
            fields,
            vec![
                FieldError {
                    field: "entries[0].year".to_string(),
                    message: "year must be positive".to_string()
                },
                FieldError { field: "title".to_string(), message: "title is too short".to_string() },
            ]
        );
    }

    #[test]
    fn access_denials_map_to_distinct_statuses() {
        assert_eq!(ApiError::from(AccessDenied::NotEligible).status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::from(AccessDenied::NotActive).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::from(AccessDenied::WrongPasscode).status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn known_constraints_get_friendly_conflicts() {
        assert_eq!(conflict_message("results_student_quiz_key"), "You have already submitted this quiz");
        assert_eq!(conflict_message("something_else"), "Resource already exists");
    }

    #[test]
    fn otp_lockout_is_rate_limited() {
        assert_eq!(ApiError::from(OtpError::TooManyAttempts).status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(ApiError::from(OtpError::Mismatch).status(), StatusCode::BAD_REQUEST);
    }
}
