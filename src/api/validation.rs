use async_trait::async_trait;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, FromRequestParts, Query, Request};
use axum::http::request::Parts;
use axum::Json;
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::api::errors::ApiError;

pub(crate) const MIN_PASSWORD_LEN: usize = 8;

/// JSON body that has passed its `validator` rules.
pub(crate) struct ValidatedJson<T>(pub(crate) T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await.map_err(|rejection| {
            match rejection {
                JsonRejection::JsonDataError(err) => ApiError::field("body", err.body_text()),
                other => ApiError::BadRequest(other.body_text()),
            }
        })?;
        value.validate()?;
        Ok(Self(value))
    }
}

/// Query string extractor whose failures use the standard error envelope.
pub(crate) struct ApiQuery<T>(pub(crate) T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
        Ok(Self(value))
    }
}

/// Passwords need a letter and a digit on top of the length rule in the schemas.
pub(crate) fn validate_password_strength(field: &str, password: &str) -> Result<(), ApiError> {
    let long_enough = password.chars().count() >= MIN_PASSWORD_LEN;
    let has_letter = password.chars().any(|c| c.is_alphabetic());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());

    if long_enough && has_letter && has_digit {
        Ok(())
    } else {
        Err(ApiError::field(
            field,
            format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters and contain a letter and a digit"
            ),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::account_security::generate_temporary_password;

    #[test]
    fn password_strength_rules() {
        assert!(validate_password_strength("password", "abc12345").is_ok());
        assert!(validate_password_strength("password", "abcdefgh").is_err());
        assert!(validate_password_strength("password", "12345678").is_err());
        assert!(validate_password_strength("password", "a1").is_err());
    }

    #[test]
    fn generated_passwords_are_strong() {
        for _ in 0..20 {
            assert!(validate_password_strength("password", &generate_temporary_password()).is_ok());
        }
    }
}
