use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::db::types::UserRole;
use crate::schemas::user::UserResponse;
use crate::services::accounts::ProfileFields;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct RegisterRequest {
    #[validate(length(min = 2, max = 100, message = "name must be 2-100 characters"))]
    pub(crate) name: String,
    #[validate(email(message = "email must be a valid address"))]
    pub(crate) email: String,
    #[validate(length(min = 8, max = 128, message = "password must be 8-128 characters"))]
    pub(crate) password: String,
    pub(crate) role: UserRole,
    #[serde(flatten)]
    pub(crate) profile: ProfileFields,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct LoginRequest {
    #[validate(email(message = "email must be a valid address"))]
    pub(crate) email: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub(crate) password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct RefreshRequest {
    #[serde(alias = "refreshToken")]
    #[validate(length(min = 1, message = "refresh_token is required"))]
    pub(crate) refresh_token: String,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ChangePasswordRequest {
    #[validate(length(equal = 6, message = "otp must be 6 digits"))]
    pub(crate) otp: String,
    #[serde(alias = "currentPassword")]
    #[validate(length(min = 1, message = "current_password is required"))]
    pub(crate) current_password: String,
    #[serde(alias = "newPassword")]
    #[validate(length(min = 8, max = 128, message = "new_password must be 8-128 characters"))]
    pub(crate) new_password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ForgotPasswordRequest {
    #[validate(email(message = "email must be a valid address"))]
    pub(crate) email: String,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct VerifyOtpRequest {
    #[validate(email(message = "email must be a valid address"))]
    pub(crate) email: String,
    #[validate(length(equal = 6, message = "otp must be 6 digits"))]
    pub(crate) otp: String,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ResetPasswordRequest {
    #[serde(alias = "resetToken")]
    #[validate(length(min = 1, message = "reset_token is required"))]
    pub(crate) reset_token: String,
    #[serde(alias = "newPassword")]
    #[validate(length(min = 8, max = 128, message = "new_password must be 8-128 characters"))]
    pub(crate) new_password: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct TokenResponse {
    pub(crate) access_token: String,
    pub(crate) refresh_token: String,
    pub(crate) token_type: String,
    pub(crate) user: UserResponse,
}

#[derive(Debug, Serialize)]
pub(crate) struct ResetTokenResponse {
    pub(crate) reset_token: String,
    pub(crate) expires_in_seconds: u64,
}

#[derive(Debug, Serialize)]
pub(crate) struct OtpIssuedResponse {
    pub(crate) expires_in_seconds: u64,
}
