use axum::{
    extract::State,
    routing::{get, post},
    Router,
};
use uuid::Uuid;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::api::response::ApiResponse;
use crate::api::validation::{validate_password_strength, ValidatedJson};
use crate::core::config::Settings;
use crate::core::metrics;
use crate::core::security::{self, TokenSubject, TokenType};
use crate::core::state::AppState;
use crate::db::models::User;
use crate::db::types::{AccountStatus, UserRole};
use crate::repositories;
use crate::schemas::auth::{
    ChangePasswordRequest, ForgotPasswordRequest, LoginRequest, OtpIssuedResponse,
    RefreshRequest, RegisterRequest, ResetPasswordRequest, ResetTokenResponse, TokenResponse,
    VerifyOtpRequest,
};
use crate::schemas::user::UserResponse;
use crate::services::account_security::{
    LockoutPolicy, LoginGuard, OneTimeCode, OtpError, OtpPurpose,
};
use crate::services::accounts::{normalize_email, AccountProfile};

const INVALID_CREDENTIALS: &str = "Incorrect email or password";
const INVALID_RESET_TOKEN: &str = "Invalid or expired reset token";

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/me", get(me))
        .route("/password/otp", post(request_password_change_otp))
        .route("/password/change", post(change_password))
        .route("/forgot-password", post(forgot_password))
        .route("/forgot-password/verify", post(verify_forgot_password_otp))
        .route("/reset-password", post(reset_password))
}

async fn register(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<RegisterRequest>,
) -> Result<ApiResponse<TokenResponse>, ApiError> {
    let email = normalize_email(&payload.email);
    enforce_rate_limit(&state, "register", &email, "Too many registration attempts, try again later")
        .await?;

    if payload.role == UserRole::Admin {
        return Err(ApiError::Forbidden("Admin accounts cannot be self-registered"));
    }

    validate_password_strength("password", &payload.password)?;
    let profile = AccountProfile::build(payload.role, &payload.profile)?;

    let hashed_password = security::hash_password(&payload.password)
        .map_err(|e| ApiError::internal(e, "Failed to hash password"))?;

    let user = repositories::users::create(
        state.db(),
        repositories::users::CreateUser {
            id: &Uuid::new_v4().to_string(),
            name: payload.name.trim(),
            email: &email,
            hashed_password,
            role: profile.role(),
            status: AccountStatus::Active,
            profile: (&profile).into(),
            created_at: state.now(),
        },
    )
    .await
    .map_err(|e| ApiError::from_db(e, "Failed to create user"))?;

    tracing::info!(user_id = %user.id, role = user.role.as_str(), "Account registered");

    let response = token_response(user, state.settings())?;
    Ok(ApiResponse::created("Registration successful", response))
}

async fn login(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<LoginRequest>,
) -> Result<ApiResponse<TokenResponse>, ApiError> {
    let email = normalize_email(&payload.email);
    enforce_rate_limit(&state, "login", &email, "Too many login attempts, try again later").await?;

    let user = repositories::users::find_by_email(state.db(), &email)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load user"))?;

    let Some(user) = user else {
        metrics::record_login("unknown_account");
        return Err(ApiError::Unauthorized(INVALID_CREDENTIALS));
    };

    let now = state.now();
    let mut guard = LoginGuard::from_user(&user);

    if guard.is_locked(now) {
        metrics::record_login("locked");
        return Err(ApiError::Unauthorized(
            "Account is temporarily locked after repeated failed logins",
        ));
    }

    let verified = security::verify_password(&payload.password, &user.hashed_password)
        .map_err(|e| ApiError::internal(e, "Failed to verify password"))?;

    if !verified {
        let policy = LockoutPolicy::from_settings(state.settings().security());
        guard.record_failure(now, &policy);
        repositories::users::save_login_guard(state.db(), &user.id, &guard, now)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to record login failure"))?;

        metrics::record_login("invalid_password");
        if guard.is_locked(now) {
            tracing::warn!(user_id = %user.id, "Account locked after repeated failed logins");
        }
        return Err(ApiError::Unauthorized(INVALID_CREDENTIALS));
    }

    if user.status != AccountStatus::Active {
        metrics::record_login("inactive");
        return Err(ApiError::Unauthorized("Account is not active"));
    }

    guard.record_success(now);
    repositories::users::save_login_guard(state.db(), &user.id, &guard, now)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to record login"))?;

    let user = User {
        failed_login_attempts: guard.failed_attempts,
        locked_until: guard.locked_until,
        last_login_at: guard.last_login_at,
        ..user
    };

    metrics::record_login("success");
    let response = token_response(user, state.settings())?;
    Ok(ApiResponse::ok("Login successful", response))
}

async fn refresh(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<RefreshRequest>,
) -> Result<ApiResponse<TokenResponse>, ApiError> {
    let claims =
        security::verify_token(&payload.refresh_token, TokenType::Refresh, state.settings())?;

    let user = repositories::users::find_by_id(state.db(), &claims.sub)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load user"))?
        .filter(|user| user.status == AccountStatus::Active)
        .ok_or(ApiError::Unauthorized("Invalid authentication credentials"))?;

    let response = token_response(user, state.settings())?;
    Ok(ApiResponse::ok("Token refreshed", response))
}

async fn me(CurrentUser(user): CurrentUser) -> ApiResponse<UserResponse> {
    ApiResponse::ok("Current account", UserResponse::from_db(user))
}

async fn request_password_change_otp(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<ApiResponse<OtpIssuedResponse>, ApiError> {
    enforce_rate_limit(&state, "password-otp", &user.id, "Too many code requests, try again later")
        .await?;

    let response = issue_otp(&state, &user, OtpPurpose::PasswordChange).await?;
    Ok(ApiResponse::ok("Verification code sent", response))
}

async fn change_password(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ValidatedJson(payload): ValidatedJson<ChangePasswordRequest>,
) -> Result<ApiResponse<()>, ApiError> {
    let current_ok = security::verify_password(&payload.current_password, &user.hashed_password)
        .map_err(|e| ApiError::internal(e, "Failed to verify password"))?;
    if !current_ok {
        return Err(ApiError::field("current_password", "Current password is incorrect"));
    }

    validate_password_strength("new_password", &payload.new_password)?;
    if payload.new_password == payload.current_password {
        return Err(ApiError::field(
            "new_password",
            "New password must differ from the current password",
        ));
    }

    check_otp(&state, &user, OtpPurpose::PasswordChange, &payload.otp).await?;

    let hashed_password = security::hash_password(&payload.new_password)
        .map_err(|e| ApiError::internal(e, "Failed to hash password"))?;
    repositories::users::set_password(
        state.db(),
        &user.id,
        &hashed_password,
        OtpPurpose::PasswordChange,
        state.now(),
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to update password"))?;

    tracing::info!(user_id = %user.id, "Password changed");
    notify_password_changed(&state, &user).await;

    Ok(ApiResponse::ok("Password changed successfully", ()))
}

async fn forgot_password(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<ForgotPasswordRequest>,
) -> Result<ApiResponse<OtpIssuedResponse>, ApiError> {
    let email = normalize_email(&payload.email);
    enforce_rate_limit(&state, "forgot", &email, "Too many reset requests, try again later").await?;

    let user = repositories::users::find_by_email(state.db(), &email)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load user"))?;

    // Same response whether or not the address belongs to an account.
    let response = match user {
        Some(user) if user.status == AccountStatus::Active => {
            issue_otp(&state, &user, OtpPurpose::ForgotPassword).await?
        }
        _ => OtpIssuedResponse { expires_in_seconds: otp_lifetime_seconds(state.settings()) },
    };

    Ok(ApiResponse::ok("If the account exists, a verification code has been sent", response))
}

async fn verify_forgot_password_otp(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<VerifyOtpRequest>,
) -> Result<ApiResponse<ResetTokenResponse>, ApiError> {
    let email = normalize_email(&payload.email);
    enforce_rate_limit(&state, "forgot-verify", &email, "Too many attempts, try again later")
        .await?;

    let user = repositories::users::find_by_email(state.db(), &email)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load user"))?
        .filter(|user| user.status == AccountStatus::Active)
        .ok_or_else(|| ApiError::from(OtpError::NoCode))?;

    check_otp(&state, &user, OtpPurpose::ForgotPassword, &payload.otp).await?;

    repositories::users::save_otp(
        state.db(),
        &user.id,
        OtpPurpose::ForgotPassword,
        &OneTimeCode::default(),
        state.now(),
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to clear verification code"))?;

    let reset_token =
        security::issue_reset_token(subject_of(&user), &user.hashed_password, state.settings())?;

    Ok(ApiResponse::ok(
        "Verification successful",
        ResetTokenResponse {
            reset_token,
            expires_in_seconds: state.settings().security().reset_token_expire_minutes * 60,
        },
    ))
}

async fn reset_password(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<ResetPasswordRequest>,
) -> Result<ApiResponse<()>, ApiError> {
    let claims = security::verify_token(&payload.reset_token, TokenType::Reset, state.settings())
        .map_err(|_| ApiError::Unauthorized(INVALID_RESET_TOKEN))?;

    let user = repositories::users::find_by_id(state.db(), &claims.sub)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load user"))?
        .filter(|user| user.status == AccountStatus::Active)
        .ok_or(ApiError::Unauthorized(INVALID_RESET_TOKEN))?;

    // The fingerprint changes with the password, so a used token stops matching.
    let fingerprint = security::password_fingerprint(&user.hashed_password);
    if claims.fp.as_deref() != Some(fingerprint.as_str()) {
        return Err(ApiError::Unauthorized(INVALID_RESET_TOKEN));
    }

    validate_password_strength("new_password", &payload.new_password)?;

    let hashed_password = security::hash_password(&payload.new_password)
        .map_err(|e| ApiError::internal(e, "Failed to hash password"))?;
    repositories::users::set_password(
        state.db(),
        &user.id,
        &hashed_password,
        OtpPurpose::ForgotPassword,
        state.now(),
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to update password"))?;

    tracing::info!(user_id = %user.id, "Password reset");
    notify_password_changed(&state, &user).await;

    Ok(ApiResponse::ok("Password has been reset", ()))
}

async fn enforce_rate_limit(
    state: &AppState,
    scope: &str,
    subject: &str,
    message: &'static str,
) -> Result<(), ApiError> {
    let security = state.settings().security();
    let key = format!("rl:{scope}:{subject}");

    let allowed = match state
        .redis()
        .rate_limit(&key, security.auth_rate_limit, security.auth_rate_window_seconds)
        .await
    {
        Ok(allowed) => allowed,
        Err(err) => {
            tracing::warn!(error = %err, scope, "Rate limiter unavailable; allowing request");
            true
        }
    };

    if allowed {
        Ok(())
    } else {
        Err(ApiError::TooManyRequests(message))
    }
}

async fn issue_otp(
    state: &AppState,
    user: &User,
    purpose: OtpPurpose,
) -> Result<OtpIssuedResponse, ApiError> {
    let now = state.now();
    let (code, slot) = OneTimeCode::issue(now, state.settings().security().otp_ttl());

    repositories::users::save_otp(state.db(), &user.id, purpose, &slot, now)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to store verification code"))?;

    if let Err(err) = state.notifier().send_otp(&user.email, &user.name, purpose, &code).await {
        tracing::warn!(
            error = %err,
            user_id = %user.id,
            purpose = purpose.as_str(),
            "Failed to deliver verification code"
        );
    }

    Ok(OtpIssuedResponse { expires_in_seconds: otp_lifetime_seconds(state.settings()) })
}

/// Verify `candidate` against the stored slot, persisting the attempt counter on a miss.
async fn check_otp(
    state: &AppState,
    user: &User,
    purpose: OtpPurpose,
    candidate: &str,
) -> Result<(), ApiError> {
    let now = state.now();
    let mut slot = OneTimeCode::from_user(user, purpose);
    let max_attempts = state.settings().security().otp_max_attempts as i32;

    match slot.verify(candidate, now, max_attempts) {
        Ok(()) => Ok(()),
        Err(err) => {
            if slot != OneTimeCode::from_user(user, purpose) {
                repositories::users::save_otp(state.db(), &user.id, purpose, &slot, now)
                    .await
                    .map_err(|e| ApiError::internal(e, "Failed to record verification attempt"))?;
            }
            Err(err.into())
        }
    }
}

async fn notify_password_changed(state: &AppState, user: &User) {
    if let Err(err) = state.notifier().send_password_changed(&user.email, &user.name).await {
        tracing::warn!(error = %err, user_id = %user.id, "Failed to send password notice");
    }
}

fn otp_lifetime_seconds(settings: &Settings) -> u64 {
    settings.security().otp_expire_minutes * 60
}

fn subject_of(user: &User) -> TokenSubject<'_> {
    TokenSubject { id: &user.id, email: &user.email, role: user.role }
}

fn token_response(user: User, settings: &Settings) -> Result<TokenResponse, ApiError> {
    let pair = security::issue_token_pair(subject_of(&user), settings)?;

    Ok(TokenResponse {
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
        token_type: "bearer".to_string(),
        user: UserResponse::from_db(user),
    })
}
