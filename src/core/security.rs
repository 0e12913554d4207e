use argon2::{password_hash::SaltString, Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Validation};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use time::{Duration, OffsetDateTime};

use crate::core::config::Settings;
use crate::db::types::UserRole;

const ARGON2_MEMORY_KIB: u32 = 102_400;
const ARGON2_TIME: u32 = 2;
const ARGON2_PARALLELISM: u32 = 8;

#[derive(Debug, Error)]
pub(crate) enum SecurityError {
    #[error("password hashing failed")]
    Hashing,
    #[error("password verification failed")]
    Verification,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum TokenError {
    #[error("token has expired")]
    Expired,
    #[error("token is invalid")]
    Invalid,
    #[error("token encoding failed")]
    Encoding,
    #[error("unsupported jwt algorithm: {0}")]
    UnsupportedAlgorithm(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum TokenType {
    Access,
    Refresh,
    Reset,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Claims {
    pub(crate) sub: String,
    pub(crate) email: String,
    pub(crate) role: UserRole,
    pub(crate) typ: TokenType,
    pub(crate) iat: i64,
    pub(crate) exp: i64,
    /// Password fingerprint, only present on reset tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) fp: Option<String>,
}

/// Who a token is issued for.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TokenSubject<'a> {
    pub(crate) id: &'a str,
    pub(crate) email: &'a str,
    pub(crate) role: UserRole,
}

#[derive(Debug, Clone)]
pub(crate) struct TokenPair {
    pub(crate) access_token: String,
    pub(crate) refresh_token: String,
}

fn argon2() -> Result<Argon2<'static>, argon2::Error> {
    let params = argon2::Params::new(ARGON2_MEMORY_KIB, ARGON2_TIME, ARGON2_PARALLELISM, None)?;
    Ok(Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params))
}

pub(crate) fn hash_password(password: &str) -> Result<String, SecurityError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = argon2().map_err(|_| SecurityError::Hashing)?;

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|_| SecurityError::Hashing)?
        .to_string();

    Ok(hash)
}

pub(crate) fn verify_password(password: &str, hash: &str) -> Result<bool, SecurityError> {
    let parsed = PasswordHash::new(hash).map_err(|_| SecurityError::Verification)?;
    let argon2 = argon2().map_err(|_| SecurityError::Verification)?;

    match argon2.verify_password(password.as_bytes(), &parsed) {
        Ok(_) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(_) => Err(SecurityError::Verification),
    }
}

/// Short fingerprint of a password digest; changes whenever the password does.
pub(crate) fn password_fingerprint(hashed_password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(hashed_password.as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..16].to_string()
}

pub(crate) fn issue_token(
    subject: TokenSubject<'_>,
    typ: TokenType,
    ttl: Duration,
    fingerprint: Option<String>,
    settings: &Settings,
) -> Result<String, TokenError> {
    let algorithm = algorithm_from_settings(settings)?;
    let now = OffsetDateTime::now_utc();

    let claims = Claims {
        sub: subject.id.to_string(),
        email: subject.email.to_string(),
        role: subject.role,
        typ,
        iat: now.unix_timestamp(),
        exp: (now + ttl).unix_timestamp(),
        fp: fingerprint,
    };

    encode(
        &jsonwebtoken::Header::new(algorithm),
        &claims,
        &EncodingKey::from_secret(settings.security().secret_key.as_bytes()),
    )
    .map_err(|_| TokenError::Encoding)
}

pub(crate) fn issue_token_pair(
    subject: TokenSubject<'_>,
    settings: &Settings,
) -> Result<TokenPair, TokenError> {
    let security = settings.security();
    let access_token = issue_token(
        subject,
        TokenType::Access,
        Duration::minutes(security.access_token_expire_minutes as i64),
        None,
        settings,
    )?;
    let refresh_token = issue_token(
        subject,
        TokenType::Refresh,
        Duration::minutes(security.refresh_token_expire_minutes as i64),
        None,
        settings,
    )?;

    Ok(TokenPair { access_token, refresh_token })
}

pub(crate) fn issue_reset_token(
    subject: TokenSubject<'_>,
    hashed_password: &str,
    settings: &Settings,
) -> Result<String, TokenError> {
    issue_token(
        subject,
        TokenType::Reset,
        Duration::minutes(settings.security().reset_token_expire_minutes as i64),
        Some(password_fingerprint(hashed_password)),
        settings,
    )
}

/// Verify signature, expiry and token type.
pub(crate) fn verify_token(
    token: &str,
    expected: TokenType,
    settings: &Settings,
) -> Result<Claims, TokenError> {
    let algorithm = algorithm_from_settings(settings)?;
    let mut validation = Validation::new(algorithm);
    validation.validate_exp = true;
    validation.leeway = 0;
    validation.required_spec_claims.insert("exp".to_string());
    validation.required_spec_claims.insert("sub".to_string());

    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(settings.security().secret_key.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|err| match err.kind() {
        ErrorKind::ExpiredSignature => TokenError::Expired,
        _ => TokenError::Invalid,
    })?;

    if claims.typ != expected {
        return Err(TokenError::Invalid);
    }

    Ok(claims)
}

fn algorithm_from_settings(settings: &Settings) -> Result<Algorithm, TokenError> {
    match settings.security().algorithm.as_str() {
        "HS256" => Ok(Algorithm::HS256),
        "HS384" => Ok(Algorithm::HS384),
        "HS512" => Ok(Algorithm::HS512),
        other => Err(TokenError::UnsupportedAlgorithm(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subject() -> TokenSubject<'static> {
        TokenSubject { id: "user-123", email: "ada@example.edu", role: UserRole::Student }
    }

    #[test]
    fn password_hash_roundtrip() {
        let hash = hash_password("correct-horse-battery-staple").expect("hash");
        assert!(verify_password("correct-horse-battery-staple", &hash).unwrap());
        assert!(!verify_password("wrong-password", &hash).unwrap());
    }

    #[test]
    fn hashing_is_salted() {
        let first = hash_password("same-password").expect("hash");
        let second = hash_password("same-password").expect("hash");
        assert_ne!(first, second);
    }

    #[test]
    fn verify_rejects_malformed_digest() {
        assert!(matches!(verify_password("x", "not-a-phc"), Err(SecurityError::Verification)));
    }

    #[test]
    fn access_token_roundtrip_returns_issued_claims() {
        let settings = Settings::for_tests();
        let token = issue_token(subject(), TokenType::Access, Duration::minutes(1), None, &settings)
            .expect("token");
        let claims = verify_token(&token, TokenType::Access, &settings).expect("claims");

        assert_eq!(claims.sub, "user-123");
        assert_eq!(claims.email, "ada@example.edu");
        assert_eq!(claims.role, UserRole::Student);
        assert_eq!(claims.typ, TokenType::Access);
        assert_eq!(claims.exp - claims.iat, 60);
    }

    #[test]
    fn expired_token_is_reported_as_expired() {
        let settings = Settings::for_tests();
        let token =
            issue_token(subject(), TokenType::Access, Duration::seconds(-30), None, &settings)
                .expect("token");

        assert_eq!(verify_token(&token, TokenType::Access, &settings), Err(TokenError::Expired));
    }

    #[test]
    fn tampered_or_foreign_tokens_are_invalid() {
        let settings = Settings::for_tests();
        let token = issue_token(subject(), TokenType::Access, Duration::minutes(1), None, &settings)
            .expect("token");

        let mut tampered = token.clone();
        tampered.push('x');
        assert_eq!(verify_token(&tampered, TokenType::Access, &settings), Err(TokenError::Invalid));
        assert_eq!(
            verify_token("not.a.token", TokenType::Access, &settings),
            Err(TokenError::Invalid)
        );
    }

    #[test]
    fn token_type_is_enforced() {
        let settings = Settings::for_tests();
        let pair = issue_token_pair(subject(), &settings).expect("pair");

        assert!(verify_token(&pair.refresh_token, TokenType::Refresh, &settings).is_ok());
        assert_eq!(
            verify_token(&pair.refresh_token, TokenType::Access, &settings),
            Err(TokenError::Invalid)
        );
        assert_eq!(
            verify_token(&pair.access_token, TokenType::Refresh, &settings),
            Err(TokenError::Invalid)
        );
    }

    #[test]
    fn reset_token_carries_password_fingerprint() {
        let settings = Settings::for_tests();
        let token = issue_reset_token(subject(), "$argon2id$digest", &settings).expect("token");
        let claims = verify_token(&token, TokenType::Reset, &settings).expect("claims");

        assert_eq!(claims.fp, Some(password_fingerprint("$argon2id$digest")));
        assert_ne!(claims.fp, Some(password_fingerprint("$argon2id$other")));
    }
}
