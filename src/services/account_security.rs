//! Login lockout and one-time code bookkeeping.
//!
//! Both types are plain values read from and written back to the `users` row;
//! callers persist the whole state after every transition.

use rand::Rng;
use sha2::{Digest, Sha256};
use thiserror::Error;
use time::{Duration, PrimitiveDateTime};

use crate::core::config::SecuritySettings;
use crate::db::models::User;

const OTP_DIGITS: u32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LockoutPolicy {
    pub(crate) max_failed_attempts: i32,
    pub(crate) lock_duration: Duration,
}

impl LockoutPolicy {
    pub(crate) fn from_settings(security: &SecuritySettings) -> Self {
        Self {
            max_failed_attempts: security.max_failed_logins as i32,
            lock_duration: security.lockout_duration(),
        }
    }
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self { max_failed_attempts: 5, lock_duration: Duration::hours(2) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) struct LoginGuard {
    pub(crate) failed_attempts: i32,
    pub(crate) locked_until: Option<PrimitiveDateTime>,
    pub(crate) last_login_at: Option<PrimitiveDateTime>,
}

impl LoginGuard {
    pub(crate) fn from_user(user: &User) -> Self {
        Self {
            failed_attempts: user.failed_login_attempts,
            locked_until: user.locked_until,
            last_login_at: user.last_login_at,
        }
    }

    pub(crate) fn is_locked(&self, now: PrimitiveDateTime) -> bool {
        matches!(self.locked_until, Some(until) if until > now)
    }

    pub(crate) fn record_failure(&mut self, now: PrimitiveDateTime, policy: &LockoutPolicy) {
        if matches!(self.locked_until, Some(until) if until <= now) {
            self.failed_attempts = 1;
            self.locked_until = None;
            return;
        }

        self.failed_attempts += 1;
        if self.failed_attempts >= policy.max_failed_attempts && !self.is_locked(now) {
            self.locked_until = Some(now + policy.lock_duration);
        }
    }

    pub(crate) fn record_success(&mut self, now: PrimitiveDateTime) {
        self.failed_attempts = 0;
        self.locked_until = None;
        self.last_login_at = Some(now);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OtpPurpose {
    PasswordChange,
    ForgotPassword,
}

impl OtpPurpose {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            OtpPurpose::PasswordChange => "password_change",
            OtpPurpose::ForgotPassword => "forgot_password",
        }
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OtpError {
    #[error("No verification code was requested")]
    NoCode,
    #[error("Verification code has expired")]
    Expired,
    #[error("Too many incorrect attempts; request a new code")]
    TooManyAttempts,
    #[error("Verification code is incorrect")]
    Mismatch,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) struct OneTimeCode {
    pub(crate) code_hash: Option<String>,
    pub(crate) expires_at: Option<PrimitiveDateTime>,
    pub(crate) attempts: i32,
}

impl OneTimeCode {
    pub(crate) fn from_user(user: &User, purpose: OtpPurpose) -> Self {
        match purpose {
            OtpPurpose::PasswordChange => Self {
                code_hash: user.password_change_otp_hash.clone(),
                expires_at: user.password_change_otp_expires_at,
                attempts: user.password_change_otp_attempts,
            },
            OtpPurpose::ForgotPassword => Self {
                code_hash: user.forgot_password_otp_hash.clone(),
                expires_at: user.forgot_password_otp_expires_at,
                attempts: user.forgot_password_otp_attempts,
            },
        }
    }

    /// Fresh code valid for `ttl`; the plaintext is returned for delivery only.
    pub(crate) fn issue(now: PrimitiveDateTime, ttl: Duration) -> (String, Self) {
        let code = generate_code();
        let slot =
            Self { code_hash: Some(hash_code(&code)), expires_at: Some(now + ttl), attempts: 0 };
        (code, slot)
    }

    /// Checks run in a fixed order; a mismatch bumps `attempts`, which the caller must persist.
    pub(crate) fn verify(
        &mut self,
        candidate: &str,
        now: PrimitiveDateTime,
        max_attempts: i32,
    ) -> Result<(), OtpError> {
        let Some(expected) = self.code_hash.as_deref() else {
            return Err(OtpError::NoCode);
        };
        match self.expires_at {
            Some(expires_at) if expires_at > now => {}
            _ => return Err(OtpError::Expired),
        }
        if self.attempts >= max_attempts {
            return Err(OtpError::TooManyAttempts);
        }
        if hash_code(candidate.trim()) != expected {
            self.attempts += 1;
            return Err(OtpError::Mismatch);
        }
        Ok(())
    }

    pub(crate) fn clear(&mut self) {
        *self = Self::default();
    }
}

fn generate_code() -> String {
    let upper = 10u32.pow(OTP_DIGITS);
    let value = rand::thread_rng().gen_range(0..upper);
    format!("{value:0width$}", width = OTP_DIGITS as usize)
}

pub(crate) fn hash_code(code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code.as_bytes());
    hex::encode(hasher.finalize())
}

/// Random password handed to accounts created by an admin without one.
pub(crate) fn generate_temporary_password() -> String {
    const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz23456789";
    let mut rng = rand::thread_rng();
    let mut password: String =
        (0..12).map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char).collect();
    password.push_str("#7");
    password
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    const NOW: PrimitiveDateTime = datetime!(2025-03-01 09:00);

    #[test]
    fn fifth_failure_locks_for_two_hours() {
        let policy = LockoutPolicy::default();
        let mut guard = LoginGuard::default();

        for _ in 0..4 {
            guard.record_failure(NOW, &policy);
            assert!(!guard.is_locked(NOW));
        }
        guard.record_failure(NOW, &policy);

        assert_eq!(guard.failed_attempts, 5);
        assert_eq!(guard.locked_until, Some(NOW + Duration::hours(2)));
        assert!(guard.is_locked(NOW + Duration::minutes(119)));
        assert!(!guard.is_locked(NOW + Duration::hours(2)));
    }

    #[test]
    fn failure_while_locked_keeps_original_deadline() {
        let policy = LockoutPolicy::default();
        let mut guard = LoginGuard {
            failed_attempts: 5,
            locked_until: Some(NOW + Duration::hours(1)),
            last_login_at: None,
        };

        guard.record_failure(NOW, &policy);

        assert_eq!(guard.failed_attempts, 6);
        assert_eq!(guard.locked_until, Some(NOW + Duration::hours(1)));
    }

    #[test]
    fn failure_after_expired_lock_restarts_count() {
        let policy = LockoutPolicy::default();
        let mut guard =
            LoginGuard { failed_attempts: 5, locked_until: Some(NOW), last_login_at: None };

        guard.record_failure(NOW + Duration::minutes(1), &policy);

        assert_eq!(guard.failed_attempts, 1);
        assert_eq!(guard.locked_until, None);
    }

    #[test]
    fn success_resets_counters() {
        let mut guard =
            LoginGuard { failed_attempts: 3, locked_until: None, last_login_at: None };
        guard.record_success(NOW);
        assert_eq!(guard.failed_attempts, 0);
        assert_eq!(guard.locked_until, None);
        assert_eq!(guard.last_login_at, Some(NOW));
    }

    #[test]
    fn issued_code_is_six_digits_and_stored_hashed() {
        let (code, slot) = OneTimeCode::issue(NOW, Duration::minutes(5));
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|ch| ch.is_ascii_digit()));
        assert_eq!(slot.code_hash.as_deref(), Some(hash_code(&code).as_str()));
        assert_eq!(slot.expires_at, Some(NOW + Duration::minutes(5)));
        assert_eq!(slot.attempts, 0);
    }

    #[test]
    fn verify_reports_errors_in_order() {
        let mut empty = OneTimeCode::default();
        assert_eq!(empty.verify("123456", NOW, 3), Err(OtpError::NoCode));

        let (code, mut slot) = OneTimeCode::issue(NOW, Duration::minutes(5));
        assert_eq!(slot.verify(&code, NOW + Duration::minutes(5), 3), Err(OtpError::Expired));

        slot.attempts = 3;
        assert_eq!(slot.verify(&code, NOW, 3), Err(OtpError::TooManyAttempts));
    }

    #[test]
    fn mismatch_counts_attempts_until_exhausted() {
        let (code, mut slot) = OneTimeCode::issue(NOW, Duration::minutes(5));
        let wrong = if code == "000000" { "000001" } else { "000000" };

        for expected_attempts in 1..=3 {
            assert_eq!(slot.verify(wrong, NOW, 3), Err(OtpError::Mismatch));
            assert_eq!(slot.attempts, expected_attempts);
        }
        assert_eq!(slot.verify(&code, NOW, 3), Err(OtpError::TooManyAttempts));
    }

    #[test]
    fn matching_code_verifies_and_clear_empties_slot() {
        let (code, mut slot) = OneTimeCode::issue(NOW, Duration::minutes(5));
        assert_eq!(slot.verify(&code, NOW + Duration::minutes(4), 3), Ok(()));
        slot.clear();
        assert_eq!(slot, OneTimeCode::default());
    }

    #[test]
    fn temporary_passwords_are_random() {
        let first = generate_temporary_password();
        assert_eq!(first.len(), 14);
        assert_ne!(first, generate_temporary_password());
    }
}
