//! Outbound account notifications.
//!
//! Delivery is best effort: callers log a failed send and carry on with the
//! write that triggered it.

use async_trait::async_trait;

use crate::core::config::Environment;
use crate::services::account_security::OtpPurpose;

#[async_trait]
pub(crate) trait Notifier: Send + Sync {
    async fn send_otp(
        &self,
        email: &str,
        name: &str,
        purpose: OtpPurpose,
        code: &str,
    ) -> anyhow::Result<()>;

    async fn send_temporary_password(
        &self,
        email: &str,
        name: &str,
        password: &str,
    ) -> anyhow::Result<()>;

    async fn send_password_changed(&self, email: &str, name: &str) -> anyhow::Result<()>;
}

/// Writes notifications to the log; secrets are only included outside production.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LogNotifier {
    environment: Environment,
}

impl LogNotifier {
    pub(crate) fn new(environment: Environment) -> Self {
        Self { environment }
    }

    fn reveal<'a>(&self, secret: &'a str) -> &'a str {
        if self.environment.is_production() {
            "<redacted>"
        } else {
            secret
        }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_otp(
        &self,
        email: &str,
        name: &str,
        purpose: OtpPurpose,
        code: &str,
    ) -> anyhow::Result<()> {
        tracing::info!(
            email,
            name,
            purpose = purpose.as_str(),
            code = self.reveal(code),
            "Verification code issued"
        );
        Ok(())
    }

    async fn send_temporary_password(
        &self,
        email: &str,
        name: &str,
        password: &str,
    ) -> anyhow::Result<()> {
        tracing::info!(email, name, password = self.reveal(password), "Temporary password issued");
        Ok(())
    }

    async fn send_password_changed(&self, email: &str, name: &str) -> anyhow::Result<()> {
        tracing::info!(email, name, "Password changed notification");
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Records every message so tests can read back delivered codes.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingNotifier {
        pub(crate) sent: Mutex<Vec<(String, String)>>,
    }

    impl RecordingNotifier {
        pub(crate) fn last_secret_for(&self, email: &str) -> Option<String> {
            let sent = self.sent.lock().ok()?;
            sent.iter().rev().find(|(to, _)| to == email).map(|(_, secret)| secret.clone())
        }

        fn push(&self, email: &str, secret: &str) {
            if let Ok(mut sent) = self.sent.lock() {
                sent.push((email.to_string(), secret.to_string()));
            }
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send_otp(
            &self,
            email: &str,
            _name: &str,
            _purpose: OtpPurpose,
            code: &str,
        ) -> anyhow::Result<()> {
            self.push(email, code);
            Ok(())
        }

        async fn send_temporary_password(
            &self,
            email: &str,
            _name: &str,
            password: &str,
        ) -> anyhow::Result<()> {
            self.push(email, password);
            Ok(())
        }

        async fn send_password_changed(&self, _email: &str, _name: &str) -> anyhow::Result<()> {
            Ok(())
        }
    }
}
