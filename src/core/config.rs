use std::{env, fs, path::PathBuf, time::Duration as StdDuration};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;

const DEFAULT_CORS_ORIGINS: &[&str] =
    &["http://localhost:5173", "http://localhost:3000", "http://localhost:8080"];

#[derive(Debug, Clone)]
pub(crate) struct Settings {
    server: ServerSettings,
    runtime: RuntimeSettings,
    api: ApiSettings,
    security: SecuritySettings,
    cors: CorsSettings,
    database: DatabaseSettings,
    redis: RedisSettings,
    quiz: QuizSettings,
    admin: AdminSettings,
    telemetry: TelemetrySettings,
}

#[derive(Debug, Clone)]
pub(crate) struct ServerSettings {
    host: ServerHost,
    port: ServerPort,
}

#[derive(Debug, Clone)]
pub(crate) struct ApiSettings {
    pub(crate) project_name: String,
    pub(crate) api_v1_str: String,
}

#[derive(Debug, Clone)]
pub(crate) struct SecuritySettings {
    pub(crate) secret_key: String,
    pub(crate) algorithm: String,
    pub(crate) access_token_expire_minutes: u64,
    pub(crate) refresh_token_expire_minutes: u64,
    pub(crate) reset_token_expire_minutes: u64,
    pub(crate) max_failed_logins: u32,
    pub(crate) lockout_minutes: u64,
    pub(crate) otp_expire_minutes: u64,
    pub(crate) otp_max_attempts: u32,
    pub(crate) auth_rate_limit: u64,
    pub(crate) auth_rate_window_seconds: u64,
}

#[derive(Debug, Clone)]
pub(crate) struct CorsSettings {
    pub(crate) origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct DatabaseSettings {
    pub(crate) postgres_server: String,
    pub(crate) postgres_port: u16,
    pub(crate) postgres_user: String,
    pub(crate) postgres_password: String,
    pub(crate) postgres_db: String,
    pub(crate) database_url: Option<String>,
    pub(crate) max_connections: u32,
}

#[derive(Debug, Clone)]
pub(crate) struct RedisSettings {
    pub(crate) host: String,
    pub(crate) port: u16,
    pub(crate) db: u16,
    pub(crate) password: String,
}

#[derive(Debug, Clone)]
pub(crate) struct QuizSettings {
    pub(crate) status_interval_seconds: u64,
    pub(crate) scheduler_enabled: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct AdminSettings {
    pub(crate) first_admin_email: String,
    pub(crate) first_admin_password: String,
    pub(crate) first_admin_name: String,
}

#[derive(Debug, Clone)]
pub(crate) struct TelemetrySettings {
    pub(crate) log_level: String,
    pub(crate) json: bool,
    pub(crate) prometheus_enabled: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct RuntimeSettings {
    pub(crate) environment: Environment,
    pub(crate) strict_config: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Environment {
    Development,
    Production,
    Staging,
    Test,
}

impl Environment {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
            Environment::Staging => "staging",
            Environment::Test => "test",
        }
    }

    pub(crate) fn is_production(self) -> bool {
        matches!(self, Environment::Production)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ServerHost(String);

#[derive(Debug, Clone, Copy)]
pub(crate) struct ServerPort(u16);

#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error("invalid server host: {0}")]
    InvalidHost(String),
    #[error("invalid server port: {0}")]
    InvalidPort(String),
    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },
    #[error("invalid cors origins: {0}")]
    InvalidCors(String),
    #[error("missing required secret for {0}")]
    MissingSecret(&'static str),
}

impl Settings {
    pub(crate) fn load() -> Result<Self, ConfigError> {
        let host = env_or_default("QUIZORA_HOST", "0.0.0.0");
        let port = env_or_default("QUIZORA_PORT", "8000");

        let environment = parse_environment(
            env_optional("QUIZORA_ENV").or_else(|| env_optional("ENVIRONMENT")),
        );
        let strict_config =
            env_optional("QUIZORA_STRICT_CONFIG").map(|value| parse_bool(&value)).unwrap_or(false)
                || environment.is_production();

        let project_name = env_or_default("PROJECT_NAME", "Quizora API");
        let api_v1_str = env_or_default("API_V1_STR", "/api/v1");

        let secret_key = match env_optional("SECRET_KEY") {
            Some(value) => value,
            None => {
                if strict_config {
                    return Err(ConfigError::MissingSecret("SECRET_KEY"));
                }
                load_or_create_secret_key()
            }
        };
        let algorithm = env_or_default("ALGORITHM", "HS256");
        let access_token_expire_minutes = parse_u64(
            "ACCESS_TOKEN_EXPIRE_MINUTES",
            env_or_default("ACCESS_TOKEN_EXPIRE_MINUTES", "60"),
        )?;
        let refresh_token_expire_minutes = parse_u64(
            "REFRESH_TOKEN_EXPIRE_MINUTES",
            env_or_default("REFRESH_TOKEN_EXPIRE_MINUTES", "10080"),
        )?;
        let reset_token_expire_minutes = parse_u64(
            "RESET_TOKEN_EXPIRE_MINUTES",
            env_or_default("RESET_TOKEN_EXPIRE_MINUTES", "10"),
        )?;
        let max_failed_logins =
            parse_u32("MAX_FAILED_LOGINS", env_or_default("MAX_FAILED_LOGINS", "5"))?;
        let lockout_minutes =
            parse_u64("LOCKOUT_MINUTES", env_or_default("LOCKOUT_MINUTES", "120"))?;
        let otp_expire_minutes =
            parse_u64("OTP_EXPIRE_MINUTES", env_or_default("OTP_EXPIRE_MINUTES", "5"))?;
        let otp_max_attempts =
            parse_u32("OTP_MAX_ATTEMPTS", env_or_default("OTP_MAX_ATTEMPTS", "3"))?;
        let auth_rate_limit =
            parse_u64("AUTH_RATE_LIMIT", env_or_default("AUTH_RATE_LIMIT", "10"))?;
        let auth_rate_window_seconds = parse_u64(
            "AUTH_RATE_WINDOW_SECONDS",
            env_or_default("AUTH_RATE_WINDOW_SECONDS", "60"),
        )?;

        let cors_origins = parse_cors_origins(env_optional("BACKEND_CORS_ORIGINS"))?;

        let postgres_server = env_or_default("POSTGRES_SERVER", "localhost");
        let postgres_port = parse_u16("POSTGRES_PORT", env_or_default("POSTGRES_PORT", "5432"))?;
        let postgres_user = env_or_default("POSTGRES_USER", "quizora");
        let postgres_password = env_or_default("POSTGRES_PASSWORD", "");
        let postgres_db = env_or_default("POSTGRES_DB", "quizora");
        let database_url = env_optional("DATABASE_URL");
        let max_connections =
            parse_u32("DATABASE_MAX_CONNECTIONS", env_or_default("DATABASE_MAX_CONNECTIONS", "20"))?;

        let redis_host = env_or_default("REDIS_HOST", "localhost");
        let redis_port = parse_u16("REDIS_PORT", env_or_default("REDIS_PORT", "6379"))?;
        let redis_db = parse_u16("REDIS_DB", env_or_default("REDIS_DB", "0"))?;
        let redis_password = env_or_default("REDIS_PASSWORD", "");

        let status_interval_seconds = parse_u64(
            "QUIZ_STATUS_INTERVAL_SECONDS",
            env_or_default("QUIZ_STATUS_INTERVAL_SECONDS", "60"),
        )?;
        let scheduler_enabled =
            env_optional("QUIZ_SCHEDULER_ENABLED").map(|value| parse_bool(&value)).unwrap_or(true);

        let first_admin_email = env_or_default("FIRST_ADMIN_EMAIL", "admin@quizora.local");
        let first_admin_password = env_or_default("FIRST_ADMIN_PASSWORD", "");
        let first_admin_name = env_or_default("FIRST_ADMIN_NAME", "Quizora Admin");

        let log_level = env_or_default("QUIZORA_LOG_LEVEL", "info");
        let json = env_optional("QUIZORA_LOG_JSON").map(|value| parse_bool(&value)).unwrap_or(false);
        let prometheus_enabled =
            env_optional("PROMETHEUS_ENABLED").map(|value| parse_bool(&value)).unwrap_or(false);

        let settings = Self {
            server: ServerSettings {
                host: ServerHost::parse(host)?,
                port: ServerPort::parse(port)?,
            },
            runtime: RuntimeSettings { environment, strict_config },
            api: ApiSettings { project_name, api_v1_str },
            security: SecuritySettings {
                secret_key,
                algorithm,
                access_token_expire_minutes,
                refresh_token_expire_minutes,
                reset_token_expire_minutes,
                max_failed_logins,
                lockout_minutes,
                otp_expire_minutes,
                otp_max_attempts,
                auth_rate_limit,
                auth_rate_window_seconds,
            },
            cors: CorsSettings { origins: cors_origins },
            database: DatabaseSettings {
                postgres_server,
                postgres_port,
                postgres_user,
                postgres_password,
                postgres_db,
                database_url,
                max_connections,
            },
            redis: RedisSettings {
                host: redis_host,
                port: redis_port,
                db: redis_db,
                password: redis_password,
            },
            quiz: QuizSettings { status_interval_seconds, scheduler_enabled },
            admin: AdminSettings { first_admin_email, first_admin_password, first_admin_name },
            telemetry: TelemetrySettings { log_level, json, prometheus_enabled },
        };

        settings.validate()?;

        Ok(settings)
    }

    pub(crate) fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host.0, self.server.port.0)
    }

    pub(crate) fn server_host(&self) -> &str {
        &self.server.host.0
    }

    pub(crate) fn server_port(&self) -> u16 {
        self.server.port.0
    }

    pub(crate) fn api(&self) -> &ApiSettings {
        &self.api
    }

    pub(crate) fn security(&self) -> &SecuritySettings {
        &self.security
    }

    pub(crate) fn cors(&self) -> &CorsSettings {
        &self.cors
    }

    pub(crate) fn database(&self) -> &DatabaseSettings {
        &self.database
    }

    pub(crate) fn redis(&self) -> &RedisSettings {
        &self.redis
    }

    pub(crate) fn quiz(&self) -> &QuizSettings {
        &self.quiz
    }

    pub(crate) fn admin(&self) -> &AdminSettings {
        &self.admin
    }

    pub(crate) fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }

    pub(crate) fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.security.max_failed_logins == 0 {
            return Err(ConfigError::InvalidValue {
                field: "MAX_FAILED_LOGINS",
                value: String::from("0"),
            });
        }
        if self.security.otp_max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "OTP_MAX_ATTEMPTS",
                value: String::from("0"),
            });
        }
        if self.quiz.status_interval_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "QUIZ_STATUS_INTERVAL_SECONDS",
                value: String::from("0"),
            });
        }

        if !self.runtime.strict_config {
            return Ok(());
        }

        if self.database.database_url.is_none() && self.database.postgres_password.is_empty() {
            return Err(ConfigError::MissingSecret("POSTGRES_PASSWORD"));
        }

        if self.admin.first_admin_password.is_empty() {
            return Err(ConfigError::MissingSecret("FIRST_ADMIN_PASSWORD"));
        }

        Ok(())
    }
}

#[cfg(test)]
impl Settings {
    /// Deterministic settings that do not read the process environment.
    pub(crate) fn for_tests() -> Self {
        Self {
            server: ServerSettings {
                host: ServerHost("127.0.0.1".to_string()),
                port: ServerPort(8000),
            },
            runtime: RuntimeSettings { environment: Environment::Test, strict_config: false },
            api: ApiSettings {
                project_name: "Quizora API".to_string(),
                api_v1_str: "/api/v1".to_string(),
            },
            security: SecuritySettings {
                secret_key: "test-secret".to_string(),
                algorithm: "HS256".to_string(),
                access_token_expire_minutes: 60,
                refresh_token_expire_minutes: 10080,
                reset_token_expire_minutes: 10,
                max_failed_logins: 5,
                lockout_minutes: 120,
                otp_expire_minutes: 5,
                otp_max_attempts: 3,
                auth_rate_limit: 10,
                auth_rate_window_seconds: 60,
            },
            cors: CorsSettings { origins: Vec::new() },
            database: DatabaseSettings {
                postgres_server: "localhost".to_string(),
                postgres_port: 5432,
                postgres_user: "quizora_test".to_string(),
                postgres_password: "quizora_test".to_string(),
                postgres_db: "quizora_test".to_string(),
                database_url: std::env::var("QUIZORA_TEST_DATABASE_URL").ok(),
                max_connections: 5,
            },
            redis: RedisSettings {
                host: "127.0.0.1".to_string(),
                port: 6379,
                db: 1,
                password: String::new(),
            },
            quiz: QuizSettings { status_interval_seconds: 60, scheduler_enabled: false },
            admin: AdminSettings {
                first_admin_email: "admin@quizora.test".to_string(),
                first_admin_password: String::new(),
                first_admin_name: "Test Admin".to_string(),
            },
            telemetry: TelemetrySettings {
                log_level: "warn".to_string(),
                json: false,
                prometheus_enabled: false,
            },
        }
    }

    pub(crate) fn with_admin_password(mut self, password: &str) -> Self {
        self.admin.first_admin_password = password.to_string();
        self
    }
}

impl SecuritySettings {
    pub(crate) fn lockout_duration(&self) -> time::Duration {
        time::Duration::minutes(self.lockout_minutes as i64)
    }

    pub(crate) fn otp_ttl(&self) -> time::Duration {
        time::Duration::minutes(self.otp_expire_minutes as i64)
    }
}

impl QuizSettings {
    pub(crate) fn status_interval(&self) -> StdDuration {
        StdDuration::from_secs(self.status_interval_seconds)
    }
}

impl DatabaseSettings {
    pub(crate) fn database_url(&self) -> String {
        if let Some(url) = &self.database_url {
            return url.clone();
        }
        format!(
            "postgresql://{}:{}@{}:{}/{}",
            self.postgres_user,
            self.postgres_password,
            self.postgres_server,
            self.postgres_port,
            self.postgres_db
        )
    }
}

impl RedisSettings {
    pub(crate) fn redis_url(&self) -> String {
        if self.password.is_empty() {
            format!("redis://{}:{}/{}", self.host, self.port, self.db)
        } else {
            format!("redis://:{}@{}:{}/{}", self.password, self.host, self.port, self.db)
        }
    }
}

impl ServerHost {
    fn parse(value: String) -> Result<Self, ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::InvalidHost(value));
        }
        Ok(Self(value))
    }
}

impl ServerPort {
    fn parse(value: String) -> Result<Self, ConfigError> {
        let parsed: u16 = value.parse().map_err(|_| ConfigError::InvalidPort(value.clone()))?;
        if parsed == 0 {
            return Err(ConfigError::InvalidPort(value));
        }
        Ok(Self(parsed))
    }
}

fn env_optional(key: &str) -> Option<String> {
    env::var(key).ok().map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

fn env_or_default(key: &str, default: &str) -> String {
    env_optional(key).unwrap_or_else(|| default.to_string())
}

fn parse_u16(field: &'static str, value: String) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidValue { field, value })
}

fn parse_u32(field: &'static str, value: String) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidValue { field, value })
}

fn parse_u64(field: &'static str, value: String) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidValue { field, value })
}

fn parse_cors_origins(value: Option<String>) -> Result<Vec<String>, ConfigError> {
    let defaults = || DEFAULT_CORS_ORIGINS.iter().map(|item| item.to_string()).collect();

    let Some(raw) = value else {
        return Ok(defaults());
    };

    if raw.trim_start().starts_with('[') {
        let parsed: Vec<String> =
            serde_json::from_str(&raw).map_err(|_| ConfigError::InvalidCors(raw.clone()))?;
        if parsed.is_empty() {
            return Ok(defaults());
        }
        return Ok(parsed);
    }

    let items: Vec<String> = raw
        .split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect();

    if items.is_empty() {
        return Ok(defaults());
    }

    Ok(items)
}

fn parse_bool(value: &str) -> bool {
    matches!(value, "1" | "true" | "TRUE" | "yes" | "YES" | "on" | "ON")
}

fn parse_environment(value: Option<String>) -> Environment {
    match value.as_deref().map(|val| val.to_lowercase()) {
        Some(ref val) if val == "production" || val == "prod" => Environment::Production,
        Some(ref val) if val == "staging" => Environment::Staging,
        Some(ref val) if val == "test" || val == "testing" => Environment::Test,
        _ => Environment::Development,
    }
}

fn load_or_create_secret_key() -> String {
    let path = secret_file_path();

    if let Ok(value) = fs::read_to_string(&path) {
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let new_key = generate_secret_key();

    match fs::OpenOptions::new().write(true).create_new(true).open(&path) {
        Ok(mut file) => {
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if let Err(err) = file.set_permissions(fs::Permissions::from_mode(0o600)) {
                    tracing::warn!(error = %err, path = %path.display(), "Failed to set secret key file permissions");
                }
            }
            if let Err(err) = std::io::Write::write_all(&mut file, new_key.as_bytes()) {
                tracing::warn!(error = %err, path = %path.display(), "Failed to write secret key file");
            }
            return new_key;
        }
        Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
            if let Ok(value) = fs::read_to_string(&path) {
                let trimmed = value.trim();
                if !trimmed.is_empty() {
                    return trimmed.to_string();
                }
            }
        }
        Err(err) => {
            tracing::warn!(error = %err, path = %path.display(), "Failed to create secret key file");
        }
    }

    new_key
}

fn generate_secret_key() -> String {
    let mut bytes = [0u8; 64];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn secret_file_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join(".secret_key")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_cors_origins_json() {
        let raw = "[\"http://a\",\"http://b\"]".to_string();
        let parsed = parse_cors_origins(Some(raw)).expect("cors json");
        assert_eq!(parsed, vec!["http://a".to_string(), "http://b".to_string()]);
    }

    #[test]
    fn parse_cors_origins_csv() {
        let raw = "http://a, http://b".to_string();
        let parsed = parse_cors_origins(Some(raw)).expect("cors csv");
        assert_eq!(parsed, vec!["http://a".to_string(), "http://b".to_string()]);
    }

    #[test]
    fn parse_cors_origins_rejects_broken_json() {
        let raw = "[\"http://a\"".to_string();
        assert!(matches!(parse_cors_origins(Some(raw)), Err(ConfigError::InvalidCors(_))));
    }

    #[test]
    fn parse_bool_variants() {
        assert!(parse_bool("1"));
        assert!(parse_bool("true"));
        assert!(parse_bool("yes"));
        assert!(parse_bool("on"));
        assert!(!parse_bool("false"));
        assert!(!parse_bool("0"));
    }

    #[test]
    fn parse_environment_variants() {
        assert_eq!(parse_environment(Some("prod".to_string())), Environment::Production);
        assert_eq!(parse_environment(Some("staging".to_string())), Environment::Staging);
        assert_eq!(parse_environment(Some("testing".to_string())), Environment::Test);
        assert_eq!(parse_environment(None), Environment::Development);
    }

    #[test]
    fn server_port_rejects_zero() {
        assert!(matches!(ServerPort::parse("0".to_string()), Err(ConfigError::InvalidPort(_))));
        assert!(ServerPort::parse("8000".to_string()).is_ok());
    }
}
