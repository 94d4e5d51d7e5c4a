//! # Configuration
//!
//! Environment-driven service configuration. `.env` files are loaded by the
//! binary through dotenvy before [`Config::from_env`] is called.
//!
//! - **Version**: 1.2.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.2.0: Registration rate limit and stale pending-registration TTL
//! - 1.1.0: SMTP settings optional, dry-run notifier when unset
//! - 1.0.0: Initial release

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

/// SMTP relay settings. Present only when `SMTP_HOST` is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: String,
    pub host: String,
    pub port: u16,
    /// Route prefix, e.g. `/api/v1`. Empty means routes are mounted at the root.
    pub api_prefix: String,
    /// Externally reachable base URL used to build confirmation links.
    pub public_url: String,
    pub jwt_secret: String,
    pub token_ttl: Duration,
    pub reminder_interval: Duration,
    pub pending_registration_ttl: Duration,
    pub registration_rate_limit: usize,
    pub registration_rate_window: Duration,
    pub smtp: Option<SmtpConfig>,
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let host = get("HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let port = parse_or("PORT", get("PORT"), 8080u16)?;
        let public_url = get("PUBLIC_URL")
            .unwrap_or_else(|| format!("http://{host}:{port}"))
            .trim_end_matches('/')
            .to_string();
        let api_prefix = normalize_prefix(&get("API_PREFIX").unwrap_or_else(|| "/api/v1".into()));

        let jwt_secret = get("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;

        let smtp = match get("SMTP_HOST") {
            Some(smtp_host) => Some(SmtpConfig {
                host: smtp_host,
                port: parse_or("SMTP_PORT", get("SMTP_PORT"), 587u16)?,
                username: get("SMTP_USERNAME").ok_or(ConfigError::Missing("SMTP_USERNAME"))?,
                password: get("SMTP_PASSWORD").ok_or(ConfigError::Missing("SMTP_PASSWORD"))?,
                from: get("SMTP_FROM").ok_or(ConfigError::Missing("SMTP_FROM"))?,
            }),
            None => None,
        };

        let registration_rate_limit =
            parse_or("REGISTRATION_RATE_LIMIT", get("REGISTRATION_RATE_LIMIT"), 5usize)?;
        if registration_rate_limit == 0 {
            return Err(ConfigError::Invalid {
                key: "REGISTRATION_RATE_LIMIT",
                value: "0".into(),
            });
        }

        Ok(Config {
            database_path: get("DATABASE_PATH").unwrap_or_else(|| "reminder.db".to_string()),
            host,
            port,
            api_prefix,
            public_url,
            jwt_secret,
            token_ttl: secs("TOKEN_TTL_SECS", get("TOKEN_TTL_SECS"), 3600)?,
            reminder_interval: secs(
                "REMINDER_INTERVAL_SECS",
                get("REMINDER_INTERVAL_SECS"),
                86_400,
            )?,
            pending_registration_ttl: secs(
                "PENDING_REGISTRATION_TTL_SECS",
                get("PENDING_REGISTRATION_TTL_SECS"),
                86_400,
            )?,
            registration_rate_limit,
            registration_rate_window: secs(
                "REGISTRATION_RATE_WINDOW_SECS",
                get("REGISTRATION_RATE_WINDOW_SECS"),
                3600,
            )?,
            smtp,
            log_level: get("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Address the HTTP listener binds to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Base of the confirmation link, without the `?t=` query.
    pub fn confirm_url(&self) -> String {
        format!("{}{}/users/confirm-email", self.public_url, self.api_prefix)
    }
}

fn normalize_prefix(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

fn parse_or<T: std::str::FromStr>(
    key: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}

fn secs(key: &'static str, raw: Option<String>, default: u64) -> Result<Duration, ConfigError> {
    let value = parse_or(key, raw.clone(), default)?;
    if value == 0 {
        return Err(ConfigError::Invalid {
            key,
            value: raw.unwrap_or_default(),
        });
    }
    Ok(Duration::from_secs(value))
}
