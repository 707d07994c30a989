use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;
use tracing::warn;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window_secs: u64,
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        // 100 requests per 15 minutes
        Self {
            max_requests: 100,
            window_secs: 15 * 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    /// Only origin allowed by CORS; credentials are allowed for it.
    pub frontend_url: String,
    pub jwt: JwtConfig,
    /// Marks session cookies `Secure` and `SameSite=None`.
    pub cookie_secure: bool,
    /// Take the client address from the right-most `X-Forwarded-For` entry.
    pub trust_proxy: bool,
    pub rate_limit: RateLimitConfig,
    /// Legacy contract: listing a user with no todos answers 404 instead of `[]`.
    pub empty_list_not_found: bool,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "taskboard".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "taskboard-users".into()),
            ttl_minutes: env_parse("JWT_TTL_MINUTES").unwrap_or(60),
            refresh_ttl_minutes: env_parse("JWT_REFRESH_TTL_MINUTES").unwrap_or(60 * 24 * 14),
        };
        let defaults = RateLimitConfig::default();
        let rate_limit = RateLimitConfig {
            max_requests: env_parse("RATE_LIMIT_MAX").unwrap_or(defaults.max_requests),
            window_secs: env_parse("RATE_LIMIT_WINDOW_SECS").unwrap_or(defaults.window_secs),
        };
        Ok(Self {
            database_url,
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env_parse("PORT").unwrap_or(5000),
            frontend_url: std::env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".into()),
            jwt,
            cookie_secure: env_flag("COOKIE_SECURE"),
            trust_proxy: env_flag("TRUST_PROXY"),
            rate_limit,
            empty_list_not_found: env_flag("TODOS_EMPTY_IS_NOT_FOUND"),
        })
    }
}

/// `None` when unset; a value that does not parse is logged and treated as unset.
fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    parse_value(key, &std::env::var(key).ok()?)
}

fn parse_value<T: std::str::FromStr>(key: &str, raw: &str) -> Option<T> {
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(key, value = raw, "ignoring malformed setting, using default");
            None
        }
    }
}

fn env_flag(key: &str) -> bool {
    std::env::var(key)
        .map(|v| parse_flag(&v))
        .unwrap_or(false)
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
