use anyhow::{anyhow, Result};
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::app::votes::RetryPolicy;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub http_addr: String,
    pub app_mode: String,
    pub database_url: String,
    pub redis_url: String,
    pub db_max_connections: u32,
    pub db_connect_timeout_seconds: u64,
    pub db_idle_timeout_seconds: u64,
    pub db_max_lifetime_seconds: u64,
    pub session_cookie_name: String,
    pub session_ttl_seconds: u64,
    pub cookie_secure: bool,
    pub cors_origins: Vec<String>,
    pub reset_token_ttl_seconds: u64,
    pub reset_link_base: String,
    pub vote_max_attempts: u32,
    pub vote_initial_backoff_ms: u64,
    pub vote_max_backoff_ms: u64,
    pub vote_lock_timeout_ms: u64,
    pub posts_page_max: i64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let http_addr = env_or("HTTP_ADDR", "0.0.0.0:4000");
        let _parsed_http_addr = SocketAddr::from_str(&http_addr)
            .map_err(|err| anyhow!("invalid HTTP_ADDR: {}", err))?;

        let cors_origins = env_or(
            "CORS_ORIGINS",
            "https://studio.apollographql.com,http://localhost:3000",
        )
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(String::from)
        .collect();

        let posts_page_max: i64 = env_or_parse("POSTS_PAGE_MAX", "10")?;
        if posts_page_max < 1 {
            return Err(anyhow!("invalid POSTS_PAGE_MAX: must be at least 1"));
        }

        Ok(Self {
            http_addr,
            app_mode: env_or("APP_MODE", "api"),
            database_url: env_or_err("DATABASE_URL")?,
            redis_url: env_or("REDIS_URL", "redis://127.0.0.1/"),
            db_max_connections: env_or_parse("DB_MAX_CONNECTIONS", "25")?,
            db_connect_timeout_seconds: env_or_parse("DB_CONNECT_TIMEOUT_SECONDS", "5")?,
            db_idle_timeout_seconds: env_or_parse("DB_IDLE_TIMEOUT_SECONDS", "300")?,
            db_max_lifetime_seconds: env_or_parse("DB_MAX_LIFETIME_SECONDS", "1800")?,
            session_cookie_name: env_or("SESSION_COOKIE_NAME", "agora_sid"),
            session_ttl_seconds: env_or_parse("SESSION_TTL_SECONDS", "86400")?,
            cookie_secure: env_or_parse("COOKIE_SECURE", "false")?,
            cors_origins,
            reset_token_ttl_seconds: env_or_parse("RESET_TOKEN_TTL_SECONDS", "300")?,
            reset_link_base: env_or("RESET_LINK_BASE", "http://localhost:3000/change-password"),
            vote_max_attempts: env_or_parse("VOTE_MAX_ATTEMPTS", "5")?,
            vote_initial_backoff_ms: env_or_parse("VOTE_INITIAL_BACKOFF_MS", "20")?,
            vote_max_backoff_ms: env_or_parse("VOTE_MAX_BACKOFF_MS", "500")?,
            vote_lock_timeout_ms: env_or_parse("VOTE_LOCK_TIMEOUT_MS", "2000")?,
            posts_page_max,
        })
    }

    pub fn vote_retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.vote_max_attempts.max(1),
            initial_backoff: Duration::from_millis(self.vote_initial_backoff_ms),
            max_backoff: Duration::from_millis(self.vote_max_backoff_ms),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_or_err(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| anyhow!("missing required env var: {}", key))
}

fn env_or_parse<T>(key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    <T as FromStr>::Err: std::fmt::Display,
{
    let value = std::env::var(key).unwrap_or_else(|_| default.to_string());
    value
        .parse::<T>()
        .map_err(|err| anyhow!("invalid {}: {}", key, err))
}
