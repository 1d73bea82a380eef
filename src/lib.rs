pub mod app;
pub mod config;
pub mod domain;
pub mod graphql;
pub mod http;
pub mod infra;

use std::sync::Arc;

use crate::app::votes::RetryPolicy;
use crate::config::AppConfig;
use crate::infra::mailer::Mailer;
use crate::infra::reset_tokens::ResetTokenStore;
use crate::infra::sessions::SessionStore;
use crate::infra::{cache::RedisCache, db::Db};

#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub cache: RedisCache,
    pub sessions: SessionStore,
    pub reset_tokens: ResetTokenStore,
    pub mailer: Arc<dyn Mailer>,
    pub session_cookie_name: String,
    pub cookie_secure: bool,
    pub cors_origins: Vec<String>,
    pub reset_link_base: String,
    pub vote_retry: RetryPolicy,
    pub vote_lock_timeout_ms: u64,
    pub posts_page_max: i64,
}

impl AppState {
    pub fn new(config: &AppConfig, db: Db, cache: RedisCache, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            sessions: SessionStore::new(cache.clone(), config.session_ttl_seconds),
            reset_tokens: ResetTokenStore::new(cache.clone(), config.reset_token_ttl_seconds),
            db,
            cache,
            mailer,
            session_cookie_name: config.session_cookie_name.clone(),
            cookie_secure: config.cookie_secure,
            cors_origins: config.cors_origins.clone(),
            reset_link_base: config.reset_link_base.clone(),
            vote_retry: config.vote_retry_policy(),
            vote_lock_timeout_ms: config.vote_lock_timeout_ms,
            posts_page_max: config.posts_page_max,
        }
    }
}
