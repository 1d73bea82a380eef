use anyhow::{anyhow, Result};
use redis::AsyncCommands;
use uuid::Uuid;

use crate::infra::cache::RedisCache;

/// Server-side sessions: an opaque token in the cookie, the user id in Redis.
#[derive(Clone)]
pub struct SessionStore {
    cache: RedisCache,
    ttl_seconds: u64,
}

impl SessionStore {
    pub fn new(cache: RedisCache, ttl_seconds: u64) -> Self {
        Self { cache, ttl_seconds }
    }

    pub fn ttl_seconds(&self) -> u64 {
        self.ttl_seconds
    }

    pub async fn create(&self, user_id: i32) -> Result<String> {
        let token = Uuid::new_v4().simple().to_string();
        let mut conn = self.cache.connection().await?;
        conn.set_ex::<_, _, ()>(session_key(&token), user_id, self.ttl_seconds)
            .await?;
        Ok(token)
    }

    pub async fn user_id(&self, token: &str) -> Result<Option<i32>> {
        if !is_well_formed(token) {
            return Ok(None);
        }
        let mut conn = self.cache.connection().await?;
        let value: Option<String> = conn.get(session_key(token)).await?;
        value
            .map(|raw| {
                raw.parse::<i32>()
                    .map_err(|err| anyhow!("corrupt session entry: {}", err))
            })
            .transpose()
    }

    pub async fn destroy(&self, token: &str) -> Result<bool> {
        if !is_well_formed(token) {
            return Ok(false);
        }
        let mut conn = self.cache.connection().await?;
        let removed: u32 = conn.del(session_key(token)).await?;
        Ok(removed > 0)
    }
}

fn session_key(token: &str) -> String {
    format!("session:{}", token)
}

fn is_well_formed(token: &str) -> bool {
    token.len() == 32 && token.bytes().all(|b| b.is_ascii_hexdigit())
}
