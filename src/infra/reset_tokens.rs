use anyhow::Result;
use redis::AsyncCommands;

use crate::infra::cache::RedisCache;

/// Password-reset tokens, stored hashed and keyed by user id.
///
/// Entries expire on their own after the configured TTL; writing a new token
/// replaces whatever was there.
#[derive(Clone)]
pub struct ResetTokenStore {
    cache: RedisCache,
    ttl_seconds: u64,
}

impl ResetTokenStore {
    pub fn new(cache: RedisCache, ttl_seconds: u64) -> Self {
        Self { cache, ttl_seconds }
    }

    pub async fn replace(&self, user_id: i32, token_hash: &str) -> Result<()> {
        let mut conn = self.cache.connection().await?;
        conn.set_ex::<_, _, ()>(reset_key(user_id), token_hash, self.ttl_seconds)
            .await?;
        Ok(())
    }

    pub async fn get(&self, user_id: i32) -> Result<Option<String>> {
        let mut conn = self.cache.connection().await?;
        Ok(conn.get(reset_key(user_id)).await?)
    }

    pub async fn delete(&self, user_id: i32) -> Result<()> {
        let mut conn = self.cache.connection().await?;
        conn.del::<_, ()>(reset_key(user_id)).await?;
        Ok(())
    }
}

fn reset_key(user_id: i32) -> String {
    format!("reset-token:{}", user_id)
}
