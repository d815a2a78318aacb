use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands};

use crate::{error::StoreError, models::session::Session};

/// Server-side session records keyed by a derived store key.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Stores `session` under `key` for `ttl_secs`.
    async fn insert(&self, key: &str, session: &Session, ttl_secs: u64) -> Result<(), StoreError>;

    /// Loads the session stored under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<Session>, StoreError>;

    /// Rewrites the session with a new expiry and TTL.
    async fn touch(&self, key: &str, session: &Session, ttl_secs: u64) -> Result<(), StoreError>;

    /// Deletes the session. Deleting a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
}

fn redis_key(key: &str) -> String {
    format!("session:{}", key)
}

/// [`SessionStore`] backed by Redis with native key expiry.
#[derive(Clone)]
pub struct RedisSessionStore {
    redis: ConnectionManager,
}

impl RedisSessionStore {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn insert(&self, key: &str, session: &Session, ttl_secs: u64) -> Result<(), StoreError> {
        let session_json = sonic_rs::to_string(session)
            .map_err(|e| StoreError::Serialization(format!("Session serialization failed: {}", e)))?;

        let mut redis = self.redis.clone();
        let _: () = redis
            .set_ex(redis_key(key), &session_json, ttl_secs.max(1))
            .await
            .map_err(|e| {
                tracing::error!("Redis set_ex failed: {}", e);
                StoreError::Redis(e)
            })?;

        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Session>, StoreError> {
        let mut redis = self.redis.clone();
        let session_json: Option<String> = redis.get(redis_key(key)).await?;

        session_json
            .map(|json| {
                sonic_rs::from_str::<Session>(&json)
                    .map_err(|e| StoreError::Serialization(format!("Invalid session JSON: {}", e)))
            })
            .transpose()
    }

    async fn touch(&self, key: &str, session: &Session, ttl_secs: u64) -> Result<(), StoreError> {
        self.insert(key, session, ttl_secs).await
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut redis = self.redis.clone();
        let _: () = redis.del(redis_key(key)).await?;
        Ok(())
    }
}
