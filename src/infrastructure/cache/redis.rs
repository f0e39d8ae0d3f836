//! Redis cache tier

use std::fmt;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};

use crate::domain::cache::{Cache, CacheKey};
use crate::domain::DomainError;

/// Default Redis URL when `REDIS_URL` is unset
pub const DEFAULT_REDIS_URL: &str = "redis://localhost:6379";

const DATA_FIELD: &str = "data";
const TIMESTAMP_FIELD: &str = "timestamp";

/// Configuration for Redis cache
#[derive(Debug, Clone)]
pub struct RedisCacheConfig {
    /// Redis connection URL (e.g., "redis://127.0.0.1:6379")
    pub url: String,
}

impl Default for RedisCacheConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_REDIS_URL.to_string(),
        }
    }
}

impl RedisCacheConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// Reads `REDIS_URL`, falling back to the local default
    pub fn from_env() -> Self {
        std::env::var("REDIS_URL")
            .map(Self::new)
            .unwrap_or_default()
    }
}

/// Shared cache tier in Redis
///
/// Each entry is a hash at the serialized cache key with a `data` field holding the value
/// and a `timestamp` field (epoch seconds) set on every write. Clones share one connection.
#[derive(Clone)]
pub struct RedisCache {
    connection: ConnectionManager,
    config: RedisCacheConfig,
}

impl fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisCache")
            .field("config", &self.config)
            .field("connection", &"<ConnectionManager>")
            .finish()
    }
}

impl RedisCache {
    /// Connects and probes the server with `PING`
    pub async fn connect(config: RedisCacheConfig) -> Result<Self, DomainError> {
        let client = Client::open(config.url.as_str())
            .map_err(|e| DomainError::cache(format!("Failed to create Redis client: {}", e)))?;

        let mut connection = ConnectionManager::new(client)
            .await
            .map_err(|e| DomainError::cache(format!("Failed to connect to Redis: {}", e)))?;

        let _: String = redis::cmd("PING")
            .query_async(&mut connection)
            .await
            .map_err(|e| DomainError::cache(format!("Redis did not answer PING: {}", e)))?;

        Ok(Self { connection, config })
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get_raw(&self, key: &CacheKey) -> Result<Option<String>, DomainError> {
        let json_key = key.to_json_key()?;
        let mut conn = self.connection.clone();

        let result: Option<String> = conn.hget(&json_key, DATA_FIELD).await.map_err(|e| {
            DomainError::cache(format!("Failed to get key '{}': {}", key.local_key(), e))
        })?;

        Ok(result)
    }

    async fn put_raw(&self, key: &CacheKey, value: &str) -> Result<(), DomainError> {
        let json_key = key.to_json_key()?;
        let mut conn = self.connection.clone();
        let timestamp = chrono::Utc::now().timestamp();

        let _: () = conn
            .hset_multiple(
                &json_key,
                &[
                    (DATA_FIELD, value.to_string()),
                    (TIMESTAMP_FIELD, timestamp.to_string()),
                ],
            )
            .await
            .map_err(|e| {
                DomainError::cache(format!("Failed to set key '{}': {}", key.local_key(), e))
            })?;

        Ok(())
    }

    async fn flush(&self) -> Result<(), DomainError> {
        // Writes are durable on the server
        Ok(())
    }
}
