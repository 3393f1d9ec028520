//! Redis-backed cache tag invalidation.
//!
//! Each tag maps to a counter at `{prefix}:{tag}`. Invalidating a tag bumps
//! its counter; cache entries stamped with an older value are stale.

use alias_core::CacheInvalidator;
use async_trait::async_trait;
use errors::StorageError;
use redis::AsyncCommands;
use tracing::debug;

const BACKEND: &str = "Redis";
const DEFAULT_PREFIX: &str = "cache_tags";

pub struct RedisTagInvalidator {
    connection_manager: redis::aio::ConnectionManager,
    prefix: String,
}

impl RedisTagInvalidator {
    pub async fn new(connection_string: &str) -> Result<Self, StorageError> {
        let client = redis::Client::open(connection_string)
            .map_err(|e| StorageError::connection(BACKEND, e.to_string()))?;

        let connection_manager = client
            .get_connection_manager()
            .await
            .map_err(|e| StorageError::connection(BACKEND, e.to_string()))?;

        Ok(Self {
            connection_manager,
            prefix: DEFAULT_PREFIX.to_string(),
        })
    }

    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn tag_key(&self, tag: &str) -> String {
        format!("{}:{}", self.prefix, tag)
    }

    /// Current invalidation counter of a tag; zero when never invalidated.
    pub async fn tag_version(&self, tag: &str) -> Result<u64, StorageError> {
        let mut conn = self.connection_manager.clone();
        let version: Option<u64> = conn
            .get(self.tag_key(tag))
            .await
            .map_err(|e| StorageError::query(BACKEND, e.to_string()))?;
        Ok(version.unwrap_or(0))
    }
}

#[async_trait]
impl CacheInvalidator for RedisTagInvalidator {
    async fn invalidate_tags(&self, tags: &[&str]) -> Result<(), StorageError> {
        let mut conn = self.connection_manager.clone();
        for tag in tags {
            let version: u64 = conn
                .incr(self.tag_key(tag), 1)
                .await
                .map_err(|e| StorageError::query(BACKEND, e.to_string()))?;
            debug!("Invalidated cache tag {} (version {})", tag, version);
        }
        Ok(())
    }
}
