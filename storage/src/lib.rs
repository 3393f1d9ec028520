//! # Storage Layer
//!
//! Alias backends (in-memory, PostgreSQL), Redis cache tag invalidation and
//! save-event publishers.

pub mod events;
pub mod memory;
pub mod postgres;
pub mod redis;

use std::sync::Arc;

use alias_core::{AliasBackend, CacheInvalidator};
use config::{CacheConfig, StorageConfig};
use errors::StorageError;
use tracing::info;

pub use events::{BroadcastSaveHook, RedisStreamSaveHook};
pub use memory::InMemoryAliasBackend;
pub use postgres::PostgresAliasBackend;
pub use redis::RedisTagInvalidator;

/// Build the alias backend named by `storage.backend`.
pub async fn connect_backend(config: &StorageConfig) -> Result<Arc<dyn AliasBackend>, StorageError> {
    match config.backend.as_str() {
        "memory" => {
            info!("Using in-memory alias backend");
            Ok(Arc::new(InMemoryAliasBackend::new()))
        }
        "postgres" => Ok(Arc::new(
            PostgresAliasBackend::connect(&config.postgres).await?
        )),
        other => Err(StorageError::connection(
            other,
            "unsupported alias backend".to_string()
        ))
    }
}

/// Redis tag invalidation when `cache.redis_url` is set.
pub async fn connect_invalidator(
    config: &CacheConfig
) -> Result<Option<Arc<dyn CacheInvalidator>>, StorageError> {
    match &config.redis_url {
        Some(url) => Ok(Some(Arc::new(RedisTagInvalidator::new(url).await?))),
        None => Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_memory_backend() {
        let backend = connect_backend(&StorageConfig::default()).await.unwrap();
        assert!(!backend.ensure_schema().await.unwrap());
    }

    #[tokio::test]
    async fn test_connect_unknown_backend_fails() {
        let config = StorageConfig {
            backend: "sqlite".to_string(),
            ..StorageConfig::default()
        };
        assert!(connect_backend(&config).await.is_err());
    }

    #[tokio::test]
    async fn test_no_invalidator_without_redis_url() {
        let invalidator = connect_invalidator(&CacheConfig::default()).await.unwrap();
        assert!(invalidator.is_none());
    }
}
