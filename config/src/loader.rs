//! # Environment Variable Loader
//!
//! Loads alias configuration from `CA_*` environment variables.

use std::env;

use crate::config::{
    AliasConfig, CacheConfig, ContextsConfig, ObservabilityConfig, PostgresConfig, StorageConfig,
    UniquifierConfig
};

/// Load configuration from environment variables.
///
/// Unset or unparseable variables fall back to the field default.
///
/// ## Usage
/// ```rust,no_run
/// use config::load_from_env;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = load_from_env()?;
///     println!("PostgreSQL host: {}", config.storage.postgres.host);
///     Ok(())
/// }
/// ```
///
/// ## Environment Variables
/// - `CA_STORAGE_BACKEND`: `memory` or `postgres` (default: "memory")
/// - `CA_PG_HOST`, `CA_PG_PORT`, `CA_PG_DATABASE`, `CA_PG_USERNAME`,
///   `CA_PG_PASSWORD`, `CA_PG_POOL_SIZE`, `CA_PG_TIMEOUT_SECONDS`
/// - `CA_REDIS_URL`: enables Redis tag invalidation (optional)
/// - `CA_ROUTE_MATCH_TAG`: cache tag invalidated on save (default:
///   "route_match")
/// - `CA_CURRENT_CONTEXT`: context of the running process (optional)
/// - `CA_UNIQUIFIER_SEPARATOR` (default: "-"), `CA_UNIQUIFIER_MAX_LENGTH`
///   (default: 255)
/// - `CA_LOG_LEVEL` (default: "info"), `CA_METRICS_ENABLED` (default: true)
pub fn load_from_env() -> Result<AliasConfig, Box<dyn std::error::Error>> {
    Ok(AliasConfig {
        storage: load_storage_from_env(),
        cache: load_cache_from_env(),
        uniquifier: load_uniquifier_from_env(),
        contexts: load_contexts_from_env(),
        observability: load_observability_from_env()
    })
}

fn load_storage_from_env() -> StorageConfig {
    let defaults = PostgresConfig::default();
    StorageConfig {
        backend: env::var("CA_STORAGE_BACKEND").unwrap_or_else(|_| "memory".to_string()),
        postgres: PostgresConfig {
            host: env::var("CA_PG_HOST").unwrap_or(defaults.host),
            port: parse_env("CA_PG_PORT").unwrap_or(defaults.port),
            database: env::var("CA_PG_DATABASE").unwrap_or(defaults.database),
            username: env::var("CA_PG_USERNAME").unwrap_or(defaults.username),
            password: env::var("CA_PG_PASSWORD").unwrap_or_default(),
            pool_size: parse_env("CA_PG_POOL_SIZE").unwrap_or(defaults.pool_size),
            timeout_seconds: parse_env("CA_PG_TIMEOUT_SECONDS").unwrap_or(defaults.timeout_seconds)
        }
    }
}

fn load_cache_from_env() -> CacheConfig {
    CacheConfig {
        redis_url: env::var("CA_REDIS_URL").ok().filter(|url| !url.is_empty()),
        route_match_tag: env::var("CA_ROUTE_MATCH_TAG")
            .unwrap_or_else(|_| "route_match".to_string())
    }
}

fn load_uniquifier_from_env() -> UniquifierConfig {
    let defaults = UniquifierConfig::default();
    UniquifierConfig {
        separator: env::var("CA_UNIQUIFIER_SEPARATOR").unwrap_or(defaults.separator),
        max_length: parse_env("CA_UNIQUIFIER_MAX_LENGTH").unwrap_or(defaults.max_length)
    }
}

fn load_contexts_from_env() -> ContextsConfig {
    ContextsConfig {
        current: env::var("CA_CURRENT_CONTEXT")
            .ok()
            .filter(|ctx| !ctx.is_empty()),
        ..ContextsConfig::default()
    }
}

fn load_observability_from_env() -> ObservabilityConfig {
    ObservabilityConfig {
        logging_level: env::var("CA_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        metrics_enabled: parse_env("CA_METRICS_ENABLED").unwrap_or(true)
    }
}

pub(crate) fn parse_env<T>(key: &str) -> Result<T, Box<dyn std::error::Error>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static
{
    match env::var(key) {
        Ok(s) => s
            .parse::<T>()
            .map_err(|e| Box::new(e) as Box<dyn std::error::Error>),
        Err(e) => Err(Box::new(e) as Box<dyn std::error::Error>)
    }
}
