//! # Configuration System
//!
//! Configuration for the contextual alias system.
//!
//! This crate provides:
//! - Configuration structures for storage, cache invalidation, the alias
//!   uniquifier and statically configured contexts
//! - Environment variable loading (`CA_*`)
//! - Configuration file loading (TOML/YAML)
//! - Layer precedence (overrides > env > file > defaults)

pub mod config;
pub mod file_loader;
pub mod loader;
pub mod precedence;

pub use config::{
    AliasConfig, CacheConfig, ContextRule, ContextsConfig, MAX_CONTEXT_ID_LENGTH,
    ObservabilityConfig, PostgresConfig, StorageConfig, UniquifierConfig
};
pub use file_loader::{ConfigFileError, load_from_file, load_from_toml, load_from_yaml};
pub use loader::load_from_env;
pub use precedence::{load_layered, merge_configs};
pub use validator::Validate;
