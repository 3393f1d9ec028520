//! # Configuration Precedence
//!
//! Merges configuration from multiple sources.
//!
//! # Precedence Order
//! 1. Explicit overrides (highest priority)
//! 2. Environment variables
//! 3. Configuration file
//! 4. Default values (lowest priority)
//!
//! A layer only overrides a field whose value differs from the default, so a
//! file that omits a section never resets what a lower layer set.

use std::fmt::Debug;
use std::path::Path;

use validator::Validate;

use crate::config::{
    AliasConfig, CacheConfig, ContextsConfig, ObservabilityConfig, PostgresConfig,
    UniquifierConfig
};
use crate::file_loader::{ConfigFileError, load_from_file};
use crate::loader::load_from_env;

/// Merge configuration layers with precedence.
///
/// ## Usage
/// ```rust,no_run
/// use config::{AliasConfig, load_from_env, load_from_file, merge_configs};
/// use std::path::Path;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let from_file = load_from_file(Path::new("aliases.toml"))?;
///     let from_env = load_from_env()?;
///
///     let _config = merge_configs(
///         AliasConfig::default(),
///         from_file,
///         "file",
///         from_env,
///         "env",
///         None,
///         "override"
///     );
///     Ok(())
/// }
/// ```
pub fn merge_configs(
    defaults: AliasConfig,
    file_config: AliasConfig,
    file_source_name: &str,
    env_config: AliasConfig,
    env_source_name: &str,
    override_config: Option<AliasConfig>,
    override_source_name: &str
) -> AliasConfig {
    let mut config = merge_with_logging(defaults, &file_config, file_source_name);
    config = merge_with_logging(config, &env_config, env_source_name);

    if let Some(overrides) = override_config {
        config = merge_with_logging(config, &overrides, override_source_name);
    }

    config
}

/// Defaults, then the optional file, then `CA_*` variables. The merged result
/// is validated.
pub fn load_layered(path: Option<&Path>) -> Result<AliasConfig, ConfigFileError> {
    let from_file = match path {
        Some(path) => load_from_file(path)?,
        None => AliasConfig::default()
    };
    let from_env = load_from_env().map_err(|e| ConfigFileError::Invalid(e.to_string()))?;

    let config = merge_configs(
        AliasConfig::default(),
        from_file,
        "file",
        from_env,
        "env",
        None,
        "override"
    );
    config
        .validate()
        .map_err(|e| ConfigFileError::Invalid(e.to_string()))?;
    Ok(config)
}

fn merge_with_logging(
    mut base: AliasConfig,
    override_config: &AliasConfig,
    source_name: &str
) -> AliasConfig {
    let mut changes = Vec::new();

    if override_config.storage.backend != "memory" {
        take(
            "storage.backend",
            &mut base.storage.backend,
            &override_config.storage.backend,
            &mut changes
        );
    }
    merge_postgres(
        &mut base.storage.postgres,
        &override_config.storage.postgres,
        &mut changes
    );
    merge_cache(&mut base.cache, &override_config.cache, &mut changes);
    merge_uniquifier(
        &mut base.uniquifier,
        &override_config.uniquifier,
        &mut changes
    );
    merge_contexts(&mut base.contexts, &override_config.contexts, &mut changes);
    merge_observability(
        &mut base.observability,
        &override_config.observability,
        &mut changes
    );

    if !changes.is_empty() {
        tracing::info!("Configuration from {}: {:?}", source_name, changes);
    }

    base
}

fn take<T: PartialEq + Clone + Debug>(
    name: &str,
    base: &mut T,
    value: &T,
    changes: &mut Vec<String>
) {
    if value != base {
        changes.push(format!("{name} = {value:?}"));
        base.clone_from(value);
    }
}

fn take_unless_default<T: PartialEq + Clone + Debug>(
    name: &str,
    base: &mut T,
    value: &T,
    default: &T,
    changes: &mut Vec<String>
) {
    if value != default {
        take(name, base, value, changes);
    }
}

fn merge_postgres(base: &mut PostgresConfig, other: &PostgresConfig, changes: &mut Vec<String>) {
    let d = PostgresConfig::default();
    take_unless_default("storage.postgres.host", &mut base.host, &other.host, &d.host, changes);
    take_unless_default("storage.postgres.port", &mut base.port, &other.port, &d.port, changes);
    take_unless_default(
        "storage.postgres.database",
        &mut base.database,
        &other.database,
        &d.database,
        changes
    );
    take_unless_default(
        "storage.postgres.username",
        &mut base.username,
        &other.username,
        &d.username,
        changes
    );
    if !other.password.is_empty() && other.password != base.password {
        changes.push("storage.postgres.password = ***".to_string());
        base.password.clone_from(&other.password);
    }
    take_unless_default(
        "storage.postgres.pool_size",
        &mut base.pool_size,
        &other.pool_size,
        &d.pool_size,
        changes
    );
    take_unless_default(
        "storage.postgres.timeout_seconds",
        &mut base.timeout_seconds,
        &other.timeout_seconds,
        &d.timeout_seconds,
        changes
    );
}

fn merge_cache(base: &mut CacheConfig, other: &CacheConfig, changes: &mut Vec<String>) {
    let d = CacheConfig::default();
    take_unless_default(
        "cache.redis_url",
        &mut base.redis_url,
        &other.redis_url,
        &d.redis_url,
        changes
    );
    take_unless_default(
        "cache.route_match_tag",
        &mut base.route_match_tag,
        &other.route_match_tag,
        &d.route_match_tag,
        changes
    );
}

fn merge_uniquifier(
    base: &mut UniquifierConfig,
    other: &UniquifierConfig,
    changes: &mut Vec<String>
) {
    let d = UniquifierConfig::default();
    take_unless_default(
        "uniquifier.separator",
        &mut base.separator,
        &other.separator,
        &d.separator,
        changes
    );
    take_unless_default(
        "uniquifier.max_length",
        &mut base.max_length,
        &other.max_length,
        &d.max_length,
        changes
    );
}

fn merge_contexts(base: &mut ContextsConfig, other: &ContextsConfig, changes: &mut Vec<String>) {
    if other.current.is_some() {
        take("contexts.current", &mut base.current, &other.current, changes);
    }
    for (id, label) in &other.options {
        if base.options.get(id) != Some(label) {
            changes.push(format!("contexts.options.{id} = {label:?}"));
            base.options.insert(id.clone(), label.clone());
        }
    }
    if !other.rules.is_empty() {
        take("contexts.rules", &mut base.rules, &other.rules, changes);
    }
}

fn merge_observability(
    base: &mut ObservabilityConfig,
    other: &ObservabilityConfig,
    changes: &mut Vec<String>
) {
    let d = ObservabilityConfig::default();
    take_unless_default(
        "observability.logging_level",
        &mut base.logging_level,
        &other.logging_level,
        &d.logging_level,
        changes
    );
    take_unless_default(
        "observability.metrics_enabled",
        &mut base.metrics_enabled,
        &other.metrics_enabled,
        &d.metrics_enabled,
        changes
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ContextRule;

    #[test]
    fn test_env_overrides_file() {
        let mut file = AliasConfig::default();
        file.storage.postgres.host = "file-host".to_string();
        file.storage.postgres.port = 6000;

        let mut env = AliasConfig::default();
        env.storage.postgres.host = "env-host".to_string();

        let merged = merge_configs(
            AliasConfig::default(),
            file,
            "file",
            env,
            "env",
            None,
            "override"
        );

        assert_eq!(merged.storage.postgres.host, "env-host");
        assert_eq!(merged.storage.postgres.port, 6000);
    }

    #[test]
    fn test_default_valued_layer_keeps_lower_layer() {
        let mut file = AliasConfig::default();
        file.storage.backend = "postgres".to_string();
        file.uniquifier.separator = "_".to_string();
        file.contexts.rules.push(ContextRule {
            prefix: "/shop".to_string(),
            context: "shop".to_string(),
            label: None
        });

        let merged = merge_configs(
            AliasConfig::default(),
            file,
            "file",
            AliasConfig::default(),
            "env",
            None,
            "override"
        );

        assert_eq!(merged.storage.backend, "postgres");
        assert_eq!(merged.uniquifier.separator, "_");
        assert_eq!(merged.contexts.rules.len(), 1);
    }

    #[test]
    fn test_override_layer_wins() {
        let mut env = AliasConfig::default();
        env.contexts.current = Some("one".to_string());

        let mut overrides = AliasConfig::default();
        overrides.contexts.current = Some("two".to_string());

        let merged = merge_configs(
            AliasConfig::default(),
            AliasConfig::default(),
            "file",
            env,
            "env",
            Some(overrides),
            "override"
        );

        assert_eq!(merged.contexts.current.as_deref(), Some("two"));
    }

    #[test]
    fn test_context_options_are_unioned() {
        let mut file = AliasConfig::default();
        file.contexts
            .options
            .insert("one".to_string(), "Store one".to_string());

        let mut env = AliasConfig::default();
        env.contexts
            .options
            .insert("two".to_string(), "Store two".to_string());

        let merged = merge_configs(
            AliasConfig::default(),
            file,
            "file",
            env,
            "env",
            None,
            "override"
        );

        assert_eq!(merged.contexts.options.len(), 2);
    }
}
