//! Context resolution from static configuration.
//!
//! Resolves the current context with precedence:
//! 1. Explicit override (`with_current()`)
//! 2. Environment variable (`CA_CURRENT_CONTEXT`)
//! 3. `contexts.current` from configuration
//!
//! Source paths resolve through prefix rules, longest prefix first.

use std::collections::BTreeMap;
use std::env;

use alias_core::{AliasContextResolver, ContextId};
use config::ContextsConfig;
use errors::AliasResult;
use tracing::{debug, trace};

/// Environment variable naming the current context.
pub const CURRENT_CONTEXT_ENV: &str = "CA_CURRENT_CONTEXT";

/// Resolver backed by `[contexts]` configuration.
///
/// # Example
///
/// ```rust,ignore
/// use context::ConfiguredContextResolver;
///
/// let resolver = ConfiguredContextResolver::new()
///     .with_rule("/store/1", "one")?
///     .with_current("one")?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConfiguredContextResolver {
    explicit_current: Option<ContextId>,
    configured_current: Option<ContextId>,
    /// Sorted by prefix length, longest first.
    rules: Vec<(String, ContextId)>,
    options: BTreeMap<ContextId, String>,
    skip_env: bool,
}

impl ConfiguredContextResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from configuration. Rule contexts become options labelled with
    /// the rule label (or the id); `contexts.options` labels take precedence.
    ///
    /// # Errors
    ///
    /// Returns `AliasError::InvalidInput` for an empty or overlong context id.
    pub fn from_config(config: &ContextsConfig) -> AliasResult<Self> {
        let mut resolver = Self::new();

        for rule in &config.rules {
            resolver = resolver.with_rule(&rule.prefix, &rule.context)?;
            if let Some(label) = &rule.label {
                resolver = resolver.with_option(&rule.context, label)?;
            }
        }
        for (id, label) in &config.options {
            resolver = resolver.with_option(id, label)?;
        }
        if let Some(current) = &config.current {
            resolver.configured_current = Some(current.parse()?);
        }

        debug!(
            "Configured context resolver with {} rules and {} options",
            resolver.rules.len(),
            resolver.options.len()
        );
        Ok(resolver)
    }

    /// Explicit current context (highest precedence).
    pub fn with_current(mut self, context: &str) -> AliasResult<Self> {
        self.explicit_current = Some(context.parse()?);
        Ok(self)
    }

    /// Map every source path under `prefix` to `context`.
    pub fn with_rule(mut self, prefix: &str, context: &str) -> AliasResult<Self> {
        let context: ContextId = context.parse()?;
        self.options
            .entry(context.clone())
            .or_insert_with(|| context.to_string());
        self.rules
            .push((prefix.trim_end_matches('/').to_string(), context));
        self.rules
            .sort_by(|(a, _), (b, _)| b.len().cmp(&a.len()));
        Ok(self)
    }

    pub fn with_option(mut self, context: &str, label: &str) -> AliasResult<Self> {
        self.options.insert(context.parse()?, label.to_string());
        Ok(self)
    }

    /// Ignore `CA_CURRENT_CONTEXT`.
    #[must_use]
    pub fn skip_env(mut self) -> Self {
        self.skip_env = true;
        self
    }

    fn env_current(&self) -> Option<ContextId> {
        if self.skip_env {
            return None;
        }
        env::var(CURRENT_CONTEXT_ENV)
            .ok()
            .and_then(ContextId::new)
    }
}

fn under_prefix(path: &str, prefix: &str) -> bool {
    if prefix.is_empty() {
        return path.starts_with('/');
    }
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

impl AliasContextResolver for ConfiguredContextResolver {
    fn current_context(&self) -> Option<ContextId> {
        if let Some(current) = &self.explicit_current {
            trace!("Current context from override: {}", current);
            return Some(current.clone());
        }
        if let Some(current) = self.env_current() {
            trace!("Current context from {}: {}", CURRENT_CONTEXT_ENV, current);
            return Some(current);
        }
        self.configured_current.clone()
    }

    fn context_options(&self) -> BTreeMap<ContextId, String> {
        self.options.clone()
    }

    fn resolve_context(&self, path: &str) -> Option<ContextId> {
        self.rules
            .iter()
            .find(|(prefix, _)| under_prefix(path, prefix))
            .map(|(_, context)| context.clone())
    }
}
