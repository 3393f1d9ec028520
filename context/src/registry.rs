//! Ordered registry of context resolvers.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use alias_core::{AliasContextResolver, ContextId};
use tracing::trace;

/// The resolvers known to the alias store, in registration order.
///
/// Every question is put to the resolvers in order and the first non-empty
/// answer wins. Later registrations act as fallbacks, never as overrides.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use context::{ConfiguredContextResolver, ContextResolverRegistry};
///
/// let registry = ContextResolverRegistry::new()
///     .with_resolver(Arc::new(ConfiguredContextResolver::new().with_current("one")?));
/// assert_eq!(registry.current_context().unwrap().as_str(), "one");
/// ```
#[derive(Clone, Default)]
pub struct ContextResolverRegistry {
    resolvers: Vec<Arc<dyn AliasContextResolver>>,
}

impl ContextResolverRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<dyn AliasContextResolver>) -> Self {
        self.register(resolver);
        self
    }

    pub fn register(&mut self, resolver: Arc<dyn AliasContextResolver>) {
        self.resolvers.push(resolver);
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }
}

impl AliasContextResolver for ContextResolverRegistry {
    fn current_context(&self) -> Option<ContextId> {
        let found = self.resolvers.iter().find_map(|r| r.current_context());
        trace!("Current context resolved to {:?}", found);
        found
    }

    /// Union of every resolver's options. A later resolver's label replaces an
    /// earlier one for the same id.
    fn context_options(&self) -> BTreeMap<ContextId, String> {
        let mut options = BTreeMap::new();
        for resolver in &self.resolvers {
            options.extend(resolver.context_options());
        }
        options
    }

    fn resolve_context(&self, path: &str) -> Option<ContextId> {
        let found = self.resolvers.iter().find_map(|r| r.resolve_context(path));
        trace!("Context for {} resolved to {:?}", path, found);
        found
    }
}

impl fmt::Debug for ContextResolverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextResolverRegistry")
            .field("resolvers", &self.resolvers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed {
        current: Option<&'static str>,
        paths: &'static [(&'static str, &'static str)],
        options: &'static [(&'static str, &'static str)],
    }

    impl AliasContextResolver for Fixed {
        fn current_context(&self) -> Option<ContextId> {
            self.current.and_then(ContextId::new)
        }

        fn context_options(&self) -> BTreeMap<ContextId, String> {
            self.options
                .iter()
                .filter_map(|(id, label)| ContextId::new(*id).map(|id| (id, label.to_string())))
                .collect()
        }

        fn resolve_context(&self, path: &str) -> Option<ContextId> {
            self.paths
                .iter()
                .find(|(p, _)| *p == path)
                .and_then(|(_, ctx)| ContextId::new(*ctx))
        }
    }

    fn ctx(id: &str) -> ContextId {
        ContextId::new(id).unwrap()
    }

    #[test]
    fn test_empty_registry_has_no_opinion() {
        let registry = ContextResolverRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.current_context(), None);
        assert_eq!(registry.resolve_context("/a"), None);
        assert!(registry.context_options().is_empty());
    }

    #[test]
    fn test_first_non_empty_answer_wins() {
        let registry = ContextResolverRegistry::new()
            .with_resolver(Arc::new(Fixed {
                current: None,
                paths: &[("/a", "one")],
                options: &[],
            }))
            .with_resolver(Arc::new(Fixed {
                current: Some("two"),
                paths: &[("/a", "two"), ("/b", "two")],
                options: &[],
            }))
            .with_resolver(Arc::new(Fixed {
                current: Some("three"),
                paths: &[],
                options: &[],
            }));

        assert_eq!(registry.len(), 3);
        assert_eq!(registry.current_context(), Some(ctx("two")));
        assert_eq!(registry.resolve_context("/a"), Some(ctx("one")));
        assert_eq!(registry.resolve_context("/b"), Some(ctx("two")));
        assert_eq!(registry.resolve_context("/c"), None);
    }

    #[test]
    fn test_options_are_merged_with_later_labels_winning() {
        let registry = ContextResolverRegistry::new()
            .with_resolver(Arc::new(Fixed {
                current: None,
                paths: &[],
                options: &[("one", "One"), ("two", "Two")],
            }))
            .with_resolver(Arc::new(Fixed {
                current: None,
                paths: &[],
                options: &[("two", "Second"), ("three", "Three")],
            }));

        let options = registry.context_options();
        assert_eq!(options.len(), 3);
        assert_eq!(options[&ctx("one")], "One");
        assert_eq!(options[&ctx("two")], "Second");
        assert_eq!(options[&ctx("three")], "Three");
    }
}
