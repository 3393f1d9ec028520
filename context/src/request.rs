//! Request-scoped memoization of resolver answers.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use alias_core::{AliasContextResolver, ContextId};
use parking_lot::Mutex;
use tracing::debug;

use crate::registry::ContextResolverRegistry;

#[derive(Debug, Default)]
struct ContextCache {
    /// `None` until the current context has been asked for once.
    current: Option<Option<ContextId>>,
    by_source: HashMap<String, Option<ContextId>>,
}

/// Resolver answers cached for the lifetime of one unit of work.
///
/// Both caches are filled on first use and never invalidated, so create one
/// per request. Empty answers are cached too.
#[derive(Debug)]
pub struct RequestContexts {
    registry: Arc<ContextResolverRegistry>,
    cache: Mutex<ContextCache>,
}

impl RequestContexts {
    pub fn new(registry: Arc<ContextResolverRegistry>) -> Self {
        Self {
            registry,
            cache: Mutex::new(ContextCache::default()),
        }
    }

    pub fn registry(&self) -> &Arc<ContextResolverRegistry> {
        &self.registry
    }

    /// The request's current context, asking the resolvers at most once.
    pub fn current_context(&self) -> Option<ContextId> {
        if let Some(cached) = self.cache.lock().current.clone() {
            return cached;
        }

        // Resolvers run without the lock held.
        let resolved = self.registry.current_context();
        debug!("Current context: {:?}", resolved);

        let mut cache = self.cache.lock();
        cache.current.get_or_insert(resolved).clone()
    }

    /// The context of a source path, asking the resolvers at most once per
    /// distinct path.
    pub fn resolve_context(&self, source: &str) -> Option<ContextId> {
        if let Some(cached) = self.cache.lock().by_source.get(source) {
            return cached.clone();
        }

        let resolved = self.registry.resolve_context(source);
        debug!("Context for source {}: {:?}", source, resolved);

        self.cache
            .lock()
            .by_source
            .entry(source.to_string())
            .or_insert(resolved)
            .clone()
    }

    pub fn context_options(&self) -> BTreeMap<ContextId, String> {
        self.registry.context_options()
    }
}
