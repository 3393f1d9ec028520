//! Process-wide alias services and per-request store construction.

use std::sync::Arc;

use alias_core::{AliasBackend, AliasContextResolver, CacheInvalidator, SaveHook};
use anyhow::Context;
use config::{AliasConfig, UniquifierConfig};
use context::{ConfiguredContextResolver, ContextResolverRegistry};
use tracing::info;

use crate::store::{AliasContextStore, ROUTE_MATCH_TAG};
use crate::uniquifier::AliasUniquifier;

/// Shared collaborators for building one [`AliasContextStore`] per request.
pub struct AliasServices {
    backend: Arc<dyn AliasBackend>,
    registry: Arc<ContextResolverRegistry>,
    hooks: Vec<Arc<dyn SaveHook>>,
    invalidator: Option<Arc<dyn CacheInvalidator>>,
    cache_tag: String,
    uniquifier: UniquifierConfig,
    metrics_enabled: bool,
}

impl AliasServices {
    pub fn new(backend: Arc<dyn AliasBackend>, registry: ContextResolverRegistry) -> Self {
        Self {
            backend,
            registry: Arc::new(registry),
            hooks: Vec::new(),
            invalidator: None,
            cache_tag: ROUTE_MATCH_TAG.to_string(),
            uniquifier: UniquifierConfig::default(),
            metrics_enabled: true,
        }
    }

    /// Connect the configured backend and invalidator and register the
    /// configuration-driven resolver after `resolvers`.
    pub async fn from_config(
        config: &AliasConfig,
        resolvers: Vec<Arc<dyn AliasContextResolver>>,
    ) -> anyhow::Result<Self> {
        let backend = storage::connect_backend(&config.storage)
            .await
            .context("Failed to connect alias backend")?;
        let invalidator = storage::connect_invalidator(&config.cache)
            .await
            .context("Failed to connect cache invalidator")?;
        let configured = ConfiguredContextResolver::from_config(&config.contexts)
            .context("Invalid context configuration")?;

        let mut registry = ContextResolverRegistry::new();
        for resolver in resolvers {
            registry.register(resolver);
        }
        registry.register(Arc::new(configured));

        info!(
            "Alias services ready: backend {}, {} resolver(s), invalidation {}",
            config.storage.backend,
            registry.len(),
            if invalidator.is_some() { "on" } else { "off" }
        );

        Ok(Self {
            backend,
            registry: Arc::new(registry),
            hooks: Vec::new(),
            invalidator,
            cache_tag: config.cache.route_match_tag.clone(),
            uniquifier: config.uniquifier.clone(),
            metrics_enabled: config.observability.metrics_enabled,
        })
    }

    #[must_use]
    pub fn with_hook(mut self, hook: Arc<dyn SaveHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    #[must_use]
    pub fn with_invalidator(mut self, invalidator: Arc<dyn CacheInvalidator>) -> Self {
        self.invalidator = Some(invalidator);
        self
    }

    pub fn backend(&self) -> &Arc<dyn AliasBackend> {
        &self.backend
    }

    /// A fresh store with empty context caches.
    pub fn store(&self) -> Arc<AliasContextStore> {
        let mut store = AliasContextStore::new(self.backend.clone(), self.registry.clone())
            .with_hooks(self.hooks.iter().cloned())
            .with_cache_tag(self.cache_tag.clone())
            .with_metrics(self.metrics_enabled);
        if let Some(invalidator) = &self.invalidator {
            store = store.with_invalidator(invalidator.clone());
        }
        Arc::new(store)
    }

    pub fn uniquifier(&self, store: Arc<AliasContextStore>) -> AliasUniquifier {
        AliasUniquifier::new(store, &self.uniquifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alias_core::Langcode;
    use config::ContextRule;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};
    use serial_test::serial;

    use crate::store::SaveRequest;
    use crate::telemetry::SAVES_TOTAL;

    /// Save `/a` -> `/A` through services built with `metrics_enabled` and
    /// return the recorded save count.
    fn saves_recorded(metrics_enabled: bool) -> u64 {
        let mut config = AliasConfig::default();
        config.observability.metrics_enabled = metrics_enabled;

        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        metrics::with_local_recorder(&recorder, || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            runtime.block_on(async {
                let services = AliasServices::from_config(&config, Vec::new()).await.unwrap();
                services
                    .store()
                    .save(SaveRequest::new("/a", "/A", Langcode::not_specified()))
                    .await
                    .unwrap();
            });
        });

        snapshotter
            .snapshot()
            .into_vec()
            .into_iter()
            .filter(|(key, _, _, _)| key.key().name() == SAVES_TOTAL)
            .map(|(_, _, _, value)| match value {
                DebugValue::Counter(count) => count,
                _ => 0,
            })
            .sum()
    }

    #[test]
    #[serial]
    fn test_disabled_metrics_record_no_counters() {
        assert_eq!(saves_recorded(false), 0);
    }

    #[test]
    #[serial]
    fn test_enabled_metrics_count_saves() {
        assert_eq!(saves_recorded(true), 1);
    }

    #[tokio::test]
    #[serial]
    async fn test_from_config_builds_working_stores() {
        let mut config = AliasConfig::default();
        config.contexts.rules.push(ContextRule {
            prefix: "/shop".to_string(),
            context: "shop".to_string(),
            label: None,
        });
        config.contexts.current = Some("shop".to_string());

        let services = AliasServices::from_config(&config, Vec::new()).await.unwrap();

        let store = services.store();
        let saved = store
            .save(SaveRequest::new("/shop/1", "/cart", Langcode::not_specified()))
            .await
            .unwrap();
        assert_eq!(saved.fields.context.unwrap().as_str(), "shop");

        let next = services.store();
        assert_eq!(
            next.lookup_path_source("/cart", &Langcode::not_specified()).await,
            Some("/shop/1".to_string())
        );
        assert_eq!(
            next.lookup_path_source("/shop/cart", &Langcode::not_specified()).await,
            Some("/shop/1".to_string())
        );
    }

    #[tokio::test]
    async fn test_from_config_rejects_unknown_backend() {
        let mut config = AliasConfig::default();
        config.storage.backend = "sqlite".to_string();
        let err = AliasServices::from_config(&config, Vec::new()).await.err().unwrap();
        assert!(err.to_string().contains("alias backend"));
    }
}
