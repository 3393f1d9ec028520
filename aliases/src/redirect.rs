//! Context-aware decorator for a legacy redirect repository.

use std::collections::BTreeMap;
use std::sync::Arc;

use alias_core::paths::prefix_with_context;
use alias_core::{Langcode, Redirect, RedirectRepository};
use async_trait::async_trait;
use errors::StorageError;
use tracing::debug;

use crate::store::AliasContextStore;

/// Looks redirects up under `/{current context}/{path}` first and falls back
/// to the bare path. Without a current context only the bare path is tried.
pub struct ContextualRedirectRepository<R> {
    inner: R,
    store: Arc<AliasContextStore>,
}

impl<R: RedirectRepository> ContextualRedirectRepository<R> {
    pub fn new(inner: R, store: Arc<AliasContextStore>) -> Self {
        Self { inner, store }
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }
}

#[async_trait]
impl<R: RedirectRepository> RedirectRepository for ContextualRedirectRepository<R> {
    async fn find_matching_redirect(
        &self,
        source_path: &str,
        query: &BTreeMap<String, String>,
        langcode: &Langcode,
    ) -> Result<Option<Redirect>, StorageError> {
        if let Some(context) = self.store.current_context() {
            let contextual = prefix_with_context(context.as_str(), source_path);
            if let Some(redirect) = self
                .inner
                .find_matching_redirect(&contextual, query, langcode)
                .await?
            {
                debug!("Matched contextual redirect {}", contextual);
                return Ok(Some(redirect));
            }
        }

        self.inner
            .find_matching_redirect(source_path, query, langcode)
            .await
    }
}
