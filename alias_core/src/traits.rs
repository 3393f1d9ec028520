//! Core traits for the contextual alias system

use std::collections::BTreeMap;

use async_trait::async_trait;
use errors::StorageError;

use crate::types::{
    AliasFields, AliasId, AliasQuery, AliasRecord, AliasSaveEvent, ContextId, Langcode,
    ListFilter, Redirect
};

/// Pluggable capability that derives a context from the ambient request or
/// from a source path.
///
/// Resolvers are registered in order; for each question the first resolver
/// with an opinion wins. Implementations must be side-effect free, the alias
/// store memoizes their answers for its own lifetime.
pub trait AliasContextResolver: Send + Sync {
    /// The context of the in-flight request, if any.
    fn current_context(&self) -> Option<ContextId>;

    /// Every context this resolver can produce, keyed by id, with a display
    /// label.
    fn context_options(&self) -> BTreeMap<ContextId, String>;

    /// The context a source path belongs to, or `None` when this resolver has
    /// no opinion.
    fn resolve_context(&self, path: &str) -> Option<ContextId>;
}

/// Plain CRUD over the `url_alias` table. Context semantics are layered on
/// top by the alias store; backends only evaluate the conditions they are
/// given.
#[async_trait]
pub trait AliasBackend: Send + Sync {
    /// Insert a row and return its generated id.
    ///
    /// Fails with `StorageError::TableMissing` when the table has not been
    /// provisioned and `StorageError::Conflict` when the
    /// `(alias, langcode, context)` slot is taken.
    async fn insert(&self, fields: &AliasFields) -> Result<AliasId, StorageError>;

    /// Update a row in place, returning the number of affected rows.
    async fn update(&self, pid: AliasId, fields: &AliasFields) -> Result<u64, StorageError>;

    /// Rows matching `query`, ordered by id ascending.
    async fn select(&self, query: &AliasQuery) -> Result<Vec<AliasRecord>, StorageError>;

    /// Rows for administrative listings, ordered by alias then id.
    async fn list(&self, filter: &ListFilter) -> Result<Vec<AliasRecord>, StorageError>;

    /// Create the table and its indexes if missing. Returns `true` when
    /// anything was created.
    async fn ensure_schema(&self) -> Result<bool, StorageError>;
}

/// Observer notified after every successful save. Fire-and-forget.
#[async_trait]
pub trait SaveHook: Send + Sync {
    async fn on_save(&self, event: &AliasSaveEvent);
}

/// Tag-based invalidation of route-matching caches.
#[async_trait]
pub trait CacheInvalidator: Send + Sync {
    async fn invalidate_tags(&self, tags: &[&str]) -> Result<(), StorageError>;
}

/// Lookup side of a legacy redirect subsystem.
#[async_trait]
pub trait RedirectRepository: Send + Sync {
    async fn find_matching_redirect(
        &self,
        source_path: &str,
        query: &BTreeMap<String, String>,
        langcode: &Langcode
    ) -> Result<Option<Redirect>, StorageError>;
}
