//! The context-aware alias store.
//!
//! Wraps a plain [`AliasBackend`] and layers context semantics on top: every
//! row carries an optional context, lookups see rows of the effective
//! context plus the global layer, and ambiguous alias text that starts with a
//! context-looking segment is disambiguated against the current context.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use alias_core::paths::{is_absolute, like_eq, split_context_segment};
use alias_core::{
    AliasBackend, AliasFields, AliasId, AliasQuery, AliasRecord, AliasSaveEvent,
    CacheInvalidator, ContextFilter, ContextId, Langcode, ListFilter, SaveHook, SaveOperation,
};
use context::{ContextResolverRegistry, RequestContexts};
use errors::{AliasError, AliasResult, StorageError};
use tracing::{debug, error, info, warn};

use crate::telemetry::{self, Outcome};

/// Cache tag invalidated after every successful save unless configured
/// otherwise.
pub const ROUTE_MATCH_TAG: &str = "route_match";

/// Which context a context-sensitive operation runs under.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ContextOverride {
    /// Whatever the store derives (current context or source context).
    #[default]
    Ambient,
    /// Run as if the effective context were this one (`None` = global).
    Fixed(Option<ContextId>),
}

/// Input to [`AliasContextStore::save`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveRequest {
    pub source: String,
    pub alias: String,
    pub langcode: Langcode,
    /// Update this row instead of inserting a new one.
    pub pid: Option<AliasId>,
    /// Used only when no resolver has an opinion on `source`.
    pub context: Option<ContextId>,
}

impl SaveRequest {
    pub fn new(source: impl Into<String>, alias: impl Into<String>, langcode: Langcode) -> Self {
        Self {
            source: source.into(),
            alias: alias.into(),
            langcode,
            pid: None,
            context: None,
        }
    }

    #[must_use]
    pub fn with_pid(mut self, pid: AliasId) -> Self {
        self.pid = Some(pid);
        self
    }

    #[must_use]
    pub fn with_context(mut self, context: ContextId) -> Self {
        self.context = Some(context);
        self
    }
}

/// What a successful save stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedAlias {
    pub pid: AliasId,
    pub operation: SaveOperation,
    pub fields: AliasFields,
    pub original: Option<AliasRecord>,
}

/// Field conditions for [`AliasContextStore::load`]. `source` and `alias`
/// match case-insensitively; the rest match exactly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadConditions {
    pub pid: Option<AliasId>,
    pub source: Option<String>,
    pub alias: Option<String>,
    pub langcode: Option<Langcode>,
}

impl LoadConditions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn pid(mut self, pid: AliasId) -> Self {
        self.pid = Some(pid);
        self
    }

    #[must_use]
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    #[must_use]
    pub fn langcode(mut self, langcode: Langcode) -> Self {
        self.langcode = Some(langcode);
        self
    }
}

/// Context-aware alias persistence and lookup for one unit of work.
///
/// Resolver answers are memoized for the lifetime of the store, so build a
/// new store per request. The backend, registry and collaborators are shared.
pub struct AliasContextStore {
    backend: Arc<dyn AliasBackend>,
    contexts: RequestContexts,
    hooks: Vec<Arc<dyn SaveHook>>,
    invalidator: Option<Arc<dyn CacheInvalidator>>,
    cache_tag: String,
    metrics_enabled: bool,
}

impl AliasContextStore {
    pub fn new(backend: Arc<dyn AliasBackend>, registry: Arc<ContextResolverRegistry>) -> Self {
        Self {
            backend,
            contexts: RequestContexts::new(registry),
            hooks: Vec::new(),
            invalidator: None,
            cache_tag: ROUTE_MATCH_TAG.to_string(),
            metrics_enabled: true,
        }
    }

    #[must_use]
    pub fn with_hook(mut self, hook: Arc<dyn SaveHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    #[must_use]
    pub fn with_hooks(mut self, hooks: impl IntoIterator<Item = Arc<dyn SaveHook>>) -> Self {
        self.hooks.extend(hooks);
        self
    }

    #[must_use]
    pub fn with_invalidator(mut self, invalidator: Arc<dyn CacheInvalidator>) -> Self {
        self.invalidator = Some(invalidator);
        self
    }

    #[must_use]
    pub fn with_cache_tag(mut self, tag: impl Into<String>) -> Self {
        self.cache_tag = tag.into();
        self
    }

    /// Turn the `contextual_alias_*` counters on or off (on by default).
    #[must_use]
    pub fn with_metrics(mut self, enabled: bool) -> Self {
        self.metrics_enabled = enabled;
        self
    }

    fn record_lookup(&self, operation: &'static str, outcome: Outcome) {
        if self.metrics_enabled {
            telemetry::record_lookup(operation, outcome);
        }
    }

    fn record_storage_error(&self, operation: &'static str) {
        if self.metrics_enabled {
            telemetry::record_storage_error(operation);
        }
    }

    fn record_save(&self, operation: SaveOperation) {
        if self.metrics_enabled {
            telemetry::record_save(operation);
        }
    }

    /// Context of the in-flight request, memoized.
    pub fn current_context(&self) -> Option<ContextId> {
        self.contexts.current_context()
    }

    /// Context a source path belongs to, memoized per path.
    pub fn resolve_context(&self, path: &str) -> Option<ContextId> {
        self.contexts.resolve_context(path)
    }

    /// Every context the registered resolvers can produce, with labels.
    pub fn context_options(&self) -> BTreeMap<ContextId, String> {
        self.contexts.context_options()
    }

    fn effective_current(&self, context: ContextOverride) -> Option<ContextId> {
        match context {
            ContextOverride::Ambient => self.current_context(),
            ContextOverride::Fixed(context) => context,
        }
    }

    /// Insert (no `pid`) or update (with `pid`) an alias.
    ///
    /// The stored context is derived from the source by the resolvers; the
    /// request's own context only applies when they have no opinion.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` when source or alias lacks the leading `/`
    /// - `StorageUnavailable` when the table is missing and cannot be created
    /// - `Duplicate` when the `(alias, langcode, context)` slot is taken
    /// - `NotFound` when updating an id without a row
    /// - `Storage` for any other backend failure
    pub async fn save(&self, request: SaveRequest) -> AliasResult<SavedAlias> {
        validate_path("source", &request.source)?;
        validate_path("alias", &request.alias)?;

        let context = self
            .resolve_context(&request.source)
            .or(request.context);
        let fields = AliasFields {
            source: request.source,
            alias: request.alias,
            langcode: request.langcode,
            context,
        };

        let saved = match request.pid {
            None => {
                let pid = self.insert(&fields).await?;
                SavedAlias {
                    pid,
                    operation: SaveOperation::Insert,
                    fields,
                    original: None,
                }
            }
            Some(pid) => {
                let original = self.load_by_id(pid).await;
                let affected = self
                    .backend
                    .update(pid, &fields)
                    .await
                    .map_err(|e| save_error(e, &fields))?;
                if affected == 0 {
                    return Err(AliasError::NotFound { pid: pid.get() });
                }
                SavedAlias {
                    pid,
                    operation: SaveOperation::Update,
                    fields,
                    original,
                }
            }
        };

        debug!(
            "Saved alias {} -> {} ({}, context {:?}) as {}",
            saved.fields.source, saved.fields.alias, saved.operation, saved.fields.context, saved.pid
        );
        self.record_save(saved.operation);
        self.after_save(&saved).await;
        Ok(saved)
    }

    async fn insert(&self, fields: &AliasFields) -> AliasResult<AliasId> {
        let err = match self.backend.insert(fields).await {
            Ok(pid) => return Ok(pid),
            Err(err) if err.is_table_missing() => err,
            Err(err) => return Err(save_error(err, fields)),
        };

        warn!("Alias table missing, provisioning: {}", err);
        match self.backend.ensure_schema().await {
            Ok(true) => {
                info!("Provisioned alias table, retrying insert");
                self.backend
                    .insert(fields)
                    .await
                    .map_err(|e| save_error(e, fields))
            }
            Ok(false) => Err(AliasError::StorageUnavailable {
                reason: err.to_string(),
            }),
            Err(provision_err) => {
                error!(error = %provision_err, "Alias table provisioning failed");
                Err(AliasError::StorageUnavailable {
                    reason: err.to_string(),
                })
            }
        }
    }

    async fn after_save(&self, saved: &SavedAlias) {
        let event = AliasSaveEvent {
            operation: saved.operation,
            pid: saved.pid,
            fields: saved.fields.clone(),
            original: saved.original.clone(),
        };
        for hook in &self.hooks {
            hook.on_save(&event).await;
        }

        if let Some(invalidator) = &self.invalidator {
            if let Err(e) = invalidator.invalidate_tags(&[self.cache_tag.as_str()]).await {
                warn!("Failed to invalidate cache tag {}: {}", self.cache_tag, e);
            }
        }
    }

    /// Run a select for a lookup path. Failures are logged, counted and
    /// reported as `None`.
    async fn select(&self, operation: &'static str, query: &AliasQuery) -> Option<Vec<AliasRecord>> {
        match self.backend.select(query).await {
            Ok(rows) => Some(rows),
            Err(e) => {
                error!(operation, error = %e, "Alias lookup failed");
                self.record_storage_error(operation);
                self.record_lookup(operation, Outcome::Error);
                None
            }
        }
    }

    /// The best row matching `conditions`, under the context of
    /// `conditions.source` or else the current context.
    pub async fn load(&self, conditions: &LoadConditions) -> Option<AliasRecord> {
        self.load_with(conditions, ContextOverride::Ambient).await
    }

    /// [`load`](Self::load) with an explicit effective context.
    pub async fn load_with(
        &self,
        conditions: &LoadConditions,
        context: ContextOverride,
    ) -> Option<AliasRecord> {
        let effective = match (context, &conditions.source) {
            (ContextOverride::Fixed(context), _) => context,
            (ContextOverride::Ambient, Some(source)) => self.resolve_context(source),
            (ContextOverride::Ambient, None) => self.current_context(),
        };

        let mut query = AliasQuery::new().context(ContextFilter::scoped_to(effective.as_ref()));
        if let Some(pid) = conditions.pid {
            query = query.pid(pid);
        }
        if let Some(source) = &conditions.source {
            query = query.source(source.clone());
        }
        if let Some(alias) = &conditions.alias {
            query = query.alias(alias.clone());
        }
        if let Some(langcode) = &conditions.langcode {
            query = query.langcode(langcode.clone());
        }

        let rows = self.select("load", &query).await?;
        let best = rows
            .into_iter()
            .max_by_key(|r| (r.context.is_some(), r.pid));
        self.record_lookup("load", Outcome::from_found(best.is_some()));
        best
    }

    /// A row by id, regardless of context.
    pub async fn load_by_id(&self, pid: AliasId) -> Option<AliasRecord> {
        let rows = self
            .select("load_by_id", &AliasQuery::new().pid(pid).limit(1))
            .await?;
        rows.into_iter().next()
    }

    /// The alias of `path` under the path's own context, falling back to the
    /// global layer.
    pub async fn lookup_path_alias(&self, path: &str, langcode: &Langcode) -> Option<String> {
        let context = self.resolve_context(path);
        let query = AliasQuery::new()
            .source(path)
            .langcodes(langcode.lookup_candidates())
            .context(ContextFilter::scoped_to(context.as_ref()));

        let rows = self.select("lookup_path_alias", &query).await?;
        let best = rows
            .into_iter()
            .max_by_key(|r| (r.context.is_some(), &r.langcode == langcode, r.pid));
        self.record_lookup("lookup_path_alias", Outcome::from_found(best.is_some()));
        best.map(|r| r.alias)
    }

    /// The source behind `alias` under the current context.
    pub async fn lookup_path_source(&self, alias: &str, langcode: &Langcode) -> Option<String> {
        self.lookup_path_source_with(alias, langcode, ContextOverride::Ambient)
            .await
    }

    /// [`lookup_path_source`](Self::lookup_path_source) with an explicit
    /// current context.
    ///
    /// The alias is read two ways: literally, and as `/{context}/{rest}`
    /// naming a contextual alias `rest`. The contextual reading wins when its
    /// context is the current one and it matches; otherwise the literal
    /// reading wins when it matches, and the contextual one is the fallback.
    pub async fn lookup_path_source_with(
        &self,
        alias: &str,
        langcode: &Langcode,
        context: ContextOverride,
    ) -> Option<String> {
        let current = self.effective_current(context);
        let langcodes = langcode.lookup_candidates();

        let literal = self
            .select(
                "lookup_path_source",
                &AliasQuery::new()
                    .alias(alias)
                    .langcodes(langcodes.clone()),
            )
            .await?;

        let segmented = split_context_segment(alias)
            .and_then(|(segment, rest)| ContextId::new(segment).map(|ctx| (ctx, rest)));
        let contextual = match segmented {
            Some((segment_context, rest)) => {
                let rows = self
                    .select(
                        "lookup_path_source",
                        &AliasQuery::new()
                            .alias(rest)
                            .langcodes(langcodes)
                            .context(ContextFilter::Exactly(segment_context.clone())),
                    )
                    .await
                    .unwrap_or_default();
                Some((segment_context, rows))
            }
            None => None,
        };

        let best = match contextual {
            Some((segment_context, rows))
                if current.as_ref() == Some(&segment_context) && !rows.is_empty() =>
            {
                debug!("Alias {} read as contextual alias in {}", alias, segment_context);
                best_in_context(rows, langcode)
            }
            _ if !literal.is_empty() => {
                debug!("Alias {} read literally", alias);
                best_literal(literal, current.as_ref(), langcode)
            }
            Some((_, rows)) => best_in_context(rows, langcode),
            None => None,
        };

        self.record_lookup("lookup_path_source", Outcome::from_found(best.is_some()));
        best.map(|r| r.source)
    }

    /// Whether `alias` is taken in `langcode`, by a source other than
    /// `exclude_source`, in the context of `exclude_source` (or the current
    /// context) or globally.
    pub async fn alias_exists(
        &self,
        alias: &str,
        langcode: &Langcode,
        exclude_source: Option<&str>,
    ) -> bool {
        let exclude_source = exclude_source.filter(|s| !s.is_empty());
        let context = match exclude_source {
            Some(source) => self.resolve_context(source),
            None => self.current_context(),
        };
        self.alias_exists_in(alias, langcode, exclude_source, context.as_ref())
            .await
    }

    /// [`alias_exists`](Self::alias_exists) in an explicit context.
    pub async fn alias_exists_in(
        &self,
        alias: &str,
        langcode: &Langcode,
        exclude_source: Option<&str>,
        context: Option<&ContextId>,
    ) -> bool {
        let mut query = AliasQuery::new()
            .alias(alias)
            .langcode(langcode.clone())
            .context(ContextFilter::scoped_to(context))
            .limit(1);
        if let Some(source) = exclude_source.filter(|s| !s.is_empty()) {
            query = query.exclude_source(source);
        }

        let Some(rows) = self.select("alias_exists", &query).await else {
            return false;
        };
        let exists = !rows.is_empty();
        self.record_lookup("alias_exists", Outcome::from_found(exists));
        exists
    }

    /// Aliases for many sources at once, under the current context only.
    /// Keyed by the candidate path as given.
    pub async fn preload_path_alias(
        &self,
        sources: &[&str],
        langcode: &Langcode,
    ) -> HashMap<String, String> {
        self.preload_path_alias_with(sources, langcode, ContextOverride::Ambient)
            .await
    }

    /// [`preload_path_alias`](Self::preload_path_alias) with an explicit
    /// current context.
    pub async fn preload_path_alias_with(
        &self,
        sources: &[&str],
        langcode: &Langcode,
        context: ContextOverride,
    ) -> HashMap<String, String> {
        if sources.is_empty() {
            return HashMap::new();
        }
        let current = self.effective_current(context);
        let query = AliasQuery::new()
            .sources(sources.iter().copied())
            .langcodes(langcode.lookup_candidates())
            .context(ContextFilter::scoped_to(current.as_ref()));

        let Some(rows) = self.select("preload_path_alias", &query).await else {
            return HashMap::new();
        };

        let preloaded: HashMap<String, String> = sources
            .iter()
            .filter_map(|source| {
                rows.iter()
                    .filter(|r| like_eq(&r.source, source))
                    .max_by_key(|r| (r.context.is_some(), &r.langcode == langcode, r.pid))
                    .map(|r| ((*source).to_string(), r.alias.clone()))
            })
            .collect();

        self.record_lookup(
            "preload_path_alias",
            Outcome::from_found(!preloaded.is_empty()),
        );
        preloaded
    }

    /// Paged administrative listing across all contexts.
    pub async fn list_aliases(&self, filter: &ListFilter) -> Vec<AliasRecord> {
        match self.backend.list(filter).await {
            Ok(rows) => rows,
            Err(e) => {
                error!(operation = "list_aliases", error = %e, "Alias listing failed");
                self.record_storage_error("list_aliases");
                Vec::new()
            }
        }
    }
}

fn validate_path(field: &str, path: &str) -> AliasResult<()> {
    if is_absolute(path) {
        Ok(())
    } else {
        Err(AliasError::invalid_input(
            field,
            format!("{path} has to start with a slash"),
        ))
    }
}

fn save_error(err: StorageError, fields: &AliasFields) -> AliasError {
    if err.is_conflict() {
        AliasError::Duplicate {
            alias: fields.alias.clone(),
            langcode: fields.langcode.to_string(),
            context: fields
                .context
                .as_ref()
                .map_or_else(|| "global".to_string(), ContextId::to_string),
        }
    } else {
        AliasError::Storage(err)
    }
}

/// Rows of a single context: requested language first, then insertion order.
fn best_in_context(rows: Vec<AliasRecord>, langcode: &Langcode) -> Option<AliasRecord> {
    rows.into_iter()
        .min_by_key(|r| (&r.langcode != langcode, r.pid))
}

/// Rows of any context: the current context first, then global rows, then
/// other contexts; within a tier the requested language, then insertion
/// order.
fn best_literal(
    rows: Vec<AliasRecord>,
    current: Option<&ContextId>,
    langcode: &Langcode,
) -> Option<AliasRecord> {
    rows.into_iter().min_by_key(|r| {
        let tier = match (&r.context, current) {
            (Some(row), Some(current)) if row == current => 0,
            (None, _) => 1,
            _ => 2,
        };
        (tier, &r.langcode != langcode, r.pid)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pid: i64, source: &str, lang: &str, ctx: Option<&str>) -> AliasRecord {
        AliasRecord {
            pid: AliasId::new(pid),
            source: source.to_string(),
            alias: "/x".to_string(),
            langcode: Langcode::new(lang),
            context: ctx.and_then(ContextId::new),
        }
    }

    #[test]
    fn test_validate_path() {
        assert!(validate_path("source", "/a").is_ok());
        let err = validate_path("alias", "a").unwrap_err();
        assert!(matches!(err, AliasError::InvalidInput { ref field, .. } if field == "alias"));
    }

    #[test]
    fn test_save_error_maps_conflicts_to_duplicates() {
        let fields = AliasFields {
            source: "/a".to_string(),
            alias: "/A".to_string(),
            langcode: Langcode::not_specified(),
            context: None,
        };
        let err = save_error(
            StorageError::Conflict {
                backend: "memory".to_string(),
                reason: "taken".to_string(),
            },
            &fields,
        );
        assert!(matches!(err, AliasError::Duplicate { ref context, .. } if context == "global"));

        let err = save_error(StorageError::query("memory", "boom"), &fields);
        assert!(matches!(err, AliasError::Storage(_)));
    }

    #[test]
    fn test_best_literal_tiers() {
        let one = ContextId::new("one").unwrap();
        let en = Langcode::new("en");
        let rows = vec![
            row(1, "/other", "en", Some("two")),
            row(2, "/global", "und", None),
            row(3, "/current", "und", Some("one")),
        ];

        let best = best_literal(rows.clone(), Some(&one), &en).unwrap();
        assert_eq!(best.source, "/current");

        let best = best_literal(rows.clone(), None, &en).unwrap();
        assert_eq!(best.source, "/global");

        let best = best_literal(vec![rows[0].clone()], None, &en).unwrap();
        assert_eq!(best.source, "/other");
    }

    #[test]
    fn test_best_literal_prefers_language_then_insertion_order() {
        let en = Langcode::new("en");
        let rows = vec![
            row(1, "/first-und", "und", None),
            row(2, "/second-en", "en", None),
            row(3, "/third-en", "en", None),
        ];
        let best = best_literal(rows, None, &en).unwrap();
        assert_eq!(best.source, "/second-en");
    }

    #[test]
    fn test_best_in_context() {
        let en = Langcode::new("en");
        let rows = vec![row(4, "/und", "und", Some("one")), row(5, "/en", "en", Some("one"))];
        assert_eq!(best_in_context(rows, &en).unwrap().source, "/en");
        assert!(best_in_context(Vec::new(), &en).is_none());
    }
}
