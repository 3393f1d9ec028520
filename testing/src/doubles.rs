//! Scriptable collaborators for alias store tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use alias_core::{
    AliasBackend, AliasContextResolver, AliasFields, AliasId, AliasQuery, AliasRecord,
    AliasSaveEvent, CacheInvalidator, ContextId, Langcode, ListFilter, Redirect,
    RedirectRepository, SaveHook,
};
use async_trait::async_trait;
use errors::StorageError;
use parking_lot::{Mutex, RwLock};

/// Resolver answering from a fixed path table and a switchable current
/// context. Counts how often it is asked.
#[derive(Debug, Default)]
pub struct ScriptedResolver {
    current: RwLock<Option<ContextId>>,
    paths: RwLock<HashMap<String, ContextId>>,
    options: RwLock<BTreeMap<ContextId, String>>,
    current_calls: AtomicUsize,
    resolve_calls: AtomicUsize,
}

impl ScriptedResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `(source path, context)` pairs.
    pub fn with_paths(paths: &[(&str, &str)]) -> Self {
        let resolver = Self::new();
        for (path, context) in paths {
            resolver.map_path(path, context);
        }
        resolver
    }

    pub fn map_path(&self, path: &str, context: &str) {
        if let Some(context) = ContextId::new(context) {
            self.paths.write().insert(path.to_string(), context);
        }
    }

    pub fn set_current(&self, context: Option<&str>) {
        *self.current.write() = context.and_then(ContextId::new);
    }

    pub fn add_option(&self, context: &str, label: &str) {
        if let Some(context) = ContextId::new(context) {
            self.options.write().insert(context, label.to_string());
        }
    }

    pub fn current_calls(&self) -> usize {
        self.current_calls.load(Ordering::SeqCst)
    }

    pub fn resolve_calls(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }
}

impl AliasContextResolver for ScriptedResolver {
    fn current_context(&self) -> Option<ContextId> {
        self.current_calls.fetch_add(1, Ordering::SeqCst);
        self.current.read().clone()
    }

    fn context_options(&self) -> BTreeMap<ContextId, String> {
        self.options.read().clone()
    }

    fn resolve_context(&self, path: &str) -> Option<ContextId> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        self.paths.read().get(path).cloned()
    }
}

/// Save hook that keeps every event it sees.
#[derive(Debug, Default)]
pub struct RecordingSaveHook {
    events: Mutex<Vec<AliasSaveEvent>>,
}

impl RecordingSaveHook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AliasSaveEvent> {
        self.events.lock().clone()
    }
}

#[async_trait]
impl SaveHook for RecordingSaveHook {
    async fn on_save(&self, event: &AliasSaveEvent) {
        self.events.lock().push(event.clone());
    }
}

/// Cache invalidator that records tags, or fails on demand.
#[derive(Debug, Default)]
pub struct RecordingInvalidator {
    tags: Mutex<Vec<String>>,
    failing: AtomicBool,
}

impl RecordingInvalidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let invalidator = Self::default();
        invalidator.failing.store(true, Ordering::SeqCst);
        invalidator
    }

    pub fn tags(&self) -> Vec<String> {
        self.tags.lock().clone()
    }
}

#[async_trait]
impl CacheInvalidator for RecordingInvalidator {
    async fn invalidate_tags(&self, tags: &[&str]) -> Result<(), StorageError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::connection("test-cache", "cache offline"));
        }
        self.tags
            .lock()
            .extend(tags.iter().map(|tag| (*tag).to_string()));
        Ok(())
    }
}

/// Redirects matched on exact source path, query and language.
#[derive(Debug, Default)]
pub struct InMemoryRedirectRepository {
    redirects: RwLock<Vec<Redirect>>,
    lookups: Mutex<Vec<String>>,
}

impl InMemoryRedirectRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, source_path: &str, redirect_uri: &str, langcode: &str) -> Redirect {
        let mut redirects = self.redirects.write();
        let redirect = Redirect {
            id: redirects.len() as i64 + 1,
            source_path: source_path.to_string(),
            query: BTreeMap::new(),
            redirect_uri: redirect_uri.to_string(),
            langcode: Langcode::new(langcode),
            status_code: 301,
        };
        redirects.push(redirect.clone());
        redirect
    }

    /// Source paths asked for, in order.
    pub fn lookups(&self) -> Vec<String> {
        self.lookups.lock().clone()
    }
}

#[async_trait]
impl RedirectRepository for InMemoryRedirectRepository {
    async fn find_matching_redirect(
        &self,
        source_path: &str,
        query: &BTreeMap<String, String>,
        langcode: &Langcode,
    ) -> Result<Option<Redirect>, StorageError> {
        self.lookups.lock().push(source_path.to_string());
        let redirects = self.redirects.read();
        let candidates = langcode.lookup_candidates();
        Ok(candidates.iter().find_map(|lang| {
            redirects
                .iter()
                .find(|r| r.source_path == source_path && &r.query == query && &r.langcode == lang)
                .cloned()
        }))
    }
}

/// Backend whose every call fails with a query error.
#[derive(Debug, Default)]
pub struct FailingBackend;

fn broken() -> StorageError {
    StorageError::query("failing", "backend unavailable")
}

#[async_trait]
impl AliasBackend for FailingBackend {
    async fn insert(&self, _fields: &AliasFields) -> Result<AliasId, StorageError> {
        Err(broken())
    }

    async fn update(&self, _pid: AliasId, _fields: &AliasFields) -> Result<u64, StorageError> {
        Err(broken())
    }

    async fn select(&self, _query: &AliasQuery) -> Result<Vec<AliasRecord>, StorageError> {
        Err(broken())
    }

    async fn list(&self, _filter: &ListFilter) -> Result<Vec<AliasRecord>, StorageError> {
        Err(broken())
    }

    async fn ensure_schema(&self) -> Result<bool, StorageError> {
        Err(broken())
    }
}
