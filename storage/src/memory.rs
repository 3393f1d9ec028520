//! In-process alias backend.
//!
//! Mirrors the PostgreSQL backend's semantics (case-insensitive literal
//! matching, the `(alias, langcode, context)` uniqueness rule, lazy table
//! provisioning) so the alias store behaves the same on both.

use std::collections::BTreeMap;

use alias_core::{AliasBackend, AliasFields, AliasId, AliasQuery, AliasRecord, ListFilter};
use async_trait::async_trait;
use errors::StorageError;
use parking_lot::RwLock;

const BACKEND: &str = "memory";
const TABLE: &str = "url_alias";

#[derive(Debug)]
struct State {
    rows: BTreeMap<i64, AliasRecord>,
    next_pid: i64,
    provisioned: bool,
}

/// Alias rows kept in a `BTreeMap` keyed by id.
#[derive(Debug)]
pub struct InMemoryAliasBackend {
    state: RwLock<State>,
}

impl Default for InMemoryAliasBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryAliasBackend {
    /// A backend whose table already exists.
    pub fn new() -> Self {
        Self::with_provisioned(true)
    }

    /// A backend whose table does not exist until `ensure_schema` runs.
    pub fn unprovisioned() -> Self {
        Self::with_provisioned(false)
    }

    fn with_provisioned(provisioned: bool) -> Self {
        Self {
            state: RwLock::new(State {
                rows: BTreeMap::new(),
                next_pid: 1,
                provisioned,
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.state.read().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn table_missing() -> StorageError {
    StorageError::TableMissing {
        backend: BACKEND.to_string(),
        table: TABLE.to_string(),
    }
}

fn conflict(fields: &AliasFields) -> StorageError {
    StorageError::Conflict {
        backend: BACKEND.to_string(),
        reason: format!(
            "alias {} exists for langcode {} in context {:?}",
            fields.alias, fields.langcode, fields.context
        ),
    }
}

#[async_trait]
impl AliasBackend for InMemoryAliasBackend {
    async fn insert(&self, fields: &AliasFields) -> Result<AliasId, StorageError> {
        let mut state = self.state.write();
        if !state.provisioned {
            return Err(table_missing());
        }
        if state.rows.values().any(|r| r.fields().collides_with(fields)) {
            return Err(conflict(fields));
        }

        let pid = AliasId::new(state.next_pid);
        state.next_pid += 1;
        state
            .rows
            .insert(pid.get(), fields.clone().into_record(pid));
        Ok(pid)
    }

    async fn update(&self, pid: AliasId, fields: &AliasFields) -> Result<u64, StorageError> {
        let mut state = self.state.write();
        if !state.provisioned {
            return Err(table_missing());
        }
        if !state.rows.contains_key(&pid.get()) {
            return Ok(0);
        }
        let collides = state
            .rows
            .values()
            .any(|r| r.pid != pid && r.fields().collides_with(fields));
        if collides {
            return Err(conflict(fields));
        }

        state
            .rows
            .insert(pid.get(), fields.clone().into_record(pid));
        Ok(1)
    }

    async fn select(&self, query: &AliasQuery) -> Result<Vec<AliasRecord>, StorageError> {
        let state = self.state.read();
        if !state.provisioned {
            return Err(table_missing());
        }
        let matching = state.rows.values().filter(|r| query.matches(r)).cloned();
        Ok(match query.limit {
            Some(limit) => matching.take(limit).collect(),
            None => matching.collect(),
        })
    }

    async fn list(&self, filter: &ListFilter) -> Result<Vec<AliasRecord>, StorageError> {
        let state = self.state.read();
        if !state.provisioned {
            return Err(table_missing());
        }
        let mut rows: Vec<AliasRecord> = state
            .rows
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.alias.cmp(&b.alias).then(a.pid.cmp(&b.pid)));
        Ok(rows
            .into_iter()
            .skip(filter.offset)
            .take(filter.limit)
            .collect())
    }

    async fn ensure_schema(&self) -> Result<bool, StorageError> {
        let mut state = self.state.write();
        if state.provisioned {
            return Ok(false);
        }
        state.provisioned = true;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alias_core::{ContextFilter, ContextId, Langcode};

    fn fields(source: &str, alias: &str, ctx: Option<&str>) -> AliasFields {
        AliasFields {
            source: source.to_string(),
            alias: alias.to_string(),
            langcode: Langcode::not_specified(),
            context: ctx.and_then(ContextId::new),
        }
    }

    #[tokio::test]
    async fn test_insert_assigns_increasing_ids() {
        let backend = InMemoryAliasBackend::new();
        let first = backend.insert(&fields("/a", "/A", None)).await.unwrap();
        let second = backend.insert(&fields("/b", "/B", None)).await.unwrap();
        assert!(second > first);
        assert_eq!(backend.len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_slot_is_a_conflict() {
        let backend = InMemoryAliasBackend::new();
        backend.insert(&fields("/a", "/A", Some("one"))).await.unwrap();

        let err = backend
            .insert(&fields("/b", "/a", Some("one")))
            .await
            .unwrap_err();
        assert!(err.is_conflict());

        // Same alias in another context or globally is fine.
        backend.insert(&fields("/b", "/A", Some("two"))).await.unwrap();
        backend.insert(&fields("/c", "/A", None)).await.unwrap();
    }

    #[tokio::test]
    async fn test_update_missing_row_affects_nothing() {
        let backend = InMemoryAliasBackend::new();
        let affected = backend
            .update(AliasId::new(42), &fields("/a", "/A", None))
            .await
            .unwrap();
        assert_eq!(affected, 0);
    }

    #[tokio::test]
    async fn test_update_may_keep_its_own_slot() {
        let backend = InMemoryAliasBackend::new();
        let pid = backend.insert(&fields("/a", "/A", None)).await.unwrap();
        let affected = backend
            .update(pid, &fields("/a2", "/A", None))
            .await
            .unwrap();
        assert_eq!(affected, 1);

        let rows = backend.select(&AliasQuery::new().pid(pid)).await.unwrap();
        assert_eq!(rows[0].source, "/a2");
    }

    #[tokio::test]
    async fn test_select_filters_and_limits() {
        let backend = InMemoryAliasBackend::new();
        backend.insert(&fields("/a", "/A", Some("one"))).await.unwrap();
        backend.insert(&fields("/a", "/A", None)).await.unwrap();
        backend.insert(&fields("/a", "/A", Some("two"))).await.unwrap();

        let one = ContextId::new("one").unwrap();
        let rows = backend
            .select(
                &AliasQuery::new()
                    .source("/A")
                    .context(ContextFilter::ExactOrGlobal(one)),
            )
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].pid < rows[1].pid);

        let rows = backend
            .select(&AliasQuery::new().alias("/a").limit(1))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn test_list_orders_by_alias_and_pages() {
        let backend = InMemoryAliasBackend::new();
        backend.insert(&fields("/c", "/gamma", None)).await.unwrap();
        backend.insert(&fields("/a", "/alpha", None)).await.unwrap();
        backend.insert(&fields("/b", "/beta", None)).await.unwrap();

        let rows = backend
            .list(&ListFilter {
                alias_contains: None,
                offset: 1,
                limit: 5,
            })
            .await
            .unwrap();
        let aliases: Vec<_> = rows.iter().map(|r| r.alias.as_str()).collect();
        assert_eq!(aliases, vec!["/beta", "/gamma"]);

        let rows = backend
            .list(&ListFilter {
                alias_contains: Some("ALP".to_string()),
                ..ListFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn test_unprovisioned_until_schema_is_ensured() {
        let backend = InMemoryAliasBackend::unprovisioned();
        let err = backend.insert(&fields("/a", "/A", None)).await.unwrap_err();
        assert!(err.is_table_missing());
        assert!(
            backend
                .select(&AliasQuery::new())
                .await
                .unwrap_err()
                .is_table_missing()
        );

        assert!(backend.ensure_schema().await.unwrap());
        assert!(!backend.ensure_schema().await.unwrap());
        backend.insert(&fields("/a", "/A", None)).await.unwrap();
    }
}
