//! PostgreSQL alias backend.

use std::time::Duration;

use alias_core::paths::escape_like;
use alias_core::{
    AliasBackend, AliasFields, AliasId, AliasQuery, AliasRecord, ContextFilter, ContextId,
    Langcode, ListFilter,
};
use async_trait::async_trait;
use config::PostgresConfig;
use errors::StorageError;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{Pool, Postgres, Row};
use tracing::{debug, info};

const BACKEND: &str = "postgres";
const TABLE: &str = "url_alias";

const UNDEFINED_TABLE: &str = "42P01";
const UNIQUE_VIOLATION: &str = "23505";

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS url_alias (
    pid BIGSERIAL PRIMARY KEY,
    source VARCHAR(255) NOT NULL DEFAULT '',
    alias VARCHAR(255) NOT NULL DEFAULT '',
    langcode VARCHAR(12) NOT NULL DEFAULT '',
    context VARCHAR(32) NULL
)";

const CREATE_SLOT_INDEX: &str = "CREATE UNIQUE INDEX IF NOT EXISTS idx_url_alias_slot
    ON url_alias (LOWER(alias), langcode, COALESCE(context, ''))";

const CREATE_ALIAS_INDEX: &str = "CREATE INDEX IF NOT EXISTS idx_url_alias_alias_langcode_context
    ON url_alias (alias, langcode, context)";

const CREATE_SOURCE_INDEX: &str = "CREATE INDEX IF NOT EXISTS idx_url_alias_source_langcode
    ON url_alias (source, langcode, pid)";

const SELECT_ALIASES: &str = "SELECT pid, source, alias, langcode, context FROM url_alias
    WHERE ($1::BIGINT IS NULL OR pid = $1)
      AND (cardinality($2::TEXT[]) = 0
           OR LOWER(source) = ANY(SELECT LOWER(s) FROM UNNEST($2::TEXT[]) AS s))
      AND ($3::TEXT IS NULL OR LOWER(source) <> LOWER($3))
      AND ($4::TEXT IS NULL OR LOWER(alias) = LOWER($4))
      AND (cardinality($5::TEXT[]) = 0 OR langcode = ANY($5::TEXT[]))
      AND (CASE $6::TEXT
             WHEN 'global' THEN context IS NULL
             WHEN 'exact' THEN context = $7
             WHEN 'exact_or_global' THEN (context = $7 OR context IS NULL)
             ELSE TRUE
           END)
    ORDER BY pid ASC
    LIMIT $8";

const LIST_ALIASES: &str = "SELECT pid, source, alias, langcode, context FROM url_alias
    WHERE ($1::TEXT IS NULL OR alias ILIKE '%' || $1 || '%' ESCAPE '\\')
    ORDER BY alias ASC, pid ASC
    OFFSET $2 LIMIT $3";

/// Alias rows in the `url_alias` table.
pub struct PostgresAliasBackend {
    pool: Pool<Postgres>,
}

impl PostgresAliasBackend {
    pub async fn connect(config: &PostgresConfig) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.pool_size)
            .acquire_timeout(Duration::from_secs(config.timeout_seconds))
            .connect(&config.connection_url())
            .await
            .map_err(|e| StorageError::connection(BACKEND, e.to_string()))?;
        info!(
            "Connected to PostgreSQL at {}:{}/{}",
            config.host, config.port, config.database
        );
        Ok(Self { pool })
    }

    pub fn from_pool(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }

    async fn table_exists(&self) -> Result<bool, StorageError> {
        let row = sqlx::query("SELECT to_regclass('url_alias') IS NOT NULL AS present")
            .fetch_one(&self.pool)
            .await
            .map_err(classify)?;
        row.try_get("present").map_err(classify)
    }
}

/// Map driver errors onto the storage error kinds the alias store acts on.
fn classify(err: sqlx::Error) -> StorageError {
    if let Some(db) = err.as_database_error() {
        match db.code().as_deref() {
            Some(UNDEFINED_TABLE) => {
                return StorageError::TableMissing {
                    backend: BACKEND.to_string(),
                    table: TABLE.to_string(),
                };
            }
            Some(UNIQUE_VIOLATION) => {
                return StorageError::Conflict {
                    backend: BACKEND.to_string(),
                    reason: db.message().to_string(),
                };
            }
            _ => {}
        }
    }
    match &err {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StorageError::connection(BACKEND, err.to_string())
        }
        _ => StorageError::query(BACKEND, err.to_string()),
    }
}

fn context_mode(filter: &ContextFilter) -> (&'static str, Option<&str>) {
    match filter {
        ContextFilter::Any => ("any", None),
        ContextFilter::Global => ("global", None),
        ContextFilter::Exactly(ctx) => ("exact", Some(ctx.as_str())),
        ContextFilter::ExactOrGlobal(ctx) => ("exact_or_global", Some(ctx.as_str())),
    }
}

fn to_i64(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn record_from_row(row: &PgRow) -> Result<AliasRecord, StorageError> {
    let context: Option<String> = row.try_get("context").map_err(classify)?;
    Ok(AliasRecord {
        pid: AliasId::new(row.try_get("pid").map_err(classify)?),
        source: row.try_get("source").map_err(classify)?,
        alias: row.try_get("alias").map_err(classify)?,
        langcode: Langcode::new(row.try_get::<String, _>("langcode").map_err(classify)?),
        context: context.and_then(ContextId::new),
    })
}

#[async_trait]
impl AliasBackend for PostgresAliasBackend {
    async fn insert(&self, fields: &AliasFields) -> Result<AliasId, StorageError> {
        let row = sqlx::query(
            "INSERT INTO url_alias (source, alias, langcode, context)
             VALUES ($1, $2, $3, $4)
             RETURNING pid",
        )
        .bind(&fields.source)
        .bind(&fields.alias)
        .bind(fields.langcode.as_str())
        .bind(fields.context.as_ref().map(ContextId::as_str))
        .fetch_one(&self.pool)
        .await
        .map_err(classify)?;

        let pid: i64 = row.try_get("pid").map_err(classify)?;
        debug!("Inserted url_alias row {}", pid);
        Ok(AliasId::new(pid))
    }

    async fn update(&self, pid: AliasId, fields: &AliasFields) -> Result<u64, StorageError> {
        let result = sqlx::query(
            "UPDATE url_alias SET source = $1, alias = $2, langcode = $3, context = $4
             WHERE pid = $5",
        )
        .bind(&fields.source)
        .bind(&fields.alias)
        .bind(fields.langcode.as_str())
        .bind(fields.context.as_ref().map(ContextId::as_str))
        .bind(pid.get())
        .execute(&self.pool)
        .await
        .map_err(classify)?;

        Ok(result.rows_affected())
    }

    async fn select(&self, query: &AliasQuery) -> Result<Vec<AliasRecord>, StorageError> {
        let (mode, context) = context_mode(&query.context);
        let langcodes: Vec<String> = query.langcodes.iter().map(Langcode::to_string).collect();

        let rows = sqlx::query(SELECT_ALIASES)
            .bind(query.pid.map(AliasId::get))
            .bind(&query.sources)
            .bind(query.exclude_source.as_deref())
            .bind(query.alias.as_deref())
            .bind(&langcodes)
            .bind(mode)
            .bind(context)
            .bind(query.limit.map(to_i64))
            .fetch_all(&self.pool)
            .await
            .map_err(classify)?;

        rows.iter().map(record_from_row).collect()
    }

    async fn list(&self, filter: &ListFilter) -> Result<Vec<AliasRecord>, StorageError> {
        let rows = sqlx::query(LIST_ALIASES)
            .bind(filter.alias_contains.as_deref().map(escape_like))
            .bind(to_i64(filter.offset))
            .bind(to_i64(filter.limit))
            .fetch_all(&self.pool)
            .await
            .map_err(classify)?;

        rows.iter().map(record_from_row).collect()
    }

    async fn ensure_schema(&self) -> Result<bool, StorageError> {
        let existed = self.table_exists().await?;

        for statement in [
            CREATE_TABLE,
            CREATE_SLOT_INDEX,
            CREATE_ALIAS_INDEX,
            CREATE_SOURCE_INDEX,
        ] {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(classify)?;
        }

        if !existed {
            info!("Created {} table", TABLE);
        }
        Ok(!existed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_mode() {
        let one = ContextId::new("one").unwrap();
        assert_eq!(context_mode(&ContextFilter::Any), ("any", None));
        assert_eq!(context_mode(&ContextFilter::Global), ("global", None));
        assert_eq!(
            context_mode(&ContextFilter::Exactly(one.clone())),
            ("exact", Some("one"))
        );
        assert_eq!(
            context_mode(&ContextFilter::ExactOrGlobal(one)),
            ("exact_or_global", Some("one"))
        );
    }

    #[test]
    fn test_classify_pool_errors_as_connection_errors() {
        let err = classify(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, StorageError::ConnectionError { .. }));
        assert_eq!(err.backend(), "postgres");
    }

    #[test]
    fn test_classify_other_errors_as_query_errors() {
        let err = classify(sqlx::Error::RowNotFound);
        assert!(matches!(err, StorageError::QueryError { .. }));
    }

    #[test]
    fn test_usize_conversion_saturates() {
        assert_eq!(to_i64(50), 50);
        assert_eq!(to_i64(usize::MAX), i64::MAX);
    }
}
