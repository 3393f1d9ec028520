//! # Contextual Alias Errors
//!
//! Error handling for the contextual alias system.
//!
//! - Uses `thiserror` for structured error definitions
//! - Named fields on every variant so messages stay self-describing
//! - Storage errors carry the backend name for log correlation

use thiserror::Error;

/// Errors surfaced by the alias store to its callers.
#[derive(Debug, Error)]
pub enum AliasError {
    #[error("Invalid input: {field} reason: {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Alias storage unavailable: {reason}")]
    StorageUnavailable { reason: String },

    #[error("Alias {alias} already exists for language {langcode} in context {context}")]
    Duplicate {
        alias: String,
        langcode: String,
        context: String
    },

    #[error("Alias not found: {pid}")]
    NotFound { pid: i64 },

    #[error(transparent)]
    Storage(#[from] StorageError)
}

impl AliasError {
    pub fn invalid_input(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            reason: reason.into()
        }
    }
}

/// Storage layer errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Table {table} is missing on {backend}")]
    TableMissing { backend: String, table: String },

    #[error("Unique constraint violated on {backend}: {reason}")]
    Conflict { backend: String, reason: String },

    #[error("Connection to {backend} failed: {reason}")]
    ConnectionError { backend: String, reason: String },

    #[error("Query on {backend} failed: {reason}")]
    QueryError { backend: String, reason: String },

    #[error("Serialization error: {error_type} - {reason}")]
    SerializationError { error_type: String, reason: String }
}

impl StorageError {
    pub fn query(backend: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::QueryError {
            backend: backend.into(),
            reason: reason.into()
        }
    }

    pub fn connection(backend: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConnectionError {
            backend: backend.into(),
            reason: reason.into()
        }
    }

    /// True when the backing table/collection does not exist yet.
    pub fn is_table_missing(&self) -> bool {
        matches!(self, Self::TableMissing { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    pub fn backend(&self) -> &str {
        match self {
            Self::TableMissing { backend, .. }
            | Self::Conflict { backend, .. }
            | Self::ConnectionError { backend, .. }
            | Self::QueryError { backend, .. } => backend,
            Self::SerializationError { .. } => "serde"
        }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError {
            error_type: "json".to_string(),
            reason: err.to_string()
        }
    }
}

/// Result type alias for alias store operations
pub type AliasResult<T> = Result<T, AliasError>;
