//! # Contextual Alias Core
//!
//! Shared types, traits, and utilities for the contextual alias system.
//!
//! This crate provides:
//! - Alias records, identifiers, language codes and context identifiers
//! - The condition model the alias store builds its queries from
//! - Collaborator traits: context resolvers, alias backends, save hooks,
//!   cache invalidation and legacy redirect lookup
//! - Path helpers (LIKE escaping, context segment splitting)
//!
//! # Best Practices
//!
//! - Uses Rust Edition 2024
//! - Comprehensive error handling with `thiserror` (see the `errors` crate)

pub mod paths;
pub mod traits;
pub mod types;

// Re-export commonly used types for convenience
pub use traits::{
    AliasBackend, AliasContextResolver, CacheInvalidator, RedirectRepository, SaveHook
};
pub use types::{
    AliasFields, AliasId, AliasQuery, AliasRecord, AliasSaveEvent, ContextFilter, ContextId,
    Langcode, ListFilter, MAX_CONTEXT_LENGTH, Redirect, SaveOperation
};
