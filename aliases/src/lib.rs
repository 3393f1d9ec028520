//! # Contextual Aliases
//!
//! URL aliases partitioned by context. The same alias text can point at
//! different sources in different contexts, and lookups see the current
//! context plus the global layer.
//!
//! This crate provides:
//! - [`AliasContextStore`]: context-aware save, load and lookups
//! - [`AliasUniquifier`]: collision checks scoped to the source's context
//! - [`ContextualRedirectRepository`]: redirect lookup with a context prefix
//! - [`AliasServices`]: shared collaborators, one store per request
//! - [`telemetry::init_tracing`]: fmt subscriber filtered by `logging_level`
//!
//! # Example
//!
//! ```rust,ignore
//! use aliases::{AliasServices, SaveRequest};
//! use alias_core::Langcode;
//!
//! let services = AliasServices::from_config(&config, vec![]).await?;
//! let store = services.store();
//! store.save(SaveRequest::new("/node/1", "/about", Langcode::new("en"))).await?;
//! let source = store.lookup_path_source("/about", &Langcode::new("en")).await;
//! ```

mod redirect;
mod store;
pub mod telemetry;
mod uniquifier;
mod wiring;

pub use redirect::ContextualRedirectRepository;
pub use store::{
    AliasContextStore, ContextOverride, LoadConditions, ROUTE_MATCH_TAG, SaveRequest, SavedAlias
};
pub use uniquifier::AliasUniquifier;
pub use wiring::AliasServices;
