//! Context resolution for contextual URL aliases.
//!
//! This crate provides:
//!
//! - [`ContextResolverRegistry`]: resolvers in registration order, first
//!   non-empty answer wins
//! - [`RequestContexts`]: per-request memoization of the current context and
//!   of source-path contexts
//! - [`ConfiguredContextResolver`]: a resolver driven by `[contexts]`
//!   configuration and `CA_CURRENT_CONTEXT`
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use context::{ConfiguredContextResolver, ContextResolverRegistry, RequestContexts};
//!
//! let registry = Arc::new(
//!     ContextResolverRegistry::new()
//!         .with_resolver(Arc::new(ConfiguredContextResolver::from_config(&config.contexts)?)),
//! );
//! let contexts = RequestContexts::new(registry);
//! println!("Current: {:?}", contexts.current_context());
//! ```

mod registry;
mod request;
mod resolver;

pub use registry::ContextResolverRegistry;
pub use request::RequestContexts;
pub use resolver::{CURRENT_CONTEXT_ENV, ConfiguredContextResolver};
