//! Shared test fixtures for the contextual alias workspace.
//!
//! - PostgreSQL and Redis testcontainers, started once per test process and
//!   skipped (`None`) when Docker is unavailable
//! - Scriptable resolvers, hooks, invalidators and redirect repositories

mod doubles;
mod fixtures;

pub use doubles::*;
pub use fixtures::*;
