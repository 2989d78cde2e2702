//! Core custody scheduling, event aggregation, and cache-consistency
//! engines for a co-parenting family calendar backend.
//!
//! Composes nine cooperating engines behind [`engine::FamilyCalendarEngine`]:
//! a cache coordinator, a relational store gateway, custody generation and
//! mutation, monthly custody queries, external calendar sync, event
//! aggregation, an integrity auditor, and notification fan-out.

pub mod cache;
pub mod config;
pub mod custody;
pub mod db;
pub mod engine;
pub mod error;
pub mod events;
pub mod model;
pub mod notifications;
pub mod sync;

pub use engine::FamilyCalendarEngine;
pub use error::{CoreError, CoreResult};

/// Library version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initializes global tracing, idempotently. Safe to call more than once
/// (e.g. once from the worker binary, once from an embedding HTTP
/// adapter's own startup).
pub fn init() {
    let _ = tracing_subscriber::fmt::try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_not_empty() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn init_does_not_panic() {
        init();
    }
}
