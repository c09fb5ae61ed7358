//! # Provision Internal Library
//!
//! Re-exports the core provision crates for convenience.

/// Persistence boundary: spaces, records and dependency edges.
pub use provision_store;

/// Resource types, actions and request dispatch.
pub use provision_engine;

/// Tracing setup and environment configuration.
pub use provision_core;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use provision_core::{TracingConfig, TracingFormat};
    pub use provision_engine::prelude::*;
    pub use provision_store::{MemStore, Record, ScopedStore, Store, UserId};
}
