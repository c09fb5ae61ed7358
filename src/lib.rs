//! A resource orchestration engine for multi-tenant node provisioning.
//!
//! Resource types (disks, VMs, networks, ...) are registered as typed
//! actions; the engine validates and dispatches requests, serializes access
//! per object and tracks which objects depend on which.

pub use provision_internal::*;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use provision_internal::prelude::*;
}
