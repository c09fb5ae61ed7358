//! Persistence boundary for the provision engine.
//!
//! The engine never persists anything itself. It talks to a pluggable
//! [`Store`] that owns three kinds of state:
//!
//! - **Spaces** - named namespaces owned by a [`UserId`]
//! - **Records** - persisted resource instances ([`Record`]) inside a space
//! - **Dependency edges** - the `masters` set of each record
//!
//! Resource handlers never see the full [`Store`]. They receive a
//! [`ScopedStore`] bound to a single object, which can only write that
//! object and read its siblings in the same space.
//!
//! [`MemStore`] is the in-memory reference implementation, used by tests and
//! by single-process deployments that do not need durability.
//!
//! # Example
//!
//! ```
//! use provision_store::{MemStore, Store, UserId};
//!
//! let store = MemStore::new();
//! let user = UserId::new(0);
//!
//! store.space_create(user, "default").unwrap();
//! store
//!     .resource_set(user, "default", "disk0", "Disk", br#"{"size":500}"#.to_vec())
//!     .unwrap();
//!
//! let record = store.resource_get(user, "default", "disk0").unwrap();
//! assert_eq!(record.kind, "Disk");
//! assert!(record.masters.is_empty());
//! ```

/// Errors returned by store implementations.
pub mod error;

/// In-memory store implementation.
pub mod memory;

/// Persisted record and tenant identifiers.
pub mod record;

/// The store contract and the object-scoped view.
pub mod store;

pub use error::StoreError;
pub use memory::MemStore;
pub use record::{Record, UserId};
pub use store::{ScopedStore, Store};
