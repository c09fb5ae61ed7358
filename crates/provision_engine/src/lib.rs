//! Generic resource engine.
//!
//! Resource types are registered once at startup as named bundles of typed
//! actions. The engine dispatches `(type, user, space, action, object)`
//! requests to them and takes care of everything around the handler:
//!
//! - **Validation** - the space, object type and action must exist, and the
//!   object must exist unless the action creates it
//! - **Decoding** - opaque JSON payloads become the action's typed input
//! - **Guards** - requests on the same object are serialized, requests on
//!   declared dependencies lock those too, always in ascending key order
//! - **Dependencies** - handlers reserve and release other objects through
//!   their [`Context`]; an object with masters cannot be deleted
//!
//! Persistence is delegated to a [`provision_store::Store`].
//!
//! # Example
//!
//! ```
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! use provision_engine::prelude::*;
//! use provision_store::{MemStore, Store, UserId};
//! use serde::{Deserialize, Serialize};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! #[derive(Serialize, Deserialize, ResourceData)]
//! struct Disk {
//!     size: u64,
//! }
//!
//! async fn create(ctx: Context, size: u64) -> Result<Void, EngineError> {
//!     ctx.set(&Disk { size })?;
//!     Ok(Void)
//! }
//!
//! let store = Arc::new(MemStore::new());
//! store.space_create(UserId::new(0), "default")?;
//!
//! let engine = Engine::builder(store)
//!     .resource(
//!         ResourceBuilder::<Disk>::new()
//!             .exclusive()
//!             .with_action("create", Action::new(create).must_not_exist())
//!             .build(),
//!     )
//!     .build();
//!
//! let request = Request::new("Disk", UserId::new(0), "default", "create", "disk0").with_input(&500)?;
//! engine.handle(CancellationToken::new(), request).await?;
//!
//! let record = engine.store().resource_get(UserId::new(0), "default", "disk0")?;
//! assert_eq!(record.data, br#"{"size":500}"#);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # }).unwrap();
//! ```

extern crate self as provision_engine;

mod context;
mod data;
mod engine;
mod error;
pub mod guard;
mod request;
mod resource;
mod service;

pub use context::{Context, DependencyScope};
pub use data::ResourceData;
pub use engine::{Engine, EngineBuilder};
pub use error::{BoxError, EngineError, ErrorKind};
pub use request::{Payload, Request, ResourceRequest, Response};
pub use resource::{DELETE_ACTION, ResourceBuilder, ResourceFlags, ResourceType};
pub use service::{Action, Handler, IntoService, Service, ServiceFlags, Void};

/// Derives [`ResourceData`], naming the type after the struct unless
/// `#[resource(name = "...")]` says otherwise.
pub use resource_macros::ResourceData;

/// Common imports for resource type authors.
pub mod prelude {
    pub use crate::{
        Action, Context, DependencyScope, Engine, EngineBuilder, EngineError, ErrorKind,
        Payload, Request, Response, ResourceBuilder, ResourceData, ResourceType, Void,
    };
}
