//! Example provisioning node built with provision.
//!
//! Registers three resource types on an in-memory store:
//!
//! | Type      | Exclusive | Actions                                                     |
//! |-----------|-----------|-------------------------------------------------------------|
//! | `Disk`    | yes       | `create`, `delete`                                          |
//! | `VM`      | no        | `create`, `show`, `add-disk`, `del-disk`, `connect`, `disconnect`, `delete` |
//! | `Network` | no        | `create`, `delete`                                          |
//!
//! A disk can back one VM at a time; a network can be joined by any number
//! of VMs. Neither can be deleted while something still uses it, and a VM
//! must release both before it can be deleted.

pub mod resources;
mod scenario;

pub use scenario::{Expect, ScenarioError, Step, run, walkthrough};

use provision_engine::Engine;
use provision_store::Store;
use std::sync::Arc;

/// Builds the node's engine over `store`.
#[must_use]
pub fn node(store: Arc<dyn Store>) -> Engine {
    Engine::builder(store)
        .resource(resources::disk())
        .resource(resources::vm())
        .resource(resources::network())
        .build()
}
