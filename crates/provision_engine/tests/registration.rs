//! Resource type registration.

mod common;

use provision_engine::prelude::*;
use provision_engine::{DELETE_ACTION, ResourceFlags, ServiceFlags};
use provision_store::MemStore;
use std::sync::Arc;

#[test]
fn derived_type_names() {
    assert_eq!(common::Disk::type_name(), "Disk");
    assert_eq!(common::Vm::type_name(), "VM");
    assert_eq!(common::Network::type_name(), "Network");
}

#[test]
fn action_flags_survive_registration() {
    let (engine, _store) = common::engine();
    let disk = engine.resource_type("Disk").unwrap();
    assert_eq!(disk.flags(), ResourceFlags::EXCLUSIVE);

    let create = disk.action("create").unwrap().flags();
    assert!(create.must_not_exist());
    assert!(!create.contains(ServiceFlags::EXCLUSIVE));
    assert!(create.needs_write_lock());

    let delete = disk.action(DELETE_ACTION).unwrap().flags();
    assert!(!delete.must_not_exist());
    assert!(delete.contains(ServiceFlags::EXCLUSIVE));
    assert!(delete.needs_write_lock());

    let show = engine
        .resource_type("VM")
        .unwrap()
        .action("show")
        .unwrap()
        .flags();
    assert!(!show.needs_write_lock());
}

#[test]
#[should_panic(expected = "Resource type 'VM' is already registered")]
fn duplicate_type_name_panics() {
    let _ = Engine::builder(Arc::new(MemStore::new()))
        .resource(common::vm_type())
        .resource(common::vm_type());
}

#[test]
fn register_in_place() {
    let mut builder = Engine::builder(Arc::new(MemStore::new()));
    builder.register(common::disk_type());
    builder.register(common::network_type());

    let engine = builder.build();
    assert_eq!(engine.resource_types(), vec!["Disk", "Network"]);
    assert!(engine.resource_type("VM").is_none());
}
