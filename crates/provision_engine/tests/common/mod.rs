//! Shared resource types and helpers for engine integration tests.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use provision_engine::prelude::*;
use provision_store::{MemStore, Record, Store, UserId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub const USER: UserId = UserId::new(0);
pub const SPACE: &str = "default";

/// Exclusive resource: a disk can be attached to one VM at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ResourceData)]
#[serde(rename_all = "PascalCase")]
pub struct Disk {
    pub path: String,
    pub size: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ResourceData)]
#[resource(name = "VM")]
#[serde(rename_all = "PascalCase")]
pub struct Vm {
    pub disks: Vec<String>,
    pub networks: Vec<String>,
}

/// Inclusive resource: any number of VMs (or peered networks) may use one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ResourceData)]
#[serde(rename_all = "PascalCase")]
pub struct Network {
    pub cidr: String,
    pub peers: Vec<String>,
}

async fn disk_create(ctx: Context, size: u64) -> Result<Void, EngineError> {
    ctx.set(&Disk {
        path: format!("/dev/{size}.disk"),
        size,
    })?;
    Ok(Void)
}

async fn noop(_ctx: Context, _: Void) -> Result<Void, EngineError> {
    Ok(Void)
}

async fn vm_create(ctx: Context, _: Void) -> Result<Void, EngineError> {
    ctx.set(&Vm::default())?;
    Ok(Void)
}

async fn vm_add_disk(ctx: Context, disk: String) -> Result<Void, EngineError> {
    let mut vm: Vm = ctx.current()?;
    let scope = ctx.reserve([&disk])?;
    vm.disks.push(disk);
    ctx.set(&vm)?;
    scope.commit()?;
    Ok(Void)
}

async fn vm_del_disk(ctx: Context, disk: String) -> Result<Void, EngineError> {
    let mut vm: Vm = ctx.current()?;
    let scope = ctx.release([&disk])?;
    vm.disks.retain(|d| d != &disk);
    ctx.set(&vm)?;
    scope.commit()?;
    Ok(Void)
}

async fn vm_connect(ctx: Context, network: String) -> Result<Void, EngineError> {
    let mut vm: Vm = ctx.current()?;
    let scope = ctx.reserve([&network])?;
    vm.networks.push(network);
    ctx.set(&vm)?;
    scope.commit()?;
    Ok(Void)
}

async fn vm_disconnect(ctx: Context, network: String) -> Result<Void, EngineError> {
    let mut vm: Vm = ctx.current()?;
    let scope = ctx.release([&network])?;
    vm.networks.retain(|n| n != &network);
    ctx.set(&vm)?;
    scope.commit()?;
    Ok(Void)
}

/// Returns the ids currently attached, so tests can verify the VM
/// side of an edge.
async fn vm_show(ctx: Context, _: Void) -> Result<Vm, EngineError> {
    ctx.current()
}

async fn network_create(ctx: Context, cidr: String) -> Result<Void, EngineError> {
    ctx.set(&Network {
        cidr,
        peers: Vec::new(),
    })?;
    Ok(Void)
}

async fn network_peer(ctx: Context, peer: String) -> Result<Void, EngineError> {
    let mut network: Network = ctx.current()?;
    let scope = ctx.reserve([&peer])?;
    network.peers.push(peer);
    ctx.set(&network)?;
    scope.commit()?;
    Ok(Void)
}

pub fn disk_type() -> ResourceType {
    ResourceBuilder::<Disk>::new()
        .exclusive()
        .with_action("create", Action::new(disk_create).must_not_exist())
        .with_delete(Action::new(noop))
        .build()
}

pub fn vm_type() -> ResourceType {
    ResourceBuilder::<Vm>::new()
        .with_action("create", Action::new(vm_create).must_not_exist())
        .with_action(
            "add-disk",
            Action::new(vm_add_disk).uses(|disk: &String| vec![disk.clone()]),
        )
        .with_action(
            "del-disk",
            Action::new(vm_del_disk).uses(|disk: &String| vec![disk.clone()]),
        )
        .with_action(
            "connect",
            Action::new(vm_connect).uses(|network: &String| vec![network.clone()]),
        )
        .with_action(
            "disconnect",
            Action::new(vm_disconnect).uses(|network: &String| vec![network.clone()]),
        )
        .with_action("show", Action::new(vm_show))
        .with_delete(Action::new(noop))
        .build()
}

pub fn network_type() -> ResourceType {
    ResourceBuilder::<Network>::new()
        .with_action("create", Action::new(network_create).must_not_exist())
        .with_action(
            "peer",
            Action::new(network_peer).uses(|peer: &String| vec![peer.clone()]),
        )
        .with_delete(Action::new(noop))
        .build()
}

/// An engine with `Disk`, `VM` and `Network` registered over a fresh store
/// holding the default space.
pub fn engine() -> (Engine, Arc<MemStore>) {
    let store = Arc::new(MemStore::new());
    store
        .space_create(USER, SPACE)
        .expect("fresh store accepts the default space");

    let engine = Engine::builder(store.clone())
        .resource(disk_type())
        .resource(vm_type())
        .resource(network_type())
        .build();
    (engine, store)
}

/// Sends `input` as the payload of `action` on `kind/id` in the default space.
pub async fn call<T: Serialize>(
    engine: &Engine,
    kind: &str,
    action: &str,
    id: &str,
    input: T,
) -> Result<Response, EngineError> {
    let request = Request::new(kind, USER, SPACE, action, id).with_input(&input)?;
    engine.handle(CancellationToken::new(), request).await
}

pub fn record(store: &MemStore, id: &str) -> Record {
    store
        .resource_get(USER, SPACE, id)
        .expect("record exists")
}

pub fn masters(store: &MemStore, id: &str) -> Vec<String> {
    record(store, id).masters
}

pub fn count(store: &MemStore) -> usize {
    store
        .resource_list(USER, SPACE)
        .expect("default space exists")
        .len()
}
