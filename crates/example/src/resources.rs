//! Resource types managed by the node.

use provision_engine::{
    Action, Context, EngineError, ResourceBuilder, ResourceData, ResourceType, Void,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation failures raised by the handlers below.
#[derive(Debug, Error)]
pub enum ResourceError {
    /// Disks must have a non-zero size.
    #[error("disk size must be greater than zero")]
    EmptyDisk,
    /// The network CIDR is not of the form `a.b.c.d/len`.
    #[error("invalid CIDR '{0}'")]
    InvalidCidr(String),
}

/// A block device. Exclusive: it can be attached to one VM at a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ResourceData)]
#[serde(rename_all = "PascalCase")]
pub struct Disk {
    /// Device path on the node.
    pub path: String,
    /// Size in gigabytes.
    pub size: u64,
}

/// A virtual machine. Masters any number of disks and networks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ResourceData)]
#[resource(name = "VM")]
#[serde(rename_all = "PascalCase")]
pub struct Vm {
    /// Attached disk ids, in attach order.
    pub disks: Vec<String>,
    /// Connected network ids.
    pub networks: Vec<String>,
}

/// A private network. Inclusive: any number of VMs can join it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ResourceData)]
#[serde(rename_all = "PascalCase")]
pub struct Network {
    /// Address range, e.g. `10.0.0.0/24`.
    pub cidr: String,
}

async fn disk_create(ctx: Context, size: u64) -> Result<Void, EngineError> {
    if size == 0 {
        return Err(EngineError::handler(ResourceError::EmptyDisk));
    }
    let disk = Disk {
        path: format!("/dev/{size}.disk"),
        size,
    };
    tracing::info!(disk = ctx.object(), path = %disk.path, "allocating disk");
    ctx.set(&disk)?;
    Ok(Void)
}

async fn disk_delete(ctx: Context, _: Void) -> Result<Void, EngineError> {
    let disk: Disk = ctx.current()?;
    tracing::info!(disk = ctx.object(), path = %disk.path, "releasing disk");
    Ok(Void)
}

async fn vm_create(ctx: Context, _: Void) -> Result<Void, EngineError> {
    ctx.set(&Vm::default())?;
    Ok(Void)
}

async fn vm_show(ctx: Context, _: Void) -> Result<Vm, EngineError> {
    ctx.current()
}

async fn vm_delete(ctx: Context, _: Void) -> Result<Void, EngineError> {
    tracing::info!(vm = ctx.object(), "destroying VM");
    Ok(Void)
}

async fn vm_add_disk(ctx: Context, disk: String) -> Result<Void, EngineError> {
    let mut vm: Vm = ctx.current()?;
    let scope = ctx.reserve([&disk])?;
    if !vm.disks.contains(&disk) {
        vm.disks.push(disk);
    }
    ctx.set(&vm)?;
    scope.commit()?;
    Ok(Void)
}

async fn vm_del_disk(ctx: Context, disk: String) -> Result<Void, EngineError> {
    let mut vm: Vm = ctx.current()?;
    let scope = ctx.release([&disk])?;
    vm.disks.retain(|attached| attached != &disk);
    ctx.set(&vm)?;
    scope.commit()?;
    Ok(Void)
}

async fn vm_connect(ctx: Context, network: String) -> Result<Void, EngineError> {
    let mut vm: Vm = ctx.current()?;
    let scope = ctx.reserve([&network])?;
    if !vm.networks.contains(&network) {
        vm.networks.push(network);
    }
    ctx.set(&vm)?;
    scope.commit()?;
    Ok(Void)
}

async fn vm_disconnect(ctx: Context, network: String) -> Result<Void, EngineError> {
    let mut vm: Vm = ctx.current()?;
    let scope = ctx.release([&network])?;
    vm.networks.retain(|joined| joined != &network);
    ctx.set(&vm)?;
    scope.commit()?;
    Ok(Void)
}

async fn network_create(ctx: Context, cidr: String) -> Result<Void, EngineError> {
    if !valid_cidr(&cidr) {
        return Err(EngineError::handler(ResourceError::InvalidCidr(cidr)));
    }
    ctx.set(&Network { cidr })?;
    Ok(Void)
}

async fn network_delete(_ctx: Context, _: Void) -> Result<Void, EngineError> {
    Ok(Void)
}

fn valid_cidr(cidr: &str) -> bool {
    let Some((addr, len)) = cidr.split_once('/') else {
        return false;
    };
    let octets: Vec<&str> = addr.split('.').collect();
    octets.len() == 4
        && octets.iter().all(|octet| octet.parse::<u8>().is_ok())
        && len.parse::<u8>().is_ok_and(|len| len <= 32)
}

/// The `Disk` resource type.
#[must_use]
pub fn disk() -> ResourceType {
    ResourceBuilder::<Disk>::new()
        .exclusive()
        .with_action("create", Action::new(disk_create).must_not_exist())
        .with_delete(Action::new(disk_delete))
        .build()
}

/// The `VM` resource type.
#[must_use]
pub fn vm() -> ResourceType {
    ResourceBuilder::<Vm>::new()
        .with_action("create", Action::new(vm_create).must_not_exist())
        .with_action("show", Action::new(vm_show))
        .with_action(
            "add-disk",
            Action::new(vm_add_disk)
                .exclusive()
                .uses(|disk: &String| vec![disk.clone()]),
        )
        .with_action(
            "del-disk",
            Action::new(vm_del_disk)
                .exclusive()
                .uses(|disk: &String| vec![disk.clone()]),
        )
        .with_action(
            "connect",
            Action::new(vm_connect)
                .exclusive()
                .uses(|network: &String| vec![network.clone()]),
        )
        .with_action(
            "disconnect",
            Action::new(vm_disconnect)
                .exclusive()
                .uses(|network: &String| vec![network.clone()]),
        )
        .with_delete(Action::new(vm_delete))
        .build()
}

/// The `Network` resource type.
#[must_use]
pub fn network() -> ResourceType {
    ResourceBuilder::<Network>::new()
        .with_action("create", Action::new(network_create).must_not_exist())
        .with_delete(Action::new(network_delete))
        .build()
}
