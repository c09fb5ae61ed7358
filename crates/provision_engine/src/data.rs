//! Typed resource payloads.

use serde::Serialize;
use serde::de::DeserializeOwned;

/// The data shape persisted for one resource type.
///
/// The type name is what requests address the type by and what the store
/// records as the object's type tag. Can be derived via
/// `#[derive(ResourceData)]`:
///
/// ```
/// use provision_engine::ResourceData;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize, ResourceData)]
/// #[resource(name = "VM")]
/// struct Vm {
///     disks: Vec<String>,
/// }
///
/// #[derive(Serialize, Deserialize, ResourceData)]
/// struct Disk {
///     size: u64,
/// }
///
/// assert_eq!(Vm::type_name(), "VM");
/// assert_eq!(Disk::type_name(), "Disk");
/// ```
pub trait ResourceData: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Registered name of the resource type.
    fn type_name() -> &'static str;
}
