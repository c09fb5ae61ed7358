//! Procedural macros for `provision_engine`.
//!
//! This crate provides `#[derive(ResourceData)]` for naming the data shape
//! of a resource type.

mod engine_path;
mod resource_data;

use proc_macro::TokenStream;

/// Derive macro for the `ResourceData` trait.
///
/// Generates an implementation of [`provision_engine::ResourceData`] for the
/// annotated type, giving it the resource type name it is registered and
/// persisted under.
///
/// # Attributes
///
/// - `name` (optional): The registered type name. Defaults to the type's
///   identifier.
///
/// # Example
///
/// ```ignore
/// use serde::{Serialize, Deserialize};
/// use provision_engine::ResourceData;
///
/// #[derive(Serialize, Deserialize, ResourceData)]
/// #[resource(name = "VM")]
/// struct Vm {
///     disks: Vec<String>,
/// }
/// ```
#[proc_macro_derive(ResourceData, attributes(resource))]
pub fn derive_resource_data(input: TokenStream) -> TokenStream {
    resource_data::derive_resource_data(input)
}
