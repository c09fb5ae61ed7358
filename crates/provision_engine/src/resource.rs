//! Resource types and their builder.
//!
//! A [`ResourceType`] is an immutable bundle of named services plus an
//! exclusivity flag. It is assembled once at startup with a
//! [`ResourceBuilder`] and then registered into an
//! [`EngineBuilder`](crate::EngineBuilder).

use crate::data::ResourceData;
use crate::service::{IntoService, Service, ServiceFlags};
use core::marker::PhantomData;
use indexmap::IndexMap;

/// Name of the action that removes an object. Registered through
/// [`ResourceBuilder::with_delete`].
pub const DELETE_ACTION: &str = "delete";

bitflags::bitflags! {
    /// Flags describing a resource type.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ResourceFlags: u8 {
        /// Instances can be used by at most one master (like a disk). Without
        /// this flag any number of masters may share an instance (like a
        /// network).
        const EXCLUSIVE = 1 << 0;
    }
}

/// A registered class of objects.
pub struct ResourceType {
    name: String,
    flags: ResourceFlags,
    actions: IndexMap<String, Service>,
}

impl core::fmt::Debug for ResourceType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ResourceType")
            .field("name", &self.name)
            .field("flags", &self.flags)
            .field("actions", &self.action_names())
            .finish()
    }
}

impl ResourceType {
    /// Returns the type name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the type flags.
    #[must_use]
    pub fn flags(&self) -> ResourceFlags {
        self.flags
    }

    /// Returns whether instances accept at most one master.
    #[must_use]
    pub fn is_exclusive(&self) -> bool {
        self.flags.contains(ResourceFlags::EXCLUSIVE)
    }

    /// Returns the service registered under `name`.
    #[must_use]
    pub fn action(&self, name: &str) -> Option<&Service> {
        self.actions.get(name)
    }

    /// Returns the action names in registration order.
    #[must_use]
    pub fn action_names(&self) -> Vec<&str> {
        self.actions.keys().map(String::as_str).collect()
    }
}

/// Builder for a [`ResourceType`] whose data shape is `R`.
///
/// # Example
///
/// ```
/// use provision_engine::{Action, Context, EngineError, ResourceBuilder, ResourceData, Void};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize, ResourceData)]
/// struct Disk {
///     size: u64,
/// }
///
/// async fn create(ctx: Context, size: u64) -> Result<Void, EngineError> {
///     ctx.set(&Disk { size })?;
///     Ok(Void)
/// }
///
/// async fn delete(_ctx: Context, _: Void) -> Result<Void, EngineError> {
///     Ok(Void)
/// }
///
/// let disk = ResourceBuilder::<Disk>::new()
///     .exclusive()
///     .with_action("create", Action::new(create).must_not_exist())
///     .with_delete(Action::new(delete))
///     .build();
///
/// assert_eq!(disk.name(), "Disk");
/// assert!(disk.is_exclusive());
/// assert_eq!(disk.action_names(), vec!["create", "delete"]);
/// ```
pub struct ResourceBuilder<R> {
    name: String,
    flags: ResourceFlags,
    actions: IndexMap<String, Service>,
    _marker: PhantomData<fn() -> R>,
}

impl<R: ResourceData> Default for ResourceBuilder<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: ResourceData> ResourceBuilder<R> {
    /// Starts a builder named after [`R::type_name`](ResourceData::type_name).
    #[must_use]
    pub fn new() -> Self {
        Self {
            name: R::type_name().to_owned(),
            flags: ResourceFlags::empty(),
            actions: IndexMap::new(),
            _marker: PhantomData,
        }
    }

    /// Makes the type exclusive: each instance accepts a single master.
    #[must_use]
    pub fn exclusive(mut self) -> Self {
        self.flags |= ResourceFlags::EXCLUSIVE;
        self
    }

    /// Adds type flags.
    #[must_use]
    pub fn with_flags(mut self, flags: ResourceFlags) -> Self {
        self.flags |= flags;
        self
    }

    /// Registers `action` under `name`.
    ///
    /// # Panics
    ///
    /// Panics if `name` is already registered on this type, or if it is
    /// [`DELETE_ACTION`] (use [`with_delete`](Self::with_delete) instead).
    #[must_use]
    pub fn with_action(self, name: impl Into<String>, action: impl IntoService) -> Self {
        let name = name.into();
        assert!(
            name != DELETE_ACTION,
            "Action '{DELETE_ACTION}' on resource type '{}' must be registered with with_delete",
            self.name
        );
        self.insert(name, action.into_service())
    }

    /// Registers the delete path.
    ///
    /// The engine runs the handler with exclusive access and only when the
    /// object has no masters, then removes the object once it succeeds.
    ///
    /// # Panics
    ///
    /// Panics if a delete action is already registered.
    #[must_use]
    pub fn with_delete(self, action: impl IntoService) -> Self {
        let mut service = action.into_service();
        service.add_flags(ServiceFlags::EXCLUSIVE);
        self.insert(DELETE_ACTION.to_owned(), service)
    }

    /// Freezes the builder.
    #[must_use]
    pub fn build(self) -> ResourceType {
        ResourceType {
            name: self.name,
            flags: self.flags,
            actions: self.actions,
        }
    }

    fn insert(mut self, name: String, service: Service) -> Self {
        assert!(
            !self.actions.contains_key(&name),
            "Action '{name}' is already registered on resource type '{}'",
            self.name
        );
        self.actions.insert(name, service);
        self
    }
}
