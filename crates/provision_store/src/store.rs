use crate::error::StoreError;
use crate::record::{Record, UserId};
use std::sync::Arc;

/// Abstraction over the persistence backend that holds spaces, records and
/// dependency edges.
///
/// Implementations must be safe to call from many requests at once. The
/// engine serializes access per object id, but two requests on different
/// objects of the same space can hit the store in parallel.
///
/// # Dependency edges
///
/// [`dependency_add`](Self::dependency_add) records that `master` uses the
/// object `id`. The store itself enforces the edge invariants:
///
/// - the slave must exist ([`StoreError::ObjectNotFound`] otherwise)
/// - an exclusive slave accepts at most one master ([`StoreError::ObjectInUse`])
pub trait Store: Send + Sync + 'static {
    /// Creates a new, empty space for `user`.
    fn space_create(&self, user: UserId, name: &str) -> Result<(), StoreError>;

    /// Deletes a space and every record in it. Deleting a missing space is a no-op.
    fn space_delete(&self, user: UserId, name: &str) -> Result<(), StoreError>;

    /// Lists the names of all spaces owned by `user`.
    fn space_list(&self, user: UserId) -> Result<Vec<String>, StoreError>;

    /// Returns whether `user` owns a space called `name`.
    fn space_exists(&self, user: UserId, name: &str) -> Result<bool, StoreError>;

    /// Upserts the payload and type tag of object `id`.
    ///
    /// An existing object keeps its `masters` and has its version bumped.
    /// Writing an existing id under a different type fails with
    /// [`StoreError::InvalidType`].
    fn resource_set(
        &self,
        user: UserId,
        space: &str,
        id: &str,
        kind: &str,
        payload: Vec<u8>,
    ) -> Result<(), StoreError>;

    /// Loads object `id`.
    fn resource_get(&self, user: UserId, space: &str, id: &str) -> Result<Record, StoreError>;

    /// Returns the recorded type of object `id`, or `None` if it does not exist.
    fn resource_exists(
        &self,
        user: UserId,
        space: &str,
        id: &str,
    ) -> Result<Option<String>, StoreError>;

    /// Lists the ids of every object in the space.
    fn resource_list(&self, user: UserId, space: &str) -> Result<Vec<String>, StoreError>;

    /// Lists the ids of every object in the space that records `master`
    /// among its masters.
    fn resource_slaves(
        &self,
        user: UserId,
        space: &str,
        master: &str,
    ) -> Result<Vec<String>, StoreError>;

    /// Removes object `id`. Fails with [`StoreError::ObjectInUse`] while the
    /// object has masters; deleting a missing object is a no-op.
    fn resource_delete(&self, user: UserId, space: &str, id: &str) -> Result<(), StoreError>;

    /// Adds `master` to the masters of object `id`.
    ///
    /// When `exclusive` is set the object may only carry a single master.
    /// Adding a master that is already recorded is a no-op.
    fn dependency_add(
        &self,
        user: UserId,
        space: &str,
        id: &str,
        master: &str,
        exclusive: bool,
    ) -> Result<(), StoreError>;

    /// Removes `master` from the masters of object `id`.
    fn dependency_remove(
        &self,
        user: UserId,
        space: &str,
        id: &str,
        master: &str,
    ) -> Result<(), StoreError>;
}

/// A view of the store bound to a single object.
///
/// Writes always target the bound object under the bound type; reads may
/// inspect any object in the same space. Handlers receive this instead of the
/// full [`Store`], so they cannot modify unrelated objects or edges.
#[derive(Clone)]
pub struct ScopedStore {
    store: Arc<dyn Store>,
    user: UserId,
    space: String,
    id: String,
    kind: String,
}

impl core::fmt::Debug for ScopedStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ScopedStore")
            .field("user", &self.user)
            .field("space", &self.space)
            .field("id", &self.id)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl ScopedStore {
    /// Binds `store` to object `id` of type `kind` in `space`.
    pub fn new(
        store: Arc<dyn Store>,
        user: UserId,
        space: impl Into<String>,
        id: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            store,
            user,
            space: space.into(),
            id: id.into(),
            kind: kind.into(),
        }
    }

    /// Returns the id of the bound object.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the type of the bound object.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Replaces the payload of the bound object, creating it if needed.
    pub fn set(&self, payload: Vec<u8>) -> Result<(), StoreError> {
        self.store
            .resource_set(self.user, &self.space, &self.id, &self.kind, payload)
    }

    /// Loads any object in the bound space.
    pub fn get(&self, id: &str) -> Result<Record, StoreError> {
        self.store.resource_get(self.user, &self.space, id)
    }

    /// Lists the ids of every object in the bound space.
    pub fn list(&self) -> Result<Vec<String>, StoreError> {
        self.store.resource_list(self.user, &self.space)
    }

    /// Returns the recorded type of `id` if it exists in the bound space.
    pub fn exists(&self, id: &str) -> Result<Option<String>, StoreError> {
        self.store.resource_exists(self.user, &self.space, id)
    }
}
