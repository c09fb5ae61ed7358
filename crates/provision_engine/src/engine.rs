//! Request dispatch.
//!
//! The [`Engine`] owns the frozen set of resource types, the store and the
//! guard registry. [`Engine::handle`] runs a request through these steps:
//!
//! 1. The space must exist for the user.
//! 2. An existing object must be recorded under the requested type.
//! 3. The type and then the action must be registered.
//! 4. The action's flags decide whether the object must exist or not.
//! 5. The payload is decoded; decode errors never reach the handler.
//! 6. Guards for the object and every declared dependency are locked in
//!    ascending key order, and steps 2 and 4 are re-checked under the lock.
//! 7. The handler runs with a request-scoped [`Context`]. It persists its
//!    own state; its return value becomes the response payload.
//! 8. Guards are released in reverse order.
//!
//! The delete action additionally requires the object to have no masters
//! and to be no other object's master, and removes the object once its
//! handler succeeds. Handlers release their dependencies before the object
//! can go.

use crate::context::Context;
use crate::error::EngineError;
use crate::guard::{Guards, LockMode};
use crate::request::{Request, ResourceRequest, Response};
use crate::resource::{DELETE_ACTION, ResourceType};
use crate::service::ServiceFlags;
use hashbrown::HashMap;
use provision_store::{Store, UserId};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// State shared by the engine and every live [`Context`].
pub(crate) struct Shared {
    pub(crate) store: Arc<dyn Store>,
    pub(crate) types: HashMap<String, ResourceType>,
    pub(crate) guards: Guards,
}

/// Collects resource types before the engine starts serving requests.
///
/// # Example
///
/// ```
/// use provision_engine::{Action, Context, Engine, EngineError, ResourceBuilder, ResourceData, Void};
/// use provision_store::MemStore;
/// use serde::{Deserialize, Serialize};
/// use std::sync::Arc;
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
/// let engine = Engine::builder(Arc::new(MemStore::new()))
///     .resource(
///         ResourceBuilder::<Disk>::new()
///             .exclusive()
///             .with_action("create", Action::new(create).must_not_exist())
///             .build(),
///     )
///     .build();
///
/// assert_eq!(engine.resource_types(), vec!["Disk"]);
/// ```
pub struct EngineBuilder {
    store: Arc<dyn Store>,
    types: HashMap<String, ResourceType>,
}

impl core::fmt::Debug for EngineBuilder {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EngineBuilder")
            .field("types", &self.types.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl EngineBuilder {
    /// Registers a resource type.
    ///
    /// # Panics
    ///
    /// Panics if a type with the same name is already registered.
    #[must_use]
    pub fn resource(mut self, resource: ResourceType) -> Self {
        self.register(resource);
        self
    }

    /// Registers a resource type in place.
    ///
    /// # Panics
    ///
    /// Panics if a type with the same name is already registered.
    pub fn register(&mut self, resource: ResourceType) {
        let name = resource.name().to_owned();
        assert!(
            !self.types.contains_key(&name),
            "Resource type '{name}' is already registered"
        );
        self.types.insert(name, resource);
    }

    /// Freezes the registered types into an [`Engine`].
    #[must_use]
    pub fn build(self) -> Engine {
        tracing::info!(types = self.types.len(), "resource engine ready");
        Engine {
            shared: Arc::new(Shared {
                store: self.store,
                types: self.types,
                guards: Guards::new(),
            }),
        }
    }
}

/// Dispatches requests to registered resource types.
///
/// Cloning an engine is cheap; clones share types, store and guards. The
/// engine holds no lock across requests: requests on disjoint objects run
/// fully in parallel and requests on the same object are serialized by its
/// guard.
#[derive(Clone)]
pub struct Engine {
    shared: Arc<Shared>,
}

impl core::fmt::Debug for Engine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Engine")
            .field("types", &self.resource_types())
            .field("guards", &self.shared.guards)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Starts building an engine backed by `store`.
    pub fn builder(store: Arc<dyn Store>) -> EngineBuilder {
        EngineBuilder {
            store,
            types: HashMap::new(),
        }
    }

    /// Returns the backing store, e.g. for space lifecycle calls.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.shared.store
    }

    /// Returns the resource type registered under `name`.
    #[must_use]
    pub fn resource_type(&self, name: &str) -> Option<&ResourceType> {
        self.shared.types.get(name)
    }

    /// Returns the registered type names in ascending order.
    #[must_use]
    pub fn resource_types(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.shared.types.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Returns the guard registry.
    #[must_use]
    pub fn guards(&self) -> &Guards {
        &self.shared.guards
    }

    /// Handles one request.
    ///
    /// `cancel` is handed to the handler through its [`Context`]. The engine
    /// itself does not stop waiting on a guard when it is cancelled.
    pub async fn handle(
        &self,
        cancel: CancellationToken,
        request: Request,
    ) -> Result<Response, EngineError> {
        let span = tracing::debug_span!(
            "request",
            user = %request.user,
            space = %request.space,
            resource_type = %request.kind,
            action = %request.resource.action,
            object = %request.resource.resource_id,
        );

        async move {
            let result = self.dispatch(cancel, request).await;
            if let Err(err) = &result {
                tracing::debug!(error = %err, error_kind = ?err.kind(), "request failed");
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn dispatch(
        &self,
        cancel: CancellationToken,
        request: Request,
    ) -> Result<Response, EngineError> {
        let shared = &self.shared;
        let Request {
            kind,
            user,
            space,
            resource:
                ResourceRequest {
                    action,
                    resource_id: object,
                    payload,
                },
        } = request;

        if !shared.store.space_exists(user, &space)? {
            return Err(EngineError::SpaceNotFound(space));
        }

        let recorded = shared.store.resource_exists(user, &space, &object)?;
        check_type(&object, &kind, recorded.as_deref())?;

        let resource_type = shared
            .types
            .get(kind.as_str())
            .ok_or_else(|| EngineError::TypeUnknown(kind.clone()))?;
        let service =
            resource_type
                .action(&action)
                .ok_or_else(|| EngineError::ActionNotFound {
                    kind: kind.clone(),
                    action: action.clone(),
                })?;
        let flags = service.flags();
        check_existence(&object, flags, recorded.is_some())?;

        let mut call = service.prepare(payload.as_bytes())?;
        let uses = core::mem::take(&mut call.uses);

        let mode = if flags.needs_write_lock() {
            LockMode::Write
        } else {
            LockMode::Read
        };
        let mut wanted = Vec::with_capacity(uses.len() + 1);
        wanted.push((guard_key(user, &space, &object), mode));
        wanted.extend(
            uses.iter()
                .map(|id| (guard_key(user, &space, id), LockMode::Write)),
        );
        let guards = shared.guards.acquire(wanted).await;
        tracing::trace!(guards = guards.len(), "guards acquired");

        // Another request may have created or deleted the object while this
        // one was waiting.
        let recorded = shared.store.resource_exists(user, &space, &object)?;
        check_type(&object, &kind, recorded.as_deref())?;
        check_existence(&object, flags, recorded.is_some())?;
        let exists = recorded.is_some();

        let deleting = action == DELETE_ACTION;
        if deleting {
            if shared.store.resource_get(user, &space, &object)?.in_use() {
                return Err(EngineError::ObjectInUse(object));
            }
            // New edges naming this object as master need its write lock,
            // which is held until the record is gone.
            let slaves = shared.store.resource_slaves(user, &space, &object)?;
            if !slaves.is_empty() {
                return Err(EngineError::HoldsDependencies { id: object, slaves });
            }
        }

        let ctx = Context::new(
            Arc::clone(shared),
            cancel,
            user,
            space.clone(),
            object.clone(),
            kind,
            exists,
            uses,
        );
        let payload = call.invoke(ctx).await?;

        if deleting {
            shared.store.resource_delete(user, &space, &object)?;
            tracing::debug!("object deleted");
        }

        drop(guards);
        Ok(Response { payload })
    }
}

/// Guard registry key of an object. Ids are only unique within a space.
fn guard_key(user: UserId, space: &str, id: &str) -> String {
    format!("{user}/{space}/{id}")
}

fn check_type(object: &str, expected: &str, recorded: Option<&str>) -> Result<(), EngineError> {
    match recorded {
        Some(found) if found != expected => Err(EngineError::InvalidType {
            id: object.to_owned(),
            expected: expected.to_owned(),
            found: found.to_owned(),
        }),
        _ => Ok(()),
    }
}

fn check_existence(object: &str, flags: ServiceFlags, exists: bool) -> Result<(), EngineError> {
    match (flags.must_not_exist(), exists) {
        (true, true) => Err(EngineError::ObjectExists(object.to_owned())),
        (false, false) => Err(EngineError::ObjectDoesNotExist(object.to_owned())),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ResourceData;
    use crate::error::ErrorKind;
    use crate::resource::ResourceBuilder;
    use crate::service::{Action, Void};
    use provision_store::MemStore;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Counter {
        value: u64,
    }

    impl ResourceData for Counter {
        fn type_name() -> &'static str {
            "Counter"
        }
    }

    async fn create(ctx: Context, value: u64) -> Result<Void, EngineError> {
        assert!(!ctx.exists());
        ctx.set(&Counter { value })?;
        Ok(Void)
    }

    async fn bump(ctx: Context, by: u64) -> Result<u64, EngineError> {
        assert!(ctx.exists());
        let mut counter: Counter = ctx.current()?;
        counter.value += by;
        ctx.set(&counter)?;
        Ok(counter.value)
    }

    fn engine() -> Engine {
        let store = Arc::new(MemStore::new());
        store.space_create(UserId::new(0), "default").unwrap();
        Engine::builder(store)
            .resource(
                ResourceBuilder::<Counter>::new()
                    .with_action("create", Action::new(create).must_not_exist())
                    .with_action("bump", Action::new(bump))
                    .build(),
            )
            .build()
    }

    fn request(action: &str, payload: &str) -> Request {
        Request::new("Counter", UserId::new(0), "default", action, "c0").with_payload(payload)
    }

    #[tokio::test]
    async fn response_carries_handler_output() {
        let engine = engine();
        engine
            .handle(CancellationToken::new(), request("create", "1"))
            .await
            .unwrap();

        let response = engine
            .handle(CancellationToken::new(), request("bump", "41"))
            .await
            .unwrap();
        assert_eq!(response.payload.decode::<u64>().unwrap(), 42);
        assert!(engine.guards().is_empty());
    }

    #[tokio::test]
    async fn missing_space_is_not_found() {
        let engine = engine();
        let err = engine
            .handle(
                CancellationToken::new(),
                Request::new("Counter", UserId::new(0), "missing", "create", "c0"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::SpaceNotFound(_)));
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn unknown_type_and_action() {
        let engine = engine();
        let err = engine
            .handle(
                CancellationToken::new(),
                Request::new("Gpu", UserId::new(0), "default", "create", "g0"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::TypeUnknown(name) if name == "Gpu"));

        let err = engine
            .handle(CancellationToken::new(), request("reset", ""))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::ActionNotFound { .. }));
    }

    #[tokio::test]
    async fn recorded_type_must_match() {
        let engine = engine();
        engine
            .store()
            .resource_set(UserId::new(0), "default", "c0", "Disk", Vec::new())
            .unwrap();

        let err = engine
            .handle(CancellationToken::new(), request("bump", "1"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidType { .. }));
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn decode_errors_stop_before_the_handler() {
        let engine = engine();
        let err = engine
            .handle(CancellationToken::new(), request("create", r#""ten""#))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Decode(_)));
        assert!(
            engine
                .store()
                .resource_list(UserId::new(0), "default")
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn duplicate_type_panics() {
        let _ = Engine::builder(Arc::new(MemStore::new()))
            .resource(ResourceBuilder::<Counter>::new().build())
            .resource(ResourceBuilder::<Counter>::new().build());
    }
}
