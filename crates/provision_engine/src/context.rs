//! Request-scoped context handed to action handlers.

use crate::data::ResourceData;
use crate::engine::Shared;
use crate::error::EngineError;
use crate::request::{Payload, decode_bytes};
use provision_store::{Record, ScopedStore, UserId};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Everything a handler knows about the request it serves.
///
/// The context is cheap to clone. It carries the caller's cancellation
/// token, the addressed user, space and object, whether the object existed
/// when the request was admitted, and access to the object-scoped store.
///
/// The engine does not observe cancellation itself; handlers that run long
/// should check [`cancellation`](Self::cancellation).
#[derive(Clone)]
pub struct Context {
    inner: Arc<Scope>,
}

struct Scope {
    cancel: CancellationToken,
    user: UserId,
    space: String,
    object: String,
    kind: String,
    exists: bool,
    /// Dependency ids declared by the action input and locked for this request.
    uses: Vec<String>,
    shared: Arc<Shared>,
}

impl core::fmt::Debug for Context {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Context")
            .field("user", &self.inner.user)
            .field("space", &self.inner.space)
            .field("object", &self.inner.object)
            .field("kind", &self.inner.kind)
            .field("exists", &self.inner.exists)
            .field("uses", &self.inner.uses)
            .finish_non_exhaustive()
    }
}

impl Context {
    pub(crate) fn new(
        shared: Arc<Shared>,
        cancel: CancellationToken,
        user: UserId,
        space: String,
        object: String,
        kind: String,
        exists: bool,
        uses: Vec<String>,
    ) -> Self {
        Self {
            inner: Arc::new(Scope {
                cancel,
                user,
                space,
                object,
                kind,
                exists,
                uses,
                shared,
            }),
        }
    }

    /// Returns the caller's cancellation token.
    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.inner.cancel
    }

    /// Returns the requesting user.
    #[must_use]
    pub fn user(&self) -> UserId {
        self.inner.user
    }

    /// Returns the space name.
    #[must_use]
    pub fn space(&self) -> &str {
        &self.inner.space
    }

    /// Returns the object id.
    #[must_use]
    pub fn object(&self) -> &str {
        &self.inner.object
    }

    /// Returns the resource type name.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.inner.kind
    }

    /// Returns whether the object existed when the request was admitted.
    /// Normally `false` only for the call that creates it.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.inner.exists
    }

    /// Returns the store view bound to this object.
    #[must_use]
    pub fn store(&self) -> ScopedStore {
        let scope = &self.inner;
        ScopedStore::new(
            Arc::clone(&scope.shared.store),
            scope.user,
            scope.space.clone(),
            scope.object.clone(),
            scope.kind.clone(),
        )
    }

    /// Loads and decodes the current state of the object.
    pub fn current<R: ResourceData>(&self) -> Result<R, EngineError> {
        let record = self.store().get(self.object())?;
        if record.kind != R::type_name() {
            return Err(EngineError::InvalidType {
                id: record.id,
                expected: R::type_name().to_owned(),
                found: record.kind,
            });
        }
        decode_bytes(&record.data)
    }

    /// Replaces the persisted state of the object with `value`.
    pub fn set<R: ResourceData>(&self, value: &R) -> Result<(), EngineError> {
        if R::type_name() != self.kind() {
            return Err(EngineError::InvalidType {
                id: self.object().to_owned(),
                expected: self.kind().to_owned(),
                found: R::type_name().to_owned(),
            });
        }
        let payload = Payload::encode(value)?;
        self.store().set(payload.into_bytes())?;
        Ok(())
    }

    /// Starts using the objects `ids` as dependencies of this object.
    ///
    /// Verifies that every id exists and that exclusive ones have no other
    /// master. The edges are recorded only when the returned scope is
    /// committed, which should happen after the handler's own mutation
    /// succeeded. Dropping the scope records nothing.
    ///
    /// Only ids declared through [`Action::uses`](crate::Action::uses) can
    /// be reserved; their guards are already held by this request.
    pub fn reserve<I, S>(&self, ids: I) -> Result<DependencyScope, EngineError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut slaves = Vec::new();
        for id in ids {
            let record = self.load_dependency(id.as_ref())?;
            let exclusive = self
                .inner
                .shared
                .types
                .get(record.kind.as_str())
                .is_some_and(|kind| kind.is_exclusive());

            if exclusive && record.masters.iter().any(|m| m != self.object()) {
                return Err(EngineError::ObjectInUse(record.id));
            }
            slaves.push(Slave { record, exclusive });
        }

        Ok(DependencyScope::new(self.clone(), Edge::Use, slaves))
    }

    /// Stops using the objects `ids` as dependencies of this object.
    ///
    /// Like [`reserve`](Self::reserve), the edges are removed on commit.
    /// Once an object has no masters left it can be deleted.
    pub fn release<I, S>(&self, ids: I) -> Result<DependencyScope, EngineError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let slaves = ids
            .into_iter()
            .map(|id| {
                self.load_dependency(id.as_ref()).map(|record| Slave {
                    record,
                    exclusive: false,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(DependencyScope::new(self.clone(), Edge::UnUse, slaves))
    }

    fn load_dependency(&self, id: &str) -> Result<Record, EngineError> {
        if id == self.object() {
            return Err(EngineError::not_allowed(format!(
                "object '{id}' cannot depend on itself"
            )));
        }
        if !self.inner.uses.iter().any(|used| used == id) {
            return Err(EngineError::not_allowed(format!(
                "dependency '{id}' was not declared by action input"
            )));
        }
        Ok(self.store().get(id)?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edge {
    Use,
    UnUse,
}

struct Slave {
    record: Record,
    exclusive: bool,
}

/// Pending dependency changes between this object and its slaves.
///
/// Created by [`Context::reserve`] or [`Context::release`]. The slaves stay
/// locked by the request until it completes, so the state checked when the
/// scope was created still holds at commit time.
#[must_use = "dependency changes are only applied when committed"]
pub struct DependencyScope {
    ctx: Context,
    edge: Edge,
    slaves: Vec<Slave>,
    committed: bool,
}

impl core::fmt::Debug for DependencyScope {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DependencyScope")
            .field("master", &self.ctx.object())
            .field("edge", &self.edge)
            .field(
                "slaves",
                &self
                    .slaves
                    .iter()
                    .map(|slave| slave.record.id.as_str())
                    .collect::<Vec<_>>(),
            )
            .field("committed", &self.committed)
            .finish()
    }
}

impl DependencyScope {
    fn new(ctx: Context, edge: Edge, slaves: Vec<Slave>) -> Self {
        Self {
            ctx,
            edge,
            slaves,
            committed: false,
        }
    }

    /// Returns the slave records as loaded when the scope was created.
    #[must_use]
    pub fn records(&self) -> Vec<&Record> {
        self.slaves.iter().map(|slave| &slave.record).collect()
    }

    /// Applies the edge changes.
    ///
    /// If the store rejects one edge, edges already applied by this call are
    /// reverted before the error is returned.
    pub fn commit(mut self) -> Result<(), EngineError> {
        let ctx = self.ctx.clone();
        let store = &ctx.inner.shared.store;
        let (user, space, master) = (ctx.user(), ctx.space(), ctx.object());

        for (applied, slave) in self.slaves.iter().enumerate() {
            let id = slave.record.id.as_str();
            let result = match self.edge {
                Edge::Use => store.dependency_add(user, space, id, master, slave.exclusive),
                Edge::UnUse => store.dependency_remove(user, space, id, master),
            };

            if let Err(err) = result {
                for undo in &self.slaves[..applied] {
                    let id = undo.record.id.as_str();
                    let reverted = match self.edge {
                        Edge::Use => store.dependency_remove(user, space, id, master),
                        Edge::UnUse => {
                            store.dependency_add(user, space, id, master, undo.exclusive)
                        }
                    };
                    if let Err(revert_err) = reverted {
                        tracing::warn!(slave = id, master, error = %revert_err, "failed to revert dependency edge");
                    }
                }
                return Err(err.into());
            }
        }

        tracing::debug!(
            master,
            edge = ?self.edge,
            slaves = self.slaves.len(),
            "dependencies committed"
        );
        self.committed = true;
        Ok(())
    }
}

impl Drop for DependencyScope {
    fn drop(&mut self) {
        if !self.committed && !self.slaves.is_empty() {
            tracing::debug!(
                master = self.ctx.object(),
                edge = ?self.edge,
                "dependency scope dropped without commit"
            );
        }
    }
}
