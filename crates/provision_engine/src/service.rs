//! Typed actions and their type-erased services.
//!
//! An [`Action`] wraps an async handler `fn(Context, I) -> Result<O, EngineError>`
//! for concrete input and output shapes. Converting it into a [`Service`]
//! captures, at registration time, the closures that decode the payload
//! into `I`, run the handler and encode `O`. The engine only ever sees
//! services, so it can dispatch any action from an opaque payload without
//! knowing its types.
//!
//! # Example
//!
//! ```
//! use provision_engine::{Action, Context, EngineError, Service, Void};
//!
//! async fn resize(ctx: Context, size: u64) -> Result<Void, EngineError> {
//!     let _ = (ctx, size);
//!     Ok(Void)
//! }
//!
//! let service: Service = Action::new(resize).exclusive().into();
//! assert!(service.flags().needs_write_lock());
//! ```

use crate::context::Context;
use crate::error::EngineError;
use crate::request::{Payload, decode_bytes};
use core::marker::PhantomData;
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Empty input or output value. Encodes to JSON `null`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Void;

bitflags::bitflags! {
    /// Engine policy attached to a service.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ServiceFlags: u8 {
        /// Runs only if the object does not exist yet. Implies exclusive
        /// access to the id while the handler runs.
        const MUST_NOT_EXIST = 1 << 0;
        /// Requires exclusive access to the object while the handler runs.
        const EXCLUSIVE = 1 << 1;
    }
}

impl ServiceFlags {
    /// Returns whether the action creates its object.
    #[must_use]
    pub fn must_not_exist(self) -> bool {
        self.contains(Self::MUST_NOT_EXIST)
    }

    /// Returns whether the handler gets the object's write lock.
    #[must_use]
    pub fn needs_write_lock(self) -> bool {
        self.intersects(Self::EXCLUSIVE | Self::MUST_NOT_EXIST)
    }
}

/// An async function usable as an action handler.
///
/// Implemented for every `Fn(Context, I) -> impl Future<Output = Result<O, EngineError>>`.
pub trait Handler<I, O>: Send + Sync + 'static {
    /// The future returned by [`call`](Self::call).
    type Future: Future<Output = Result<O, EngineError>> + Send + 'static;

    /// Invokes the handler.
    fn call(&self, ctx: Context, input: I) -> Self::Future;
}

impl<F, Fut, I, O> Handler<I, O> for F
where
    F: Fn(Context, I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O, EngineError>> + Send + 'static,
{
    type Future = Fut;

    fn call(&self, ctx: Context, input: I) -> Self::Future {
        self(ctx, input)
    }
}

/// Extracts the dependency ids an input refers to.
type UsesFn<I> = Box<dyn Fn(&I) -> Vec<String> + Send + Sync>;

/// A typed action, before it is erased into a [`Service`].
pub struct Action<I, O, H> {
    handler: H,
    flags: ServiceFlags,
    uses: Option<UsesFn<I>>,
    _marker: PhantomData<fn(I) -> O>,
}

impl<I, O, H> Action<I, O, H>
where
    I: DeserializeOwned + Send + 'static,
    O: Serialize + Send + 'static,
    H: Handler<I, O>,
{
    /// Wraps `handler` with no flags.
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            flags: ServiceFlags::empty(),
            uses: None,
            _marker: PhantomData,
        }
    }

    /// Marks the action as creating its object.
    #[must_use]
    pub fn must_not_exist(mut self) -> Self {
        self.flags |= ServiceFlags::MUST_NOT_EXIST;
        self
    }

    /// Gives the handler exclusive access to its object.
    #[must_use]
    pub fn exclusive(mut self) -> Self {
        self.flags |= ServiceFlags::EXCLUSIVE;
        self
    }

    /// Adds `flags` to the action.
    #[must_use]
    pub fn with_flags(mut self, flags: ServiceFlags) -> Self {
        self.flags |= flags;
        self
    }

    /// Declares the dependency ids named by the input.
    ///
    /// The engine locks these ids, together with the target object and in
    /// ascending order, before the handler runs. Only declared ids can be
    /// passed to [`Context::reserve`] and [`Context::release`].
    #[must_use]
    pub fn uses(mut self, uses: impl Fn(&I) -> Vec<String> + Send + Sync + 'static) -> Self {
        self.uses = Some(Box::new(uses));
        self
    }
}

/// A decoded request, ready to run once its guards are held.
pub(crate) struct Call {
    /// Dependency ids declared by the input.
    pub(crate) uses: Vec<String>,
    invoke: Box<dyn FnOnce(Context) -> BoxFuture<'static, Result<Payload, EngineError>> + Send>,
}

impl Call {
    pub(crate) fn invoke(self, ctx: Context) -> BoxFuture<'static, Result<Payload, EngineError>> {
        (self.invoke)(ctx)
    }
}

type PrepareFn = dyn Fn(&[u8]) -> Result<Call, EngineError> + Send + Sync;

/// A type-erased action: flags plus a prepare function that decodes a
/// payload into a runnable [`Call`].
#[derive(Clone)]
pub struct Service {
    flags: ServiceFlags,
    prepare: Arc<PrepareFn>,
}

impl core::fmt::Debug for Service {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Service")
            .field("flags", &self.flags)
            .finish_non_exhaustive()
    }
}

impl Service {
    /// Returns the service flags.
    #[must_use]
    pub fn flags(&self) -> ServiceFlags {
        self.flags
    }

    pub(crate) fn add_flags(&mut self, flags: ServiceFlags) {
        self.flags |= flags;
    }

    /// Decodes `payload` into the action's input. The handler does not run
    /// until the returned call is invoked.
    pub(crate) fn prepare(&self, payload: &[u8]) -> Result<Call, EngineError> {
        (self.prepare)(payload)
    }
}

impl<I, O, H> From<Action<I, O, H>> for Service
where
    I: DeserializeOwned + Send + 'static,
    O: Serialize + Send + 'static,
    H: Handler<I, O>,
{
    fn from(action: Action<I, O, H>) -> Self {
        let Action {
            handler,
            flags,
            uses,
            ..
        } = action;
        let handler = Arc::new(handler);

        let prepare = move |payload: &[u8]| -> Result<Call, EngineError> {
            let input: I = decode_bytes(payload)?;
            let uses = uses.as_ref().map(|uses| uses(&input)).unwrap_or_default();
            let handler = Arc::clone(&handler);

            Ok(Call {
                uses,
                invoke: Box::new(
                    move |ctx: Context| -> BoxFuture<'static, Result<Payload, EngineError>> {
                        Box::pin(async move {
                            let output = handler.call(ctx, input).await?;
                            Payload::encode(&output)
                        })
                    },
                ),
            })
        };

        Self {
            flags,
            prepare: Arc::new(prepare),
        }
    }
}

/// Conversion into a [`Service`], accepted wherever actions are registered.
pub trait IntoService {
    /// Performs the conversion.
    fn into_service(self) -> Service;
}

impl IntoService for Service {
    fn into_service(self) -> Service {
        self
    }
}

impl<I, O, H> IntoService for Action<I, O, H>
where
    I: DeserializeOwned + Send + 'static,
    O: Serialize + Send + 'static,
    H: Handler<I, O>,
{
    fn into_service(self) -> Service {
        self.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn noop(_ctx: Context, _input: Void) -> Result<Void, EngineError> {
        Ok(Void)
    }

    async fn attach(_ctx: Context, disk: String) -> Result<Void, EngineError> {
        let _ = disk;
        Ok(Void)
    }

    #[test]
    fn void_encodes_to_null() {
        assert_eq!(Payload::encode(&Void).unwrap().as_bytes(), b"null");
        Payload::empty().decode::<Void>().unwrap();
    }

    #[test]
    fn flags_accumulate() {
        let service = Action::new(noop).must_not_exist().into_service();
        assert!(service.flags().must_not_exist());
        // creation implies write access
        assert!(service.flags().needs_write_lock());

        let service = Action::new(noop).into_service();
        assert_eq!(service.flags(), ServiceFlags::empty());
        assert!(!service.flags().needs_write_lock());
    }

    #[test]
    fn prepare_rejects_malformed_input() {
        let service = Action::new(attach).into_service();
        let err = service.prepare(b"500").err().expect("expected decode error");
        assert!(matches!(err, EngineError::Decode(_)));
    }

    #[test]
    fn prepare_extracts_declared_uses() {
        let service = Action::new(attach)
            .uses(|disk: &String| vec![disk.clone()])
            .into_service();
        let call = service.prepare(br#""disk0""#).unwrap();
        assert_eq!(call.uses, vec!["disk0"]);

        let service = Action::new(attach).into_service();
        assert!(service.prepare(br#""disk0""#).unwrap().uses.is_empty());
    }
}
