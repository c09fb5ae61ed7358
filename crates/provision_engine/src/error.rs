//! Error types for request dispatch.

use provision_store::StoreError;
use thiserror::Error;

/// Boxed error returned from a resource handler.
pub type BoxError = Box<dyn core::error::Error + Send + Sync + 'static>;

/// Coarse classification of an [`EngineError`].
///
/// Every error maps to exactly one kind, so a transport can translate it to a
/// status or exit code without inspecting engine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Space, object, type or action does not exist.
    NotFound,
    /// The object already exists or is in use.
    Conflict,
    /// The request does not match the recorded state or its payload is malformed.
    Validation,
    /// The action exists but is not permitted in the current state.
    NotAllowed,
    /// Store backend or handler failure.
    Internal,
}

/// Errors that can occur while handling a request.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EngineError {
    /// The space does not exist for the requesting user.
    #[error("space not found: {0}")]
    SpaceNotFound(String),

    /// The target or dependency object does not exist.
    #[error("object does not exist: {0}")]
    ObjectDoesNotExist(String),

    /// No resource type is registered under this name.
    #[error("unknown resource type: {0}")]
    TypeUnknown(String),

    /// The resource type has no action with this name.
    #[error("action '{action}' not found on resource type '{kind}'")]
    ActionNotFound {
        /// Resource type name.
        kind: String,
        /// Requested action name.
        action: String,
    },

    /// The space already exists for the requesting user.
    #[error("space already exists: {0}")]
    SpaceExists(String),

    /// The action requires the object to be absent, but it exists.
    #[error("object already exists: {0}")]
    ObjectExists(String),

    /// The object has masters, or is an exclusive slave that already has one.
    #[error("object in use: {0}")]
    ObjectInUse(String),

    /// The object is still a master of other objects and cannot be deleted.
    #[error("object '{id}' still uses {slaves:?}")]
    HoldsDependencies {
        /// Object id.
        id: String,
        /// Objects that still list it among their masters.
        slaves: Vec<String>,
    },

    /// The object is recorded under a different type than requested.
    #[error("object '{id}' has type '{found}', expected '{expected}'")]
    InvalidType {
        /// Object id.
        id: String,
        /// The type named by the request.
        expected: String,
        /// The type recorded in the store.
        found: String,
    },

    /// The payload could not be decoded into the action's input.
    #[error("failed to decode payload: {0}")]
    Decode(#[source] serde_json::Error),

    /// The action's output could not be encoded.
    #[error("failed to encode payload: {0}")]
    Encode(#[source] serde_json::Error),

    /// The action is not permitted in the current state.
    #[error("not allowed: {0}")]
    NotAllowed(String),

    /// Store backend failure.
    #[error("store error: {0}")]
    Store(String),

    /// Error returned by a resource handler.
    #[error(transparent)]
    Handler(BoxError),
}

impl EngineError {
    /// Wraps a handler error.
    pub fn handler(err: impl Into<BoxError>) -> Self {
        Self::Handler(err.into())
    }

    /// Creates a [`NotAllowed`](Self::NotAllowed) error.
    pub fn not_allowed(msg: impl Into<String>) -> Self {
        Self::NotAllowed(msg.into())
    }

    /// Returns the kind of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::SpaceNotFound(_)
            | Self::ObjectDoesNotExist(_)
            | Self::TypeUnknown(_)
            | Self::ActionNotFound { .. } => ErrorKind::NotFound,
            Self::SpaceExists(_)
            | Self::ObjectExists(_)
            | Self::ObjectInUse(_)
            | Self::HoldsDependencies { .. } => ErrorKind::Conflict,
            Self::InvalidType { .. } | Self::Decode(_) => ErrorKind::Validation,
            Self::NotAllowed(_) => ErrorKind::NotAllowed,
            Self::Encode(_) | Self::Store(_) | Self::Handler(_) => ErrorKind::Internal,
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::SpaceNotFound { space, .. } => Self::SpaceNotFound(space),
            StoreError::SpaceExists { space, .. } => Self::SpaceExists(space),
            StoreError::ObjectNotFound(id) => Self::ObjectDoesNotExist(id),
            StoreError::ObjectInUse(id) => Self::ObjectInUse(id),
            StoreError::InvalidType {
                id,
                expected,
                found,
            } => Self::InvalidType {
                id,
                expected,
                found,
            },
            StoreError::Backend(msg) => Self::Store(msg),
        }
    }
}
