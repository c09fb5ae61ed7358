use crate::record::UserId;

/// Errors that can occur during store operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The space does not exist for the given user.
    #[error("space '{space}' not found for user {user}")]
    SpaceNotFound {
        /// Owner of the space.
        user: UserId,
        /// Name of the missing space.
        space: String,
    },

    /// A space with the same name already exists for the user.
    #[error("space '{space}' already exists for user {user}")]
    SpaceExists {
        /// Owner of the space.
        user: UserId,
        /// Name of the existing space.
        space: String,
    },

    /// The object does not exist in the space.
    #[error("object not found: {0}")]
    ObjectNotFound(String),

    /// The object has masters, or is an exclusive slave that already has one.
    #[error("object in use: {0}")]
    ObjectInUse(String),

    /// The object exists with a different type tag.
    #[error("object '{id}' has type '{found}', expected '{expected}'")]
    InvalidType {
        /// Object id.
        id: String,
        /// The type the caller addressed the object as.
        expected: String,
        /// The type recorded in the store.
        found: String,
    },

    /// Failure in the underlying persistence backend.
    #[error("backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Creates a [`Backend`](Self::Backend) error.
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    pub(crate) fn space_not_found(user: UserId, space: &str) -> Self {
        Self::SpaceNotFound {
            user,
            space: space.to_owned(),
        }
    }
}
