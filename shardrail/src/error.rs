//! Library errors.

use thiserror::Error;

use crate::store;

/// Errors surfaced by routers and contexts.
#[derive(Debug, Error)]
pub enum Error {
    /// An identified row does not exist where the operation requires it.
    #[error("entity not found")]
    NotFound,

    /// A unique-result fetch matched more than one row.
    #[error("query matched more than one row")]
    NonUnique,

    /// A no-wait write lock could not be acquired.
    #[error("row is locked by another transaction")]
    LockConflict,

    /// A context filter predicate rejected the parent.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// An engine error raised from within an executed operation.
    #[error("operation failed: {0}")]
    OperationFailed(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("{0}")]
    Spec(#[from] SpecError),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Invalid declarative inputs: descriptors, association specs, scroll
/// pointers, pagination bounds.
#[derive(Debug, Error)]
pub enum SpecError {
    #[error("parent field \"{0}\" is missing")]
    MissingParentField(String),

    #[error("scroll pointer direction does not match the requested direction")]
    PointerDirection,

    #[error("scroll pointer covers {pointer} shards, fleet has {fleet}")]
    PointerWidth { pointer: usize, fleet: usize },

    #[error("invalid pagination bounds")]
    InvalidBounds,

    #[error("entity descriptor has no key field")]
    MissingKeyField,

    #[error("lookup key field \"{0}\" is not a string")]
    NonStringLookupKey(String),

    #[error("entity is not keyed by a lookup key")]
    NotLookupKeyed,

    #[error("shard {shard} out of range for a fleet of {shards}")]
    ShardOutOfRange { shard: usize, shards: usize },

    #[error("row is missing sort field \"{0}\"")]
    MissingSortField(String),
}

impl Error {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Error::InvalidArgument(message.into())
    }

    pub fn operation_failed(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Error::OperationFailed(Box::new(error))
    }
}

impl From<store::Error> for Error {
    fn from(error: store::Error) -> Self {
        match error {
            store::Error::NonUnique => Error::NonUnique,
            store::Error::LockConflict => Error::LockConflict,
            other => Error::OperationFailed(Box::new(other)),
        }
    }
}
