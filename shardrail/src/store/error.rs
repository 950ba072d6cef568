//! Session-engine errors.

use thiserror::Error;

/// Errors raised by session implementations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("query matched more than one row")]
    NonUnique,

    #[error("row is locked by another transaction")]
    LockConflict,

    #[error("no open transaction")]
    NoTransaction,

    #[error("unknown entity \"{0}\"")]
    UnknownEntity(&'static str),

    #[error("unknown named query \"{0}\"")]
    UnknownNamedQuery(String),

    #[error("{0}")]
    Engine(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Engine error from a message.
    pub fn engine(message: impl Into<String>) -> Self {
        Error::Engine(message.into().into())
    }
}
