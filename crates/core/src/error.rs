//! Error types for bucketfence
//!
//! Mutation-style store operations surface these directly. Read-style
//! operations log them and return `None` instead.

use thiserror::Error;

use crate::resource::ResourceId;

/// Result alias used across the core crate
pub type Result<T> = std::result::Result<T, Error>;

/// Result alias for backend contract calls
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Errors raised by the store facade
#[derive(Debug, Error)]
pub enum Error {
    /// The target name normalizes to a location outside the store root
    #[error("{name} resolves outside of the store root {root}")]
    Confinement { name: String, root: ResourceId },

    /// The target of an object write is an existing bucket
    #[error("{0} is a bucket, not an object")]
    IsBucket(String),

    /// The parent of an object write is not an existing bucket
    #[error("Cannot create object {0} inside a non-existent bucket.")]
    MissingParent(String),

    /// The store could not be constructed
    #[error("cannot open store: {0}")]
    Construction(String),

    /// A permission call named neither `bucket` nor `object`
    #[error("unknown resource kind: {0}")]
    UnknownResourceKind(String),

    /// Failure reported by the storage backend
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Invalid or unreadable configuration
    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification of [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Confinement,
    Structural,
    Construction,
    Backend,
    UnknownResourceKind,
    Config,
}

impl Error {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Confinement { .. } => ErrorKind::Confinement,
            Error::IsBucket(_) | Error::MissingParent(_) => ErrorKind::Structural,
            Error::Construction(_) => ErrorKind::Construction,
            Error::UnknownResourceKind(_) => ErrorKind::UnknownResourceKind,
            Error::Backend(_) => ErrorKind::Backend,
            Error::Config(_) | Error::Io(_) => ErrorKind::Config,
        }
    }

    /// True when the backend reported the target as missing
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Backend(BackendError::NotFound(_)))
    }
}

/// Errors reported by a [`Backend`](crate::backend::Backend) implementation
///
/// The message is opaque to the store; the variant only drives retry
/// decisions and exit codes.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("{0} does not exist")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl BackendError {
    /// Check if this failure is transient and worth retrying
    pub fn is_retryable(&self) -> bool {
        match self {
            BackendError::Network(msg) => {
                let msg_lower = msg.to_lowercase();
                msg_lower.contains("timeout")
                    || msg_lower.contains("connection reset")
                    || msg_lower.contains("connection refused")
                    || msg_lower.contains("503")
                    || msg_lower.contains("service unavailable")
                    || msg_lower.contains("too many requests")
                    || msg_lower.contains("429")
                    || msg_lower.contains("slow down")
                    || msg_lower.contains("dispatch")
            }
            BackendError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::Interrupted
            ),
            BackendError::NotFound(_) | BackendError::Conflict(_) | BackendError::Other(_) => {
                false
            }
        }
    }
}
