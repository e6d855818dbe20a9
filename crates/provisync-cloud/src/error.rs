//! Core error types

use std::time::Duration;
use thiserror::Error;

/// Errors raised by the reconciliation core
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("{0}")]
    Timeout(#[from] OperationTimeout),

    #[error("Duplicate key in {collection} collection: {key}")]
    DuplicateKey { collection: String, key: String },

    #[error(
        "Remote reported successful creation but no matching item was found for key {key}"
    )]
    MissingAfterCreate { key: String },

    #[error("Remote item with key {key} has no identifier")]
    MissingIdentifier { key: String },
}

pub type Result<T> = std::result::Result<T, CloudError>;

/// Raised when the overall timeout for a retried operation elapses.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{description} - operation timed out after {} seconds ({attempts} attempts)", .timeout.as_secs())]
pub struct OperationTimeout {
    /// The operation description
    pub description: String,

    /// The overall timeout that elapsed
    pub timeout: Duration,

    /// Number of attempts made before giving up
    pub attempts: u32,
}

/// Outcome of a retried operation that did not complete.
///
/// `Fatal` carries exactly the error the operation failed with; `Timeout`
/// is distinguishable from it by variant.
#[derive(Error, Debug)]
pub enum RetryError<E> {
    #[error(transparent)]
    Fatal(E),

    #[error(transparent)]
    Timeout(OperationTimeout),
}

impl<E> RetryError<E> {
    pub fn is_timeout(&self) -> bool {
        matches!(self, RetryError::Timeout(_))
    }

    /// Convert the fatal error type, leaving timeouts as they are.
    pub fn map_fatal<F>(self, f: impl FnOnce(E) -> F) -> RetryError<F> {
        match self {
            RetryError::Fatal(e) => RetryError::Fatal(f(e)),
            RetryError::Timeout(t) => RetryError::Timeout(t),
        }
    }

    pub fn into_fatal(self) -> Option<E> {
        match self {
            RetryError::Fatal(e) => Some(e),
            RetryError::Timeout(_) => None,
        }
    }
}
