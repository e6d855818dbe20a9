//! Compute provider error types

use provisync_cloud::{ClassifyError, CloudError, ErrorClass, OperationTimeout, RetryError};
use thiserror::Error;

/// Response code for a resource that is busy with another operation
pub const RESOURCE_BUSY: &str = "RESOURCE_BUSY";

/// Response code for a resource that does not exist
pub const RESOURCE_NOT_FOUND: &str = "RESOURCE_NOT_FOUND";

/// Response code for a backup client that does not exist
pub const BACKUP_CLIENT_NOT_FOUND: &str = "NO_CLIENT_FOUND";

/// Error returned by the compute API client
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn busy(message: impl Into<String>) -> Self {
        Self::new(RESOURCE_BUSY, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(RESOURCE_NOT_FOUND, message)
    }
}

impl ClassifyError for ApiError {
    fn class(&self) -> ErrorClass {
        match self.code.as_str() {
            RESOURCE_BUSY => ErrorClass::Busy,
            RESOURCE_NOT_FOUND | BACKUP_CLIENT_NOT_FOUND => ErrorClass::NotFound,
            _ => ErrorClass::Fatal,
        }
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Error, Debug)]
pub enum ComputeError {
    #[error("Compute API error: {0}")]
    Api(#[from] ApiError),

    #[error("{0}")]
    Timeout(OperationTimeout),

    #[error(transparent)]
    Cloud(#[from] CloudError),

    #[error("Server not found: {0} (it may have been deleted)")]
    ServerNotFound(String),

    #[error("{kind} not found: {key}")]
    SubResourceNotFound { kind: &'static str, key: String },

    #[error("Unsupported change: {0}")]
    UnsupportedChange(String),

    #[error("Server '{0}' must be stopped to apply changes, but server reboots are not allowed")]
    RebootNotAllowed(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<RetryError<ApiError>> for ComputeError {
    fn from(err: RetryError<ApiError>) -> Self {
        match err {
            RetryError::Fatal(e) => ComputeError::Api(e),
            RetryError::Timeout(t) => ComputeError::Timeout(t),
        }
    }
}

pub type Result<T> = std::result::Result<T, ComputeError>;
