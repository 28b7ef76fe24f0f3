//! Error types used across the 3FS CSI node plugin.

use thiserror::Error;

/// Result type for node plugin operations.
pub type CsiResult<T> = Result<T, CsiError>;

#[derive(Debug, Error)]
pub enum CsiError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("mount lock error: {0}")]
    Lock(String),

    #[error("failed to launch filesystem client: {0}")]
    Launch(String),

    #[error("timed out waiting for mount: {0}")]
    MountTimeout(String),

    #[error("mount table error: {0}")]
    MountTable(String),

    #[error("bind mount error: {0}")]
    BindMount(String),

    #[error("operation cancelled: {0}")]
    Cancelled(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Coarse classification of a [`CsiError`], stable across message changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidArgument,
    Lock,
    Launch,
    MountTimeout,
    MountTable,
    BindMount,
    Cancelled,
    Config,
    Storage,
    NotFound,
    Internal,
}

impl CsiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CsiError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            CsiError::Lock(_) => ErrorKind::Lock,
            CsiError::Launch(_) => ErrorKind::Launch,
            CsiError::MountTimeout(_) => ErrorKind::MountTimeout,
            CsiError::MountTable(_) => ErrorKind::MountTable,
            CsiError::BindMount(_) => ErrorKind::BindMount,
            CsiError::Cancelled(_) => ErrorKind::Cancelled,
            CsiError::Config(_) => ErrorKind::Config,
            CsiError::Storage(_) => ErrorKind::Storage,
            CsiError::NotFound(_) => ErrorKind::NotFound,
            CsiError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Whether retrying the whole publish call may succeed.
    ///
    /// Only a readiness timeout qualifies: the client may still be starting.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CsiError::MountTimeout(_))
    }
}

impl From<std::io::Error> for CsiError {
    fn from(err: std::io::Error) -> Self {
        CsiError::Internal(format!("I/O error: {}", err))
    }
}

/// Map onto gRPC status codes for the CSI protocol layer.
impl From<CsiError> for tonic::Status {
    fn from(err: CsiError) -> Self {
        let message = err.to_string();
        match err.kind() {
            ErrorKind::InvalidArgument => tonic::Status::invalid_argument(message),
            ErrorKind::MountTimeout => tonic::Status::deadline_exceeded(message),
            ErrorKind::Cancelled => tonic::Status::cancelled(message),
            ErrorKind::NotFound => tonic::Status::not_found(message),
            _ => tonic::Status::internal(message),
        }
    }
}
