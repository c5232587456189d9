use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Canonical status codes shared by the transport seam, in-band
/// `comm_status` values and the RPC error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Code {
    Ok,
    InvalidArgument,
    NotFound,
    AlreadyExists,
    DeadlineExceeded,
    FailedPrecondition,
    Unavailable,
    Internal,
    Unknown,
    ResourceExhausted,
    PermissionDenied,
}

impl Code {
    /// Upper-case wire name of the code (e.g. `NOT_FOUND`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Code::Ok => "OK",
            Code::InvalidArgument => "INVALID_ARGUMENT",
            Code::NotFound => "NOT_FOUND",
            Code::AlreadyExists => "ALREADY_EXISTS",
            Code::DeadlineExceeded => "DEADLINE_EXCEEDED",
            Code::FailedPrecondition => "FAILED_PRECONDITION",
            Code::Unavailable => "UNAVAILABLE",
            Code::Internal => "INTERNAL",
            Code::Unknown => "UNKNOWN",
            Code::ResourceExhausted => "RESOURCE_EXHAUSTED",
            Code::PermissionDenied => "PERMISSION_DENIED",
        }
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured status: a [`Code`] plus a human-readable message.
///
/// This is what transports report on failure and what request handlers
/// raise when they want a specific code to reach the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct Status {
    pub code: Code,
    pub message: String,
}

impl Status {
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        // ---
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn ok() -> Self {
        Self::new(Code::Ok, "")
    }

    pub fn is_ok(&self) -> bool {
        self.code == Code::Ok
    }
}

/// Errors surfaced by the RPC engines.
///
/// Asynchronous call outcomes are limited to [`RpcError::SendFailed`],
/// [`RpcError::DeadlineExceeded`] and [`RpcError::Remote`]; the remaining
/// variants are returned synchronously at the API boundary.
#[derive(Error, Debug)]
pub enum RpcError {
    /// Malformed attributes or arguments, rejected before anything was sent.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// No matching registration exists.
    #[error("not found: {0}")]
    NotFound(String),

    /// A registration for the same key is already present.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// The transport rejected the outbound request.
    #[error("send failed: {0}")]
    SendFailed(Status),

    /// No response arrived within the request TTL.
    #[error("deadline exceeded: no response within {0:?}")]
    DeadlineExceeded(Duration),

    /// The peer answered with a non-OK `comm_status`.
    #[error("remote error: {0}")]
    Remote(Status),

    /// Listener (un)registration failed on the transport.
    #[error("transport error: {0}")]
    Transport(Status),

    /// The engine went away before the call could complete.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// JSON serialization or deserialization failed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RpcError {
    /// Canonical code for this error.
    ///
    /// For `SendFailed`, `Remote` and `Transport` this is the code carried by
    /// the wrapped status.
    pub fn code(&self) -> Code {
        // ---
        match self {
            RpcError::InvalidArgument(_) => Code::InvalidArgument,
            RpcError::NotFound(_) => Code::NotFound,
            RpcError::AlreadyExists(_) => Code::AlreadyExists,
            RpcError::SendFailed(status) => status.code,
            RpcError::DeadlineExceeded(_) => Code::DeadlineExceeded,
            RpcError::Remote(status) => status.code,
            RpcError::Transport(status) => status.code,
            RpcError::Unavailable(_) => Code::Unavailable,
            RpcError::Serialization(_) => Code::InvalidArgument,
        }
    }
}

impl From<&RpcError> for Status {
    fn from(err: &RpcError) -> Self {
        // ---
        match err {
            RpcError::SendFailed(status) | RpcError::Remote(status) | RpcError::Transport(status) => {
                status.clone()
            }
            other => Status::new(other.code(), other.to_string()),
        }
    }
}

impl From<RpcError> for Status {
    fn from(err: RpcError) -> Self {
        Status::from(&err)
    }
}

/// Error raised by a request handler.
///
/// A `Status` is echoed to the caller as-is; anything else is reported as
/// `INTERNAL` carrying the error's description.
#[derive(Error, Debug)]
pub enum HandlerError {
    #[error(transparent)]
    Status(#[from] Status),

    #[error("{0}")]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl HandlerError {
    /// Wrap an arbitrary error.
    pub fn other<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        HandlerError::Other(err.into())
    }

    /// The status a response should carry for this error.
    pub fn to_status(&self) -> Status {
        // ---
        match self {
            HandlerError::Status(status) => status.clone(),
            HandlerError::Other(err) => Status::new(Code::Internal, err.to_string()),
        }
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        Status::new(Code::InvalidArgument, err.to_string()).into()
    }
}

impl From<RpcError> for HandlerError {
    fn from(err: RpcError) -> Self {
        HandlerError::Status(err.into())
    }
}

/// Result type alias for RPC operations
pub type Result<T> = std::result::Result<T, RpcError>;
