//! Error types for the host seam.

/// Status codes understood by the runtime's calling convention.
///
/// These follow the gRPC numbering the runtime uses when it reports a
/// failed remote call back to a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    Ok = 0,
    Cancelled = 1,
    Unknown = 2,
    InvalidArgument = 3,
    NotFound = 5,
    Internal = 13,
}

impl StatusCode {
    /// The numeric wire value.
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

impl std::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StatusCode::Ok => "ok",
            StatusCode::Cancelled => "cancelled",
            StatusCode::Unknown => "unknown",
            StatusCode::InvalidArgument => "invalid argument",
            StatusCode::NotFound => "not found",
            StatusCode::Internal => "internal",
        };
        write!(f, "{} ({})", name, self.as_i32())
    }
}

/// Errors raised by the runtime itself.
///
/// Upper layers pass these through unchanged; they never reinterpret a
/// storage failure as something else.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    /// Another subsystem already claimed this remote-call name.
    #[error("rpc name already claimed: {name}")]
    RouteClaimed { name: String },

    /// A storage read or write failed inside the runtime.
    #[error("storage error: {message}")]
    Storage { message: String },

    /// The caller gave up before the operation finished.
    #[error("operation cancelled")]
    Cancelled,

    /// Generic runtime failure.
    #[error("{message}")]
    Other { message: String },
}

impl HostError {
    pub fn storage(message: impl Into<String>) -> Self {
        HostError::Storage {
            message: message.into(),
        }
    }

    /// The status code a client sees when this error escapes a call.
    pub fn status(&self) -> StatusCode {
        match self {
            HostError::Cancelled => StatusCode::Cancelled,
            _ => StatusCode::Internal,
        }
    }
}

/// The error shape a remote-call callback hands back to the runtime.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct CallError {
    pub code: StatusCode,
    pub message: String,
}

impl CallError {
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<HostError> for CallError {
    fn from(error: HostError) -> Self {
        CallError::new(error.status(), error.to_string())
    }
}
