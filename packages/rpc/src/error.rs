//! Error types for routing and dispatch.

use poseidon_host::{CallError, HostError, StatusCode};

/// Failures of the payload codec.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// The text is not valid for the encoding.
    #[error("malformed payload: {message}")]
    MalformedPayload { message: String },

    /// The text parsed, but its shape does not fit the target type.
    #[error("payload does not match expected shape: {message}")]
    SchemaMismatch { message: String },

    /// A typed value could not be serialized.
    #[error("encode failed: {message}")]
    Encode { message: String },
}

impl CodecError {
    /// Classify a serde_json failure seen while decoding.
    pub(crate) fn from_decode(error: serde_json::Error) -> Self {
        use serde_json::error::Category;

        match error.classify() {
            Category::Data => CodecError::SchemaMismatch {
                message: error.to_string(),
            },
            Category::Syntax | Category::Eof | Category::Io => CodecError::MalformedPayload {
                message: error.to_string(),
            },
        }
    }

    pub(crate) fn from_encode(error: serde_json::Error) -> Self {
        CodecError::Encode {
            message: error.to_string(),
        }
    }
}

/// Startup-time registration failures. Both abort initialization.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("route `{name}` is already registered")]
    DuplicateRoute { name: String },

    #[error("runtime refused route `{name}`: {source}")]
    HostRegistrationFailed {
        name: String,
        #[source]
        source: HostError,
    },
}

/// Error returned by a typed handler.
///
/// Carries the status code the caller should see. Handler errors are
/// passed back to the caller as they are; dispatch never retries them.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct HandlerError {
    code: StatusCode,
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl HandlerError {
    /// A business error with `StatusCode::Unknown`.
    pub fn new(message: impl Into<String>) -> Self {
        Self::with_code(StatusCode::Unknown, message)
    }

    pub fn with_code(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Wrap any error, keeping its message and chaining it as the source.
    pub fn from_source(
        code: StatusCode,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        let source = source.into();
        Self {
            code,
            message: source.to_string(),
            source: Some(source),
        }
    }

    pub fn code(&self) -> StatusCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<HostError> for HandlerError {
    fn from(error: HostError) -> Self {
        HandlerError::from_source(error.status(), error)
    }
}

/// Coarse classification of a dispatch failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller's request was malformed; retry with corrected input.
    BadRequest,
    /// No route by that name.
    NotFound,
    /// The handler reported a failure.
    Handler,
    /// A server-side defect in route wiring.
    Internal,
    /// The caller went away.
    Cancelled,
}

/// Everything that can go wrong in one dispatched call.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("no route named `{route}`")]
    NotFound { route: String },

    #[error("route `{route}`: malformed payload: {message}")]
    MalformedPayload { route: String, message: String },

    #[error("route `{route}`: payload does not match expected shape: {message}")]
    SchemaMismatch { route: String, message: String },

    #[error("route `{route}`: {source}")]
    HandlerFailed {
        route: String,
        #[source]
        source: HandlerError,
    },

    #[error("route `{route}` produced a result it cannot encode: {message}")]
    EncodeFailed { route: String, message: String },

    #[error("route `{route}` cancelled")]
    Cancelled { route: String },
}

impl RpcError {
    pub(crate) fn decode(route: &str, error: CodecError) -> Self {
        let route = route.to_string();
        match error {
            CodecError::MalformedPayload { message } => RpcError::MalformedPayload { route, message },
            CodecError::SchemaMismatch { message } => RpcError::SchemaMismatch { route, message },
            CodecError::Encode { message } => RpcError::EncodeFailed { route, message },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            RpcError::NotFound { .. } => ErrorKind::NotFound,
            RpcError::MalformedPayload { .. } | RpcError::SchemaMismatch { .. } => {
                ErrorKind::BadRequest
            }
            RpcError::HandlerFailed { .. } => ErrorKind::Handler,
            RpcError::EncodeFailed { .. } => ErrorKind::Internal,
            RpcError::Cancelled { .. } => ErrorKind::Cancelled,
        }
    }

    /// The status code reported to the runtime.
    pub fn code(&self) -> StatusCode {
        match self {
            RpcError::NotFound { .. } => StatusCode::NotFound,
            RpcError::MalformedPayload { .. } | RpcError::SchemaMismatch { .. } => {
                StatusCode::InvalidArgument
            }
            RpcError::HandlerFailed { source, .. } => source.code(),
            RpcError::EncodeFailed { .. } => StatusCode::Internal,
            RpcError::Cancelled { .. } => StatusCode::Cancelled,
        }
    }
}

impl From<RpcError> for CallError {
    fn from(error: RpcError) -> Self {
        let message = match &error {
            // The caller sees the handler's own message, untouched.
            RpcError::HandlerFailed { source, .. } => source.message().to_string(),
            other => other.to_string(),
        };
        CallError::new(error.code(), message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as StdError;

    #[test]
    fn decode_errors_are_classified() {
        let syntax = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        assert!(matches!(
            CodecError::from_decode(syntax),
            CodecError::MalformedPayload { .. }
        ));

        let eof = serde_json::from_str::<serde_json::Value>("{\"a\":").unwrap_err();
        assert!(matches!(
            CodecError::from_decode(eof),
            CodecError::MalformedPayload { .. }
        ));

        let data = serde_json::from_str::<u32>("\"seven\"").unwrap_err();
        assert!(matches!(
            CodecError::from_decode(data),
            CodecError::SchemaMismatch { .. }
        ));
    }

    #[test]
    fn bad_requests_map_to_invalid_argument() {
        let e = RpcError::decode(
            "echo",
            CodecError::MalformedPayload {
                message: "x".into(),
            },
        );
        assert_eq!(e.kind(), ErrorKind::BadRequest);
        assert_eq!(e.code(), StatusCode::InvalidArgument);
        assert!(e.to_string().contains("echo"));
    }

    #[test]
    fn encode_failure_is_internal() {
        let e = RpcError::EncodeFailed {
            route: "r".into(),
            message: "boom".into(),
        };
        assert_eq!(e.kind(), ErrorKind::Internal);
        assert_eq!(CallError::from(e).code, StatusCode::Internal);
    }

    #[test]
    fn handler_failure_keeps_code_and_message() {
        let e = RpcError::HandlerFailed {
            route: "buy".into(),
            source: HandlerError::with_code(StatusCode::NotFound, "no such item"),
        };
        let call = CallError::from(e);
        assert_eq!(call.code, StatusCode::NotFound);
        assert_eq!(call.message, "no such item");
    }

    #[test]
    fn host_errors_chain_as_source() {
        let e = HandlerError::from(HostError::storage("disk"));
        assert_eq!(e.code(), StatusCode::Internal);
        assert!(StdError::source(&e).is_some());

        let cancelled = HandlerError::from(HostError::Cancelled);
        assert_eq!(cancelled.code(), StatusCode::Cancelled);
    }

    #[test]
    fn plain_handler_error_has_no_source() {
        let e = HandlerError::new("nope");
        assert_eq!(e.code(), StatusCode::Unknown);
        assert!(StdError::source(&e).is_none());
    }
}
