//! Error taxonomy shared by the core and every adapter.

use thiserror::Error;

/// Result type alias used throughout the core and its adapters.
pub type Result<T> = std::result::Result<T, Error>;

/// Tagged error kinds, one per the error taxonomy in the invocation spec.
///
/// Propagation policy: errors bubble upward unmodified through the pipeline;
/// only a dispatcher maps them to wire form (HTTP status or JSON-RPC code).
#[derive(Error, Debug)]
pub enum Error {
    /// Startup-only: the configuration document failed validation.
    #[error("configuration error: {0}")]
    ConfigInvalid(String),

    /// A required parameter was not supplied and has no default.
    #[error("parameter \"{0}\" is required")]
    ParamMissing(String),

    /// A supplied value could not be coerced to the parameter's declared type.
    #[error("parameter \"{name}\" has wrong type: {detail}")]
    ParamType {
        /// Parameter name.
        name: String,
        /// Human-readable coercion failure.
        detail: String,
    },

    /// An auth-bound parameter could not be resolved from verified claims.
    #[error("{0}")]
    Unauthorized(String),

    /// A caller invoked a tool without presenting any of its required auth services.
    #[error("unauthorized: tool requires one of {0:?}")]
    AuthRequired(Vec<String>),

    /// The backend rejected the call or the transport to it failed.
    #[error("backend error: {0}")]
    BackendError(String),

    /// The backend accepted and ran the operation, but the operation itself
    /// reported failure (e.g. an upstream MCP gateway's `tools/call` came
    /// back with a JSON-RPC `error` object rather than a transport fault).
    ///
    /// Carries the same wire treatment as [`Error::BackendError`] — both are
    /// execution-phase failures, so both are wrapped in a successful MCP
    /// envelope with `isError: true` (see [`Error::is_invocation_failure`])
    /// rather than surfaced as a JSON-RPC protocol error; the REST dispatcher
    /// maps both to HTTP 500. The two variants exist separately so adapters
    /// can still report *why* at the log line, not to change wire behaviour.
    #[error("invocation failed: {0}")]
    InvocationFailed(String),

    /// A named tool, toolset, or source does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// An MCP method outside the supported subset was requested.
    #[error("method not found: {0}")]
    MethodUnknown(String),

    /// Anything else — never surfaced to callers with internal detail.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Project this error onto the standard JSON-RPC 2.0 error codes used by the
    /// MCP dispatcher, plus the extended `INVOCATION_FAILED` / `UNAUTHORIZED`
    /// buckets this server maps onto `INVALID_REQUEST` / `INTERNAL_ERROR`.
    #[must_use]
    pub fn to_rpc_code(&self) -> i32 {
        match self {
            Self::MethodUnknown(_) => rpc_codes::METHOD_NOT_FOUND,
            Self::Unauthorized(_) | Self::AuthRequired(_) => rpc_codes::INVALID_REQUEST,
            Self::ParamMissing(_) | Self::ParamType { .. } | Self::NotFound(_) => {
                rpc_codes::INVALID_PARAMS
            }
            Self::ConfigInvalid(_) => rpc_codes::INVALID_REQUEST,
            Self::BackendError(_) | Self::InvocationFailed(_) | Self::Internal(_) => {
                rpc_codes::INTERNAL_ERROR
            }
        }
    }

    /// Project this error onto an HTTP status code for the REST dispatcher.
    #[must_use]
    pub fn to_http_status(&self) -> u16 {
        match self {
            Self::ParamMissing(_) | Self::ParamType { .. } | Self::ConfigInvalid(_) => 400,
            Self::Unauthorized(_) | Self::AuthRequired(_) => 401,
            Self::NotFound(_) | Self::MethodUnknown(_) => 404,
            Self::BackendError(_) | Self::InvocationFailed(_) | Self::Internal(_) => 500,
        }
    }

    /// Whether this error represents a backend-reported application failure
    /// rather than a protocol/validation failure — the MCP dispatcher wraps
    /// these in a successful envelope with `isError: true`.
    #[must_use]
    pub fn is_invocation_failure(&self) -> bool {
        matches!(self, Self::InvocationFailed(_) | Self::BackendError(_))
    }
}

/// Standard JSON-RPC 2.0 error codes, plus the server-error range MCP uses
/// for backend-specific failures.
pub mod rpc_codes {
    /// Invalid JSON was received by the server.
    pub const PARSE_ERROR: i32 = -32700;
    /// The JSON sent is not a valid Request object.
    pub const INVALID_REQUEST: i32 = -32600;
    /// The method does not exist or is not available.
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Invalid method parameter(s).
    pub const INVALID_PARAMS: i32 = -32602;
    /// Internal JSON-RPC error.
    pub const INTERNAL_ERROR: i32 = -32603;
}
