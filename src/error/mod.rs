// Error handling module for the gateway
//
// This module defines error types and utility functions for error handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::result;
use thiserror::Error;

/// Result type for gateway operations
pub type Result<T> = result::Result<T, GatewayError>;

/// Error type for gateway operations. Variant names follow the error
/// classes laid out in the gateway's error-handling design; several also
/// carry the errno tag (`ENOENT`, `EINVAL`, ...) that the upstream RPC
/// API returns so client code can branch on either one.
#[derive(Debug, Error, Clone)]
pub enum GatewayError {
    /// Malformed request body, path, or query string
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Malformed input that isn't tied to a specific request (bad hex,
    /// bad key material, ...)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A public key failed to parse or did not match the expected device
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    /// Session, signature, or master-password verification failed
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    /// An auth *request* (`GET /auth`) itself did not check out: the
    /// signing key is not the one declared for the claimed `device_id`,
    /// or the request token failed to verify. Distinct from `AuthFailed`,
    /// which covers an already-issued session or credential being
    /// rejected on a later request.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// The request conflicts with existing state (datastore already
    /// exists, stale device root, ...)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The registrar or blockchain backend is unreachable, timed out, or
    /// returned malformed data. General upstream failure (spec.md §7/§4.6).
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Every driver URL for a read was tried and none returned data whose
    /// hash matched (spec.md §4.4.2's "ENODATA" case). Distinct from the
    /// general `Upstream` variant: this is a local fallback exhausted, not
    /// a remote service being unreachable, so it keeps its own 502 mapping
    /// per SPEC_FULL §7's ENODATA resolution rather than sharing 503.
    #[error("No driver returned valid data: {0}")]
    DriverExhausted(String),

    /// The operation was accepted but could not complete synchronously
    /// (a concurrent write is in flight, a registrar job is queued)
    #[error("Operation in progress")]
    InProgress,

    /// Feature recognized but not implemented
    #[error("Not implemented: {0}")]
    NotImplemented(String),

    /// Anything else: I/O, serialization, programming errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// Request body exceeded the configured size limit
    #[error("Payload too large: {0} bytes")]
    PayloadTooLarge(usize),

    /// A Range header could not be satisfied against the resource length
    #[error("Range not satisfiable")]
    RangeNotSatisfiable,
}

impl GatewayError {
    /// Create an internal error from any displayable source
    pub fn internal<E: std::fmt::Display>(e: E) -> Self {
        Self::Internal(e.to_string())
    }

    /// Create a not-found error
    pub fn not_found<S: Into<String>>(message: S) -> Self {
        Self::NotFound(message.into())
    }

    /// Create an auth-failed error
    pub fn auth_failed<S: Into<String>>(message: S) -> Self {
        Self::AuthFailed(message.into())
    }

    /// Create an unauthorized error (bad auth *request*, not a bad
    /// already-issued credential)
    pub fn unauthorized<S: Into<String>>(message: S) -> Self {
        Self::Unauthorized(message.into())
    }

    /// Create a general upstream error (unreachable service, malformed
    /// response) — mapped to 503
    pub fn upstream<S: Into<String>>(message: S) -> Self {
        Self::Upstream(message.into())
    }

    /// Create a driver-fallback-exhausted error — mapped to 502
    pub fn driver_exhausted<S: Into<String>>(message: S) -> Self {
        Self::DriverExhausted(message.into())
    }

    /// The errno-style tag the upstream RPC API attaches to this class of
    /// error, surfaced in the JSON body as `error.errno` for clients that
    /// branch on it rather than the HTTP status alone.
    fn errno(&self) -> &'static str {
        match self {
            GatewayError::InvalidRequest(_)
            | GatewayError::InvalidInput(_)
            | GatewayError::InvalidPublicKey(_) => "EINVAL",
            GatewayError::AuthFailed(_) => "EACCES",
            GatewayError::Unauthorized(_) => "EACCES",
            GatewayError::NotFound(_) => "ENOENT",
            GatewayError::Conflict(_) => "EEXIST",
            GatewayError::Upstream(_) => "EIO",
            // Resolved: a driver round-trip that succeeds but yields
            // nothing usable is an upstream fault, tagged ENODATA and
            // mapped to 502 below rather than treated as our own 500.
            GatewayError::DriverExhausted(_) => "ENODATA",
            GatewayError::InProgress => "EAGAIN",
            GatewayError::NotImplemented(_) => "ENOSYS",
            GatewayError::Internal(_) => "EPERM",
            GatewayError::PayloadTooLarge(_) => "EFBIG",
            GatewayError::RangeNotSatisfiable => "ERANGE",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            // spec.md §7/§4.1: a request that fails schema validation
            // answers 401, not 400.
            GatewayError::InvalidRequest(_) => StatusCode::UNAUTHORIZED,
            GatewayError::InvalidInput(_) | GatewayError::InvalidPublicKey(_) => {
                StatusCode::BAD_REQUEST
            }
            GatewayError::AuthFailed(_) => StatusCode::FORBIDDEN,
            GatewayError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::Conflict(_) => StatusCode::CONFLICT,
            GatewayError::Upstream(_) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::DriverExhausted(_) => StatusCode::BAD_GATEWAY,
            GatewayError::InProgress => StatusCode::ACCEPTED,
            GatewayError::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::RangeNotSatisfiable => StatusCode::RANGE_NOT_SATISFIABLE,
        }
    }
}

/// Implement IntoResponse for GatewayError so it can be returned directly from handlers
impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let errno = self.errno();
        let message = self.to_string();

        let body = Json(serde_json::json!({
            "error": {
                "code": status.as_u16(),
                "errno": errno,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

impl From<std::io::Error> for GatewayError {
    fn from(err: std::io::Error) -> Self {
        GatewayError::Internal(err.to_string())
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        GatewayError::Upstream(err.to_string())
    }
}

impl From<toml::ser::Error> for GatewayError {
    fn from(err: toml::ser::Error) -> Self {
        GatewayError::Internal(format!("config serialization: {err}"))
    }
}

impl From<toml::de::Error> for GatewayError {
    fn from(err: toml::de::Error) -> Self {
        GatewayError::Internal(format!("config: {err}"))
    }
}

impl From<config::ConfigError> for GatewayError {
    fn from(err: config::ConfigError) -> Self {
        GatewayError::Internal(format!("config: {err}"))
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        GatewayError::InvalidInput(err.to_string())
    }
}
