//! Gateway error types.
//!
//! `ApiError` is the only error that reaches an HTTP client. Everything else is
//! handled where it happens and mapped into one of these at the handler edge.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt;

/// Short machine-readable error identifiers used in response bodies
pub mod codes {
    pub const BAD_REQUEST: &str = "bad_request";
    pub const INVALID_PROOF: &str = "invalid_proof";
    pub const RATE_LIMITED: &str = "too_many_requests";
    pub const INTERNAL_ERROR: &str = "internal_error";
}

/// Error rendered as `{error, message}` JSON with an HTTP status
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    #[serde(skip)]
    pub status: StatusCode,
    /// Short error identifier
    pub error: String,
    /// Human readable message
    pub message: String,
    /// Set on quota rejections so clients know to solve a challenge
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub requires_verification: bool,
}

impl ApiError {
    pub fn new(status: StatusCode, error: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            error: error.to_string(),
            message: message.into(),
            requires_verification: false,
        }
    }

    /// Malformed request body or parameters
    pub fn bad_request(details: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, codes::BAD_REQUEST, details)
    }

    /// Proof-of-work rejected. Deliberately generic.
    pub fn invalid_proof() -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            codes::INVALID_PROOF,
            "Verification failed",
        )
    }

    /// Quota exhausted for the current window
    pub fn rate_limited() -> Self {
        Self {
            requires_verification: true,
            ..Self::new(
                StatusCode::TOO_MANY_REQUESTS,
                codes::RATE_LIMITED,
                "Too many requests, please complete verification to continue",
            )
        }
    }

    /// Internal error. Details are logged by the caller, not returned.
    pub fn internal() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            codes::INTERNAL_ERROR,
            "Internal server error",
        )
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.status.as_u16(), self.error, self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

/// Result type for handlers
pub type ApiResult<T> = Result<T, ApiError>;

/// Gateway-level errors (boot and wiring, never sent to clients)
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Server socket bind error
    #[error("server bind error: {0}")]
    Bind(String),

    /// Internal server error
    #[error("internal error: {0}")]
    Internal(String),
}

/// Errors raised by persistence collaborators (settings and quota stores)
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// Store could not be reached
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Store answered with an error
    #[error("store backend error: {0}")]
    Backend(String),
}

/// RSA key lifecycle and decryption errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum KeyError {
    #[error("invalid base64: {0}")]
    InvalidBase64(String),

    #[error("invalid PEM key: {0}")]
    InvalidPem(String),

    #[error("key generation failed: {0}")]
    Generation(String),

    #[error("encryption failed: {0}")]
    Encrypt(String),

    #[error("decryption failed: {0}")]
    Decrypt(String),

    #[error("plaintext is not valid UTF-8")]
    InvalidUtf8,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Reasons a proof-of-work submission is rejected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChallengeError {
    #[error("malformed payload: {0}")]
    Malformed(String),

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("challenge expired")]
    Expired,

    #[error("solution does not match challenge")]
    Mismatch,

    #[error("invalid signature")]
    InvalidSignature,
}
