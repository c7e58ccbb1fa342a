//! Common error types for Vigil components.

use thiserror::Error;

/// Common errors across Vigil components
#[derive(Debug, Error)]
pub enum VigilError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Content store / nonce cache failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Remote classification call failed
    #[error("Service error: {0}")]
    Service(#[from] ClientError),

    /// Fatal submission error under the `block` fallback policy
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl VigilError {
    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Config(_) => 500,
            Self::Storage(_) => 503,
            Self::Service(_) => 502,
            Self::ServiceUnavailable(_) => 503,
        }
    }
}

/// Coarse classification of webhook authentication failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailureKind {
    /// Site has no usable credentials
    Configuration,
    /// Malformed or missing protocol parameters
    Protocol,
    /// Nonce seen before within the replay window
    Replay,
    /// Signature does not match
    Signature,
}

/// Reasons an inbound webhook request fails authentication
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthFailure {
    #[error("Missing module configuration")]
    MissingCredentials,

    #[error("Missing protocol parameters")]
    MissingParameters,

    #[error("Invalid public/consumer key")]
    ConsumerKeyMismatch,

    #[error("Unparseable authentication timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Outdated authentication timestamp ({age_secs}s old)")]
    ExpiredTimestamp { age_secs: i64 },

    #[error("Missing authentication nonce")]
    EmptyNonce,

    #[error("Replay attack")]
    Replay,

    #[error("Nonce cache unavailable: {0}")]
    NonceStore(String),

    #[error("Invalid authentication signature")]
    SignatureMismatch,
}

impl AuthFailure {
    pub fn kind(&self) -> AuthFailureKind {
        match self {
            Self::MissingCredentials | Self::NonceStore(_) => AuthFailureKind::Configuration,
            Self::MissingParameters
            | Self::ConsumerKeyMismatch
            | Self::InvalidTimestamp(_)
            | Self::ExpiredTimestamp { .. }
            | Self::EmptyNonce => AuthFailureKind::Protocol,
            Self::Replay => AuthFailureKind::Replay,
            Self::SignatureMismatch => AuthFailureKind::Signature,
        }
    }
}

/// Gate failures of the moderation webhook
#[derive(Debug, Error)]
pub enum ModerationError {
    #[error("Unsupported action: {0}")]
    UnsupportedAction(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Invalid authentication: {0}")]
    Unauthorized(#[from] AuthFailure),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl ModerationError {
    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::UnsupportedAction(_) => 400,
            Self::NotFound(_) => 410,
            Self::Unauthorized(_) => 401,
            Self::Storage(_) => 503,
        }
    }
}

/// Errors reported by the remote classification client
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// Invalid or missing API keys
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Service could not be reached
    #[error("Network error: {0}")]
    Network(String),

    /// Service answered with something we could not use
    #[error("Response error: {0}")]
    Response(String),

    /// Service refused the request parameters
    #[error("Request error: {0}")]
    Request(String),
}

impl ClientError {
    pub const NETWORK_ERROR: u16 = 900;
    pub const AUTH_ERROR: u16 = 1000;
    pub const RESPONSE_ERROR: u16 = 1100;
    pub const REQUEST_ERROR: u16 = 1200;

    /// Numeric error code of the remote API contract
    pub fn code(&self) -> u16 {
        match self {
            Self::Auth(_) => Self::AUTH_ERROR,
            Self::Network(_) => Self::NETWORK_ERROR,
            Self::Response(_) => Self::RESPONSE_ERROR,
            Self::Request(_) => Self::REQUEST_ERROR,
        }
    }
}
