//! API client error types.

use crate::store::StoreError;

/// Errors surfaced by API operations.
///
/// Nothing here is fatal: every failure resolves to either a substituted
/// credential upstream or one of these values for the caller to render.
#[derive(Debug)]
pub enum ApiError {
    /// The request never produced a response (connect, TLS, timeout).
    Network(reqwest::Error),
    /// 401 that survived the single fallback retry, or had none available.
    Unauthorized { message: String },
    /// 403 with the server-supplied message when available.
    Forbidden { message: String },
    /// Any other non-success status.
    Status { status: u16, message: String },
    /// The response body could not be decoded.
    Decode(String),
    /// Authentication flow failure (e.g. a login response without a token).
    Auth(String),
    /// Malformed client-side input.
    Invalid(String),
    /// Credential store failure.
    Store(StoreError),
    /// The configured base URL is invalid.
    BaseUrl(url::ParseError),
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Network(e) => write!(f, "network error: {}", e),
            ApiError::Unauthorized { message } => write!(f, "unauthorized: {}", message),
            ApiError::Forbidden { message } => write!(f, "forbidden: {}", message),
            ApiError::Status { status, message } => {
                write!(f, "server returned {}: {}", status, message)
            }
            ApiError::Decode(msg) => write!(f, "failed to decode response: {}", msg),
            ApiError::Auth(msg) => write!(f, "authentication failed: {}", msg),
            ApiError::Invalid(msg) => write!(f, "invalid request: {}", msg),
            ApiError::Store(e) => write!(f, "credential store error: {}", e),
            ApiError::BaseUrl(e) => write!(f, "invalid base URL: {}", e),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ApiError::Store(e)
    }
}

impl From<url::ParseError> for ApiError {
    fn from(e: url::ParseError) -> Self {
        ApiError::BaseUrl(e)
    }
}
