//! Authenticated HTTP client for the university services backend.
//!
//! Every request goes through one shared path that attaches the stored
//! bearer credential and, on a 401, substitutes a fallback credential and
//! resubmits the request exactly once.

mod auth;
mod error;
mod exams;
mod profile;

pub use auth::{LoginData, RegisterRequest};
pub use error::ApiError;
pub use exams::{ExamFile, NewPastExam, PastExam};

use std::sync::Arc;
use std::time::Duration;

use reqwest::{RequestBuilder, StatusCode, header};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use crate::store::{CredentialStore, FallbackReason};

/// How the bearer credential is formatted in the Authorization header.
///
/// The backend has been observed accepting both forms; which one it actually
/// requires is a deployment property, so it is a configuration knob rather
/// than a per-call-site choice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthScheme {
    /// The raw token with no scheme prefix.
    #[default]
    Raw,
    /// `Bearer <token>`.
    Bearer,
}

impl AuthScheme {
    /// The one place an Authorization header value is built.
    pub fn header_value(self, token: &str) -> String {
        match self {
            AuthScheme::Raw => token.to_string(),
            AuthScheme::Bearer => format!("Bearer {}", token),
        }
    }
}

/// HTTP client settings.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend base URL including the API prefix, e.g.
    /// `http://localhost:8080/api/v1`.
    pub base_url: String,
    /// Request timeout. The only timeout this client enforces.
    pub timeout: Duration,
    /// Authorization header scheme the backend expects.
    pub auth_scheme: AuthScheme,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api/v1".to_string(),
            timeout: Duration::from_secs(10),
            auth_scheme: AuthScheme::default(),
        }
    }
}

/// A configured HTTP client sharing one [`CredentialStore`].
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    auth_scheme: AuthScheme,
    store: Arc<CredentialStore>,
}

impl ApiClient {
    pub fn new(config: &ClientConfig, store: Arc<CredentialStore>) -> Result<Self, ApiError> {
        let base_url = Url::parse(config.base_url.trim_end_matches('/'))?;

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(ApiError::Network)?;

        Ok(Self {
            http,
            base_url,
            auth_scheme: config.auth_scheme,
            store,
        })
    }

    /// The credential store this client reads tokens from.
    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// Full URL for an API path relative to the base URL.
    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Backend origin without the API path prefix, for absolutizing relative
    /// asset paths the backend returns.
    fn server_origin(&self) -> String {
        let mut origin = format!(
            "{}://{}",
            self.base_url.scheme(),
            self.base_url.host_str().unwrap_or("localhost")
        );
        if let Some(port) = self.base_url.port() {
            origin.push_str(&format!(":{}", port));
        }
        origin
    }

    /// Absolutize a photo path against the backend origin. Full URLs and
    /// local file URIs pass through unchanged.
    fn absolutize(&self, path: &str) -> String {
        if path.starts_with("http") || path.starts_with("file:") {
            return path.to_string();
        }
        let origin = self.server_origin();
        if path.starts_with('/') {
            format!("{}{}", origin, path)
        } else {
            format!("{}/{}", origin, path)
        }
    }

    /// Send a request with the stored credential attached, retrying once
    /// with a substituted fallback on 401.
    ///
    /// `build` must produce an equivalent request each time it is called;
    /// the retry path rebuilds the request from scratch.
    async fn send_authenticated<F>(&self, build: F) -> Result<reqwest::Response, ApiError>
    where
        F: Fn(&reqwest::Client) -> RequestBuilder,
    {
        let token = match self.store.token().await {
            Ok(token) => Some(token),
            Err(e) => {
                // The request proceeds unauthenticated and the failure
                // surfaces downstream as a 401.
                debug!(error = %e, "no credential available, sending unauthenticated");
                None
            }
        };

        let mut request = build(&self.http);
        if let Some(token) = &token {
            request = request.header(
                header::AUTHORIZATION,
                self.auth_scheme.header_value(token),
            );
        }

        let response = request.send().await.map_err(ApiError::Network)?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        // One-shot recovery: pick the fallback matching the server's
        // complaint and resubmit exactly once.
        let message = error_message(response).await;
        let reason = if message.to_lowercase().contains("expire") {
            FallbackReason::Expired
        } else {
            FallbackReason::Generic
        };

        let substitute = match self.store.rotate_fallback(reason).await {
            Ok(token) => token,
            Err(e) => {
                debug!(error = %e, "no fallback credential to retry with");
                return Err(ApiError::Unauthorized { message });
            }
        };

        warn!(?reason, "request was unauthorized, retrying with fallback credential");
        let retry = build(&self.http).header(
            header::AUTHORIZATION,
            self.auth_scheme.header_value(&substitute),
        );
        let response = retry.send().await.map_err(ApiError::Network)?;

        if response.status() == StatusCode::UNAUTHORIZED {
            let message = error_message(response).await;
            return Err(ApiError::Unauthorized { message });
        }
        Ok(response)
    }

    /// Check the status and unwrap the `{ "data": ... }` success envelope.
    async fn expect_data<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let response = check_status(response).await?;
        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))?;
        Ok(envelope.data)
    }
}

#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
}

/// Map non-success statuses onto the error taxonomy, consuming the body for
/// its message.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = error_message(response).await;
    match status {
        StatusCode::UNAUTHORIZED => Err(ApiError::Unauthorized { message }),
        StatusCode::FORBIDDEN => Err(ApiError::Forbidden { message }),
        _ => Err(ApiError::Status {
            status: status.as_u16(),
            message,
        }),
    }
}

/// Extract a human-readable message from a `{message}` or
/// `{error: {message}}` body, falling back to the raw text.
async fn error_message(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(&body) {
        if let Some(message) = value.get("message").and_then(|m| m.as_str()) {
            return message.to_string();
        }
        if let Some(message) = value
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str())
        {
            return message.to_string();
        }
    }

    if body.is_empty() {
        format!("server returned {}", status.as_u16())
    } else {
        body
    }
}
