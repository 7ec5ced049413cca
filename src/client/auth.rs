//! Authentication operations: login, register, logout, session queries.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{ApiClient, ApiError};
use crate::store::{FallbackReason, LogoutMode, UserProfile};
use crate::token;

/// Payload of a successful login response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginData {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub user: Option<UserProfile>,
}

/// New-account registration request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub department_id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

impl ApiClient {
    /// Log in and persist the resulting session.
    ///
    /// Any previous session is replaced wholesale. A response without a
    /// token falls back to the configured login credential (a dev
    /// convenience); without one it is a hard authentication failure.
    pub async fn login(&self, email: &str, password: &str) -> Result<UserProfile, ApiError> {
        #[derive(Serialize)]
        struct Credentials<'a> {
            email: &'a str,
            password: &'a str,
        }

        let url = self.endpoint("auth/login");
        info!(email = %email, "logging in");
        let response = self
            .http
            .post(&url)
            .json(&Credentials { email, password })
            .send()
            .await
            .map_err(ApiError::Network)?;
        let data: LoginData = self.expect_data(response).await?;

        let store = self.store();
        match data.token.as_deref().filter(|t| !t.is_empty()) {
            Some(tok) => {
                store.clear_session(LogoutMode::Hard).await?;

                if !token::looks_like_jwt(tok) {
                    warn!("login token is not JWT-shaped");
                }
                store.set_token(tok).await?;
                if let Some(claims) = token::decode_claims(tok) {
                    store.set_token_expiry(claims.exp).await?;
                }
                if let Some(refresh) = data.refresh_token.as_deref() {
                    store.set_refresh_token(refresh).await?;
                }

                let profile = data
                    .user
                    .unwrap_or_else(|| UserProfile::with_email(email));
                store.set_profile(&profile).await?;
                Ok(profile)
            }
            None => {
                let Ok(_) = store.rotate_fallback(FallbackReason::Login).await else {
                    return Err(ApiError::Auth(
                        "login response did not include a token".to_string(),
                    ));
                };
                info!("login response had no token, using configured fallback");
                let profile = UserProfile::with_email(email);
                store.set_profile(&profile).await?;
                Ok(profile)
            }
        }
    }

    /// Register a new account.
    pub async fn register(&self, request: &RegisterRequest) -> Result<UserProfile, ApiError> {
        let url = self.endpoint("auth/register");
        let response = self
            .http
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(ApiError::Network)?;
        self.expect_data(response).await
    }

    /// End the session. Soft by default: the active token stays stored.
    pub async fn logout(&self, mode: LogoutMode) -> Result<(), ApiError> {
        self.store().clear_session(mode).await?;
        Ok(())
    }

    /// Whether a usable session exists.
    pub async fn is_logged_in(&self) -> bool {
        self.store().is_logged_in().await
    }

    /// The locally stored user, if any.
    pub async fn current_user(&self) -> Result<Option<UserProfile>, ApiError> {
        Ok(self.store().profile().await?)
    }
}
