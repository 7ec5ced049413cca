//! Credential store: the single authority over the session token and user
//! profile, shielding callers from the storage medium.

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{Storage, StoreError, keys};
use crate::token;

/// Fallback credentials injected at runtime.
///
/// All fields are optional. A production deployment configures none, which
/// turns a missing session token into a hard [`StoreError::NoCredentials`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FallbackTokens {
    /// Substituted when the server rejects a token as expired.
    #[serde(default)]
    pub expired: Option<String>,
    /// Substituted on other auth failures, or when no token is stored at all.
    #[serde(default)]
    pub generic: Option<String>,
    /// Used when a login response carries no token.
    #[serde(default)]
    pub login: Option<String>,
}

impl FallbackTokens {
    pub fn is_empty(&self) -> bool {
        self.expired.is_none() && self.generic.is_none() && self.login.is_none()
    }

    /// The credential to substitute for the given reason.
    fn for_reason(&self, reason: FallbackReason) -> Option<&str> {
        match reason {
            FallbackReason::Expired => self.expired.as_deref().or(self.generic.as_deref()),
            FallbackReason::Generic => self.generic.as_deref(),
            FallbackReason::Login => self.login.as_deref(),
        }
    }

    /// True if any configured fallback is still within its validity window.
    fn any_valid(&self) -> bool {
        [&self.expired, &self.generic, &self.login]
            .into_iter()
            .flatten()
            .any(|t| token::is_valid(t))
    }
}

/// Why a fallback credential is being substituted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    /// The server reported the previous token as expired.
    Expired,
    /// Any other authentication failure, or no token available.
    Generic,
    /// A login response carried no token.
    Login,
}

/// How much session state `clear_session` removes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutMode {
    /// Clear the profile and auxiliary keys but keep the active token and
    /// logged-in flag. The session can be re-entered while the token is
    /// unexpired.
    Soft,
    /// Clear everything, including the token and the logged-in flag.
    Hard,
}

/// User profile as stored locally. Display data only; the server copy is
/// authoritative and this one may be stale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    /// Photo reference. The backend has been observed reporting it under
    /// several different field names.
    #[serde(
        default,
        alias = "photoUri",
        alias = "avatarUrl",
        alias = "profilePhoto",
        alias = "imageUrl",
        alias = "photo"
    )]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub department_id: Option<i64>,
}

impl UserProfile {
    /// Minimal profile derived from a login email.
    pub fn with_email(email: &str) -> Self {
        Self {
            email: Some(email.to_string()),
            ..Self::default()
        }
    }
}

/// Reads, writes, and invalidates the session token and user profile.
///
/// Owned by the session composition root; there is no module-level state.
pub struct CredentialStore {
    storage: Storage,
    fallbacks: FallbackTokens,
    // Guards every read-check-write sequence over the active token, so
    // concurrent callers serialize and fallback rotation is single-flight.
    cache: Mutex<Option<String>>,
}

impl CredentialStore {
    pub fn new(storage: Storage, fallbacks: FallbackTokens) -> Self {
        Self {
            storage,
            fallbacks,
            cache: Mutex::new(None),
        }
    }

    /// Store a new session token and mark the session as logged in.
    ///
    /// Empty input is ignored with a warning. The in-memory cache is updated
    /// before durable storage, so an immediately following [`token`] returns
    /// the new value even when the durable write fails.
    ///
    /// [`token`]: CredentialStore::token
    pub async fn set_token(&self, token: &str) -> Result<(), StoreError> {
        if token.is_empty() {
            warn!("ignoring attempt to store an empty token");
            return Ok(());
        }

        let mut cache = self.cache.lock().await;
        *cache = Some(token.to_string());
        self.storage.set(keys::AUTH_TOKEN, token).await?;
        self.storage.set(keys::IS_LOGGED_IN, "true").await?;
        Ok(())
    }

    /// Get a usable bearer credential.
    ///
    /// Resolution order: unexpired cached token, unexpired stored token,
    /// configured generic fallback (persisted as the new token before being
    /// returned). An expired token is never returned. With a fallback
    /// configured this always yields a non-empty string; without one it
    /// fails with [`StoreError::NoCredentials`].
    pub async fn token(&self) -> Result<String, StoreError> {
        let mut cache = self.cache.lock().await;

        if let Some(tok) = cache.as_ref() {
            if token::is_valid(tok) {
                return Ok(tok.clone());
            }
            debug!("cached token is expired");
        }

        match self.storage.get(keys::AUTH_TOKEN).await {
            Ok(Some(stored)) if token::is_valid(&stored) => {
                *cache = Some(stored.clone());
                return Ok(stored);
            }
            Ok(Some(_)) => debug!("stored token is expired"),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "failed to read stored token"),
        }

        self.provision_fallback(FallbackReason::Generic, &mut cache)
            .await
    }

    /// Replace the active token with the configured fallback for `reason`,
    /// persisting it before returning it. Used by the API client's 401
    /// recovery path.
    pub async fn rotate_fallback(&self, reason: FallbackReason) -> Result<String, StoreError> {
        let mut cache = self.cache.lock().await;
        self.provision_fallback(reason, &mut cache).await
    }

    async fn provision_fallback(
        &self,
        reason: FallbackReason,
        cache: &mut Option<String>,
    ) -> Result<String, StoreError> {
        let Some(substitute) = self.fallbacks.for_reason(reason) else {
            return Err(StoreError::NoCredentials);
        };

        warn!(?reason, "substituting fallback credential");
        *cache = Some(substitute.to_string());
        if let Err(e) = self.storage.set(keys::AUTH_TOKEN, substitute).await {
            // The caller still gets a usable credential; the next read will
            // fall back again.
            warn!(error = %e, "failed to persist fallback token");
        }
        Ok(substitute.to_string())
    }

    /// Read the stored profile. A missing or undecodable value degrades to
    /// `None`.
    pub async fn profile(&self) -> Result<Option<UserProfile>, StoreError> {
        let Some(raw) = self.storage.get(keys::USER_DATA).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(profile) => Ok(Some(profile)),
            Err(e) => {
                warn!(error = %e, "stored profile is not valid JSON");
                Ok(None)
            }
        }
    }

    /// Overwrite the stored profile.
    pub async fn set_profile(&self, profile: &UserProfile) -> Result<(), StoreError> {
        let raw = serde_json::to_string(profile)?;
        self.storage.set(keys::USER_DATA, &raw).await?;
        Ok(())
    }

    /// Photo reference, persisted under its own key so a locally known photo
    /// survives a profile re-fetch that omits one.
    pub async fn photo_url(&self) -> Result<Option<String>, StoreError> {
        Ok(self.storage.get(keys::PROFILE_PHOTO_URL).await?)
    }

    pub async fn set_photo_url(&self, url: &str) -> Result<(), StoreError> {
        self.storage.set(keys::PROFILE_PHOTO_URL, url).await?;
        Ok(())
    }

    pub async fn clear_photo_url(&self) -> Result<(), StoreError> {
        self.storage.remove(&[keys::PROFILE_PHOTO_URL]).await?;
        Ok(())
    }

    /// Auxiliary keys written at login. Present for schema parity with the
    /// backend's session payload; no client logic reads them back.
    pub async fn set_refresh_token(&self, token: &str) -> Result<(), StoreError> {
        self.storage.set(keys::REFRESH_TOKEN, token).await?;
        Ok(())
    }

    pub async fn set_token_expiry(&self, exp_secs: u64) -> Result<(), StoreError> {
        self.storage
            .set(keys::TOKEN_EXPIRY, &exp_secs.to_string())
            .await?;
        Ok(())
    }

    /// Whether a usable session exists.
    ///
    /// True if the cache holds an unexpired token, or the durable logged-in
    /// flag is set and the stored token is unexpired, or any configured
    /// fallback credential is still within its validity window. Without
    /// configured fallbacks (production) only the first two arms apply.
    pub async fn is_logged_in(&self) -> bool {
        {
            let cache = self.cache.lock().await;
            if let Some(tok) = cache.as_ref() {
                if token::is_valid(tok) {
                    return true;
                }
            }
        }

        match self.storage.get(keys::IS_LOGGED_IN).await {
            Ok(Some(flag)) if flag == "true" => match self.storage.get(keys::AUTH_TOKEN).await {
                Ok(Some(tok)) if token::is_valid(&tok) => return true,
                Ok(_) => {}
                Err(e) => warn!(error = %e, "failed to read stored token"),
            },
            Ok(_) => {}
            Err(e) => warn!(error = %e, "failed to read logged-in flag"),
        }

        self.fallbacks.any_valid()
    }

    /// End the session.
    ///
    /// Always removes the profile, photo reference, and auxiliary keys.
    /// [`LogoutMode::Soft`] (the default logout) keeps the active token and
    /// logged-in flag; [`LogoutMode::Hard`] removes them too.
    pub async fn clear_session(&self, mode: LogoutMode) -> Result<(), StoreError> {
        let mut cache = self.cache.lock().await;

        self.storage
            .remove(&[
                keys::USER_DATA,
                keys::PROFILE_PHOTO_URL,
                keys::REFRESH_TOKEN,
                keys::TOKEN_EXPIRY,
            ])
            .await?;

        if mode == LogoutMode::Hard {
            *cache = None;
            self.storage
                .remove(&[keys::AUTH_TOKEN, keys::IS_LOGGED_IN])
                .await?;
        }

        Ok(())
    }
}
