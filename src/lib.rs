pub mod cli;
pub mod client;
pub mod store;
pub mod token;

pub use client::{ApiClient, ApiError, AuthScheme, ClientConfig};
pub use store::{
    CredentialStore, FallbackTokens, LogoutMode, Storage, StoreError, UserProfile,
};

use std::sync::Arc;

/// Everything needed to assemble a session.
pub struct SessionConfig {
    /// Path to the SQLite credential database (`:memory:` for tests).
    pub database: String,
    /// HTTP client settings.
    pub client: ClientConfig,
    /// Runtime-injected fallback credentials; empty in production.
    pub fallbacks: FallbackTokens,
}

/// Composition root: owns the credential store and the API client.
///
/// The store's in-memory cache lives and dies with this object; durable
/// state outlives it according to [`LogoutMode`]. The app models exactly
/// one active session per credential database.
pub struct Session {
    store: Arc<CredentialStore>,
    api: ApiClient,
}

impl Session {
    /// Open (or create) the credential database and build the API client.
    pub async fn open(config: SessionConfig) -> Result<Self, ApiError> {
        let storage = Storage::open(&config.database)
            .await
            .map_err(|e| ApiError::Store(StoreError::Storage(e)))?;
        let store = Arc::new(CredentialStore::new(storage, config.fallbacks));
        let api = ApiClient::new(&config.client, store.clone())?;
        Ok(Self { store, api })
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }
}
