//! Durable key-value storage backed by SQLite.
//!
//! The credential store is the sole client of this layer; everything it
//! persists lives in a single `kv` table keyed by the constants in [`keys`].

mod credentials;

pub use credentials::{
    CredentialStore, FallbackReason, FallbackTokens, LogoutMode, UserProfile,
};

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

/// Keys used by the credential store.
pub mod keys {
    pub const AUTH_TOKEN: &str = "auth_token";
    pub const USER_DATA: &str = "user_data";
    pub const REFRESH_TOKEN: &str = "refresh_token";
    pub const TOKEN_EXPIRY: &str = "token_expiry";
    pub const IS_LOGGED_IN: &str = "is_logged_in";
    pub const PROFILE_PHOTO_URL: &str = "profile_photo_url";
}

/// Errors from the credential store and its storage backend.
#[derive(Debug)]
pub enum StoreError {
    /// Durable storage failed.
    Storage(sqlx::Error),
    /// Stored or provided data could not be (de)serialized.
    Serialize(serde_json::Error),
    /// No stored credential and no configured fallback.
    NoCredentials,
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Storage(e) => write!(f, "storage error: {}", e),
            StoreError::Serialize(e) => write!(f, "serialization error: {}", e),
            StoreError::NoCredentials => {
                write!(f, "no stored credential and no fallback configured")
            }
        }
    }
}

impl std::error::Error for StoreError {}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Storage(e)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialize(e)
    }
}

#[derive(Clone)]
pub struct Storage {
    pool: SqlitePool,
}

impl Storage {
    /// Open or create a database at the given path.
    /// Use ":memory:" for an in-memory database.
    pub async fn open(path: &str) -> Result<Self, sqlx::Error> {
        let url = if path == ":memory:" {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite:{}?mode=rwc", path)
        };

        // An in-memory database exists per connection, so the pool must not
        // open a second one.
        let max_connections = if path == ":memory:" { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(&url)
            .await?;

        let storage = Self { pool };
        storage.migrate().await?;
        Ok(storage)
    }

    /// Get the current schema version.
    async fn get_version(&self) -> Result<i32, sqlx::Error> {
        let result: Option<(i32,)> = sqlx::query_as("SELECT version FROM schema_version LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(result.map(|r| r.0).unwrap_or(0))
    }

    /// Set the schema version within a transaction.
    async fn set_version(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        version: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM schema_version")
            .execute(&mut **tx)
            .await?;
        sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
            .bind(version)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Run database migrations.
    async fn migrate(&self) -> Result<(), sqlx::Error> {
        sqlx::query("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)")
            .execute(&self.pool)
            .await?;

        let version = self.get_version().await?;

        if version < 1 {
            self.migrate_v1().await?;
        }

        Ok(())
    }

    /// Execute a list of queries in a transaction, then set the version.
    async fn run_migration(
        &self,
        version: i32,
        queries: &[&'static str],
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        for query in queries {
            sqlx::query(*query).execute(&mut *tx).await?;
        }
        Self::set_version(&mut tx, version).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn migrate_v1(&self) -> Result<(), sqlx::Error> {
        self.run_migration(
            1,
            &[
                "CREATE TABLE kv (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL,
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
            ],
        )
        .await
    }

    /// Read a value by key.
    pub async fn get(&self, key: &str) -> Result<Option<String>, sqlx::Error> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM kv WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.0))
    }

    /// Write a value, overwriting any previous one.
    pub async fn set(&self, key: &str, value: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO kv (key, value, updated_at) VALUES (?, ?, datetime('now'))
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Remove a set of keys in one transaction. Missing keys are not an error.
    pub async fn remove(&self, keys: &[&str]) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        for key in keys {
            sqlx::query("DELETE FROM kv WHERE key = ?")
                .bind(*key)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}
