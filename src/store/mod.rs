//! Persistent storage for profiles and match results.
//!
//! Uses SQLx with SQLite for lightweight, embedded storage. Profiles and
//! match sets are stored as JSON payloads next to the hash columns used
//! for validity checks, so reads can decide staleness without
//! deserializing.
//!
//! [`MatchStore`] is the seam: production injects [`SqliteStore`], tests
//! mostly use [`MemoryStore`].
//!
//! # Example
//!
//! ```ignore
//! use playlist_pilot::store::{SqliteStore, MatchStore};
//!
//! let store = SqliteStore::connect("sqlite:playlist_pilot.db").await?;
//! let profile = store.get_profile("pl-1").await?;
//! ```

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use sqlx::migrate::MigrateDatabase;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use crate::model::{MatchSet, PlaylistProfile};

/// Default database filename.
pub const DEFAULT_DB_NAME: &str = "playlist_pilot.db";

/// Build a SQLite database URL from an optional path.
///
/// If no path is provided, uses [`DEFAULT_DB_NAME`] in the current directory.
pub fn db_url(path: Option<&std::path::Path>) -> String {
    match path {
        Some(p) => format!("sqlite:{}", p.display()),
        None => format!("sqlite:{}", DEFAULT_DB_NAME),
    }
}

/// Persistence errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Stored payload failed to (de)serialize
    #[error("payload error for {key}: {source}")]
    Payload {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    fn payload(key: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Payload {
            key: key.into(),
            source,
        }
    }
}

/// Storage seam for the matching pipeline.
///
/// Profiles are keyed by playlist ID; match sets are keyed by account ID
/// plus rendered match-context key, so different accounts never see each
/// other's results even when their inputs hash identically.
#[async_trait]
pub trait MatchStore: Send + Sync {
    /// Fetch the stored profile for a playlist, if any.
    async fn get_profile(&self, playlist_id: &str)
    -> Result<Option<PlaylistProfile>, StoreError>;

    /// Insert or replace a playlist's profile.
    async fn upsert_profile(&self, profile: &PlaylistProfile) -> Result<(), StoreError>;

    /// Remove a playlist's profile.
    async fn delete_profile(&self, playlist_id: &str) -> Result<(), StoreError>;

    /// Fetch a persisted match set for an account and context key.
    async fn get_match_set(
        &self,
        account_id: &str,
        context_key: &str,
    ) -> Result<Option<MatchSet>, StoreError>;

    /// Insert or replace a persisted match set.
    async fn upsert_match_set(
        &self,
        account_id: &str,
        context_key: &str,
        matches: &MatchSet,
    ) -> Result<(), StoreError>;
}

// ============================================================================
// SQLite implementation
// ============================================================================

/// SQLite-backed [`MatchStore`].
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect to (creating if necessary) the database at `db_url` and
    /// ensure the schema exists.
    pub async fn connect(db_url: &str) -> Result<Self, StoreError> {
        if !sqlx::Sqlite::database_exists(db_url).await.unwrap_or(false) {
            sqlx::Sqlite::create_database(db_url).await?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS playlist_profiles (
                playlist_id         TEXT PRIMARY KEY,
                kind                TEXT NOT NULL,
                content_hash        TEXT NOT NULL,
                model_bundle_hash   TEXT NOT NULL,
                payload             TEXT NOT NULL,
                updated_at          INTEGER NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS match_results (
                account_id          TEXT NOT NULL,
                context_key         TEXT NOT NULL,
                payload             TEXT NOT NULL,
                computed_at         INTEGER NOT NULL,
                PRIMARY KEY (account_id, context_key)
            )
            "#,
        )
        .execute(&pool)
        .await?;

        tracing::debug!(db_url, "store ready");
        Ok(Self { pool })
    }
}

#[async_trait]
impl MatchStore for SqliteStore {
    async fn get_profile(
        &self,
        playlist_id: &str,
    ) -> Result<Option<PlaylistProfile>, StoreError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT payload FROM playlist_profiles WHERE playlist_id = ?")
                .bind(playlist_id)
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some((payload,)) => serde_json::from_str(&payload)
                .map(Some)
                .map_err(|e| StoreError::payload(playlist_id, e)),
            None => Ok(None),
        }
    }

    async fn upsert_profile(&self, profile: &PlaylistProfile) -> Result<(), StoreError> {
        let payload = serde_json::to_string(profile)
            .map_err(|e| StoreError::payload(&profile.playlist_id, e))?;

        sqlx::query(
            r#"
            INSERT INTO playlist_profiles
                (playlist_id, kind, content_hash, model_bundle_hash, payload, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(playlist_id) DO UPDATE SET
                kind = excluded.kind,
                content_hash = excluded.content_hash,
                model_bundle_hash = excluded.model_bundle_hash,
                payload = excluded.payload,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&profile.playlist_id)
        .bind(&profile.kind)
        .bind(&profile.content_hash)
        .bind(&profile.model_bundle_hash)
        .bind(&payload)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_profile(&self, playlist_id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM playlist_profiles WHERE playlist_id = ?")
            .bind(playlist_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_match_set(
        &self,
        account_id: &str,
        context_key: &str,
    ) -> Result<Option<MatchSet>, StoreError> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT payload FROM match_results WHERE account_id = ? AND context_key = ?",
        )
        .bind(account_id)
        .bind(context_key)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some((payload,)) => serde_json::from_str(&payload)
                .map(Some)
                .map_err(|e| StoreError::payload(context_key, e)),
            None => Ok(None),
        }
    }

    async fn upsert_match_set(
        &self,
        account_id: &str,
        context_key: &str,
        matches: &MatchSet,
    ) -> Result<(), StoreError> {
        let payload = serde_json::to_string(matches)
            .map_err(|e| StoreError::payload(context_key, e))?;

        sqlx::query(
            r#"
            INSERT INTO match_results (account_id, context_key, payload, computed_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(account_id, context_key) DO UPDATE SET
                payload = excluded.payload,
                computed_at = excluded.computed_at
            "#,
        )
        .bind(account_id)
        .bind(context_key)
        .bind(&payload)
        .bind(matches.computed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

// ============================================================================
// In-memory implementation
// ============================================================================

/// In-memory [`MatchStore`], primarily for tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryStore {
    profiles: RwLock<HashMap<String, PlaylistProfile>>,
    matches: RwLock<HashMap<(String, String), MatchSet>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MatchStore for MemoryStore {
    async fn get_profile(
        &self,
        playlist_id: &str,
    ) -> Result<Option<PlaylistProfile>, StoreError> {
        Ok(self.profiles.read().get(playlist_id).cloned())
    }

    async fn upsert_profile(&self, profile: &PlaylistProfile) -> Result<(), StoreError> {
        self.profiles
            .write()
            .insert(profile.playlist_id.clone(), profile.clone());
        Ok(())
    }

    async fn delete_profile(&self, playlist_id: &str) -> Result<(), StoreError> {
        self.profiles.write().remove(playlist_id);
        Ok(())
    }

    async fn get_match_set(
        &self,
        account_id: &str,
        context_key: &str,
    ) -> Result<Option<MatchSet>, StoreError> {
        Ok(self
            .matches
            .read()
            .get(&(account_id.to_string(), context_key.to_string()))
            .cloned())
    }

    async fn upsert_match_set(
        &self,
        account_id: &str,
        context_key: &str,
        matches: &MatchSet,
    ) -> Result<(), StoreError> {
        self.matches.write().insert(
            (account_id.to_string(), context_key.to_string()),
            matches.clone(),
        );
        Ok(())
    }
}
