//! Storage collaborator for API key records.
//!
//! Two backends:
//! - `MemoryStore`: hash maps behind a lock, for tests and local development
//! - `PgStore`: PostgreSQL via sqlx, `UNIQUE` on `token_hash`

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{ApiKey, CreatorSummary, NewApiKey};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write (e.g. duplicate `token_hash`).
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Every lookup by id is scoped by team; records of another team are
/// never returned.
#[async_trait]
pub trait ApiKeyStore: Send + Sync {
    /// Insert a new record. Must reject a duplicate `token_hash` with
    /// `StoreError::Conflict` rather than overwrite.
    async fn insert(&self, key: NewApiKey) -> Result<ApiKey, StoreError>;

    async fn find_by_hash(&self, token_hash: &str) -> Result<Option<ApiKey>, StoreError>;

    async fn find_for_team(&self, id: Uuid, team_id: &str) -> Result<Option<ApiKey>, StoreError>;

    /// Newest first by `created_at`.
    async fn list_for_team(&self, team_id: &str) -> Result<Vec<ApiKey>, StoreError>;

    /// Atomically set `revoked_at` on an unrevoked record. Returns `None`
    /// when nothing matched (missing, other team, or already revoked).
    async fn mark_revoked(
        &self,
        id: Uuid,
        team_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<ApiKey>, StoreError>;

    /// Record usage of an unrevoked key. `false` when no unrevoked key has `id`.
    async fn touch_last_used(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool, StoreError>;

    /// Attribution for the given user ids. Unknown ids are simply absent.
    async fn creators(
        &self,
        user_ids: &[String],
    ) -> Result<HashMap<String, CreatorSummary>, StoreError>;
}
