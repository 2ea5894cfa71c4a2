use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{ApiKeyStore, StoreError};
use crate::models::{ApiKey, CreatorSummary, NewApiKey};

const KEY_COLUMNS: &str = "id, team_id, name, key_type, token_hash, token_prefix, \
     created_by_user_id, created_at, updated_at, last_used_at, revoked_at, expires_at";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run pending migrations from the migrations/ directory.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn map_insert_error(e: sqlx::Error) -> StoreError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Conflict(db.constraint().unwrap_or("api_keys").to_string())
        }
        _ => StoreError::Database(e),
    }
}

#[async_trait]
impl ApiKeyStore for PgStore {
    async fn insert(&self, key: NewApiKey) -> Result<ApiKey, StoreError> {
        let sql = format!(
            r#"INSERT INTO api_keys (id, team_id, name, key_type, token_hash, token_prefix, created_by_user_id, created_at, updated_at, expires_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8, $9)
               RETURNING {KEY_COLUMNS}"#
        );
        let rec = sqlx::query_as::<_, ApiKey>(&sql)
            .bind(key.id)
            .bind(&key.team_id)
            .bind(&key.name)
            .bind(&key.key_type)
            .bind(&key.token_hash)
            .bind(&key.token_prefix)
            .bind(&key.created_by_user_id)
            .bind(key.created_at)
            .bind(key.expires_at)
            .fetch_one(&self.pool)
            .await
            .map_err(map_insert_error)?;
        Ok(rec)
    }

    async fn find_by_hash(&self, token_hash: &str) -> Result<Option<ApiKey>, StoreError> {
        let sql = format!("SELECT {KEY_COLUMNS} FROM api_keys WHERE token_hash = $1");
        let key = sqlx::query_as::<_, ApiKey>(&sql)
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await?;
        Ok(key)
    }

    async fn find_for_team(&self, id: Uuid, team_id: &str) -> Result<Option<ApiKey>, StoreError> {
        let sql = format!("SELECT {KEY_COLUMNS} FROM api_keys WHERE id = $1 AND team_id = $2");
        let key = sqlx::query_as::<_, ApiKey>(&sql)
            .bind(id)
            .bind(team_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(key)
    }

    async fn list_for_team(&self, team_id: &str) -> Result<Vec<ApiKey>, StoreError> {
        let sql = format!(
            "SELECT {KEY_COLUMNS} FROM api_keys WHERE team_id = $1 ORDER BY created_at DESC, id DESC"
        );
        let keys = sqlx::query_as::<_, ApiKey>(&sql)
            .bind(team_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(keys)
    }

    async fn mark_revoked(
        &self,
        id: Uuid,
        team_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<ApiKey>, StoreError> {
        // Guarded on revoked_at IS NULL: concurrent revokes write once.
        let sql = format!(
            r#"UPDATE api_keys SET revoked_at = $3, updated_at = $3
               WHERE id = $1 AND team_id = $2 AND revoked_at IS NULL
               RETURNING {KEY_COLUMNS}"#
        );
        let key = sqlx::query_as::<_, ApiKey>(&sql)
            .bind(id)
            .bind(team_id)
            .bind(at)
            .fetch_optional(&self.pool)
            .await?;
        Ok(key)
    }

    async fn touch_last_used(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE api_keys SET last_used_at = $2, updated_at = $2 WHERE id = $1 AND revoked_at IS NULL",
        )
        .bind(id)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn creators(
        &self,
        user_ids: &[String],
    ) -> Result<HashMap<String, CreatorSummary>, StoreError> {
        if user_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = sqlx::query_as::<_, CreatorSummary>(
            "SELECT id, name, email, username FROM users WHERE id = ANY($1)",
        )
        .bind(user_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|c| (c.id.clone(), c)).collect())
    }
}
