//! In-memory storage backend
//!
//! Suitable for tests and single-process development. Data is lost on restart.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use super::{ApiKeyStore, StoreError};
use crate::models::{ApiKey, CreatorSummary, NewApiKey};

#[derive(Debug, Default)]
pub struct MemoryStore {
    keys: RwLock<HashMap<Uuid, ApiKey>>,
    creators: RwLock<HashMap<String, CreatorSummary>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register attribution details for a user id.
    pub fn add_creator(&self, creator: CreatorSummary) -> Result<(), StoreError> {
        let mut creators = self.creators.write().map_err(poisoned)?;
        creators.insert(creator.id.clone(), creator);
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<Uuid, ApiKey>>, StoreError> {
        self.keys.read().map_err(poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<Uuid, ApiKey>>, StoreError> {
        self.keys.write().map_err(poisoned)
    }
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Internal("memory store lock poisoned".into())
}

#[async_trait]
impl ApiKeyStore for MemoryStore {
    async fn insert(&self, key: NewApiKey) -> Result<ApiKey, StoreError> {
        let mut keys = self.write()?;
        if keys.values().any(|k| k.token_hash == key.token_hash) {
            return Err(StoreError::Conflict("token_hash already exists".into()));
        }
        if keys.contains_key(&key.id) {
            return Err(StoreError::Conflict(format!("api key {} already exists", key.id)));
        }
        let record = key.into_record();
        debug!(key_id = %record.id, team_id = %record.team_id, "inserted api key");
        keys.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_by_hash(&self, token_hash: &str) -> Result<Option<ApiKey>, StoreError> {
        let keys = self.read()?;
        Ok(keys.values().find(|k| k.token_hash == token_hash).cloned())
    }

    async fn find_for_team(&self, id: Uuid, team_id: &str) -> Result<Option<ApiKey>, StoreError> {
        let keys = self.read()?;
        Ok(keys.get(&id).filter(|k| k.belongs_to(team_id)).cloned())
    }

    async fn list_for_team(&self, team_id: &str) -> Result<Vec<ApiKey>, StoreError> {
        let keys = self.read()?;
        let mut out: Vec<ApiKey> = keys
            .values()
            .filter(|k| k.belongs_to(team_id))
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(out)
    }

    async fn mark_revoked(
        &self,
        id: Uuid,
        team_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<ApiKey>, StoreError> {
        let mut keys = self.write()?;
        match keys.get_mut(&id) {
            Some(k) if k.belongs_to(team_id) && k.revoked_at.is_none() => {
                k.revoked_at = Some(at);
                k.updated_at = at;
                Ok(Some(k.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn touch_last_used(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool, StoreError> {
        let mut keys = self.write()?;
        match keys.get_mut(&id) {
            Some(k) if k.revoked_at.is_none() => {
                k.last_used_at = Some(at);
                k.updated_at = at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn creators(
        &self,
        user_ids: &[String],
    ) -> Result<HashMap<String, CreatorSummary>, StoreError> {
        let creators = self.creators.read().map_err(poisoned)?;
        Ok(user_ids
            .iter()
            .filter_map(|id| creators.get(id).map(|c| (id.clone(), c.clone())))
            .collect())
    }
}
