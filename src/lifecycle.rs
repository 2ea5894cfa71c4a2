//! Credential lifecycle: create, list, revoke, verify, authorize.
//!
//! Status is derived on every check from `(revoked_at, expires_at, now)`.
//! Revoked and expired keys never verify; revocation is checked first.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::errors::KeyError;
use crate::models::{ApiKey, ApiKeyView, IssuedKey, KeyStatus, NewApiKey, DEFAULT_KEY_TYPE};
use crate::secret::SigningSecret;
use crate::store::ApiKeyStore;
use crate::token::{self, TokenOptions};

/// What to do when recording `last_used_at` fails after a successful check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TouchPolicy {
    /// Log and return the key; the credential is still valid.
    #[default]
    BestEffort,
    /// Fail the verification with a storage error.
    Strict,
}

impl TouchPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "best_effort" | "best-effort" => Some(TouchPolicy::BestEffort),
            "strict" => Some(TouchPolicy::Strict),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewKeyRequest {
    pub team_id: String,
    pub name: String,
    pub key_type: Option<String>,
    pub created_by_user_id: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevokeOutcome {
    NotFound,
    Revoked(ApiKey),
    /// Already revoked before this call; nothing was written.
    AlreadyRevoked(ApiKey),
}

impl RevokeOutcome {
    pub fn revoked(&self) -> bool {
        matches!(self, RevokeOutcome::Revoked(_) | RevokeOutcome::AlreadyRevoked(_))
    }

    pub fn not_found(&self) -> bool {
        matches!(self, RevokeOutcome::NotFound)
    }

    pub fn key(&self) -> Option<&ApiKey> {
        match self {
            RevokeOutcome::Revoked(k) | RevokeOutcome::AlreadyRevoked(k) => Some(k),
            RevokeOutcome::NotFound => None,
        }
    }
}

#[derive(Clone)]
pub struct ApiKeyService {
    store: Arc<dyn ApiKeyStore>,
    secret: SigningSecret,
    token_options: TokenOptions,
    clock: Arc<dyn Clock>,
    touch_policy: TouchPolicy,
}

impl ApiKeyService {
    pub fn new(store: Arc<dyn ApiKeyStore>, secret: SigningSecret) -> Self {
        Self {
            store,
            secret,
            token_options: TokenOptions::default(),
            clock: Arc::new(SystemClock),
            touch_policy: TouchPolicy::default(),
        }
    }

    pub fn with_token_options(mut self, opts: TokenOptions) -> Self {
        self.token_options = opts;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_touch_policy(mut self, policy: TouchPolicy) -> Self {
        self.touch_policy = policy;
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub async fn list(&self, team_id: &str) -> Result<Vec<ApiKey>, KeyError> {
        Ok(self.store.list_for_team(team_id).await?)
    }

    /// `list` projected for display, with creator attribution where known.
    pub async fn list_views(&self, team_id: &str) -> Result<Vec<ApiKeyView>, KeyError> {
        let keys = self.list(team_id).await?;

        let mut user_ids: Vec<String> = keys
            .iter()
            .filter_map(|k| k.created_by_user_id.clone())
            .collect();
        user_ids.sort_unstable();
        user_ids.dedup();
        let creators = self.store.creators(&user_ids).await?;

        Ok(keys
            .iter()
            .map(|k| {
                let creator = k
                    .created_by_user_id
                    .as_ref()
                    .and_then(|id| creators.get(id).cloned());
                ApiKeyView::project(k, creator)
            })
            .collect())
    }

    /// Display projection of a single key, with creator attribution.
    pub async fn view(&self, key: &ApiKey) -> Result<ApiKeyView, KeyError> {
        let creator = match &key.created_by_user_id {
            Some(id) => self.store.creators(std::slice::from_ref(id)).await?.remove(id),
            None => None,
        };
        Ok(ApiKeyView::project(key, creator))
    }

    pub async fn create(&self, req: NewKeyRequest) -> Result<IssuedKey, KeyError> {
        self.create_with(req, &self.token_options, &self.secret).await
    }

    /// `create` with per-call codec options and signing secret.
    pub async fn create_with(
        &self,
        req: NewKeyRequest,
        opts: &TokenOptions,
        secret: &SigningSecret,
    ) -> Result<IssuedKey, KeyError> {
        let name = req.name.trim();
        if name.is_empty() {
            return Err(KeyError::InvalidRequest("name is required".into()));
        }
        if req.team_id.trim().is_empty() {
            return Err(KeyError::InvalidRequest("team id is required".into()));
        }

        let generated = token::generate(opts, secret)?;
        let now = self.now();
        let key_type = req
            .key_type
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_KEY_TYPE)
            .to_string();

        let key = self
            .store
            .insert(NewApiKey {
                id: Uuid::new_v4(),
                team_id: req.team_id,
                name: name.to_string(),
                key_type,
                token_hash: generated.token_hash,
                token_prefix: generated.token_prefix,
                created_by_user_id: req.created_by_user_id,
                created_at: now,
                expires_at: req.expires_at,
            })
            .await?;

        info!(
            key_id = %key.id,
            team_id = %key.team_id,
            prefix = %key.token_prefix,
            "api key created"
        );

        Ok(IssuedKey {
            key,
            token: generated.token,
        })
    }

    pub async fn revoke(&self, team_id: &str, id: Uuid) -> Result<RevokeOutcome, KeyError> {
        let Some(existing) = self.store.find_for_team(id, team_id).await? else {
            return Ok(RevokeOutcome::NotFound);
        };
        if existing.is_revoked() {
            return Ok(RevokeOutcome::AlreadyRevoked(existing));
        }

        match self.store.mark_revoked(id, team_id, self.now()).await? {
            Some(key) => {
                info!(key_id = %key.id, team_id = %key.team_id, "api key revoked");
                Ok(RevokeOutcome::Revoked(key))
            }
            // Lost a race with a concurrent revoke; report the winner's write.
            None => match self.store.find_for_team(id, team_id).await? {
                Some(key) => Ok(RevokeOutcome::AlreadyRevoked(key)),
                None => Ok(RevokeOutcome::NotFound),
            },
        }
    }

    /// Check a presented token. `touch` records `last_used_at` on success.
    pub async fn verify(&self, presented: &str, touch: bool) -> Result<ApiKey, KeyError> {
        self.verify_with(presented, &self.secret, touch).await
    }

    /// `verify` under a caller-supplied secret instead of the service's own.
    pub async fn verify_with(
        &self,
        presented: &str,
        secret: &SigningSecret,
        touch: bool,
    ) -> Result<ApiKey, KeyError> {
        let key = self.check(presented, secret).await?;
        self.finish(key, touch).await
    }

    /// `verify`, then require the key to belong to `expected_team_id`.
    ///
    /// A wrong-team key yields `Forbidden` rather than `Invalid`, which
    /// reveals that the token is valid somewhere. Touch happens only once the
    /// team check passes.
    pub async fn authorize_for_team(
        &self,
        presented: &str,
        expected_team_id: &str,
        touch: bool,
    ) -> Result<ApiKey, KeyError> {
        self.authorize_for_team_with(presented, expected_team_id, &self.secret, touch)
            .await
    }

    pub async fn authorize_for_team_with(
        &self,
        presented: &str,
        expected_team_id: &str,
        secret: &SigningSecret,
        touch: bool,
    ) -> Result<ApiKey, KeyError> {
        let key = self.check(presented, secret).await?;
        if !key.belongs_to(expected_team_id) {
            debug!(key_id = %key.id, "api key used against another team");
            return Err(KeyError::Forbidden);
        }
        self.finish(key, touch).await
    }

    async fn check(&self, presented: &str, secret: &SigningSecret) -> Result<ApiKey, KeyError> {
        let presented = presented.trim();
        if presented.is_empty() {
            return Err(KeyError::Missing);
        }

        let token_hash = token::hash(presented, secret)?;
        let Some(key) = self.store.find_by_hash(&token_hash).await? else {
            debug!("api key not found");
            return Err(KeyError::Invalid);
        };

        match key.status_at(self.now()) {
            KeyStatus::Revoked => {
                debug!(key_id = %key.id, "revoked api key presented");
                Err(KeyError::Invalid)
            }
            KeyStatus::Expired => {
                debug!(key_id = %key.id, "expired api key presented");
                Err(KeyError::Expired)
            }
            KeyStatus::Active => Ok(key),
        }
    }

    async fn finish(&self, mut key: ApiKey, touch: bool) -> Result<ApiKey, KeyError> {
        if !touch {
            return Ok(key);
        }

        let now = self.now();
        match self.store.touch_last_used(key.id, now).await {
            Ok(true) => {
                key.last_used_at = Some(now);
                key.updated_at = now;
                Ok(key)
            }
            // Revoked between the check and the touch.
            Ok(false) => {
                debug!(key_id = %key.id, "api key revoked during verification");
                Err(KeyError::Invalid)
            }
            Err(e) => match self.touch_policy {
                TouchPolicy::BestEffort => {
                    warn!(key_id = %key.id, error = %e, "failed to record api key usage");
                    Ok(key)
                }
                TouchPolicy::Strict => Err(KeyError::Storage(e)),
            },
        }
    }
}
