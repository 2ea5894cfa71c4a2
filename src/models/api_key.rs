use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use uuid::Uuid;
use zeroize::Zeroizing;

/// Classification tag used when the caller does not supply one.
pub const DEFAULT_KEY_TYPE: &str = "upload";

/// A persisted API key.
///
/// Intentionally not `Serialize`: `token_hash` must never reach a response.
/// Use `ApiKeyView` for anything that leaves the process.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ApiKey {
    pub id: Uuid,
    pub team_id: String,
    pub name: String,
    pub key_type: String,
    pub token_hash: String,
    pub token_prefix: String,
    pub created_by_user_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Derived usability of a key at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStatus {
    Active,
    Revoked,
    Expired,
}

impl KeyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyStatus::Active => "active",
            KeyStatus::Revoked => "revoked",
            KeyStatus::Expired => "expired",
        }
    }
}

impl std::fmt::Display for KeyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

impl KeyStatus {
    /// Revocation takes precedence over expiry. A key is expired once
    /// `expires_at` is strictly in the past; at that exact instant it is
    /// still active.
    pub fn evaluate(
        revoked_at: Option<DateTime<Utc>>,
        expires_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Self {
        if revoked_at.is_some() {
            KeyStatus::Revoked
        } else if expires_at.is_some_and(|exp| exp < now) {
            KeyStatus::Expired
        } else {
            KeyStatus::Active
        }
    }
}

impl ApiKey {
    pub fn status_at(&self, now: DateTime<Utc>) -> KeyStatus {
        KeyStatus::evaluate(self.revoked_at, self.expires_at, now)
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    pub fn belongs_to(&self, team_id: &str) -> bool {
        self.team_id == team_id
    }
}

/// Insert payload for a new key. Carries the digest, never the plaintext.
#[derive(Debug, Clone)]
pub struct NewApiKey {
    pub id: Uuid,
    pub team_id: String,
    pub name: String,
    pub key_type: String,
    pub token_hash: String,
    pub token_prefix: String,
    pub created_by_user_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl NewApiKey {
    /// The record as it exists right after insertion.
    pub fn into_record(self) -> ApiKey {
        ApiKey {
            id: self.id,
            team_id: self.team_id,
            name: self.name,
            key_type: self.key_type,
            token_hash: self.token_hash,
            token_prefix: self.token_prefix,
            created_by_user_id: self.created_by_user_id,
            created_at: self.created_at,
            updated_at: self.created_at,
            last_used_at: None,
            revoked_at: None,
            expires_at: self.expires_at,
        }
    }
}

/// Plaintext bearer token. Exists only between generation and the creation
/// response; zeroized on drop, redacted in `Debug`, not `Clone`.
pub struct PlaintextToken(Zeroizing<String>);

impl PlaintextToken {
    pub(crate) fn new(token: String) -> Self {
        Self(Zeroizing::new(token))
    }

    pub fn expose(&self) -> &str {
        self.0.as_str()
    }
}

impl std::fmt::Debug for PlaintextToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PlaintextToken(****)")
    }
}

impl Serialize for PlaintextToken {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.expose())
    }
}

/// Result of creating a key: the stored record plus the one-time plaintext.
#[derive(Debug)]
pub struct IssuedKey {
    pub key: ApiKey,
    pub token: PlaintextToken,
}
