//! External projection of an API key record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::api_key::ApiKey;

/// Redacted attribution of the identity that issued a key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CreatorSummary {
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub username: Option<String>,
}

/// What callers outside the process may see of a key. No digest, no plaintext.
#[derive(Debug, Clone, Serialize)]
pub struct ApiKeyView {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub key_type: String,
    pub token_prefix: String,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<CreatorSummary>,
}

impl ApiKeyView {
    pub fn project(key: &ApiKey, creator: Option<CreatorSummary>) -> Self {
        Self {
            id: key.id,
            name: key.name.clone(),
            key_type: key.key_type.clone(),
            token_prefix: key.token_prefix.clone(),
            created_at: key.created_at,
            last_used_at: key.last_used_at,
            revoked_at: key.revoked_at,
            expires_at: key.expires_at,
            created_by: creator,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ApiKey {
        let now = Utc::now();
        ApiKey {
            id: Uuid::new_v4(),
            team_id: "t1".into(),
            name: "uploader".into(),
            key_type: "upload".into(),
            token_hash: "deadbeef".repeat(8),
            token_prefix: "ak_0123456789".chars().take(12).collect(),
            created_by_user_id: Some("u1".into()),
            created_at: now,
            updated_at: now,
            last_used_at: None,
            revoked_at: None,
            expires_at: None,
        }
    }

    #[test]
    fn test_view_exposes_only_display_fields() {
        let view = ApiKeyView::project(&sample(), None);
        let json = serde_json::to_value(&view).unwrap();
        let obj = json.as_object().unwrap();

        let mut keys: Vec<&str> = obj.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            vec![
                "created_at",
                "expires_at",
                "id",
                "last_used_at",
                "name",
                "revoked_at",
                "token_prefix",
                "type",
            ]
        );
        assert!(!json.to_string().contains("deadbeef"));
    }

    #[test]
    fn test_view_of_revoked_key_carries_no_derived_status() {
        let mut key = sample();
        key.revoked_at = Some(Utc::now());
        let json = serde_json::to_value(ApiKeyView::project(&key, None)).unwrap();
        assert!(json.get("status").is_none());
        assert!(json["revoked_at"].is_string());
    }

    #[test]
    fn test_view_includes_creator_when_known() {
        let creator = CreatorSummary {
            id: "u1".into(),
            name: Some("Ada".into()),
            email: Some("ada@example.com".into()),
            username: None,
        };
        let view = ApiKeyView::project(&sample(), Some(creator));
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["created_by"]["id"], "u1");
        assert_eq!(json["created_by"]["email"], "ada@example.com");
        assert!(json["created_by"]["username"].is_null());
    }
}
