use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::api::AppState;
use crate::errors::KeyError;
use crate::lifecycle::NewKeyRequest;
use crate::models::{ApiKeyView, PlaintextToken};

// ── Request / Response DTOs ──────────────────────────────────

#[derive(Deserialize)]
pub struct CreateKeyRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub key_type: Option<String>,
    pub created_by_user_id: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
pub struct CreateKeyResponse {
    pub key: ApiKeyView,
    /// Shown exactly once.
    pub token: PlaintextToken,
    pub message: String,
}

#[derive(Serialize)]
pub struct RevokeResponse {
    pub revoked: bool,
    pub key: ApiKeyView,
}

/// Token from `X-Api-Key`, else `Authorization: Bearer`. Empty when absent,
/// which the lifecycle reports as `api_key_missing`.
fn presented_token(headers: &HeaderMap) -> &str {
    headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .or_else(|| {
            headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
        })
        .unwrap_or("")
}

// ── Handlers ─────────────────────────────────────────────────

/// GET /api/v1/teams/:team_id/api-keys: newest first
pub async fn list_keys(
    State(state): State<Arc<AppState>>,
    Path(team_id): Path<String>,
) -> Result<Json<Vec<ApiKeyView>>, KeyError> {
    let keys = state.keys.list_views(&team_id).await?;
    Ok(Json(keys))
}

/// POST /api/v1/teams/:team_id/api-keys: issue a new key
pub async fn create_key(
    State(state): State<Arc<AppState>>,
    Path(team_id): Path<String>,
    Json(payload): Json<CreateKeyRequest>,
) -> Result<(StatusCode, Json<CreateKeyResponse>), KeyError> {
    let issued = state
        .keys
        .create(NewKeyRequest {
            team_id,
            name: payload.name,
            key_type: payload.key_type,
            created_by_user_id: payload.created_by_user_id,
            expires_at: payload.expires_at,
        })
        .await?;
    let key = state.keys.view(&issued.key).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateKeyResponse {
            key,
            token: issued.token,
            message: "Store this token now; it cannot be shown again.".to_string(),
        }),
    ))
}

/// DELETE /api/v1/teams/:team_id/api-keys/:id: revoke (idempotent)
pub async fn revoke_key(
    State(state): State<Arc<AppState>>,
    Path((team_id, id)): Path<(String, Uuid)>,
) -> Result<Response, KeyError> {
    let outcome = state.keys.revoke(&team_id, id).await?;

    let Some(key) = outcome.key() else {
        let body = Json(json!({
            "error": {
                "message": "api key not found",
                "type": "invalid_request_error",
                "code": "not_found",
            }
        }));
        return Ok((StatusCode::NOT_FOUND, body).into_response());
    };
    let key = state.keys.view(key).await?;

    Ok(Json(RevokeResponse {
        revoked: outcome.revoked(),
        key,
    })
    .into_response())
}

/// POST /api/v1/verify: check a key regardless of team
pub async fn verify_key(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<ApiKeyView>, KeyError> {
    let key = state.keys.verify(presented_token(&headers), true).await?;
    Ok(Json(state.keys.view(&key).await?))
}

/// POST /api/v1/teams/:team_id/verify: check a key for a specific team
pub async fn authorize_key(
    State(state): State<Arc<AppState>>,
    Path(team_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<ApiKeyView>, KeyError> {
    let key = state
        .keys
        .authorize_for_team(presented_token(&headers), &team_id, true)
        .await?;
    Ok(Json(state.keys.view(&key).await?))
}
