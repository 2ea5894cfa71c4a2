use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::store::StoreError;

/// Outcome of a failed key operation.
///
/// `Missing`, `Invalid`, `Expired` and `Forbidden` are ordinary verification
/// results that callers are expected to branch on. `Invalid` deliberately
/// covers both "no such key" and "revoked key".
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("no signing secret configured")]
    SecretRequired,

    #[error("api key missing")]
    Missing,

    #[error("api key invalid")]
    Invalid,

    #[error("api key expired")]
    Expired,

    #[error("api key not valid for this team")]
    Forbidden,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

impl KeyError {
    /// Stable client-facing error code.
    pub fn code(&self) -> &'static str {
        match self {
            KeyError::SecretRequired => "secret_required",
            KeyError::Missing => "api_key_missing",
            KeyError::Invalid => "api_key_invalid",
            KeyError::Expired => "api_key_expired",
            KeyError::Forbidden => "api_key_forbidden",
            KeyError::InvalidRequest(_) => "invalid_request",
            KeyError::Storage(_) => "storage_error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            KeyError::Missing | KeyError::Invalid | KeyError::Expired => StatusCode::UNAUTHORIZED,
            KeyError::Forbidden => StatusCode::FORBIDDEN,
            KeyError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            KeyError::SecretRequired | KeyError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for KeyError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let (error_type, msg) = match &self {
            KeyError::Missing | KeyError::Invalid | KeyError::Expired => {
                ("authentication_error", self.to_string())
            }
            KeyError::Forbidden => ("permission_error", self.to_string()),
            KeyError::InvalidRequest(reason) => ("invalid_request_error", reason.clone()),
            KeyError::SecretRequired => {
                tracing::error!("api key secret is not configured");
                ("internal_error", "internal server error".to_string())
            }
            KeyError::Storage(e) => {
                tracing::error!("Storage error: {}", e);
                ("internal_error", "internal server error".to_string())
            }
        };

        let body = Json(json!({
            "error": {
                "message": msg,
                "type": error_type,
                "code": self.code(),
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_match_taxonomy() {
        assert_eq!(KeyError::SecretRequired.code(), "secret_required");
        assert_eq!(KeyError::Missing.code(), "api_key_missing");
        assert_eq!(KeyError::Invalid.code(), "api_key_invalid");
        assert_eq!(KeyError::Expired.code(), "api_key_expired");
        assert_eq!(KeyError::Forbidden.code(), "api_key_forbidden");
        assert_eq!(
            KeyError::Storage(StoreError::Internal("boom".into())).code(),
            "storage_error"
        );
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(KeyError::Invalid.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(KeyError::Expired.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(KeyError::Forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            KeyError::SecretRequired.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_storage_detail_not_in_response() {
        let resp = KeyError::Storage(StoreError::Internal("pg password=hunter2".into()))
            .into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["code"], "storage_error");
        assert!(!String::from_utf8_lossy(&body).contains("hunter2"));
    }
}
