use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, post},
    Router,
};
use subtle::ConstantTimeEq;
use tower_http::trace::TraceLayer;

use crate::lifecycle::ApiKeyService;

pub mod handlers;

/// Shared state for handlers and middleware.
pub struct AppState {
    pub keys: ApiKeyService,
    pub admin_key: Option<String>,
}

/// Full application router: health check plus the API under `/api/v1`.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .nest("/api/v1", api_router(state.clone()))
        .with_state(state)
}

/// Management routes require the admin key; verification routes take the
/// API key itself as their credential.
pub fn api_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let management = Router::new()
        .route(
            "/teams/:team_id/api-keys",
            get(handlers::list_keys).post(handlers::create_key),
        )
        .route("/teams/:team_id/api-keys/:id", delete(handlers::revoke_key))
        .layer(middleware::from_fn_with_state(state, admin_auth));

    let verification = Router::new()
        .route("/verify", post(handlers::verify_key))
        .route("/teams/:team_id/verify", post(handlers::authorize_key));

    management
        .merge(verification)
        .layer(TraceLayer::new_for_http())
        .fallback(fallback_404)
}

async fn fallback_404() -> StatusCode {
    StatusCode::NOT_FOUND
}

/// Middleware: validates `X-Admin-Key` (or a bearer token) against the
/// configured admin key. 401 if missing/invalid, 500 if none is configured.
async fn admin_auth(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let provided_key = req
        .headers()
        .get("x-admin-key")
        .and_then(|v| v.to_str().ok())
        .or_else(|| {
            req.headers()
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
                .map(|t| t.trim())
        });

    let Some(expected) = state.admin_key.as_deref() else {
        tracing::error!("TEAMKEYS_ADMIN_KEY is not set; management API disabled");
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    };

    match provided_key {
        Some(k) if bool::from(k.as_bytes().ct_eq(expected.as_bytes())) => Ok(next.run(req).await),
        Some(_) => {
            tracing::warn!("management API: invalid admin key");
            Err(StatusCode::UNAUTHORIZED)
        }
        None => {
            tracing::warn!("management API: missing X-Admin-Key header");
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}
