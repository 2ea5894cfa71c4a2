//! HTTP surface tests: admin auth, key management and verification routes.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use teamkeys::api::{self, AppState};
use teamkeys::store::MemoryStore;
use teamkeys::{ApiKeyService, SigningSecret};

const ADMIN: &str = "admin-secret";

fn app_with(admin_key: Option<&str>) -> Router {
    let keys = ApiKeyService::new(Arc::new(MemoryStore::new()), SigningSecret::from("test-secret"));
    api::app(Arc::new(AppState {
        keys,
        admin_key: admin_key.map(String::from),
    }))
}

fn app() -> Router {
    app_with(Some(ADMIN))
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
    };
    (status, body)
}

fn admin(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-admin-key", ADMIN);
    match body {
        Some(b) => builder
            .header("content-type", "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

fn verify_req(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("x-api-key", token)
        .body(Body::empty())
        .unwrap()
}

async fn create(app: &Router, team: &str, name: &str) -> Value {
    let (status, body) = send(
        app,
        admin(
            "POST",
            &format!("/api/v1/teams/{}/api-keys", team),
            Some(json!({ "name": name })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body
}

#[tokio::test]
async fn test_healthz() {
    let req = Request::builder().uri("/healthz").body(Body::empty()).unwrap();
    let (status, _) = send(&app(), req).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_management_requires_admin_key() {
    let app = app();
    let req = Request::builder()
        .uri("/api/v1/teams/t1/api-keys")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let req = Request::builder()
        .uri("/api/v1/teams/t1/api-keys")
        .header("x-admin-key", "wrong")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let req = Request::builder()
        .uri("/api/v1/teams/t1/api-keys")
        .header("authorization", format!("Bearer {}", ADMIN))
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn test_management_disabled_without_admin_key() {
    let (status, _) = send(
        &app_with(None),
        admin("GET", "/api/v1/teams/t1/api-keys", None),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_create_returns_token_once() {
    let app = app();
    let body = create(&app, "t1", "ci").await;

    let token = body["token"].as_str().unwrap();
    assert!(token.starts_with("ak_"));
    assert_eq!(body["key"]["type"], "upload");
    assert!(body["key"].get("status").is_none());
    assert!(body["key"]["revoked_at"].is_null());
    assert!(token.starts_with(body["key"]["token_prefix"].as_str().unwrap()));
    assert!(body["key"].get("token_hash").is_none());

    let (_, listed) = send(&app, admin("GET", "/api/v1/teams/t1/api-keys", None)).await;
    let listed = listed.as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert!(listed[0].get("token").is_none());
    assert!(listed[0].get("token_hash").is_none());
    assert!(!listed[0].to_string().contains(token));
}

#[tokio::test]
async fn test_create_rejects_blank_name() {
    let (status, body) = send(
        &app(),
        admin("POST", "/api/v1/teams/t1/api-keys", Some(json!({ "name": "  " }))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "invalid_request");
}

#[tokio::test]
async fn test_verify_flow() {
    let app = app();
    let created = create(&app, "t1", "ci").await;
    let token = created["token"].as_str().unwrap();

    let (status, body) = send(&app, verify_req("/api/v1/verify", token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], created["key"]["id"]);
    assert!(body["last_used_at"].is_string());

    let (status, _) = send(&app, verify_req("/api/v1/teams/t1/verify", token)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, verify_req("/api/v1/teams/t2/verify", token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "api_key_forbidden");
}

#[tokio::test]
async fn test_verify_missing_and_invalid() {
    let app = app();
    let req = Request::builder()
        .method("POST")
        .uri("/api/v1/verify")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "api_key_missing");

    let (status, body) = send(&app, verify_req("/api/v1/verify", "ak_notarealkey")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "api_key_invalid");
}

#[tokio::test]
async fn test_revoke_flow() {
    let app = app();
    let created = create(&app, "t1", "ci").await;
    let token = created["token"].as_str().unwrap();
    let id = created["key"]["id"].as_str().unwrap();

    // Another team cannot see or revoke it.
    let (status, body) = send(
        &app,
        admin("DELETE", &format!("/api/v1/teams/t2/api-keys/{}", id), None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");

    let uri = format!("/api/v1/teams/t1/api-keys/{}", id);
    let (status, first) = send(&app, admin("DELETE", &uri, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["revoked"], true);
    assert!(first["key"]["revoked_at"].is_string());

    let (status, second) = send(&app, admin("DELETE", &uri, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["key"]["revoked_at"], first["key"]["revoked_at"]);

    let (status, body) = send(&app, verify_req("/api/v1/verify", token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "api_key_invalid");
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let (status, _) = send(&app(), admin("GET", "/api/v1/nope", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
