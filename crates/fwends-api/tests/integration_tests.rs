//! # Integration Tests for fwends-api
//!
//! Drives the full router against in-memory backends: pack CRUD, upload and
//! replacement, deletion at every granularity, media reads, sessions, health
//! probes, error bodies, and the OpenAPI document.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, Response, StatusCode};
use fwends_api::bootstrap::assemble;
use fwends_api::config::AppConfig;
use fwends_api::state::AppState;
use fwends_core::{PackDigest, SnowflakeGenerator};
use fwends_store::{MemoryBlobStore, MemoryCatalog};
use http_body_util::BodyExt;
use tower::ServiceExt;

const EMPTY_HASH: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

struct TestApp {
    router: axum::Router,
    state: AppState,
    catalog: Arc<MemoryCatalog>,
    blobs: Arc<MemoryBlobStore>,
}

impl TestApp {
    async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    async fn create_pack(&self, title: &str) -> String {
        let response = self.send(json_request("POST", "/api/packs", serde_json::json!({ "title": title }))).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        body["id"].as_str().unwrap().to_string()
    }

    async fn upload(&self, pack: &str, role: &str, string: &str, content_type: &str, bytes: &'static [u8]) -> Response<Body> {
        self.send(
            Request::builder()
                .method("PUT")
                .uri(format!("/api/packs/{pack}/{role}/{string}"))
                .header(header::CONTENT_TYPE, content_type)
                .body(Body::from(bytes))
                .unwrap(),
        )
        .await
    }

    async fn get_pack(&self, pack: &str) -> serde_json::Value {
        let response = self.send(get(&format!("/api/packs/{pack}"))).await;
        assert_eq!(response.status(), StatusCode::OK);
        body_json(response).await
    }
}

/// Helper: build the app around fresh in-memory backends.
fn test_app_with(config: AppConfig) -> TestApp {
    let catalog = Arc::new(MemoryCatalog::new());
    catalog.add_admin("admin@example.com");
    let blobs = Arc::new(MemoryBlobStore::new());
    let state = assemble(
        config,
        catalog.clone(),
        blobs.clone(),
        SnowflakeGenerator::new(1).unwrap(),
    );
    TestApp {
        router: fwends_api::app(state.clone()),
        state,
        catalog,
        blobs,
    }
}

/// Helper: build the test app with auth disabled.
fn test_app() -> TestApp {
    test_app_with(AppConfig {
        auth_enable: false,
        ..AppConfig::default()
    })
}

/// Helper: build the test app with auth enabled and a static identity
/// provider.
fn test_app_with_auth() -> TestApp {
    test_app_with(AppConfig {
        auth_enable: true,
        static_identities: vec![
            ("admin-token".into(), "admin@example.com".into()),
            ("guest-token".into(), "guest@example.com".into()),
        ],
        ..AppConfig::default()
    })
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Helper: read response body as string.
async fn body_string(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_str(&body_string(response).await).unwrap()
}

async fn error_code(response: Response<Body>) -> String {
    body_json(response).await["error"]["code"]
        .as_str()
        .unwrap()
        .to_string()
}

// -- Health Probes ------------------------------------------------------------

#[tokio::test]
async fn test_liveness_probe() {
    let app = test_app();
    let response = app.send(get("/health/liveness")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "ok");
}

#[tokio::test]
async fn test_readiness_probe() {
    let app = test_app();
    let response = app.send(get("/health/readiness")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "ready");
}

#[tokio::test]
async fn test_dependency_health() {
    let app = test_app();
    let response = app.send(get("/api/health")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(
        body,
        serde_json::json!({ "services": { "catalog": true, "blobs": true, "sessions": true } })
    );
}

// -- Pack CRUD ----------------------------------------------------------------

#[tokio::test]
async fn test_create_and_get_pack() {
    let app = test_app();
    let response = app
        .send(json_request("POST", "/api/packs", serde_json::json!({ "title": "Test Pack" })))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let created = body_json(response).await;
    let id = created["id"].as_str().expect("id is string-encoded");
    assert!(id.parse::<i64>().unwrap() > 0);
    assert_eq!(created["hash"], EMPTY_HASH);

    let pack = app.get_pack(id).await;
    assert_eq!(pack["title"], "Test Pack");
    assert_eq!(pack["hash"], EMPTY_HASH);
    assert_eq!(pack["roles"], serde_json::json!([]));
}

#[tokio::test]
async fn test_create_pack_rejects_empty_title() {
    let app = test_app();
    let response = app
        .send(json_request("POST", "/api/packs", serde_json::json!({ "title": "" })))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(error_code(response).await, "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_create_pack_rejects_malformed_body() {
    let app = test_app();
    let response = app
        .send(
            Request::builder()
                .method("POST")
                .uri("/api/packs")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(response).await, "BAD_REQUEST");
}

#[tokio::test]
async fn test_get_pack_bad_and_missing_ids() {
    let app = test_app();
    let response = app.send(get("/api/packs/not-a-number")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app.send(get("/api/packs/123456")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(error_code(response).await, "NOT_FOUND");
}

#[tokio::test]
async fn test_rename_pack() {
    let app = test_app();
    let id = app.create_pack("Old").await;
    let response = app
        .send(json_request("PUT", &format!("/api/packs/{id}"), serde_json::json!({ "title": "New" })))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.get_pack(&id).await["title"], "New");

    let response = app
        .send(json_request("PUT", "/api/packs/99", serde_json::json!({ "title": "X" })))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_packs_counts() {
    let app = test_app();
    let id = app.create_pack("P").await;
    for (role, string) in [("r1", "a"), ("r1", "b"), ("r2", "a")] {
        let response = app.upload(&id, role, string, "image/png", b"x").await;
        assert_eq!(response.status(), StatusCode::OK);
    }
    let response = app.upload(&id, "r1", "a", "audio/mpeg", b"y").await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.send(get("/api/packs")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let list = body_json(response).await;
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(list[0]["id"], id);
    assert_eq!(list[0]["roleCount"], 2);
    assert_eq!(list[0]["stringCount"], 3);
}

// -- Upload & Media -----------------------------------------------------------

#[tokio::test]
async fn test_upload_replace_scenario() {
    let app = test_app();
    let id = app.create_pack("Test Pack").await;

    let response = app.upload(&id, "greeting", "hello", "image/png", b"first").await;
    assert_eq!(response.status(), StatusCode::OK);
    let r1: String = serde_json::from_value(body_json(response).await).unwrap();

    let pack = app.get_pack(&id).await;
    assert_ne!(pack["hash"], EMPTY_HASH);
    assert_eq!(pack["roles"][0]["id"], "greeting");
    assert_eq!(pack["roles"][0]["strings"][0]["id"], "hello");
    assert_eq!(pack["roles"][0]["strings"][0]["image"], r1.as_str());
    assert!(pack["roles"][0]["strings"][0].get("audio").is_none());

    let response = app.upload(&id, "greeting", "hello", "image/webp", b"second").await;
    assert_eq!(response.status(), StatusCode::OK);
    let r2: String = serde_json::from_value(body_json(response).await).unwrap();
    assert_ne!(r1, r2);

    let pack = app.get_pack(&id).await;
    assert_eq!(pack["roles"][0]["strings"].as_array().unwrap().len(), 1);
    assert_eq!(pack["roles"][0]["strings"][0]["image"], r2.as_str());

    let response = app.send(get(&format!("/media/packs/{id}/greeting/hello/image"))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/webp");
    assert_eq!(body_string(response).await, "second");

    app.state.engine.pruner().wait_idle().await;
    let remaining: Vec<String> = app.blobs.ids().iter().map(|id| id.to_string()).collect();
    assert_eq!(remaining, vec![r2]);
}

#[tokio::test]
async fn test_upload_rejections() {
    let app = test_app();
    let id = app.create_pack("P").await;

    let response = app.upload(&id, "greeting", "hello", "text/plain", b"x").await;
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(error_code(response).await, "UNSUPPORTED_MEDIA_TYPE");

    let response = app.upload(&id, "Greeting", "hello", "image/png", b"x").await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let response = app.upload("424242", "greeting", "hello", "image/png", b"x").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    app.state.engine.pruner().wait_idle().await;
    assert!(app.blobs.is_empty());
    assert!(app.catalog.recorded_resources().is_empty());
}

#[tokio::test]
async fn test_media_misses() {
    let app = test_app();
    let id = app.create_pack("P").await;
    let response = app.send(get(&format!("/media/packs/{id}/greeting/hello/image"))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.send(get(&format!("/media/packs/{id}/greeting/hello/video"))).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

// -- Deletion -----------------------------------------------------------------

#[tokio::test]
async fn test_delete_last_pair_resets_hash() {
    let app = test_app();
    let id = app.create_pack("P").await;
    app.upload(&id, "greeting", "hello", "image/png", b"i").await;
    app.upload(&id, "greeting", "hello", "audio/wav", b"a").await;

    let response = app.send(delete(&format!("/api/packs/{id}/greeting/hello"))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let pack = app.get_pack(&id).await;
    assert_eq!(pack["hash"], PackDigest::EMPTY.to_hex());
    assert_eq!(pack["roles"], serde_json::json!([]));

    let response = app.send(delete(&format!("/api/packs/{id}/greeting/hello"))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    app.state.engine.pruner().wait_idle().await;
    assert!(app.blobs.is_empty());
}

#[tokio::test]
async fn test_delete_role() {
    let app = test_app();
    let id = app.create_pack("P").await;
    app.upload(&id, "keep", "a", "image/png", b"k").await;
    app.upload(&id, "drop", "a", "image/png", b"d").await;
    app.upload(&id, "drop", "b", "audio/flac", b"d").await;

    let response = app.send(delete(&format!("/api/packs/{id}/drop"))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let pack = app.get_pack(&id).await;
    assert_eq!(pack["roles"].as_array().unwrap().len(), 1);
    assert_eq!(pack["roles"][0]["id"], "keep");

    let response = app.send(delete(&format!("/api/packs/{id}/drop"))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    app.state.engine.pruner().wait_idle().await;
    assert_eq!(app.blobs.len(), 1);
}

#[tokio::test]
async fn test_delete_pack() {
    let app = test_app();
    let id = app.create_pack("P").await;
    app.upload(&id, "r", "s", "image/jpeg", b"x").await;

    let response = app.send(delete(&format!("/api/packs/{id}"))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let response = app.send(get(&format!("/api/packs/{id}"))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let response = app.send(delete(&format!("/api/packs/{id}"))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    app.state.engine.pruner().wait_idle().await;
    assert!(app.blobs.is_empty());
    assert!(app.catalog.recorded_resources().is_empty());
}

// -- Internal Errors ----------------------------------------------------------

#[tokio::test]
async fn test_internal_error_is_generic_by_default() {
    let app = test_app();
    let id = app.create_pack("P").await;
    app.blobs.fail_next_puts(1);

    let response = app.upload(&id, "r", "s", "image/png", b"x").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "INTERNAL_ERROR");
    assert!(body["error"].get("details").is_none());
}

#[tokio::test]
async fn test_internal_error_detail_in_debug_mode() {
    let app = test_app_with(AppConfig {
        auth_enable: false,
        http_debug: true,
        ..AppConfig::default()
    });
    let id = app.create_pack("P").await;
    app.blobs.fail_next_puts(1);

    let response = app.upload(&id, "r", "s", "image/png", b"x").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "INTERNAL_ERROR");
    assert!(body["error"]["details"]
        .as_str()
        .unwrap()
        .contains("blob upload failed"));
}

// -- Authentication -----------------------------------------------------------

#[tokio::test]
async fn test_auth_disabled_endpoints_are_misdirected() {
    let app = test_app();
    let response = app.send(get("/api/auth/config")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["enable"], false);

    let response = app.send(get("/api/auth")).await;
    assert_eq!(response.status(), StatusCode::MISDIRECTED_REQUEST);

    let response = app
        .send(json_request("POST", "/api/auth", serde_json::json!({ "token": "t", "service": "static" })))
        .await;
    assert_eq!(response.status(), StatusCode::MISDIRECTED_REQUEST);
    assert_eq!(error_code(response).await, "MISDIRECTED_REQUEST");
}

#[tokio::test]
async fn test_writes_require_session() {
    let app = test_app_with_auth();

    let response = app.send(get("/api/packs")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .send(json_request("POST", "/api/packs", serde_json::json!({ "title": "P" })))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(response).await, "UNAUTHORIZED");

    let response = app
        .send(
            Request::builder()
                .method("POST")
                .uri("/api/packs")
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::COOKIE, "fwends_session=not-a-session")
                .body(Body::from(r#"{"title":"P"}"#))
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_session_lifecycle() {
    let app = test_app_with_auth();

    let response = app.send(get("/api/auth/config")).await;
    let config = body_json(response).await;
    assert_eq!(config["enable"], true);
    assert_eq!(config["services"], serde_json::json!(["static"]));

    let response = app
        .send(json_request(
            "POST",
            "/api/auth",
            serde_json::json!({ "token": "admin-token", "service": "static" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap().to_string();
    assert!(set_cookie.starts_with("fwends_session="));
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("Secure"));
    assert!(set_cookie.contains("Max-Age=86400"));
    let cookie = set_cookie.split(';').next().unwrap().to_string();

    let response = app
        .send(
            Request::builder()
                .uri("/api/auth")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "true");

    let response = app.send(get("/api/auth")).await;
    assert_eq!(body_string(response).await, "false");

    let response = app
        .send(
            Request::builder()
                .method("POST")
                .uri("/api/packs")
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::COOKIE, &cookie)
                .body(Body::from(r#"{"title":"Authed"}"#))
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_authentication_failures() {
    let app = test_app_with_auth();
    for (token, service) in [
        ("guest-token", "static"),
        ("wrong-token", "static"),
        ("admin-token", "google"),
    ] {
        let response = app
            .send(json_request(
                "POST",
                "/api/auth",
                serde_json::json!({ "token": token, "service": service }),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{token}/{service}");
        assert!(response.headers().get(header::SET_COOKIE).is_none());
    }

    let response = app
        .send(json_request("POST", "/api/auth", serde_json::json!({ "token": "t" })))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// -- OpenAPI ------------------------------------------------------------------

#[tokio::test]
async fn test_openapi_document() {
    let app = test_app();
    let response = app.send(get("/openapi.json")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let doc = body_json(response).await;
    assert_eq!(doc["info"]["title"], "fwends API");
    let paths = doc["paths"].as_object().unwrap();
    assert!(paths.contains_key("/api/packs"));
    assert!(paths.contains_key("/api/packs/{pack}/{role}/{string}"));
    assert!(paths.contains_key("/media/packs/{pack}/{role}/{string}/{class}"));
}
