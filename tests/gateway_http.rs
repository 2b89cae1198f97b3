//! End-to-end HTTP tests driving the full router in-process (no socket
//! bound), following the teacher's `tower::ServiceExt::oneshot` pattern
//! from `api::unilateral_blinded`'s test module.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use base64::Engine;
use gateway_core::api::{build_router, AppState};
use gateway_core::config::GatewayConfig;
use gateway_core::crypto::jwt;
use gateway_core::crypto::keys::KeyPair;
use gateway_core::datastore::types::{DevicePublicKey, FileHeader};
use gateway_core::drivers::disk::DiskDriver;
use gateway_core::drivers::DriverRegistry;
use serde_json::{json, Value};
use tempfile::tempdir;
use tower::ServiceExt;

const APP_DOMAIN: &str = "https://app.id";
const B64: base64::engine::general_purpose::GeneralPurpose = base64::engine::general_purpose::STANDARD;

fn test_state(dir: &std::path::Path) -> AppState {
    let registry = Arc::new(DriverRegistry::new());
    registry
        .register(Arc::new(DiskDriver::new("disk", dir.to_path_buf())))
        .unwrap();
    AppState::new(GatewayConfig::default(), registry)
}

fn auth_request_token(device_kp: &KeyPair, device_id: &str) -> String {
    let request = json!({
        "app_domain": APP_DOMAIN,
        "methods": ["store_read", "store_write", "names_write"],
        "app_private_key": hex::encode(device_kp.secret_key.secret_bytes()),
        "app_public_keys": [DevicePublicKey {
            device_id: device_id.to_string(),
            public_key: device_kp.public_key_hex(),
        }],
        "device_id": device_id,
        "blockchain_id": Value::Null,
    });
    jwt::encode(&request, device_kp).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    hyper::body::to_bytes(response.into_body()).await.unwrap().to_vec()
}

async fn issue_session_token(router: &axum::Router, device_kp: &KeyPair, device_id: &str) -> String {
    let token = auth_request_token(device_kp, device_id);
    let uri = format!("/v1/auth?authRequest={}", urlencoding_encode(&token));
    let response = router
        .clone()
        .oneshot(Request::builder().method("GET").uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    body["token"].as_str().unwrap().to_string()
}

// axum's Query extractor expects percent-decoded `+` to stay literal and
// reserved URL characters to be escaped; our JWTs use base64url, which is
// already URL-safe except for `=` padding, so only that needs escaping.
fn urlencoding_encode(s: &str) -> String {
    s.replace('=', "%3D")
}

fn sign_hex(payload: &[u8], kp: &KeyPair) -> String {
    let digest = blake3::hash(payload).into();
    let sig = kp.sign_digest(&digest);
    hex::encode(sig.serialize_compact())
}

#[tokio::test]
async fn ping_is_public_and_unauthenticated() {
    let dir = tempdir().unwrap();
    let state = test_state(dir.path());
    let router = build_router(state);

    let response = router
        .oneshot(Request::builder().uri("/v1/ping").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn auth_with_mismatched_device_key_is_rejected_with_401() {
    let dir = tempdir().unwrap();
    let state = test_state(dir.path());
    let router = build_router(state);

    let declared_kp = KeyPair::generate();
    let wrong_kp = KeyPair::generate();
    let request = json!({
        "app_domain": APP_DOMAIN,
        "methods": ["store_write"],
        "app_private_key": hex::encode(wrong_kp.secret_key.secret_bytes()),
        "app_public_keys": [DevicePublicKey {
            device_id: "device-1".to_string(),
            public_key: declared_kp.public_key_hex(),
        }],
        "device_id": "device-1",
        "blockchain_id": Value::Null,
    });
    let token = jwt::encode(&request, &wrong_kp).unwrap();
    let uri = format!("/v1/auth?authRequest={}", urlencoding_encode(&token));

    let response = router
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn store_route_without_credential_is_forbidden() {
    let dir = tempdir().unwrap();
    let state = test_state(dir.path());
    let router = build_router(state);

    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/stores")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"datastore_info":{},"datastore_sigs":"","root_tombstones":[]}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn session_with_wrong_origin_is_rejected_with_403() {
    let dir = tempdir().unwrap();
    let state = test_state(dir.path());
    let router = build_router(state);

    let device_kp = KeyPair::generate();
    let session_token = issue_session_token(&router, &device_kp, "device-1").await;

    let response = router
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/v1/stores/nonexistent/listing")
                .header("origin", "https://evil.id")
                .header("authorization", format!("bearer {session_token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

/// Exercises spec.md's core round trip: create a datastore, write a file,
/// replace the writer's device root page with that file's header, then
/// read the listing, the header, and the file payload (including a
/// single-byte Range request) back through the merged view.
#[tokio::test]
async fn create_write_and_read_round_trip_with_range() {
    let dir = tempdir().unwrap();
    let state = test_state(dir.path());
    let router = build_router(state);

    let device_kp = KeyPair::generate();
    let device_id = "device-1";
    let session_token = issue_session_token(&router, &device_kp, device_id).await;
    let auth_header = format!("bearer {session_token}");

    // 1. Create the datastore, owned by this device's key.
    let pubkey_hex = device_kp.public_key_hex();
    let datastore_id = gateway_core::datastore::datastore_id_for_pubkey(&pubkey_hex).unwrap();
    let datastore_info = json!({
        "id": datastore_id,
        "pubkey": pubkey_hex,
        "root_uuid": "00000000-0000-0000-0000-000000000001",
        "drivers": ["disk"],
        "device_ids": [device_id],
    });
    let info_bytes = serde_json::to_vec(&datastore_info).unwrap();
    let datastore_sigs = sign_hex(&info_bytes, &device_kp);

    let create_body = json!({
        "datastore_info": datastore_info,
        "datastore_sigs": datastore_sigs,
        "root_tombstones": [],
    });
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/stores")
                .header("origin", APP_DOMAIN)
                .header("authorization", &auth_header)
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&create_body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK, "create_datastore failed: {:?}", body_json(response).await);

    // 2. Write the file payload.
    let payload = b"hi".to_vec();
    let datastore_str = "write hello.txt".to_string();
    let datastore_sig = sign_hex(datastore_str.as_bytes(), &device_kp);
    let write_body = json!({
        "header": {
            "name": "hello.txt",
            "timestamp": 1u64,
            "writer_device_id": device_id,
        },
        "payload_b64": B64.encode(&payload),
        "signature": "unused-here",
        "datastore_str": datastore_str,
        "datastore_sig": datastore_sig,
    });
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/v1/stores/{datastore_id}/files?path=hello.txt"))
                .header("origin", APP_DOMAIN)
                .header("authorization", &auth_header)
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&write_body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let header: FileHeader = serde_json::from_value(body_json(response).await).unwrap();
    assert_eq!(header.data_hash, gateway_core::crypto::hash::data_hash(&payload));

    // 3. Replace the device root page so the merge sees the new header.
    let mut files = HashMap::new();
    files.insert(header.name.clone(), header);
    let mut page = gateway_core::datastore::types::DeviceRootPage {
        device_id: device_id.to_string(),
        timestamp: 1,
        files,
        tombstones: vec![],
        signature: String::new(),
    };
    page.signature = sign_hex(&page.signing_payload(), &device_kp);
    let root_body = json!({ "device_root": page });
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/v1/stores/{datastore_id}/device_roots?sync=1"))
                .header("origin", APP_DOMAIN)
                .header("authorization", &auth_header)
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&root_body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // 4. Read the listing back and confirm the file shows up.
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(format!("/v1/stores/{datastore_id}/listing"))
                .header("origin", APP_DOMAIN)
                .header("authorization", &auth_header)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let listing = body_json(response).await;
    assert!(listing.get("hello.txt").is_some());

    // 5. Range-read the first byte: 206, "h", Content-Range bytes 0-0/2.
    let response = router
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(format!("/v1/stores/{datastore_id}/files?path=hello.txt"))
                .header("origin", APP_DOMAIN)
                .header("authorization", &auth_header)
                .header("range", "bytes=0-0")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    let content_range = response
        .headers()
        .get(axum::http::header::CONTENT_RANGE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert_eq!(content_range, "bytes 0-0/2");
    let bytes = body_bytes(response).await;
    assert_eq!(bytes, b"h");
}
