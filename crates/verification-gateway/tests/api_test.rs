//! Integration tests for the Verification Gateway API

use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt; // for `oneshot`
use verification_gateway::{
    auth::PersonalSignAuthenticator, create_router, AppState, InMemoryLedger, RevokePolicy,
    VerificationBridge, VerificationStore,
};

const MESSAGE: &str = "Sign in to GhostPass";

/// Helper to create a test app over an in-memory ledger
fn create_test_app(ledger: Arc<InMemoryLedger>, policy: RevokePolicy) -> Router {
    let bridge = Arc::new(VerificationBridge::new(
        Arc::new(PersonalSignAuthenticator),
        ledger,
        Arc::new(VerificationStore::new()),
        "dark_",
        policy,
    ));

    create_router(AppState::new(bridge))
}

fn sign(signer: &PrivateKeySigner, message: &str) -> String {
    let signature = signer.sign_message_sync(message.as_bytes()).unwrap();
    format!("0x{}", hex::encode(signature.as_bytes()))
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .method("POST")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

fn verify_body(signer: &PrivateKeySigner) -> Value {
    json!({
        "walletAddress": signer.address().to_string(),
        "signature": sign(signer, MESSAGE),
        "message": MESSAGE,
    })
}

#[tokio::test]
async fn test_health_check() {
    let app = create_test_app(Arc::new(InMemoryLedger::new()), RevokePolicy::Signature);

    let (status, json) = send(&app, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert!(json["timestamp"].as_str().is_some());
}

#[tokio::test]
async fn test_verify_then_status() {
    let app = create_test_app(Arc::new(InMemoryLedger::new()), RevokePolicy::Signature);
    let signer = PrivateKeySigner::random();

    let (status, json) = send(&app, post("/verify", verify_body(&signer))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "User verified successfully");
    assert!(json["transactionHash"].as_str().unwrap().starts_with("0x"));
    let pseudonym = json["pseudonymId"].as_str().unwrap().to_string();
    assert!(pseudonym.starts_with("dark_"));

    let uri = format!("/verify/{}", signer.address());
    let (status, json) = send(&app, get(&uri)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["isVerified"], true);
    assert_eq!(json["pseudonymId"], pseudonym.as_str());
    assert!(json["verifiedAt"].as_str().is_some());
}

#[tokio::test]
async fn test_status_of_unknown_address() {
    let app = create_test_app(Arc::new(InMemoryLedger::new()), RevokePolicy::Signature);
    let signer = PrivateKeySigner::random();

    let (status, json) = send(&app, get(&format!("/verify/{}", signer.address()))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["isVerified"], false);
    assert!(json.get("pseudonymId").is_none());
}

#[tokio::test]
async fn test_verify_missing_fields() {
    let ledger = Arc::new(InMemoryLedger::new());
    let app = create_test_app(ledger.clone(), RevokePolicy::Signature);

    let (status, json) = send(
        &app,
        post("/verify", json!({ "walletAddress": "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed", "signature": "" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Missing required fields");
    assert_eq!(json["kind"], "missing_field");
    assert_eq!(ledger.submissions(), 0);
}

#[tokio::test]
async fn test_verify_invalid_address() {
    let ledger = Arc::new(InMemoryLedger::new());
    let app = create_test_app(ledger.clone(), RevokePolicy::Signature);
    let signer = PrivateKeySigner::random();

    let body = json!({
        "walletAddress": "0x1234",
        "signature": sign(&signer, MESSAGE),
        "message": MESSAGE,
    });
    let (status, json) = send(&app, post("/verify", body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Invalid Ethereum address");
    assert_eq!(ledger.submissions(), 0);
}

#[tokio::test]
async fn test_verify_wrong_signer() {
    let ledger = Arc::new(InMemoryLedger::new());
    let app = create_test_app(ledger.clone(), RevokePolicy::Signature);
    let claimed = PrivateKeySigner::random();
    let other = PrivateKeySigner::random();

    let body = json!({
        "walletAddress": claimed.address().to_string(),
        "signature": sign(&other, MESSAGE),
        "message": MESSAGE,
    });
    let (status, json) = send(&app, post("/verify", body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["kind"], "invalid_signature");
    assert_eq!(ledger.submissions(), 0);
}

#[tokio::test]
async fn test_status_invalid_address() {
    let app = create_test_app(Arc::new(InMemoryLedger::new()), RevokePolicy::Signature);

    let (status, json) = send(&app, get("/verify/not-an-address")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Invalid Ethereum address");
}

#[tokio::test]
async fn test_status_timeout_is_classified() {
    let ledger = Arc::new(InMemoryLedger::with_timeouts(
        Duration::from_millis(50),
        Duration::from_secs(5),
    ));
    ledger.set_read_delay(Duration::from_millis(500)).await;
    let app = create_test_app(ledger, RevokePolicy::Signature);
    let signer = PrivateKeySigner::random();

    let (status, json) = send(&app, get(&format!("/verify/{}", signer.address()))).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"], "Failed to fetch verification status");
    assert_eq!(json["kind"], "ledger_timeout");
    assert!(json["details"].as_str().unwrap().contains("timed out"));
}

#[tokio::test]
async fn test_status_decode_failure_is_classified() {
    let ledger = Arc::new(InMemoryLedger::new());
    ledger
        .set_read_failure(Some("could not decode isVerified output".to_string()))
        .await;
    let app = create_test_app(ledger, RevokePolicy::Signature);
    let signer = PrivateKeySigner::random();

    let (status, json) = send(&app, get(&format!("/verify/{}", signer.address()))).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["kind"], "ledger_call_failed");
    assert!(json["details"].as_str().unwrap().contains("decode"));
}

#[tokio::test]
async fn test_concurrent_verify_conflicts() {
    let ledger = Arc::new(InMemoryLedger::new());
    ledger.set_confirmation_delay(Duration::from_millis(200)).await;
    let app = create_test_app(ledger.clone(), RevokePolicy::Signature);
    let signer = PrivateKeySigner::random();

    let first = {
        let app = app.clone();
        let body = verify_body(&signer);
        tokio::spawn(async move { send(&app, post("/verify", body)).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let uri = format!("/verify/{}/pending", signer.address());
    let (status, json) = send(&app, get(&uri)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["pending"]["kind"], "verify");

    let (status, json) = send(&app, post("/verify", verify_body(&signer))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["kind"], "already_pending");

    let (status, _) = first.await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ledger.submissions(), 1);

    let (_, json) = send(&app, get(&uri)).await;
    assert!(json["pending"].is_null());
}

#[tokio::test]
async fn test_failed_transaction_is_reported() {
    let ledger = Arc::new(InMemoryLedger::new());
    ledger.fail_next_confirmation();
    let app = create_test_app(ledger, RevokePolicy::Signature);
    let signer = PrivateKeySigner::random();

    let (status, json) = send(&app, post("/verify", verify_body(&signer))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"], "Failed to verify user");
    assert_eq!(json["kind"], "ledger_call_failed");

    let (_, json) = send(&app, get(&format!("/verify/{}", signer.address()))).await;
    assert_eq!(json["isVerified"], false);
}

#[tokio::test]
async fn test_revoke_with_signature() {
    let app = create_test_app(Arc::new(InMemoryLedger::new()), RevokePolicy::Signature);
    let signer = PrivateKeySigner::random();
    send(&app, post("/verify", verify_body(&signer))).await;

    let body = json!({
        "userAddress": signer.address().to_string(),
        "signature": sign(&signer, MESSAGE),
        "message": MESSAGE,
    });
    let (status, json) = send(&app, post("/revoke", body)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["transactionHash"].as_str().is_some());

    let (_, json) = send(&app, get(&format!("/verify/{}", signer.address()))).await;
    assert_eq!(json["isVerified"], false);
    assert!(json.get("pseudonymId").is_none());
    assert!(json.get("verifiedAt").is_none());
}

#[tokio::test]
async fn test_revoke_requires_signature() {
    let ledger = Arc::new(InMemoryLedger::new());
    let app = create_test_app(ledger.clone(), RevokePolicy::Signature);
    let signer = PrivateKeySigner::random();

    let body = json!({ "userAddress": signer.address().to_string() });
    let (status, json) = send(&app, post("/revoke", body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["kind"], "invalid_signature");
    assert_eq!(ledger.submissions(), 0);
}

#[tokio::test]
async fn test_open_revoke() {
    let app = create_test_app(Arc::new(InMemoryLedger::new()), RevokePolicy::Open);
    let signer = PrivateKeySigner::random();
    send(&app, post("/verify", verify_body(&signer))).await;

    let body = json!({ "userAddress": signer.address().to_string() });
    let (status, _) = send(&app, post("/revoke", body)).await;
    assert_eq!(status, StatusCode::OK);

    let (_, json) = send(&app, get(&format!("/verify/{}", signer.address()))).await;
    assert_eq!(json["isVerified"], false);
}

#[tokio::test]
async fn test_revoke_missing_address() {
    let app = create_test_app(Arc::new(InMemoryLedger::new()), RevokePolicy::Open);

    let (status, json) = send(&app, post("/revoke", json!({}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Missing required fields");
}

#[tokio::test]
async fn test_verify_non_string_address() {
    let ledger = Arc::new(InMemoryLedger::new());
    let app = create_test_app(ledger.clone(), RevokePolicy::Signature);

    let body = json!({ "walletAddress": 42, "signature": "0x00", "message": MESSAGE });
    let (status, json) = send(&app, post("/verify", body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Invalid request body");
    assert_eq!(json["kind"], "invalid_request");
    assert!(json["details"].as_str().is_some());
    assert_eq!(ledger.submissions(), 0);
}

#[tokio::test]
async fn test_revoke_non_string_address() {
    let app = create_test_app(Arc::new(InMemoryLedger::new()), RevokePolicy::Open);

    let (status, json) = send(&app, post("/revoke", json!({ "userAddress": 42 }))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["kind"], "invalid_request");
}

#[tokio::test]
async fn test_verify_body_not_json() {
    let app = create_test_app(Arc::new(InMemoryLedger::new()), RevokePolicy::Signature);

    let request = Request::builder()
        .uri("/verify")
        .method("POST")
        .header("content-type", "application/json")
        .body(Body::from("not json"))
        .unwrap();
    let (status, json) = send(&app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Invalid request body");
    assert_eq!(json["kind"], "invalid_request");
}

#[tokio::test]
async fn test_pseudonym_hidden_after_contract_revocation() {
    let ledger = Arc::new(InMemoryLedger::new());
    let app = create_test_app(ledger.clone(), RevokePolicy::Signature);
    let signer = PrivateKeySigner::random();
    send(&app, post("/verify", verify_body(&signer))).await;

    // Revoked directly on the contract, bypassing the gateway
    ledger.set_verified(signer.address().into(), false).await;

    let (status, json) = send(&app, get(&format!("/verify/{}", signer.address()))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["isVerified"], false);
    assert!(json.get("pseudonymId").is_none());
}
