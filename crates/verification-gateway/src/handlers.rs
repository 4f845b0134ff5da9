//! API request handlers for verification operations

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use ghostpass_common::{Account, Error, PendingTransaction, PseudonymId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::bridge::OwnershipProof;
use crate::AppState;

/// API Error type
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub details: Option<String>,
    pub kind: &'static str,
}

impl ApiError {
    /// Replace the headline message of a server-side failure
    ///
    /// Client errors keep their own message so callers can tell what to fix.
    pub fn context(mut self, message: &str) -> Self {
        if self.status.is_server_error() {
            self.message = message.to_string();
        }
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = serde_json::json!({
            "error": self.message,
            "kind": self.kind,
        });
        if let Some(details) = self.details {
            body["details"] = serde_json::Value::String(details);
        }

        (self.status, Json(body)).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let (status, message) = match &err {
            Error::InvalidAddress(_) => (StatusCode::BAD_REQUEST, "Invalid Ethereum address"),
            Error::InvalidSignature(_) => (StatusCode::BAD_REQUEST, "Invalid signature"),
            Error::MissingField(_) => (StatusCode::BAD_REQUEST, "Missing required fields"),
            Error::AlreadyPending { .. } => (
                StatusCode::CONFLICT,
                "A transaction is already pending for this address",
            ),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error"),
        };

        ApiError {
            status,
            message: message.to_string(),
            details: Some(err.to_string()),
            kind: err.root_cause().kind(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError {
            status: StatusCode::BAD_REQUEST,
            message: "Invalid request body".to_string(),
            details: Some(rejection.body_text()),
            kind: "invalid_request",
        }
    }
}

/// Present and non-blank request field
fn required(value: Option<String>, field: &'static str) -> Result<String, ApiError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| Error::MissingField(field).into())
}

/// Request to verify a wallet
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    pub wallet_address: Option<String>,
    pub signature: Option<String>,
    pub message: Option<String>,
}

/// Response from a confirmed verification
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub message: String,
    pub transaction_hash: String,
    pub pseudonym_id: PseudonymId,
}

/// Verification status of an address
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub address: String,
    pub is_verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pseudonym_id: Option<PseudonymId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<DateTime<Utc>>,
}

/// Request to revoke a wallet's verification
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevokeRequest {
    pub user_address: Option<String>,

    /// Required unless revocation is open
    pub signature: Option<String>,
    pub message: Option<String>,
}

/// Response from a confirmed revocation
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevokeResponse {
    pub message: String,
    pub transaction_hash: String,
}

/// In-flight transaction for an address
#[derive(Debug, Serialize)]
pub struct PendingResponse {
    pub address: String,
    pub pending: Option<PendingTransaction>,
}

/// Health check endpoint
pub async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// Authenticate a wallet and mark it verified on the registry
pub async fn verify_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<VerifyRequest>, JsonRejection>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let Json(payload) = payload?;
    let wallet_address = required(payload.wallet_address, "walletAddress")?;
    let signature = required(payload.signature, "signature")?;
    let message = required(payload.message, "message")?;

    let outcome = state
        .bridge
        .verify(&wallet_address, &signature, &message)
        .await
        .map_err(|e| ApiError::from(e).context("Failed to verify user"))?;

    Ok(Json(VerifyResponse {
        message: "User verified successfully".to_string(),
        transaction_hash: outcome.tx_hash,
        pseudonym_id: outcome.pseudonym_id,
    }))
}

/// Read the on-chain verification status of an address
pub async fn status_handler(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    let view = state
        .bridge
        .status(&address)
        .await
        .map_err(|e| ApiError::from(e).context("Failed to fetch verification status"))?;

    debug!("Status of {}: verified={}", view.account, view.verified);

    // The local pseudonym is only disclosed while the ledger says verified
    let (pseudonym_id, verified_at) = if view.verified {
        (view.pseudonym_id, view.confirmed_at)
    } else {
        (None, None)
    };

    Ok(Json(StatusResponse {
        address: view.account.to_string(),
        is_verified: view.verified,
        pseudonym_id,
        verified_at,
    }))
}

/// Clear a wallet's verification on the registry
pub async fn revoke_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RevokeRequest>, JsonRejection>,
) -> Result<Json<RevokeResponse>, ApiError> {
    let Json(payload) = payload?;
    let user_address = required(payload.user_address, "userAddress")?;

    let proof = match (payload.signature, payload.message) {
        (Some(signature), Some(message)) => Some(OwnershipProof { signature, message }),
        _ => None,
    };

    let outcome = state
        .bridge
        .revoke(&user_address, proof.as_ref())
        .await
        .map_err(|e| ApiError::from(e).context("Failed to revoke user"))?;

    Ok(Json(RevokeResponse {
        message: "User verification revoked successfully".to_string(),
        transaction_hash: outcome.tx_hash,
    }))
}

/// Inspect the in-flight transaction of an address
pub async fn pending_handler(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
) -> Result<Json<PendingResponse>, ApiError> {
    let pending = state.bridge.pending(&address)?;
    let account = Account::parse(&address)?;

    Ok(Json(PendingResponse {
        address: account.to_string(),
        pending,
    }))
}
