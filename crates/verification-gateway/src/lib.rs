//! GhostPass Verification Gateway
//!
//! Bridges wallet ownership proofs to an on-chain verification registry and
//! hands clients a pseudonym in place of their raw address.
//!
//! ## Architecture
//!
//! - `auth`: recovers the signer of a personal-sign message
//! - `pseudonym`: mints stable anonymous identifiers per account
//! - `ledger`: the registry contract behind an async trait
//! - `store`: per-account records and pending-transaction markers
//! - `bridge`: orchestrates the above for verify, status and revoke
//!
//! ## Endpoints
//!
//! - `POST /verify` - Prove wallet ownership and record it on the registry
//! - `GET /verify/{address}` - On-chain verification status
//! - `GET /verify/{address}/pending` - In-flight transaction, if any
//! - `POST /revoke` - Clear a wallet's verification
//! - `GET /health` - Health check

pub mod auth;
pub mod bridge;
pub mod config;
pub mod handlers;
pub mod ledger;
pub mod pseudonym;
pub mod store;

use axum::{
    extract::Request,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

pub use bridge::{RevokePolicy, VerificationBridge};
pub use config::Config;
pub use ledger::{InMemoryLedger, LedgerClient, RegistryClient};
pub use store::VerificationStore;

/// Application state shared across handlers
pub struct AppState {
    pub bridge: Arc<VerificationBridge>,
}

impl AppState {
    pub fn new(bridge: Arc<VerificationBridge>) -> Self {
        Self { bridge }
    }
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    let state = Arc::new(state);

    Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/verify", post(handlers::verify_handler))
        .route("/verify/{address}", get(handlers::status_handler))
        .route("/verify/{address}/pending", get(handlers::pending_handler))
        .route("/revoke", post(handlers::revoke_handler))
        // Middleware
        .layer(middleware::from_fn(log_request))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn log_request(request: Request, next: Next) -> Response {
    info!("{} {}", request.method(), request.uri());
    next.run(request).await
}
