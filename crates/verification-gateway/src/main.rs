//! Verification Gateway Service
//!
//! REST API that authenticates wallet owners and records their verification
//! on the registry contract.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use verification_gateway::{
    auth::PersonalSignAuthenticator, create_router, AppState, Config, LedgerClient,
    RegistryClient, VerificationBridge, VerificationStore,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,verification_gateway=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Verification Gateway");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    info!("Configuration loaded: {:?}", config);

    // Connect to the registry contract
    let registry = RegistryClient::connect(&config)
        .await
        .context("Failed to connect to registry contract")?;
    let ledger: Arc<dyn LedgerClient> = Arc::new(registry);
    info!("Registry contract: {}", config.contract_address);

    let checker = ledger.clone();
    tokio::spawn(async move {
        match checker.self_check().await {
            Ok(()) => info!("Registry self-check passed"),
            Err(e) => warn!("Registry self-check failed: {}", e),
        }
    });

    // Create application state
    let store = Arc::new(VerificationStore::new());
    let bridge = Arc::new(VerificationBridge::new(
        Arc::new(PersonalSignAuthenticator),
        ledger,
        store.clone(),
        &config.pseudonym_prefix,
        config.revoke_policy,
    ));
    info!("Revocation policy: {:?}", config.revoke_policy);

    // Create router
    let app = create_router(AppState::new(bridge));

    // Start server
    let listener = TcpListener::bind(&config.api_address())
        .await
        .with_context(|| format!("Failed to bind to {}", config.api_address()))?;

    info!("Verification Gateway listening on {}", config.api_address());
    info!("Health check: http://{}/health", config.api_address());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    let records = store.snapshot();
    info!(
        "Shutting down with {} verification records held in memory",
        records.len()
    );

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
