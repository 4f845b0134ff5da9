//! Capability interface to the external verification registry
//!
//! The bridge only ever talks to the ledger through [`LedgerClient`]. Two
//! implementations are provided:
//! - [`RegistryClient`]: the on-chain registry contract over JSON-RPC
//! - [`InMemoryLedger`]: a process-local ledger for development and tests

pub mod memory;
pub mod registry;

use async_trait::async_trait;
use ghostpass_common::{Account, Error, Result, TxHandle, TxReceipt};
use std::future::Future;
use std::time::Duration;

pub use memory::InMemoryLedger;
pub use registry::RegistryClient;

/// Default bound on a status read
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Default bound on broadcasting a transaction
pub const DEFAULT_SUBMIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default bound on waiting for a receipt
pub const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(120);

#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Syntactic address check, never touches the network
    fn is_address_valid(&self, candidate: &str) -> bool {
        Account::is_valid(candidate)
    }

    /// Point-in-time read of the on-chain verification flag
    ///
    /// Fails with `LedgerTimeout` when the read bound is exceeded and with
    /// `LedgerCallFailed` when the contract answer cannot be decoded.
    async fn read_verified(&self, account: &Account) -> Result<bool>;

    /// Submit a batched verify call; `accounts` must not be empty
    async fn submit_verify(&self, accounts: &[Account]) -> Result<TxHandle>;

    /// Submit a batched revoke call; `accounts` must not be empty
    async fn submit_revoke(&self, accounts: &[Account]) -> Result<TxHandle>;

    /// Wait until the transaction is included and finalized
    ///
    /// A timeout here is surfaced, never retried; callers resubmit.
    async fn await_confirmation(&self, handle: &TxHandle) -> Result<TxReceipt>;

    /// Report-only startup check
    async fn self_check(&self) -> Result<()> {
        Ok(())
    }
}

/// Run a ledger future under a deadline, classifying expiry as `LedgerTimeout`
pub async fn with_deadline<F, T>(operation: &'static str, timeout: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(Error::LedgerTimeout { operation, timeout }),
    }
}

/// Reject empty batches before they reach the ledger
pub(crate) fn ensure_batch(accounts: &[Account]) -> Result<()> {
    if accounts.is_empty() {
        return Err(Error::LedgerCallFailed(
            "transaction batch must contain at least one account".to_string(),
        ));
    }
    Ok(())
}
