//! In-memory ledger for development and testing
//!
//! Behaves like the registry contract: submissions are queued and only take
//! effect once confirmed. Delays and failures can be injected to exercise
//! timeout and revert paths.

use async_trait::async_trait;
use ghostpass_common::{Account, Error, Result, TxHandle, TxKind, TxReceipt};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

use super::{
    ensure_batch, with_deadline, LedgerClient, DEFAULT_CONFIRMATION_TIMEOUT, DEFAULT_READ_TIMEOUT,
};

/// Injected behaviour
#[derive(Debug, Default)]
struct Faults {
    read_delay: Duration,
    confirmation_delay: Duration,
    read_failure: Option<String>,
}

/// Process-local registry
pub struct InMemoryLedger {
    verified: Mutex<HashMap<Account, bool>>,
    queued: Mutex<HashMap<String, (TxKind, Vec<Account>)>>,
    faults: Mutex<Faults>,
    fail_next_confirmation: AtomicBool,
    nonce: AtomicU64,
    block_height: AtomicU64,
    submissions: AtomicU64,
    read_timeout: Duration,
    confirmation_timeout: Duration,
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::with_timeouts(DEFAULT_READ_TIMEOUT, DEFAULT_CONFIRMATION_TIMEOUT)
    }

    pub fn with_timeouts(read_timeout: Duration, confirmation_timeout: Duration) -> Self {
        Self {
            verified: Mutex::new(HashMap::new()),
            queued: Mutex::new(HashMap::new()),
            faults: Mutex::new(Faults::default()),
            fail_next_confirmation: AtomicBool::new(false),
            nonce: AtomicU64::new(0),
            block_height: AtomicU64::new(1_000),
            submissions: AtomicU64::new(0),
            read_timeout,
            confirmation_timeout,
        }
    }

    /// Delay every status read
    pub async fn set_read_delay(&self, delay: Duration) {
        self.faults.lock().await.read_delay = delay;
    }

    /// Delay every confirmation
    pub async fn set_confirmation_delay(&self, delay: Duration) {
        self.faults.lock().await.confirmation_delay = delay;
    }

    /// Make status reads fail as if the contract answer could not be decoded
    pub async fn set_read_failure(&self, reason: Option<String>) {
        self.faults.lock().await.read_failure = reason;
    }

    /// Revert the next transaction that is awaited
    pub fn fail_next_confirmation(&self) {
        self.fail_next_confirmation.store(true, Ordering::SeqCst);
    }

    /// Change state out-of-band, as a direct contract call would
    pub async fn set_verified(&self, account: Account, verified: bool) {
        self.verified.lock().await.insert(account, verified);
    }

    /// Number of transactions submitted so far
    pub fn submissions(&self) -> u64 {
        self.submissions.load(Ordering::SeqCst)
    }

    async fn submit(&self, kind: TxKind, accounts: &[Account]) -> Result<TxHandle> {
        ensure_batch(accounts)?;

        let nonce = self.nonce.fetch_add(1, Ordering::SeqCst) + 1;
        let hash = format!("0x{:064x}", nonce);
        self.queued
            .lock()
            .await
            .insert(hash.clone(), (kind, accounts.to_vec()));
        self.submissions.fetch_add(1, Ordering::SeqCst);

        debug!("In-memory ledger queued {} tx {} for {} account(s)", kind, hash, accounts.len());

        Ok(TxHandle {
            hash,
            kind,
            accounts: accounts.to_vec(),
        })
    }

    async fn confirm(&self, handle: &TxHandle) -> Result<TxReceipt> {
        let delay = self.faults.lock().await.confirmation_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let (kind, accounts) = self
            .queued
            .lock()
            .await
            .remove(&handle.hash)
            .ok_or_else(|| Error::LedgerCallFailed(format!("unknown transaction {}", handle.hash)))?;

        if self.fail_next_confirmation.swap(false, Ordering::SeqCst) {
            return Err(Error::LedgerCallFailed(format!(
                "transaction {} reverted",
                handle.hash
            )));
        }

        let mut verified = self.verified.lock().await;
        for account in accounts {
            verified.insert(account, kind.target_state());
        }

        Ok(TxReceipt {
            tx_hash: handle.hash.clone(),
            success: true,
            block_number: Some(self.block_height.fetch_add(1, Ordering::SeqCst)),
        })
    }
}

#[async_trait]
impl LedgerClient for InMemoryLedger {
    async fn read_verified(&self, account: &Account) -> Result<bool> {
        with_deadline("status read", self.read_timeout, async {
            let (delay, failure) = {
                let faults = self.faults.lock().await;
                (faults.read_delay, faults.read_failure.clone())
            };
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if let Some(reason) = failure {
                return Err(Error::LedgerCallFailed(reason));
            }

            Ok(self
                .verified
                .lock()
                .await
                .get(account)
                .copied()
                .unwrap_or(false))
        })
        .await
    }

    async fn submit_verify(&self, accounts: &[Account]) -> Result<TxHandle> {
        self.submit(TxKind::Verify, accounts).await
    }

    async fn submit_revoke(&self, accounts: &[Account]) -> Result<TxHandle> {
        self.submit(TxKind::Revoke, accounts).await
    }

    async fn await_confirmation(&self, handle: &TxHandle) -> Result<TxReceipt> {
        with_deadline("confirmation", self.confirmation_timeout, self.confirm(handle)).await
    }
}
