//! Verification state bridge
//!
//! Orchestrates signature authentication, pseudonym allocation and registry
//! transactions, and keeps the local view of each account consistent with
//! what the ledger has confirmed.
//!
//! Per-account lifecycle:
//! 1. Unverified / Verified: no pending slot held
//! 2. Pending: `VerificationStore::begin` claimed the slot; a second verify or
//!    revoke for the same account gets `AlreadyPending`
//! 3. Confirmed: the record is updated, then the slot is released
//! 4. Failed: the slot is released and the record is left untouched
//!
//! The ledger stays authoritative for `verified`; local records only add the
//! pseudonym and confirmation time.

use chrono::{DateTime, Utc};
use ghostpass_common::{Account, Error, PendingTransaction, PseudonymId, Result, TxKind, TxReceipt};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::auth::SignatureAuthenticator;
use crate::ledger::LedgerClient;
use crate::pseudonym::PseudonymAllocator;
use crate::store::{PendingGuard, VerificationStore};

/// Who may revoke an account's verification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RevokePolicy {
    /// Caller must sign a message with the account being revoked
    #[default]
    Signature,
    /// Any caller who knows the address may revoke it
    Open,
}

impl FromStr for RevokePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "signature" => Ok(RevokePolicy::Signature),
            "open" => Ok(RevokePolicy::Open),
            other => Err(Error::InvalidConfiguration(format!(
                "REVOKE_AUTH must be 'signature' or 'open', got '{}'",
                other
            ))),
        }
    }
}

/// Signed message proving control of an account
#[derive(Debug, Clone)]
pub struct OwnershipProof {
    pub signature: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct VerifyOutcome {
    pub account: Account,
    pub pseudonym_id: PseudonymId,
    pub tx_hash: String,
}

#[derive(Debug, Clone)]
pub struct RevokeOutcome {
    pub account: Account,
    pub tx_hash: String,
}

/// On-chain status merged with local pseudonym metadata
#[derive(Debug, Clone)]
pub struct StatusView {
    pub account: Account,
    pub verified: bool,
    pub pseudonym_id: Option<PseudonymId>,
    pub confirmed_at: Option<DateTime<Utc>>,
}

pub struct VerificationBridge {
    authenticator: Arc<dyn SignatureAuthenticator>,
    ledger: Arc<dyn LedgerClient>,
    store: Arc<VerificationStore>,
    allocator: PseudonymAllocator,
    revoke_policy: RevokePolicy,
}

impl VerificationBridge {
    pub fn new(
        authenticator: Arc<dyn SignatureAuthenticator>,
        ledger: Arc<dyn LedgerClient>,
        store: Arc<VerificationStore>,
        pseudonym_prefix: &str,
        revoke_policy: RevokePolicy,
    ) -> Self {
        let allocator = PseudonymAllocator::new(store.clone(), pseudonym_prefix);
        Self {
            authenticator,
            ledger,
            store,
            allocator,
            revoke_policy,
        }
    }

    pub fn store(&self) -> &Arc<VerificationStore> {
        &self.store
    }

    pub fn revoke_policy(&self) -> RevokePolicy {
        self.revoke_policy
    }

    /// Authenticate `claimed`, record it as verified on the ledger and return
    /// its pseudonym
    pub async fn verify(&self, claimed: &str, signature: &str, message: &str) -> Result<VerifyOutcome> {
        let result = self.run_verify(claimed, signature, message).await;
        if let Err(e) = &result {
            log_failure("verify", claimed, e);
        }
        result
    }

    async fn run_verify(&self, claimed: &str, signature: &str, message: &str) -> Result<VerifyOutcome> {
        let account = self.parse_account(claimed)?;
        self.authenticator.authenticate(claimed, message, signature)?;

        let guard = self.store.begin(account, TxKind::Verify)?;
        let reservation = self.allocator.allocate(&account);

        let receipt = self.transact(&guard, TxKind::Verify).await?;
        self.store.commit(
            account,
            TxKind::Verify,
            Some(reservation.id().clone()),
            &receipt,
        );
        let pseudonym = reservation.keep();
        drop(guard);

        info!(
            "User verified: {} as {}, txHash: {}",
            account, pseudonym, receipt.tx_hash
        );

        Ok(VerifyOutcome {
            account,
            pseudonym_id: pseudonym,
            tx_hash: receipt.tx_hash,
        })
    }

    /// Read the on-chain status of `address`
    pub async fn status(&self, address: &str) -> Result<StatusView> {
        let result = self.run_status(address).await;
        if let Err(e) = &result {
            log_failure("status", address, e);
        }
        result
    }

    async fn run_status(&self, address: &str) -> Result<StatusView> {
        let account = self.parse_account(address)?;
        let verified = self.ledger.read_verified(&account).await?;

        let (pseudonym_id, confirmed_at) = match self.store.record(&account) {
            Some(record) => (Some(record.pseudonym_id), record.confirmed_at),
            None => (None, None),
        };

        Ok(StatusView {
            account,
            verified,
            pseudonym_id,
            confirmed_at,
        })
    }

    /// Clear the verification of `address` on the ledger
    ///
    /// Under `RevokePolicy::Signature` a proof of account control is required.
    pub async fn revoke(&self, address: &str, proof: Option<&OwnershipProof>) -> Result<RevokeOutcome> {
        let result = self.run_revoke(address, proof).await;
        if let Err(e) = &result {
            log_failure("revoke", address, e);
        }
        result
    }

    async fn run_revoke(&self, address: &str, proof: Option<&OwnershipProof>) -> Result<RevokeOutcome> {
        let account = self.parse_account(address)?;

        if self.revoke_policy == RevokePolicy::Signature {
            let proof = proof.ok_or_else(|| {
                Error::InvalidSignature(
                    "revocation requires a signed message from the account".to_string(),
                )
            })?;
            self.authenticator
                .authenticate(address, &proof.message, &proof.signature)?;
        }

        let guard = self.store.begin(account, TxKind::Revoke)?;
        let receipt = self.transact(&guard, TxKind::Revoke).await?;
        self.store.commit(account, TxKind::Revoke, None, &receipt);
        drop(guard);

        info!("User revoked: {}, txHash: {}", account, receipt.tx_hash);

        Ok(RevokeOutcome {
            account,
            tx_hash: receipt.tx_hash,
        })
    }

    /// In-flight transaction for `address`, if any
    pub fn pending(&self, address: &str) -> Result<Option<PendingTransaction>> {
        let account = self.parse_account(address)?;
        Ok(self.store.pending(&account))
    }

    fn parse_account(&self, candidate: &str) -> Result<Account> {
        if !self.ledger.is_address_valid(candidate) {
            return Err(Error::InvalidAddress(candidate.to_string()));
        }
        Account::parse(candidate)
    }

    /// Submit and confirm a single-account transaction while holding its
    /// pending slot
    async fn transact(&self, guard: &PendingGuard<'_>, kind: TxKind) -> Result<TxReceipt> {
        let account = guard.account();

        let outcome: Result<TxReceipt> = async {
            let batch = [account];
            let handle = match kind {
                TxKind::Verify => self.ledger.submit_verify(&batch).await?,
                TxKind::Revoke => self.ledger.submit_revoke(&batch).await?,
            };
            guard.attach_tx(&handle.hash);
            info!("Submitted {} tx {} for {}", kind, handle.hash, account);

            let receipt = self.ledger.await_confirmation(&handle).await?;
            if !receipt.success {
                return Err(Error::LedgerCallFailed(format!(
                    "transaction {} reverted",
                    receipt.tx_hash
                )));
            }
            match receipt.block_number {
                Some(block) => info!("Confirmed {} tx {} in block {}", kind, receipt.tx_hash, block),
                None => info!("Confirmed {} tx {}", kind, receipt.tx_hash),
            }
            Ok(receipt)
        }
        .await;

        outcome.map_err(|source| Error::VerificationFailed {
            account: account.to_string(),
            kind,
            source: Box::new(source),
        })
    }
}

fn log_failure(operation: &str, address: &str, err: &Error) {
    if err.is_client_error() || matches!(err, Error::AlreadyPending { .. }) {
        warn!("{} rejected for {}: {}", operation, address, err);
    } else {
        error!("{} failed for {}: {}", operation, address, err);
    }
}
