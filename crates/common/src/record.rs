//! Verification records and transaction lifecycle types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Account, PseudonymId};

/// Kind of state-changing registry transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxKind {
    Verify,
    Revoke,
}

impl TxKind {
    /// The `verified` flag a confirmed transaction of this kind leaves behind
    pub fn target_state(&self) -> bool {
        matches!(self, TxKind::Verify)
    }
}

impl fmt::Display for TxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxKind::Verify => f.write_str("verify"),
            TxKind::Revoke => f.write_str("revoke"),
        }
    }
}

/// Local view of an account's verification, keyed by account
///
/// Created on the first confirmed verify and updated in place afterwards.
/// Revocation clears `verified` but keeps the pseudonym binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationRecord {
    pub account: Account,
    pub verified: bool,
    pub pseudonym_id: PseudonymId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_tx_hash: Option<String>,
    /// Block that included `last_tx_hash`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmed_block: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmed_at: Option<DateTime<Utc>>,
}

impl VerificationRecord {
    pub fn new(account: Account, pseudonym_id: PseudonymId) -> Self {
        Self {
            account,
            verified: false,
            pseudonym_id,
            last_tx_hash: None,
            confirmed_block: None,
            confirmed_at: None,
        }
    }

    /// Apply a confirmed transaction
    pub fn apply(&mut self, kind: TxKind, receipt: &TxReceipt) {
        self.verified = kind.target_state();
        self.last_tx_hash = Some(receipt.tx_hash.clone());
        self.confirmed_block = receipt.block_number;
        self.confirmed_at = Some(Utc::now());
    }
}

/// A submission awaiting confirmation; at most one per account
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingTransaction {
    pub account: Account,
    pub kind: TxKind,
    pub submitted_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
}

impl PendingTransaction {
    pub fn new(account: Account, kind: TxKind) -> Self {
        Self {
            account,
            kind,
            submitted_at: Utc::now(),
            tx_hash: None,
        }
    }
}

/// Handle to a submitted, not yet confirmed, transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxHandle {
    /// `0x`-prefixed transaction hash
    pub hash: String,
    pub kind: TxKind,
    pub accounts: Vec<Account>,
}

/// Outcome of a transaction once included by the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_hash: String,
    pub success: bool,
    pub block_number: Option<u64>,
}
