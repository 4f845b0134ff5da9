//! Shared types for the GhostPass verification gateway.
//!
//! Holds the error taxonomy and the domain records that flow between the
//! signature check, the pseudonym allocator, the ledger client and the
//! verification bridge.

pub mod account;
pub mod error;
pub mod pseudonym;
pub mod record;

pub use account::Account;
pub use error::{Error, Result};
pub use pseudonym::PseudonymId;
pub use record::{PendingTransaction, TxHandle, TxKind, TxReceipt, VerificationRecord};
