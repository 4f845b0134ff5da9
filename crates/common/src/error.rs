use std::time::Duration;

use thiserror::Error;

use crate::record::TxKind;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid Ethereum address: {0}")]
    InvalidAddress(String),

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("A {kind} transaction is already pending for {account}")]
    AlreadyPending { account: String, kind: TxKind },

    #[error("Ledger {operation} timed out after {timeout:?}")]
    LedgerTimeout {
        operation: &'static str,
        timeout: Duration,
    },

    #[error("Ledger unreachable: {0}")]
    LedgerUnreachable(String),

    #[error("Ledger call failed: {0}")]
    LedgerCallFailed(String),

    #[error("{kind} transaction failed for {account}: {source}")]
    VerificationFailed {
        account: String,
        kind: TxKind,
        #[source]
        source: Box<Error>,
    },

    #[error("Missing required configuration: {0}")]
    ConfigurationMissing(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl Error {
    /// Stable machine-readable code for API error bodies
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidAddress(_) => "invalid_address",
            Error::InvalidSignature(_) => "invalid_signature",
            Error::MissingField(_) => "missing_field",
            Error::AlreadyPending { .. } => "already_pending",
            Error::LedgerTimeout { .. } => "ledger_timeout",
            Error::LedgerUnreachable(_) => "ledger_unreachable",
            Error::LedgerCallFailed(_) => "ledger_call_failed",
            Error::VerificationFailed { .. } => "verification_failed",
            Error::ConfigurationMissing(_) => "configuration_missing",
            Error::InvalidConfiguration(_) => "invalid_configuration",
        }
    }

    /// The ledger-level cause behind a failed transaction, or the error itself
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::VerificationFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Whether this error was raised by local input validation
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidAddress(_) | Error::InvalidSignature(_) | Error::MissingField(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
