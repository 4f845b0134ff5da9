//! On-chain registry client
//!
//! Talks to the deployed verification registry through a dynamic contract
//! instance built from the configured ABI, signing transactions with the
//! gateway's key.

use alloy::contract::{ContractInstance, Error as ContractError, Interface};
use alloy::dyn_abi::DynSolValue;
use alloy::json_abi::JsonAbi;
use alloy::primitives::{Address, TxHash};
use alloy::providers::{
    DynProvider, PendingTransactionBuilder, PendingTransactionError, Provider, ProviderBuilder,
};
use alloy::signers::local::PrivateKeySigner;
use alloy::transports::RpcError;
use async_trait::async_trait;
use ghostpass_common::{Account, Error, Result, TxHandle, TxKind, TxReceipt};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{ensure_batch, with_deadline, LedgerClient};
use crate::config::Config;

/// Read the verification flag of one account
pub const IS_VERIFIED: &str = "isVerified";
/// Verify a single account
pub const VERIFY_USER: &str = "verifyUser";
/// Revoke a single account
pub const REVOKE_USER: &str = "revokeUser";
/// Verify several accounts in one transaction
pub const VERIFY_USERS: &str = "verifyUsers";
/// Revoke several accounts in one transaction
pub const REVOKE_USERS: &str = "revokeUsers";

/// Functions the registry ABI must declare
pub const REQUIRED_FUNCTIONS: [&str; 3] = [IS_VERIFIED, VERIFY_USER, REVOKE_USER];

/// Client for the verification registry contract
pub struct RegistryClient {
    provider: DynProvider,
    contract: ContractInstance<DynProvider>,
    abi: JsonAbi,
    address: Address,
    read_timeout: Duration,
    submit_timeout: Duration,
    confirmation_timeout: Duration,
    required_confirmations: u64,
}

impl RegistryClient {
    /// Connect to the RPC endpoint and bind the registry contract
    pub async fn connect(config: &Config) -> Result<Self> {
        let signer: PrivateKeySigner = config.private_key.parse().map_err(|_| {
            Error::InvalidConfiguration("PRIVATE_KEY is not a valid secp256k1 key".to_string())
        })?;
        let sender = signer.address();

        let provider = ProviderBuilder::new()
            .wallet(signer)
            .connect(&config.rpc_url)
            .await
            .map_err(|e| Error::LedgerUnreachable(format!("{}: {}", config.rpc_url, e)))?
            .erased();

        let address = config.contract_address.address();
        let contract = ContractInstance::new(
            address,
            provider.clone(),
            Interface::new(config.abi.clone()),
        );

        info!(
            "Registry client bound to {} via {} (sender {})",
            config.contract_address, config.rpc_url, sender
        );

        Ok(Self {
            provider,
            contract,
            abi: config.abi.clone(),
            address,
            read_timeout: config.read_timeout,
            submit_timeout: config.submit_timeout,
            confirmation_timeout: config.confirmation_timeout,
            required_confirmations: config.required_confirmations,
        })
    }

    async fn submit(&self, kind: TxKind, accounts: &[Account]) -> Result<TxHandle> {
        ensure_batch(accounts)?;

        let (function, args) = batch_call(kind, accounts);
        let call = self.contract.function(function, &args).map_err(classify)?;

        let hash = with_deadline("submission", self.submit_timeout, async {
            let pending = call.send().await.map_err(classify)?;
            Ok(*pending.tx_hash())
        })
        .await?;

        debug!("Submitted {} ({} account(s)): {}", function, accounts.len(), hash);

        Ok(TxHandle {
            hash: hash.to_string(),
            kind,
            accounts: accounts.to_vec(),
        })
    }

    fn missing_functions(&self) -> Vec<&'static str> {
        REQUIRED_FUNCTIONS
            .iter()
            .copied()
            .filter(|name| self.abi.function(name).is_none())
            .collect()
    }
}

#[async_trait]
impl LedgerClient for RegistryClient {
    async fn read_verified(&self, account: &Account) -> Result<bool> {
        let call = self
            .contract
            .function(IS_VERIFIED, &[DynSolValue::Address(account.address())])
            .map_err(classify)?;

        let values = with_deadline("status read", self.read_timeout, async {
            call.call().await.map_err(classify)
        })
        .await?;

        match values.first() {
            Some(DynSolValue::Bool(verified)) => Ok(*verified),
            other => Err(Error::LedgerCallFailed(format!(
                "{} returned {:?}, expected a bool",
                IS_VERIFIED, other
            ))),
        }
    }

    async fn submit_verify(&self, accounts: &[Account]) -> Result<TxHandle> {
        self.submit(TxKind::Verify, accounts).await
    }

    async fn submit_revoke(&self, accounts: &[Account]) -> Result<TxHandle> {
        self.submit(TxKind::Revoke, accounts).await
    }

    async fn await_confirmation(&self, handle: &TxHandle) -> Result<TxReceipt> {
        let hash: TxHash = handle.hash.parse().map_err(|_| {
            Error::LedgerCallFailed(format!("malformed transaction hash {}", handle.hash))
        })?;

        debug!(
            "Awaiting {} confirmation(s) of {} ({} account(s))",
            self.required_confirmations,
            handle.hash,
            handle.accounts.len()
        );

        let receipt = with_deadline("confirmation", self.confirmation_timeout, async {
            PendingTransactionBuilder::new(self.provider.root().clone(), hash)
                .with_required_confirmations(self.required_confirmations)
                .get_receipt()
                .await
                .map_err(classify_pending)
        })
        .await?;

        if !receipt.status() {
            return Err(Error::LedgerCallFailed(format!(
                "transaction {} reverted",
                handle.hash
            )));
        }

        Ok(TxReceipt {
            tx_hash: receipt.transaction_hash.to_string(),
            success: true,
            block_number: receipt.block_number,
        })
    }

    async fn self_check(&self) -> Result<()> {
        let code = with_deadline("code lookup", self.read_timeout, async {
            self.provider
                .get_code_at(self.address)
                .await
                .map_err(|e| Error::LedgerUnreachable(e.to_string()))
        })
        .await?;

        if code.is_empty() {
            return Err(Error::LedgerCallFailed(format!(
                "no contract deployed at {}",
                self.address
            )));
        }
        info!("Registry contract found at {} ({} bytes)", self.address, code.len());

        let missing = self.missing_functions();
        if !missing.is_empty() {
            return Err(Error::LedgerCallFailed(format!(
                "ABI does not declare {}",
                missing.join(", ")
            )));
        }

        let verified = self.read_verified(&Account::zero()).await?;
        info!("Registry read {}(0x0) returned {}", IS_VERIFIED, verified);

        if self.abi.function(VERIFY_USERS).is_none() || self.abi.function(REVOKE_USERS).is_none() {
            warn!("Registry ABI has no batch functions; only single-account batches will succeed");
        }

        Ok(())
    }
}

/// Pick the single or batched contract function for a submission
fn batch_call(kind: TxKind, accounts: &[Account]) -> (&'static str, Vec<DynSolValue>) {
    match (kind, accounts) {
        (TxKind::Verify, [single]) => (VERIFY_USER, vec![DynSolValue::Address(single.address())]),
        (TxKind::Revoke, [single]) => (REVOKE_USER, vec![DynSolValue::Address(single.address())]),
        (TxKind::Verify, many) => (VERIFY_USERS, vec![address_array(many)]),
        (TxKind::Revoke, many) => (REVOKE_USERS, vec![address_array(many)]),
    }
}

fn address_array(accounts: &[Account]) -> DynSolValue {
    DynSolValue::Array(
        accounts
            .iter()
            .map(|a| DynSolValue::Address(a.address()))
            .collect(),
    )
}

/// Separate unreachable nodes from calls the node rejected or we could not decode
fn classify(err: ContractError) -> Error {
    match err {
        ContractError::TransportError(RpcError::ErrorResp(payload)) => {
            Error::LedgerCallFailed(payload.to_string())
        }
        ContractError::TransportError(e) => Error::LedgerUnreachable(e.to_string()),
        other => Error::LedgerCallFailed(other.to_string()),
    }
}

fn classify_pending(err: PendingTransactionError) -> Error {
    match err {
        PendingTransactionError::TransportError(e) => Error::LedgerUnreachable(e.to_string()),
        other => Error::LedgerCallFailed(other.to_string()),
    }
}
