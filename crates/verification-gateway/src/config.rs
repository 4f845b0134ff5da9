//! Configuration management for the Verification Gateway
//!
//! Loads configuration from environment variables (and `.env`). The signing
//! key, RPC endpoint, contract address and contract ABI are required; the
//! gateway refuses to start without them.

use alloy::json_abi::JsonAbi;
use alloy::signers::local::PrivateKeySigner;
use ghostpass_common::{Account, Error, Result};
use serde::Deserialize;
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::bridge::RevokePolicy;
use crate::ledger::{DEFAULT_CONFIRMATION_TIMEOUT, DEFAULT_READ_TIMEOUT, DEFAULT_SUBMIT_TIMEOUT};
use crate::pseudonym::DEFAULT_PSEUDONYM_PREFIX;

/// Application configuration
#[derive(Clone)]
pub struct Config {
    /// API server host
    pub api_host: String,

    /// API server port
    pub api_port: u16,

    /// Hex secp256k1 key that signs registry transactions
    pub private_key: String,

    /// JSON-RPC endpoint of the ledger network
    pub rpc_url: String,

    /// Deployed registry contract
    pub contract_address: Account,

    /// Where the registry ABI was loaded from
    pub abi_path: PathBuf,

    /// Registry contract interface
    pub abi: JsonAbi,

    /// Bound on a status read
    pub read_timeout: Duration,

    /// Bound on broadcasting a transaction
    pub submit_timeout: Duration,

    /// Bound on waiting for a receipt
    pub confirmation_timeout: Duration,

    /// Blocks on top of inclusion before a transaction counts as final
    pub required_confirmations: u64,

    /// Who may revoke a verification
    pub revoke_policy: RevokePolicy,

    /// Namespace prefix of minted pseudonyms
    pub pseudonym_prefix: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists (for local development)
        dotenv::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &str| get(key).ok_or_else(|| Error::ConfigurationMissing(key.to_string()));

        let private_key = required("PRIVATE_KEY")?;
        let rpc_url = required("RPC_URL")?;
        let contract_address = Account::parse(&required("CONTRACT_ADDRESS")?).map_err(|_| {
            Error::InvalidConfiguration("CONTRACT_ADDRESS is not a valid address".to_string())
        })?;

        let abi_path = PathBuf::from(get("ABI_PATH").unwrap_or_else(|| "./abi.json".to_string()));
        let abi = load_abi(&abi_path)?;

        let config = Config {
            api_host: get("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            api_port: parse_or("PORT", get("PORT"), 3000)?,
            private_key,
            rpc_url,
            contract_address,
            abi_path,
            abi,
            read_timeout: secs_or(
                "LEDGER_READ_TIMEOUT_SECS",
                get("LEDGER_READ_TIMEOUT_SECS"),
                DEFAULT_READ_TIMEOUT,
            )?,
            submit_timeout: secs_or(
                "LEDGER_SUBMIT_TIMEOUT_SECS",
                get("LEDGER_SUBMIT_TIMEOUT_SECS"),
                DEFAULT_SUBMIT_TIMEOUT,
            )?,
            confirmation_timeout: secs_or(
                "CONFIRMATION_TIMEOUT_SECS",
                get("CONFIRMATION_TIMEOUT_SECS"),
                DEFAULT_CONFIRMATION_TIMEOUT,
            )?,
            required_confirmations: parse_or(
                "REQUIRED_CONFIRMATIONS",
                get("REQUIRED_CONFIRMATIONS"),
                1,
            )?,
            revoke_policy: match get("REVOKE_AUTH") {
                Some(value) => value.parse()?,
                None => RevokePolicy::default(),
            },
            pseudonym_prefix: get("PSEUDONYM_PREFIX")
                .unwrap_or_else(|| DEFAULT_PSEUDONYM_PREFIX.to_string()),
        };

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.api_port == 0 {
            return Err(Error::InvalidConfiguration(
                "PORT must be greater than 0".to_string(),
            ));
        }

        if self.private_key.parse::<PrivateKeySigner>().is_err() {
            return Err(Error::InvalidConfiguration(
                "PRIVATE_KEY is not a valid secp256k1 key".to_string(),
            ));
        }

        if !(self.rpc_url.starts_with("http://") || self.rpc_url.starts_with("https://")) {
            return Err(Error::InvalidConfiguration(format!(
                "RPC_URL must be an http(s) URL, got {}",
                self.rpc_url
            )));
        }

        if self.required_confirmations == 0 {
            return Err(Error::InvalidConfiguration(
                "REQUIRED_CONFIRMATIONS must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Get the API server address
    pub fn api_address(&self) -> String {
        format!("{}:{}", self.api_host, self.api_port)
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_host", &self.api_host)
            .field("api_port", &self.api_port)
            .field("private_key", &"<redacted>")
            .field("rpc_url", &self.rpc_url)
            .field("contract_address", &self.contract_address)
            .field("abi_path", &self.abi_path)
            .field("read_timeout", &self.read_timeout)
            .field("submit_timeout", &self.submit_timeout)
            .field("confirmation_timeout", &self.confirmation_timeout)
            .field("required_confirmations", &self.required_confirmations)
            .field("revoke_policy", &self.revoke_policy)
            .field("pseudonym_prefix", &self.pseudonym_prefix)
            .finish()
    }
}

/// Compiler artifacts wrap the ABI in an object
#[derive(Deserialize)]
struct Artifact {
    abi: JsonAbi,
}

/// Read a contract ABI, either a bare JSON array or an artifact with `abi`
pub fn load_abi(path: &Path) -> Result<JsonAbi> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        Error::ConfigurationMissing(format!("ABI file {} ({})", path.display(), e))
    })?;

    if let Ok(abi) = serde_json::from_str::<JsonAbi>(&raw) {
        return Ok(abi);
    }

    serde_json::from_str::<Artifact>(&raw)
        .map(|artifact| artifact.abi)
        .map_err(|e| {
            Error::InvalidConfiguration(format!(
                "ABI file {} cannot be parsed: {}",
                path.display(),
                e
            ))
        })
}

fn parse_or<T: std::str::FromStr>(key: &str, value: Option<String>, default: T) -> Result<T> {
    match value {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| Error::InvalidConfiguration(format!("Invalid {}: {}", key, raw))),
        None => Ok(default),
    }
}

fn secs_or(key: &str, value: Option<String>, default: Duration) -> Result<Duration> {
    let secs: u64 = parse_or(key, value, default.as_secs())?;
    if secs == 0 {
        return Err(Error::InvalidConfiguration(format!(
            "{} must be greater than 0",
            key
        )));
    }
    Ok(Duration::from_secs(secs))
}
