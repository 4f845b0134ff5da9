use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// A 20-byte ledger account, always rendered as lower-case `0x` hex
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Account(Address);

impl Account {
    /// Parse a candidate address string
    ///
    /// Accepts 40 hex characters with an optional `0x` prefix. All-lower and
    /// all-upper inputs are taken as-is; mixed-case input must carry a valid
    /// EIP-55 checksum.
    pub fn parse(candidate: &str) -> Result<Self> {
        let digits = candidate.strip_prefix("0x").unwrap_or(candidate);

        if digits.len() != 40 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(Error::InvalidAddress(candidate.to_string()));
        }

        let has_upper = digits.bytes().any(|b| b.is_ascii_uppercase());
        let has_lower = digits.bytes().any(|b| b.is_ascii_lowercase());
        if has_upper && has_lower {
            let address = Address::parse_checksummed(format!("0x{}", digits), None)
                .map_err(|_| Error::InvalidAddress(candidate.to_string()))?;
            return Ok(Self(address));
        }

        let bytes = hex::decode(digits).map_err(|_| Error::InvalidAddress(candidate.to_string()))?;
        let mut raw = [0u8; 20];
        raw.copy_from_slice(&bytes);
        Ok(Self(Address::from(raw)))
    }

    /// Syntactic validity check, no network access
    pub fn is_valid(candidate: &str) -> bool {
        Self::parse(candidate).is_ok()
    }

    /// The zero address, used as a harmless read target
    pub fn zero() -> Self {
        Self(Address::ZERO)
    }

    pub fn address(&self) -> Address {
        self.0
    }

    /// Lower-case `0x`-prefixed hex
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0.as_slice()))
    }
}

impl From<Address> for Account {
    fn from(address: Address) -> Self {
        Self(address)
    }
}

impl From<Account> for Address {
    fn from(account: Account) -> Self {
        account.0
    }
}

impl From<Account> for String {
    fn from(account: Account) -> Self {
        account.to_hex()
    }
}

impl TryFrom<String> for Account {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl FromStr for Account {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}
