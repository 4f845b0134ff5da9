//! Signature challenge verification
//!
//! Proves that the caller controls an account by recovering the signer of a
//! personal-sign (EIP-191) message and comparing it to the claimed address.

use alloy::primitives::Signature;
use ghostpass_common::{Account, Error, Result};

pub trait SignatureAuthenticator: Send + Sync {
    /// Return the claimed account if `signature` over `message` was produced by it
    fn authenticate(&self, claimed: &str, message: &str, signature: &str) -> Result<Account>;
}

/// EIP-191 personal message recovery over secp256k1
#[derive(Debug, Clone, Copy, Default)]
pub struct PersonalSignAuthenticator;

impl PersonalSignAuthenticator {
    /// Recover the signing account of a personal-sign message
    pub fn recover(message: &str, signature: &str) -> Result<Account> {
        let digits = signature.strip_prefix("0x").unwrap_or(signature);
        let bytes = hex::decode(digits)
            .map_err(|e| Error::InvalidSignature(format!("signature is not hex: {}", e)))?;

        let signature = Signature::from_raw(&bytes)
            .map_err(|e| Error::InvalidSignature(format!("malformed signature: {}", e)))?;

        signature
            .recover_address_from_msg(message.as_bytes())
            .map(Account::from)
            .map_err(|e| Error::InvalidSignature(format!("recovery failed: {}", e)))
    }
}

impl SignatureAuthenticator for PersonalSignAuthenticator {
    fn authenticate(&self, claimed: &str, message: &str, signature: &str) -> Result<Account> {
        let claimed = Account::parse(claimed)?;
        let recovered = Self::recover(message, signature)?;

        // Account equality is over bytes, so this is case-insensitive
        if recovered != claimed {
            return Err(Error::InvalidSignature(format!(
                "signature was produced by {}, not {}",
                recovered, claimed
            )));
        }

        Ok(claimed)
    }
}
