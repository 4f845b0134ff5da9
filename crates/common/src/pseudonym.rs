use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Bytes of randomness behind every pseudonym (128 bits)
pub const PSEUDONYM_ENTROPY_BYTES: usize = 16;

/// Opaque identifier disclosed to clients in place of the raw account
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PseudonymId(String);

impl PseudonymId {
    /// Mint a fresh random identifier under the given namespace prefix
    pub fn generate(prefix: &str) -> Self {
        let mut bytes = [0u8; PSEUDONYM_ENTROPY_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(format!("{}{}", prefix, hex::encode(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<PseudonymId> for String {
    fn from(id: PseudonymId) -> Self {
        id.0
    }
}

impl fmt::Display for PseudonymId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
