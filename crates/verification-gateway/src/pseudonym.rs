//! Pseudonym allocation

use ghostpass_common::{Account, PseudonymId};
use std::sync::Arc;

use crate::store::{PseudonymReservation, VerificationStore};

/// Default namespace prefix for minted pseudonyms
pub const DEFAULT_PSEUDONYM_PREFIX: &str = "dark_";

/// Hands out stable anonymous identifiers per account
pub struct PseudonymAllocator {
    store: Arc<VerificationStore>,
    prefix: String,
}

impl PseudonymAllocator {
    pub fn new(store: Arc<VerificationStore>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }

    /// Existing pseudonym of `account`, or a freshly minted reservation
    ///
    /// A fresh pseudonym returns to the pool unless the caller keeps it.
    pub fn allocate(&self, account: &Account) -> PseudonymReservation<'_> {
        if let Some(existing) = self.store.pseudonym_of(account) {
            return PseudonymReservation::bound(existing);
        }

        loop {
            if let Some(reservation) = self
                .store
                .reserve_pseudonym(PseudonymId::generate(&self.prefix))
            {
                return reservation;
            }
        }
    }
}
