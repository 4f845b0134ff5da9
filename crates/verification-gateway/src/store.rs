//! Process-lifetime verification state
//!
//! Data model:
//! - records: account → VerificationRecord (never removed)
//! - pending: account → PendingTransaction (at most one per account)
//! - issued: every pseudonym bound to a record or reserved by an in-flight verify
//!
//! All maps are sharded per key, so unrelated accounts never contend on a
//! single lock. Nothing here survives a restart; `snapshot` is the hook a
//! persistent backend would drain.

use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use ghostpass_common::{
    Account, Error, PendingTransaction, PseudonymId, Result, TxKind, TxReceipt,
    VerificationRecord,
};
use tracing::debug;

/// Shared verification state
#[derive(Debug, Default)]
pub struct VerificationStore {
    records: DashMap<Account, VerificationRecord>,
    pending: DashMap<Account, PendingTransaction>,
    issued: DashSet<PseudonymId>,
}

impl VerificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the pending slot for `account`
    ///
    /// The returned guard releases the slot when dropped, whichever way the
    /// operation ends.
    pub fn begin(&self, account: Account, kind: TxKind) -> Result<PendingGuard<'_>> {
        match self.pending.entry(account) {
            Entry::Occupied(existing) => Err(Error::AlreadyPending {
                account: account.to_string(),
                kind: existing.get().kind,
            }),
            Entry::Vacant(slot) => {
                slot.insert(PendingTransaction::new(account, kind));
                debug!("Pending {} marked for {}", kind, account);
                Ok(PendingGuard {
                    pending: &self.pending,
                    account,
                })
            }
        }
    }

    /// The in-flight transaction for `account`, if any
    pub fn pending(&self, account: &Account) -> Option<PendingTransaction> {
        self.pending.get(account).map(|p| p.value().clone())
    }

    pub fn record(&self, account: &Account) -> Option<VerificationRecord> {
        self.records.get(account).map(|r| r.value().clone())
    }

    /// Pseudonym already bound to `account`
    pub fn pseudonym_of(&self, account: &Account) -> Option<PseudonymId> {
        self.records.get(account).map(|r| r.pseudonym_id.clone())
    }

    /// Reserve a fresh pseudonym; `None` if it was issued before
    ///
    /// The reservation is given back when dropped unless `keep` is called
    /// once the verify that minted it has committed.
    pub fn reserve_pseudonym(&self, id: PseudonymId) -> Option<PseudonymReservation<'_>> {
        if !self.issued.insert(id.clone()) {
            return None;
        }
        Some(PseudonymReservation {
            issued: Some(&self.issued),
            id,
        })
    }

    pub fn issued_count(&self) -> usize {
        self.issued.len()
    }

    /// Apply a confirmed transaction to the local record
    ///
    /// Verify creates the record if needed. Revoke only updates an existing
    /// record; without one there is no pseudonym binding to keep.
    pub fn commit(
        &self,
        account: Account,
        kind: TxKind,
        pseudonym: Option<PseudonymId>,
        receipt: &TxReceipt,
    ) -> Option<VerificationRecord> {
        match self.records.entry(account) {
            Entry::Occupied(mut existing) => {
                existing.get_mut().apply(kind, receipt);
                Some(existing.get().clone())
            }
            Entry::Vacant(slot) => {
                let pseudonym = match (kind, pseudonym) {
                    (TxKind::Verify, Some(pseudonym)) => pseudonym,
                    _ => return None,
                };
                let mut record = VerificationRecord::new(account, pseudonym);
                record.apply(kind, receipt);
                Some(slot.insert(record).value().clone())
            }
        }
    }

    /// Every record currently held
    pub fn snapshot(&self) -> Vec<VerificationRecord> {
        self.records.iter().map(|r| r.value().clone()).collect()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

/// Ownership of an account's pending slot
#[derive(Debug)]
pub struct PendingGuard<'a> {
    pending: &'a DashMap<Account, PendingTransaction>,
    account: Account,
}

impl PendingGuard<'_> {
    /// Record the submitted transaction hash on the pending entry
    pub fn attach_tx(&self, hash: &str) {
        if let Some(mut entry) = self.pending.get_mut(&self.account) {
            entry.tx_hash = Some(hash.to_string());
        }
    }

    pub fn account(&self) -> Account {
        self.account
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending.remove(&self.account);
        debug!("Pending slot released for {}", self.account);
    }
}

/// A pseudonym held for a verify that has not committed yet
#[derive(Debug)]
pub struct PseudonymReservation<'a> {
    issued: Option<&'a DashSet<PseudonymId>>,
    id: PseudonymId,
}

impl PseudonymReservation<'_> {
    /// A pseudonym already bound to a record; nothing to give back
    pub fn bound(id: PseudonymId) -> Self {
        Self { issued: None, id }
    }

    pub fn id(&self) -> &PseudonymId {
        &self.id
    }

    /// Make the reservation permanent
    pub fn keep(mut self) -> PseudonymId {
        self.issued = None;
        self.id.clone()
    }
}

impl Drop for PseudonymReservation<'_> {
    fn drop(&mut self) {
        if let Some(issued) = self.issued {
            issued.remove(&self.id);
            debug!("Pseudonym reservation {} released", self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(byte: u8) -> Account {
        Account::parse(&format!("0x{}", hex::encode([byte; 20]))).unwrap()
    }

    fn receipt(hash: &str) -> TxReceipt {
        TxReceipt {
            tx_hash: hash.to_string(),
            success: true,
            block_number: Some(1),
        }
    }

    #[test]
    fn test_one_pending_per_account() {
        let store = VerificationStore::new();
        let alice = account(1);

        let guard = store.begin(alice, TxKind::Verify).unwrap();
        let err = store.begin(alice, TxKind::Revoke).unwrap_err();
        assert!(matches!(
            err,
            Error::AlreadyPending {
                kind: TxKind::Verify,
                ..
            }
        ));

        drop(guard);
        assert!(store.pending(&alice).is_none());
        assert!(store.begin(alice, TxKind::Revoke).is_ok());
    }

    #[test]
    fn test_accounts_do_not_block_each_other() {
        let store = VerificationStore::new();
        let _a = store.begin(account(1), TxKind::Verify).unwrap();
        let _b = store.begin(account(2), TxKind::Verify).unwrap();
        assert_eq!(store.pending_count(), 2);
    }

    #[test]
    fn test_attach_tx_is_visible() {
        let store = VerificationStore::new();
        let alice = account(1);
        let guard = store.begin(alice, TxKind::Verify).unwrap();

        guard.attach_tx("0xfeed");
        let pending = store.pending(&alice).unwrap();
        assert_eq!(pending.tx_hash.as_deref(), Some("0xfeed"));
        assert_eq!(pending.kind, TxKind::Verify);
    }

    #[test]
    fn test_commit_verify_then_revoke() {
        let store = VerificationStore::new();
        let alice = account(1);
        let pseudonym = PseudonymId::generate("dark_");

        let record = store
            .commit(alice, TxKind::Verify, Some(pseudonym.clone()), &receipt("0x01"))
            .unwrap();
        assert!(record.verified);
        assert_eq!(store.pseudonym_of(&alice), Some(pseudonym.clone()));

        let record = store
            .commit(alice, TxKind::Revoke, None, &receipt("0x02"))
            .unwrap();
        assert!(!record.verified);
        assert_eq!(record.pseudonym_id, pseudonym);
        assert_eq!(store.snapshot().len(), 1);
    }

    #[test]
    fn test_revoke_without_record_creates_nothing() {
        let store = VerificationStore::new();
        assert!(store
            .commit(account(3), TxKind::Revoke, None, &receipt("0x03"))
            .is_none());
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn test_pseudonym_reservation() {
        let store = VerificationStore::new();
        let id = PseudonymId::generate("dark_");

        let reservation = store.reserve_pseudonym(id.clone()).unwrap();
        assert!(store.reserve_pseudonym(id.clone()).is_none());

        assert_eq!(reservation.keep(), id);
        assert!(store.reserve_pseudonym(id).is_none());
        assert_eq!(store.issued_count(), 1);
    }

    #[test]
    fn test_dropped_reservation_is_given_back() {
        let store = VerificationStore::new();
        let id = PseudonymId::generate("dark_");

        drop(store.reserve_pseudonym(id.clone()).unwrap());
        assert_eq!(store.issued_count(), 0);
        assert!(store.reserve_pseudonym(id).is_some());
    }

    #[test]
    fn test_bound_reservation_releases_nothing() {
        let store = VerificationStore::new();
        let id = PseudonymId::generate("dark_");
        let _kept = store.reserve_pseudonym(id.clone()).unwrap().keep();

        drop(PseudonymReservation::bound(id.clone()));
        assert!(store.reserve_pseudonym(id).is_none());
    }
}
