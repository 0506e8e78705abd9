//! Per-block and per-pool duplicate bookkeeping.
//!
//! Some transaction types may appear only once (or a bounded number of
//! times) per key within a block or within the unconfirmed pool. A
//! `DuplicateTracker` is filled while a block is validated or assembled, and
//! lives alongside the pool for unconfirmed duplicates.

use crate::attachment::Attachment;
use crate::transaction::Transaction;
use crate::types::TransactionType;
use std::collections::HashMap;
use xel_types::{AccountId, Hash256};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DuplicateKey {
    Sender(AccountId),
    Solution(Hash256),
    Work(u64),
}

#[derive(Debug, Default, Clone)]
pub struct DuplicateTracker {
    counts: HashMap<(TransactionType, DuplicateKey), u32>,
}

impl DuplicateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one occurrence of `key` and reports whether it was one too
    /// many. `max_count == 0` marks the key exclusive: the first claim wins
    /// and every later claim, exclusive or not, is a duplicate.
    pub fn is_duplicate(&mut self, ty: TransactionType, key: DuplicateKey, max_count: u32) -> bool {
        match self.counts.get_mut(&(ty, key)) {
            None => {
                self.counts
                    .insert((ty, key), if max_count > 0 { 1 } else { 0 });
                false
            }
            Some(0) => true,
            Some(count) if *count < max_count => {
                *count += 1;
                false
            }
            Some(_) => true,
        }
    }

    pub fn is_exclusive_duplicate(&mut self, ty: TransactionType, key: DuplicateKey) -> bool {
        self.is_duplicate(ty, key, 0)
    }

    pub fn clear(&mut self) {
        self.counts.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

/// Block-level duplicate rule for `tx`. Registers the transaction's keys.
pub fn is_block_duplicate(
    tx: &Transaction,
    tracker: &mut DuplicateTracker,
    max_pows_per_block: u32,
) -> bool {
    let ty = tx.transaction_type();
    match tx.attachment() {
        Attachment::SupernodeAnnouncement(_) | Attachment::AccountInfo(_) => {
            tracker.is_exclusive_duplicate(ty, DuplicateKey::Sender(tx.sender_id()))
        }
        Attachment::ProofOfWork(pow) => {
            let hash = pow.solution_hash(tx.sender_public_key());
            tracker.is_exclusive_duplicate(ty, DuplicateKey::Solution(hash))
                || tracker.is_duplicate(ty, DuplicateKey::Work(pow.work_id), max_pows_per_block)
        }
        Attachment::OrdinaryPayment | Attachment::EffectiveBalanceLeasing(_) => false,
    }
}

/// Pool-level duplicate rule for `tx`. `remaining_submissions` is the number
/// of submissions the work can still pay for, `None` once it is closed.
pub fn is_unconfirmed_duplicate(
    tx: &Transaction,
    tracker: &mut DuplicateTracker,
    remaining_submissions: impl FnOnce(u64) -> Option<u64>,
    max_pows_per_block: u32,
) -> bool {
    let ty = tx.transaction_type();
    match tx.attachment() {
        Attachment::SupernodeAnnouncement(_) => {
            tracker.is_exclusive_duplicate(ty, DuplicateKey::Sender(tx.sender_id()))
        }
        Attachment::ProofOfWork(pow) => {
            let hash = pow.solution_hash(tx.sender_public_key());
            if tracker.is_exclusive_duplicate(ty, DuplicateKey::Solution(hash)) {
                return true;
            }
            let Some(remaining) = remaining_submissions(pow.work_id) else {
                return true;
            };
            let left = remaining.min(u64::from(max_pows_per_block)) as u32;
            left == 0 || tracker.is_duplicate(ty, DuplicateKey::Work(pow.work_id), left)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attachment::{ProofOfWork, SupernodeAnnouncement};
    use crate::transaction::TransactionBuilder;
    use xel_crypto::keypair_from_secret_phrase;
    use xel_types::Timestamp;

    const TY: TransactionType = TransactionType::ProofOfWork;

    fn pow(phrase: &str, work_id: u64, seed: u8) -> Transaction {
        let kp = keypair_from_secret_phrase(phrase);
        TransactionBuilder::new(
            kp.public,
            Timestamp::new(1),
            Attachment::ProofOfWork(ProofOfWork {
                work_id,
                multiplicator: [seed; 32],
            }),
        )
        .deadline(3)
        .sign(&kp.private)
    }

    #[test]
    fn exclusive_key_admits_exactly_one() {
        let mut t = DuplicateTracker::new();
        let key = DuplicateKey::Sender(AccountId::new(1));
        assert!(!t.is_exclusive_duplicate(TY, key));
        assert!(t.is_exclusive_duplicate(TY, key));
        assert!(t.is_duplicate(TY, key, 10));
    }

    #[test]
    fn bounded_key_counts_up_to_max() {
        let mut t = DuplicateTracker::new();
        let key = DuplicateKey::Work(5);
        assert!(!t.is_duplicate(TY, key, 2));
        assert!(!t.is_duplicate(TY, key, 2));
        assert!(t.is_duplicate(TY, key, 2));
    }

    #[test]
    fn keys_are_scoped_by_type() {
        let mut t = DuplicateTracker::new();
        let key = DuplicateKey::Sender(AccountId::new(1));
        assert!(!t.is_exclusive_duplicate(TransactionType::AccountInfo, key));
        assert!(!t.is_exclusive_duplicate(TransactionType::SupernodeAnnouncement, key));
    }

    #[test]
    fn one_announcement_per_sender() {
        let kp = keypair_from_secret_phrase("sn");
        let announce = |uri: &str| {
            TransactionBuilder::new(
                kp.public,
                Timestamp::new(1),
                Attachment::SupernodeAnnouncement(SupernodeAnnouncement {
                    uris: vec![uri.into()],
                    guard_target: AccountId::ZERO,
                }),
            )
            .sign(&kp.private)
        };
        let mut t = DuplicateTracker::new();
        assert!(!is_block_duplicate(&announce("1.1.1.1"), &mut t, 20));
        assert!(is_block_duplicate(&announce("2.2.2.2"), &mut t, 20));
    }

    #[test]
    fn pow_block_cap_per_work() {
        let mut t = DuplicateTracker::new();
        assert!(!is_block_duplicate(&pow("a", 1, 1), &mut t, 2));
        assert!(!is_block_duplicate(&pow("a", 1, 2), &mut t, 2));
        assert!(is_block_duplicate(&pow("a", 1, 3), &mut t, 2));
        assert!(!is_block_duplicate(&pow("a", 2, 3), &mut t, 2));
    }

    #[test]
    fn same_solution_is_duplicate() {
        let mut t = DuplicateTracker::new();
        assert!(!is_block_duplicate(&pow("a", 1, 1), &mut t, 20));
        assert!(is_block_duplicate(&pow("a", 1, 1), &mut t, 20));
    }

    #[test]
    fn pool_pow_bounded_by_remaining_fund() {
        let mut t = DuplicateTracker::new();
        let remaining = |_| Some(1);
        assert!(!is_unconfirmed_duplicate(&pow("a", 1, 1), &mut t, remaining, 20));
        assert!(is_unconfirmed_duplicate(&pow("a", 1, 2), &mut t, remaining, 20));
    }

    #[test]
    fn pool_pow_for_closed_work_is_duplicate() {
        let mut t = DuplicateTracker::new();
        assert!(is_unconfirmed_duplicate(&pow("a", 1, 1), &mut t, |_| None, 20));
        assert!(is_unconfirmed_duplicate(&pow("a", 2, 1), &mut t, |_| Some(0), 20));
    }
}
