//! Balance effects of transactions and blocks.

use tracing::trace;
use xel_transactions::{Attachment, Transaction};
use xel_types::{Amount, LedgerEvent, Timestamp};

use crate::accounts::AccountStore;
use crate::block::Block;
use crate::error::LedgerError;

impl AccountStore {
    /// Fee plus the pool deposit held while a referenced transaction is
    /// unconfirmed.
    fn unconfirmed_fee(&self, tx: &Transaction) -> Amount {
        if tx.referenced_full_hash().is_some() {
            tx.fee() + self.params().unconfirmed_pool_deposit
        } else {
            tx.fee()
        }
    }

    /// Reserve amount and fee from the sender's unconfirmed balance.
    /// `Ok(false)` when the sender cannot cover it.
    pub fn apply_unconfirmed(&mut self, tx: &Transaction) -> Result<bool, LedgerError> {
        let sender = tx.sender_id();
        let fee = self.unconfirmed_fee(tx);
        let total = tx.amount() + fee;
        let genesis_payment =
            tx.timestamp() == Timestamp::EPOCH && sender == self.genesis_creator();
        let available = self
            .get(sender)
            .map(|a| a.unconfirmed_balance)
            .unwrap_or_default();
        if !genesis_payment && available < total {
            trace!(tx = %tx.id(), %sender, %available, %total, "insufficient unconfirmed balance");
            return Ok(false);
        }
        let event = tx.transaction_type().ledger_event();
        self.add_to_unconfirmed(sender, event, tx.id().raw(), -tx.amount(), -fee)?;
        Ok(true)
    }

    pub fn undo_unconfirmed(&mut self, tx: &Transaction) -> Result<(), LedgerError> {
        let fee = self.unconfirmed_fee(tx);
        let event = tx.transaction_type().ledger_event();
        self.add_to_unconfirmed(tx.sender_id(), event, tx.id().raw(), tx.amount(), fee)
    }

    /// Confirmed effects of `tx`; its unconfirmed reservation must already
    /// be in place.
    pub fn apply_transaction(&mut self, tx: &Transaction) -> Result<(), LedgerError> {
        let sender = tx.sender_id();
        let event = tx.transaction_type().ledger_event();
        let event_id = tx.id().raw();
        self.apply_public_key(sender, tx.sender_public_key())?;
        if tx.referenced_full_hash().is_some() {
            let deposit = self.params().unconfirmed_pool_deposit;
            self.add_to_unconfirmed(sender, event, event_id, Amount::ZERO, deposit)?;
        }
        self.add_to_balance(sender, event, event_id, -tx.amount(), -tx.fee())?;
        if !tx.recipient().is_zero() && !tx.amount().is_zero() {
            self.add_to_balance_and_unconfirmed(
                tx.recipient(),
                event,
                event_id,
                tx.amount(),
                Amount::ZERO,
            )?;
        }

        match tx.attachment() {
            Attachment::OrdinaryPayment | Attachment::ProofOfWork(_) => {}
            Attachment::SupernodeAnnouncement(announcement) => {
                if announcement.guard_target.is_zero() {
                    self.refresh_supernode_deposit(sender, announcement.uris.clone())?;
                } else {
                    self.forfeit_supernode_deposit(announcement.guard_target)?;
                }
            }
            Attachment::AccountInfo(info) => {
                self.set_account_info(sender, info.name.clone(), info.description.clone());
            }
            Attachment::EffectiveBalanceLeasing(lease) => {
                self.schedule_lease(sender, tx.recipient(), u32::from(lease.period));
            }
        }
        Ok(())
    }

    /// Bind the generator's key and pay it the block's fees.
    pub fn apply_block_reward(&mut self, block: &Block) -> Result<(), LedgerError> {
        let generator = block.generator_id();
        self.apply_public_key(generator, block.generator_public_key())?;
        self.add_to_balance_and_unconfirmed(
            generator,
            LedgerEvent::BlockGenerated,
            block.id().raw(),
            block.total_fee(),
            Amount::ZERO,
        )?;
        self.add_to_forged(generator, block.total_fee())
    }
}

#[cfg(test)]
mod tests {
    use crate::audit::LedgerConfig;
    use crate::AccountStore;
    use xel_crypto::{account_id, keypair_from_secret_phrase};
    use xel_transactions::{
        Attachment, EffectiveBalanceLeasing, Transaction, TransactionBuilder,
    };
    use xel_types::{AccountId, Amount, ChainParams, Hash256, LedgerEvent, Timestamp};

    fn xel(n: i64) -> Amount {
        Amount::from_xel(n)
    }

    fn store_with(owner: AccountId, balance: Amount) -> AccountStore {
        let mut s = AccountStore::new(ChainParams::testnet(), AccountId::new(1), &LedgerConfig::default());
        s.add_to_balance_and_unconfirmed(owner, LedgerEvent::OrdinaryPayment, 0, balance, Amount::ZERO)
            .unwrap();
        s
    }

    fn pay(secret: &str, to: AccountId, amount: i64) -> Transaction {
        let keys = keypair_from_secret_phrase(secret);
        TransactionBuilder::new(keys.public, Timestamp::new(10), Attachment::OrdinaryPayment)
            .recipient(to)
            .amount(xel(amount))
            .fee(xel(1))
            .sign(&keys.private)
    }

    #[test]
    fn payment_reserves_then_confirms() {
        let alice = account_id(&keypair_from_secret_phrase("alice").public);
        let bob = AccountId::new(42);
        let mut s = store_with(alice, xel(100));

        let tx = pay("alice", bob, 60);
        assert!(s.apply_unconfirmed(&tx).unwrap());
        assert_eq!(s.get(alice).unwrap().unconfirmed_balance, xel(39));

        s.apply_transaction(&tx).unwrap();
        let a = s.get(alice).unwrap();
        assert_eq!((a.balance, a.unconfirmed_balance), (xel(39), xel(39)));
        let b = s.get(bob).unwrap();
        assert_eq!((b.balance, b.unconfirmed_balance), (xel(60), xel(60)));
        assert!(s.public_key(alice).is_some());
    }

    #[test]
    fn second_conflicting_spend_is_refused() {
        let alice = account_id(&keypair_from_secret_phrase("alice").public);
        let mut s = store_with(alice, xel(100));
        assert!(s.apply_unconfirmed(&pay("alice", AccountId::new(5), 80)).unwrap());
        assert!(!s.apply_unconfirmed(&pay("alice", AccountId::new(6), 80)).unwrap());
        assert_eq!(s.get(alice).unwrap().unconfirmed_balance, xel(19));
    }

    #[test]
    fn undo_restores_reservation() {
        let alice = account_id(&keypair_from_secret_phrase("alice").public);
        let mut s = store_with(alice, xel(100));
        let tx = pay("alice", AccountId::new(5), 10);
        s.apply_unconfirmed(&tx).unwrap();
        s.undo_unconfirmed(&tx).unwrap();
        assert_eq!(s.get(alice).unwrap().unconfirmed_balance, xel(100));
    }

    #[test]
    fn referenced_transaction_holds_pool_deposit_until_confirmed() {
        let keys = keypair_from_secret_phrase("alice");
        let alice = account_id(&keys.public);
        let mut s = store_with(alice, xel(1000));
        let deposit = s.params().unconfirmed_pool_deposit;
        let tx = TransactionBuilder::new(keys.public, Timestamp::new(10), Attachment::OrdinaryPayment)
            .recipient(AccountId::new(9))
            .amount(xel(10))
            .fee(xel(2))
            .referenced_full_hash(Hash256::new([3; 32]))
            .sign(&keys.private);

        s.apply_unconfirmed(&tx).unwrap();
        assert_eq!(s.get(alice).unwrap().unconfirmed_balance, xel(988) - deposit);
        s.apply_transaction(&tx).unwrap();
        let a = s.get(alice).unwrap();
        assert_eq!(a.balance, xel(988));
        assert_eq!(a.unconfirmed_balance, xel(988));
    }

    #[test]
    fn lease_transaction_schedules_lease() {
        let keys = keypair_from_secret_phrase("alice");
        let alice = account_id(&keys.public);
        let mut s = store_with(alice, xel(1000));
        let lessee = AccountId::new(77);
        let tx = TransactionBuilder::new(
            keys.public,
            Timestamp::new(10),
            Attachment::EffectiveBalanceLeasing(EffectiveBalanceLeasing { period: 1440 }),
        )
        .recipient(lessee)
        .fee(xel(1))
        .sign(&keys.private);
        s.apply_unconfirmed(&tx).unwrap();
        s.apply_transaction(&tx).unwrap();
        assert_eq!(s.lease(alice).unwrap().current.lessee, lessee);
        assert!(s.get(lessee).is_none());
    }
}
