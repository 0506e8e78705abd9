use proptest::prelude::*;
use std::collections::HashSet;
use xel_crypto::{account_id, keypair_from_secret_phrase};
use xel_ledger::{AccountStore, LedgerConfig};
use xel_mempool::{ChainReader, LedgerContext, Mempool, MempoolConfig, PoolAccess};
use xel_transactions::{Attachment, NoWork, Transaction, TransactionBuilder};
use xel_types::{AccountId, Amount, BlockId, ChainParams, Hash256, LedgerEvent, Timestamp, TransactionId};

const NOW: Timestamp = Timestamp::new(50_000);

struct EmptyChain;

impl ChainReader for EmptyChain {
    fn height(&self) -> u32 {
        0
    }
    fn block_id_at_height(&self, _height: u32) -> Option<BlockId> {
        None
    }
    fn transaction_height(&self, _id: TransactionId) -> Option<u32> {
        None
    }
    fn transaction_by_full_hash(&self, _full_hash: &Hash256) -> Option<(u32, Transaction)> {
        None
    }
}

fn payment(sender: usize, nonce: u32, amount: i64, fee: i64) -> Transaction {
    let keys = keypair_from_secret_phrase(&format!("sender {sender}"));
    TransactionBuilder::new(keys.public, Timestamp::new(NOW.as_secs() - nonce), Attachment::OrdinaryPayment)
        .recipient(AccountId::new(77))
        .amount(Amount::from_xel(amount))
        .fee(Amount::from_xel(fee))
        .sign(&keys.private)
}

fn arb_pool() -> impl Strategy<Value = Vec<(usize, i64, i64)>> {
    prop::collection::vec((0usize..6, 1i64..40, 1i64..20), 0..30)
}

proptest! {
    #[test]
    fn selection_respects_budget(
        specs in arb_pool(),
        max_payload in 0usize..4000,
        max_count in 0usize..25,
    ) {
        let params = ChainParams::testnet();
        let mut accounts = AccountStore::new(params, AccountId::new(1), &LedgerConfig::default());
        for sender in 0..6 {
            let id = account_id(&keypair_from_secret_phrase(&format!("sender {sender}")).public);
            accounts
                .add_to_balance_and_unconfirmed(id, LedgerEvent::OrdinaryPayment, 0, Amount::from_xel(200), Amount::ZERO)
                .unwrap();
        }
        let chain = EmptyChain;
        let mut pool = Mempool::new(MempoolConfig::default());
        {
            let mut access = PoolAccess::new(&mut accounts, &chain, &NoWork);
            for (nonce, (sender, amount, fee)) in specs.iter().enumerate() {
                let _ = pool.submit(payment(*sender, nonce as u32, *amount, *fee), &mut access, NOW);
            }
        }

        let ctx = LedgerContext { accounts: &accounts, chain: &chain, work: &NoWork };
        let selected = pool.select_for_block(&ctx, NOW, max_payload, max_count);

        prop_assert!(selected.len() <= max_count);
        prop_assert!(selected.iter().map(Transaction::size).sum::<usize>() <= max_payload);
        let ids: HashSet<_> = selected.iter().map(Transaction::id).collect();
        prop_assert_eq!(ids.len(), selected.len());
        prop_assert!(selected.iter().all(|tx| pool.contains(tx.id())));
    }

    #[test]
    fn reservations_never_exceed_balance(specs in arb_pool()) {
        let params = ChainParams::testnet();
        let mut accounts = AccountStore::new(params, AccountId::new(1), &LedgerConfig::default());
        let ids: Vec<AccountId> = (0..6)
            .map(|s| account_id(&keypair_from_secret_phrase(&format!("sender {s}")).public))
            .collect();
        for id in &ids {
            accounts
                .add_to_balance_and_unconfirmed(*id, LedgerEvent::OrdinaryPayment, 0, Amount::from_xel(100), Amount::ZERO)
                .unwrap();
        }
        let chain = EmptyChain;
        let mut pool = Mempool::new(MempoolConfig::default());
        {
            let mut access = PoolAccess::new(&mut accounts, &chain, &NoWork);
            for (nonce, (sender, amount, fee)) in specs.iter().enumerate() {
                let _ = pool.submit(payment(*sender, nonce as u32, *amount, *fee), &mut access, NOW);
            }
        }
        for id in &ids {
            let account = accounts.get(*id).unwrap();
            prop_assert!(account.unconfirmed_balance >= Amount::ZERO);
            prop_assert!(account.unconfirmed_balance <= account.balance);
            let reserved: Amount = pool
                .unconfirmed()
                .filter(|e| e.tx.sender_id() == *id)
                .map(|e| e.tx.amount() + e.tx.fee())
                .sum();
            prop_assert_eq!(account.balance - reserved, account.unconfirmed_balance);
        }
    }
}
