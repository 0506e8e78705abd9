//! What the pool reads from the chain.

use xel_ledger::AccountStore;
use xel_transactions::{AccountView, Transaction, ValidationContext, WorkRegistry};
use xel_types::{AccountId, BlockId, ChainParams, Hash256, PublicKey, Timestamp, TransactionId};

/// Most references a transaction chain may follow before it is refused.
const MAX_REFERENCE_DEPTH: u32 = 10;

/// Confirmed chain data up to the current head. Implementations must hide
/// anything stored above [`ChainReader::height`], such as blocks a rescan has
/// not reached yet.
pub trait ChainReader {
    fn height(&self) -> u32;
    fn block_id_at_height(&self, height: u32) -> Option<BlockId>;
    /// Height of the block that confirmed `id`.
    fn transaction_height(&self, id: TransactionId) -> Option<u32>;
    fn transaction_by_full_hash(&self, full_hash: &Hash256) -> Option<(u32, Transaction)>;

    fn has_transaction(&self, id: TransactionId) -> bool {
        self.transaction_height(id).is_some()
    }
}

/// Read-only chain state for transaction validation.
#[derive(Clone, Copy)]
pub struct LedgerContext<'a> {
    pub accounts: &'a AccountStore,
    pub chain: &'a dyn ChainReader,
    pub work: &'a dyn WorkRegistry,
}

impl ValidationContext for LedgerContext<'_> {
    fn params(&self) -> &ChainParams {
        self.accounts.params()
    }

    fn height(&self) -> u32 {
        self.chain.height()
    }

    fn block_id_at_height(&self, height: u32) -> Option<BlockId> {
        self.chain.block_id_at_height(height)
    }

    fn public_key(&self, account: AccountId) -> Option<PublicKey> {
        self.accounts.public_key(account)
    }

    fn account(&self, account: AccountId) -> Option<AccountView> {
        self.accounts.get(account).map(|a| AccountView {
            unconfirmed_balance: a.unconfirmed_balance,
            is_supernode: a.is_supernode(),
        })
    }

    fn genesis_creator(&self) -> AccountId {
        self.accounts.genesis_creator()
    }

    fn work_registry(&self) -> &dyn WorkRegistry {
        self.work
    }
}

/// Mutable access for operations that reserve or release balances.
pub struct PoolAccess<'a> {
    pub accounts: &'a mut AccountStore,
    pub chain: &'a dyn ChainReader,
    pub work: &'a dyn WorkRegistry,
}

impl<'a> PoolAccess<'a> {
    pub fn new(
        accounts: &'a mut AccountStore,
        chain: &'a dyn ChainReader,
        work: &'a dyn WorkRegistry,
    ) -> Self {
        Self {
            accounts,
            chain,
            work,
        }
    }

    pub fn context(&self) -> LedgerContext<'_> {
        LedgerContext {
            accounts: &*self.accounts,
            chain: self.chain,
            work: self.work,
        }
    }
}

/// Whether every transaction `tx` references (transitively) is confirmed
/// below `tx_height`. A chain of references ends at a transaction with no
/// reference that is younger than the referencing window relative to
/// `timestamp`, at most ten links deep.
pub fn has_all_referenced_transactions(
    tx: &Transaction,
    tx_height: u32,
    timestamp: Timestamp,
    chain: &dyn ChainReader,
    params: &ChainParams,
) -> bool {
    let mut current = tx.clone();
    let mut height = tx_height;
    let mut count = 0;
    loop {
        let Some(hash) = current.referenced_full_hash() else {
            return timestamp.diff(current.timestamp())
                < i64::from(params.max_referenced_transaction_timespan_secs)
                && count < MAX_REFERENCE_DEPTH;
        };
        match chain.transaction_by_full_hash(hash) {
            Some((referenced_height, referenced)) if referenced_height < height => {
                current = referenced;
                height = referenced_height;
                count += 1;
            }
            _ => return false,
        }
    }
}
