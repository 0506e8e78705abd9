//! Chain parameters: the consensus constants every node must agree on.
//!
//! Two presets exist. `mainnet()` carries the live network's values;
//! `testnet()` shortens the delays so that leases, deposits and guaranteed
//! balances can be exercised in a handful of blocks.

use crate::amount::Amount;
use crate::ids::AccountId;
use crate::network::NetworkId;
use crate::rules::RuleTable;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChainParams {
    pub network: NetworkId,

    // ── Balances ─────────────────────────────────────────────────────────
    /// Upper bound for any amount or fee, in NQT.
    pub max_balance: Amount,
    /// Effective balance below this amount does not forge.
    pub min_forging_balance: Amount,
    /// Confirmations before a credit counts toward the guaranteed balance.
    pub guaranteed_balance_confirmations: u32,
    /// Extra unconfirmed debit for transactions that reference another one.
    pub unconfirmed_pool_deposit: Amount,

    // ── Blocks ───────────────────────────────────────────────────────────
    pub max_number_of_transactions: usize,
    pub min_transaction_size: usize,
    /// Maximum clock drift tolerated for block and transaction timestamps.
    pub max_timedrift_secs: u32,
    /// Deepest reorganisation handled by pop-off; older forks are dropped.
    pub max_rollback: u32,
    /// Proof-of-work submissions allowed per work id in one block.
    pub max_pows_per_block: u32,
    pub max_referenced_transaction_timespan_secs: u32,

    // ── Forging ──────────────────────────────────────────────────────────
    pub initial_base_target: u64,
    pub min_base_target: u64,
    pub max_base_target: u64,
    pub min_blocktime_limit: u32,
    pub max_blocktime_limit: u32,
    pub base_target_gamma: u64,

    // ── Leasing ──────────────────────────────────────────────────────────
    pub leasing_delay: u32,
    pub min_lease_period: u32,
    pub max_lease_period: u32,

    // ── Account info ─────────────────────────────────────────────────────
    pub max_account_name_length: usize,
    pub max_account_description_length: usize,

    // ── Supernodes ───────────────────────────────────────────────────────
    pub supernode_deposit: Amount,
    pub supernode_deposit_binding_period: u32,
    pub max_supernode_announcement_uris: usize,
    pub max_supernode_announcement_uri_length: usize,
    /// Holds the locked supernode deposits.
    pub deposits_account: AccountId,
    /// Receives deposits forfeited by guard decisions.
    pub forfeited_deposits_account: AccountId,
    pub guard_nodes: Vec<AccountId>,

    // ── Rule changes ─────────────────────────────────────────────────────
    pub rules: RuleTable,
}

impl ChainParams {
    pub fn mainnet() -> Self {
        let max_number_of_transactions = 255;
        let min_transaction_size = 176;
        let initial_base_target = 1_537_228_670;
        Self {
            network: NetworkId::Main,
            max_balance: Amount::from_xel(100_000_000),
            min_forging_balance: Amount::from_xel(1000),
            guaranteed_balance_confirmations: 1440,
            unconfirmed_pool_deposit: Amount::from_xel(100),
            max_number_of_transactions,
            min_transaction_size,
            max_timedrift_secs: 15,
            max_rollback: 720,
            max_pows_per_block: 20,
            max_referenced_transaction_timespan_secs: 60 * 1440 * 60,
            initial_base_target,
            min_base_target: initial_base_target * 9 / 10,
            max_base_target: initial_base_target * 50,
            min_blocktime_limit: 53,
            max_blocktime_limit: 67,
            base_target_gamma: 64,
            leasing_delay: 1440,
            min_lease_period: 1440,
            max_lease_period: u16::MAX as u32,
            max_account_name_length: 100,
            max_account_description_length: 1000,
            supernode_deposit: Amount::from_xel(250_000),
            supernode_deposit_binding_period: 512,
            max_supernode_announcement_uris: 3,
            max_supernode_announcement_uri_length: 255,
            deposits_account: AccountId::new(123_456_789),
            forfeited_deposits_account: AccountId::new(123_456_788),
            guard_nodes: vec![
                AccountId::from_signed(8_473_660_669_446_786_780),
                AccountId::from_signed(-6_336_019_433_117_180_774),
            ],
            rules: RuleTable::mainnet(),
        }
    }

    pub fn testnet() -> Self {
        Self {
            network: NetworkId::Test,
            unconfirmed_pool_deposit: Amount::from_xel(50),
            max_base_target: 100_000_000 * 1_537_228_670,
            supernode_deposit_binding_period: 20,
            ..Self::mainnet()
        }
    }

    pub fn for_network(network: NetworkId) -> Self {
        match network {
            NetworkId::Main => Self::mainnet(),
            NetworkId::Test => Self::testnet(),
        }
    }

    /// Total bytes a block's transactions may occupy.
    pub fn max_payload_length(&self) -> usize {
        self.max_number_of_transactions * self.min_transaction_size
    }

    pub fn is_guard_node(&self, account: AccountId) -> bool {
        self.guard_nodes.contains(&account)
    }
}

impl Default for ChainParams {
    fn default() -> Self {
        Self::mainnet()
    }
}
