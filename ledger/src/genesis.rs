//! Genesis block creation.
//!
//! The genesis block pays the initial allocations out of the creator
//! account. It is fully determined by the creator's secret phrase and the
//! allocation list, so every node configured alike derives the same block.
//! The payments carry timestamp 0, deadline 0 and no fee, and the creator is
//! the one account allowed to go negative.

use serde::{Deserialize, Serialize};
use xel_crypto::keypair_from_secret_phrase;
use xel_transactions::{Attachment, Transaction, TransactionBuilder};
use xel_types::{AccountId, Amount, BlockId, ChainParams, Hash256, KeyPair, Timestamp};

use crate::block::{Block, Draft, GENESIS_BLOCK_VERSION};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisAllocation {
    pub recipient: AccountId,
    /// Amount in NQT.
    pub amount: Amount,
}

/// Configuration for creating a genesis block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisConfig {
    pub creator_secret_phrase: String,
    #[serde(default)]
    pub allocations: Vec<GenesisAllocation>,
}

impl Default for GenesisConfig {
    fn default() -> Self {
        Self {
            creator_secret_phrase: "xel genesis creator".to_string(),
            allocations: Vec::new(),
        }
    }
}

impl GenesisConfig {
    pub fn creator_keys(&self) -> KeyPair {
        keypair_from_secret_phrase(&self.creator_secret_phrase)
    }

    pub fn creator_id(&self) -> AccountId {
        xel_crypto::account_id(&self.creator_keys().public)
    }

    pub fn total_allocated(&self) -> Amount {
        self.allocations.iter().map(|a| a.amount).sum()
    }
}

/// Create the genesis block: height 0, initial base target, zero cumulative
/// difficulty, payments sorted by transaction id.
pub fn create_genesis_block(config: &GenesisConfig, params: &ChainParams) -> Block {
    let creator = config.creator_keys();
    let mut transactions: Vec<Transaction> = config
        .allocations
        .iter()
        .map(|allocation| {
            TransactionBuilder::new(creator.public, Timestamp::EPOCH, Attachment::OrdinaryPayment)
                .deadline(0)
                .recipient(allocation.recipient)
                .amount(allocation.amount)
                .fee(Amount::ZERO)
                .sign(&creator.private)
        })
        .collect();
    transactions.sort_by_key(Transaction::id);

    let draft = Draft {
        version: GENESIS_BLOCK_VERSION,
        timestamp: Timestamp::EPOCH,
        previous_block_id: BlockId::ZERO,
        previous_block_hash: Hash256::ZERO,
        generation_signature: Hash256::ZERO,
        generator_public_key: creator.public,
        transactions,
    };
    let mut block = Block::sign_draft(draft, &creator.private);
    block.set_chain_position(0, params.initial_base_target, 0);
    block
}

/// The genesis block id for a configuration.
pub fn genesis_block_id(config: &GenesisConfig, params: &ChainParams) -> BlockId {
    create_genesis_block(config, params).id()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> GenesisConfig {
        GenesisConfig {
            creator_secret_phrase: "test creator".into(),
            allocations: vec![
                GenesisAllocation {
                    recipient: AccountId::new(10),
                    amount: Amount::from_xel(5000),
                },
                GenesisAllocation {
                    recipient: AccountId::new(20),
                    amount: Amount::from_xel(7000),
                },
                GenesisAllocation {
                    recipient: AccountId::new(30),
                    amount: Amount::from_xel(1),
                },
            ],
        }
    }

    #[test]
    fn genesis_is_deterministic() {
        let params = ChainParams::testnet();
        assert_eq!(
            genesis_block_id(&config(), &params),
            genesis_block_id(&config(), &params)
        );
        let other = GenesisConfig {
            creator_secret_phrase: "someone else".into(),
            ..config()
        };
        assert_ne!(genesis_block_id(&other, &params), genesis_block_id(&config(), &params));
    }

    #[test]
    fn genesis_shape() {
        let params = ChainParams::testnet();
        let block = create_genesis_block(&config(), &params);
        assert_eq!(block.height(), 0);
        assert_eq!(block.version(), GENESIS_BLOCK_VERSION);
        assert!(block.previous_block_id().is_zero());
        assert_eq!(block.base_target(), params.initial_base_target);
        assert_eq!(block.cumulative_difficulty(), 0);
        assert_eq!(block.total_amount(), config().total_allocated());
        assert!(block.total_fee().is_zero());
        assert_eq!(block.generator_id(), config().creator_id());
        assert!(block.verify_block_signature());

        let ids: Vec<_> = block.transactions().iter().map(Transaction::id).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
        for tx in block.transactions() {
            assert_eq!(tx.timestamp(), Timestamp::EPOCH);
            assert_eq!(tx.deadline(), 0);
            assert!(tx.verify_signature());
        }
    }

    #[test]
    fn empty_allocation_list_is_allowed() {
        let config = GenesisConfig::default();
        let block = create_genesis_block(&config, &ChainParams::testnet());
        assert!(block.transactions().is_empty());
        assert!(block.total_amount().is_zero());
    }
}
