//! The peer interface the node consumes, and the set of known peers.
//!
//! Networking itself lives elsewhere; an implementation of [`Peer`] wraps a
//! connection and enforces its own request timeout.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, warn};
use xel_ledger::Block;
use xel_transactions::Transaction;
use xel_types::BlockId;

use crate::error::PeerError;

pub trait Peer: Send + Sync {
    fn address(&self) -> &str;

    fn cumulative_difficulty(&self) -> Result<u128, PeerError>;

    /// Ids of the blocks following `after` on the peer's chain, at most
    /// `limit`. Empty when the peer does not know `after`.
    fn next_block_ids(&self, after: BlockId, limit: usize) -> Result<Vec<BlockId>, PeerError>;

    /// Wire encodings of the requested blocks, in request order. A peer may
    /// return fewer than asked for.
    fn blocks(&self, ids: &[BlockId]) -> Result<Vec<Vec<u8>>, PeerError>;

    fn send_block(&self, block: &[u8]) -> Result<(), PeerError>;

    fn send_transactions(&self, transactions: &[Vec<u8>]) -> Result<(), PeerError>;
}

/// Known peers plus the blacklist. Blacklisted peers are skipped by
/// [`PeerSet::active`] and receive no broadcasts.
#[derive(Default)]
pub struct PeerSet {
    peers: RwLock<Vec<Arc<dyn Peer>>>,
    blacklist: RwLock<HashMap<String, String>>,
}

impl PeerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, peer: Arc<dyn Peer>) {
        self.peers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(peer);
    }

    pub fn active(&self) -> Vec<Arc<dyn Peer>> {
        let blacklist = self.blacklist.read().unwrap_or_else(PoisonError::into_inner);
        self.peers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|p| !blacklist.contains_key(p.address()))
            .cloned()
            .collect()
    }

    pub fn blacklist(&self, address: &str, reason: impl Into<String>) {
        let reason = reason.into();
        warn!(peer = %address, %reason, "peer blacklisted");
        self.blacklist
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(address.to_string(), reason);
    }

    pub fn is_blacklisted(&self, address: &str) -> bool {
        self.blacklist
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(address)
    }

    pub fn blacklist_reason(&self, address: &str) -> Option<String> {
        self.blacklist
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(address)
            .cloned()
    }

    pub fn unblacklist(&self, address: &str) {
        self.blacklist
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(address);
    }

    pub fn broadcast_block(&self, block: &Block) {
        let bytes = block.wire_bytes();
        for peer in self.active() {
            if let Err(e) = peer.send_block(&bytes) {
                debug!(peer = %peer.address(), block = %block.id(), error = %e, "block broadcast failed");
            }
        }
    }

    pub fn broadcast_transactions(&self, transactions: &[Transaction]) {
        if transactions.is_empty() {
            return;
        }
        let encoded: Vec<Vec<u8>> = transactions.iter().map(Transaction::bytes).collect();
        for peer in self.active() {
            if let Err(e) = peer.send_transactions(&encoded) {
                debug!(peer = %peer.address(), error = %e, "transaction broadcast failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recorder {
        address: String,
        blocks: Mutex<usize>,
    }

    impl Peer for Recorder {
        fn address(&self) -> &str {
            &self.address
        }
        fn cumulative_difficulty(&self) -> Result<u128, PeerError> {
            Ok(0)
        }
        fn next_block_ids(&self, _after: BlockId, _limit: usize) -> Result<Vec<BlockId>, PeerError> {
            Ok(Vec::new())
        }
        fn blocks(&self, _ids: &[BlockId]) -> Result<Vec<Vec<u8>>, PeerError> {
            Ok(Vec::new())
        }
        fn send_block(&self, _block: &[u8]) -> Result<(), PeerError> {
            *self.blocks.lock().unwrap() += 1;
            Ok(())
        }
        fn send_transactions(&self, _transactions: &[Vec<u8>]) -> Result<(), PeerError> {
            Ok(())
        }
    }

    fn recorder(address: &str) -> Arc<Recorder> {
        Arc::new(Recorder {
            address: address.to_string(),
            blocks: Mutex::new(0),
        })
    }

    #[test]
    fn blacklisted_peers_are_skipped() {
        let set = PeerSet::new();
        let a = recorder("a");
        let b = recorder("b");
        set.add(a.clone());
        set.add(b.clone());
        set.blacklist("a", "sent garbage");
        assert!(set.is_blacklisted("a"));
        assert_eq!(set.blacklist_reason("a").as_deref(), Some("sent garbage"));
        let active: Vec<String> = set.active().iter().map(|p| p.address().to_string()).collect();
        assert_eq!(active, vec!["b".to_string()]);

        let genesis = xel_ledger::create_genesis_block(
            &xel_ledger::GenesisConfig::default(),
            &xel_types::ChainParams::testnet(),
        );
        set.broadcast_block(&genesis);
        assert_eq!(*a.blocks.lock().unwrap(), 0);
        assert_eq!(*b.blocks.lock().unwrap(), 1);

        set.unblacklist("a");
        assert_eq!(set.active().len(), 2);
    }
}
