//! Nullable peer: serves a scripted chain and records what it is sent.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use xel_ledger::Block;
use xel_node::{ConsensusEngine, Peer, PeerError};
use xel_types::BlockId;

/// A peer whose chain is a fixed list of blocks, genesis first.
pub struct NullPeer {
    address: String,
    chain: Mutex<Vec<Block>>,
    difficulty: Mutex<Option<u128>>,
    unreachable: AtomicBool,
    fail_blocks: AtomicBool,
    corrupt_blocks: AtomicBool,
    delay: Mutex<Option<Duration>>,
    block_requests: AtomicUsize,
    sent_blocks: Mutex<Vec<Vec<u8>>>,
    sent_transactions: Mutex<Vec<Vec<u8>>>,
}

impl NullPeer {
    pub fn new(address: impl Into<String>, chain: Vec<Block>) -> Self {
        Self {
            address: address.into(),
            chain: Mutex::new(chain),
            difficulty: Mutex::new(None),
            unreachable: AtomicBool::new(false),
            fail_blocks: AtomicBool::new(false),
            corrupt_blocks: AtomicBool::new(false),
            delay: Mutex::new(None),
            block_requests: AtomicUsize::new(0),
            sent_blocks: Mutex::new(Vec::new()),
            sent_transactions: Mutex::new(Vec::new()),
        }
    }

    /// A peer serving a copy of `engine`'s current chain.
    pub fn mirror(address: impl Into<String>, engine: &ConsensusEngine) -> Result<Self, xel_node::BlockFault> {
        let chain = (0..=engine.height())
            .map(|h| engine.block_at_height(h))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(address, chain))
    }

    pub fn set_chain(&self, chain: Vec<Block>) {
        *lock(&self.chain) = chain;
    }

    pub fn chain(&self) -> Vec<Block> {
        lock(&self.chain).clone()
    }

    pub fn height(&self) -> u32 {
        lock(&self.chain).last().map(Block::height).unwrap_or(0)
    }

    /// Report this difficulty instead of the chain's.
    pub fn set_cumulative_difficulty(&self, difficulty: Option<u128>) {
        *lock(&self.difficulty) = difficulty;
    }

    /// Fail every request.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Fail block requests only.
    pub fn fail_block_requests(&self, fail: bool) {
        self.fail_blocks.store(fail, Ordering::SeqCst);
    }

    /// Serve truncated block encodings.
    pub fn corrupt_blocks(&self, corrupt: bool) {
        self.corrupt_blocks.store(corrupt, Ordering::SeqCst);
    }

    /// Sleep this long before answering block requests.
    pub fn set_block_delay(&self, delay: Option<Duration>) {
        *lock(&self.delay) = delay;
    }

    pub fn block_requests(&self) -> usize {
        self.block_requests.load(Ordering::SeqCst)
    }

    pub fn received_blocks(&self) -> Vec<Vec<u8>> {
        lock(&self.sent_blocks).clone()
    }

    pub fn received_transactions(&self) -> Vec<Vec<u8>> {
        lock(&self.sent_transactions).clone()
    }

    fn check_reachable(&self) -> Result<(), PeerError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(PeerError::Unreachable(self.address.clone()));
        }
        Ok(())
    }
}

impl Peer for NullPeer {
    fn address(&self) -> &str {
        &self.address
    }

    fn cumulative_difficulty(&self) -> Result<u128, PeerError> {
        self.check_reachable()?;
        if let Some(difficulty) = *lock(&self.difficulty) {
            return Ok(difficulty);
        }
        Ok(lock(&self.chain)
            .last()
            .map(Block::cumulative_difficulty)
            .unwrap_or(0))
    }

    fn next_block_ids(&self, after: BlockId, limit: usize) -> Result<Vec<BlockId>, PeerError> {
        self.check_reachable()?;
        let chain = lock(&self.chain);
        let Some(position) = chain.iter().position(|b| b.id() == after) else {
            return Ok(Vec::new());
        };
        Ok(chain[position + 1..]
            .iter()
            .take(limit)
            .map(Block::id)
            .collect())
    }

    fn blocks(&self, ids: &[BlockId]) -> Result<Vec<Vec<u8>>, PeerError> {
        self.check_reachable()?;
        self.block_requests.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = *lock(&self.delay) {
            std::thread::sleep(delay);
        }
        if self.fail_blocks.load(Ordering::SeqCst) {
            return Err(PeerError::Unreachable(self.address.clone()));
        }
        let corrupt = self.corrupt_blocks.load(Ordering::SeqCst);
        let chain = lock(&self.chain);
        let mut encoded = Vec::with_capacity(ids.len());
        for id in ids {
            let Some(block) = chain.iter().find(|b| b.id() == *id) else {
                break;
            };
            let mut bytes = block.wire_bytes();
            if corrupt {
                bytes.truncate(bytes.len() / 2);
            }
            encoded.push(bytes);
        }
        Ok(encoded)
    }

    fn send_block(&self, block: &[u8]) -> Result<(), PeerError> {
        self.check_reachable()?;
        lock(&self.sent_blocks).push(block.to_vec());
        Ok(())
    }

    fn send_transactions(&self, transactions: &[Vec<u8>]) -> Result<(), PeerError> {
        self.check_reachable()?;
        lock(&self.sent_transactions).extend(transactions.iter().cloned());
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
