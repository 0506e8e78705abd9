//! Rolling the head back and switching to a better fork.

use tracing::{debug, error, info, warn};
use xel_ledger::Block;
use xel_store::DerivedTable;
use xel_transactions::Transaction;

use crate::chain::ChainState;
use crate::chain_event::ChainEvent;
use crate::engine::ConsensusEngine;
use crate::error::{BlockFault, NodeError};
use crate::tracing_spans;

/// What a fork switch ended with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ForkOutcome {
    pub common_height: u32,
    /// Fork blocks that stayed on the chain; zero when the local chain was
    /// restored.
    pub pushed: usize,
    pub height: u32,
}

impl ConsensusEngine {
    /// Roll the chain back to `height`. Transactions of the removed blocks
    /// go back to the mempool. Height 0 is a full reset.
    pub fn pop_off_to(&self, height: u32) -> Result<Vec<Block>, NodeError> {
        let _update = self.chain.update();
        let mut guard = self.chain.write();
        let state = &mut *guard;
        if height == 0 {
            return self.full_reset_locked(state);
        }
        if height >= state.last.height() {
            return Ok(Vec::new());
        }
        let common = self.load_block_at(height)?;
        let popped = self.pop_off_to_locked(state, &common)?;
        let now = self.clock.now();
        state.mempool.process_later(
            popped.iter().flat_map(|b| b.transactions().iter().cloned()),
            state.last.height(),
            now,
        );
        self.process_waiting_locked(state, now)?;
        Ok(popped)
    }

    /// Pop blocks until `common` is the head. Returns the popped blocks,
    /// head first. Pending transactions are requeued before anything is
    /// popped, so their reservations are released against the old state.
    pub(crate) fn pop_off_to_locked(
        &self,
        state: &mut ChainState,
        common: &Block,
    ) -> Result<Vec<Block>, BlockFault> {
        if common.height() < self.min_rollback_height_of(state) {
            return self.pop_off_with_rescan(state, common);
        }
        let _span = tracing_spans::pop_off_span(state.last.height(), common.height()).entered();
        state.mempool.requeue_all(&mut state.accounts)?;

        let head = state.last.clone();
        let mut popped = Vec::new();
        let mut cursor = head.clone();
        while cursor.id() != common.id() && cursor.height() > 0 {
            let previous = self.load_block_at(cursor.height() - 1)?;
            popped.push(cursor);
            cursor = previous;
        }
        if cursor.id() != common.id() {
            return Err(BlockFault::not_accepted(format!(
                "block {} is not on the current chain",
                common.id()
            )));
        }
        if popped.is_empty() {
            return Ok(popped);
        }

        state.accounts.begin();
        let unit = state
            .accounts
            .rollback(common.height())
            .and_then(|()| self.store.delete_blocks_from(common.height() + 1));
        if let Err(e) = unit {
            state.accounts.abort();
            return Err(e.into());
        }
        state.accounts.commit();
        state.accounts.set_height(common.height());
        state.last = cursor;

        for block in &popped {
            self.events.emit(ChainEvent::BlockPopped(block));
        }
        debug!(
            from = head.height(),
            to = common.height(),
            popped = popped.len(),
            "blocks popped"
        );
        self.flush_pool_events(&mut state.mempool);
        Ok(popped)
    }

    /// Pop below the trimmed horizon: the versions needed for a rollback
    /// are gone, so the derived state is rebuilt from genesis.
    fn pop_off_with_rescan(
        &self,
        state: &mut ChainState,
        common: &Block,
    ) -> Result<Vec<Block>, BlockFault> {
        warn!(
            height = common.height(),
            min_rollback_height = self.min_rollback_height_of(state),
            "popping below the trimmed horizon, rescanning"
        );
        let mut popped = Vec::new();
        for height in (common.height() + 1..=state.last.height()).rev() {
            popped.push(self.load_block_at(height)?);
        }
        state.mempool.requeue_all(&mut state.accounts)?;
        self.store.delete_blocks_from(common.height() + 1)?;
        self.scan_locked(state, 0, false).map_err(|e| match e {
            NodeError::Block(fault) => fault,
            NodeError::Ledger(e) => BlockFault::Invariant(e),
            NodeError::Store(e) => BlockFault::Storage(e),
            other => BlockFault::not_accepted(other.to_string()),
        })?;
        for block in &popped {
            self.events.emit(ChainEvent::BlockPopped(block));
        }
        Ok(popped)
    }

    /// Drop every block but a fresh genesis and rebuild from scratch.
    pub fn full_reset(&self) -> Result<Vec<Block>, NodeError> {
        let _update = self.chain.update();
        let mut state = self.chain.write();
        self.full_reset_locked(&mut state)
    }

    fn full_reset_locked(&self, state: &mut ChainState) -> Result<Vec<Block>, NodeError> {
        info!(height = state.last.height(), "full reset");
        let mut popped = Vec::new();
        for height in (1..=state.last.height()).rev() {
            match self.load_block_at(height) {
                Ok(block) => popped.push(block),
                Err(BlockFault::Storage(e)) => return Err(e.into()),
                Err(fault) => warn!(height, %fault, "unreadable block dropped in reset"),
            }
        }
        state.mempool.requeue_all(&mut state.accounts)?;
        self.store.delete_blocks_from(0)?;
        self.add_genesis()?;
        self.scan_locked(state, 0, false)?;
        let now = self.clock.now();
        state.mempool.process_later(
            popped.iter().flat_map(|b| b.transactions().iter().cloned()),
            0,
            now,
        );
        self.process_waiting_locked(state, now)?;
        Ok(popped)
    }

    /// Switch to `fork` (the blocks following `common` on a peer's chain)
    /// if it ends heavier than the local chain; otherwise put the local
    /// blocks back. Whichever side loses has its transactions requeued.
    pub fn process_fork(
        &self,
        feeder: Option<&str>,
        common: &Block,
        fork: Vec<Block>,
    ) -> Result<ForkOutcome, BlockFault> {
        let _update = self.chain.update();
        let mut state = self.chain.write();
        self.process_fork_locked(&mut state, feeder, common, fork)
    }

    pub(crate) fn process_fork_locked(
        &self,
        state: &mut ChainState,
        feeder: Option<&str>,
        common: &Block,
        fork: Vec<Block>,
    ) -> Result<ForkOutcome, BlockFault> {
        let _span = tracing_spans::fork_span(common.height(), fork.len()).entered();
        let now = self.clock.now();
        let local_difficulty = state.last.cumulative_difficulty();
        let my_popped = self.pop_off_to_locked(state, common)?;

        let mut pushed = 0usize;
        if state.last.id() == common.id() {
            for block in fork {
                if block.previous_block_id() != state.last.id() {
                    continue;
                }
                match self.push_block_locked(state, block) {
                    Ok(_) => pushed += 1,
                    Err(fault) if fault.is_fatal() => return Err(fault),
                    Err(fault) => {
                        if let Some(peer) = feeder {
                            self.peers.blacklist(peer, fault.to_string());
                        }
                        break;
                    }
                }
            }
        }

        if pushed > 0 && state.last.cumulative_difficulty() < local_difficulty {
            info!(
                pushed,
                fork_difficulty = %state.last.cumulative_difficulty(),
                local_difficulty = %local_difficulty,
                "fork is lighter than the local chain, reverting"
            );
            if let Some(peer) = feeder {
                self.peers.blacklist(peer, "fork with lower cumulative difficulty");
            }
            let fork_popped = self.pop_off_to_locked(state, common)?;
            pushed = 0;
            state.mempool.process_later(transactions_of(&fork_popped), common.height(), now);
        }

        if pushed == 0 {
            debug!(blocks = my_popped.len(), "restoring local blocks");
            for block in my_popped.into_iter().rev() {
                let id = block.id();
                if let Err(fault) = self.push_block_locked(state, block) {
                    error!(block = %id, %fault, "popped local block does not push back");
                    break;
                }
            }
        } else {
            info!(
                common_height = common.height(),
                pushed,
                abandoned = my_popped.len(),
                "switched to fork"
            );
            state.mempool.process_later(transactions_of(&my_popped), state.last.height(), now);
        }
        self.process_waiting_locked(state, now)?;
        self.events.emit(ChainEvent::ForkResolved {
            common_height: common.height(),
            kept_fork: pushed > 0,
        });
        Ok(ForkOutcome {
            common_height: common.height(),
            pushed,
            height: state.last.height(),
        })
    }
}

fn transactions_of(blocks: &[Block]) -> Vec<Transaction> {
    blocks
        .iter()
        .flat_map(|b| b.transactions().iter().cloned())
        .collect()
}
