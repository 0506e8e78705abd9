//! Rebuilding the derived state from the stored blocks.
//!
//! A scan replays blocks from `height` upwards on top of the state at
//! `height - 1`. The (height, validate) pair is recorded in the store first
//! and cleared last, so a scan cut short by a crash is redone on the next
//! start. The first stored block that fails is deleted together with
//! everything above it, and its transactions go back to the mempool.

use tracing::{error, info, warn};
use xel_ledger::Block;
use xel_store::{DerivedTable, ScanSchedule};
use xel_transactions::Transaction;
use xel_types::Timestamp;

use crate::chain::ChainState;
use crate::chain_event::ChainEvent;
use crate::engine::ConsensusEngine;
use crate::error::{BlockFault, NodeError};
use crate::tracing_spans;

impl ConsensusEngine {
    /// Replay the stored chain from `height`, re-verifying every block when
    /// `validate` is set.
    pub fn scan(&self, height: u32, validate: bool) -> Result<(), NodeError> {
        let _update = self.chain.update();
        let mut state = self.chain.write();
        self.scan_locked(&mut state, height, validate)
    }

    pub(crate) fn scan_locked(
        &self,
        state: &mut ChainState,
        height: u32,
        validate: bool,
    ) -> Result<(), NodeError> {
        let _span = tracing_spans::rescan_span(height, validate).entered();
        self.store.schedule_scan(ScanSchedule { height, validate })?;

        let mut height = height;
        if height > 0 && height < self.min_rollback_height_of(state) {
            warn!(
                height,
                min_rollback_height = self.min_rollback_height_of(state),
                "cannot roll back derived tables that far, scanning from genesis"
            );
            height = 0;
        }
        let stored_height = self.store.last_block()?.map(|b| b.height).unwrap_or(0);
        if height > stored_height + 1 {
            error!(height, stored_height, "scan height above the stored chain");
            self.store.clear_scan_schedule()?;
            return Ok(());
        }

        state.mempool.requeue_all(&mut state.accounts)?;
        if height == 0 {
            state.accounts.truncate()?;
            state.last_trim_height = 0;
            state.pending_trim = None;
        } else {
            state.accounts.rollback(height - 1)?;
            state.last = self.load_block_at(height - 1)?;
        }
        state.accounts.set_height(height.saturating_sub(1));
        info!(height, validate, "scanning blockchain");
        self.events.emit(ChainEvent::RescanBegin { height });

        let now = self.clock.now();
        let mut current = height;
        loop {
            let Some(stored) = self.store.block_at_height(current)? else {
                break;
            };
            let outcome = self
                .load_stored(&stored)
                .and_then(|block| self.scan_block(state, block, validate, now));
            match outcome {
                Ok(block) => {
                    self.events.emit(ChainEvent::BlockScanned(&block));
                    if current > 0 && current % 5000 == 0 {
                        info!(height = current, "scan progress");
                    }
                    state.last = block;
                    current += 1;
                }
                Err(BlockFault::Storage(e)) => return Err(e.into()),
                Err(fault) if current == 0 => {
                    error!(%fault, "stored genesis block cannot be applied");
                    return Err(fault.into());
                }
                Err(fault) => {
                    warn!(height = current, %fault, "stored block is invalid, truncating chain");
                    self.discard_from(state, current, now)?;
                    break;
                }
            }
        }

        state.accounts.set_height(state.last.height());
        state.accounts.ensure_system_accounts()?;
        self.store.clear_scan_schedule()?;
        self.process_waiting_locked(state, now)?;
        let end = state.last.height();
        self.events.emit(ChainEvent::RescanEnd { height: end });
        info!(height = end, "scan done");
        Ok(())
    }

    /// Verify (optionally) and apply one stored block on top of the head.
    fn scan_block(
        &self,
        state: &mut ChainState,
        block: Block,
        validate: bool,
        now: Timestamp,
    ) -> Result<Block, BlockFault> {
        let height = block.height();
        if height > 0 && block.previous_block_id() != state.last.id() {
            return Err(BlockFault::not_accepted(format!(
                "stored block {} at height {height} does not follow {}",
                block.id(),
                state.last.id()
            )));
        }
        if height == 0 && block.id() != self.genesis.id() {
            return Err(BlockFault::not_accepted("stored genesis block does not match"));
        }
        if validate && height > 0 {
            let previous = state.last.clone();
            self.validate(state, &block, &previous, now)?;
            check_round_trip(&block)?;
            self.validate_transactions(state, &block, &previous, now)?;
        }

        state.accounts.begin();
        state.accounts.set_height(height);
        match self.accept(state, &block) {
            Ok(()) => {
                state.accounts.commit();
                if self.config.trim_derived_tables
                    && height > self.params.max_rollback
                    && height % self.config.trim_frequency == 0
                {
                    self.trim_locked(state, height - self.params.max_rollback)?;
                }
                Ok(block)
            }
            Err(fault) => {
                state.accounts.abort();
                state.accounts.set_height(state.last.height());
                Err(fault)
            }
        }
    }

    /// Delete stored blocks from `height` up and queue their transactions.
    fn discard_from(
        &self,
        state: &mut ChainState,
        height: u32,
        now: Timestamp,
    ) -> Result<(), NodeError> {
        let mut orphaned: Vec<Transaction> = Vec::new();
        let mut h = height;
        while let Some(stored) = self.store.block_at_height(h)? {
            match self.store.block_transactions(&stored) {
                Ok(stored_txs) => orphaned.extend(
                    stored_txs
                        .iter()
                        .filter_map(|t| Transaction::parse(&t.bytes).ok()),
                ),
                Err(e) => warn!(height = h, error = %e, "transactions of discarded block unreadable"),
            }
            h += 1;
        }
        self.store.delete_blocks_from(height)?;
        info!(height, discarded = h - height, "stored blocks discarded");
        let last_height = state.last.height();
        state.accounts.set_height(last_height);
        state.mempool.process_later(orphaned, last_height, now);
        Ok(())
    }
}

/// A block must encode back to exactly the bytes it was decoded from.
fn check_round_trip(block: &Block) -> Result<(), BlockFault> {
    let bytes = block.wire_bytes();
    let parsed = Block::from_wire(&bytes)
        .map_err(|e| BlockFault::not_accepted(format!("block does not parse back: {e}")))?;
    if parsed.wire_bytes() != bytes || parsed.id() != block.id() {
        return Err(BlockFault::not_accepted("block bytes do not round-trip"));
    }
    for tx in block.transactions() {
        let bytes = tx.bytes();
        let reparsed = Transaction::parse(&bytes)
            .map_err(|e| BlockFault::transaction(tx.id(), format!("does not parse back: {e}")))?;
        if reparsed.bytes() != bytes {
            return Err(BlockFault::transaction(tx.id(), "transaction bytes do not round-trip"));
        }
    }
    Ok(())
}
