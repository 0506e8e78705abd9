//! Prometheus metrics for the XEL node.
//!
//! [`NodeMetrics`] owns its own [`Registry`] and is fed from [`ChainEvent`]s;
//! serving the registry is left to whoever embeds the node.

use prometheus::{
    register_histogram_with_registry, register_int_counter_with_registry,
    register_int_gauge_with_registry, Histogram, HistogramOpts, IntCounter, IntGauge, Opts,
    Registry,
};

use crate::chain_event::ChainEvent;

pub struct NodeMetrics {
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    pub blocks_pushed: IntCounter,
    pub blocks_popped: IntCounter,
    pub blocks_rejected: IntCounter,
    pub blocks_generated: IntCounter,
    pub forks_resolved: IntCounter,
    pub rescans: IntCounter,
    pub transactions_admitted: IntCounter,
    pub transactions_rejected: IntCounter,
    pub transactions_expired: IntCounter,
    pub transactions_confirmed: IntCounter,

    // ── Gauges ──────────────────────────────────────────────────────────
    pub chain_height: IntGauge,
    pub mempool_size: IntGauge,

    // ── Histograms ──────────────────────────────────────────────────────
    /// Transactions per pushed block.
    pub block_transactions: Histogram,
}

impl NodeMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let blocks_pushed = register_int_counter_with_registry!(
            Opts::new("xel_blocks_pushed_total", "Blocks appended to the chain"),
            registry
        )?;
        let blocks_popped = register_int_counter_with_registry!(
            Opts::new("xel_blocks_popped_total", "Blocks removed from the chain head"),
            registry
        )?;
        let blocks_rejected = register_int_counter_with_registry!(
            Opts::new("xel_blocks_rejected_total", "Blocks that failed validation"),
            registry
        )?;
        let blocks_generated = register_int_counter_with_registry!(
            Opts::new("xel_blocks_generated_total", "Blocks forged by this node"),
            registry
        )?;
        let forks_resolved = register_int_counter_with_registry!(
            Opts::new("xel_forks_resolved_total", "Fork resolutions attempted"),
            registry
        )?;
        let rescans = register_int_counter_with_registry!(
            Opts::new("xel_rescans_total", "Derived state rescans"),
            registry
        )?;
        let transactions_admitted = register_int_counter_with_registry!(
            Opts::new("xel_transactions_admitted_total", "Transactions admitted to the mempool"),
            registry
        )?;
        let transactions_rejected = register_int_counter_with_registry!(
            Opts::new("xel_transactions_rejected_total", "Transactions refused by the mempool"),
            registry
        )?;
        let transactions_expired = register_int_counter_with_registry!(
            Opts::new("xel_transactions_expired_total", "Pending transactions that expired"),
            registry
        )?;
        let transactions_confirmed = register_int_counter_with_registry!(
            Opts::new("xel_transactions_confirmed_total", "Transactions included in pushed blocks"),
            registry
        )?;

        let chain_height = register_int_gauge_with_registry!(
            Opts::new("xel_chain_height", "Height of the chain head"),
            registry
        )?;
        let mempool_size = register_int_gauge_with_registry!(
            Opts::new("xel_mempool_size", "Pending unconfirmed transactions"),
            registry
        )?;

        let block_transactions = register_histogram_with_registry!(
            HistogramOpts::new("xel_block_transactions", "Transactions per pushed block")
                .buckets(prometheus::linear_buckets(0.0, 32.0, 9)?),
            registry
        )?;

        Ok(Self {
            registry,
            blocks_pushed,
            blocks_popped,
            blocks_rejected,
            blocks_generated,
            forks_resolved,
            rescans,
            transactions_admitted,
            transactions_rejected,
            transactions_expired,
            transactions_confirmed,
            chain_height,
            mempool_size,
            block_transactions,
        })
    }

    pub fn observe(&self, event: &ChainEvent<'_>) {
        match event {
            ChainEvent::BlockPushed(block) => {
                self.blocks_pushed.inc();
                self.chain_height.set(i64::from(block.height()));
                self.block_transactions.observe(block.transactions().len() as f64);
            }
            ChainEvent::BlockPopped(block) => {
                self.blocks_popped.inc();
                self.chain_height.set(i64::from(block.height().saturating_sub(1)));
            }
            ChainEvent::BlockScanned(block) => self.chain_height.set(i64::from(block.height())),
            ChainEvent::BlockRejected { .. } => self.blocks_rejected.inc(),
            ChainEvent::BlockGenerated(_) => self.blocks_generated.inc(),
            ChainEvent::ForkResolved { .. } => self.forks_resolved.inc(),
            ChainEvent::RescanBegin { .. } => self.rescans.inc(),
            ChainEvent::AddedUnconfirmed(txs) => {
                self.transactions_admitted.inc_by(txs.len() as u64);
                self.mempool_size.add(txs.len() as i64);
            }
            ChainEvent::RemovedUnconfirmed(txs) => self.mempool_size.sub(txs.len() as i64),
            ChainEvent::ExpiredUnconfirmed(txs) => {
                self.transactions_expired.inc_by(txs.len() as u64)
            }
            ChainEvent::AddedConfirmed(txs) => {
                self.transactions_confirmed.inc_by(txs.len() as u64)
            }
            ChainEvent::TransactionRejected { .. } => self.transactions_rejected.inc(),
            _ => {}
        }
    }
}
