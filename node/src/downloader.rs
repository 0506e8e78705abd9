//! Pulling blocks from a peer whose chain is heavier than ours.
//!
//! One pass picks the heaviest peer, locates the last block both chains
//! share, fetches the following blocks in fixed-size segments on a worker
//! pool and either appends them or hands them to the fork switch.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, info, warn};
use xel_ledger::Block;
use xel_types::BlockId;

use crate::config::NodeConfig;
use crate::engine::ConsensusEngine;
use crate::error::{NodeError, PeerError};
use crate::fork::ForkOutcome;
use crate::peer::Peer;
use crate::tracing_spans;

/// Most block ids asked for, or accepted, in one request.
pub const MAX_BLOCK_IDS: usize = 1440;
/// Blocks per segment request.
pub const SEGMENT_LEN: usize = 36;
/// Largest wire encoding accepted for a single block.
pub const MAX_BLOCK_WIRE_BYTES: usize = 10 * 1024 * 1024;

#[derive(Clone, Debug)]
pub struct DownloaderConfig {
    pub threads: usize,
    pub segment_timeout: Duration,
    pub number_of_fork_confirmations: usize,
}

impl From<&NodeConfig> for DownloaderConfig {
    fn from(config: &NodeConfig) -> Self {
        Self {
            threads: config.download_threads.max(1),
            segment_timeout: config.segment_timeout(),
            number_of_fork_confirmations: config.number_of_fork_confirmations,
        }
    }
}

/// What one download pass did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DownloadReport {
    pub feeder: Option<String>,
    /// Blocks appended directly to the head.
    pub pushed: usize,
    pub fork: Option<ForkOutcome>,
}

pub struct Downloader {
    engine: Arc<ConsensusEngine>,
    pool: ThreadPool,
    config: DownloaderConfig,
}

impl Downloader {
    pub fn new(engine: Arc<ConsensusEngine>, config: DownloaderConfig) -> Result<Self, NodeError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(config.threads)
            .thread_name(|i| format!("xel-download-{i}"))
            .build()
            .map_err(|e| NodeError::Other(format!("download pool: {e}")))?;
        Ok(Self {
            engine,
            pool,
            config,
        })
    }

    /// One download pass. Peer misbehaviour blacklists the peer and ends
    /// the pass quietly; only local faults come back as errors.
    pub fn run_once(&self) -> Result<DownloadReport, NodeError> {
        let mut report = DownloadReport::default();
        let Some((feeder, peer_difficulty)) = self.pick_feeder() else {
            return Ok(report);
        };
        let _span = tracing_spans::download_span(feeder.address()).entered();
        report.feeder = Some(feeder.address().to_string());

        let common_id = match self.find_common_block(feeder.as_ref()) {
            Ok(Some(id)) => id,
            Ok(None) => {
                self.engine
                    .peers()
                    .blacklist(feeder.address(), "no block in common");
                return Ok(report);
            }
            Err(e) => {
                debug!(error = %e, "common block search failed");
                return Ok(report);
            }
        };
        let Some(common) = self.engine.block(common_id)? else {
            return Ok(report);
        };
        let my_height = self.engine.height();
        if my_height.saturating_sub(common.height()) >= self.engine.params().max_rollback {
            info!(
                common_height = common.height(),
                my_height, "peer forked too far back, ignoring"
            );
            return Ok(report);
        }

        let _update = self.engine.update_lock();
        if self.engine.cumulative_difficulty() >= peer_difficulty {
            return Ok(report);
        }
        if !self.engine.has_block(common.id())? {
            debug!(common = %common.id(), "common block popped meanwhile");
            return Ok(report);
        }

        let ids = match feeder.next_block_ids(common.id(), MAX_BLOCK_IDS) {
            Ok(ids) => ids,
            Err(e) => {
                debug!(error = %e, "next block ids request failed");
                return Ok(report);
            }
        };
        if ids.len() > MAX_BLOCK_IDS {
            self.engine.peers().blacklist(
                feeder.address(),
                format!("sent {} block ids, limit {MAX_BLOCK_IDS}", ids.len()),
            );
            return Ok(report);
        }
        if ids.is_empty() {
            return Ok(report);
        }

        let blocks = self.fetch_blocks(&feeder, &ids);
        if blocks.is_empty() {
            return Ok(report);
        }
        debug!(
            common_height = common.height(),
            fetched = blocks.len(),
            "blocks downloaded"
        );

        let mut remaining = blocks.into_iter().peekable();
        while let Some(block) = remaining.next_if(|b| b.previous_block_id() == self.engine.last_block().id()) {
            match self.engine.push_block(block) {
                Ok(_) => report.pushed += 1,
                Err(fault) if fault.is_fatal() => return Err(fault.into()),
                Err(fault) => {
                    self.engine
                        .peers()
                        .blacklist(feeder.address(), fault.to_string());
                    return Ok(report);
                }
            }
        }
        let fork: Vec<Block> = remaining.collect();
        if fork.is_empty() {
            if report.pushed > 0 {
                info!(pushed = report.pushed, height = self.engine.height(), "chain extended");
            }
            return Ok(report);
        }
        if !self.fork_confirmed(feeder.as_ref(), common.id(), &fork) {
            return Ok(report);
        }
        let outcome = {
            let mut state = self.engine.chain.write();
            self.engine
                .process_fork_locked(&mut state, Some(feeder.address()), &common, fork)
        };
        match outcome {
            Ok(outcome) => report.fork = Some(outcome),
            Err(fault) if fault.is_fatal() => return Err(fault.into()),
            Err(fault) => warn!(%fault, "fork switch failed"),
        }
        Ok(report)
    }

    /// The active peer with the highest cumulative difficulty, if that
    /// beats ours.
    fn pick_feeder(&self) -> Option<(Arc<dyn Peer>, u128)> {
        let mine = self.engine.cumulative_difficulty();
        self.engine
            .peers()
            .active()
            .into_iter()
            .filter_map(|peer| match peer.cumulative_difficulty() {
                Ok(cd) => Some((peer, cd)),
                Err(e) => {
                    debug!(error = %e, "difficulty request failed");
                    None
                }
            })
            .filter(|(_, cd)| *cd > mine)
            .max_by_key(|(_, cd)| *cd)
    }

    /// Last block id both chains share. Local blocks are checked at heights
    /// receding exponentially from the head until the peer recognises one,
    /// then the peer's ids after it are walked while we know them.
    pub fn find_common_block(&self, peer: &dyn Peer) -> Result<Option<BlockId>, NodeError> {
        let mut height = self.engine.height();
        let mut step = 1u32;
        let milestone = loop {
            let Some(id) = self.engine.block_id_at_height(height)? else {
                return Ok(None);
            };
            if !peer.next_block_ids(id, 1)?.is_empty() {
                break id;
            }
            if height == 0 {
                return Ok(None);
            }
            height = height.saturating_sub(step);
            step = step.saturating_mul(2);
        };

        let mut common = milestone;
        loop {
            let ids = peer.next_block_ids(common, MAX_BLOCK_IDS)?;
            let mut all_known = true;
            for id in &ids {
                if self.engine.has_block(*id)? {
                    common = *id;
                } else {
                    all_known = false;
                    break;
                }
            }
            if !all_known || ids.len() < MAX_BLOCK_IDS {
                return Ok(Some(common));
            }
        }
    }

    /// Fetch `ids` in segments on the pool. The result is the longest
    /// prefix that arrived intact.
    fn fetch_blocks(&self, feeder: &Arc<dyn Peer>, ids: &[BlockId]) -> Vec<Block> {
        let segments: Vec<&[BlockId]> = ids.chunks(SEGMENT_LEN).collect();
        let results: Vec<Option<Vec<Block>>> = self.pool.install(|| {
            segments
                .par_iter()
                .map(|segment| self.fetch_segment(feeder, segment))
                .collect()
        });
        let mut blocks = Vec::with_capacity(ids.len());
        for (segment, result) in segments.iter().zip(results) {
            let Some(fetched) = result else { break };
            let complete = fetched.len() == segment.len();
            blocks.extend(fetched);
            if !complete {
                break;
            }
        }
        blocks
    }

    /// Primary attempt from the feeder, then one retry from another peer.
    fn fetch_segment(&self, feeder: &Arc<dyn Peer>, segment: &[BlockId]) -> Option<Vec<Block>> {
        let peers = self.engine.peers();
        match self.request_segment(feeder, segment) {
            Ok(blocks) => return Some(blocks),
            Err(e) => {
                peers.blacklist(feeder.address(), e.to_string());
            }
        }
        let fallback = peers
            .active()
            .into_iter()
            .find(|p| p.address() != feeder.address())?;
        debug!(peer = %fallback.address(), first = %segment[0], "retrying segment");
        match self.request_segment(&fallback, segment) {
            Ok(blocks) => Some(blocks),
            Err(e) => {
                peers.blacklist(fallback.address(), e.to_string());
                None
            }
        }
    }

    fn request_segment(&self, peer: &Arc<dyn Peer>, segment: &[BlockId]) -> Result<Vec<Block>, PeerError> {
        let encoded = self.blocks_within_timeout(peer, segment)?;
        if encoded.len() > segment.len() {
            return Err(PeerError::malformed(
                peer.address(),
                format!("{} blocks for {} ids", encoded.len(), segment.len()),
            ));
        }
        segment
            .iter()
            .zip(&encoded)
            .map(|(id, bytes)| {
                if bytes.len() > MAX_BLOCK_WIRE_BYTES {
                    return Err(PeerError::malformed(
                        peer.address(),
                        format!("block of {} bytes", bytes.len()),
                    ));
                }
                let block = Block::from_wire(bytes)
                    .map_err(|e| PeerError::malformed(peer.address(), e.to_string()))?;
                if block.id() != *id {
                    return Err(PeerError::malformed(
                        peer.address(),
                        format!("asked for block {id}, got {}", block.id()),
                    ));
                }
                Ok(block)
            })
            .collect()
    }

    /// Ask `peer` for the wire blocks of `segment` on a helper thread and
    /// give up once the segment timeout passes. An abandoned request runs
    /// to completion on its own and its answer is dropped.
    fn blocks_within_timeout(&self, peer: &Arc<dyn Peer>, segment: &[BlockId]) -> Result<Vec<Vec<u8>>, PeerError> {
        let (tx, rx) = mpsc::sync_channel(1);
        let requester = Arc::clone(peer);
        let ids = segment.to_vec();
        let started = Instant::now();
        thread::Builder::new()
            .name("xel-segment".into())
            .spawn(move || {
                // Nobody listens any more after a timeout.
                let _ = tx.send(requester.blocks(&ids));
            })
            .map_err(|e| PeerError::Unreachable(format!("{}: {e}", peer.address())))?;
        match rx.recv_timeout(self.config.segment_timeout) {
            Ok(answer) => answer,
            Err(RecvTimeoutError::Timeout) => Err(PeerError::Timeout {
                peer: peer.address().to_string(),
                millis: started.elapsed().as_millis() as u64,
            }),
            Err(RecvTimeoutError::Disconnected) => Err(PeerError::Unreachable(format!(
                "{}: segment request ended without an answer",
                peer.address()
            ))),
        }
    }

    /// Other peers must have the fork's last block after `common` before we
    /// switch. The requirement shrinks to the number of peers available.
    ///
    /// This is a simplified confirmation, taken on purpose: peers are asked
    /// once, after the fork's blocks are downloaded and before any of them
    /// is pushed, and the count is capped by the peers on hand instead of a
    /// fixed quorum. Nothing is compared against the peers after the
    /// switch; a fork that fails to apply or ends up lighter is reverted by
    /// the engine.
    fn fork_confirmed(&self, feeder: &dyn Peer, common: BlockId, fork: &[Block]) -> bool {
        let Some(tip) = fork.last().map(Block::id) else {
            return false;
        };
        let others: Vec<Arc<dyn Peer>> = self
            .engine
            .peers()
            .active()
            .into_iter()
            .filter(|p| p.address() != feeder.address())
            .collect();
        let needed = self.config.number_of_fork_confirmations.min(others.len());
        let confirmations = others
            .iter()
            .filter(|p| {
                p.next_block_ids(common, MAX_BLOCK_IDS)
                    .map(|ids| ids.contains(&tip))
                    .unwrap_or(false)
            })
            .count();
        if confirmations < needed {
            info!(
                confirmations,
                needed,
                fork_len = fork.len(),
                "fork lacks confirmations, not switching"
            );
            return false;
        }
        true
    }
}
