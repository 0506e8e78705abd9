//! Block generation on behalf of the configured forging accounts.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use tracing::{debug, error};
use xel_crypto::keypair_from_secret_phrase;
use xel_ledger::Block;
use xel_types::PublicKey;

use crate::engine::ConsensusEngine;

/// State faults in a row after which forging stops for good.
pub const MAX_FORGING_FAULTS: u32 = 2;

/// Forges with whichever configured account is due first. A run of
/// [`MAX_FORGING_FAULTS`] state faults with no block in between halts it
/// until the node restarts.
pub struct Forger {
    engine: Arc<ConsensusEngine>,
    accounts: Vec<(String, PublicKey)>,
    faults: AtomicU32,
    halted: AtomicBool,
}

impl Forger {
    pub fn new(engine: Arc<ConsensusEngine>, secret_phrases: &[String]) -> Self {
        let accounts = secret_phrases
            .iter()
            .map(|phrase| (phrase.clone(), keypair_from_secret_phrase(phrase).public))
            .collect();
        Self {
            engine,
            accounts,
            faults: AtomicU32::new(0),
            halted: AtomicBool::new(false),
        }
    }

    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    /// Consecutive state faults since the last generated block.
    pub fn faults(&self) -> u32 {
        self.faults.load(Ordering::SeqCst)
    }

    /// Forge with the first account whose deadline has passed.
    pub fn forge_due(&self) -> Option<Block> {
        if self.is_halted() {
            return None;
        }
        let now = self.engine.now();
        for (phrase, public_key) in &self.accounts {
            let Some(deadline) = self.engine.forging_deadline(public_key) else {
                continue;
            };
            if deadline > now {
                continue;
            }
            match self.engine.generate_block(phrase, now) {
                Ok(block) => {
                    self.faults.store(0, Ordering::SeqCst);
                    return Some(block);
                }
                Err(fault) if fault.is_fatal() => {
                    let faults = self.faults.fetch_add(1, Ordering::SeqCst) + 1;
                    if faults >= MAX_FORGING_FAULTS {
                        self.halted.store(true, Ordering::SeqCst);
                        error!(%fault, faults, "forging halted after repeated state faults");
                    } else {
                        error!(%fault, faults, "block generation hit a state fault");
                    }
                    return None;
                }
                Err(fault) => debug!(%fault, "generated block not accepted"),
            }
        }
        None
    }
}
