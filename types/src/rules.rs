//! Height-gated consensus rules.
//!
//! A rule change is a one-time event in the chain's history: blocks below the
//! activation height are judged by the old rule forever. Each table lists
//! `(activation_height, rule)` pairs in ascending order and `at(height)`
//! returns the last rule activated at or below `height`.

use serde::{Deserialize, Serialize};

/// How the stake weight of a generator is computed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EffectiveBalanceRule {
    /// Bootstrap rule: the confirmed balance counts immediately.
    Pseudo,
    /// Only balance unchanged for the guaranteed-balance window counts.
    Guaranteed,
}

/// Which fee schedule applies to new transactions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeeRule {
    /// No minimum fee is enforced.
    Exempt,
    Baseline,
    Next,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gated<T> {
    activations: Vec<(u32, T)>,
}

impl<T: Copy> Gated<T> {
    /// `initial` applies from height 0.
    pub fn new(initial: T) -> Self {
        Self {
            activations: vec![(0, initial)],
        }
    }

    /// Activate `rule` from `height` on. Heights must be added in order.
    pub fn then_from(mut self, height: u32, rule: T) -> Self {
        debug_assert!(self.activations.last().is_some_and(|(h, _)| *h < height));
        self.activations.push((height, rule));
        self
    }

    pub fn at(&self, height: u32) -> T {
        let idx = self.activations.partition_point(|(from, _)| *from <= height);
        self.activations[idx.saturating_sub(1)].1
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleTable {
    pub effective_balance: Gated<EffectiveBalanceRule>,
    pub fees: Gated<FeeRule>,
}

impl RuleTable {
    /// Last height judged by the pseudo effective balance rule on the live
    /// network.
    pub const PSEUDO_EFFECTIVE_BALANCE_LAST_HEIGHT: u32 = 5000;

    pub fn mainnet() -> Self {
        Self {
            effective_balance: Gated::new(EffectiveBalanceRule::Pseudo).then_from(
                Self::PSEUDO_EFFECTIVE_BALANCE_LAST_HEIGHT + 1,
                EffectiveBalanceRule::Guaranteed,
            ),
            fees: Gated::new(FeeRule::Baseline),
        }
    }

    pub fn effective_balance_rule(&self, height: u32) -> EffectiveBalanceRule {
        self.effective_balance.at(height)
    }

    pub fn fee_rule(&self, height: u32) -> FeeRule {
        self.fees.at(height)
    }
}

impl Default for RuleTable {
    fn default() -> Self {
        Self::mainnet()
    }
}
