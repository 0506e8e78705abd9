//! Proof-of-stake arithmetic: generation signatures, hits, base target
//! retargeting and cumulative difficulty.

use xel_crypto::sha256_multi;
use xel_types::{ChainParams, Hash256, PublicKey};

/// Blocks later than this many seconds after their parent are accepted with
/// any hit below the target.
pub const MAX_HIT_WINDOW_SECS: i64 = 3600;

pub fn generation_signature(previous: &Hash256, generator: &PublicKey) -> Hash256 {
    sha256_multi(&[previous.as_bytes(), generator.as_bytes()])
}

/// The generator's lottery ticket: the leading eight bytes of its
/// generation signature, little-endian.
pub fn hit(generation_signature: &Hash256) -> u64 {
    generation_signature.leading_u64()
}

/// A hit wins in the one-second window `elapsed - 1 .. elapsed` of the
/// target, which grows linearly with stake and time since the parent.
pub fn verify_hit(hit: u64, effective_balance: i64, previous_base_target: u64, elapsed: i64) -> bool {
    if elapsed <= 0 || effective_balance <= 0 {
        return false;
    }
    let effective_base_target = previous_base_target as u128 * effective_balance as u128;
    let previous_target = effective_base_target * (elapsed as u128 - 1);
    let target = previous_target + effective_base_target;
    let hit = hit as u128;
    hit < target && (hit >= previous_target || elapsed > MAX_HIT_WINDOW_SECS)
}

/// Seconds after the parent at which `hit` wins, or `None` without stake.
pub fn hit_time(hit: u64, effective_balance: i64, base_target: u64) -> Option<u64> {
    if effective_balance <= 0 || base_target == 0 {
        return None;
    }
    let per_second = base_target as u128 * effective_balance as u128;
    u64::try_from(hit as u128 / per_second).ok()
}

/// Base target of a child of `previous_height`. Retargets on even parent
/// heights above 2 from the average block time over the last three blocks.
pub fn next_base_target(
    params: &ChainParams,
    previous_base_target: u64,
    previous_height: u32,
    timestamp: u32,
    three_back_timestamp: u32,
) -> u64 {
    if previous_height % 2 != 0 || previous_height <= 2 {
        return previous_base_target;
    }
    let average = (timestamp as i64 - three_back_timestamp as i64) / 3;
    let prev = previous_base_target as i128;
    let next = if average > 60 {
        prev * average.min(params.max_blocktime_limit as i64) as i128 / 60
    } else {
        let slowdown = 60 - average.max(params.min_blocktime_limit as i64);
        prev - prev * params.base_target_gamma as i128 * slowdown as i128 / 6000
    };
    let next = if next < 0 || next > params.max_base_target as i128 {
        params.max_base_target
    } else {
        next as u64
    };
    next.max(params.min_base_target)
}

pub fn cumulative_difficulty(previous: u128, base_target: u64) -> u128 {
    previous + (1u128 << 64) / base_target.max(1) as u128
}
