use proptest::prelude::*;
use std::collections::BTreeMap;
use xel_ledger::forging::{cumulative_difficulty, next_base_target};
use xel_ledger::VersionedTable;
use xel_store::DerivedTable;
use xel_types::ChainParams;

/// One block's worth of writes: (key, Some(value)) inserts, (key, None)
/// deletes.
type BlockWrites = Vec<(u8, Option<i32>)>;

fn writes() -> impl Strategy<Value = Vec<BlockWrites>> {
    prop::collection::vec(
        prop::collection::vec((0u8..8, prop::option::of(any::<i32>())), 0..6),
        1..12,
    )
}

/// Apply `blocks` at heights 1.., returning the live rows after each one.
fn build(blocks: &[BlockWrites]) -> (VersionedTable<u8, i32>, Vec<BTreeMap<u8, i32>>) {
    let mut table = VersionedTable::new("prop");
    let mut states = vec![BTreeMap::new()];
    for (i, block) in blocks.iter().enumerate() {
        table.set_height(i as u32 + 1);
        for (key, value) in block {
            match value {
                Some(v) => table.insert(*key, *v),
                None => table.delete(key),
            }
        }
        states.push(live(&table));
    }
    (table, states)
}

fn live(table: &VersionedTable<u8, i32>) -> BTreeMap<u8, i32> {
    table.iter().map(|(k, v)| (*k, *v)).collect()
}

proptest! {
    #[test]
    fn rollback_restores_every_earlier_height(blocks in writes(), back in 0usize..12) {
        let (mut table, states) = build(&blocks);
        let target = back.min(blocks.len());
        for (h, expected) in states.iter().enumerate() {
            let at: BTreeMap<u8, i32> = table.iter_at(h as u32).map(|(k, v)| (*k, *v)).collect();
            prop_assert_eq!(&at, expected);
        }
        table.rollback(target as u32).unwrap();
        prop_assert_eq!(live(&table), states[target].clone());
    }

    #[test]
    fn aborted_unit_leaves_no_trace(blocks in writes(), extra in prop::collection::vec((0u8..8, prop::option::of(any::<i32>())), 1..6)) {
        let (mut table, _) = build(&blocks);
        let before = live(&table);
        table.begin();
        table.set_height(blocks.len() as u32 + 1);
        for (key, value) in &extra {
            match value {
                Some(v) => table.insert(*key, *v),
                None => table.delete(key),
            }
        }
        table.rollback(1).unwrap();
        table.abort();
        prop_assert_eq!(live(&table), before);
        prop_assert!(!table.in_unit());
    }

    #[test]
    fn trim_keeps_reads_at_and_above_the_horizon(blocks in writes(), horizon in 0u32..12) {
        let (mut table, states) = build(&blocks);
        let horizon = horizon.min(blocks.len() as u32);
        table.trim(horizon).unwrap();
        for h in horizon..=blocks.len() as u32 {
            let at: BTreeMap<u8, i32> = table.iter_at(h).map(|(k, v)| (*k, *v)).collect();
            prop_assert_eq!(&at, &states[h as usize]);
        }
    }

    #[test]
    fn base_target_stays_within_bounds(
        previous in 1u64..u64::MAX / 64,
        height in 0u32..100_000,
        spacing in 0u32..400,
    ) {
        let params = ChainParams::testnet();
        let timestamp = 1_000_000 + spacing * 3;
        let next = next_base_target(&params, previous, height, timestamp, 1_000_000);
        if height % 2 != 0 || height <= 2 {
            prop_assert_eq!(next, previous);
        } else {
            prop_assert!(next >= params.min_base_target);
            prop_assert!(next <= params.max_base_target.max(params.min_base_target));
        }
    }

    #[test]
    fn cumulative_difficulty_grows(previous in 0u128..u128::MAX / 2, base_target in any::<u64>()) {
        prop_assert!(cumulative_difficulty(previous, base_target) > previous);
    }
}
