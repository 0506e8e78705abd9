//! Block push, pop-off, rescan and mempool behaviour of the engine on
//! in-memory storage.

mod common;

use common::*;
use xel_crypto::{keypair_from_secret_phrase, sha256};
use xel_ledger::Block;
use xel_mempool::AdmissionFault;
use xel_node::BlockFault;
use xel_store::{BlockStore, MetaStore, StoredBlock, TransactionStore};
use xel_types::Amount;

#[test]
fn fresh_engine_holds_genesis_allocations() {
    let h = harness();
    assert_eq!(h.engine.height(), 0);
    assert_eq!(h.engine.last_block().id(), h.engine.genesis_id());
    assert_eq!(h.balances(ALICE), (xel(100), xel(100)));
    assert_eq!(h.balances(BOB), (xel(100), xel(100)));
    assert_eq!(h.store.block_count().unwrap(), 1);
}

#[test]
fn payment_reserves_then_confirms() {
    let h = harness();
    let tx = h.pay(ALICE, CAROL, 60, 1);
    h.engine.submit_transaction(tx.clone()).unwrap();
    assert_eq!(h.balances(ALICE), (xel(100), xel(39)));

    let block = h.forge(FORGER);
    assert_eq!(block.transactions(), std::slice::from_ref(&tx));
    assert_eq!(h.balances(ALICE), (xel(39), xel(39)));
    assert_eq!(h.balances(CAROL), (xel(60), xel(60)));
    assert_eq!(h.balances(FORGER), (xel(1), xel(1)));
    assert!(!h.pool_contains(&tx));
}

#[test]
fn conflicting_spend_is_refused_on_unconfirmed_balance() {
    let h = harness();
    h.engine
        .submit_transaction(h.pay(ALICE, CAROL, 80, 1))
        .unwrap();
    let second = h.engine.submit_transaction(payment(
        ALICE,
        BOB,
        80,
        1,
        block_time(1).minus(2),
    ));
    assert!(matches!(second, Err(AdmissionFault::InsufficientBalance)));
    assert_eq!(h.balances(ALICE), (xel(100), xel(19)));
    assert_eq!(h.pool_len(), 1);
}

#[test]
fn resubmission_is_already_processed() {
    let h = harness();
    let tx = h.pay(ALICE, CAROL, 10, 1);
    h.engine.submit_transaction(tx.clone()).unwrap();
    assert!(matches!(
        h.engine.submit_transaction(tx.clone()),
        Err(AdmissionFault::AlreadyProcessed)
    ));
    assert_eq!(h.pool_len(), 1);

    h.forge(FORGER);
    assert!(matches!(
        h.engine.submit_transaction(tx),
        Err(AdmissionFault::AlreadyProcessed)
    ));
    assert_eq!(h.pool_len(), 0);
}

#[test]
fn accepted_blocks_link_hashes_and_conserve_totals() {
    let h = harness();
    for round in 0..6 {
        if round % 2 == 0 {
            h.engine
                .submit_transaction(h.pay(ALICE, CAROL, 3 + round, 1))
                .unwrap();
            h.engine
                .submit_transaction(h.pay(BOB, CAROL, 5, 2))
                .unwrap();
        }
        h.forge(FORGER);
    }
    assert_eq!(h.engine.height(), 6);
    for height in 1..=6 {
        let block = h.engine.block_at_height(height).unwrap();
        let previous = h.engine.block_at_height(height - 1).unwrap();
        assert_eq!(*block.previous_block_hash(), sha256(&previous.bytes()));
        assert_eq!(block.previous_block_id(), previous.id());
        let amount: Amount = block.transactions().iter().map(|t| t.amount()).sum();
        let fee: Amount = block.transactions().iter().map(|t| t.fee()).sum();
        assert_eq!(block.total_amount(), amount);
        assert_eq!(block.total_fee(), fee);
        assert!(block.cumulative_difficulty() > previous.cumulative_difficulty());
    }
}

#[test]
fn push_then_pop_restores_accounts_and_pool() {
    let h = harness();
    h.extend(3);
    let pending = h.pay(ALICE, CAROL, 25, 1);
    h.engine.submit_transaction(pending.clone()).unwrap();
    let snapshot = h.engine.snapshot();
    let pool = h.engine.with_state(|s| s.mempool.pending_ids());

    h.forge(FORGER);
    assert_eq!(h.engine.height(), 4);
    assert!(!h.pool_contains(&pending));

    let popped = h.engine.pop_off_to(3).unwrap();
    assert_eq!(popped.len(), 1);
    assert_eq!(h.engine.height(), 3);
    assert_eq!(h.engine.snapshot(), snapshot);
    assert_eq!(h.engine.with_state(|s| s.mempool.pending_ids()), pool);
    assert_eq!(h.store.block_count().unwrap(), 4);
}

#[test]
fn block_not_following_head_is_out_of_order() {
    let h = harness();
    h.extend(2);
    let stale = h.engine.block_at_height(1).unwrap();
    let fault = h.engine.push_block(stale).unwrap_err();
    assert!(matches!(fault, BlockFault::OutOfOrder(_)));
    assert_eq!(h.engine.height(), 2);
}

#[test]
fn block_from_the_future_is_out_of_order() {
    let h = harness();
    let future = h.engine.now().plus(120);
    let fault = h.engine.generate_block(FORGER, future).unwrap_err();
    assert!(matches!(fault, BlockFault::OutOfOrder(_)));
    assert_eq!(h.engine.height(), 0);
}

#[test]
fn push_events_fire_in_order() {
    let h = harness();
    let seen = h.record_events();
    h.forge(FORGER);
    let seen = seen.lock().unwrap().clone();
    let order: Vec<&str> = seen
        .into_iter()
        .filter(|e| {
            matches!(
                *e,
                "before_accept" | "before_apply" | "after_apply" | "after_accept" | "pushed"
            )
        })
        .collect();
    assert_eq!(
        order,
        vec!["before_accept", "before_apply", "after_apply", "after_accept", "pushed"]
    );
}

#[test]
fn validating_rescan_reproduces_the_chain() {
    let h = harness();
    for _ in 0..4 {
        h.engine
            .submit_transaction(h.pay(ALICE, CAROL, 7, 1))
            .unwrap();
        h.forge(FORGER);
    }
    h.extend(2);
    let before = h.store.contents();
    let head = h.engine.last_block().id();
    let snapshot = h.engine.snapshot();

    let seen = h.record_events();
    h.engine.scan(0, true).unwrap();

    let after = h.store.contents();
    assert_eq!(after.blocks, before.blocks);
    assert_eq!(after.transactions, before.transactions);
    assert_eq!(h.engine.last_block().id(), head);
    assert_eq!(h.engine.height(), 6);
    assert_eq!(h.engine.snapshot(), snapshot);
    assert_eq!(h.store.scan_schedule().unwrap(), None);

    let seen = seen.lock().unwrap();
    assert_eq!(seen.first(), Some(&"rescan_begin"));
    assert_eq!(seen.last(), Some(&"rescan_end"));
    assert_eq!(seen.iter().filter(|e| **e == "scanned").count(), 7);
}

#[test]
fn rescan_from_a_height_rolls_back_and_replays() {
    let h = harness();
    h.engine
        .submit_transaction(h.pay(ALICE, CAROL, 7, 1))
        .unwrap();
    h.extend(5);
    let snapshot = h.engine.snapshot();
    h.engine.scan(3, false).unwrap();
    assert_eq!(h.engine.height(), 5);
    assert_eq!(h.engine.snapshot(), snapshot);
}

#[test]
fn rescan_truncates_at_a_broken_block() {
    let h = harness();
    h.extend(2);
    let tx = h.pay(ALICE, CAROL, 10, 1);
    h.engine.submit_transaction(tx.clone()).unwrap();
    h.extend(3);
    assert_eq!(h.engine.height(), 5);

    let stored = h.store.block_at_height(3).unwrap().unwrap();
    let transactions = h.store.block_transactions(&stored).unwrap();
    h.store.delete_blocks_from(3).unwrap();
    let mut bytes = stored.bytes.clone();
    let last = bytes.len() - 1;
    bytes[last] ^= 0x55;
    let broken = StoredBlock { bytes, ..stored };
    h.store.put_block(&broken, &transactions).unwrap();

    h.engine.scan(0, true).unwrap();
    assert_eq!(h.engine.height(), 2);
    assert_eq!(h.store.block_count().unwrap(), 3);
    assert!(h.pool_contains(&tx));
    assert_eq!(h.balances(ALICE), (xel(100), xel(89)));
}

#[test]
fn pop_to_zero_resets_to_genesis() {
    let h = harness();
    let tx = h.pay(ALICE, CAROL, 10, 1);
    h.engine.submit_transaction(tx.clone()).unwrap();
    h.extend(3);
    let popped = h.engine.pop_off_to(0).unwrap();
    assert_eq!(popped.len(), 3);
    assert_eq!(h.engine.height(), 0);
    assert_eq!(h.store.block_count().unwrap(), 1);
    assert_eq!(h.balances(ALICE), (xel(100), xel(89)));
    assert!(h.pool_contains(&tx));
}

#[test]
fn restart_rebuilds_state_from_stored_blocks() {
    let h = harness();
    h.engine
        .submit_transaction(h.pay(ALICE, CAROL, 30, 1))
        .unwrap();
    h.extend(4);
    let snapshot = h.engine.snapshot();
    let store = h.store.clone();
    drop(h);

    let reopened = harness_on(engine_config(), store);
    assert_eq!(reopened.engine.height(), 4);
    assert_eq!(reopened.engine.snapshot(), snapshot);
}

#[test]
fn storage_failure_leaves_head_untouched() {
    let h = harness();
    h.extend(2);
    let tx = h.pay(ALICE, CAROL, 10, 1);
    h.engine.submit_transaction(tx.clone()).unwrap();
    let snapshot = h.engine.snapshot();

    h.store.fail_writes(true);
    let fault = h
        .engine
        .generate_block(FORGER, block_time(3))
        .unwrap_err();
    assert!(fault.is_fatal());
    assert_eq!(h.engine.height(), 2);
    assert_eq!(h.engine.snapshot(), snapshot);
    assert!(h.pool_contains(&tx));

    h.store.fail_writes(false);
    h.forge(FORGER);
    assert_eq!(h.balances(ALICE), (xel(89), xel(89)));
}

#[test]
fn expired_transactions_are_swept() {
    let h = harness();
    let tx = payment(ALICE, CAROL, 10, 1, block_time(1).minus(1));
    h.engine.submit_transaction(tx.clone()).unwrap();
    h.clock.set(tx.expiration().as_secs() + 1);
    let expired = h.engine.sweep_expired().unwrap();
    assert_eq!(expired, vec![tx.clone()]);
    assert!(!h.pool_contains(&tx));
    assert_eq!(h.balances(ALICE), (xel(100), xel(100)));
}

#[test]
fn trimming_raises_the_rollback_floor() {
    let mut config = engine_config();
    config.trim_frequency = 10;
    let h = harness_with(config);
    let max_rollback = h.engine.params().max_rollback;
    assert_eq!(h.engine.min_rollback_height(), 0);
    h.extend(max_rollback + 10);
    assert_eq!(h.engine.run_pending_trim().unwrap(), Some(10));
    assert_eq!(h.engine.min_rollback_height(), 10);
    assert_eq!(h.engine.run_pending_trim().unwrap(), None);
}

#[test]
fn full_reset_rebuilds_from_genesis_and_requeues() {
    let h = harness();
    let tx = h.pay(BOB, CAROL, 12, 1);
    h.engine.submit_transaction(tx.clone()).unwrap();
    h.extend(4);
    assert_eq!(h.balances(BOB), (xel(87), xel(87)));

    let seen = h.record_events();
    let popped = h.engine.full_reset().unwrap();
    assert_eq!(popped.len(), 4);
    assert_eq!(h.engine.height(), 0);
    assert_eq!(h.engine.last_block().id(), h.engine.genesis_id());
    assert_eq!(h.store.block_count().unwrap(), 1);
    assert!(h.pool_contains(&tx));
    assert_eq!(h.balances(BOB), (xel(100), xel(87)));
    assert!(seen.lock().unwrap().contains(&"rescan_begin"));
}

#[test]
fn unreadable_transactions_abort_the_push() {
    let h = harness();
    let tx = h.pay(ALICE, CAROL, 10, 1);
    h.engine.submit_transaction(tx.clone()).unwrap();
    let first = h.forge(FORGER);
    assert_eq!(first.transactions(), std::slice::from_ref(&tx));
    assert_eq!(h.balances(ALICE), (xel(89), xel(89)));

    let keys = keypair_from_secret_phrase(FORGER);
    let replay = Block::forge(&first, block_time(2), vec![tx.clone()], &keys);
    h.store.fail_transaction_reads(true);
    let fault = h.engine.push_block(replay.clone()).unwrap_err();
    assert!(matches!(fault, BlockFault::Storage(_)));
    assert!(fault.is_fatal());
    assert_eq!(h.engine.height(), 1);
    assert_eq!(h.balances(ALICE), (xel(89), xel(89)));
    assert_eq!(h.balances(CAROL), (xel(10), xel(10)));

    h.store.fail_transaction_reads(false);
    let fault = h.engine.push_block(replay).unwrap_err();
    assert!(matches!(fault, BlockFault::TransactionNotAccepted { id, .. } if id == tx.id()));
    assert_eq!(h.balances(ALICE), (xel(89), xel(89)));
}

#[test]
fn unreadable_chain_refuses_admission_without_reserving() {
    let h = harness();
    let tx = h.pay(ALICE, CAROL, 10, 1);
    h.store.fail_transaction_reads(true);
    let refused = h.engine.submit_transaction(tx.clone());
    assert!(matches!(refused, Err(AdmissionFault::Storage(_))));
    assert!(!h.pool_contains(&tx));
    assert_eq!(h.balances(ALICE), (xel(100), xel(100)));

    h.store.fail_transaction_reads(false);
    h.engine.submit_transaction(tx.clone()).unwrap();
    assert_eq!(h.balances(ALICE), (xel(100), xel(89)));
}

#[test]
fn push_stands_when_the_waiting_queue_cannot_be_read() {
    let h = harness();
    h.clock.set(block_time(4).as_secs());
    h.extend(1);
    let funding = h.pay(ALICE, CAROL, 80, 1);
    h.engine.submit_transaction(funding.clone()).unwrap();
    h.forge(FORGER);
    let spend = h.pay(CAROL, BOB, 50, 1);
    h.engine.submit_transaction(spend.clone()).unwrap();

    // Carol's spend cannot come back before her funding is confirmed again.
    h.engine.pop_off_to(1).unwrap();
    assert!(h.pool_contains(&funding));
    assert!(h.engine.with_state(|s| s.mempool.is_waiting(spend.id())));

    h.store.fail_transaction_reads(true);
    let keys = keypair_from_secret_phrase(FORGER);
    let empty = Block::forge(&h.engine.last_block(), block_time(2), Vec::new(), &keys);
    let pushed = h.engine.push_block(empty).unwrap();
    assert_eq!(h.engine.height(), 2);
    assert_eq!(h.engine.last_block().id(), pushed.id());
    assert!(h.engine.with_state(|s| {
        s.mempool.is_waiting(funding.id()) && s.mempool.is_waiting(spend.id())
    }));
    assert_eq!(h.balances(ALICE), (xel(100), xel(100)));

    h.store.fail_transaction_reads(false);
    h.engine.process_waiting().unwrap();
    assert!(h.pool_contains(&funding));
    assert_eq!(h.balances(ALICE), (xel(100), xel(19)));
}
