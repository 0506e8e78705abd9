//! Balance properties under random payment traffic.

mod common;

use common::*;
use proptest::prelude::*;
use xel_types::Amount;

const SENDERS: [&str; 3] = [ALICE, BOB, CAROL];

#[derive(Clone, Debug)]
struct Step {
    from: usize,
    to: usize,
    amount: i64,
    forge: bool,
}

fn step() -> impl Strategy<Value = Step> {
    (0..SENDERS.len(), 0..SENDERS.len(), 1i64..70, any::<bool>()).prop_map(
        |(from, to, amount, forge)| Step {
            from,
            to,
            amount,
            forge,
        },
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn reservations_never_exceed_confirmed_balance(steps in prop::collection::vec(step(), 1..24)) {
        let h = harness();
        let supply: Amount = h.engine.snapshot().accounts.iter().map(|a| a.balance).sum();

        for step in &steps {
            if step.from != step.to {
                let tx = h.pay(SENDERS[step.from], SENDERS[step.to], step.amount, 1);
                let _ = h.engine.submit_transaction(tx);
            }
            if step.forge {
                h.forge(FORGER);
            }
        }

        let snapshot = h.engine.snapshot();
        for phrase in SENDERS.iter().chain([FORGER].iter()) {
            let (confirmed, unconfirmed) = h.balances(phrase);
            prop_assert!(unconfirmed >= Amount::ZERO);
            prop_assert!(unconfirmed <= confirmed);
        }
        let total: Amount = snapshot.accounts.iter().map(|a| a.balance).sum();
        prop_assert_eq!(total, supply);

        h.engine.scan(0, false).unwrap();
        prop_assert_eq!(h.engine.snapshot(), snapshot);
    }
}
