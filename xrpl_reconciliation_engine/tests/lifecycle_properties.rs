//! Property-based tests for the order lifecycle invariants.
//!
//! Invariants verified:
//! - Remaining TakerGets/TakerPays never increase across any fill sequence applied in ledger
//!   order, and never go negative
//! - An overfill freezes the order instead of driving remaining negative
//! - Terminal orders accept no further amount mutations

mod support;

use proptest::prelude::*;
use xrc_common::Amount;
use xrpl_reconciliation_engine::{
    ledger_types::{AccountId, ClassifiedEvent, EventKind, FillKind, OrderKey, OrderStatus},
    OrderTracker,
    TrackerError,
};

fn owner() -> AccountId {
    AccountId::from("rPropTrader")
}

fn open_event(ledger_index: u32, gets: i64, pays: i64) -> ClassifiedEvent {
    ClassifiedEvent {
        tx_hash: format!("OPEN{ledger_index}").into(),
        ledger_index,
        timestamp: None,
        account: owner(),
        kind: EventKind::OfferOpen {
            owner: owner(),
            sequence: 1,
            taker_gets: Amount::Native(gets),
            taker_pays: Amount::Native(pays),
            remaining_gets: None,
            remaining_pays: None,
        },
    }
}

fn fill_event(ledger_index: u32, taken: i64, paid: i64) -> ClassifiedEvent {
    ClassifiedEvent {
        tx_hash: format!("FILL{ledger_index}").into(),
        ledger_index,
        timestamp: None,
        account: owner(),
        kind: EventKind::OfferFill {
            owner: owner(),
            sequence: 1,
            fill: FillKind::Partial,
            taken: Some(Amount::Native(taken)),
            paid: Some(Amount::Native(paid)),
            counterparty: None,
        },
    }
}

fn native(amount: &Option<Amount>) -> i64 {
    match amount {
        Some(Amount::Native(drops)) => *drops,
        other => panic!("expected a native amount, got {other:?}"),
    }
}

proptest! {
    /// Whatever fill sequence arrives (in ledger order), remaining amounts only ever move down,
    /// and never below zero. Overfills freeze the order with remaining untouched.
    #[test]
    fn remaining_amounts_are_monotonically_non_increasing(
        original in 1i64..1_000_000,
        fills in prop::collection::vec((1i64..500_000, 1i64..500_000), 1..20),
    ) {
        let mut tracker = OrderTracker::new();
        tracker.apply(&open_event(100, original, 2 * original)).unwrap();
        let mut prev_gets = original;
        let mut prev_pays = 2 * original;
        for (i, (taken, paid)) in fills.into_iter().enumerate() {
            let ledger_index = 101 + i as u32;
            match tracker.apply(&fill_event(ledger_index, taken, paid)) {
                Ok(Some(update)) => {
                    if update.new_trade.is_some() {
                        let gets = native(&update.order.remaining_taker_gets);
                        let pays = native(&update.order.remaining_taker_pays);
                        prop_assert!(gets >= 0 && pays >= 0);
                        prop_assert!(gets <= prev_gets);
                        prop_assert!(pays <= prev_pays);
                        prev_gets = gets;
                        prev_pays = pays;
                    } else {
                        // terminal or frozen: nothing may move any more
                        prop_assert_eq!(native(&update.order.remaining_taker_gets), prev_gets);
                        prop_assert_eq!(native(&update.order.remaining_taker_pays), prev_pays);
                    }
                },
                Ok(None) => prop_assert!(false, "fill event must address the order"),
                Err(TrackerError::OrderInvariantViolation { .. }) => {
                    let order = tracker.get(&OrderKey::new(owner(), 1)).unwrap();
                    prop_assert!(order.frozen);
                    prop_assert_eq!(native(&order.remaining_taker_gets), prev_gets);
                    prop_assert_eq!(native(&order.remaining_taker_pays), prev_pays);
                },
                Err(e) => prop_assert!(false, "unexpected tracker error: {e}"),
            }
        }
    }

    /// Filling the order exactly to zero terminates it as Filled, and the trade history adds up
    /// to the original amount.
    #[test]
    fn exact_fill_sequences_terminate_as_filled(splits in prop::collection::vec(1i64..1_000, 1..10)) {
        let original: i64 = splits.iter().sum();
        let mut tracker = OrderTracker::new();
        tracker.apply(&open_event(100, original, original)).unwrap();
        let mut last = None;
        for (i, taken) in splits.iter().enumerate() {
            let update = tracker.apply(&fill_event(101 + i as u32, *taken, *taken)).unwrap().unwrap();
            last = Some(update);
        }
        let order = last.unwrap().order;
        prop_assert_eq!(order.status, OrderStatus::Filled);
        prop_assert_eq!(native(&order.remaining_taker_gets), 0);
        let filled: i64 = order.trades.iter().map(|t| native(&t.taken)).sum();
        prop_assert_eq!(filled, original);
    }
}
