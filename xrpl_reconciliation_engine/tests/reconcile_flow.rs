//! End-to-end reconciliation flows over the in-memory store: raw transaction JSON in, normalized
//! records out.

mod support;

use serde_json::{json, Value};
use xrc_common::Amount;
use xrpl_reconciliation_engine::{
    ledger_types::{AccountId, OrderKey, OrderStatus, TransferDirection, TxEnvelope},
    MemoryStore,
    ReconciliationApi,
    WatchedAccounts,
    WatermarkStore,
};

const TRADER: &str = "rTrader11111111111111111111111111";
const TAKER: &str = "rTaker222222222222222222222222222";
const OUTSIDER: &str = "rOutsider333333333333333333333333";

fn envelope(raw: Value) -> TxEnvelope {
    serde_json::from_value(raw).unwrap()
}

fn payment(hash: &str, ledger_index: u32, from: &str, to: &str, drops: u64) -> TxEnvelope {
    envelope(json!({
        "hash": hash,
        "ledger_index": ledger_index,
        "date": 772_000_000 + ledger_index as i64,
        "TransactionType": "Payment",
        "Account": from,
        "Destination": to,
        "Amount": drops.to_string(),
        "meta": { "TransactionResult": "tesSUCCESS", "AffectedNodes": [] }
    }))
}

/// An OfferCreate by `TRADER` that survives on the books untouched.
fn open_offer(hash: &str, ledger_index: u32, sequence: u32, gets: u64, pays_usd: &str) -> TxEnvelope {
    envelope(json!({
        "hash": hash,
        "ledger_index": ledger_index,
        "date": 772_000_000 + ledger_index as i64,
        "TransactionType": "OfferCreate",
        "Account": TRADER,
        "Sequence": sequence,
        "TakerGets": gets.to_string(),
        "TakerPays": { "currency": "USD", "issuer": OUTSIDER, "value": pays_usd },
        "meta": { "TransactionResult": "tesSUCCESS", "AffectedNodes": [
            { "CreatedNode": { "LedgerEntryType": "Offer", "NewFields": {
                "Account": TRADER, "Sequence": sequence,
                "TakerGets": gets.to_string(),
                "TakerPays": { "currency": "USD", "issuer": OUTSIDER, "value": pays_usd }
            } } }
        ] }
    }))
}

/// A counterparty OfferCreate that partially consumes TRADER's resting offer.
fn crossing_offer(
    hash: &str,
    ledger_index: u32,
    sequence: u32,
    gets_before: u64,
    gets_after: u64,
    pays_before: &str,
    pays_after: &str,
) -> TxEnvelope {
    envelope(json!({
        "hash": hash,
        "ledger_index": ledger_index,
        "date": 772_000_000 + ledger_index as i64,
        "TransactionType": "OfferCreate",
        "Account": TAKER,
        "Sequence": 900,
        "TakerGets": { "currency": "USD", "issuer": OUTSIDER, "value": pays_before },
        "TakerPays": gets_before.to_string(),
        "meta": { "TransactionResult": "tesSUCCESS", "AffectedNodes": [
            { "ModifiedNode": { "LedgerEntryType": "Offer",
                "FinalFields": {
                    "Account": TRADER, "Sequence": sequence,
                    "TakerGets": gets_after.to_string(),
                    "TakerPays": { "currency": "USD", "issuer": OUTSIDER, "value": pays_after }
                },
                "PreviousFields": {
                    "TakerGets": gets_before.to_string(),
                    "TakerPays": { "currency": "USD", "issuer": OUTSIDER, "value": pays_before }
                } } }
        ] }
    }))
}

fn cancel_offer(hash: &str, ledger_index: u32, offer_sequence: u32) -> TxEnvelope {
    envelope(json!({
        "hash": hash,
        "ledger_index": ledger_index,
        "TransactionType": "OfferCancel",
        "Account": TRADER,
        "Sequence": 999,
        "OfferSequence": offer_sequence,
        "meta": { "TransactionResult": "tesSUCCESS", "AffectedNodes": [] }
    }))
}

fn api() -> (ReconciliationApi<MemoryStore>, MemoryStore, WatchedAccounts, AccountId) {
    support::init_logging();
    let store = MemoryStore::new();
    let api = ReconciliationApi::new(store.clone());
    let watched = WatchedAccounts::new([TRADER]);
    (api, store, watched, AccountId::from(TRADER))
}

#[tokio::test]
async fn deposit_round_trip() {
    let (api, store, watched, account) = api();
    let batch = vec![payment("DEP1", 1000, TAKER, TRADER, 1)];
    let summary = api.process_batch(&account, &watched, &batch).await.unwrap();
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.classified, 1);

    let transfers = store.transfers().await;
    assert_eq!(transfers.len(), 1);
    assert_eq!(transfers[0].direction, TransferDirection::Deposit);
    assert_eq!(transfers[0].amount, Amount::Native(1));
    assert_eq!(transfers[0].account, account);
    assert_eq!(transfers[0].counterparty, AccountId::from(TAKER));
}

#[tokio::test]
async fn withdrawal_from_watched_account() {
    let (api, store, watched, account) = api();
    let batch = vec![payment("WDR1", 1001, TRADER, OUTSIDER, 2_500_000)];
    api.process_batch(&account, &watched, &batch).await.unwrap();

    let transfers = store.transfers().await;
    assert_eq!(transfers.len(), 1);
    assert_eq!(transfers[0].direction, TransferDirection::Withdrawal);
    assert_eq!(transfers[0].counterparty, AccountId::from(OUTSIDER));
}

#[tokio::test]
async fn full_order_lifecycle_open_partial_fill_cancel() {
    let (api, store, watched, account) = api();
    let batch = vec![
        open_offer("OPN1", 2000, 7, 100, "10"),
        crossing_offer("FIL1", 2001, 7, 100, 60, "10", "6"),
        cancel_offer("CAN1", 2002, 7),
    ];
    let summary = api.process_batch(&account, &watched, &batch).await.unwrap();
    assert_eq!(summary.classified, 3);
    assert_eq!(summary.errors, 0);

    let key = OrderKey::new(account.clone(), 7);
    let order = store.order(&key).await.unwrap();
    // canceled after a partial fill: history preserved, status stays PartiallyFilled,
    // the cancellation marker carries the evidence
    assert_eq!(order.status, OrderStatus::PartiallyFilled);
    assert!(order.canceled_by.is_some());
    assert_eq!(order.canceled_by.as_ref().unwrap().tx_hash.as_str(), "CAN1");
    assert_eq!(order.trades.len(), 1);
    assert_eq!(order.trades[0].taken, Some(Amount::Native(40)));
    assert_eq!(order.remaining_taker_gets, Some(Amount::Native(60)));
    assert!(order.is_terminal());

    // a snapshot was emitted for each lifecycle change
    let snapshots = store.order_snapshots().await;
    assert_eq!(snapshots.len(), 3);
    assert_eq!(snapshots[0].status, OrderStatus::Open);
    assert_eq!(snapshots[1].status, OrderStatus::PartiallyFilled);
    assert!(snapshots[2].canceled_by.is_some());
}

#[tokio::test]
async fn atomically_consumed_offer_create_ends_filled_with_one_trade() {
    let (api, store, watched, account) = api();
    // no offer node for TRADER survives: the offer crossed completely on placement
    let tx = envelope(json!({
        "hash": "ATM1",
        "ledger_index": 2100,
        "TransactionType": "OfferCreate",
        "Account": TRADER,
        "Sequence": 8,
        "TakerGets": "100",
        "TakerPays": { "currency": "USD", "issuer": OUTSIDER, "value": "10" },
        "meta": { "TransactionResult": "tesSUCCESS", "AffectedNodes": [] }
    }));
    api.process_batch(&account, &watched, &[tx]).await.unwrap();

    let order = store.order(&OrderKey::new(account.clone(), 8)).await.unwrap();
    assert_eq!(order.status, OrderStatus::Filled);
    assert_eq!(order.trades.len(), 1);
    assert_eq!(order.trades[0].taken, Some(Amount::Native(100)));
    // no OfferOpen was ever observed for it
    assert!(order.created_tx_hash.is_none());
}

#[tokio::test]
async fn market_trade_and_counterparty_fills_land_on_the_audit_stream() {
    let (api, store, watched, _) = api();
    // TRADER converts currency; the consumed offer belongs to an unwatched maker
    let tx = envelope(json!({
        "hash": "MKT1",
        "ledger_index": 2200,
        "TransactionType": "Payment",
        "Account": TRADER,
        "Destination": TRADER,
        "Amount": { "currency": "USD", "issuer": OUTSIDER, "value": "10" },
        "SendMax": "11000000",
        "meta": { "TransactionResult": "tesSUCCESS", "AffectedNodes": [
            { "DeletedNode": { "LedgerEntryType": "Offer",
                "FinalFields": { "Account": TAKER, "Sequence": 55, "TakerGets": "0",
                    "TakerPays": { "currency": "USD", "issuer": OUTSIDER, "value": "0" } },
                "PreviousFields": {
                    "TakerGets": { "currency": "USD", "issuer": OUTSIDER, "value": "10" },
                    "TakerPays": "10000000" } } }
        ] }
    }));
    let account = AccountId::from(TRADER);
    let summary = api.process_batch(&account, &watched, &[tx]).await.unwrap();
    assert_eq!(summary.events, 2);

    let audits = store.audit_log().await;
    let reasons: Vec<_> = audits.iter().map(|a| a.reason.as_str()).collect();
    assert!(reasons.contains(&"market-trade"));
    assert!(reasons.contains(&"counterparty-offer-event"));
    // no order was mutated: the consumed offer belongs to the maker's stream
    assert_eq!(store.order_count().await, 0);
}

#[tokio::test]
async fn unclassifiable_and_failed_transactions_never_halt_the_batch() {
    let (api, store, watched, account) = api();
    let unknown = envelope(json!({
        "hash": "UNK1",
        "ledger_index": 2300,
        "TransactionType": "NFTokenMint",
        "Account": TRADER,
        "meta": { "TransactionResult": "tesSUCCESS", "AffectedNodes": [] }
    }));
    let failed = envelope(json!({
        "hash": "BAD1",
        "ledger_index": 2301,
        "TransactionType": "Payment",
        "Account": TAKER,
        "Destination": TRADER,
        "Amount": "100",
        "meta": { "TransactionResult": "tecUNFUNDED_PAYMENT", "AffectedNodes": [] }
    }));
    let good = payment("DEP2", 2302, TAKER, TRADER, 100);
    let summary = api.process_batch(&account, &watched, &[unknown, failed, good]).await.unwrap();
    assert_eq!(summary.processed, 3);
    assert_eq!(summary.skipped, 2);
    assert_eq!(summary.classified, 1);

    assert_eq!(store.transfers().await.len(), 1);
    let reasons: Vec<_> = store.audit_log().await.iter().map(|a| a.reason.clone()).collect();
    assert!(reasons.contains(&"unclassifiable".to_string()));
    assert!(reasons.contains(&"transaction-failed".to_string()));
}

#[tokio::test]
async fn watermark_advances_and_resumes() {
    let (api, store, watched, account) = api();
    assert_eq!(api.next_start_ledger(&account, 32_570).await.unwrap(), 32_570);

    let batch = vec![payment("DEP3", 5000, TAKER, TRADER, 10), payment("DEP4", 5004, TAKER, TRADER, 20)];
    api.process_batch(&account, &watched, &batch).await.unwrap();

    assert_eq!(store.last_processed_ledger(&account).await.unwrap(), Some(5004));
    assert_eq!(api.next_start_ledger(&account, 32_570).await.unwrap(), 5005);
}

#[tokio::test]
async fn fill_overtaking_its_open_synthesizes_without_corruption() {
    let (api, store, watched, account) = api();
    // the fill arrives first (cold start); the open replays later at a lower ledger index
    let batch = vec![
        crossing_offer("FIL9", 6000, 31, 100, 60, "10", "6"),
        open_offer("OPN9", 5990, 31, 100, "10"),
    ];
    let summary = api.process_batch(&account, &watched, &batch).await.unwrap();
    assert_eq!(summary.errors, 0);

    let order = store.order(&OrderKey::new(account.clone(), 31)).await.unwrap();
    assert_eq!(order.status, OrderStatus::PartiallyFilled);
    assert_eq!(order.trades.len(), 1);
    // the late open backfilled the originals but never reset what the fill consumed
    assert_eq!(order.original_taker_gets, Some(Amount::Native(100)));
    assert!(order.remaining_taker_gets.is_none());
    assert_eq!(order.created_tx_hash.as_ref().map(|h| h.as_str()), Some("OPN9"));
}

#[tokio::test]
async fn run_consumes_batches_from_a_stream() {
    let (api, store, watched, account) = api();
    let batches = vec![
        vec![payment("ST1", 7000, TAKER, TRADER, 1)],
        vec![payment("ST2", 7001, TAKER, TRADER, 2)],
    ];
    let summaries = api.run(&account, &watched, futures_util::stream::iter(batches)).await.unwrap();
    assert_eq!(summaries.len(), 2);
    assert_eq!(store.transfers().await.len(), 2);
    assert_eq!(store.last_processed_ledger(&account).await.unwrap(), Some(7001));
}
