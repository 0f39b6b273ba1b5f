use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use xrc_common::Amount;

//--------------------------------------     AccountId       ---------------------------------------------------------
/// A lightweight wrapper around a string representing a ledger account address
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub String);

impl Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<S: Into<String>> From<S> for AccountId {
    fn from(value: S) -> Self {
        Self(value.into())
    }
}

impl AccountId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------      TxHash        ----------------------------------------------------------
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxHash(pub String);

impl Display for TxHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<S: Into<String>> From<S> for TxHash {
    fn from(value: S) -> Self {
        Self(value.into())
    }
}

impl TxHash {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------      TxType        ----------------------------------------------------------
/// The ledger transaction types the engine models. Everything else is carried verbatim in `Other`
/// so that the classifier can report exactly what it refused to classify.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TxType {
    Payment,
    OfferCreate,
    OfferCancel,
    Other(String),
}

impl Display for TxType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TxType::Payment => write!(f, "Payment"),
            TxType::OfferCreate => write!(f, "OfferCreate"),
            TxType::OfferCancel => write!(f, "OfferCancel"),
            TxType::Other(s) => write!(f, "{s}"),
        }
    }
}

impl<'de> Deserialize<'de> for TxType {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        Ok(match s.as_str() {
            "Payment" => TxType::Payment,
            "OfferCreate" => TxType::OfferCreate,
            "OfferCancel" => TxType::OfferCancel,
            _ => TxType::Other(s),
        })
    }
}

//--------------------------------------     TxEnvelope      ---------------------------------------------------------
/// One finalized ledger transaction together with its metadata, as delivered by the transport
/// collaborator. Deserializes directly from the XRPL transaction JSON (with the metadata under
/// either the `meta` or `metaData` key).
#[derive(Clone, Debug, Deserialize)]
pub struct TxEnvelope {
    pub hash: TxHash,
    pub ledger_index: u32,
    /// Ledger close time in ripple-epoch seconds (seconds since 2000-01-01T00:00:00Z).
    #[serde(rename = "date", default)]
    pub close_time: Option<i64>,
    #[serde(rename = "TransactionType")]
    pub tx_type: TxType,
    #[serde(rename = "Account")]
    pub account: AccountId,
    #[serde(rename = "Destination", default)]
    pub destination: Option<AccountId>,
    #[serde(rename = "Amount", default)]
    pub amount: Option<Amount>,
    #[serde(rename = "SendMax", default)]
    pub send_max: Option<Amount>,
    #[serde(rename = "TakerGets", default)]
    pub taker_gets: Option<Amount>,
    #[serde(rename = "TakerPays", default)]
    pub taker_pays: Option<Amount>,
    #[serde(rename = "Flags", default)]
    pub flags: u32,
    #[serde(rename = "Sequence", default)]
    pub sequence: u32,
    /// For OfferCancel: the sequence number of the offer being canceled.
    #[serde(rename = "OfferSequence", default)]
    pub offer_sequence: Option<u32>,
    #[serde(rename = "SourceTag", default)]
    pub source_tag: Option<u32>,
    #[serde(rename = "DestinationTag", default)]
    pub destination_tag: Option<u32>,
    #[serde(rename = "Memos", default)]
    pub memos: Vec<MemoWrapper>,
    #[serde(rename = "meta", alias = "metaData", default)]
    pub meta: TxMeta,
}

impl TxEnvelope {
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.close_time.and_then(crate::helpers::ripple_time_to_utc)
    }

    /// True when the transaction was applied successfully. Transactions that reached the ledger
    /// but failed (tec-class results) still carry metadata, which must not be reconciled.
    pub fn succeeded(&self) -> bool {
        self.meta.result.as_deref().map(|r| r == "tesSUCCESS").unwrap_or(true)
    }
}

//--------------------------------------       TxMeta        ---------------------------------------------------------
#[derive(Clone, Debug, Default, Deserialize)]
pub struct TxMeta {
    #[serde(rename = "AffectedNodes", default)]
    pub affected_nodes: Vec<AffectedNode>,
    #[serde(rename = "TransactionResult", default)]
    pub result: Option<String>,
    /// The amount actually delivered by a payment, which can differ from the `Amount` field for
    /// partial payments. Older ledgers report it as `DeliveredAmount`.
    #[serde(rename = "delivered_amount", alias = "DeliveredAmount", default)]
    pub delivered_amount: Option<Amount>,
}

/// One entry of the metadata's affected-node list. The ledger reports each touched object under
/// exactly one of these keys.
#[derive(Clone, Debug, Deserialize)]
pub enum AffectedNode {
    #[serde(rename = "CreatedNode")]
    Created(NodeFields),
    #[serde(rename = "ModifiedNode")]
    Modified(NodeFields),
    #[serde(rename = "DeletedNode")]
    Deleted(NodeFields),
}

impl AffectedNode {
    pub fn fields(&self) -> &NodeFields {
        match self {
            AffectedNode::Created(f) | AffectedNode::Modified(f) | AffectedNode::Deleted(f) => f,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct NodeFields {
    #[serde(rename = "LedgerEntryType", default)]
    pub entry_type: String,
    #[serde(rename = "LedgerIndex", default)]
    pub ledger_index: Option<String>,
    #[serde(rename = "FinalFields", default)]
    pub final_fields: Map<String, Value>,
    #[serde(rename = "PreviousFields", default)]
    pub previous_fields: Map<String, Value>,
    #[serde(rename = "NewFields", default)]
    pub new_fields: Map<String, Value>,
}

//--------------------------------------       Memos         ---------------------------------------------------------
#[derive(Clone, Debug, Default, Deserialize)]
pub struct MemoWrapper {
    #[serde(rename = "Memo", default)]
    pub memo: Memo,
}

/// A transaction memo. All three fields are hex-encoded on the wire.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Memo {
    #[serde(rename = "MemoData", default)]
    pub data: Option<String>,
    #[serde(rename = "MemoType", default)]
    pub memo_type: Option<String>,
    #[serde(rename = "MemoFormat", default)]
    pub format: Option<String>,
}

//--------------------------------------      OrderKey       ---------------------------------------------------------
/// The ledger-wide identity of a resting offer: the owning account plus the account sequence
/// number of the transaction that created it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderKey {
    pub owner: AccountId,
    pub sequence: u32,
}

impl OrderKey {
    pub fn new(owner: AccountId, sequence: u32) -> Self {
        Self { owner, sequence }
    }
}

impl Display for OrderKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.sequence)
    }
}

//--------------------------------------     OrderStatus     ---------------------------------------------------------
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    /// The offer is resting on the books with its full original amounts.
    Open,
    /// Some, but not all, of the offer has been consumed. A canceled order that had prior fills
    /// keeps this status, with [`Order::canceled_by`] set.
    PartiallyFilled,
    /// The offer was consumed completely.
    Filled,
    /// The offer was canceled before anything was filled.
    Canceled,
}

impl Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::Open => write!(f, "Open"),
            OrderStatus::PartiallyFilled => write!(f, "PartiallyFilled"),
            OrderStatus::Filled => write!(f, "Filled"),
            OrderStatus::Canceled => write!(f, "Canceled"),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid order status: {0}")]
pub struct OrderStatusConversionError(String);

impl FromStr for OrderStatus {
    type Err = OrderStatusConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Open" => Ok(Self::Open),
            "PartiallyFilled" => Ok(Self::PartiallyFilled),
            "Filled" => Ok(Self::Filled),
            "Canceled" => Ok(Self::Canceled),
            s => Err(OrderStatusConversionError(s.to_string())),
        }
    }
}

//--------------------------------------       Trade         ---------------------------------------------------------
/// One fill against a resting offer. Immutable once recorded.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub tx_hash: TxHash,
    pub ledger_index: u32,
    pub timestamp: Option<DateTime<Utc>>,
    /// Amount subtracted from the offer's TakerGets side. `None` when the originals were unknown
    /// (synthesized cold-start orders) and the metadata did not expose the consumed amount.
    pub taken: Option<Amount>,
    /// Amount subtracted from the offer's TakerPays side.
    pub paid: Option<Amount>,
    pub counterparty: Option<AccountId>,
}

//--------------------------------------     AuditNote       ---------------------------------------------------------
/// An out-of-band note attached to an order: events that arrived after the order reached a
/// terminal status, or while it was frozen, are recorded here instead of mutating the order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditNote {
    pub tx_hash: TxHash,
    pub ledger_index: u32,
    pub note: String,
}

//--------------------------------------  CancellationMarker  --------------------------------------------------------
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancellationMarker {
    pub tx_hash: TxHash,
    pub ledger_index: u32,
}

//--------------------------------------       Order         ---------------------------------------------------------
/// The reconciled lifecycle state of one resting offer.
///
/// Orders created before the engine began observing an account are synthesized on first contact
/// with unknown creation details and amounts; those fields are `None` until (and unless) a later
/// replay supplies them.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Order {
    pub owner: AccountId,
    pub sequence: u32,
    pub created_tx_hash: Option<TxHash>,
    pub created_ledger_index: Option<u32>,
    pub created_at: Option<DateTime<Utc>>,
    pub original_taker_gets: Option<Amount>,
    pub original_taker_pays: Option<Amount>,
    pub remaining_taker_gets: Option<Amount>,
    pub remaining_taker_pays: Option<Amount>,
    pub status: OrderStatus,
    /// Set when an OfferCancel resolved this order. For orders with prior fills the status stays
    /// `PartiallyFilled` and this marker is the only cancellation evidence.
    pub canceled_by: Option<CancellationMarker>,
    /// A frozen order failed an invariant check and is quarantined for manual reconciliation; the
    /// tracker refuses to mutate it further.
    pub frozen: bool,
    pub last_updated_ledger: u32,
    pub trades: Vec<Trade>,
    pub notes: Vec<AuditNote>,
}

impl Order {
    pub fn key(&self) -> OrderKey {
        OrderKey::new(self.owner.clone(), self.sequence)
    }

    /// A terminal order accepts no further lifecycle mutations. Cancellation is terminal even when
    /// the reported status remains `PartiallyFilled`.
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, OrderStatus::Filled | OrderStatus::Canceled) || self.canceled_by.is_some()
    }

    /// A brand-new open order, created from an observed OfferCreate.
    pub fn open(
        key: OrderKey,
        tx_hash: TxHash,
        ledger_index: u32,
        created_at: Option<DateTime<Utc>>,
        taker_gets: Amount,
        taker_pays: Amount,
        remaining_gets: Option<Amount>,
        remaining_pays: Option<Amount>,
    ) -> Self {
        Self {
            owner: key.owner,
            sequence: key.sequence,
            created_tx_hash: Some(tx_hash),
            created_ledger_index: Some(ledger_index),
            created_at,
            remaining_taker_gets: Some(remaining_gets.unwrap_or_else(|| taker_gets.clone())),
            remaining_taker_pays: Some(remaining_pays.unwrap_or_else(|| taker_pays.clone())),
            original_taker_gets: Some(taker_gets),
            original_taker_pays: Some(taker_pays),
            status: OrderStatus::Open,
            canceled_by: None,
            frozen: false,
            last_updated_ledger: ledger_index,
            trades: Vec::new(),
            notes: Vec::new(),
        }
    }

    /// The cold-start fallback: a minimal open entry for an order whose creation predates the
    /// engine's observation window, so that fills and cancels are never dropped.
    pub fn synthesized(key: OrderKey, ledger_index: u32) -> Self {
        Self {
            owner: key.owner,
            sequence: key.sequence,
            created_tx_hash: None,
            created_ledger_index: None,
            created_at: None,
            original_taker_gets: None,
            original_taker_pays: None,
            remaining_taker_gets: None,
            remaining_taker_pays: None,
            status: OrderStatus::Open,
            canceled_by: None,
            frozen: false,
            last_updated_ledger: ledger_index,
            trades: Vec::new(),
            notes: Vec::new(),
        }
    }
}

//-------------------------------------- DepositWithdrawal  ----------------------------------------------------------
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferDirection {
    Deposit,
    Withdrawal,
}

impl Display for TransferDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransferDirection::Deposit => write!(f, "Deposit"),
            TransferDirection::Withdrawal => write!(f, "Withdrawal"),
        }
    }
}

/// A single-currency payment into or out of a watched account. Immutable once recorded.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DepositWithdrawal {
    pub tx_hash: TxHash,
    pub ledger_index: u32,
    pub timestamp: Option<DateTime<Utc>>,
    pub direction: TransferDirection,
    /// The watched account this record is relative to.
    pub account: AccountId,
    pub counterparty: AccountId,
    pub amount: Amount,
}

//--------------------------------------   ClassifiedEvent   ---------------------------------------------------------
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FillKind {
    Full,
    Partial,
}

/// The semantic category and payload assigned to (part of) a transaction by the classifier.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum EventKind {
    Deposit {
        watched: AccountId,
        counterparty: AccountId,
        amount: Amount,
    },
    Withdrawal {
        watched: AccountId,
        counterparty: AccountId,
        amount: Amount,
    },
    /// A cross-currency payment that consumed offers on the books.
    MarketTrade {
        sold: Option<Amount>,
        bought: Option<Amount>,
    },
    OfferOpen {
        owner: AccountId,
        sequence: u32,
        taker_gets: Amount,
        taker_pays: Amount,
        /// Remaining amounts of the surviving ledger object, which are lower than the originals
        /// when the offer partially crossed on placement.
        remaining_gets: Option<Amount>,
        remaining_pays: Option<Amount>,
    },
    OfferFill {
        owner: AccountId,
        sequence: u32,
        fill: FillKind,
        taken: Option<Amount>,
        paid: Option<Amount>,
        counterparty: Option<AccountId>,
    },
    OfferCancel {
        owner: AccountId,
        sequence: u32,
    },
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Deposit { .. } => "Deposit",
            EventKind::Withdrawal { .. } => "Withdrawal",
            EventKind::MarketTrade { .. } => "MarketTrade",
            EventKind::OfferOpen { .. } => "OfferOpen",
            EventKind::OfferFill { .. } => "OfferFill",
            EventKind::OfferCancel { .. } => "OfferCancel",
        }
    }

    /// The order key this event addresses, for the offer-lifecycle categories.
    pub fn order_key(&self) -> Option<OrderKey> {
        match self {
            EventKind::OfferOpen { owner, sequence, .. }
            | EventKind::OfferFill { owner, sequence, .. }
            | EventKind::OfferCancel { owner, sequence } => Some(OrderKey::new(owner.clone(), *sequence)),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedEvent {
    pub tx_hash: TxHash,
    pub ledger_index: u32,
    pub timestamp: Option<DateTime<Utc>>,
    /// The account that submitted the originating transaction.
    pub account: AccountId,
    pub kind: EventKind,
}

//--------------------------------------    AuditRecord      ---------------------------------------------------------
/// An audit-stream entry for transactions (or parts of transactions) that could not be fully
/// reconciled, plus informational events that have no dedicated record stream.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub tx_hash: TxHash,
    pub ledger_index: u32,
    pub reason: String,
    pub detail: String,
}

impl AuditRecord {
    pub fn new(tx_hash: TxHash, ledger_index: u32, reason: impl Into<String>, detail: impl Into<String>) -> Self {
        Self { tx_hash, ledger_index, reason: reason.into(), detail: detail.into() }
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    #[test]
    fn envelope_deserializes_from_ledger_json() {
        let tx: TxEnvelope = serde_json::from_value(json!({
            "hash": "ABC123",
            "ledger_index": 7_654_321,
            "date": 772_000_000,
            "TransactionType": "Payment",
            "Account": "rSender",
            "Destination": "rReceiver",
            "Amount": "1000000",
            "Flags": 0,
            "Sequence": 42,
            "meta": {
                "TransactionResult": "tesSUCCESS",
                "AffectedNodes": []
            }
        }))
        .unwrap();
        assert_eq!(tx.tx_type, TxType::Payment);
        assert_eq!(tx.amount, Some(Amount::Native(1_000_000)));
        assert_eq!(tx.destination, Some(AccountId::from("rReceiver")));
        assert!(tx.succeeded());
        assert!(tx.timestamp().is_some());
    }

    #[test]
    fn envelope_accepts_meta_data_alias() {
        let tx: TxEnvelope = serde_json::from_value(json!({
            "hash": "DEF",
            "ledger_index": 1,
            "TransactionType": "AMMDeposit",
            "Account": "rSomeone",
            "metaData": { "TransactionResult": "tecKILLED" }
        }))
        .unwrap();
        assert_eq!(tx.tx_type, TxType::Other("AMMDeposit".to_string()));
        assert!(!tx.succeeded());
    }

    #[test]
    fn affected_node_variants_deserialize() {
        let node: AffectedNode = serde_json::from_value(json!({
            "DeletedNode": {
                "LedgerEntryType": "Offer",
                "FinalFields": { "Account": "rMaker", "Sequence": 9 }
            }
        }))
        .unwrap();
        assert!(matches!(&node, AffectedNode::Deleted(f) if f.entry_type == "Offer"));
    }

    #[test]
    fn order_status_round_trips_as_string() {
        for status in [OrderStatus::Open, OrderStatus::PartiallyFilled, OrderStatus::Filled, OrderStatus::Canceled] {
            assert_eq!(status.to_string().parse::<OrderStatus>().unwrap(), status);
        }
        assert!("Expired".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn canceled_with_history_is_terminal() {
        let mut order = Order::synthesized(OrderKey::new("rMaker".into(), 5), 100);
        order.status = OrderStatus::PartiallyFilled;
        assert!(!order.is_terminal());
        order.canceled_by = Some(CancellationMarker { tx_hash: "FEED".into(), ledger_index: 101 });
        assert!(order.is_terminal());
    }
}
