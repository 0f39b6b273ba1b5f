//! Normalizes a transaction's affected-node metadata into typed per-object deltas.
//!
//! The ledger reports every object a transaction touched, with before/after field snapshots. This
//! module turns that loosely-typed list into tagged [`LedgerObjectDelta`] variants, preserving the
//! order the ledger reported them in — the classifier relies on that order to disambiguate
//! multiple offers touched by one transaction.

use log::warn;
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use thiserror::Error;
use xrc_common::{Amount, AmountError};

use crate::ledger_types::{AccountId, AffectedNode, NodeFields, TxEnvelope};

#[derive(Debug, Clone, Error)]
pub enum MetaDiffError {
    /// The engine does not model this ledger object kind. Always a skip-and-log, never fatal.
    #[error("unrecognized ledger object kind: {0}")]
    UnrecognizedObjectKind(String),
    #[error("malformed {kind} node: {reason}")]
    MalformedNode { kind: String, reason: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
}

/// Before/after values of a single ledger-object field. A numeric field absent from the previous
/// snapshot is implicitly absent (`before: None`), so a first-time value reads as the full delta.
#[derive(Clone, Debug, Default)]
pub struct FieldDelta<T> {
    pub before: Option<T>,
    pub after: Option<T>,
}

impl FieldDelta<Amount> {
    /// The amount consumed from this field: `before - after` when both are known and the result is
    /// strictly positive. A currency mismatch between the two snapshots of one field is a ledger
    /// invariant violation and surfaces as `IncompatibleAmount`.
    pub fn consumed(&self) -> Result<Option<Amount>, AmountError> {
        match (&self.before, &self.after) {
            (Some(before), Some(after)) => {
                let diff = before.checked_sub(after)?;
                if diff.is_zero() || diff.is_negative() {
                    Ok(None)
                } else {
                    Ok(Some(diff))
                }
            },
            _ => Ok(None),
        }
    }
}

#[derive(Clone, Debug)]
pub enum LedgerObjectDelta {
    Offer(OfferDelta),
    AccountRoot(AccountRootDelta),
    RippleState(RippleStateDelta),
}

/// A touched offer object, identified by its owner and creation sequence.
#[derive(Clone, Debug)]
pub struct OfferDelta {
    pub change: ChangeKind,
    pub owner: AccountId,
    pub sequence: u32,
    pub taker_gets: FieldDelta<Amount>,
    pub taker_pays: FieldDelta<Amount>,
}

/// An account's root object; carries the native-currency balance.
#[derive(Clone, Debug)]
pub struct AccountRootDelta {
    pub change: ChangeKind,
    pub account: AccountId,
    pub balance: FieldDelta<Amount>,
}

/// A trust line between two accounts. The balance is stored from the low account's perspective.
#[derive(Clone, Debug)]
pub struct RippleStateDelta {
    pub change: ChangeKind,
    pub low: AccountId,
    pub high: AccountId,
    pub currency: String,
    pub balance: FieldDelta<Decimal>,
}

/// A signed per-account balance movement derived from the delta set.
#[derive(Clone, Debug, PartialEq)]
pub struct BalanceChange {
    pub account: AccountId,
    pub delta: Amount,
}

/// Diffs every affected node of a transaction, in ledger report order. Nodes the engine cannot
/// model are logged with transaction context and skipped; they never block the rest of the set.
pub fn diff_tx(tx: &TxEnvelope) -> Vec<LedgerObjectDelta> {
    let mut deltas = Vec::with_capacity(tx.meta.affected_nodes.len());
    for node in &tx.meta.affected_nodes {
        match diff_node(node) {
            Ok(delta) => deltas.push(delta),
            Err(e) => {
                warn!("🔍️ Skipping affected node of {} (ledger {}): {e}", tx.hash, tx.ledger_index);
            },
        }
    }
    deltas
}

/// Diffs a single affected node.
pub fn diff_node(node: &AffectedNode) -> Result<LedgerObjectDelta, MetaDiffError> {
    let (change, fields) = match node {
        AffectedNode::Created(f) => (ChangeKind::Created, f),
        AffectedNode::Modified(f) => (ChangeKind::Modified, f),
        AffectedNode::Deleted(f) => (ChangeKind::Deleted, f),
    };
    match fields.entry_type.as_str() {
        "Offer" => offer_delta(change, fields).map(LedgerObjectDelta::Offer),
        "AccountRoot" => account_root_delta(change, fields).map(LedgerObjectDelta::AccountRoot),
        "RippleState" => ripple_state_delta(change, fields).map(LedgerObjectDelta::RippleState),
        other => Err(MetaDiffError::UnrecognizedObjectKind(other.to_string())),
    }
}

/// The fields describing the object's current (or last known) state: `NewFields` for created
/// nodes, `FinalFields` otherwise.
fn current_fields(change: ChangeKind, fields: &NodeFields) -> &Map<String, Value> {
    match change {
        ChangeKind::Created if !fields.new_fields.is_empty() => &fields.new_fields,
        _ => &fields.final_fields,
    }
}

fn malformed(kind: &str, reason: impl Into<String>) -> MetaDiffError {
    MetaDiffError::MalformedNode { kind: kind.to_string(), reason: reason.into() }
}

/// A required non-numeric field: absent from the previous snapshot means unchanged from final.
fn required_str<'a>(current: &'a Map<String, Value>, kind: &str, name: &str) -> Result<&'a str, MetaDiffError> {
    current
        .get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| malformed(kind, format!("missing {name}")))
}

fn amount_field(
    change: ChangeKind,
    fields: &NodeFields,
    kind: &str,
    name: &str,
) -> Result<FieldDelta<Amount>, MetaDiffError> {
    let parse = |raw: Option<&Value>| -> Result<Option<Amount>, MetaDiffError> {
        raw.map(Amount::parse)
            .transpose()
            .map_err(|e| malformed(kind, format!("{name}: {e}")))
    };
    let after = parse(current_fields(change, fields).get(name))?;
    let before = parse(fields.previous_fields.get(name))?;
    Ok(FieldDelta { before, after })
}

fn offer_delta(change: ChangeKind, fields: &NodeFields) -> Result<OfferDelta, MetaDiffError> {
    let current = current_fields(change, fields);
    let owner = AccountId::from(required_str(current, "Offer", "Account")?);
    let sequence = current
        .get("Sequence")
        .and_then(Value::as_u64)
        .ok_or_else(|| malformed("Offer", "missing Sequence"))? as u32;
    let taker_gets = amount_field(change, fields, "Offer", "TakerGets")?;
    let taker_pays = amount_field(change, fields, "Offer", "TakerPays")?;
    Ok(OfferDelta { change, owner, sequence, taker_gets, taker_pays })
}

fn account_root_delta(change: ChangeKind, fields: &NodeFields) -> Result<AccountRootDelta, MetaDiffError> {
    let current = current_fields(change, fields);
    let account = AccountId::from(required_str(current, "AccountRoot", "Account")?);
    let balance = amount_field(change, fields, "AccountRoot", "Balance")?;
    Ok(AccountRootDelta { change, account, balance })
}

fn ripple_state_delta(change: ChangeKind, fields: &NodeFields) -> Result<RippleStateDelta, MetaDiffError> {
    let current = current_fields(change, fields);
    let limit_issuer = |name: &str| -> Result<AccountId, MetaDiffError> {
        let limit = current
            .get(name)
            .and_then(Value::as_object)
            .ok_or_else(|| malformed("RippleState", format!("missing {name}")))?;
        Ok(AccountId::from(required_str(limit, "RippleState", "issuer")?))
    };
    let low = limit_issuer("LowLimit")?;
    let high = limit_issuer("HighLimit")?;
    let balance = amount_field(change, fields, "RippleState", "Balance")?;
    let currency = match (&balance.after, &balance.before) {
        (Some(Amount::Issued(a)), _) | (_, Some(Amount::Issued(a))) => a.currency.clone(),
        _ => return Err(malformed("RippleState", "missing Balance")),
    };
    let to_value = |amount: &Option<Amount>| match amount {
        Some(Amount::Issued(a)) => Some(a.value),
        _ => None,
    };
    let balance = FieldDelta { before: to_value(&balance.before), after: to_value(&balance.after) };
    Ok(RippleStateDelta { change, low, high, currency, balance })
}

/// Per-account signed balance changes across the whole delta set: native movements from
/// account-root balances, issued movements from trust lines. The trust-line balance is stored from
/// the low account's perspective, so the high account's movement is the negation, and each side's
/// counterparty acts as the issuer.
pub fn balance_changes(deltas: &[LedgerObjectDelta]) -> Vec<BalanceChange> {
    let mut changes = Vec::new();
    for delta in deltas {
        match delta {
            LedgerObjectDelta::AccountRoot(root) => {
                let before = root.balance.before.clone().unwrap_or(Amount::Native(0));
                let after = root.balance.after.clone().unwrap_or(Amount::Native(0));
                match after.checked_sub(&before) {
                    Ok(d) if !d.is_zero() => changes.push(BalanceChange { account: root.account.clone(), delta: d }),
                    Ok(_) => {},
                    Err(e) => warn!("🔍️ Ignoring account-root balance for {}: {e}", root.account),
                }
            },
            LedgerObjectDelta::RippleState(line) => {
                let before = line.balance.before.unwrap_or(Decimal::ZERO);
                let after = line.balance.after.unwrap_or(Decimal::ZERO);
                let d = after - before;
                if d.is_zero() {
                    continue;
                }
                changes.push(BalanceChange {
                    account: line.low.clone(),
                    delta: Amount::issued(line.currency.clone(), Some(line.high.as_str()), d),
                });
                changes.push(BalanceChange {
                    account: line.high.clone(),
                    delta: Amount::issued(line.currency.clone(), Some(line.low.as_str()), -d),
                });
            },
            LedgerObjectDelta::Offer(_) => {},
        }
    }
    changes
}
