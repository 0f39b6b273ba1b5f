use std::{cmp::Ordering, fmt::Display, str::FromStr};

use rust_decimal::Decimal;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Value};
use thiserror::Error;

pub const NATIVE_CURRENCY_CODE: &str = "XRP";
pub const DROPS_PER_XRP: i64 = 1_000_000;

//--------------------------------------      Amount       -----------------------------------------------------------
/// A ledger value. The ledger represents the native currency as a string of integer drops, and issued
/// currencies as a `{currency, issuer, value}` object with a decimal value. Both forms are preserved
/// exactly; issued values never pass through binary floating point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Amount {
    /// Native currency, in drops.
    Native(i64),
    Issued(IssuedAmount),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedAmount {
    pub currency: String,
    /// The issuing account. Trust-line balances reported in metadata omit the issuer, so it is
    /// optional here; two issued amounts only compare equal-asset when both currency and issuer match.
    pub issuer: Option<String>,
    pub value: Decimal,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AmountError {
    #[error("malformed ledger amount: {0}")]
    MalformedAmount(String),
    #[error("incompatible amounts: {0}")]
    IncompatibleAmount(String),
    #[error("amount arithmetic overflow: {0}")]
    ValueOverflow(String),
}

impl Amount {
    pub fn native(drops: i64) -> Self {
        Amount::Native(drops)
    }

    pub fn issued<C, I>(currency: C, issuer: Option<I>, value: Decimal) -> Self
    where
        C: Into<String>,
        I: Into<String>,
    {
        Amount::Issued(IssuedAmount { currency: currency.into(), issuer: issuer.map(Into::into), value })
    }

    /// Parses the ledger wire form of an amount: a numeric string of drops, or a
    /// `{currency, issuer, value}` object.
    pub fn parse(raw: &Value) -> Result<Self, AmountError> {
        match raw {
            Value::String(s) => {
                let drops = s
                    .parse::<i64>()
                    .map_err(|e| AmountError::MalformedAmount(format!("{s} is not a drops string: {e}")))?;
                Ok(Amount::Native(drops))
            },
            Value::Object(fields) => {
                let currency = fields
                    .get("currency")
                    .and_then(Value::as_str)
                    .ok_or_else(|| AmountError::MalformedAmount("issued amount is missing its currency".into()))?;
                let issuer = fields.get("issuer").and_then(Value::as_str).map(String::from);
                let value = fields
                    .get("value")
                    .and_then(Value::as_str)
                    .ok_or_else(|| AmountError::MalformedAmount("issued amount is missing its value".into()))?;
                let value = Decimal::from_str(value)
                    .or_else(|_| Decimal::from_scientific(value))
                    .map_err(|e| AmountError::MalformedAmount(format!("{value} is not a decimal value: {e}")))?;
                Ok(Amount::issued(currency, issuer, value))
            },
            other => Err(AmountError::MalformedAmount(format!("expected a string or object, got {other}"))),
        }
    }

    /// The ledger wire form of this amount, as accepted by [`Amount::parse`].
    pub fn to_wire(&self) -> Value {
        match self {
            Amount::Native(drops) => Value::String(drops.to_string()),
            Amount::Issued(a) => match &a.issuer {
                Some(issuer) => json!({ "currency": a.currency, "issuer": issuer, "value": a.value.to_string() }),
                None => json!({ "currency": a.currency, "value": a.value.to_string() }),
            },
        }
    }

    /// True when `other` denominates the same asset: both native, or both issued with identical
    /// currency and issuer. Arithmetic and comparison are only defined between same-asset amounts.
    pub fn same_asset(&self, other: &Amount) -> bool {
        match (self, other) {
            (Amount::Native(_), Amount::Native(_)) => true,
            (Amount::Issued(a), Amount::Issued(b)) => a.currency == b.currency && a.issuer == b.issuer,
            _ => false,
        }
    }

    pub fn checked_sub(&self, other: &Amount) -> Result<Amount, AmountError> {
        match (self, other) {
            (Amount::Native(a), Amount::Native(b)) => a
                .checked_sub(*b)
                .map(Amount::Native)
                .ok_or_else(|| AmountError::ValueOverflow(format!("{a} - {b} drops"))),
            (Amount::Issued(a), Amount::Issued(b)) if self.same_asset(other) => {
                let value = a
                    .value
                    .checked_sub(b.value)
                    .ok_or_else(|| AmountError::ValueOverflow(format!("{} - {} {}", a.value, b.value, a.currency)))?;
                Ok(Amount::Issued(IssuedAmount { value, ..a.clone() }))
            },
            _ => Err(AmountError::IncompatibleAmount(format!("cannot subtract {other} from {self}"))),
        }
    }

    pub fn checked_add(&self, other: &Amount) -> Result<Amount, AmountError> {
        match (self, other) {
            (Amount::Native(a), Amount::Native(b)) => a
                .checked_add(*b)
                .map(Amount::Native)
                .ok_or_else(|| AmountError::ValueOverflow(format!("{a} + {b} drops"))),
            (Amount::Issued(a), Amount::Issued(b)) if self.same_asset(other) => {
                let value = a
                    .value
                    .checked_add(b.value)
                    .ok_or_else(|| AmountError::ValueOverflow(format!("{} + {} {}", a.value, b.value, a.currency)))?;
                Ok(Amount::Issued(IssuedAmount { value, ..a.clone() }))
            },
            _ => Err(AmountError::IncompatibleAmount(format!("cannot add {other} to {self}"))),
        }
    }

    pub fn compare(&self, other: &Amount) -> Result<Ordering, AmountError> {
        match (self, other) {
            (Amount::Native(a), Amount::Native(b)) => Ok(a.cmp(b)),
            (Amount::Issued(a), Amount::Issued(b)) if self.same_asset(other) => Ok(a.value.cmp(&b.value)),
            _ => Err(AmountError::IncompatibleAmount(format!("cannot compare {self} with {other}"))),
        }
    }

    pub fn is_zero(&self) -> bool {
        match self {
            Amount::Native(drops) => *drops == 0,
            Amount::Issued(a) => a.value.is_zero(),
        }
    }

    pub fn is_negative(&self) -> bool {
        match self {
            Amount::Native(drops) => *drops < 0,
            Amount::Issued(a) => a.value.is_sign_negative() && !a.value.is_zero(),
        }
    }

    pub fn abs(&self) -> Amount {
        match self {
            Amount::Native(drops) => Amount::Native(drops.abs()),
            Amount::Issued(a) => Amount::Issued(IssuedAmount { value: a.value.abs(), ..a.clone() }),
        }
    }

    /// A zero amount denominated in the same asset as `self`. Used to clamp remaining order
    /// amounts when an order fills completely.
    pub fn zero_like(&self) -> Amount {
        match self {
            Amount::Native(_) => Amount::Native(0),
            Amount::Issued(a) => Amount::Issued(IssuedAmount { value: Decimal::ZERO, ..a.clone() }),
        }
    }
}

impl Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Amount::Native(drops) => write!(f, "{} {NATIVE_CURRENCY_CODE}", Decimal::new(*drops, 6)),
            Amount::Issued(a) => write!(f, "{} {}", a.value, a.currency),
        }
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        self.to_wire().serialize(s)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(d)?;
        Amount::parse(&raw).map_err(de::Error::custom)
    }
}
