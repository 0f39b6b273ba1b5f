mod amount;

pub use amount::{Amount, AmountError, IssuedAmount, DROPS_PER_XRP, NATIVE_CURRENCY_CODE};
