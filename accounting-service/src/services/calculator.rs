//! Derived financial fields for sales.
//!
//! All arithmetic is done in `Decimal`. The calculator has no error
//! conditions: unusable numeric input is coerced to zero before it gets here,
//! and request validation keeps amounts within `MAX_AMOUNT` and percentages
//! within 0..=100, so no operation below can overflow.

use rust_decimal::prelude::*;
use rust_decimal::RoundingStrategy;
use rust_decimal_macros::dec;

use crate::models::DerivedFields;

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Largest amount a form may carry.
pub const MAX_AMOUNT: Decimal = dec!(1_000_000_000_000_000);

/// Decimal places kept from user input.
pub const INPUT_SCALE: u32 = 6;

/// Money inputs the derived fields depend on.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FinancialInputs {
    pub sale_amount: Decimal,
    pub cogs: Decimal,
    pub transaction_fee_percent: Decimal,
    pub payment_received: Decimal,
}

/// Compute every derived field from the four inputs.
///
/// Margins are percentages of the sale amount rounded to two places and are
/// zero when the sale amount is zero. The outstanding balance is not clamped,
/// so an overpayment shows as a negative balance.
pub fn compute(inputs: FinancialInputs) -> DerivedFields {
    let FinancialInputs {
        sale_amount,
        cogs,
        transaction_fee_percent,
        payment_received,
    } = inputs;

    let transaction_fee_amount = sale_amount * transaction_fee_percent / HUNDRED;
    let profit_loss = sale_amount - cogs;
    let net_profit_loss = sale_amount - cogs - transaction_fee_amount;

    DerivedFields {
        transaction_fee_amount,
        profit_loss,
        net_profit_loss,
        profit_margin: percent_of(profit_loss, sale_amount),
        net_profit_margin: percent_of(net_profit_loss, sale_amount),
        outstanding_balance: sale_amount - payment_received,
    }
}

/// `part / whole * 100`, rounded to two places; zero when `whole` is zero.
pub fn percent_of(part: Decimal, whole: Decimal) -> Decimal {
    if whole.is_zero() {
        return Decimal::ZERO;
    }
    (part / whole * HUNDRED).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Parse a user-entered amount, rounded to `INPUT_SCALE` places.
fn try_parse_amount(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return None;
    }
    Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .ok()
        .map(|d| d.round_dp(INPUT_SCALE))
}

/// Serde helpers that accept numbers, numeric strings, empty strings and
/// nulls for money fields, the way HTML forms submit them.
pub mod lenient {
    use super::try_parse_amount;
    use rust_decimal::Decimal;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    fn coerce(value: Option<Value>) -> Option<Decimal> {
        match value? {
            Value::Number(n) => try_parse_amount(&n.to_string()),
            Value::String(s) => try_parse_amount(&s),
            _ => None,
        }
    }

    /// Missing, null, empty or malformed values become zero.
    pub fn decimal<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(coerce(value).unwrap_or(Decimal::ZERO))
    }

    /// Missing, null, empty or malformed values become `None`.
    pub fn optional_decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(coerce(value))
    }
}
