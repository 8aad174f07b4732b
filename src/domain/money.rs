//! Currency helpers.
//!
//! All amounts are [`Decimal`] in Singapore dollars. Arithmetic stays exact;
//! values are rounded to cents only where they cross the API boundary.

use rust_decimal::{Decimal, RoundingStrategy};

/// The only currency the service settles in.
pub const CURRENCY: &str = "SGD";

/// Rounds an amount to two decimal places, midpoint away from zero.
#[must_use]
pub fn round_cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Converts a whole number of cents into an amount.
#[must_use]
pub fn cents(value: i64) -> Decimal {
    Decimal::new(value, 2)
}

/// Formats an amount for user-facing messages, e.g. `S$23.75`.
#[must_use]
pub fn display_sgd(amount: Decimal) -> String {
    format!("S${:.2}", round_cents(amount))
}
