//! Itemized price quotes.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{QuoteId, ServiceType};

/// Classification of a quote line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum LineItemKind {
    /// A purchased item.
    Item,
    /// A service or platform fee.
    Fee,
    /// A customer-declared spending budget, escrowed in full.
    Budget,
}

/// One priced line of a quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LineItem {
    /// Display label.
    pub label: String,
    /// Amount in SGD.
    pub amount: Decimal,
    /// Line classification.
    #[serde(rename = "type")]
    pub kind: LineItemKind,
}

impl LineItem {
    /// Creates a fee line.
    #[must_use]
    pub fn fee(label: impl Into<String>, amount: Decimal) -> Self {
        Self {
            label: label.into(),
            amount,
            kind: LineItemKind::Fee,
        }
    }

    /// Creates a budget line.
    #[must_use]
    pub fn budget(label: impl Into<String>, amount: Decimal) -> Self {
        Self {
            label: label.into(),
            amount,
            kind: LineItemKind::Budget,
        }
    }
}

/// An immutable itemized quote.
///
/// `total_amount` always equals the sum of `line_items`; both constructors
/// and [`Quote::push_line`] maintain it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    /// Quote identifier.
    pub id: QuoteId,
    /// Service being quoted.
    pub service_type: ServiceType,
    /// Ordered line items.
    pub line_items: Vec<LineItem>,
    /// Sum of line item amounts.
    pub total_amount: Decimal,
    /// Human-readable time estimate.
    pub estimated_time: String,
    /// Always `SGD`.
    pub currency: String,
    /// Terms shown alongside the quote.
    pub notes: Vec<String>,
}

impl Quote {
    /// Builds a quote whose total is the sum of `line_items`.
    #[must_use]
    pub fn new(
        service_type: ServiceType,
        line_items: Vec<LineItem>,
        estimated_time: &str,
        notes: &[&str],
    ) -> Self {
        let total_amount = line_items.iter().map(|l| l.amount).sum();
        Self {
            id: QuoteId::new(),
            service_type,
            line_items,
            total_amount,
            estimated_time: estimated_time.to_string(),
            currency: super::money::CURRENCY.to_string(),
            notes: notes.iter().map(|n| (*n).to_string()).collect(),
        }
    }

    /// Appends a line and folds its amount into the total.
    pub fn push_line(&mut self, line: LineItem) {
        self.total_amount += line.amount;
        self.line_items.push(line);
    }

    /// Sum of the line items, recomputed.
    #[must_use]
    pub fn line_sum(&self) -> Decimal {
        self.line_items.iter().map(|l| l.amount).sum()
    }
}
