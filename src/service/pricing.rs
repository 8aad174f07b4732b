//! Pricing: itemized base quotes and the platform fee.
//!
//! [`PricingEngine`] is pure and deterministic. The platform fee is not part
//! of the engine's output; [`apply_platform_fee`] folds it in at the API
//! boundary.

use rust_decimal::Decimal;
use serde_json::Value;

use crate::domain::money::{cents, round_cents};
use crate::domain::{HomeServiceKind, LineItem, Quote, ServiceType, SlotData};

/// Label of the platform-fee line item.
pub const PLATFORM_FEE_LABEL: &str = "Platform fee";

/// Builds pre-fee quotes from completed slot data.
#[derive(Debug, Clone, Copy, Default)]
pub struct PricingEngine;

impl PricingEngine {
    /// Creates the engine.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Builds an itemized quote. The total is the sum of the line items.
    #[must_use]
    pub fn generate_quote(&self, service_type: ServiceType, slot_data: &SlotData) -> Quote {
        match service_type {
            ServiceType::Shopping => shopping_quote(slot_data),
            ServiceType::Errand => errand_quote(),
            ServiceType::HomeService => home_service_quote(slot_data),
            ServiceType::OpenRequest => open_request_quote(),
        }
    }
}

/// Appends the platform-fee line, `round(subtotal × bps / 10000)`, and folds
/// it into the total.
pub fn apply_platform_fee(quote: &mut Quote, fee_bps: u32) {
    let fee = round_cents(quote.total_amount * Decimal::from(fee_bps) / Decimal::from(10_000));
    let percent = Decimal::from(fee_bps) / Decimal::from(100);
    quote.push_line(LineItem::fee(
        format!("{PLATFORM_FEE_LABEL} ({}%)", percent.normalize()),
        fee,
    ));
}

fn slot_amount(slot_data: &SlotData, key: &str) -> Option<Decimal> {
    let amount = match slot_data.get(key)? {
        Value::Number(n) => n.to_string().parse::<Decimal>().ok()?,
        Value::String(s) => s.trim().trim_start_matches("S$").trim_start_matches('$').parse().ok()?,
        _ => return None,
    };
    (amount > Decimal::ZERO).then(|| round_cents(amount))
}

fn shopping_quote(slot_data: &SlotData) -> Quote {
    let budget = slot_amount(slot_data, "userBudget").unwrap_or_else(|| cents(1500));
    Quote::new(
        ServiceType::Shopping,
        vec![
            LineItem::budget("Shopping budget (frozen in advance)", budget),
            LineItem::fee("Base service fee", cents(500)),
            LineItem::fee("Delivery fee (about 2 km)", cents(300)),
        ],
        "about 35-50 minutes",
        &[
            "The full budget is frozen; any unspent amount is refunded after purchase",
            "Waiting beyond 30 minutes incurs a waiting fee",
            "No mark-up on item prices",
        ],
    )
}

fn errand_quote() -> Quote {
    Quote::new(
        ServiceType::Errand,
        vec![
            LineItem::fee("Base delivery fee", cents(500)),
            LineItem::fee("Distance fee (about 2.3 km)", cents(300)),
        ],
        "about 30-45 minutes",
        &[
            "Extra waiting time or repeat trips may incur additional fees",
            "Requires a second confirmation before the runner proceeds",
        ],
    )
}

fn home_service_price(kind: Option<HomeServiceKind>) -> Decimal {
    match kind {
        Some(HomeServiceKind::Cleaning) => cents(6000),
        Some(HomeServiceKind::Repair) => cents(4000),
        Some(HomeServiceKind::Installation) => cents(3500),
        Some(HomeServiceKind::Massage) => cents(8000),
        None => cents(5000),
    }
}

fn home_service_quote(slot_data: &SlotData) -> Quote {
    let label = slot_data
        .get("serviceType")
        .and_then(Value::as_str)
        .unwrap_or("home service");
    let price = home_service_price(HomeServiceKind::from_label(label));
    Quote::new(
        ServiceType::HomeService,
        vec![LineItem::fee(format!("{label} (starting price)"), price)],
        "provider confirmed within 2 hours",
        &[
            "Final price is confirmed by the provider",
            "Payment is a pre-authorisation; the actual charge happens after service",
            "Free redo or refund if unsatisfied",
        ],
    )
}

fn open_request_quote() -> Quote {
    Quote::new(
        ServiceType::OpenRequest,
        vec![LineItem::fee("Custom request service fee", cents(1500))],
        "depends on the request",
        &[
            "Service fee is adjusted to the actual job",
            "Operations will confirm the request is feasible",
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::LineItemKind;
    use serde_json::json;

    fn slots(pairs: &[(&str, Value)]) -> SlotData {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn shopping_quote_with_platform_fee() {
        let engine = PricingEngine::new();
        let mut quote = engine.generate_quote(ServiceType::Shopping, &slots(&[("userBudget", json!(15.0))]));
        assert_eq!(quote.total_amount, cents(2300));
        assert_eq!(quote.total_amount, quote.line_sum());

        apply_platform_fee(&mut quote, 325);
        let fee = quote.line_items.last().map(|l| (l.label.clone(), l.amount, l.kind));
        assert_eq!(
            fee,
            Some(("Platform fee (3.25%)".to_string(), cents(75), LineItemKind::Fee))
        );
        assert_eq!(quote.total_amount, cents(2375));
        assert_eq!(quote.total_amount, quote.line_sum());
    }

    #[test]
    fn shopping_budget_defaults_to_fifteen() {
        let quote = PricingEngine::new().generate_quote(ServiceType::Shopping, &SlotData::new());
        assert_eq!(quote.line_items.first().map(|l| l.amount), Some(cents(1500)));
        assert_eq!(quote.total_amount, cents(2300));
    }

    #[test]
    fn home_service_uses_price_table_with_fallback() {
        let engine = PricingEngine::new();
        let massage = engine.generate_quote(
            ServiceType::HomeService,
            &slots(&[("serviceType", json!("home massage"))]),
        );
        assert_eq!(massage.total_amount, cents(8000));

        let unknown = engine.generate_quote(
            ServiceType::HomeService,
            &slots(&[("serviceType", json!("gardening"))]),
        );
        assert_eq!(unknown.total_amount, cents(5000));
        assert_eq!(unknown.line_items.len(), 1);
    }

    #[test]
    fn errand_and_open_request_flat_prices() {
        let engine = PricingEngine::new();
        assert_eq!(
            engine.generate_quote(ServiceType::Errand, &SlotData::new()).total_amount,
            cents(800)
        );
        assert_eq!(
            engine.generate_quote(ServiceType::OpenRequest, &SlotData::new()).total_amount,
            cents(1500)
        );
    }

    #[test]
    fn totals_always_match_line_sums() {
        let engine = PricingEngine::new();
        for t in ServiceType::ALL {
            let mut quote = engine.generate_quote(t, &slots(&[("userBudget", json!("12.345"))]));
            assert_eq!(quote.total_amount, quote.line_sum());
            apply_platform_fee(&mut quote, 325);
            assert_eq!(quote.total_amount, quote.line_sum());
        }
    }
}
