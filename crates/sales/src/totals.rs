//! Subtotal / VAT / total computation.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use salesdesk_core::{DomainResult, Money, ValueObject};

use crate::order::OrderLine;

/// VAT rate applied to every order subtotal (20%).
pub const VAT_RATE: Decimal = Decimal::from_parts(20, 0, 0, false, 2);

/// Monetary totals of an order, fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: Money,
    pub vat: Money,
    pub total: Money,
}

impl ValueObject for OrderTotals {}

impl OrderTotals {
    /// Totals for the given lines using their snapshot prices.
    pub fn compute(lines: &[OrderLine]) -> DomainResult<Self> {
        let line_totals = lines
            .iter()
            .map(OrderLine::line_total)
            .collect::<DomainResult<Vec<_>>>()?;
        Self::from_subtotal(Money::checked_sum(line_totals)?)
    }

    pub fn from_subtotal(subtotal: Money) -> DomainResult<Self> {
        let vat = subtotal.apply_rate(VAT_RATE)?;
        let total = subtotal.checked_add(vat)?;
        Ok(Self {
            subtotal,
            vat,
            total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn money(s: &str) -> Money {
        s.parse().unwrap()
    }

    fn line(name: &str, price: &str, quantity: u32) -> OrderLine {
        OrderLine {
            product_name: name.to_string(),
            quantity,
            unit_price: money(price),
        }
    }

    #[test]
    fn single_laptop_order() {
        let totals = OrderTotals::compute(&[line("Laptop", "1200.00", 1)]).unwrap();
        assert_eq!(totals.subtotal, money("1200.00"));
        assert_eq!(totals.vat, money("240.00"));
        assert_eq!(totals.total, money("1440.00"));
    }

    #[test]
    fn quantity_multiplies_the_snapshot_price() {
        let totals = OrderTotals::compute(&[line("Phone", "1500.00", 2)]).unwrap();
        assert_eq!(totals.subtotal, money("3000.00"));
        assert_eq!(totals.vat, money("600.00"));
        assert_eq!(totals.total, money("3600.00"));
    }

    #[test]
    fn vat_rounds_half_up_on_the_subtotal() {
        // 0.05 + 0.575 = 0.625 -> vat 0.125 -> 0.13
        let totals =
            OrderTotals::compute(&[line("Pin", "0.05", 1), line("Clip", "0.575", 1)]).unwrap();
        assert_eq!(totals.subtotal, money("0.625"));
        assert_eq!(totals.vat, money("0.13"));
        assert_eq!(totals.total, money("0.755"));
    }

    #[test]
    fn empty_lines_total_zero() {
        let totals = OrderTotals::compute(&[]).unwrap();
        assert_eq!(totals.total, Money::ZERO);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 512,
            ..ProptestConfig::default()
        })]

        /// Property: totals obey subtotal = sum(p*q), vat = round(subtotal*0.2), total = subtotal + vat.
        #[test]
        fn totals_follow_the_vat_rule(items in proptest::collection::vec((0i64..10_000_000, 1u32..1000), 1..10)) {
            let lines: Vec<OrderLine> = items
                .iter()
                .map(|(cents, qty)| OrderLine {
                    product_name: "Item".to_string(),
                    quantity: *qty,
                    unit_price: Money::new(Decimal::new(*cents, 2)),
                })
                .collect();

            let totals = OrderTotals::compute(&lines).unwrap();

            let expected_cents: i64 = items.iter().map(|(c, q)| c * i64::from(*q)).sum();
            prop_assert_eq!(totals.subtotal, Money::new(Decimal::new(expected_cents, 2)));

            // Half-up on integer cents: vat_cents = round(expected_cents / 5).
            let vat_cents = (expected_cents * 2 + 5) / 10;
            prop_assert_eq!(totals.vat, Money::new(Decimal::new(vat_cents, 2)));
            prop_assert_eq!(totals.total, Money::new(Decimal::new(expected_cents + vat_cents, 2)));
        }
    }
}
