//! # Pricing
//!
//! Totals for online orders and point-of-sale sales.
//!
//! ## Order Totals
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  subtotal = Σ unit_price × quantity                                     │
//! │  tax      = round_half_up(subtotal × VAT)            (default 20%)      │
//! │  shipping = 0 if subtotal ≥ free_shipping_threshold  (default 50.00)    │
//! │             else shipping_fee                        (default 5.00)     │
//! │  total    = subtotal + tax + shipping                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every sum is checked. An amount that does not fit in `i64` cents is a
//! validation error, never a wrapped or panicking total.
//!
//! ## Sale Totals
//! Sales are taken at the counter, so there is no shipping. A discount is
//! taken off the subtotal first and VAT is charged on what remains.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate in basis points (2000 = 20%).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }
}

// =============================================================================
// Policy
// =============================================================================

/// The pricing knobs. Loaded from configuration by the API, defaulting to a
/// 20% VAT with free shipping from 50.00 and a 5.00 fee below that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingPolicy {
    pub vat_rate: TaxRate,
    pub free_shipping_threshold: Money,
    pub shipping_fee: Money,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        PricingPolicy {
            vat_rate: TaxRate::from_bps(2000),
            free_shipping_threshold: Money::from_cents(5000),
            shipping_fee: Money::from_cents(500),
        }
    }
}

/// Computed order totals. `total == subtotal + tax + shipping` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderTotals {
    pub subtotal: Money,
    pub tax: Money,
    pub shipping: Money,
    pub total: Money,
}

/// A counter discount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Discount {
    #[default]
    None,
    /// Percentage in basis points (1000 = 10%).
    Percentage(u32),
    /// Fixed amount off; clamped to the subtotal.
    Amount(Money),
}

/// Computed sale totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleTotals {
    pub subtotal: Money,
    pub discount: Money,
    pub tax: Money,
    pub total: Money,
}

fn too_large(field: &str) -> CoreError {
    ValidationError::OutOfRange {
        field: field.to_string(),
        min: 0,
        max: i64::MAX,
    }
    .into()
}

/// `unit × quantity` for one order or sale line.
pub fn line_total(unit: Money, quantity: i64) -> CoreResult<Money> {
    unit.checked_mul(quantity).ok_or_else(|| too_large("line total"))
}

/// Sum of line totals.
pub fn subtotal_of<I>(lines: I) -> CoreResult<Money>
where
    I: IntoIterator<Item = Money>,
{
    lines
        .into_iter()
        .try_fold(Money::zero(), |acc, line| acc.checked_add(line).ok_or_else(|| too_large("subtotal")))
}

impl PricingPolicy {
    /// Shipping charged for a given subtotal.
    ///
    /// The threshold is inclusive: an order of exactly 50.00 ships free.
    pub fn shipping_for(&self, subtotal: Money) -> Money {
        if subtotal >= self.free_shipping_threshold {
            Money::zero()
        } else {
            self.shipping_fee
        }
    }

    /// Totals for an online order.
    ///
    /// ## Example
    /// ```rust
    /// use shopdesk_core::money::Money;
    /// use shopdesk_core::pricing::PricingPolicy;
    ///
    /// let totals = PricingPolicy::default().order_totals(Money::from_cents(2000)).unwrap();
    /// assert_eq!(totals.tax.cents(), 400);
    /// assert_eq!(totals.shipping.cents(), 500);
    /// assert_eq!(totals.total.cents(), 2900);
    /// ```
    pub fn order_totals(&self, subtotal: Money) -> CoreResult<OrderTotals> {
        let tax = subtotal.calculate_tax(self.vat_rate);
        let shipping = self.shipping_for(subtotal);
        let total = subtotal
            .checked_add(tax)
            .and_then(|t| t.checked_add(shipping))
            .ok_or_else(|| too_large("total"))?;

        Ok(OrderTotals {
            subtotal,
            tax,
            shipping,
            total,
        })
    }

    /// Totals for a point-of-sale sale.
    pub fn sale_totals(&self, subtotal: Money, discount: Discount) -> CoreResult<SaleTotals> {
        let discount_amount = match discount {
            Discount::None => Money::zero(),
            Discount::Percentage(bps) => {
                if bps > 10_000 {
                    return Err(ValidationError::OutOfRange {
                        field: "discount".to_string(),
                        min: 0,
                        max: 10_000,
                    }
                    .into());
                }
                subtotal.percentage_of(bps)
            }
            Discount::Amount(amount) => {
                if amount.is_negative() {
                    return Err(ValidationError::MustBePositive {
                        field: "discount".to_string(),
                    }
                    .into());
                }
                amount.min(subtotal)
            }
        };

        let taxable = subtotal - discount_amount;
        let tax = taxable.calculate_tax(self.vat_rate);

        Ok(SaleTotals {
            subtotal,
            discount: discount_amount,
            tax,
            total: taxable.checked_add(tax).ok_or_else(|| too_large("total"))?,
        })
    }
}

/// Change due for a cash payment.
///
/// Fails when the cash handed over does not cover the total.
pub fn cash_change(total: Money, received: Money) -> CoreResult<Money> {
    if received < total {
        return Err(CoreError::InvalidPaymentAmount {
            reason: format!("cash received {} is less than total {}", received, total),
        });
    }
    Ok(received - total)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_totals_below_threshold_pays_shipping() {
        let totals = PricingPolicy::default().order_totals(Money::from_cents(2000)).unwrap();

        assert_eq!(totals.subtotal.cents(), 2000);
        assert_eq!(totals.tax.cents(), 400);
        assert_eq!(totals.shipping.cents(), 500);
        assert_eq!(totals.total.cents(), 2900);
    }

    #[test]
    fn test_order_totals_without_shipping_fee() {
        let policy = PricingPolicy {
            shipping_fee: Money::zero(),
            ..PricingPolicy::default()
        };
        let totals = policy.order_totals(Money::from_cents(2000)).unwrap();
        assert_eq!(totals.total.cents(), 2400);
    }

    #[test]
    fn test_free_shipping_threshold_is_inclusive() {
        let policy = PricingPolicy::default();
        assert_eq!(policy.shipping_for(Money::from_cents(4999)).cents(), 500);
        assert_eq!(policy.shipping_for(Money::from_cents(5000)).cents(), 0);
        assert_eq!(policy.shipping_for(Money::from_cents(12000)).cents(), 0);
    }

    #[test]
    fn test_order_total_invariant_holds_for_many_subtotals() {
        let policy = PricingPolicy::default();
        for cents in [0, 1, 3, 99, 4999, 5000, 5001, 123_457] {
            let t = policy.order_totals(Money::from_cents(cents)).unwrap();
            assert_eq!(t.total, t.subtotal + t.tax + t.shipping);
            assert_eq!(t.tax, t.subtotal.calculate_tax(TaxRate::from_bps(2000)));
        }
    }

    #[test]
    fn test_overflowing_amounts_are_rejected() {
        let huge = Money::from_cents(i64::MAX / 2 + 1);
        assert!(matches!(line_total(huge, 2), Err(CoreError::Validation(_))));
        assert!(subtotal_of([huge, huge]).is_err());
        assert!(PricingPolicy::default().order_totals(Money::from_cents(i64::MAX - 10)).is_err());

        let lines = [line_total(Money::from_cents(1000), 2).unwrap(), Money::from_cents(750)];
        assert_eq!(subtotal_of(lines).unwrap().cents(), 2750);
    }

    #[test]
    fn test_sale_totals_percentage_discount() {
        let totals = PricingPolicy::default()
            .sale_totals(Money::from_cents(10000), Discount::Percentage(1000))
            .unwrap();

        assert_eq!(totals.discount.cents(), 1000);
        assert_eq!(totals.tax.cents(), 1800);
        assert_eq!(totals.total.cents(), 10800);
    }

    #[test]
    fn test_sale_totals_amount_discount_is_clamped() {
        let totals = PricingPolicy::default()
            .sale_totals(Money::from_cents(1000), Discount::Amount(Money::from_cents(5000)))
            .unwrap();

        assert_eq!(totals.discount.cents(), 1000);
        assert_eq!(totals.total.cents(), 0);
    }

    #[test]
    fn test_sale_totals_rejects_bad_discounts() {
        let policy = PricingPolicy::default();
        assert!(policy
            .sale_totals(Money::from_cents(1000), Discount::Percentage(10_001))
            .is_err());
        assert!(policy
            .sale_totals(Money::from_cents(1000), Discount::Amount(Money::from_cents(-1)))
            .is_err());
    }

    #[test]
    fn test_cash_change() {
        assert_eq!(
            cash_change(Money::from_cents(2400), Money::from_cents(3000))
                .unwrap()
                .cents(),
            600
        );
        assert_eq!(
            cash_change(Money::from_cents(2400), Money::from_cents(2400))
                .unwrap()
                .cents(),
            0
        );
        assert!(matches!(
            cash_change(Money::from_cents(2400), Money::from_cents(2000)),
            Err(CoreError::InvalidPaymentAmount { .. })
        ));
    }
}
