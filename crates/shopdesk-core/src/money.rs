//! # Money
//!
//! Every amount in Shopdesk (prices, VAT, shipping, discounts, cash) is a
//! whole number of cents. Floats never touch money.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Product.selling_price ──► OrderItem.line_total ──► Order.subtotal      │
//! │                                                          │              │
//! │          ┌───────────────────────┬───────────────────────┤              │
//! │          ▼                       ▼                       ▼              │
//! │   calculate_tax (VAT)     shipping rule          percentage_of          │
//! │          │                       │               (sale discounts)       │
//! │          └───────────┬───────────┘                                      │
//! │                      ▼                                                  │
//! │                 Order.total ──► loyalty points, PayPal, invoice         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Rounding is half-up to the cent and happens only in [`Money::calculate_tax`]
//! and [`Money::percentage_of`].
//!
//! ```rust
//! use shopdesk_core::money::Money;
//!
//! let line = Money::from_cents(1250).checked_mul(2).unwrap();
//! assert_eq!(line.to_string(), "25.00");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};
use ts_rs::TS;

use crate::pricing::TaxRate;

/// An amount in cents. Serializes as a bare JSON integer.
///
/// Signed so that a fixed discount larger than a line, or a refund, can be
/// represented before it is clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// `None` when the sum does not fit.
    #[inline]
    pub const fn checked_add(self, rhs: Money) -> Option<Money> {
        match self.0.checked_add(rhs.0) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// Unit price times quantity; `None` on overflow.
    #[inline]
    pub const fn checked_mul(self, quantity: i64) -> Option<Money> {
        match self.0.checked_mul(quantity) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// VAT on this amount, half-up to the cent.
    ///
    /// ```rust
    /// use shopdesk_core::money::Money;
    /// use shopdesk_core::pricing::TaxRate;
    ///
    /// assert_eq!(Money::from_cents(2000).calculate_tax(TaxRate::from_bps(2000)).cents(), 400);
    /// assert_eq!(Money::from_cents(125).calculate_tax(TaxRate::from_bps(1000)).cents(), 13);
    /// ```
    pub fn calculate_tax(&self, rate: TaxRate) -> Money {
        self.percentage_of(rate.bps())
    }

    /// `bps` basis points of this amount (1000 = 10%), half-up to the cent.
    pub fn percentage_of(&self, bps: u32) -> Money {
        // widened so large totals cannot overflow mid-multiplication
        let scaled = i128::from(self.0) * i128::from(bps) + 5_000;
        Money::from_cents((scaled / 10_000) as i64)
    }
}

/// `24.00`, `-5.50`. PayPal's `amount.value` and the invoice both use this.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        Money(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Money(self.0 - rhs.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Money::from_cents(2900).to_string(), "29.00");
        assert_eq!(Money::from_cents(7).to_string(), "0.07");
        assert_eq!(Money::from_cents(-550).to_string(), "-5.50");
        assert_eq!(Money::from_cents(-7).to_string(), "-0.07");
    }

    #[test]
    fn test_line_totals_add_up() {
        let lines = [
            Money::from_cents(1000).checked_mul(2).unwrap(),
            Money::from_cents(250).checked_mul(3).unwrap(),
        ];
        let subtotal: Money = lines.into_iter().sum();
        assert_eq!(subtotal, Money::from_cents(2750));
        assert_eq!(subtotal - Money::from_cents(750), Money::from_cents(2000));
    }

    #[test]
    fn test_checked_arithmetic_refuses_overflow() {
        let huge = Money::from_cents(i64::MAX / 2 + 1);
        assert_eq!(huge.checked_mul(2), None);
        assert_eq!(huge.checked_add(huge), None);
        assert_eq!(Money::from_cents(1250).checked_mul(2), Some(Money::from_cents(2500)));
    }

    #[test]
    fn test_vat_rounds_half_up() {
        let vat = TaxRate::from_bps(2000);
        assert_eq!(Money::from_cents(2000).calculate_tax(vat).cents(), 400);
        assert_eq!(Money::from_cents(2500).calculate_tax(vat).cents(), 500);
        // 0.2 cent
        assert_eq!(Money::from_cents(1).calculate_tax(vat).cents(), 0);
        // 0.6 cent
        assert_eq!(Money::from_cents(3).calculate_tax(vat).cents(), 1);
    }

    #[test]
    fn test_percentage_of() {
        assert_eq!(Money::from_cents(10_000).percentage_of(1000).cents(), 1000);
        assert_eq!(Money::from_cents(999).percentage_of(5000).cents(), 500);
        assert!(Money::from_cents(0).percentage_of(1000).is_zero());
    }

    #[test]
    fn test_serializes_as_integer() {
        assert_eq!(serde_json::to_string(&Money::from_cents(3700)).unwrap(), "3700");
    }
}
