//! Integral money amounts.
//!
//! Amounts are kept in the smallest currency unit as `i64`; no floating point
//! ever touches a total. Tax rates are expressed in basis points.

use core::fmt;
use core::ops::{Add, AddAssign, Sub};

use serde::{Deserialize, Serialize};

/// Amount in the smallest currency unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn new(amount: i64) -> Self {
        Money(amount)
    }

    pub const fn amount(self) -> i64 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    pub fn checked_mul(self, quantity: u64) -> Option<Money> {
        i64::try_from(quantity).ok().and_then(|q| self.0.checked_mul(q)).map(Money)
    }

    /// `self × (1 + bps / 10000)`, rounded half up.
    pub fn with_tax(self, tax_rate: TaxRate) -> Option<Money> {
        let scaled = i128::from(self.0) * i128::from(10_000 + tax_rate.bps());
        let rounded = (scaled + 5_000).div_euclid(10_000);
        i64::try_from(rounded).ok().map(Money)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, other: Money) -> Money {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, other: Money) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, other: Money) -> Money {
        Money(self.0 - other.0)
    }
}

impl core::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, m| acc + m)
    }
}

/// Tax rate in basis points (1800 = 18%).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaxRate(u32);

impl TaxRate {
    /// VAT rate observed for every tenant so far.
    pub const STANDARD: TaxRate = TaxRate(1_800);

    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    pub const fn bps(self) -> u32 {
        self.0
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::STANDARD
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_rate_adds_eighteen_percent() {
        assert_eq!(Money::new(10_000).with_tax(TaxRate::STANDARD), Some(Money::new(11_800)));
    }

    #[test]
    fn tax_rounds_half_up() {
        // 25 * 1.18 = 29.5
        assert_eq!(Money::new(25).with_tax(TaxRate::STANDARD), Some(Money::new(30)));
        // 24 * 1.18 = 28.32
        assert_eq!(Money::new(24).with_tax(TaxRate::STANDARD), Some(Money::new(28)));
    }

    #[test]
    fn multiplication_overflow_is_reported() {
        assert_eq!(Money::new(i64::MAX).checked_mul(2), None);
        assert_eq!(Money::new(7).checked_mul(3), Some(Money::new(21)));
    }
}
