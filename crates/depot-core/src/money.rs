//! # Money Module
//!
//! Provides the `Money` type for monetary values and `ExchangeRate` for
//! converting document currencies into the ledger's base currency.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  Debts are Σ receipts − Σ payments − Σ returns over many documents.    │
//! │  With floats the reconciliation drifts by fractions of a cent and the  │
//! │  debt report stops matching the ledger.                                │
//! │                                                                         │
//! │  OUR SOLUTION: Integer minor units                                     │
//! │    Every amount is i64 minor units. Rates are fixed-point integers.    │
//! │    Rounding happens once, at conversion, and is documented.            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use depot_core::money::{ExchangeRate, Money};
//!
//! let price = Money::from_cents(1_000_00);
//! let line_total = price.multiply_quantity(10);
//! assert_eq!(line_total.cents(), 10_000_00);
//!
//! // 1 USD = 12 650.5 UZS
//! let rate = ExchangeRate::from_scaled(126_505_000);
//! assert_eq!(rate.to_base(Money::from_cents(100)).cents(), 1_265_050);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use ts_rs::TS;

// =============================================================================
// Money Type
// =============================================================================

/// Represents a monetary value in the smallest currency unit.
///
/// ## Design Decisions
/// - **i64 (signed)**: Debts may legitimately be negative (overpayment)
/// - **Single field tuple struct**: Zero-cost abstraction over i64
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from minor units.
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Returns the value in minor units.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion.
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn minor(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Multiplies a unit price by a quantity.
    ///
    /// ## Example
    /// ```rust
    /// use depot_core::money::Money;
    ///
    /// let unit_price = Money::from_cents(299);
    /// assert_eq!(unit_price.multiply_quantity(3).cents(), 897);
    /// ```
    ///
    /// Saturates at the `i64` bounds.
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0.saturating_mul(qty))
    }
}

/// Debug-oriented display. Currency formatting belongs to the UI layer.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.major().abs(), self.minor())
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
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        self.multiply_quantity(qty)
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

// =============================================================================
// Exchange Rate
// =============================================================================

/// Fixed-point exchange rate into the base currency, scaled by 10 000.
///
/// `ExchangeRate::from_scaled(10_000)` is 1.0 (document already in base
/// currency).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ExchangeRate(i64);

impl ExchangeRate {
    /// Fixed-point scale: four decimal places.
    pub const SCALE: i64 = 10_000;

    /// Creates a rate from its scaled integer representation.
    #[inline]
    pub const fn from_scaled(scaled: i64) -> Self {
        ExchangeRate(scaled)
    }

    /// The 1:1 rate.
    #[inline]
    pub const fn identity() -> Self {
        ExchangeRate(Self::SCALE)
    }

    /// Returns the scaled integer representation.
    #[inline]
    pub const fn scaled(&self) -> i64 {
        self.0
    }

    /// Checks the rate is usable (strictly positive).
    #[inline]
    pub const fn is_valid(&self) -> bool {
        self.0 > 0
    }

    /// Converts an amount in document currency to base currency.
    ///
    /// Rounds half away from zero, once per conversion.
    pub fn to_base(&self, amount: Money) -> Money {
        let product = amount.cents() as i128 * self.0 as i128;
        let half = (Self::SCALE / 2) as i128;
        let rounded = if product >= 0 {
            (product + half) / Self::SCALE as i128
        } else {
            (product - half) / Self::SCALE as i128
        };
        Money::from_cents(i64::try_from(rounded).unwrap_or(if rounded < 0 { i64::MIN } else { i64::MAX }))
    }
}

impl Default for ExchangeRate {
    fn default() -> Self {
        ExchangeRate::identity()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
