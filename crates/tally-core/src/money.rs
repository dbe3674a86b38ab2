//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  With binary floats:                                                    │
//! │    1474.00 / 6 = 245.666666...  → toFixed(2) → 245.67 (×6 = 1474.02)   │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents                                            │
//! │    147400 cents / 6 = 24566 cents (×6 = 147396 cents)                  │
//! │    Remainder 4 cents is placed explicitly on the last installment      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use tally_core::money::Money;
//!
//! let amount: Money = "1474.00".parse().unwrap();
//! assert_eq!(amount.cents(), 147_400);
//!
//! let (base, remainder) = amount.split_floor(6);
//! assert_eq!(base.cents(), 24_566);
//! assert_eq!(remainder.cents(), 4);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::types::CommissionRate;

// =============================================================================
// Money Type
// =============================================================================

/// Represents a monetary value in the smallest currency unit (cents).
///
/// ## Design Decisions
/// - **i64 (signed)**: Differences (profit = amount − base cost) can go negative
/// - **Single field tuple struct**: Zero-cost abstraction over i64
/// - **Derives**: Full serde support, serialized as integer cents
///
/// ## Where Money is Used
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Sale.amount_cents ──► Commission Calculator ──► total commission       │
/// │          │                                              │               │
/// │          ▼                                              ▼               │
/// │  split_floor(N) ──► Installment.amount   split_floor(N) ──► .commission │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents (the smallest currency unit).
    ///
    /// ## Example
    /// ```rust
    /// use tally_core::money::Money;
    ///
    /// let price = Money::from_cents(1099); // Represents 10.99
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from major and minor units.
    ///
    /// ## Note
    /// For negative amounts, only the major unit should be negative.
    /// `from_major_minor(-5, 50)` = -5.50, not -4.50
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * 100 - minor)
        } else {
            Money(major * 100 + minor)
        }
    }

    /// Returns the value in cents (smallest currency unit).
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion.
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit (cents) portion (always 0-99).
    #[inline]
    pub const fn cents_part(&self) -> i64 {
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

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Applies a percentage rate, rounding half up to the nearest cent.
    ///
    /// ## Implementation
    /// Integer math: `(amount * bps + 5000) / 10000`.
    /// The +5000 provides rounding (5000/10000 = 0.5). Only used on
    /// non-negative amounts; the calculator clamps negative profit to zero
    /// before calling this.
    ///
    /// ## Example
    /// ```rust
    /// use tally_core::money::Money;
    /// use tally_core::types::CommissionRate;
    ///
    /// let amount = Money::from_cents(123_457); // 1234.57
    /// let rate = CommissionRate::from_bps(750); // 7.5%
    ///
    /// // 1234.57 × 7.5% = 92.59275 → 92.59
    /// assert_eq!(amount.apply_rate(rate).cents(), 9_259);
    /// ```
    pub fn apply_rate(&self, rate: CommissionRate) -> Money {
        // i128 prevents overflow on large amounts
        let cents = (self.0 as i128 * rate.bps() as i128 + 5000) / 10000;
        Money::from_cents(cents as i64)
    }

    /// Adds, clamping at the `i64` bounds instead of overflowing.
    ///
    /// Used by ledger-wide totals, which add up rows read back from storage.
    #[inline]
    pub const fn saturating_add(self, other: Money) -> Money {
        Money(self.0.saturating_add(other.0))
    }

    /// Splits the value into `count` equal parts, flooring each part to the cent.
    ///
    /// Returns `(base, remainder)` where `base * count + remainder == self`.
    /// The remainder is always in `0..count` cents for non-negative values.
    ///
    /// ## Panics
    /// Panics if `count` is zero. Callers validate the installment count first.
    ///
    /// ## Example
    /// ```rust
    /// use tally_core::money::Money;
    ///
    /// let (base, remainder) = Money::from_cents(1000).split_floor(3);
    /// assert_eq!(base.cents(), 333);
    /// assert_eq!(remainder.cents(), 1);
    /// ```
    pub fn split_floor(&self, count: i64) -> (Money, Money) {
        let base = self.0.div_euclid(count);
        let remainder = self.0 - base * count;
        (Money(base), Money(remainder))
    }
}

// =============================================================================
// Parsing
// =============================================================================

/// Parses a decimal string such as `"1474"`, `"1474.5"` or `"1474.00"`.
///
/// At most two fractional digits are accepted; anything finer than a cent
/// is rejected instead of silently rounded.
impl FromStr for Money {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ValidationError::InvalidFormat {
            field: "amount".to_string(),
            reason: reason.to_string(),
        };

        let s = s.trim();
        if s.is_empty() {
            return Err(ValidationError::Required {
                field: "amount".to_string(),
            });
        }

        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };

        let (major_str, minor_str) = match digits.split_once('.') {
            Some((major, minor)) => (major, minor),
            None => (digits, ""),
        };

        if major_str.is_empty() || !major_str.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid("expected a decimal number like 1474.00"));
        }
        if minor_str.len() > 2 || !minor_str.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid("at most two decimal places are allowed"));
        }

        let major: i64 = major_str
            .parse()
            .map_err(|_| invalid("value is too large"))?;
        let minor: i64 = match minor_str.len() {
            0 => 0,
            1 => minor_str.parse::<i64>().map_err(|_| invalid("bad cents"))? * 10,
            _ => minor_str.parse::<i64>().map_err(|_| invalid("bad cents"))?,
        };

        let cents = major
            .checked_mul(100)
            .and_then(|c| c.checked_add(minor))
            .ok_or_else(|| invalid("value is too large"))?;

        Ok(Money(if negative { -cents } else { cents }))
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display shows a plain decimal with two places (`1474.00`, `-5.50`).
///
/// ## Note
/// Currency symbols and locale formatting belong to the presentation layer.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.major().abs(), self.cents_part())
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

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Money::saturating_add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
