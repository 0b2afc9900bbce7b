//! Core scalar types: prices, quantities, timestamps, symbols, sides

use serde::{Deserialize, Serialize};
use std::fmt;

/// Largest price considered real market data, in nanos ($10,000).
///
/// Prices above this (other than the no-ask sentinel) come from feed glitches
/// and are filtered at the top-of-book boundary.
pub const MAX_REASONABLE_PX: i64 = 10_000 * 1_000_000_000;

/// Price in integer nanos (10^-9 of a currency unit)
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Px(i64);

impl Px {
    /// Zero price, used as the "no bid" sentinel
    pub const ZERO: Self = Self(0);

    /// "No ask" sentinel
    pub const NO_ASK: Self = Self(i64::MAX);

    /// Create a price from integer nanos
    #[must_use]
    pub const fn from_nanos(nanos: i64) -> Self {
        Self(nanos)
    }

    /// Get the price as integer nanos
    #[must_use]
    pub const fn as_nanos(self) -> i64 {
        self.0
    }

    /// Get the price in currency units
    #[must_use]
    pub fn as_f64(self) -> f64 {
        self.0 as f64 / 1e9
    }

    /// A price is valid iff `0 < p <= MAX_REASONABLE_PX`
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 > 0 && self.0 <= MAX_REASONABLE_PX
    }

    /// Check for the "no ask" sentinel
    #[must_use]
    pub const fn is_no_ask(self) -> bool {
        self.0 == i64::MAX
    }
}

impl fmt::Display for Px {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}", self.as_f64())
    }
}

/// Order quantity in whole shares
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Qty(u32);

impl Qty {
    /// Zero quantity
    pub const ZERO: Self = Self(0);

    /// Create a quantity from a share count
    #[must_use]
    pub const fn from_shares(shares: u32) -> Self {
        Self(shares)
    }

    /// Get the quantity as a share count
    #[must_use]
    pub const fn as_shares(self) -> u32 {
        self.0
    }

    /// Check for zero
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Subtraction clamped at zero
    #[must_use]
    pub const fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }
}

impl fmt::Display for Qty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Timestamp in nanoseconds since the feed epoch
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Ts(u64);

impl Ts {
    /// The zero timestamp, used as "unset" on order actions
    pub const ZERO: Self = Self(0);

    /// Create a timestamp from nanoseconds
    #[must_use]
    pub const fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    /// Get the timestamp as nanoseconds
    #[must_use]
    pub const fn as_nanos(self) -> u64 {
        self.0
    }

    /// Check for the unset timestamp
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Shift forward by a latency in nanoseconds
    #[must_use]
    pub const fn plus_nanos(self, nanos: u64) -> Self {
        Self(self.0 + nanos)
    }

    /// Nanoseconds elapsed since an earlier timestamp, clamped at zero
    #[must_use]
    pub const fn nanos_since(self, earlier: Self) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

impl fmt::Display for Ts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ns", self.0)
    }
}

/// Symbol identifier as carried on output records
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Symbol(u32);

impl Symbol {
    /// Create a symbol from its index
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Create a symbol from a file header's 64-bit index
    #[must_use]
    pub const fn from_idx(idx: u64) -> Self {
        Self(idx as u32)
    }

    /// Get the symbol index
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SYM_{}", self.0)
    }
}

/// Side of the book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Buy side
    Bid,
    /// Sell side
    Ask,
}

impl Side {
    /// Construct from the wire `is_bid` flag
    #[must_use]
    pub const fn from_is_bid(is_bid: bool) -> Self {
        if is_bid {
            Self::Bid
        } else {
            Self::Ask
        }
    }

    /// Check for the buy side
    #[must_use]
    pub const fn is_bid(self) -> bool {
        matches!(self, Self::Bid)
    }

    /// Get the opposite side
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Bid => Self::Ask,
            Self::Ask => Self::Bid,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bid => write!(f, "bid"),
            Self::Ask => write!(f, "ask"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn px_validity_bounds() {
        assert!(Px::from_nanos(1).is_valid());
        assert!(Px::from_nanos(MAX_REASONABLE_PX).is_valid());
        assert!(!Px::from_nanos(MAX_REASONABLE_PX + 1).is_valid());
        assert!(!Px::ZERO.is_valid());
        assert!(!Px::from_nanos(-5).is_valid());
        assert!(!Px::NO_ASK.is_valid());
        assert!(Px::NO_ASK.is_no_ask());
    }

    #[test]
    fn px_display_in_currency_units() {
        let px = Px::from_nanos(101_500_000_000);
        assert_eq!(px.to_string(), "101.5000");
    }

    #[test]
    fn ts_arithmetic() {
        let ts = Ts::from_nanos(1_000_000);
        assert_eq!(ts.plus_nanos(2_000).as_nanos(), 1_002_000);
        assert_eq!(ts.plus_nanos(0), ts);
        assert_eq!(Ts::from_nanos(500).nanos_since(ts), 0);
        assert_eq!(ts.nanos_since(Ts::from_nanos(400_000)), 600_000);
    }

    #[test]
    fn qty_saturating_sub() {
        let q = Qty::from_shares(5);
        assert_eq!(q.saturating_sub(Qty::from_shares(3)).as_shares(), 2);
        assert_eq!(q.saturating_sub(Qty::from_shares(9)), Qty::ZERO);
    }

    #[test]
    fn side_round_trip() {
        assert_eq!(Side::from_is_bid(true), Side::Bid);
        assert_eq!(Side::from_is_bid(false), Side::Ask);
        assert_eq!(Side::Bid.opposite(), Side::Ask);
        assert!(Side::Ask.opposite().is_bid());
    }
}
