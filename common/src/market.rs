//! Market-data value types: top-of-book snapshots and public fill events

use serde::{Deserialize, Serialize};

use crate::types::{Px, Qty, Ts};

/// One price level of a top-of-book snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookTopLevel {
    /// Best bid price at this depth (`Px::ZERO` when absent)
    pub bid_px: Px,
    /// Best ask price at this depth (`Px::NO_ASK` when absent)
    pub ask_px: Px,
    /// Aggregate resting bid size
    pub bid_qty: Qty,
    /// Aggregate resting ask size
    pub ask_qty: Qty,
}

impl BookTopLevel {
    /// A level with both sides absent
    pub const EMPTY: Self = Self {
        bid_px: Px::ZERO,
        ask_px: Px::NO_ASK,
        bid_qty: Qty::ZERO,
        ask_qty: Qty::ZERO,
    };

    /// Create a populated level
    #[must_use]
    pub const fn new(bid_px: Px, ask_px: Px, bid_qty: Qty, ask_qty: Qty) -> Self {
        Self {
            bid_px,
            ask_px,
            bid_qty,
            ask_qty,
        }
    }

    /// A level is valid iff both prices are real and the book is not
    /// crossed or locked: `0 < bid < ask <= MAX_REASONABLE_PX`.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.bid_px.is_valid() && self.ask_px.is_valid() && self.bid_px < self.ask_px
    }
}

/// Top-of-book snapshot with best-effort second and third levels.
///
/// Only `top` is required valid when delivered to the matcher; the deeper
/// levels may be sentinel-filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookTop {
    /// Event timestamp
    pub ts: Ts,
    /// Feed sequence number
    pub seqno: u64,
    /// Best level
    pub top: BookTopLevel,
    /// Second level, best effort
    pub second: BookTopLevel,
    /// Third level, best effort
    pub third: BookTopLevel,
}

impl BookTop {
    /// Snapshot validity is decided by the top level alone
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.top.is_valid()
    }

    /// Mid price, integer division. Meaningful only for a valid snapshot.
    #[must_use]
    pub fn mid(&self) -> Px {
        Px::from_nanos((self.top.bid_px.as_nanos() + self.top.ask_px.as_nanos()) / 2)
    }
}

/// A reported execution on the public tape.
///
/// Carried through to strategies opaquely; the engine itself reads only the
/// timestamps. Field set mirrors the feed's fill snapshot record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicFill {
    /// Event timestamp
    pub ts: Ts,
    /// Feed sequence number
    pub seq_no: u64,
    /// Id of the resting order that traded
    pub resting_order_id: u64,
    /// Whether the resting order was hidden
    pub was_hidden: bool,
    /// Execution price
    pub trade_price: Px,
    /// Executed quantity
    pub trade_qty: Qty,
    /// Exchange execution id
    pub execution_id: u64,
    /// Resting order's original quantity
    pub resting_original_qty: Qty,
    /// Resting order's remaining quantity after the trade
    pub resting_order_remaining_qty: Qty,
    /// Last update time of the resting order
    pub resting_order_last_update_ts: Ts,
    /// Side of the resting order
    pub resting_side_is_bid: bool,
    /// Best price on the resting side
    pub resting_side_price: Px,
    /// Aggregate size on the resting side's best level
    pub resting_side_qty: Qty,
    /// Best price on the opposing side
    pub opposing_side_price: Px,
    /// Aggregate size on the opposing side's best level
    pub opposing_side_qty: Qty,
    /// Order count at the resting side's level
    pub resting_side_number_of_orders: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MAX_REASONABLE_PX;

    fn level(bid: i64, ask: i64) -> BookTopLevel {
        BookTopLevel::new(
            Px::from_nanos(bid),
            Px::from_nanos(ask),
            Qty::from_shares(1),
            Qty::from_shares(1),
        )
    }

    #[test]
    fn level_validity() {
        assert!(level(99, 101).is_valid());
        assert!(level(100, 101).is_valid());
        // Locked and crossed books are invalid
        assert!(!level(100, 100).is_valid());
        assert!(!level(101, 100).is_valid());
        // Sentinels are invalid
        assert!(!BookTopLevel::EMPTY.is_valid());
        assert!(!level(0, 101).is_valid());
        assert!(!level(99, i64::MAX).is_valid());
        // The reasonable-price cap is inclusive
        assert!(level(MAX_REASONABLE_PX - 1, MAX_REASONABLE_PX).is_valid());
        assert!(!level(MAX_REASONABLE_PX, MAX_REASONABLE_PX + 1).is_valid());
    }

    #[test]
    fn mid_uses_integer_division() {
        let top = BookTop {
            ts: Ts::from_nanos(1),
            seqno: 1,
            top: level(99, 102),
            second: BookTopLevel::EMPTY,
            third: BookTopLevel::EMPTY,
        };
        assert_eq!(top.mid().as_nanos(), 100);
    }
}
