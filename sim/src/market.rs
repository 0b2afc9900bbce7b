//! Most-recent validated market state
//!
//! Gatekeeper for incoming tops: invalid snapshots are dropped silently and,
//! on the tops/fills path, snapshots arriving too close together are
//! coalesced. Accepted snapshots update the last-valid mid and the
//! best-effort three-level depth maps used by reporting.

use std::collections::BTreeMap;
use tracing::debug;

use common::{BookTop, BookTopLevel, Px, Qty, Ts};

/// Validated market state, owned by the driver
#[derive(Debug, Default)]
pub struct MarketState {
    last_top: Option<BookTop>,
    last_valid_mid: Px,
    bid_depth: BTreeMap<i64, Qty>,
    ask_depth: BTreeMap<i64, Qty>,
    // Coalescer state; per instance, not process-wide.
    min_top_interval_ns: u64,
    last_accepted_ts: Ts,
    dropped_invalid: u64,
    dropped_coalesced: u64,
}

impl MarketState {
    /// Create the state with the coalescer interval
    #[must_use]
    pub fn new(min_top_interval_ns: u64) -> Self {
        Self {
            min_top_interval_ns,
            ..Self::default()
        }
    }

    /// Offer a snapshot; returns whether it was accepted.
    ///
    /// `coalesce` enables the minimum-interval filter and is set only on the
    /// tops/fills path; queue-mode synthesized tops are validity-filtered
    /// but never coalesced.
    pub fn accept(&mut self, top: &BookTop, coalesce: bool) -> bool {
        if coalesce
            && !self.last_accepted_ts.is_zero()
            && top.ts.nanos_since(self.last_accepted_ts) < self.min_top_interval_ns
        {
            self.dropped_coalesced += 1;
            return false;
        }
        if !top.is_valid() {
            self.dropped_invalid += 1;
            debug!(bid = %top.top.bid_px, ask = %top.top.ask_px, "dropping invalid top");
            return false;
        }

        self.last_accepted_ts = top.ts;
        self.last_top = Some(*top);
        self.last_valid_mid = top.mid();
        for level in [&top.top, &top.second, &top.third] {
            self.update_depth(level);
        }
        true
    }

    fn update_depth(&mut self, level: &BookTopLevel) {
        if level.bid_px.is_valid() {
            self.bid_depth.insert(level.bid_px.as_nanos(), level.bid_qty);
        }
        if level.ask_px.is_valid() {
            self.ask_depth.insert(level.ask_px.as_nanos(), level.ask_qty);
        }
    }

    /// Last accepted snapshot
    #[must_use]
    pub fn last_top(&self) -> Option<&BookTop> {
        self.last_top.as_ref()
    }

    /// Timestamp of the last accepted snapshot, zero before the first
    #[must_use]
    pub fn last_top_ts(&self) -> Ts {
        self.last_top.map_or(Ts::ZERO, |t| t.ts)
    }

    /// Best bid of the last accepted snapshot
    #[must_use]
    pub fn best_bid(&self) -> Px {
        self.last_top.map_or(Px::ZERO, |t| t.top.bid_px)
    }

    /// Best ask of the last accepted snapshot
    #[must_use]
    pub fn best_ask(&self) -> Px {
        self.last_top.map_or(Px::NO_ASK, |t| t.top.ask_px)
    }

    /// Mid of the last valid snapshot, zero before the first
    #[must_use]
    pub fn last_valid_mid(&self) -> Px {
        self.last_valid_mid
    }

    /// Distinct price levels seen on each side, best effort
    #[must_use]
    pub fn depth_levels(&self) -> (usize, usize) {
        (self.bid_depth.len(), self.ask_depth.len())
    }

    /// Snapshots dropped by the validity filter
    #[must_use]
    pub fn dropped_invalid(&self) -> u64 {
        self.dropped_invalid
    }

    /// Snapshots dropped by the interval coalescer
    #[must_use]
    pub fn dropped_coalesced(&self) -> u64 {
        self.dropped_coalesced
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::MAX_REASONABLE_PX;

    fn top(ts: u64, bid: i64, ask: i64) -> BookTop {
        BookTop {
            ts: Ts::from_nanos(ts),
            seqno: 1,
            top: BookTopLevel::new(
                Px::from_nanos(bid),
                Px::from_nanos(ask),
                Qty::from_shares(10),
                Qty::from_shares(20),
            ),
            second: BookTopLevel::EMPTY,
            third: BookTopLevel::EMPTY,
        }
    }

    #[test]
    fn accepts_valid_and_tracks_mid() {
        let mut m = MarketState::new(100_000);
        assert!(m.accept(&top(1_000_000, 99, 101), true));
        assert_eq!(m.last_valid_mid().as_nanos(), 100);
        assert_eq!(m.best_bid().as_nanos(), 99);
        assert_eq!(m.best_ask().as_nanos(), 101);
    }

    #[test]
    fn rejects_invalid_without_state_change() {
        let mut m = MarketState::new(100_000);
        assert!(m.accept(&top(1_000_000, 99, 101), true));

        // Crossed, zero-bid, and oversized tops all bounce.
        assert!(!m.accept(&top(2_000_000, 101, 99), true));
        assert!(!m.accept(&top(3_000_000, 0, 101), true));
        assert!(!m.accept(&top(4_000_000, 99, MAX_REASONABLE_PX + 1), true));

        // Feeding the same invalid top twice still changes nothing.
        assert!(!m.accept(&top(2_000_000, 101, 99), true));
        assert_eq!(m.last_top_ts().as_nanos(), 1_000_000);
        assert_eq!(m.last_valid_mid().as_nanos(), 100);
        assert_eq!(m.dropped_invalid(), 4);
    }

    #[test]
    fn boundary_of_reasonable_price_is_inclusive() {
        let mut m = MarketState::new(0);
        assert!(m.accept(&top(1_000_000, MAX_REASONABLE_PX - 1, MAX_REASONABLE_PX), true));
    }

    #[test]
    fn coalescer_enforces_minimum_gap() {
        let mut m = MarketState::new(100_000);
        assert!(m.accept(&top(1_000_000, 99, 101), true));
        // A gap of 99,999 ns is inside the window.
        assert!(!m.accept(&top(1_099_999, 98, 102), true));
        // Exactly 100,000 ns is accepted.
        assert!(m.accept(&top(1_100_000, 98, 102), true));
        assert_eq!(m.dropped_coalesced(), 1);
    }

    #[test]
    fn queue_path_skips_the_coalescer() {
        let mut m = MarketState::new(100_000);
        assert!(m.accept(&top(1_000_000, 99, 101), false));
        assert!(m.accept(&top(1_000_001, 98, 102), false));
        // Validity still applies without coalescing.
        assert!(!m.accept(&top(1_000_002, 102, 98), false));
    }

    #[test]
    fn depth_maps_skip_sentinel_levels() {
        let mut m = MarketState::new(0);
        let mut t = top(1_000_000, 99, 101);
        t.second = BookTopLevel::new(
            Px::from_nanos(98),
            Px::NO_ASK,
            Qty::from_shares(5),
            Qty::ZERO,
        );
        assert!(m.accept(&t, true));
        assert_eq!(m.best_bid().as_nanos(), 99);
        // Only real prices land in the depth maps.
        assert_eq!(m.bid_depth.len(), 2);
        assert_eq!(m.ask_depth.len(), 1);
    }
}
