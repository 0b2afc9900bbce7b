//! Alternating one-lot quoter
//!
//! Crosses the spread on purpose: places a one-share bid at the ask, then a
//! one-share ask at the bid, alternating, with at most one working order per
//! side. Useful as a smoke-test strategy that reliably generates fills.

use tracing::debug;

use common::{BookTop, OrderAction, PublicFill, Px, Qty, Symbol, Ts};

use crate::Strategy;

/// Minimum spacing between order placements
const ORDER_THROTTLE_NS: u64 = 10_000;

/// The alternating quoter
pub struct BasicStrategy {
    symbol: Symbol,
    next_order_id: u64,
    current_bid_id: u64,
    current_ask_id: u64,
    // Alternation and throttle state; per instance, never global.
    place_buy: bool,
    last_order_ts: Ts,
}

impl BasicStrategy {
    /// Create the strategy with its buy-first alternation state
    #[must_use]
    pub fn new() -> Self {
        Self {
            symbol: Symbol::default(),
            next_order_id: 1,
            current_bid_id: 0,
            current_ask_id: 0,
            place_buy: true,
            last_order_ts: Ts::ZERO,
        }
    }
}

impl Default for BasicStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl Strategy for BasicStrategy {
    fn name(&self) -> &str {
        "basic"
    }

    fn set_symbol(&mut self, symbol: Symbol) {
        self.symbol = symbol;
    }

    fn on_book_top(&mut self, top: &BookTop) -> Vec<OrderAction> {
        if !top.is_valid() {
            return Vec::new();
        }
        if top.ts.nanos_since(self.last_order_ts) < ORDER_THROTTLE_NS {
            return Vec::new();
        }

        let mut actions = Vec::new();
        if self.place_buy {
            if self.current_bid_id != 0 {
                actions.push(OrderAction::cancel(self.current_bid_id, self.symbol));
            }
            let id = self.next_order_id;
            self.next_order_id += 1;
            let px = top.top.ask_px;
            debug!(order_id = id, price = %px, "placing crossing bid");
            actions.push(OrderAction::add(
                id,
                self.symbol,
                px,
                Qty::from_shares(1),
                true,
                false,
            ));
            self.current_bid_id = id;
        } else {
            if self.current_ask_id != 0 {
                actions.push(OrderAction::cancel(self.current_ask_id, self.symbol));
            }
            let id = self.next_order_id;
            self.next_order_id += 1;
            let px = top.top.bid_px;
            debug!(order_id = id, price = %px, "placing crossing ask");
            actions.push(OrderAction::add(
                id,
                self.symbol,
                px,
                Qty::from_shares(1),
                false,
                false,
            ));
            self.current_ask_id = id;
        }

        self.place_buy = !self.place_buy;
        self.last_order_ts = top.ts;
        actions
    }

    fn on_public_fill(&mut self, _fill: &PublicFill) -> Vec<OrderAction> {
        Vec::new()
    }

    fn on_order_filled(
        &mut self,
        order_id: u64,
        _fill_price: Px,
        _fill_qty: Qty,
        is_bid: bool,
    ) -> Vec<OrderAction> {
        if is_bid && order_id == self.current_bid_id {
            self.current_bid_id = 0;
        } else if !is_bid && order_id == self.current_ask_id {
            self.current_ask_id = 0;
        }
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{ActionKind, BookTopLevel};

    fn top(ts: u64, bid: i64, ask: i64) -> BookTop {
        BookTop {
            ts: Ts::from_nanos(ts),
            seqno: 1,
            top: BookTopLevel::new(
                Px::from_nanos(bid),
                Px::from_nanos(ask),
                Qty::from_shares(10),
                Qty::from_shares(10),
            ),
            second: BookTopLevel::EMPTY,
            third: BookTopLevel::EMPTY,
        }
    }

    #[test]
    fn alternates_sides_starting_with_buy() {
        let mut s = BasicStrategy::new();
        s.set_symbol(Symbol::new(3));

        let a1 = s.on_book_top(&top(100_000, 99, 101));
        assert_eq!(a1.len(), 1);
        assert_eq!(a1[0].kind, ActionKind::Add);
        assert!(a1[0].is_bid);
        assert_eq!(a1[0].price.as_nanos(), 101, "bid is placed at the ask");

        let a2 = s.on_book_top(&top(200_000, 99, 101));
        assert_eq!(a2.len(), 1);
        assert!(!a2[0].is_bid);
        assert_eq!(a2[0].price.as_nanos(), 99, "ask is placed at the bid");
    }

    #[test]
    fn throttles_rapid_tops() {
        let mut s = BasicStrategy::new();
        let a1 = s.on_book_top(&top(100_000, 99, 101));
        assert_eq!(a1.len(), 1);
        // 9,999 ns later is inside the throttle window.
        assert!(s.on_book_top(&top(109_999, 99, 101)).is_empty());
        // 10,000 ns later is outside.
        assert_eq!(s.on_book_top(&top(110_000, 99, 101)).len(), 1);
    }

    #[test]
    fn cancels_previous_order_on_same_side() {
        let mut s = BasicStrategy::new();
        let a1 = s.on_book_top(&top(100_000, 99, 101));
        let bid_id = a1[0].order_id;

        // Ask leg in between.
        s.on_book_top(&top(200_000, 99, 101));

        // Second buy leg must cancel the first bid before adding.
        let a3 = s.on_book_top(&top(300_000, 99, 101));
        assert_eq!(a3.len(), 2);
        assert_eq!(a3[0].kind, ActionKind::Cancel);
        assert_eq!(a3[0].order_id, bid_id);
        assert_eq!(a3[1].kind, ActionKind::Add);
    }

    #[test]
    fn fill_notification_clears_tracking() {
        let mut s = BasicStrategy::new();
        let a1 = s.on_book_top(&top(100_000, 99, 101));
        let bid_id = a1[0].order_id;
        s.on_order_filled(bid_id, Px::from_nanos(101), Qty::from_shares(1), true);

        s.on_book_top(&top(200_000, 99, 101)); // ask leg
        let a3 = s.on_book_top(&top(300_000, 99, 101));
        // No stale cancel: the filled bid is no longer tracked.
        assert_eq!(a3.len(), 1);
        assert_eq!(a3[0].kind, ActionKind::Add);
    }

    #[test]
    fn ignores_invalid_tops() {
        let mut s = BasicStrategy::new();
        assert!(s.on_book_top(&top(100_000, 101, 99)).is_empty());
        assert!(s.on_book_top(&top(200_000, 0, 101)).is_empty());
    }
}
