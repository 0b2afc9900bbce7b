//! Theoretical-value quoter
//!
//! Blends the book mid with an exponentially weighted average of recent
//! trade prices into a theo value, quotes post-only one-lots an edge away
//! from it on both sides, and pulls quotes whose edge has decayed or that
//! have gone stale.

use std::collections::VecDeque;
use tracing::debug;

use common::{BookTop, OrderAction, PublicFill, Px, Qty, Symbol, Ts};

use crate::Strategy;

/// Quotes older than this are pulled regardless of edge
const STALE_ORDER_NS: u64 = 10 * 60 * 1_000_000_000;
/// Bounded trade history for the EMA
const MAX_TRADE_HISTORY: usize = 100;
/// Re-quote threshold as a fraction of theo
const REQUOTE_FRACTION: f64 = 0.001;

#[derive(Debug, Clone, Copy)]
struct QuoteInfo {
    id: u64,
    created_ts: Ts,
    price: Px,
    is_bid: bool,
}

#[derive(Debug, Clone, Copy)]
struct Trade {
    price: Px,
}

/// The theo-value quoter
pub struct TheoStrategy {
    symbol: Symbol,
    next_order_id: u64,
    active: Vec<QuoteInfo>,
    current_bid_id: u64,
    current_ask_id: u64,
    current_bid_px: Px,
    current_ask_px: Px,
    theo: i64,
    place_edge_percent: f64,
    cancel_edge_percent: f64,
    trade_weight: f64,
    ema_decay: f64,
    recent_trades: VecDeque<Trade>,
}

impl TheoStrategy {
    /// Create the strategy with explicit edge and blending parameters.
    ///
    /// Edges are in percent (`0.01` = one basis point of theo); trade weight
    /// and EMA decay are fractions in `[0, 1]`.
    #[must_use]
    pub fn new(
        place_edge_percent: f64,
        cancel_edge_percent: f64,
        trade_weight: f64,
        ema_decay: f64,
    ) -> Self {
        Self {
            symbol: Symbol::default(),
            next_order_id: 1,
            active: Vec::new(),
            current_bid_id: 0,
            current_ask_id: 0,
            current_bid_px: Px::ZERO,
            current_ask_px: Px::ZERO,
            theo: 0,
            place_edge_percent,
            cancel_edge_percent,
            trade_weight,
            ema_decay,
            recent_trades: VecDeque::new(),
        }
    }

    fn record_trade(&mut self, price: Px) {
        if price.as_nanos() <= 0 {
            return;
        }
        self.recent_trades.push_back(Trade { price });
        if self.recent_trades.len() > MAX_TRADE_HISTORY {
            self.recent_trades.pop_front();
        }
    }

    /// Exponentially weighted average of recent trades, newest weighted most
    fn trade_average(&self) -> i64 {
        if self.recent_trades.is_empty() {
            return 0;
        }
        let mut price_sum = 0.0;
        let mut weight_sum = 0.0;
        let mut weight = 1.0;
        for trade in self.recent_trades.iter().rev() {
            price_sum += weight * trade.price.as_nanos() as f64;
            weight_sum += weight;
            weight *= 1.0 - self.ema_decay;
        }
        (price_sum / weight_sum) as i64
    }

    fn theo_value(&self, top: &BookTop) -> i64 {
        let mid = top.mid().as_nanos();
        let trade_avg = self.trade_average();
        if trade_avg <= 0 {
            return mid;
        }
        (self.trade_weight * trade_avg as f64 + (1.0 - self.trade_weight) * mid as f64) as i64
    }

    fn bid_price(&self) -> i64 {
        (self.theo as f64 * (1.0 - self.place_edge_percent / 100.0)) as i64
    }

    fn ask_price(&self) -> i64 {
        (self.theo as f64 * (1.0 + self.place_edge_percent / 100.0)) as i64
    }

    fn should_cancel(&self, quote: &QuoteInfo) -> bool {
        let theo = self.theo as f64;
        let edge = if quote.is_bid {
            (theo - quote.price.as_nanos() as f64) / theo * 100.0
        } else {
            (quote.price.as_nanos() as f64 - theo) / theo * 100.0
        };
        edge < self.cancel_edge_percent
    }

    fn remove_quote(&mut self, order_id: u64) {
        self.active.retain(|q| q.id != order_id);
        if order_id == self.current_bid_id {
            self.current_bid_id = 0;
        }
        if order_id == self.current_ask_id {
            self.current_ask_id = 0;
        }
    }

    /// Pull quotes whose edge decayed below the cancel threshold
    fn sweep_edge(&mut self) -> Vec<OrderAction> {
        if self.theo <= 0 {
            return Vec::new();
        }
        let doomed: Vec<u64> = self
            .active
            .iter()
            .filter(|q| self.should_cancel(q))
            .map(|q| q.id)
            .collect();
        let mut actions = Vec::new();
        for id in doomed {
            debug!(order_id = id, theo = self.theo, "pulling quote with decayed edge");
            actions.push(OrderAction::cancel(id, self.symbol));
            self.remove_quote(id);
        }
        actions
    }

    /// Pull quotes older than the staleness horizon
    fn sweep_stale(&mut self, now: Ts) -> Vec<OrderAction> {
        let doomed: Vec<u64> = self
            .active
            .iter()
            .filter(|q| now.nanos_since(q.created_ts) >= STALE_ORDER_NS)
            .map(|q| q.id)
            .collect();
        let mut actions = Vec::new();
        for id in doomed {
            debug!(order_id = id, "pulling stale quote");
            actions.push(OrderAction::cancel(id, self.symbol));
            self.remove_quote(id);
        }
        actions
    }

    fn requote(&mut self, top: &BookTop) -> Vec<OrderAction> {
        let mut actions = Vec::new();
        if self.theo <= 0 {
            return actions;
        }
        let requote_threshold = self.theo as f64 * REQUOTE_FRACTION;

        let bid_px = self.bid_price();
        if bid_px > 0 && bid_px < top.top.ask_px.as_nanos() {
            let moved =
                (bid_px - self.current_bid_px.as_nanos()).unsigned_abs() as f64 > requote_threshold;
            if self.current_bid_id == 0 || moved {
                if self.current_bid_id != 0 {
                    actions.push(OrderAction::cancel(self.current_bid_id, self.symbol));
                    let id = self.current_bid_id;
                    self.remove_quote(id);
                }
                let id = self.next_order_id;
                self.next_order_id += 1;
                actions.push(OrderAction::add(
                    id,
                    self.symbol,
                    Px::from_nanos(bid_px),
                    Qty::from_shares(1),
                    true,
                    true,
                ));
                self.active.push(QuoteInfo {
                    id,
                    created_ts: top.ts,
                    price: Px::from_nanos(bid_px),
                    is_bid: true,
                });
                self.current_bid_id = id;
                self.current_bid_px = Px::from_nanos(bid_px);
                debug!(order_id = id, price = %Px::from_nanos(bid_px), theo = self.theo, "quoting bid");
            }
        }

        let ask_px = self.ask_price();
        if ask_px > 0 && ask_px > top.top.bid_px.as_nanos() {
            let moved =
                (ask_px - self.current_ask_px.as_nanos()).unsigned_abs() as f64 > requote_threshold;
            if self.current_ask_id == 0 || moved {
                if self.current_ask_id != 0 {
                    actions.push(OrderAction::cancel(self.current_ask_id, self.symbol));
                    let id = self.current_ask_id;
                    self.remove_quote(id);
                }
                let id = self.next_order_id;
                self.next_order_id += 1;
                actions.push(OrderAction::add(
                    id,
                    self.symbol,
                    Px::from_nanos(ask_px),
                    Qty::from_shares(1),
                    false,
                    true,
                ));
                self.active.push(QuoteInfo {
                    id,
                    created_ts: top.ts,
                    price: Px::from_nanos(ask_px),
                    is_bid: false,
                });
                self.current_ask_id = id;
                self.current_ask_px = Px::from_nanos(ask_px);
                debug!(order_id = id, price = %Px::from_nanos(ask_px), theo = self.theo, "quoting ask");
            }
        }

        actions
    }
}

impl Default for TheoStrategy {
    fn default() -> Self {
        Self::new(0.01, 0.005, 0.7, 0.05)
    }
}

impl Strategy for TheoStrategy {
    fn name(&self) -> &str {
        "theo"
    }

    fn set_symbol(&mut self, symbol: Symbol) {
        self.symbol = symbol;
    }

    fn on_book_top(&mut self, top: &BookTop) -> Vec<OrderAction> {
        if !top.is_valid() {
            return Vec::new();
        }
        self.theo = self.theo_value(top);

        let mut actions = self.sweep_edge();
        actions.extend(self.sweep_stale(top.ts));
        actions.extend(self.requote(top));
        actions
    }

    fn on_public_fill(&mut self, fill: &PublicFill) -> Vec<OrderAction> {
        self.record_trade(fill.trade_price);
        Vec::new()
    }

    fn on_order_filled(
        &mut self,
        order_id: u64,
        fill_price: Px,
        _fill_qty: Qty,
        _is_bid: bool,
    ) -> Vec<OrderAction> {
        if order_id == 0 {
            return Vec::new();
        }
        self.record_trade(fill_price);
        self.remove_quote(order_id);
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

    const BID: i64 = 99_000_000_000;
    const ASK: i64 = 101_000_000_000;

    #[test]
    fn quotes_post_only_around_theo() {
        let mut s = TheoStrategy::default();
        s.set_symbol(Symbol::new(1));

        let actions = s.on_book_top(&top(1_000_000, BID, ASK));
        assert_eq!(actions.len(), 2);
        let (bid, ask) = (&actions[0], &actions[1]);
        assert!(bid.is_bid && !ask.is_bid);
        assert!(bid.is_post_only && ask.is_post_only);

        // With no trades the theo is the mid.
        let mid = 100_000_000_000i64;
        assert_eq!(bid.price.as_nanos(), (mid as f64 * (1.0 - 0.0001)) as i64);
        assert_eq!(ask.price.as_nanos(), (mid as f64 * (1.0 + 0.0001)) as i64);
        assert!(bid.price.as_nanos() < ask.price.as_nanos());
    }

    #[test]
    fn holds_quotes_while_theo_is_steady() {
        let mut s = TheoStrategy::default();
        s.on_book_top(&top(1_000_000, BID, ASK));
        // Same book, same theo: nothing moved past the re-quote threshold.
        let actions = s.on_book_top(&top(2_000_000, BID, ASK));
        assert!(actions.is_empty());
    }

    #[test]
    fn requotes_when_theo_moves() {
        let mut s = TheoStrategy::default();
        let first = s.on_book_top(&top(1_000_000, BID, ASK));
        let old_bid_id = first.iter().find(|a| a.is_bid).unwrap().order_id;

        // A 2% mid move forces both quotes to follow.
        let actions = s.on_book_top(&top(2_000_000, BID + 2_000_000_000, ASK + 2_000_000_000));
        let cancels: Vec<_> = actions
            .iter()
            .filter(|a| a.kind == ActionKind::Cancel)
            .collect();
        assert!(cancels.iter().any(|a| a.order_id == old_bid_id));
        assert_eq!(
            actions
                .iter()
                .filter(|a| a.kind == ActionKind::Add)
                .count(),
            2
        );
    }

    #[test]
    fn trades_pull_theo_toward_the_tape() {
        let mut s = TheoStrategy::default();
        s.on_book_top(&top(1_000_000, BID, ASK));
        let mid_theo = s.theo;

        // Prints well above the mid drag the blended theo upward.
        for i in 0..10 {
            let mut fill = sample_fill(1_100_000 + i);
            fill.trade_price = Px::from_nanos(ASK);
            s.on_public_fill(&fill);
        }
        s.on_book_top(&top(2_000_000, BID, ASK));
        assert!(s.theo > mid_theo);
    }

    #[test]
    fn stale_quotes_are_pulled() {
        let mut s = TheoStrategy::default();
        let first = s.on_book_top(&top(1_000_000, BID, ASK));
        assert_eq!(first.len(), 2);

        let later = 1_000_000 + STALE_ORDER_NS;
        let actions = s.on_book_top(&top(later, BID, ASK));
        let cancels = actions
            .iter()
            .filter(|a| a.kind == ActionKind::Cancel)
            .count();
        assert_eq!(cancels, 2, "both aged quotes are pulled");
    }

    #[test]
    fn fill_notification_forgets_the_quote() {
        let mut s = TheoStrategy::default();
        let first = s.on_book_top(&top(1_000_000, BID, ASK));
        let bid = first.iter().find(|a| a.is_bid).unwrap();
        s.on_order_filled(bid.order_id, bid.price, Qty::from_shares(1), true);

        // The filled bid is re-quoted without a cancel for it.
        let actions = s.on_book_top(&top(2_000_000, BID, ASK));
        assert!(actions
            .iter()
            .all(|a| a.kind != ActionKind::Cancel || a.order_id != bid.order_id));
        assert!(actions
            .iter()
            .any(|a| a.kind == ActionKind::Add && a.is_bid));
    }

    fn sample_fill(ts: u64) -> PublicFill {
        PublicFill {
            ts: Ts::from_nanos(ts),
            seq_no: 1,
            resting_order_id: 5,
            was_hidden: false,
            trade_price: Px::from_nanos(100_000_000_000),
            trade_qty: Qty::from_shares(1),
            execution_id: 1,
            resting_original_qty: Qty::from_shares(1),
            resting_order_remaining_qty: Qty::ZERO,
            resting_order_last_update_ts: Ts::from_nanos(ts),
            resting_side_is_bid: true,
            resting_side_price: Px::from_nanos(100_000_000_000),
            resting_side_qty: Qty::ZERO,
            opposing_side_price: Px::from_nanos(101_000_000_000),
            opposing_side_qty: Qty::ZERO,
            resting_side_number_of_orders: 0,
        }
    }
}
