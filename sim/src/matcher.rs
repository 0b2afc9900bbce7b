//! Order manager and match/fill decision logic
//!
//! Tracks the strategy's open simulated orders, decides fill eligibility
//! against the validated top of book, applies add/cancel/replace actions
//! with post-only crossing protection, maintains position and cash flow,
//! and writes one lifecycle record per event.

use ahash::AHashMap;
use std::io::Write;
use tracing::{debug, warn};

use common::{ActionKind, OrderAction, OrderRecord, Px, Qty, RecordKind, Symbol, Ts};
use storage::{OrderRecordWriter, StorageError};
use strategy::Strategy;

use crate::latency::LatencyModel;
use crate::market::MarketState;

/// One live simulated order
#[derive(Debug, Clone, Copy)]
pub struct OrderInfo {
    /// Strategy-assigned order id
    pub order_id: u64,
    /// Symbol of the run
    pub symbol: Symbol,
    /// Strategy decision time
    pub sent_ts: Ts,
    /// Simulated exchange arrival time
    pub md_ts: Ts,
    /// Limit price
    pub price: Px,
    /// Full order size
    pub quantity: Qty,
    /// Size filled so far, never exceeds `quantity`
    pub filled_qty: Qty,
    /// Side of the order
    pub is_bid: bool,
    /// Post-only flag captured at placement
    pub is_post_only: bool,
}

impl OrderInfo {
    fn remaining(&self) -> Qty {
        self.quantity.saturating_sub(self.filled_qty)
    }
}

/// The active-order set plus the run's trading accumulators
#[derive(Debug, Default)]
pub struct OrderManager {
    active: AHashMap<u64, OrderInfo>,
    position: i64,
    cash_flow: i128,
    orders_placed: u64,
    orders_filled: u64,
    total_buy_volume: u64,
    total_sell_volume: u64,
    total_buy_cost: f64,
    total_sell_proceeds: f64,
}

impl OrderManager {
    /// Create an empty manager
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Would an order of this side/price/size fill against the current top?
    ///
    /// Matching uses only the validated top of book: a bid fills iff its
    /// price reaches the best ask, an ask iff its price reaches the best
    /// bid, and never against an empty or sentinel side.
    #[must_use]
    pub fn would_fill(&self, market: &MarketState, is_bid: bool, price: Px, qty: Qty) -> bool {
        if price.as_nanos() <= 0 || qty.is_zero() {
            return false;
        }
        if is_bid {
            let ask = market.best_ask();
            ask.is_valid() && price >= ask
        } else {
            let bid = market.best_bid();
            bid.is_valid() && price <= bid
        }
    }

    /// Stamp and apply a batch of strategy actions in list order.
    ///
    /// `reference_ts` is the strategy-visible time the batch responds to;
    /// it feeds the latency stamping of each action.
    pub fn apply_actions<W: Write>(
        &mut self,
        actions: Vec<OrderAction>,
        reference_ts: Ts,
        market: &MarketState,
        latency: &mut LatencyModel,
        strategy: &mut dyn Strategy,
        writer: &mut OrderRecordWriter<W>,
    ) -> Result<(), StorageError> {
        for mut action in actions {
            latency.stamp_action(&mut action, reference_ts);
            self.apply_action(&action, market, latency, strategy, writer)?;
        }
        Ok(())
    }

    fn apply_action<W: Write>(
        &mut self,
        action: &OrderAction,
        market: &MarketState,
        latency: &mut LatencyModel,
        strategy: &mut dyn Strategy,
        writer: &mut OrderRecordWriter<W>,
    ) -> Result<(), StorageError> {
        match action.kind {
            ActionKind::Add => self.apply_add(action, market, latency, strategy, writer),
            ActionKind::Cancel => self.apply_cancel(action, writer),
            ActionKind::Replace => self.apply_replace(action, market, latency, strategy, writer),
        }
    }

    fn apply_add<W: Write>(
        &mut self,
        action: &OrderAction,
        market: &MarketState,
        latency: &mut LatencyModel,
        strategy: &mut dyn Strategy,
        writer: &mut OrderRecordWriter<W>,
    ) -> Result<(), StorageError> {
        if self.active.contains_key(&action.order_id) {
            warn!(order_id = action.order_id, "add reuses a live order id");
        }
        self.active.insert(
            action.order_id,
            OrderInfo {
                order_id: action.order_id,
                symbol: action.symbol,
                sent_ts: action.sent_ts,
                md_ts: action.md_ts,
                price: action.price,
                quantity: action.quantity,
                filled_qty: Qty::ZERO,
                is_bid: action.is_bid,
                is_post_only: action.is_post_only,
            },
        );
        self.orders_placed += 1;
        writer.write_record(&OrderRecord {
            timestamp: action.md_ts,
            kind: RecordKind::Add,
            order_id: action.order_id,
            symbol: action.symbol,
            price: action.price,
            old_price: Px::ZERO,
            quantity: action.quantity,
            old_quantity: Qty::ZERO,
            is_bid: action.is_bid,
        })?;

        if self.would_fill(market, action.is_bid, action.price, action.quantity) {
            if action.is_post_only {
                debug!(
                    order_id = action.order_id,
                    price = %action.price,
                    "post-only order would cross, auto-cancelling"
                );
                self.active.remove(&action.order_id);
                writer.write_record(&OrderRecord {
                    timestamp: action.md_ts,
                    kind: RecordKind::Cancel,
                    order_id: action.order_id,
                    symbol: action.symbol,
                    price: action.price,
                    old_price: Px::ZERO,
                    quantity: action.quantity,
                    old_quantity: Qty::ZERO,
                    is_bid: action.is_bid,
                })?;
            } else {
                let fill_price = if action.is_bid {
                    market.best_ask()
                } else {
                    market.best_bid()
                };
                let notify_ts = latency.fill_notification(action.md_ts);
                self.process_fill(
                    action.order_id,
                    fill_price,
                    action.quantity,
                    action.is_bid,
                    notify_ts,
                    market,
                    latency,
                    strategy,
                    writer,
                )?;
            }
        }
        Ok(())
    }

    fn apply_cancel<W: Write>(
        &mut self,
        action: &OrderAction,
        writer: &mut OrderRecordWriter<W>,
    ) -> Result<(), StorageError> {
        // The record carries the order's own side, price and size, not the
        // action's (a cancel action has none).
        match self.active.remove(&action.order_id) {
            Some(order) => writer.write_record(&OrderRecord {
                timestamp: action.md_ts,
                kind: RecordKind::Cancel,
                order_id: action.order_id,
                symbol: order.symbol,
                price: order.price,
                old_price: Px::ZERO,
                quantity: order.quantity,
                old_quantity: Qty::ZERO,
                is_bid: order.is_bid,
            }),
            None => {
                warn!(order_id = action.order_id, "cancel for unknown order");
                Ok(())
            }
        }
    }

    fn apply_replace<W: Write>(
        &mut self,
        action: &OrderAction,
        market: &MarketState,
        latency: &mut LatencyModel,
        strategy: &mut dyn Strategy,
        writer: &mut OrderRecordWriter<W>,
    ) -> Result<(), StorageError> {
        let Some(order) = self.active.get_mut(&action.order_id) else {
            warn!(order_id = action.order_id, "replace for unknown order");
            return Ok(());
        };

        let record = OrderRecord {
            timestamp: action.md_ts,
            kind: RecordKind::Replace,
            order_id: action.order_id,
            symbol: order.symbol,
            price: action.price,
            old_price: order.price,
            quantity: action.quantity,
            old_quantity: order.quantity,
            is_bid: order.is_bid,
        };

        // In-place update: filled_qty survives the replace.
        order.price = action.price;
        order.quantity = action.quantity;
        if !action.sent_ts.is_zero() {
            order.sent_ts = action.sent_ts;
        }
        if !action.md_ts.is_zero() {
            order.md_ts = action.md_ts;
        }
        let is_bid = order.is_bid;
        let is_post_only = order.is_post_only;
        let remaining = order.remaining();
        let md_ts = order.md_ts;

        writer.write_record(&record)?;

        if self.would_fill(market, is_bid, action.price, remaining) {
            if is_post_only {
                debug!(
                    order_id = action.order_id,
                    price = %action.price,
                    "post-only order would cross after replace, auto-cancelling"
                );
                if self.active.remove(&action.order_id).is_some() {
                    writer.write_record(&OrderRecord {
                        timestamp: action.md_ts,
                        kind: RecordKind::Cancel,
                        order_id: action.order_id,
                        symbol: action.symbol,
                        price: action.price,
                        old_price: Px::ZERO,
                        quantity: action.quantity,
                        old_quantity: Qty::ZERO,
                        is_bid,
                    })?;
                }
            } else {
                let fill_price = if is_bid {
                    market.best_ask()
                } else {
                    market.best_bid()
                };
                let notify_ts = latency.fill_notification(md_ts);
                self.process_fill(
                    action.order_id,
                    fill_price,
                    remaining,
                    is_bid,
                    notify_ts,
                    market,
                    latency,
                    strategy,
                    writer,
                )?;
            }
        }
        Ok(())
    }

    /// Book one fill: record, position and cash flow, strategy notification.
    ///
    /// A zero `notify_ts` falls back to one exchange leg past the last
    /// accepted top. Actions the strategy returns from the notification are
    /// stamped against the notification time and applied recursively.
    #[allow(clippy::too_many_arguments)]
    fn process_fill<W: Write>(
        &mut self,
        order_id: u64,
        fill_price: Px,
        fill_qty: Qty,
        is_bid: bool,
        notify_ts: Ts,
        market: &MarketState,
        latency: &mut LatencyModel,
        strategy: &mut dyn Strategy,
        writer: &mut OrderRecordWriter<W>,
    ) -> Result<(), StorageError> {
        if !fill_price.is_valid() || fill_qty.is_zero() {
            warn!(
                order_id,
                price = fill_price.as_nanos(),
                qty = fill_qty.as_shares(),
                "skipping invalid fill"
            );
            return Ok(());
        }
        let notify_ts = if notify_ts.is_zero() {
            latency.fill_notification(market.last_top_ts())
        } else {
            notify_ts
        };
        let Some(order) = self.active.get_mut(&order_id) else {
            warn!(order_id, "fill for unknown order");
            return Ok(());
        };

        order.filled_qty = Qty::from_shares(order.filled_qty.as_shares() + fill_qty.as_shares());
        let fully_filled = order.filled_qty >= order.quantity;
        let symbol = order.symbol;

        writer.write_record(&OrderRecord {
            timestamp: notify_ts,
            kind: RecordKind::Fill,
            order_id,
            symbol,
            price: fill_price,
            old_price: Px::ZERO,
            quantity: fill_qty,
            old_quantity: Qty::ZERO,
            is_bid,
        })?;

        // Unrounded notional in nanos-shares; i128 so it can never wrap.
        let notional = i128::from(fill_price.as_nanos()) * i128::from(fill_qty.as_shares());
        let shares = i64::from(fill_qty.as_shares());
        if is_bid {
            self.position += shares;
            self.cash_flow -= notional;
            self.total_buy_volume += u64::from(fill_qty.as_shares());
            self.total_buy_cost += fill_price.as_f64() * f64::from(fill_qty.as_shares());
        } else {
            self.position -= shares;
            self.cash_flow += notional;
            self.total_sell_volume += u64::from(fill_qty.as_shares());
            self.total_sell_proceeds += fill_price.as_f64() * f64::from(fill_qty.as_shares());
        }
        self.orders_filled += 1;
        if fully_filled {
            self.active.remove(&order_id);
        }

        debug!(
            order_id,
            price = %fill_price,
            qty = %fill_qty,
            side = if is_bid { "bid" } else { "ask" },
            position = self.position,
            "simulated fill"
        );

        let reactions = strategy.on_order_filled(order_id, fill_price, fill_qty, is_bid);
        if !reactions.is_empty() {
            self.apply_actions(reactions, notify_ts, market, latency, strategy, writer)?;
        }
        Ok(())
    }

    /// Re-test every resting order against a new top of book.
    ///
    /// Runs after the strategy's own actions for the top have been applied.
    /// The id list is snapshotted (in id order, for deterministic output)
    /// before any fill processing, so removal during iteration is safe; ids
    /// erased by an earlier fill's strategy reaction are skipped.
    pub fn reevaluate<W: Write>(
        &mut self,
        market: &MarketState,
        latency: &mut LatencyModel,
        strategy: &mut dyn Strategy,
        writer: &mut OrderRecordWriter<W>,
    ) -> Result<(), StorageError> {
        let mut ids: Vec<u64> = self.active.keys().copied().collect();
        ids.sort_unstable();
        for id in ids {
            let Some(order) = self.active.get(&id) else {
                continue;
            };
            let is_bid = order.is_bid;
            let price = order.price;
            let md_ts = order.md_ts;
            let remaining = order.remaining();
            if self.would_fill(market, is_bid, price, remaining) {
                let fill_price = if is_bid {
                    market.best_ask()
                } else {
                    market.best_bid()
                };
                let notify_ts = latency.fill_notification(md_ts);
                self.process_fill(
                    id, fill_price, remaining, is_bid, notify_ts, market, latency, strategy,
                    writer,
                )?;
            }
        }
        Ok(())
    }

    /// A live order, if present
    #[must_use]
    pub fn order(&self, order_id: u64) -> Option<&OrderInfo> {
        self.active.get(&order_id)
    }

    /// Number of live orders
    #[must_use]
    pub fn active_orders(&self) -> usize {
        self.active.len()
    }

    /// Net position in shares
    #[must_use]
    pub fn position(&self) -> i64 {
        self.position
    }

    /// Signed cash flow in nanos-shares
    #[must_use]
    pub fn cash_flow(&self) -> i128 {
        self.cash_flow
    }

    /// Orders placed over the run
    #[must_use]
    pub fn orders_placed(&self) -> u64 {
        self.orders_placed
    }

    /// Fill events booked over the run
    #[must_use]
    pub fn orders_filled(&self) -> u64 {
        self.orders_filled
    }

    /// Shares bought
    #[must_use]
    pub fn total_buy_volume(&self) -> u64 {
        self.total_buy_volume
    }

    /// Shares sold
    #[must_use]
    pub fn total_sell_volume(&self) -> u64 {
        self.total_sell_volume
    }

    /// Currency spent buying, for reporting
    #[must_use]
    pub fn total_buy_cost(&self) -> f64 {
        self.total_buy_cost
    }

    /// Currency received selling, for reporting
    #[must_use]
    pub fn total_sell_proceeds(&self) -> f64 {
        self.total_sell_proceeds
    }
}
