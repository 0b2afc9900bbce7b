//! Core book reconstruction: per-price FIFO queues plus an order-id map

use ahash::AHashMap;
use smallvec::SmallVec;
use std::collections::BTreeMap;
use tracing::warn;

use common::{
    BookEvent, BookEventBody, BookTop, BookTopLevel, PublicFill, Px, Qty, Side, Ts,
};

/// One resting order inside a price level's FIFO queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestingOrder {
    /// Exchange order id
    pub id: u64,
    /// Remaining size
    pub qty: Qty,
    /// Size at entry, before any executions or reductions
    pub original_qty: Qty,
    /// Last time this entry was touched
    pub last_update_ts: Ts,
}

/// A price level: aggregate size plus the strict-insertion-order queue
#[derive(Debug, Default)]
struct Level {
    total_qty: u64,
    orders: SmallVec<[RestingOrder; 4]>,
}

/// Where a live order sits, for O(1) level lookup by id
#[derive(Debug, Clone, Copy)]
struct OrderRef {
    px: Px,
    side: Side,
}

/// What a single applied book event produced for the simulator
#[derive(Debug, Clone, Copy, Default)]
pub struct BookDelta {
    /// Synthesized snapshot, present only when the top of book changed
    pub top: Option<BookTop>,
    /// Synthesized public fill, present only for execute events
    pub fill: Option<PublicFill>,
}

/// Reconstructed limit order book for one symbol.
///
/// Both sides key their `BTreeMap` so the first entry is the best price: ask
/// keys are raw nanos, bid keys are negated. Level queues are strict
/// insertion order; removal is positional so queue priority is preserved.
#[derive(Debug, Default)]
pub struct Book {
    bids: BTreeMap<i64, Level>,
    asks: BTreeMap<i64, Level>,
    orders: AHashMap<u64, OrderRef>,
    last_top: Option<BookTop>,
}

fn price_key(px: Px, side: Side) -> i64 {
    match side {
        Side::Bid => -px.as_nanos(),
        Side::Ask => px.as_nanos(),
    }
}

impl Book {
    /// Create an empty book
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one book event and report what changed.
    ///
    /// For execute events the synthesized fill's opposing-side fields carry
    /// the pre-trade opposite best; its resting-side fields carry the
    /// post-trade level state.
    pub fn apply(&mut self, ev: &BookEvent) -> BookDelta {
        let fill = match ev.body {
            BookEventBody::AddOrder {
                price,
                order_id,
                qty,
                side,
            } => {
                self.add_order(price, order_id, qty, side, ev.ts);
                None
            }
            BookEventBody::DeleteOrder { order_id } => {
                if self.delete_order(order_id).is_none() {
                    warn!(order_id, "delete for unknown order");
                }
                None
            }
            BookEventBody::ReplaceOrder {
                price,
                orig_order_id,
                new_order_id,
                qty,
            } => {
                self.replace_order(price, orig_order_id, new_order_id, qty, ev.ts);
                None
            }
            BookEventBody::AmendOrder { order_id, new_qty } => {
                self.amend_order(order_id, new_qty, ev.ts);
                None
            }
            BookEventBody::ReduceOrder {
                order_id,
                cxled_qty,
            } => {
                self.reduce_order(order_id, cxled_qty);
                None
            }
            BookEventBody::ExecuteOrder {
                order_id,
                traded_qty,
                execution_id,
            } => self.execute_order(order_id, traded_qty, execution_id, None, ev.ts, ev.seq_no),
            BookEventBody::ExecuteOrderAtPrice {
                order_id,
                traded_qty,
                execution_id,
                exec_price,
            } => self.execute_order(
                order_id,
                traded_qty,
                execution_id,
                Some(exec_price),
                ev.ts,
                ev.seq_no,
            ),
            BookEventBody::ClearBook => {
                self.clear();
                None
            }
            // Parsed for stream integrity; neither mutates the book.
            BookEventBody::SessionEvent { .. } | BookEventBody::HiddenTrade { .. } => None,
        };

        let top = self.emit_top_if_changed(ev.ts, ev.seq_no);
        BookDelta { top, fill }
    }

    /// Best bid as `(price, aggregate size)`
    #[must_use]
    pub fn best_bid(&self) -> Option<(Px, u64)> {
        self.bids
            .iter()
            .next()
            .map(|(key, level)| (Px::from_nanos(-key), level.total_qty))
    }

    /// Best ask as `(price, aggregate size)`
    #[must_use]
    pub fn best_ask(&self) -> Option<(Px, u64)> {
        self.asks
            .iter()
            .next()
            .map(|(key, level)| (Px::from_nanos(*key), level.total_qty))
    }

    /// Number of live orders
    #[must_use]
    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    /// Remaining size of a live order, if present
    #[must_use]
    pub fn resting_qty(&self, order_id: u64) -> Option<Qty> {
        let r = self.orders.get(&order_id)?;
        let level = self.side(r.side).get(&price_key(r.px, r.side))?;
        level
            .orders
            .iter()
            .find(|o| o.id == order_id)
            .map(|o| o.qty)
    }

    /// Queue position of a live order within its level, front = 0
    #[must_use]
    pub fn queue_position(&self, order_id: u64) -> Option<usize> {
        let r = self.orders.get(&order_id)?;
        let level = self.side(r.side).get(&price_key(r.px, r.side))?;
        level.orders.iter().position(|o| o.id == order_id)
    }

    /// Check the book's structural invariants, for tests and tooling:
    /// level totals match their queues, no empty levels, every mapped order
    /// resolves to exactly one queue entry at its recorded price and side.
    pub fn validate(&self) -> Result<(), String> {
        for (side, ladder) in [(Side::Bid, &self.bids), (Side::Ask, &self.asks)] {
            for (key, level) in ladder {
                let sum: u64 = level
                    .orders
                    .iter()
                    .map(|o| u64::from(o.qty.as_shares()))
                    .sum();
                if sum != level.total_qty {
                    return Err(format!(
                        "{side} level {key}: total {} != queue sum {sum}",
                        level.total_qty
                    ));
                }
                if level.orders.is_empty() || level.total_qty == 0 {
                    return Err(format!("{side} level {key} is empty but present"));
                }
            }
        }
        for (id, r) in &self.orders {
            let level = self
                .side(r.side)
                .get(&price_key(r.px, r.side))
                .ok_or_else(|| format!("order {id} maps to a missing level"))?;
            let hits = level.orders.iter().filter(|o| o.id == *id).count();
            if hits != 1 {
                return Err(format!("order {id} has {hits} queue entries"));
            }
        }
        Ok(())
    }

    fn side(&self, side: Side) -> &BTreeMap<i64, Level> {
        match side {
            Side::Bid => &self.bids,
            Side::Ask => &self.asks,
        }
    }

    fn side_mut(&mut self, side: Side) -> &mut BTreeMap<i64, Level> {
        match side {
            Side::Bid => &mut self.bids,
            Side::Ask => &mut self.asks,
        }
    }

    fn add_order(&mut self, px: Px, order_id: u64, qty: Qty, side: Side, ts: Ts) {
        if self.orders.contains_key(&order_id) {
            warn!(order_id, "add for already-live order, dropping old entry");
            self.delete_order(order_id);
        }
        let level = self
            .side_mut(side)
            .entry(price_key(px, side))
            .or_default();
        level.orders.push(RestingOrder {
            id: order_id,
            qty,
            original_qty: qty,
            last_update_ts: ts,
        });
        level.total_qty += u64::from(qty.as_shares());
        self.orders.insert(order_id, OrderRef { px, side });
    }

    fn delete_order(&mut self, order_id: u64) -> Option<(Px, Side)> {
        let r = self.orders.remove(&order_id)?;
        let key = price_key(r.px, r.side);
        let book = self.side_mut(r.side);
        if let Some(level) = book.get_mut(&key) {
            if let Some(pos) = level.orders.iter().position(|o| o.id == order_id) {
                let removed = level.orders.remove(pos);
                level.total_qty -= u64::from(removed.qty.as_shares());
            }
            if level.orders.is_empty() {
                book.remove(&key);
            }
        }
        Some((r.px, r.side))
    }

    fn replace_order(&mut self, price: Px, orig_order_id: u64, new_order_id: u64, qty: Qty, ts: Ts) {
        // Side is captured before the erase. Unknown originals fall back to
        // the price sign, matching the feed's historical behavior.
        let side = self
            .orders
            .get(&orig_order_id)
            .map_or_else(|| Side::from_is_bid(price.as_nanos() > 0), |r| r.side);
        self.delete_order(orig_order_id);
        self.add_order(price, new_order_id, qty, side, ts);
    }

    fn amend_order(&mut self, order_id: u64, new_qty: Qty, ts: Ts) {
        let Some(r) = self.orders.get(&order_id).copied() else {
            warn!(order_id, "amend for unknown order");
            return;
        };
        if new_qty.is_zero() {
            self.delete_order(order_id);
            return;
        }
        let key = price_key(r.px, r.side);
        if let Some(level) = self.side_mut(r.side).get_mut(&key) {
            if let Some(entry) = level.orders.iter_mut().find(|o| o.id == order_id) {
                // Queue position is preserved: amend is not a re-queue.
                level.total_qty = level.total_qty - u64::from(entry.qty.as_shares())
                    + u64::from(new_qty.as_shares());
                entry.qty = new_qty;
                entry.last_update_ts = ts;
            }
        }
    }

    fn reduce_order(&mut self, order_id: u64, cxled_qty: Qty) {
        let Some(r) = self.orders.get(&order_id).copied() else {
            warn!(order_id, "reduce for unknown order");
            return;
        };
        let key = price_key(r.px, r.side);
        let mut drained = false;
        if let Some(level) = self.side_mut(r.side).get_mut(&key) {
            if let Some(pos) = level.orders.iter().position(|o| o.id == order_id) {
                let entry = &mut level.orders[pos];
                let taken = cxled_qty.as_shares().min(entry.qty.as_shares());
                entry.qty = entry.qty.saturating_sub(cxled_qty);
                level.total_qty -= u64::from(taken);
                if entry.qty.is_zero() {
                    level.orders.remove(pos);
                    drained = true;
                }
            }
        }
        if drained {
            self.orders.remove(&order_id);
            let book = self.side_mut(r.side);
            if book.get(&key).is_some_and(|l| l.orders.is_empty()) {
                book.remove(&key);
            }
        }
    }

    #[allow(clippy::too_many_lines)]
    fn execute_order(
        &mut self,
        order_id: u64,
        traded_qty: Qty,
        execution_id: u64,
        exec_price: Option<Px>,
        ts: Ts,
        seq_no: u64,
    ) -> Option<PublicFill> {
        let Some(r) = self.orders.get(&order_id).copied() else {
            warn!(order_id, "execute for unknown order");
            return None;
        };
        let resting_px = exec_price.unwrap_or(r.px);

        // Opposing best captured before the debit, with empty-side sentinels.
        let (opposing_side_price, opposing_side_qty) = match r.side {
            Side::Bid => self
                .best_ask()
                .map_or((Px::NO_ASK, Qty::ZERO), |(px, q)| (px, clamp_qty(q))),
            Side::Ask => self
                .best_bid()
                .map_or((Px::ZERO, Qty::ZERO), |(px, q)| (px, clamp_qty(q))),
        };

        let key = price_key(r.px, r.side);
        let book = self.side_mut(r.side);
        let level = book.get_mut(&key)?;
        let pos = level.orders.iter().position(|o| o.id == order_id)?;

        let entry = &mut level.orders[pos];
        let traded = Qty::from_shares(traded_qty.as_shares().min(entry.qty.as_shares()));
        if traded < traded_qty {
            warn!(
                order_id,
                want = traded_qty.as_shares(),
                have = entry.qty.as_shares(),
                "execute larger than resting size, clamping"
            );
        }
        entry.qty = entry.qty.saturating_sub(traded);
        level.total_qty -= u64::from(traded.as_shares());

        let remaining = entry.qty;
        let original_qty = entry.original_qty;
        let last_update_ts = entry.last_update_ts;
        if remaining.is_zero() {
            level.orders.remove(pos);
        }

        let resting_side_qty = clamp_qty(level.total_qty);
        let resting_side_number_of_orders = level.orders.len() as u32;
        if level.orders.is_empty() {
            book.remove(&key);
        }
        if remaining.is_zero() {
            self.orders.remove(&order_id);
        }

        Some(PublicFill {
            ts,
            seq_no,
            resting_order_id: order_id,
            was_hidden: false,
            trade_price: resting_px,
            trade_qty: traded,
            execution_id,
            resting_original_qty: original_qty,
            resting_order_remaining_qty: remaining,
            resting_order_last_update_ts: last_update_ts,
            resting_side_is_bid: r.side.is_bid(),
            resting_side_price: resting_px,
            resting_side_qty,
            opposing_side_price,
            opposing_side_qty,
            resting_side_number_of_orders,
        })
    }

    fn clear(&mut self) {
        self.bids.clear();
        self.asks.clear();
        self.orders.clear();
    }

    /// Build the three-level snapshot from the current ladders.
    ///
    /// Out-of-range prices are blanked here only; the underlying book keeps
    /// them so later events against those orders still resolve.
    fn synthesize_top(&self, ts: Ts, seq_no: u64) -> BookTop {
        let mut levels = [BookTopLevel::EMPTY; 3];
        for (slot, (key, level)) in levels.iter_mut().zip(self.bids.iter()) {
            let px = Px::from_nanos(-key);
            if px.is_valid() {
                slot.bid_px = px;
                slot.bid_qty = clamp_qty(level.total_qty);
            }
        }
        for (slot, (key, level)) in levels.iter_mut().zip(self.asks.iter()) {
            let px = Px::from_nanos(*key);
            if px.is_valid() {
                slot.ask_px = px;
                slot.ask_qty = clamp_qty(level.total_qty);
            }
        }
        BookTop {
            ts,
            seqno: seq_no,
            top: levels[0],
            second: levels[1],
            third: levels[2],
        }
    }

    fn emit_top_if_changed(&mut self, ts: Ts, seq_no: u64) -> Option<BookTop> {
        let top = self.synthesize_top(ts, seq_no);
        let changed = self.last_top.map_or(true, |prev| prev.top != top.top);
        if changed {
            self.last_top = Some(top);
            Some(top)
        } else {
            None
        }
    }
}

fn clamp_qty(total: u64) -> Qty {
    Qty::from_shares(u32::try_from(total).unwrap_or(u32::MAX))
}
