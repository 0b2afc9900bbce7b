//! Book events, strategy order actions and output lifecycle records

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{Px, Qty, Side, Symbol, Ts};

/// A primitive per-order book mutation from the book-events stream.
///
/// `ts` and `seq_no` come from the 17-byte event header; `body` is the
/// tag-dispatched payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookEvent {
    /// Event timestamp
    pub ts: Ts,
    /// Feed sequence number
    pub seq_no: u64,
    /// Typed payload
    pub body: BookEventBody,
}

/// Payload of a book event, one variant per wire tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookEventBody {
    /// New resting order (tag 1)
    AddOrder {
        /// Limit price
        price: Px,
        /// Exchange order id
        order_id: u64,
        /// Order size
        qty: Qty,
        /// Side of the order
        side: Side,
    },
    /// Remove a resting order (tag 2)
    DeleteOrder {
        /// Exchange order id
        order_id: u64,
    },
    /// Replace an order with a new id, price and size (tag 3)
    ReplaceOrder {
        /// New limit price
        price: Px,
        /// Id being replaced
        orig_order_id: u64,
        /// Replacement id
        new_order_id: u64,
        /// New size
        qty: Qty,
    },
    /// In-place size change, queue position preserved (tag 4)
    AmendOrder {
        /// Exchange order id
        order_id: u64,
        /// New size
        new_qty: Qty,
    },
    /// Partial cancel (tag 5)
    ReduceOrder {
        /// Exchange order id
        order_id: u64,
        /// Size being cancelled
        cxled_qty: Qty,
    },
    /// Execution against a resting order (tag 6)
    ExecuteOrder {
        /// Resting order id
        order_id: u64,
        /// Executed size
        traded_qty: Qty,
        /// Exchange execution id
        execution_id: u64,
    },
    /// Execution at an explicit price (tag 7)
    ExecuteOrderAtPrice {
        /// Resting order id
        order_id: u64,
        /// Executed size
        traded_qty: Qty,
        /// Exchange execution id
        execution_id: u64,
        /// Execution price
        exec_price: Px,
    },
    /// Drop all book state (tag 8)
    ClearBook,
    /// Session state change; consumed, never acted on (tag 9)
    SessionEvent {
        /// Whether a crossed book is allowed in the new session state
        allow_crossed_book: bool,
    },
    /// Hidden-liquidity execution; consumed, never acted on (tag 10)
    HiddenTrade {
        /// Execution price
        fill_px: Px,
        /// Resting (hidden) order id
        resting_order_id: u64,
        /// Executed size
        fill_qty: Qty,
        /// Side of the resting order
        resting_side: Side,
        /// Exchange execution id
        execution_id: u64,
    },
}

impl BookEventBody {
    /// Wire tag of this payload
    #[must_use]
    pub const fn tag(&self) -> u8 {
        match self {
            Self::AddOrder { .. } => 1,
            Self::DeleteOrder { .. } => 2,
            Self::ReplaceOrder { .. } => 3,
            Self::AmendOrder { .. } => 4,
            Self::ReduceOrder { .. } => 5,
            Self::ExecuteOrder { .. } => 6,
            Self::ExecuteOrderAtPrice { .. } => 7,
            Self::ClearBook => 8,
            Self::SessionEvent { .. } => 9,
            Self::HiddenTrade { .. } => 10,
        }
    }
}

/// What a strategy wants done with a simulated order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionKind {
    /// Place a new order
    Add,
    /// Cancel a working order
    Cancel,
    /// Re-price / re-size a working order in place
    Replace,
}

/// A strategy-issued order instruction.
///
/// All variants share the field set; `Cancel` reads only `order_id`. The
/// latency model stamps `sent_ts` and `md_ts` before the action reaches the
/// matcher; strategies normally leave both zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAction {
    /// Kind of instruction
    pub kind: ActionKind,
    /// Simulated order id
    pub order_id: u64,
    /// Symbol the order is for
    pub symbol: Symbol,
    /// Time the strategy decided, stamped by the latency model if zero
    pub sent_ts: Ts,
    /// Simulated exchange arrival time, stamped by the latency model
    pub md_ts: Ts,
    /// Limit price
    pub price: Px,
    /// Order size
    pub quantity: Qty,
    /// Side of the order
    pub is_bid: bool,
    /// Post-only flag: cancel instead of crossing
    pub is_post_only: bool,
}

impl OrderAction {
    /// Build an add instruction
    #[must_use]
    pub fn add(
        order_id: u64,
        symbol: Symbol,
        price: Px,
        quantity: Qty,
        is_bid: bool,
        is_post_only: bool,
    ) -> Self {
        Self {
            kind: ActionKind::Add,
            order_id,
            symbol,
            sent_ts: Ts::ZERO,
            md_ts: Ts::ZERO,
            price,
            quantity,
            is_bid,
            is_post_only,
        }
    }

    /// Build a cancel instruction
    #[must_use]
    pub fn cancel(order_id: u64, symbol: Symbol) -> Self {
        Self {
            kind: ActionKind::Cancel,
            order_id,
            symbol,
            sent_ts: Ts::ZERO,
            md_ts: Ts::ZERO,
            price: Px::ZERO,
            quantity: Qty::ZERO,
            is_bid: false,
            is_post_only: false,
        }
    }

    /// Build a replace instruction
    #[must_use]
    pub fn replace(order_id: u64, symbol: Symbol, price: Px, quantity: Qty) -> Self {
        Self {
            kind: ActionKind::Replace,
            order_id,
            symbol,
            sent_ts: Ts::ZERO,
            md_ts: Ts::ZERO,
            price,
            quantity,
            is_bid: false,
            is_post_only: false,
        }
    }
}

/// Lifecycle event tag on an output record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum RecordKind {
    /// Order placed
    Add = 1,
    /// Order cancelled (including post-only auto-cancels)
    Cancel = 2,
    /// Order (partially) filled
    Fill = 3,
    /// Order replaced in place
    Replace = 4,
}

impl RecordKind {
    /// Decode a wire tag
    #[must_use]
    pub const fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(Self::Add),
            2 => Some(Self::Cancel),
            3 => Some(Self::Fill),
            4 => Some(Self::Replace),
            _ => None,
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add => write!(f, "add"),
            Self::Cancel => write!(f, "cancel"),
            Self::Fill => write!(f, "fill"),
            Self::Replace => write!(f, "replace"),
        }
    }
}

/// One simulated order lifecycle record, as written to the output stream.
///
/// `old_price` and `old_quantity` are zero except on `Replace` records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    /// Simulated time of the lifecycle event
    pub timestamp: Ts,
    /// Lifecycle tag
    pub kind: RecordKind,
    /// Simulated order id
    pub order_id: u64,
    /// Symbol of the order
    pub symbol: Symbol,
    /// Limit price (fill price on `Fill` records)
    pub price: Px,
    /// Pre-replace price, `Replace` only
    pub old_price: Px,
    /// Order size (fill size on `Fill` records)
    pub quantity: Qty,
    /// Pre-replace size, `Replace` only
    pub old_quantity: Qty,
    /// Side of the order
    pub is_bid: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_tags_match_wire_numbers() {
        let add = BookEventBody::AddOrder {
            price: Px::from_nanos(100),
            order_id: 1,
            qty: Qty::from_shares(5),
            side: Side::Bid,
        };
        assert_eq!(add.tag(), 1);
        assert_eq!(BookEventBody::ClearBook.tag(), 8);
        assert_eq!(
            BookEventBody::SessionEvent {
                allow_crossed_book: false
            }
            .tag(),
            9
        );
    }

    #[test]
    fn record_kind_decoding() {
        assert_eq!(RecordKind::from_u8(1), Some(RecordKind::Add));
        assert_eq!(RecordKind::from_u8(4), Some(RecordKind::Replace));
        assert_eq!(RecordKind::from_u8(0), None);
        assert_eq!(RecordKind::from_u8(5), None);
    }

    #[test]
    fn actions_start_unstamped() {
        let a = OrderAction::add(
            7,
            Symbol::new(3),
            Px::from_nanos(100),
            Qty::from_shares(10),
            true,
            false,
        );
        assert!(a.sent_ts.is_zero());
        assert!(a.md_ts.is_zero());
        assert_eq!(a.kind, ActionKind::Add);

        let c = OrderAction::cancel(7, Symbol::new(3));
        assert_eq!(c.kind, ActionKind::Cancel);
        assert!(c.quantity.is_zero());
    }
}
