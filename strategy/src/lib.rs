//! Strategy interface and built-in strategies
//!
//! A strategy is driven entirely through three callbacks and owns no view of
//! the simulator's internals. Each callback returns an ordered list of order
//! actions; the simulator stamps latencies onto them before matching.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod basic;
pub mod theo;

pub use basic::BasicStrategy;
pub use theo::TheoStrategy;

use common::{BookTop, OrderAction, PublicFill, Px, Qty, Symbol};

/// The three-callback strategy contract.
///
/// Callbacks run synchronously on the driver's thread and must not retain
/// references to their inputs past the call.
pub trait Strategy {
    /// Human-readable strategy name for reports
    fn name(&self) -> &str;

    /// Symbol this run covers, pushed from the input file header
    fn set_symbol(&mut self, symbol: Symbol);

    /// A validated top-of-book snapshot arrived (latency-adjusted)
    fn on_book_top(&mut self, top: &BookTop) -> Vec<OrderAction>;

    /// A public trade printed on the tape (latency-adjusted)
    fn on_public_fill(&mut self, fill: &PublicFill) -> Vec<OrderAction>;

    /// One of this strategy's own simulated orders (partially) filled
    fn on_order_filled(
        &mut self,
        order_id: u64,
        fill_price: Px,
        fill_qty: Qty,
        is_bid: bool,
    ) -> Vec<OrderAction>;
}
