//! Queue-aware limit order book reconstruction
//!
//! Rebuilds a single symbol's book from the primitive book-event stream and
//! synthesizes top-of-book snapshots and public-fill events for the simulator.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod book;

pub use book::{Book, BookDelta, RestingOrder};
