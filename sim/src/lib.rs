//! Deterministic fill simulation for a single symbol
//!
//! Replays pre-recorded market data through a strategy, models fixed
//! latencies at the three boundaries of the round trip, matches simulated
//! orders against the observed top of book, and writes every order
//! lifecycle event to a binary output stream.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod config;
pub mod driver;
pub mod latency;
pub mod market;
pub mod matcher;
pub mod report;

pub use config::{Mode, SimConfig};
pub use driver::Simulation;
pub use latency::{LatencyModel, LatencyStats};
pub use market::MarketState;
pub use matcher::OrderManager;
pub use report::Report;
