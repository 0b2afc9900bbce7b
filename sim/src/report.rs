//! End-of-run results

use std::fmt;

use common::Px;

use crate::latency::LatencyStats;

/// Summary of one simulation run.
///
/// Prices and P&L are reported in currency units; the underlying arithmetic
/// stays in integer nanos until the final division.
#[derive(Debug, Clone)]
pub struct Report {
    /// Strategy that drove the run
    pub strategy: String,
    /// Tops dispatched (tops/fills mode)
    pub tops_processed: u64,
    /// Public fills dispatched
    pub fills_processed: u64,
    /// Book events applied (queue mode)
    pub events_processed: u64,
    /// Orders placed
    pub orders_placed: u64,
    /// Fill events booked
    pub orders_filled: u64,
    /// Shares bought
    pub total_buy_volume: u64,
    /// Shares sold
    pub total_sell_volume: u64,
    /// Currency spent buying
    pub total_buy_cost: f64,
    /// Currency received selling
    pub total_sell_proceeds: f64,
    /// Final net position in shares
    pub position: i64,
    /// Mid of the last valid top
    pub final_mid: Px,
    /// Signed cash flow in nanos-shares
    pub cash_flow_nanos: i128,
    /// Lifecycle records written
    pub records_written: u64,
    /// Latency accumulator totals
    pub latency: LatencyStats,
    /// Fixed expected round trip in nanoseconds
    pub expected_round_trip_ns: u64,
}

impl Report {
    /// Fills per placed order, as a percentage
    #[must_use]
    pub fn fill_rate(&self) -> f64 {
        if self.orders_placed == 0 {
            0.0
        } else {
            100.0 * self.orders_filled as f64 / self.orders_placed as f64
        }
    }

    /// Mark-to-mid value of the final position, in currency units
    #[must_use]
    pub fn closing_value(&self) -> f64 {
        (self.position as f64) * self.final_mid.as_f64()
    }

    /// Total P&L: cash flow plus the position marked at the final mid
    #[must_use]
    pub fn pnl(&self) -> f64 {
        self.cash_flow_nanos as f64 / 1e9 + self.closing_value()
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "========= simulation results =========")?;
        writeln!(f, "strategy:            {}", self.strategy)?;
        writeln!(
            f,
            "events:              {} tops, {} fills, {} book events",
            self.tops_processed, self.fills_processed, self.events_processed
        )?;
        writeln!(
            f,
            "orders:              {} placed, {} filled ({:.1}%)",
            self.orders_placed,
            self.orders_filled,
            self.fill_rate()
        )?;
        writeln!(
            f,
            "bought:              {} shares for ${:.2}",
            self.total_buy_volume, self.total_buy_cost
        )?;
        writeln!(
            f,
            "sold:                {} shares for ${:.2}",
            self.total_sell_volume, self.total_sell_proceeds
        )?;
        writeln!(f, "final position:      {} shares", self.position)?;
        writeln!(f, "final mid:           ${}", self.final_mid)?;
        if self.position != 0 {
            writeln!(f, "closing value:       ${:.2}", self.closing_value())?;
        }
        writeln!(f, "records written:     {}", self.records_written)?;
        writeln!(
            f,
            "latency added:       {}ns md, {}ns out, {}ns notify (expected rtt {}ns)",
            self.latency.md_to_strategy_ns,
            self.latency.strategy_to_exchange_ns,
            self.latency.exchange_to_notification_ns,
            self.expected_round_trip_ns
        )?;
        let pnl = self.pnl();
        let verdict = if pnl > 0.0 {
            "PROFIT"
        } else if pnl < 0.0 {
            "LOSS"
        } else {
            "BREAKEVEN"
        };
        writeln!(f, "final p&l:           ${pnl:.4} ({verdict})")?;
        write!(f, "======================================")
    }
}
