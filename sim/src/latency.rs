//! Fixed additive latency model
//!
//! Latency is applied by shifting event timestamps forward at three
//! boundaries: market data into the strategy, strategy actions out to the
//! exchange, and exchange fills back to the strategy. Nothing here touches
//! the wall clock and no reordering ever results; downstream records simply
//! carry the shifted stamps.

use common::{OrderAction, Ts};

/// Accumulated latency totals for the final report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LatencyStats {
    /// Total nanoseconds added at the market-data boundary
    pub md_to_strategy_ns: u64,
    /// Events delayed at the market-data boundary
    pub md_events: u64,
    /// Total nanoseconds added stamping strategy actions
    pub strategy_to_exchange_ns: u64,
    /// Actions stamped
    pub actions: u64,
    /// Total nanoseconds added on fill notifications
    pub exchange_to_notification_ns: u64,
    /// Fill notifications stamped
    pub notifications: u64,
}

/// The three-boundary latency model
#[derive(Debug, Clone)]
pub struct LatencyModel {
    md_latency_ns: u64,
    exch_latency_ns: u64,
    stats: LatencyStats,
}

impl LatencyModel {
    /// Create a model with the two fixed delays
    #[must_use]
    pub fn new(md_latency_ns: u64, exch_latency_ns: u64) -> Self {
        Self {
            md_latency_ns,
            exch_latency_ns,
            stats: LatencyStats::default(),
        }
    }

    /// Shift a market-data timestamp to its strategy-visible time
    pub fn delay_market_data(&mut self, ts: Ts) -> Ts {
        self.stats.md_to_strategy_ns += self.md_latency_ns;
        self.stats.md_events += 1;
        ts.plus_nanos(self.md_latency_ns)
    }

    /// Stamp an action's send and exchange-arrival times.
    ///
    /// `reference_ts` is the strategy-visible time of whatever the action is
    /// responding to; it backfills `sent_ts` only when the strategy left it
    /// unset.
    pub fn stamp_action(&mut self, action: &mut OrderAction, reference_ts: Ts) {
        if action.sent_ts.is_zero() {
            action.sent_ts = reference_ts;
        }
        action.md_ts = action.sent_ts.plus_nanos(self.exch_latency_ns);
        self.stats.strategy_to_exchange_ns += self.exch_latency_ns;
        self.stats.actions += 1;
    }

    /// Compute the strategy-visible time of a fill decided at `md_ts`
    pub fn fill_notification(&mut self, md_ts: Ts) -> Ts {
        let notify = md_ts.plus_nanos(self.exch_latency_ns);
        if !notify.is_zero() {
            self.stats.exchange_to_notification_ns += self.exch_latency_ns;
            self.stats.notifications += 1;
        }
        notify
    }

    /// The fixed one-order round trip: in, out, and notification back
    #[must_use]
    pub fn expected_round_trip_ns(&self) -> u64 {
        self.md_latency_ns + 2 * self.exch_latency_ns
    }

    /// Accumulated totals
    #[must_use]
    pub fn stats(&self) -> LatencyStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{OrderAction, Px, Qty, Symbol};

    #[test]
    fn market_data_shift_accumulates() {
        let mut model = LatencyModel::new(2_000, 5_000);
        let ts = model.delay_market_data(Ts::from_nanos(10_000_000));
        assert_eq!(ts.as_nanos(), 10_002_000);
        model.delay_market_data(Ts::from_nanos(20_000_000));
        assert_eq!(model.stats().md_to_strategy_ns, 4_000);
        assert_eq!(model.stats().md_events, 2);
    }

    #[test]
    fn stamp_backfills_only_unset_sent_ts() {
        let mut model = LatencyModel::new(2_000, 5_000);
        let mut a = OrderAction::add(
            1,
            Symbol::new(1),
            Px::from_nanos(100),
            Qty::from_shares(1),
            true,
            false,
        );
        model.stamp_action(&mut a, Ts::from_nanos(10_002_000));
        assert_eq!(a.sent_ts.as_nanos(), 10_002_000);
        assert_eq!(a.md_ts.as_nanos(), 10_007_000);

        // A strategy-provided sent_ts survives.
        let mut b = OrderAction::cancel(2, Symbol::new(1));
        b.sent_ts = Ts::from_nanos(500);
        model.stamp_action(&mut b, Ts::from_nanos(10_002_000));
        assert_eq!(b.sent_ts.as_nanos(), 500);
        assert_eq!(b.md_ts.as_nanos(), 5_500);
        assert_eq!(model.stats().strategy_to_exchange_ns, 10_000);
        assert_eq!(model.stats().actions, 2);
    }

    #[test]
    fn fill_notification_adds_one_exchange_leg() {
        let mut model = LatencyModel::new(2_000, 5_000);
        let notify = model.fill_notification(Ts::from_nanos(10_007_000));
        assert_eq!(notify.as_nanos(), 10_012_000);
        assert_eq!(model.stats().exchange_to_notification_ns, 5_000);
        assert_eq!(model.stats().notifications, 1);
    }

    #[test]
    fn zero_notification_is_not_counted() {
        let mut model = LatencyModel::new(0, 0);
        let notify = model.fill_notification(Ts::ZERO);
        assert!(notify.is_zero());
        assert_eq!(model.stats().notifications, 0);
    }

    #[test]
    fn expected_round_trip() {
        let model = LatencyModel::new(1_000, 10_000);
        assert_eq!(model.expected_round_trip_ns(), 21_000);
    }
}
