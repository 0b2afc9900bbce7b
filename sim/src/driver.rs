//! Simulation driver: stream merging, dispatch and teardown
//!
//! The driver owns every piece of run state and is the only executor.
//! Dispatching a top means: validity/coalescing gate, latency-adjusted
//! strategy callback, action processing, then the resting-order
//! re-evaluation pass. Dispatching a public fill delivers it
//! latency-adjusted and processes the returned actions only.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::info;

use common::{BookTop, PublicFill, Symbol};
use lob::Book;
use storage::{BookEventReader, FillsReader, OrderRecordWriter, StorageError, TopsReader};
use strategy::Strategy;

use crate::config::SimConfig;
use crate::latency::LatencyModel;
use crate::market::MarketState;
use crate::matcher::OrderManager;
use crate::report::Report;

/// Dispatched events between progress lines
const PROGRESS_INTERVAL: u64 = 100_000;

/// One simulation run over pre-recorded data
pub struct Simulation {
    market: MarketState,
    latency: LatencyModel,
    orders: OrderManager,
    strategy: Box<dyn Strategy>,
    writer: OrderRecordWriter<BufWriter<File>>,
    tops_processed: u64,
    fills_processed: u64,
    events_processed: u64,
}

impl Simulation {
    /// Build a run: opens (truncates) the output file immediately so a
    /// failure surfaces before any input is consumed.
    pub fn new(cfg: &SimConfig, strategy: Box<dyn Strategy>, output: &Path) -> Result<Self> {
        let writer = OrderRecordWriter::create(output)
            .with_context(|| format!("creating output file {}", output.display()))?;
        Ok(Self {
            market: MarketState::new(cfg.min_top_interval_ns),
            latency: LatencyModel::new(cfg.md_latency_ns, cfg.exch_latency_ns),
            orders: OrderManager::new(),
            strategy,
            writer,
            tops_processed: 0,
            fills_processed: 0,
            events_processed: 0,
        })
    }

    /// Merge a tops stream and a fills stream by timestamp, tops first on
    /// ties, and run to exhaustion of both.
    pub fn run_tops_fills(&mut self, tops_path: &Path, fills_path: &Path) -> Result<Report> {
        let mut tops = TopsReader::open(tops_path)
            .with_context(|| format!("opening tops file {}", tops_path.display()))?;
        let mut fills = FillsReader::open(fills_path)
            .with_context(|| format!("opening fills file {}", fills_path.display()))?;
        self.strategy
            .set_symbol(Symbol::from_idx(tops.header().symbol_idx));

        let mut next_top = tops.next().transpose()?;
        let mut next_fill = fills.next().transpose()?;

        loop {
            let take_top = match (next_top.as_ref(), next_fill.as_ref()) {
                (Some(top), Some(fill)) => top.ts <= fill.ts,
                (Some(_), None) => true,
                (None, Some(_)) => false,
                (None, None) => break,
            };
            if take_top {
                if let Some(top) = next_top.take() {
                    self.dispatch_top(top, true)?;
                    self.tops_processed += 1;
                    next_top = tops.next().transpose()?;
                }
            } else if let Some(fill) = next_fill.take() {
                self.dispatch_fill(fill)?;
                self.fills_processed += 1;
                next_fill = fills.next().transpose()?;
            }
            self.log_progress();
        }

        self.finish()
    }

    /// Reconstruct the book from a book-events stream, dispatching the
    /// synthesized fills and top changes as they arise.
    pub fn run_queue(&mut self, events_path: &Path) -> Result<Report> {
        let mut events = BookEventReader::open(events_path)
            .with_context(|| format!("opening book events file {}", events_path.display()))?;
        self.strategy
            .set_symbol(Symbol::from_idx(events.header().symbol_idx));

        let mut book = Book::new();
        for ev in &mut events {
            let ev = ev?;
            let delta = book.apply(&ev);
            self.events_processed += 1;

            // The trade precedes the post-trade book state it produced.
            if let Some(fill) = delta.fill {
                self.dispatch_fill(fill)?;
                self.fills_processed += 1;
            }
            if let Some(top) = delta.top {
                // Synthesized tops are validity-filtered but never coalesced.
                self.dispatch_top(top, false)?;
                self.tops_processed += 1;
            }
            self.log_progress();
        }

        self.finish()
    }

    fn dispatch_top(&mut self, top: BookTop, coalesce: bool) -> Result<(), StorageError> {
        if !self.market.accept(&top, coalesce) {
            return Ok(());
        }
        let delayed_ts = self.latency.delay_market_data(top.ts);
        let mut delayed = top;
        delayed.ts = delayed_ts;

        let actions = self.strategy.on_book_top(&delayed);
        self.orders.apply_actions(
            actions,
            delayed_ts,
            &self.market,
            &mut self.latency,
            self.strategy.as_mut(),
            &mut self.writer,
        )?;
        self.orders.reevaluate(
            &self.market,
            &mut self.latency,
            self.strategy.as_mut(),
            &mut self.writer,
        )
    }

    fn dispatch_fill(&mut self, fill: PublicFill) -> Result<(), StorageError> {
        let delayed_ts = self.latency.delay_market_data(fill.ts);
        let mut delayed = fill;
        delayed.ts = delayed_ts;

        let actions = self.strategy.on_public_fill(&delayed);
        self.orders.apply_actions(
            actions,
            delayed_ts,
            &self.market,
            &mut self.latency,
            self.strategy.as_mut(),
            &mut self.writer,
        )
    }

    fn log_progress(&self) {
        let total = self.tops_processed + self.fills_processed + self.events_processed;
        if total > 0 && total % PROGRESS_INTERVAL == 0 {
            info!(
                tops = self.tops_processed,
                fills = self.fills_processed,
                events = self.events_processed,
                placed = self.orders.orders_placed(),
                filled = self.orders.orders_filled(),
                position = self.orders.position(),
                mark = %self.market.last_valid_mid(),
                "progress"
            );
        }
    }

    /// Flush the output stream and assemble the report
    fn finish(&mut self) -> Result<Report> {
        self.writer.flush()?;
        Ok(Report {
            strategy: self.strategy.name().to_string(),
            tops_processed: self.tops_processed,
            fills_processed: self.fills_processed,
            events_processed: self.events_processed,
            orders_placed: self.orders.orders_placed(),
            orders_filled: self.orders.orders_filled(),
            total_buy_volume: self.orders.total_buy_volume(),
            total_sell_volume: self.orders.total_sell_volume(),
            total_buy_cost: self.orders.total_buy_cost(),
            total_sell_proceeds: self.orders.total_sell_proceeds(),
            position: self.orders.position(),
            final_mid: self.market.last_valid_mid(),
            cash_flow_nanos: self.orders.cash_flow(),
            records_written: self.writer.records(),
            latency: self.latency.stats(),
            expected_round_trip_ns: self.latency.expected_round_trip_ns(),
        })
    }
}
