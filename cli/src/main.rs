//! fillsim - offline fill simulator for equity trading strategies

#![warn(missing_docs)]
#![forbid(unsafe_code)]

use anyhow::{bail, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing::{info, Level};

use sim::{Mode, SimConfig, Simulation};
use strategy::{BasicStrategy, Strategy, TheoStrategy};

#[derive(Parser)]
#[command(name = "fillsim")]
#[command(about = "Replay recorded market data through a strategy and simulate fills")]
#[command(version)]
struct Cli {
    /// Book-tops input file (tops/fills mode)
    #[arg(long, required_unless_present = "events", requires = "fills")]
    tops: Option<PathBuf>,

    /// Book-fills input file (tops/fills mode)
    #[arg(long, requires = "tops")]
    fills: Option<PathBuf>,

    /// Book-events input file (queue mode)
    #[arg(long, conflicts_with_all = ["tops", "fills"])]
    events: Option<PathBuf>,

    /// Output file for simulated order lifecycle records
    #[arg(long, short, default_value = "orders.bin")]
    output: PathBuf,

    /// Strategy to run
    #[arg(long, short, value_enum, default_value_t = StrategyChoice::Basic)]
    strategy: StrategyChoice,

    /// Market data to strategy latency in nanoseconds
    #[arg(long, default_value_t = 1_000)]
    md_latency_ns: u64,

    /// Strategy to exchange latency in nanoseconds, applied each way
    #[arg(long, default_value_t = 10_000)]
    exch_latency_ns: u64,

    /// Edge at which the theo strategy places quotes, in percent
    #[arg(long, default_value_t = 0.01)]
    place_edge_percent: f64,

    /// Edge below which the theo strategy pulls quotes, in percent
    #[arg(long, default_value_t = 0.005)]
    cancel_edge_percent: f64,

    /// Weight of the trade EMA in the theo blend
    #[arg(long, default_value_t = 0.7)]
    trade_weight: f64,

    /// Per-trade decay of the theo EMA
    #[arg(long, default_value_t = 0.05)]
    ema_decay: f64,

    /// Log verbosity
    #[arg(long, default_value = "info")]
    log_level: Level,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StrategyChoice {
    /// Alternating one-lot quoter that crosses the spread
    Basic,
    /// Post-only quoter around an EMA-blended theoretical value
    Theo,
}

fn build_strategy(cli: &Cli) -> Box<dyn Strategy> {
    match cli.strategy {
        StrategyChoice::Basic => Box::new(BasicStrategy::new()),
        StrategyChoice::Theo => Box::new(TheoStrategy::new(
            cli.place_edge_percent,
            cli.cancel_edge_percent,
            cli.trade_weight,
            cli.ema_decay,
        )),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_target(false)
        .init();

    let cfg = SimConfig {
        md_latency_ns: cli.md_latency_ns,
        exch_latency_ns: cli.exch_latency_ns,
        mode: if cli.events.is_some() {
            Mode::Queue
        } else {
            Mode::TopsFills
        },
        ..SimConfig::default()
    };

    let strategy = build_strategy(&cli);
    info!(
        strategy = strategy.name(),
        md_latency_ns = cfg.md_latency_ns,
        exch_latency_ns = cfg.exch_latency_ns,
        output = %cli.output.display(),
        "starting simulation"
    );

    let mut simulation = Simulation::new(&cfg, strategy, &cli.output)?;
    let report = match cfg.mode {
        Mode::Queue => {
            let Some(events) = cli.events.as_deref() else {
                bail!("queue mode needs --events");
            };
            if !events.exists() {
                bail!("book events file does not exist: {}", events.display());
            }
            simulation.run_queue(events)?
        }
        Mode::TopsFills => {
            let (Some(tops), Some(fills)) = (cli.tops.as_deref(), cli.fills.as_deref()) else {
                bail!("tops/fills mode needs both --tops and --fills");
            };
            if !tops.exists() {
                bail!("book tops file does not exist: {}", tops.display());
            }
            if !fills.exists() {
                bail!("book fills file does not exist: {}", fills.display());
            }
            simulation.run_tops_fills(tops, fills)?
        }
    };

    info!("simulation complete");
    println!("{report}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn queue_and_tops_inputs_are_exclusive() {
        let err = Cli::try_parse_from([
            "fillsim",
            "--tops",
            "t.bin",
            "--fills",
            "f.bin",
            "--events",
            "e.bin",
        ]);
        assert!(err.is_err());
    }

    #[test]
    fn defaults_select_basic_strategy_and_documented_latencies() {
        let cli =
            Cli::try_parse_from(["fillsim", "--tops", "t.bin", "--fills", "f.bin"]).unwrap();
        assert_eq!(cli.strategy, StrategyChoice::Basic);
        assert_eq!(cli.md_latency_ns, 1_000);
        assert_eq!(cli.exch_latency_ns, 10_000);
    }
}
