//! ReplayLab CLI — streaming backtest runs and dataset inspection.
//!
//! Commands:
//! - `run` — execute a backtest; progress events stream to stdout as
//!   newline-delimited JSON, a human-readable summary goes to stderr
//! - `symbols` — list the distinct symbols in a dataset
//! - `timerange` — report the available time range for a symbol

use anyhow::{bail, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use replaylab_core::driver::TIMESTAMP_FORMAT;
use replaylab_core::NdjsonSink;
use replaylab_runner::runner::run_streaming_backtest;
use replaylab_runner::sim::{MomentumPolicy, RandomPolicy, SimConfig, SimEnv, StochasticPolicy};
use replaylab_runner::{
    list_symbols, load_rows, time_range, BacktestConfig, BacktestResult, MarketRow,
};

#[derive(Parser)]
#[command(
    name = "replaylab",
    about = "ReplayLab CLI — policy-replay backtest engine"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a backtest, streaming progress events to stdout.
    Run {
        /// Path to the market dataset CSV.
        #[arg(long)]
        data: PathBuf,

        /// Path to a TOML config file (mutually exclusive with
        /// --symbol/--start/--end).
        #[arg(long)]
        config: Option<PathBuf>,

        /// Symbol to backtest (e.g. XRPJPY).
        #[arg(long)]
        symbol: Option<String>,

        /// Window start ("YYYY-MM-DD HH:MM:SS" or "YYYY-MM-DD").
        #[arg(long)]
        start: Option<String>,

        /// Window end (inclusive).
        #[arg(long)]
        end: Option<String>,

        /// Starting balance.
        #[arg(long, default_value_t = 10_000.0)]
        initial_balance: f64,

        /// Emit a step event every N steps.
        #[arg(long, default_value_t = replaylab_core::DEFAULT_STREAM_EVERY)]
        stream_every: usize,

        /// Output directory for export artifacts.
        #[arg(long, default_value = "backtest_results")]
        output_dir: PathBuf,

        /// Reference policy driving the run.
        #[arg(long, value_enum, default_value_t = PolicyKind::Momentum)]
        policy: PolicyKind,

        /// Probability of replacing the policy action with a random one.
        #[arg(long, default_value_t = 0.0)]
        epsilon: f64,

        /// RNG seed for stochastic sampling.
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
    /// List the distinct symbols in a dataset.
    Symbols {
        /// Path to the market dataset CSV.
        #[arg(long)]
        data: PathBuf,

        /// Emit JSON instead of plain text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Report min/max timestamps and row count for a symbol.
    Timerange {
        /// Path to the market dataset CSV.
        #[arg(long)]
        data: PathBuf,

        /// Symbol to inspect.
        #[arg(long)]
        symbol: String,

        /// Emit JSON instead of plain text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PolicyKind {
    /// Deterministic sign-of-momentum policy.
    Momentum,
    /// Uniform random actions (seeded).
    Random,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            data,
            config,
            symbol,
            start,
            end,
            initial_balance,
            stream_every,
            output_dir,
            policy,
            epsilon,
            seed,
        } => run_cmd(
            data,
            config,
            symbol,
            start,
            end,
            initial_balance,
            stream_every,
            output_dir,
            policy,
            epsilon,
            seed,
        ),
        Commands::Symbols { data, json } => symbols_cmd(&data, json),
        Commands::Timerange { data, symbol, json } => timerange_cmd(&data, &symbol, json),
    }
}

#[allow(clippy::too_many_arguments)]
fn run_cmd(
    data: PathBuf,
    config_path: Option<PathBuf>,
    symbol: Option<String>,
    start: Option<String>,
    end: Option<String>,
    initial_balance: f64,
    stream_every: usize,
    output_dir: PathBuf,
    policy: PolicyKind,
    epsilon: f64,
    seed: u64,
) -> Result<()> {
    if config_path.is_some() && (symbol.is_some() || start.is_some() || end.is_some()) {
        bail!("--config and --symbol/--start/--end are mutually exclusive");
    }

    let backtest_config = if let Some(path) = config_path {
        BacktestConfig::from_file(&path)?
    } else {
        let (Some(symbol), Some(start), Some(end)) = (symbol, start, end) else {
            bail!("either --config or all of --symbol, --start, --end are required");
        };
        let mut config = BacktestConfig::new(symbol, start, end);
        config.initial_balance = initial_balance;
        config.stream_every = stream_every;
        config
    };

    let sim_config = SimConfig {
        initial_balance: backtest_config.initial_balance,
        ..SimConfig::default()
    };

    let mut sink = NdjsonSink::new(std::io::stdout().lock());

    let result = match policy {
        PolicyKind::Momentum => run_streaming_backtest(
            &backtest_config,
            &data,
            &output_dir,
            |rows: &[MarketRow]| {
                (
                    SimEnv::new(rows.to_vec(), sim_config.clone()),
                    StochasticPolicy::new(MomentumPolicy, epsilon, seed),
                )
            },
            &mut sink,
        ),
        PolicyKind::Random => run_streaming_backtest(
            &backtest_config,
            &data,
            &output_dir,
            |rows: &[MarketRow]| {
                (
                    SimEnv::new(rows.to_vec(), sim_config.clone()),
                    RandomPolicy::new(seed),
                )
            },
            &mut sink,
        ),
    };

    match result {
        Ok(result) => {
            print_summary(&result);
            Ok(())
        }
        Err(e) => {
            // The terminal error event is already on the stream.
            eprintln!("Run failed: {e}");
            std::process::exit(1);
        }
    }
}

fn symbols_cmd(data: &PathBuf, json: bool) -> Result<()> {
    let symbols = list_symbols(data)?;
    if json {
        println!("{}", serde_json::json!({ "symbols": symbols }));
        return Ok(());
    }
    if symbols.is_empty() {
        println!("No symbols found in {}", data.display());
        return Ok(());
    }
    for symbol in symbols {
        println!("{symbol}");
    }
    Ok(())
}

fn timerange_cmd(data: &PathBuf, symbol: &str, json: bool) -> Result<()> {
    let rows = load_rows(data, symbol)?;
    let (min, max) = time_range(&rows).expect("non-empty rows have a time range");
    let min = min.format(TIMESTAMP_FORMAT).to_string();
    let max = max.format(TIMESTAMP_FORMAT).to_string();
    if json {
        println!(
            "{}",
            serde_json::json!({
                "symbol": symbol,
                "min_timestamp": min,
                "max_timestamp": max,
                "total_rows": rows.len(),
            })
        );
        return Ok(());
    }
    println!("Symbol:      {symbol}");
    println!("From:        {min}");
    println!("To:          {max}");
    println!("Total rows:  {}", rows.len());
    Ok(())
}

fn print_summary(result: &BacktestResult) {
    let m = &result.metrics;
    eprintln!();
    eprintln!("=== Backtest Result ===");
    eprintln!("Symbol:         {}", result.symbol);
    eprintln!("Period:         {} to {}", result.start_time, result.end_time);
    eprintln!("Steps:          {}", result.steps);
    eprintln!("Trades:         {}", m.num_trades);
    eprintln!();
    eprintln!("--- Performance ---");
    eprintln!("Initial:        ${:.2}", m.initial_balance);
    eprintln!("Final:          ${:.2}", m.final_balance);
    eprintln!("Total Return:   ${:.2} ({:.2}%)", m.total_return, m.total_return_pct);
    eprintln!("Win Rate:       {:.2}%", m.win_rate);
    eprintln!("Profit Factor:  {:.3}", m.profit_factor);
    eprintln!("Expectancy:     ${:.2}", m.expectancy);
    eprintln!("Total Reward:   {:.2}", m.total_reward);
    if let Some(path) = &result.trades_csv_saved {
        eprintln!("Trades CSV:     {path}");
    }
    if let Some(path) = &result.metrics_saved {
        eprintln!("Metrics file:   {path}");
    }
    eprintln!();
}
