//! Backtest runner — wires together config, data, driver, metrics, and
//! export, emitting the progress stream as it goes.
//!
//! The event order contract (per run):
//! `info` → `init` → periodic `step` → `info` (metrics) → `info`/`warning`
//! per artifact → terminal `complete`, with terminal `error` replacing the
//! tail at whatever point the run aborts.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use replaylab_core::{
    extract_trades, run_steps, DriverConfig, DriverError, Environment, HistoryRecorder, Policy,
    ProgressSink, RunSummary, StreamEvent, Trade,
};

use crate::config::{BacktestConfig, ConfigError};
use crate::data_loader::{dataset_hash, load_rows, select_window, LoadError, MarketRow};
use crate::metrics::{MetricsError, MetricsSnapshot};
use crate::reporting::{
    metrics_report_path, trades_csv_path, write_metrics_report, write_trades_csv, ArtifactPaths,
};

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("data error: {0}")]
    Data(#[from] LoadError),

    #[error("{0}")]
    Driver(#[from] DriverError),

    #[error("metrics error: {0}")]
    Metrics(#[from] MetricsError),
}

/// Complete result of a single backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    pub symbol: String,
    pub start_time: String,
    pub end_time: String,
    pub steps: usize,
    pub initial_balance: f64,
    pub metrics: MetricsSnapshot,
    pub trades: Vec<Trade>,
    pub dataset_hash: String,
    /// Artifact paths as strings; `None` marks a skipped or failed write.
    pub trades_csv_saved: Option<String>,
    pub metrics_saved: Option<String>,
}

/// Run a streaming backtest end to end.
///
/// `build` constructs the environment/policy pair from the filtered window —
/// the collaborators stay external and substitutable. Artifacts land in
/// `output_dir`; export failures degrade to `warning` events rather than
/// failing the run.
pub fn run_streaming_backtest<E, P, F>(
    config: &BacktestConfig,
    dataset: &Path,
    output_dir: &Path,
    build: F,
    sink: &mut dyn ProgressSink,
) -> Result<BacktestResult, RunError>
where
    E: Environment,
    P: Policy<E>,
    F: FnOnce(&[MarketRow]) -> (E, P),
{
    if let Err(e) = config.validate() {
        sink.emit(&StreamEvent::error(e.to_string(), None));
        return Err(e.into());
    }
    // Window bounds parsed successfully during validation.
    let start = config.start()?;
    let end = config.end()?;

    sink.emit(&StreamEvent::info("Loading data..."));

    let rows = match load_rows(dataset, &config.symbol)
        .and_then(|rows| select_window(rows, start, end, config.min_rows))
    {
        Ok(rows) => rows,
        Err(e) => {
            sink.emit(&StreamEvent::error(e.to_string(), None));
            return Err(e.into());
        }
    };

    let total_steps = rows.len();
    let fingerprint = dataset_hash(&rows);

    sink.emit(&StreamEvent::Init {
        message: "Initializing backtest...".into(),
        total_steps,
    });

    let (mut env, mut policy) = build(&rows);

    sink.emit(&StreamEvent::info("Starting backtest..."));

    let timestamps: Vec<chrono::NaiveDateTime> = rows.iter().map(|r| r.open_time).collect();
    let driver_config = DriverConfig {
        initial_balance: config.initial_balance,
        stream_every: config.stream_every,
    };

    let mut recorder = HistoryRecorder::new();
    let steps = match run_steps(
        &mut env,
        &mut policy,
        &timestamps,
        &driver_config,
        &mut recorder,
        sink,
    ) {
        Ok(steps) => steps,
        Err(e) => {
            // Runtime faults carry a diagnostic trace. Metrics and export are
            // not attempted for a failed run.
            sink.emit(&StreamEvent::error(e.to_string(), Some(format!("{e:?}"))));
            return Err(e.into());
        }
    };

    sink.emit(&StreamEvent::info(
        "Calculating metrics from complete history...",
    ));

    let trades = extract_trades(recorder.records());
    let metrics =
        match MetricsSnapshot::compute(recorder.records(), &trades, config.initial_balance) {
            Ok(metrics) => metrics,
            Err(e) => {
                sink.emit(&StreamEvent::error(e.to_string(), None));
                return Err(e.into());
            }
        };

    let artifacts = export_artifacts(output_dir, &metrics, &trades, &fingerprint, sink);

    let trades_csv_saved = artifacts
        .trades_csv
        .as_ref()
        .map(|p| p.display().to_string());
    let metrics_saved = artifacts
        .metrics_report
        .as_ref()
        .map(|p| p.display().to_string());

    sink.emit(&StreamEvent::Complete {
        results: RunSummary {
            symbol: config.symbol.clone(),
            start_time: config.start_time.clone(),
            end_time: config.end_time.clone(),
            steps,
            initial_balance: config.initial_balance,
            final_balance: metrics.final_balance,
            total_pnl: metrics.final_balance - config.initial_balance,
            total_return: round2(metrics.total_return_pct),
            total_reward: round2(metrics.total_reward),
            num_trades: metrics.num_trades,
            win_rate: round2(metrics.win_rate),
            metrics_saved: metrics_saved.clone(),
            trades_csv_saved: trades_csv_saved.clone(),
        },
    });

    Ok(BacktestResult {
        symbol: config.symbol.clone(),
        start_time: config.start_time.clone(),
        end_time: config.end_time.clone(),
        steps,
        initial_balance: config.initial_balance,
        metrics,
        trades,
        dataset_hash: fingerprint,
        trades_csv_saved,
        metrics_saved,
    })
}

/// Write artifacts, reporting progress and degrading failures to warnings.
fn export_artifacts(
    output_dir: &Path,
    metrics: &MetricsSnapshot,
    trades: &[Trade],
    fingerprint: &str,
    sink: &mut dyn ProgressSink,
) -> ArtifactPaths {
    let mut paths = ArtifactPaths::default();
    let generated_at = chrono::Local::now().naive_local();

    if let Err(e) = std::fs::create_dir_all(output_dir) {
        sink.emit(&StreamEvent::warning(format!(
            "Failed to create output directory {}: {e}",
            output_dir.display()
        )));
        return paths;
    }

    if trades.is_empty() {
        sink.emit(&StreamEvent::info(
            "No trades to save to CSV (0 trades executed)",
        ));
    } else {
        sink.emit(&StreamEvent::info(format!(
            "Saving {} trades to CSV...",
            trades.len()
        )));
        let path = trades_csv_path(output_dir, generated_at);
        match write_trades_csv(&path, trades) {
            Ok(()) => {
                sink.emit(&StreamEvent::info(format!(
                    "Trades CSV saved to: {}",
                    path.display()
                )));
                paths.trades_csv = Some(path);
            }
            Err(e) => {
                sink.emit(&StreamEvent::warning(format!(
                    "Failed to save trades CSV: {e}"
                )));
            }
        }
    }

    sink.emit(&StreamEvent::info("Saving metrics to file..."));
    let path = metrics_report_path(output_dir, generated_at);
    match write_metrics_report(&path, metrics, trades, fingerprint, generated_at) {
        Ok(()) => {
            sink.emit(&StreamEvent::info(format!(
                "Metrics saved to: {}",
                path.display()
            )));
            paths.metrics_report = Some(path);
        }
        Err(e) => {
            sink.emit(&StreamEvent::warning(format!(
                "Failed to save metrics report: {e}"
            )));
        }
    }

    paths
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
