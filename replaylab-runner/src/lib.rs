//! ReplayLab Runner — backtest orchestration on top of `replaylab-core`.
//!
//! Owns everything around the engine: run configuration, dataset loading and
//! windowing, metrics aggregation, reference environment/policy
//! implementations, export artifacts, and the streaming run entry point.

pub mod config;
pub mod data_loader;
pub mod metrics;
pub mod reporting;
pub mod runner;
pub mod sim;

pub use config::{BacktestConfig, ConfigError};
pub use data_loader::{
    dataset_hash, list_symbols, load_rows, select_window, time_range, LoadError, MarketRow,
    MIN_USABLE_ROWS,
};
pub use metrics::{MetricsError, MetricsSnapshot};
pub use reporting::ArtifactPaths;
pub use runner::{run_streaming_backtest, BacktestResult, RunError};
