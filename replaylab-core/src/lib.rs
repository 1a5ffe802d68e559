//! ReplayLab Core — policy-replay backtest engine.
//!
//! This crate contains the heart of the backtest engine:
//! - Domain types (step records, position-change payloads, trades)
//! - Append-only history recorder
//! - Trade reconstruction from per-step position changes
//! - Environment and policy capability traits
//! - Bounded step-loop driver
//! - Typed progress event protocol with pluggable sinks
//!
//! The crate performs no file or network I/O. Dataset loading, metrics
//! aggregation, and artifact export live in `replaylab-runner`.

pub mod domain;
pub mod driver;
pub mod env;
pub mod events;
pub mod history;
pub mod trades;

pub use domain::{ClosedPosition, EnvInfo, PositionChanges, StepRecord, Trade, TradeOutcome};
pub use driver::{run_steps, DriverConfig, DriverError, DEFAULT_STREAM_EVERY};
pub use env::{Environment, Policy, StepFault, Transition};
pub use events::{CollectSink, NdjsonSink, NullSink, ProgressSink, RunSummary, StreamEvent};
pub use history::HistoryRecorder;
pub use trades::extract_trades;
