//! Progress stream protocol — typed events emitted while a run executes.
//!
//! Events form a totally ordered, forward-only sequence: `info` →
//! `init` → periodic `step` → `info`/`warning` per artifact → terminal
//! `complete` or `error`. The emitter never buffers the whole run; each event
//! is produced inline between computation steps.
//!
//! On the wire an event is one JSON object per line, tagged by a `type`
//! field. Consumers must tolerate unknown future fields; the emitter never
//! renames or re-types an existing one.

use serde::{Deserialize, Serialize};
use std::io::Write;

/// One event in the progress stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Free-text status line.
    Info { message: String },

    /// Announces the total step bound before the loop starts.
    Init { message: String, total_steps: usize },

    /// Periodic progress snapshot (every `stream_every`-th step, not every
    /// step, to bound stream volume).
    Step {
        step: usize,
        total_steps: usize,
        portfolio_value: f64,
        initial_balance: f64,
        pnl: f64,
        timestamp: String,
        reward: f64,
    },

    /// Non-fatal problem (e.g. an artifact failed to write).
    Warning { message: String },

    /// Terminal success event carrying the full results payload.
    Complete { results: RunSummary },

    /// Terminal failure event, with an optional diagnostic trace.
    Error {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        trace: Option<String>,
    },
}

impl StreamEvent {
    pub fn info(message: impl Into<String>) -> Self {
        StreamEvent::Info {
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        StreamEvent::Warning {
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>, trace: Option<String>) -> Self {
        StreamEvent::Error {
            message: message.into(),
            trace,
        }
    }

    /// True for the two terminal variants.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Complete { .. } | StreamEvent::Error { .. })
    }
}

/// Results payload of the terminal `complete` event.
///
/// Percentages and reward totals are rounded for display here; full-precision
/// values live on the run's `MetricsSnapshot`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub symbol: String,
    pub start_time: String,
    pub end_time: String,
    pub steps: usize,
    pub initial_balance: f64,
    pub final_balance: f64,
    pub total_pnl: f64,
    pub total_return: f64,
    pub total_reward: f64,
    pub num_trades: usize,
    pub win_rate: f64,
    /// Path of the metrics report artifact, `None` if the write failed.
    pub metrics_saved: Option<String>,
    /// Path of the trades CSV, `None` if there were no trades or the write
    /// failed.
    pub trades_csv_saved: Option<String>,
}

/// Forward-only consumer of the progress stream.
///
/// No replay, no rewind: once emitted, an event is gone. Emission happens
/// inline between steps, so a slow sink stalls the run — accepted behavior
/// for the throughput of financial backtests.
pub trait ProgressSink {
    fn emit(&mut self, event: &StreamEvent);
}

/// Newline-delimited JSON transport writer.
///
/// Write errors are dropped at the transport boundary: if the consumer
/// disconnects, in-flight emission is lost and the engine carries on to
/// normal process completion.
pub struct NdjsonSink<W: Write> {
    writer: W,
}

impl<W: Write> NdjsonSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> ProgressSink for NdjsonSink<W> {
    fn emit(&mut self, event: &StreamEvent) {
        if let Ok(line) = serde_json::to_string(event) {
            let _ = writeln!(self.writer, "{line}");
            let _ = self.writer.flush();
        }
    }
}

/// Collects events in memory. Used by tests and in-process consumers.
#[derive(Debug, Default)]
pub struct CollectSink {
    pub events: Vec<StreamEvent>,
}

impl CollectSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressSink for CollectSink {
    fn emit(&mut self, event: &StreamEvent) {
        self.events.push(event.clone());
    }
}

/// Discards everything.
#[derive(Debug, Default)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn emit(&mut self, _event: &StreamEvent) {}
}
