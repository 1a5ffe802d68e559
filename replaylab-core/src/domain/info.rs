//! EnvInfo — the typed per-step payload reported by the environment.
//!
//! The environment's info payload is dynamically shaped in spirit, but the
//! engine only ever reads two things from it: the current portfolio value and
//! the list of positions closed during the step. Modeling those as a struct
//! (rather than an untyped map) catches malformed environment output at the
//! boundary instead of deep inside aggregation.

use serde::{Deserialize, Serialize};

/// Sentinel close reason for entries that did not carry one.
pub const UNKNOWN_CLOSE_REASON: &str = "unknown";

/// Per-step environment payload.
///
/// `portfolio_value` is required; `position_changes` is present only on steps
/// where at least one position was opened or closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvInfo {
    pub portfolio_value: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_changes: Option<PositionChanges>,
}

impl EnvInfo {
    /// Payload with no position activity.
    pub fn flat(portfolio_value: f64) -> Self {
        Self {
            portfolio_value,
            position_changes: None,
        }
    }

    /// Payload carrying closed positions for this step.
    pub fn with_closed(portfolio_value: f64, closed: Vec<ClosedPosition>) -> Self {
        Self {
            portfolio_value,
            position_changes: Some(PositionChanges { closed }),
        }
    }

    /// Closed-position entries for this step, in report order.
    pub fn closed_positions(&self) -> &[ClosedPosition] {
        self.position_changes
            .as_ref()
            .map(|pc| pc.closed.as_slice())
            .unwrap_or(&[])
    }
}

/// Position activity during a single step.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PositionChanges {
    /// Positions closed during the step, in the order the environment
    /// reported them.
    #[serde(default)]
    pub closed: Vec<ClosedPosition>,
}

/// One closed round-trip position as reported by the environment.
///
/// Numeric fields default to 0 and `close_reason` to `"unknown"` when absent
/// from a serialized source; reconstruction never fails on missing optionals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedPosition {
    #[serde(default)]
    pub entry_price: f64,
    #[serde(default)]
    pub exit_price: f64,
    #[serde(default)]
    pub quantity: f64,
    #[serde(default)]
    pub pnl: f64,
    #[serde(default)]
    pub pnl_percent: f64,
    /// Steps the position was held.
    #[serde(default)]
    pub holding_period: usize,
    /// Categorical cause of the close (e.g. "stop-loss", "take-profit",
    /// "signal-exit", "end-of-data"). Open vocabulary.
    #[serde(default = "default_close_reason")]
    pub close_reason: String,
}

fn default_close_reason() -> String {
    UNKNOWN_CLOSE_REASON.to_string()
}

impl Default for ClosedPosition {
    fn default() -> Self {
        Self {
            entry_price: 0.0,
            exit_price: 0.0,
            quantity: 0.0,
            pnl: 0.0,
            pnl_percent: 0.0,
            holding_period: 0,
            close_reason: default_close_reason(),
        }
    }
}
