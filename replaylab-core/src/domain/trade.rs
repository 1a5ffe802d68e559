//! Trade — a reconstructed, closed round-trip position.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A closed round-trip trade, projected from a [`ClosedPosition`] entry plus
/// the step record it occurred in.
///
/// Trades are not numbered here; sequential numbering (1..N in step order) is
/// applied by the metrics/export stage.
///
/// [`ClosedPosition`]: super::info::ClosedPosition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    // ── Location in the run ──
    pub timestamp: NaiveDateTime,
    pub step: usize,

    // ── Round trip ──
    pub entry_price: f64,
    pub exit_price: f64,
    pub quantity: f64,

    // ── Realized outcome ──
    pub pnl: f64,
    pub pnl_percent: f64,

    // ── Duration / cause ──
    pub holding_period: usize,
    pub close_reason: String,

    /// Portfolio value at the step the position closed.
    pub portfolio_value: f64,
}

/// Win/loss classification — a pure function of the sign of `pnl`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeOutcome {
    Win,
    Loss,
    BreakEven,
}

impl TradeOutcome {
    /// Export label for the `win_loss` column.
    pub fn label(&self) -> &'static str {
        match self {
            TradeOutcome::Win => "WIN",
            TradeOutcome::Loss => "LOSS",
            TradeOutcome::BreakEven => "BREAKEVEN",
        }
    }
}

impl Trade {
    pub fn outcome(&self) -> TradeOutcome {
        if self.pnl > 0.0 {
            TradeOutcome::Win
        } else if self.pnl < 0.0 {
            TradeOutcome::Loss
        } else {
            TradeOutcome::BreakEven
        }
    }

    pub fn is_winner(&self) -> bool {
        self.pnl > 0.0
    }

    pub fn is_loser(&self) -> bool {
        self.pnl < 0.0
    }
}
