//! Performance metrics — pure aggregation over the recorded history.
//!
//! Every metric is a pure function of {step records, trades}: same inputs,
//! same snapshot, byte for byte. No rounding happens here — display precision
//! is applied by the export writers only, so aggregation never compounds
//! rounding error.

use replaylab_core::{StepRecord, Trade};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from metrics aggregation.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("initial balance must be positive to compute percentage return, got {0}")]
    NonPositiveInitialBalance(f64),
}

/// Aggregate view of one complete backtest run.
///
/// Computed wholesale from the full history — never patched incrementally —
/// so it is always consistent with the final recorded state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub initial_balance: f64,
    pub final_balance: f64,
    pub total_return: f64,
    pub total_return_pct: f64,

    pub num_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    /// Winning trades / total trades × 100; 0.0 for zero trades.
    pub win_rate: f64,

    pub total_pnl: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub profit_factor: f64,
    pub expectancy: f64,

    pub total_steps: usize,
    pub total_reward: f64,

    /// Trade count per close reason, first-occurrence order.
    pub close_reasons: Vec<(String, usize)>,
}

impl MetricsSnapshot {
    /// Compute all metrics from the complete history and reconstructed
    /// trades.
    ///
    /// Fails on a non-positive initial balance instead of dividing silently;
    /// the validated run path already rejects that configuration upstream.
    pub fn compute(
        records: &[StepRecord],
        trades: &[Trade],
        initial_balance: f64,
    ) -> Result<Self, MetricsError> {
        if initial_balance <= 0.0 {
            return Err(MetricsError::NonPositiveInitialBalance(initial_balance));
        }

        // Empty history → no trades, no return.
        let final_balance = records
            .last()
            .map(|r| r.info.portfolio_value)
            .unwrap_or(initial_balance);
        let total_return = final_balance - initial_balance;
        let total_return_pct = total_return / initial_balance * 100.0;

        let winning_trades = trades.iter().filter(|t| t.is_winner()).count();
        let losing_trades = trades.iter().filter(|t| t.is_loser()).count();

        Ok(Self {
            initial_balance,
            final_balance,
            total_return,
            total_return_pct,
            num_trades: trades.len(),
            winning_trades,
            losing_trades,
            win_rate: win_rate(trades),
            total_pnl: trades.iter().map(|t| t.pnl).sum(),
            avg_win: avg_win(trades),
            avg_loss: avg_loss(trades),
            profit_factor: profit_factor(trades),
            expectancy: expectancy(trades),
            total_steps: records.len(),
            total_reward: total_reward(records),
            close_reasons: close_reason_tally(trades),
        })
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Win rate as a percentage. Break-even trades count toward the total but
/// not the winners, so a run of only break-even trades has a 0% win rate.
pub fn win_rate(trades: &[Trade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let winners = trades.iter().filter(|t| t.is_winner()).count();
    winners as f64 / trades.len() as f64 * 100.0
}

/// Mean pnl over winning trades; 0.0 when there are none.
pub fn avg_win(trades: &[Trade]) -> f64 {
    mean(trades.iter().filter(|t| t.is_winner()).map(|t| t.pnl))
}

/// Mean pnl over losing trades (a negative number); 0.0 when there are none.
pub fn avg_loss(trades: &[Trade]) -> f64 {
    mean(trades.iter().filter(|t| t.is_loser()).map(|t| t.pnl))
}

/// Profit factor: gross winning pnl / |gross losing pnl|.
///
/// Reports 0.0 when the loss bucket is empty — including all-winning runs.
/// This mirrors the upstream reporting convention (an explicit policy choice,
/// never infinity or NaN); consumers that need to distinguish "no losses"
/// from "no edge" should check `losing_trades`.
pub fn profit_factor(trades: &[Trade]) -> f64 {
    let gross_wins: f64 = trades.iter().filter(|t| t.is_winner()).map(|t| t.pnl).sum();
    let gross_losses: f64 = trades
        .iter()
        .filter(|t| t.is_loser())
        .map(|t| t.pnl.abs())
        .sum();

    if gross_losses > 0.0 {
        gross_wins / gross_losses
    } else {
        0.0
    }
}

/// Expectancy: probability-weighted average pnl per trade.
///
/// `(win_rate × avg_win) + ((1 − win_rate) × avg_loss)` with the rate as a
/// fraction. Finite for any mixture of buckets, including all-wins and
/// all-losses, because empty buckets contribute 0.
pub fn expectancy(trades: &[Trade]) -> f64 {
    let rate = win_rate(trades) / 100.0;
    rate * avg_win(trades) + (1.0 - rate) * avg_loss(trades)
}

/// Sum of rewards across the exact step sequence, trades or not.
pub fn total_reward(records: &[StepRecord]) -> f64 {
    records.iter().map(|r| r.reward).sum()
}

/// Trade count per close reason. First-occurrence order is preserved for
/// reporting; it carries no semantic weight.
pub fn close_reason_tally(trades: &[Trade]) -> Vec<(String, usize)> {
    let mut tally: Vec<(String, usize)> = Vec::new();
    for trade in trades {
        match tally.iter_mut().find(|(reason, _)| reason == &trade.close_reason) {
            Some((_, count)) => *count += 1,
            None => tally.push((trade.close_reason.clone(), 1)),
        }
    }
    tally
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let collected: Vec<f64> = values.collect();
    if collected.is_empty() {
        return 0.0;
    }
    collected.iter().sum::<f64>() / collected.len() as f64
}
