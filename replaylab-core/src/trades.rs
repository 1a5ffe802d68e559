//! Trade reconstruction — turns per-step position-change events into
//! discrete closed-trade records.
//!
//! Post-processes the history after the step loop completes. Pure function:
//! step records in, trades out. Idempotent — re-running on the same history
//! yields identical output.

use crate::domain::{StepRecord, Trade};

/// Extract all closed round-trip trades from the recorded history.
///
/// Scans records in order; every `closed` entry in a record's
/// `position_changes` becomes one [`Trade`], in the order the entries appear
/// within the record. A trade exists if and only if a closed entry existed in
/// some record — nothing is synthesized for positions still open at the end
/// of the run.
pub fn extract_trades(records: &[StepRecord]) -> Vec<Trade> {
    let mut trades = Vec::new();

    for record in records {
        for closed in record.info.closed_positions() {
            trades.push(Trade {
                timestamp: record.timestamp,
                step: record.step_index,
                entry_price: closed.entry_price,
                exit_price: closed.exit_price,
                quantity: closed.quantity,
                pnl: closed.pnl,
                pnl_percent: closed.pnl_percent,
                holding_period: closed.holding_period,
                close_reason: closed.close_reason.clone(),
                portfolio_value: record.info.portfolio_value,
            });
        }
    }

    trades
}
