//! Trades table export (CSV).

use anyhow::{Context, Result};
use replaylab_core::driver::TIMESTAMP_FORMAT;
use replaylab_core::Trade;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Write one row per trade, numbered 1..N in chronological order.
///
/// Callers skip this entirely for zero-trade runs; the metrics report is the
/// artifact that is always written.
pub fn write_trades_csv(path: &Path, trades: &[Trade]) -> Result<()> {
    let mut file = File::create(path)
        .with_context(|| format!("failed to create trades CSV {}", path.display()))?;

    writeln!(
        file,
        "trade_number,timestamp,step,entry_price,exit_price,quantity,pnl,pnl_percent,win_loss,holding_period,close_reason,portfolio_value"
    )?;

    for (i, trade) in trades.iter().enumerate() {
        writeln!(
            file,
            "{},{},{},{:.4},{:.4},{:.4},{:.2},{:.2},{},{},{},{:.2}",
            i + 1,
            trade.timestamp.format(TIMESTAMP_FORMAT),
            trade.step,
            trade.entry_price,
            trade.exit_price,
            trade.quantity,
            trade.pnl,
            trade.pnl_percent,
            trade.outcome().label(),
            trade.holding_period,
            trade.close_reason,
            trade.portfolio_value,
        )?;
    }

    Ok(())
}
