//! Metrics report export — the structured text document for a run.

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use replaylab_core::driver::TIMESTAMP_FORMAT;
use replaylab_core::Trade;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::metrics::MetricsSnapshot;

const RULE: &str = "================================================================================";
const LIGHT_RULE: &str =
    "--------------------------------------------------------------------------------";

/// Write the full metrics report: portfolio summary, trade statistics,
/// execution details, close-reason breakdown, and the per-trade log.
///
/// Always written, even for zero-trade runs.
pub fn write_metrics_report(
    path: &Path,
    metrics: &MetricsSnapshot,
    trades: &[Trade],
    dataset_hash: &str,
    generated_at: NaiveDateTime,
) -> Result<()> {
    let mut f = File::create(path)
        .with_context(|| format!("failed to create metrics report {}", path.display()))?;

    writeln!(f, "{RULE}")?;
    writeln!(f, "TRADING PERFORMANCE METRICS")?;
    writeln!(f, "{RULE}")?;
    writeln!(f, "Generated: {}", generated_at.format(TIMESTAMP_FORMAT))?;
    writeln!(f, "{RULE}")?;
    writeln!(f)?;

    writeln!(f, "PORTFOLIO SUMMARY")?;
    writeln!(f, "{LIGHT_RULE}")?;
    write_line(&mut f, "Initial Balance", format!("${:.2}", metrics.initial_balance))?;
    write_line(&mut f, "Final Balance", format!("${:.2}", metrics.final_balance))?;
    write_line(&mut f, "Total Return", format!("${:.2}", metrics.total_return))?;
    write_line(
        &mut f,
        "Total Return (%)",
        format!("{:.2}%", metrics.total_return_pct),
    )?;
    writeln!(f)?;

    writeln!(f, "TRADE STATISTICS")?;
    writeln!(f, "{LIGHT_RULE}")?;
    write_line(&mut f, "Total Trades", metrics.num_trades.to_string())?;
    write_line(&mut f, "Winning Trades", metrics.winning_trades.to_string())?;
    write_line(&mut f, "Losing Trades", metrics.losing_trades.to_string())?;
    write_line(&mut f, "Win Rate", format!("{:.2}%", metrics.win_rate))?;
    write_line(&mut f, "Total PnL", format!("${:.2}", metrics.total_pnl))?;
    write_line(&mut f, "Avg Win", format!("${:.2}", metrics.avg_win))?;
    write_line(&mut f, "Avg Loss", format!("${:.2}", metrics.avg_loss))?;
    write_line(&mut f, "Profit Factor", format!("{:.3}", metrics.profit_factor))?;
    write_line(&mut f, "Expectancy", format!("${:.2}", metrics.expectancy))?;
    writeln!(f)?;

    writeln!(f, "EXECUTION DETAILS")?;
    writeln!(f, "{LIGHT_RULE}")?;
    write_line(&mut f, "Total Steps", metrics.total_steps.to_string())?;
    write_line(&mut f, "Total Reward", format!("{:.2}", metrics.total_reward))?;
    write_line(&mut f, "Dataset Fingerprint", dataset_hash.to_string())?;
    writeln!(f)?;

    if !metrics.close_reasons.is_empty() {
        writeln!(f, "POSITION CLOSE REASONS")?;
        writeln!(f, "{LIGHT_RULE}")?;
        for (reason, count) in &metrics.close_reasons {
            write_line(&mut f, reason, count.to_string())?;
        }
        writeln!(f)?;
    }

    if !trades.is_empty() {
        writeln!(f)?;
        writeln!(f, "{RULE}")?;
        writeln!(f, "DETAILED TRADE LOG")?;
        writeln!(f, "{RULE}")?;
        writeln!(f)?;

        for (i, trade) in trades.iter().enumerate() {
            writeln!(f, "Trade #{}", i + 1)?;
            writeln!(f, "  Timestamp: {}", trade.timestamp.format(TIMESTAMP_FORMAT))?;
            writeln!(f, "  Step: {}", trade.step)?;
            writeln!(f, "  Entry Price: ${:.4}", trade.entry_price)?;
            writeln!(f, "  Exit Price: ${:.4}", trade.exit_price)?;
            writeln!(f, "  Quantity: {:.4}", trade.quantity)?;
            writeln!(
                f,
                "  PnL: ${:.2} ({:.2}%)",
                trade.pnl, trade.pnl_percent
            )?;
            writeln!(f, "  Holding Period: {} steps", trade.holding_period)?;
            writeln!(f, "  Close Reason: {}", trade.close_reason)?;
            writeln!(f, "  Portfolio Value: ${:.2}", trade.portfolio_value)?;
            writeln!(f, "{}", "-".repeat(40))?;
        }
    }

    Ok(())
}

fn write_line(f: &mut File, label: &str, value: String) -> Result<()> {
    writeln!(f, "{label:.<40} {value:>20}")?;
    Ok(())
}
