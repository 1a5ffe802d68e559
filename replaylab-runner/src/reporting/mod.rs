//! Export writers for run artifacts.
//!
//! All display rounding lives here: 4 decimals for prices and quantities,
//! 2 for currency amounts, 2–3 for ratios and percentages. Aggregation
//! upstream stays full-precision.

mod report;
mod trades;

use chrono::NaiveDateTime;
use std::path::{Path, PathBuf};

pub use report::write_metrics_report;
pub use trades::write_trades_csv;

/// Artifact paths produced by a run. `None` marks an artifact that was
/// skipped (zero trades) or failed to write (surfaced as a `warning` event).
#[derive(Debug, Clone, Default)]
pub struct ArtifactPaths {
    pub trades_csv: Option<PathBuf>,
    pub metrics_report: Option<PathBuf>,
}

/// Timestamped trades CSV path under `output_dir`.
pub fn trades_csv_path(output_dir: &Path, generated_at: NaiveDateTime) -> PathBuf {
    output_dir.join(format!(
        "trades_{}.csv",
        generated_at.format("%Y%m%d_%H%M%S")
    ))
}

/// Timestamped metrics report path under `output_dir`.
pub fn metrics_report_path(output_dir: &Path, generated_at: NaiveDateTime) -> PathBuf {
    output_dir.join(format!(
        "trading_metrics_{}.txt",
        generated_at.format("%Y%m%d_%H%M%S")
    ))
}
