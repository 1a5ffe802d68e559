//! Dataset loading and window selection for the runner.
//!
//! The input dataset is a flat CSV of market bars, multiple symbols per file,
//! with an `Open Time` timestamp column. The loader filters to one symbol,
//! then to the requested `[start, end]` window (inclusive on both ends),
//! preserving file order. Windows with fewer than [`MIN_USABLE_ROWS`] rows
//! are rejected — backtests on too-short windows are not run.

use chrono::NaiveDateTime;
use replaylab_core::driver::TIMESTAMP_FORMAT;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use crate::config::parse_time;

/// Minimum usable rows after window filtering.
pub const MIN_USABLE_ROWS: usize = 100;

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read dataset {path}: {source}")]
    Io {
        path: String,
        source: csv::Error,
    },

    #[error("malformed row {row}: {message}")]
    MalformedRow { row: usize, message: String },

    #[error("no data found for symbol '{0}'")]
    UnknownSymbol(String),

    #[error("no data in selected time range")]
    EmptyWindow,

    #[error("insufficient data points: {got} rows in window, need at least {min}")]
    TooFewRows { got: usize, min: usize },
}

/// One market bar row of the input dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketRow {
    pub symbol: String,
    pub open_time: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Raw CSV record before timestamp parsing.
#[derive(Debug, Deserialize)]
struct RawRow {
    #[serde(rename = "symbol", alias = "cryptocoin")]
    symbol: String,
    #[serde(rename = "Open Time")]
    open_time: String,
    #[serde(rename = "Open")]
    open: f64,
    #[serde(rename = "High")]
    high: f64,
    #[serde(rename = "Low")]
    low: f64,
    #[serde(rename = "Close")]
    close: f64,
    #[serde(rename = "Volume")]
    volume: f64,
}

/// Load all rows for one symbol, preserving file order.
pub fn load_rows(path: &Path, symbol: &str) -> Result<Vec<MarketRow>, LoadError> {
    let mut reader = csv::Reader::from_path(path).map_err(|source| LoadError::Io {
        path: path.display().to_string(),
        source,
    })?;

    let mut rows = Vec::new();
    for (i, result) in reader.deserialize::<RawRow>().enumerate() {
        let raw = result.map_err(|e| LoadError::MalformedRow {
            row: i + 1,
            message: e.to_string(),
        })?;
        if raw.symbol != symbol {
            continue;
        }
        let open_time = parse_time(&raw.open_time).map_err(|_| LoadError::MalformedRow {
            row: i + 1,
            message: format!("unparseable Open Time '{}'", raw.open_time),
        })?;
        rows.push(MarketRow {
            symbol: raw.symbol,
            open_time,
            open: raw.open,
            high: raw.high,
            low: raw.low,
            close: raw.close,
            volume: raw.volume,
        });
    }

    if rows.is_empty() {
        return Err(LoadError::UnknownSymbol(symbol.to_string()));
    }
    Ok(rows)
}

/// Filter rows to `[start, end]` inclusive and enforce the minimum-row gate.
pub fn select_window(
    rows: Vec<MarketRow>,
    start: NaiveDateTime,
    end: NaiveDateTime,
    min_rows: usize,
) -> Result<Vec<MarketRow>, LoadError> {
    let filtered: Vec<MarketRow> = rows
        .into_iter()
        .filter(|r| r.open_time >= start && r.open_time <= end)
        .collect();

    if filtered.is_empty() {
        return Err(LoadError::EmptyWindow);
    }
    if filtered.len() < min_rows {
        return Err(LoadError::TooFewRows {
            got: filtered.len(),
            min: min_rows,
        });
    }
    Ok(filtered)
}

/// Distinct symbols in the dataset, first-occurrence order.
pub fn list_symbols(path: &Path) -> Result<Vec<String>, LoadError> {
    let mut reader = csv::Reader::from_path(path).map_err(|source| LoadError::Io {
        path: path.display().to_string(),
        source,
    })?;

    let mut symbols: Vec<String> = Vec::new();
    for (i, result) in reader.deserialize::<RawRow>().enumerate() {
        let raw = result.map_err(|e| LoadError::MalformedRow {
            row: i + 1,
            message: e.to_string(),
        })?;
        if !symbols.iter().any(|s| s == &raw.symbol) {
            symbols.push(raw.symbol);
        }
    }
    Ok(symbols)
}

/// Min and max `Open Time` over a row set.
pub fn time_range(rows: &[MarketRow]) -> Option<(NaiveDateTime, NaiveDateTime)> {
    let min = rows.iter().map(|r| r.open_time).min()?;
    let max = rows.iter().map(|r| r.open_time).max()?;
    Some((min, max))
}

/// Deterministic BLAKE3 fingerprint over a row set.
///
/// Covers timestamps and all OHLCV values in row order, so two runs over the
/// same filtered window carry the same provenance hash.
pub fn dataset_hash(rows: &[MarketRow]) -> String {
    let mut hasher = blake3::Hasher::new();
    for row in rows {
        hasher.update(row.symbol.as_bytes());
        hasher.update(
            row.open_time
                .format(TIMESTAMP_FORMAT)
                .to_string()
                .as_bytes(),
        );
        hasher.update(&row.open.to_le_bytes());
        hasher.update(&row.high.to_le_bytes());
        hasher.update(&row.low.to_le_bytes());
        hasher.update(&row.close.to_le_bytes());
        hasher.update(&row.volume.to_le_bytes());
    }
    hasher.finalize().to_hex().to_string()
}
