//! Serializable backtest run configuration.

use chrono::{NaiveDate, NaiveDateTime};
use replaylab_core::driver::TIMESTAMP_FORMAT;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Default starting balance for a run.
pub const DEFAULT_INITIAL_BALANCE: f64 = 10_000.0;

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("invalid timestamp '{value}' (expected '%Y-%m-%d %H:%M:%S' or '%Y-%m-%d')")]
    InvalidTimestamp { value: String },

    #[error("start_time {start} is after end_time {end}")]
    InvertedWindow { start: String, end: String },

    #[error("initial balance must be positive, got {0}")]
    NonPositiveBalance(f64),
}

/// Parameters for a single backtest run.
///
/// Time bounds are kept as strings (the form they arrive in from the CLI or a
/// TOML file) and parsed by [`BacktestConfig::start`] / [`BacktestConfig::end`];
/// both `%Y-%m-%d %H:%M:%S` and bare dates are accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub symbol: String,
    pub start_time: String,
    pub end_time: String,

    #[serde(default = "default_initial_balance")]
    pub initial_balance: f64,

    /// Emit a `step` event every this many steps.
    #[serde(default = "default_stream_every")]
    pub stream_every: usize,

    /// Minimum usable rows in the filtered window; shorter windows are
    /// rejected before the run starts.
    #[serde(default = "default_min_rows")]
    pub min_rows: usize,
}

fn default_initial_balance() -> f64 {
    DEFAULT_INITIAL_BALANCE
}

fn default_stream_every() -> usize {
    replaylab_core::DEFAULT_STREAM_EVERY
}

fn default_min_rows() -> usize {
    crate::data_loader::MIN_USABLE_ROWS
}

/// Wrapper table so config files read `[backtest] symbol = ...`.
#[derive(Debug, Deserialize)]
struct ConfigFile {
    backtest: BacktestConfig,
}

impl BacktestConfig {
    pub fn new(
        symbol: impl Into<String>,
        start_time: impl Into<String>,
        end_time: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            start_time: start_time.into(),
            end_time: end_time.into(),
            initial_balance: default_initial_balance(),
            stream_every: default_stream_every(),
            min_rows: default_min_rows(),
        }
    }

    /// Load from a TOML file with a `[backtest]` table.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(content)?;
        Ok(file.backtest)
    }

    pub fn start(&self) -> Result<NaiveDateTime, ConfigError> {
        parse_time(&self.start_time)
    }

    pub fn end(&self) -> Result<NaiveDateTime, ConfigError> {
        parse_time(&self.end_time)
    }

    /// Validate before a run: required parameters present, parseable and
    /// ordered time window, positive balance.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.symbol.trim().is_empty() {
            return Err(ConfigError::MissingParameter("symbol"));
        }
        if self.start_time.trim().is_empty() {
            return Err(ConfigError::MissingParameter("start_time"));
        }
        if self.end_time.trim().is_empty() {
            return Err(ConfigError::MissingParameter("end_time"));
        }
        let start = self.start()?;
        let end = self.end()?;
        if start > end {
            return Err(ConfigError::InvertedWindow {
                start: self.start_time.clone(),
                end: self.end_time.clone(),
            });
        }
        if self.initial_balance <= 0.0 {
            return Err(ConfigError::NonPositiveBalance(self.initial_balance));
        }
        Ok(())
    }
}

/// Parse a timestamp, accepting a full datetime or a bare date (midnight).
pub fn parse_time(value: &str) -> Result<NaiveDateTime, ConfigError> {
    let trimmed = value.trim();
    if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, TIMESTAMP_FORMAT) {
        return Ok(dt);
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(date.and_hms_opt(0, 0, 0).unwrap());
    }
    Err(ConfigError::InvalidTimestamp {
        value: value.to_string(),
    })
}
