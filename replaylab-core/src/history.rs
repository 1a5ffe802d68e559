//! History recorder — append-only log of per-step snapshots.
//!
//! The recorder is the sole input to trade reconstruction and metrics
//! aggregation. Records are never mutated or evicted: the full history is
//! required for exact end-of-run metrics, so memory grows linearly with run
//! length by design.

use crate::domain::{EnvInfo, StepRecord};
use chrono::NaiveDateTime;

/// Ordered, append-only log of [`StepRecord`]s for a single run.
///
/// Insertion order is the canonical order (ties on identical timestamps are
/// already broken by step index at the driver). The recorder does not
/// deduplicate; never recording the same step twice is a driver invariant.
#[derive(Debug, Clone, Default)]
pub struct HistoryRecorder {
    records: Vec<StepRecord>,
}

impl HistoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one step's outcome.
    pub fn record(
        &mut self,
        step_index: usize,
        timestamp: NaiveDateTime,
        info: EnvInfo,
        reward: f64,
    ) {
        self.records.push(StepRecord {
            step_index,
            timestamp,
            info,
            reward,
        });
    }

    /// The full ordered history.
    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn last(&self) -> Option<&StepRecord> {
        self.records.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(9, minute, 0)
            .unwrap()
    }

    #[test]
    fn starts_empty() {
        let recorder = HistoryRecorder::new();
        assert!(recorder.is_empty());
        assert_eq!(recorder.len(), 0);
        assert!(recorder.last().is_none());
    }

    #[test]
    fn record_preserves_insertion_order() {
        let mut recorder = HistoryRecorder::new();
        for i in 0..5 {
            recorder.record(i, ts(i as u32), EnvInfo::flat(10_000.0 + i as f64), 0.1);
        }
        assert_eq!(recorder.len(), 5);
        let indices: Vec<usize> = recorder.records().iter().map(|r| r.step_index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn identical_timestamps_keep_step_order() {
        let mut recorder = HistoryRecorder::new();
        recorder.record(0, ts(0), EnvInfo::flat(10_000.0), 0.0);
        recorder.record(1, ts(0), EnvInfo::flat(10_001.0), 0.0);
        recorder.record(2, ts(0), EnvInfo::flat(10_002.0), 0.0);
        let indices: Vec<usize> = recorder.records().iter().map(|r| r.step_index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn last_returns_most_recent_record() {
        let mut recorder = HistoryRecorder::new();
        recorder.record(0, ts(0), EnvInfo::flat(10_000.0), 0.0);
        recorder.record(1, ts(1), EnvInfo::flat(10_500.0), 1.0);
        let last = recorder.last().unwrap();
        assert_eq!(last.step_index, 1);
        assert_eq!(last.info.portfolio_value, 10_500.0);
    }
}
