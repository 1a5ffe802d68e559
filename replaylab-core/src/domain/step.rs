//! StepRecord — one simulation tick's recorded outcome.

use super::info::EnvInfo;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One entry per simulation step: index, bar timestamp, environment payload,
/// and the step's reward.
///
/// Immutable once appended to the history. The timestamp is the event time of
/// the underlying market bar, not wall-clock time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub step_index: usize,
    pub timestamp: NaiveDateTime,
    pub info: EnvInfo,
    pub reward: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn step_record_serialization_roundtrip() {
        let record = StepRecord {
            step_index: 7,
            timestamp: NaiveDate::from_ymd_opt(2024, 3, 1)
                .unwrap()
                .and_hms_opt(14, 30, 0)
                .unwrap(),
            info: EnvInfo::flat(10_250.0),
            reward: 0.75,
        };
        let json = serde_json::to_string(&record).unwrap();
        let deser: StepRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record, deser);
    }
}
