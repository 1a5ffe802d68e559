//! Backtest driver — the bounded step loop against an environment/policy
//! pair.
//!
//! One logical execution per run: the loop, recording, and emission proceed
//! strictly sequentially, because step N's observation depends on step N−1's
//! environment state. Emission is interleaved inline between steps.

use crate::domain::EnvInfo;
use crate::env::{Environment, Policy};
use crate::events::{ProgressSink, StreamEvent};
use crate::history::HistoryRecorder;
use chrono::NaiveDateTime;
use thiserror::Error;

/// Default streaming cadence: one `step` event every N steps.
pub const DEFAULT_STREAM_EVERY: usize = 10;

/// Timestamp format used on the wire and in export artifacts.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Driver knobs. The cadence is a heuristic constant, kept overridable
/// rather than hard-coded.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Starting balance, used for the PnL field of `step` events.
    pub initial_balance: f64,
    /// Emit a `step` event every this many steps.
    pub stream_every: usize,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            initial_balance: 10_000.0,
            stream_every: DEFAULT_STREAM_EVERY,
        }
    }
}

/// Terminal failure of the step loop.
///
/// Collaborator faults are not retried: replaying a stateful environment
/// mid-run is not well-defined. Steps recorded before the fault remain in the
/// caller-owned recorder.
#[derive(Debug, Clone, Error)]
pub enum DriverError {
    #[error("environment failure at step {step}: {message}")]
    Environment { step: usize, message: String },

    #[error("policy failure at step {step}: {message}")]
    Policy { step: usize, message: String },
}

/// Run the step loop until the environment signals completion or the step
/// bound is exhausted, whichever comes first.
///
/// `timestamps` are the event times of the input rows; their length is the
/// step-count safety cap (a bound, not a normal termination path). The
/// timestamp lookup clamps to the last row if a step index would overrun.
///
/// Every step is appended to `recorder`; every `stream_every`-th step emits a
/// `step` event to `sink`. Returns the number of steps executed.
pub fn run_steps<E: Environment>(
    env: &mut E,
    policy: &mut dyn Policy<E>,
    timestamps: &[NaiveDateTime],
    config: &DriverConfig,
    recorder: &mut HistoryRecorder,
    sink: &mut dyn ProgressSink,
) -> Result<usize, DriverError> {
    let total_steps = timestamps.len();

    let (mut observation, _reset_info) = env.reset().map_err(|fault| DriverError::Environment {
        step: 0,
        message: fault.to_string(),
    })?;

    let mut step_count = 0usize;
    let mut done = false;

    while !done && step_count < total_steps {
        let action = policy
            .predict(&observation)
            .map_err(|fault| DriverError::Policy {
                step: step_count,
                message: fault.to_string(),
            })?;

        let transition = env.step(action).map_err(|fault| DriverError::Environment {
            step: step_count,
            message: fault.to_string(),
        })?;

        let timestamp = timestamps[step_count.min(total_steps - 1)];
        let info = transition.info;
        let reward = transition.reward;
        recorder.record(step_count, timestamp, info.clone(), reward);

        observation = transition.observation;
        done = transition.done || transition.truncated;
        step_count += 1;

        if step_count % config.stream_every == 0 {
            sink.emit(&step_event(
                step_count,
                total_steps,
                &info,
                reward,
                timestamp,
                config,
            ));
        }
    }

    Ok(step_count)
}

fn step_event(
    step: usize,
    total_steps: usize,
    info: &EnvInfo,
    reward: f64,
    timestamp: NaiveDateTime,
    config: &DriverConfig,
) -> StreamEvent {
    StreamEvent::Step {
        step,
        total_steps,
        portfolio_value: info.portfolio_value,
        initial_balance: config.initial_balance,
        pnl: info.portfolio_value - config.initial_balance,
        timestamp: timestamp.format(TIMESTAMP_FORMAT).to_string(),
        reward,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::{StepFault, Transition};
    use crate::events::CollectSink;
    use chrono::NaiveDate;

    /// Environment that walks a fixed portfolio-value sequence and finishes
    /// after `episode_len` steps (or never, if longer than the sequence).
    struct ScriptedEnv {
        values: Vec<f64>,
        episode_len: usize,
        cursor: usize,
        fail_at: Option<usize>,
    }

    impl ScriptedEnv {
        fn new(episode_len: usize) -> Self {
            Self {
                values: (0..episode_len + 10).map(|i| 10_000.0 + i as f64).collect(),
                episode_len,
                cursor: 0,
                fail_at: None,
            }
        }
    }

    impl Environment for ScriptedEnv {
        type Observation = f64;
        type Action = i64;

        fn reset(&mut self) -> Result<(f64, EnvInfo), StepFault> {
            self.cursor = 0;
            Ok((self.values[0], EnvInfo::flat(self.values[0])))
        }

        fn step(&mut self, _action: i64) -> Result<Transition<f64>, StepFault> {
            if Some(self.cursor) == self.fail_at {
                return Err(StepFault::new("scripted failure"));
            }
            let value = self.values[self.cursor];
            self.cursor += 1;
            Ok(Transition {
                observation: value,
                reward: 1.0,
                done: self.cursor >= self.episode_len,
                truncated: false,
                info: EnvInfo::flat(value),
            })
        }
    }

    struct HoldPolicy;

    impl Policy<ScriptedEnv> for HoldPolicy {
        fn predict(&mut self, _observation: &f64) -> Result<i64, StepFault> {
            Ok(0)
        }
    }

    fn timestamps(n: usize) -> Vec<NaiveDateTime> {
        let base = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        (0..n).map(|i| base + chrono::Duration::hours(i as i64)).collect()
    }

    #[test]
    fn stops_at_done_before_cap() {
        let mut env = ScriptedEnv::new(25);
        let ts = timestamps(100);
        let mut recorder = HistoryRecorder::new();
        let mut sink = CollectSink::new();

        let steps = run_steps(
            &mut env,
            &mut HoldPolicy,
            &ts,
            &DriverConfig::default(),
            &mut recorder,
            &mut sink,
        )
        .unwrap();

        assert_eq!(steps, 25);
        // No extra records beyond the done step.
        assert_eq!(recorder.len(), 25);
    }

    #[test]
    fn cap_bounds_a_never_done_environment() {
        let mut env = ScriptedEnv {
            values: (0..60).map(|i| 10_000.0 + i as f64).collect(),
            episode_len: usize::MAX,
            cursor: 0,
            fail_at: None,
        };

        let ts = timestamps(30);
        let mut recorder = HistoryRecorder::new();
        let mut sink = CollectSink::new();

        let steps = run_steps(
            &mut env,
            &mut HoldPolicy,
            &ts,
            &DriverConfig::default(),
            &mut recorder,
            &mut sink,
        )
        .unwrap();

        assert_eq!(steps, 30);
        assert_eq!(recorder.len(), 30);
    }

    #[test]
    fn step_events_follow_cadence() {
        let mut env = ScriptedEnv::new(35);
        let ts = timestamps(35);
        let mut recorder = HistoryRecorder::new();
        let mut sink = CollectSink::new();

        run_steps(
            &mut env,
            &mut HoldPolicy,
            &ts,
            &DriverConfig::default(),
            &mut recorder,
            &mut sink,
        )
        .unwrap();

        // Steps 10, 20, 30: the cadence is every 10th step.
        let step_numbers: Vec<usize> = sink
            .events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::Step { step, .. } => Some(*step),
                _ => None,
            })
            .collect();
        assert_eq!(step_numbers, vec![10, 20, 30]);
    }

    #[test]
    fn custom_cadence_is_honored() {
        let mut env = ScriptedEnv::new(10);
        let ts = timestamps(10);
        let mut recorder = HistoryRecorder::new();
        let mut sink = CollectSink::new();
        let config = DriverConfig {
            stream_every: 3,
            ..DriverConfig::default()
        };

        run_steps(&mut env, &mut HoldPolicy, &ts, &config, &mut recorder, &mut sink).unwrap();

        let step_numbers: Vec<usize> = sink
            .events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::Step { step, .. } => Some(*step),
                _ => None,
            })
            .collect();
        assert_eq!(step_numbers, vec![3, 6, 9]);
    }

    #[test]
    fn environment_fault_aborts_and_keeps_partial_history() {
        let mut env = ScriptedEnv::new(50);
        env.fail_at = Some(7);
        let ts = timestamps(50);
        let mut recorder = HistoryRecorder::new();
        let mut sink = CollectSink::new();

        let err = run_steps(
            &mut env,
            &mut HoldPolicy,
            &ts,
            &DriverConfig::default(),
            &mut recorder,
            &mut sink,
        )
        .unwrap_err();

        match err {
            DriverError::Environment { step, .. } => assert_eq!(step, 7),
            other => panic!("expected environment fault, got {other:?}"),
        }
        // Steps 0..7 were recorded before the fault.
        assert_eq!(recorder.len(), 7);
    }

    #[test]
    fn policy_fault_reports_failing_step() {
        struct FailingPolicy {
            fail_at: usize,
            calls: usize,
        }
        impl Policy<ScriptedEnv> for FailingPolicy {
            fn predict(&mut self, _observation: &f64) -> Result<i64, StepFault> {
                if self.calls == self.fail_at {
                    return Err(StepFault::new("sampler exhausted"));
                }
                self.calls += 1;
                Ok(0)
            }
        }

        let mut env = ScriptedEnv::new(50);
        let ts = timestamps(50);
        let mut recorder = HistoryRecorder::new();
        let mut sink = CollectSink::new();
        let mut policy = FailingPolicy { fail_at: 4, calls: 0 };

        let err = run_steps(
            &mut env,
            &mut policy,
            &ts,
            &DriverConfig::default(),
            &mut recorder,
            &mut sink,
        )
        .unwrap_err();

        match err {
            DriverError::Policy { step, message } => {
                assert_eq!(step, 4);
                assert!(message.contains("sampler exhausted"));
            }
            other => panic!("expected policy fault, got {other:?}"),
        }
        assert_eq!(recorder.len(), 4);
    }

    #[test]
    fn empty_timestamps_runs_zero_steps() {
        let mut env = ScriptedEnv::new(10);
        let mut recorder = HistoryRecorder::new();
        let mut sink = CollectSink::new();

        let steps = run_steps(
            &mut env,
            &mut HoldPolicy,
            &[],
            &DriverConfig::default(),
            &mut recorder,
            &mut sink,
        )
        .unwrap();

        assert_eq!(steps, 0);
        assert!(recorder.is_empty());
        assert!(sink.events.is_empty());
    }

    #[test]
    fn records_use_row_timestamps() {
        let mut env = ScriptedEnv::new(5);
        let ts = timestamps(5);
        let mut recorder = HistoryRecorder::new();
        let mut sink = CollectSink::new();

        run_steps(
            &mut env,
            &mut HoldPolicy,
            &ts,
            &DriverConfig::default(),
            &mut recorder,
            &mut sink,
        )
        .unwrap();

        for (record, expected) in recorder.records().iter().zip(ts.iter()) {
            assert_eq!(record.timestamp, *expected);
        }
    }
}
