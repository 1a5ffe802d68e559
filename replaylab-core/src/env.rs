//! Capability boundary for the external collaborators: the trading
//! environment and the decision-making policy.
//!
//! The engine never sees inside either one. The environment owns the
//! reward/position simulation and the shape of observations and actions; the
//! policy is an opaque observation → action function that may be stochastic.
//! Anything implementing these two traits can drive a backtest.

use crate::domain::EnvInfo;
use thiserror::Error;

/// Failure raised by a policy or environment while stepping.
///
/// Collaborator failures are terminal for the run: the driver aborts and
/// surfaces the fault, it never retries a stateful environment mid-run.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct StepFault(pub String);

impl StepFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Result of applying one action to the environment.
#[derive(Debug, Clone)]
pub struct Transition<O> {
    pub observation: O,
    pub reward: f64,
    /// Environment signalled completion.
    pub done: bool,
    /// Episode cut short by the environment (treated as terminal).
    pub truncated: bool,
    pub info: EnvInfo,
}

/// The trading environment collaborator.
///
/// `info` must carry `portfolio_value` on every step and may carry
/// `position_changes.closed` on steps where positions were closed.
pub trait Environment {
    type Observation;
    type Action;

    fn reset(&mut self) -> Result<(Self::Observation, EnvInfo), StepFault>;

    fn step(&mut self, action: Self::Action) -> Result<Transition<Self::Observation>, StepFault>;
}

/// The decision-making policy collaborator.
///
/// Takes `&mut self` so stochastic policies can advance their RNG state.
pub trait Policy<E: Environment + ?Sized> {
    fn predict(&mut self, observation: &E::Observation) -> Result<E::Action, StepFault>;
}
