//! Reference collaborators for the engine's capability traits.
//!
//! The production policy and environment are external to this system; these
//! implementations exist so the CLI and integration tests can exercise the
//! full pipeline. Any compliant simulator or policy can be substituted — the
//! driver only sees the `Environment`/`Policy` traits.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use replaylab_core::{ClosedPosition, EnvInfo, Environment, Policy, StepFault, Transition};

use crate::data_loader::MarketRow;

/// Discrete action space of the reference environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeAction {
    Hold,
    Buy,
    Sell,
}

/// Observation handed to policies each step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketObservation {
    /// Close price of the current bar.
    pub price: f64,
    /// Fractional price change over the momentum lookback (0 during warmup).
    pub momentum: f64,
    /// Whether a position is currently open.
    pub in_position: bool,
}

/// Tunables for [`SimEnv`].
#[derive(Debug, Clone)]
pub struct SimConfig {
    pub initial_balance: f64,
    /// Fraction of cash committed when opening a position.
    pub position_fraction: f64,
    /// Close when price falls this fraction below entry.
    pub stop_loss_pct: f64,
    /// Close when price rises this fraction above entry.
    pub take_profit_pct: f64,
    /// Bars used for the momentum observation.
    pub momentum_lookback: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            initial_balance: 10_000.0,
            position_fraction: 0.95,
            stop_loss_pct: 0.05,
            take_profit_pct: 0.10,
            momentum_lookback: 10,
        }
    }
}

struct OpenPosition {
    entry_price: f64,
    quantity: f64,
    entry_step: usize,
}

/// Long-only single-position market simulator over a fixed row window.
///
/// One position at a time. Intrabar stop-loss and take-profit checks run
/// before the policy's exit signal; a position still open when the data runs
/// out is force-closed with the `end-of-data` reason. Reward is the per-step
/// change in portfolio value.
pub struct SimEnv {
    rows: Vec<MarketRow>,
    config: SimConfig,
    cursor: usize,
    cash: f64,
    position: Option<OpenPosition>,
    last_value: f64,
}

impl SimEnv {
    pub fn new(rows: Vec<MarketRow>, config: SimConfig) -> Self {
        let last_value = config.initial_balance;
        Self {
            rows,
            config,
            cursor: 0,
            cash: last_value,
            position: None,
            last_value,
        }
    }

    fn observation_at(&self, index: usize) -> MarketObservation {
        let index = index.min(self.rows.len().saturating_sub(1));
        let price = self.rows[index].close;
        let momentum = if index >= self.config.momentum_lookback {
            let past = self.rows[index - self.config.momentum_lookback].close;
            if past > 0.0 {
                price / past - 1.0
            } else {
                0.0
            }
        } else {
            0.0
        };
        MarketObservation {
            price,
            momentum,
            in_position: self.position.is_some(),
        }
    }

    fn close_position(&mut self, position: OpenPosition, exit_price: f64, reason: &str) -> ClosedPosition {
        let pnl = (exit_price - position.entry_price) * position.quantity;
        let pnl_percent = if position.entry_price > 0.0 {
            (exit_price / position.entry_price - 1.0) * 100.0
        } else {
            0.0
        };
        self.cash += position.quantity * exit_price;
        ClosedPosition {
            entry_price: position.entry_price,
            exit_price,
            quantity: position.quantity,
            pnl,
            pnl_percent,
            holding_period: self.cursor - position.entry_step,
            close_reason: reason.to_string(),
        }
    }
}

impl Environment for SimEnv {
    type Observation = MarketObservation;
    type Action = TradeAction;

    fn reset(&mut self) -> Result<(MarketObservation, EnvInfo), StepFault> {
        if self.rows.is_empty() {
            return Err(StepFault::new("environment has no market rows"));
        }
        self.cursor = 0;
        self.cash = self.config.initial_balance;
        self.position = None;
        self.last_value = self.config.initial_balance;
        Ok((
            self.observation_at(0),
            EnvInfo::flat(self.config.initial_balance),
        ))
    }

    fn step(&mut self, action: TradeAction) -> Result<Transition<MarketObservation>, StepFault> {
        if self.cursor >= self.rows.len() {
            return Err(StepFault::new("stepped past end of data"));
        }

        let row = self.rows[self.cursor].clone();
        let mut closed: Vec<ClosedPosition> = Vec::new();

        // Exits first: protective levels take precedence over the signal.
        if let Some(position) = self.position.take() {
            let stop_price = position.entry_price * (1.0 - self.config.stop_loss_pct);
            let target_price = position.entry_price * (1.0 + self.config.take_profit_pct);
            if row.low <= stop_price {
                closed.push(self.close_position(position, stop_price, "stop-loss"));
            } else if row.high >= target_price {
                closed.push(self.close_position(position, target_price, "take-profit"));
            } else if action == TradeAction::Sell {
                closed.push(self.close_position(position, row.close, "signal-exit"));
            } else {
                self.position = Some(position);
            }
        } else if action == TradeAction::Buy && row.close > 0.0 {
            let budget = self.cash * self.config.position_fraction;
            let quantity = budget / row.close;
            if quantity > 0.0 {
                self.cash -= quantity * row.close;
                self.position = Some(OpenPosition {
                    entry_price: row.close,
                    quantity,
                    entry_step: self.cursor,
                });
            }
        }

        self.cursor += 1;
        let done = self.cursor >= self.rows.len();

        // Force-close anything still open when the data runs out.
        if done {
            if let Some(position) = self.position.take() {
                closed.push(self.close_position(position, row.close, "end-of-data"));
            }
        }

        let held_value = self
            .position
            .as_ref()
            .map(|p| p.quantity * row.close)
            .unwrap_or(0.0);
        let portfolio_value = self.cash + held_value;
        let reward = portfolio_value - self.last_value;
        self.last_value = portfolio_value;

        let info = if closed.is_empty() {
            EnvInfo::flat(portfolio_value)
        } else {
            EnvInfo::with_closed(portfolio_value, closed)
        };

        Ok(Transition {
            observation: self.observation_at(self.cursor),
            reward,
            done,
            truncated: false,
            info,
        })
    }
}

/// Deterministic sign-of-momentum policy: buy strength, sell weakness.
#[derive(Debug, Default)]
pub struct MomentumPolicy;

impl<E> Policy<E> for MomentumPolicy
where
    E: Environment<Observation = MarketObservation, Action = TradeAction>,
{
    fn predict(&mut self, observation: &MarketObservation) -> Result<TradeAction, StepFault> {
        if !observation.in_position && observation.momentum > 0.0 {
            Ok(TradeAction::Buy)
        } else if observation.in_position && observation.momentum < 0.0 {
            Ok(TradeAction::Sell)
        } else {
            Ok(TradeAction::Hold)
        }
    }
}

/// Uniform random policy (seeded, reproducible).
pub struct RandomPolicy {
    rng: StdRng,
}

impl RandomPolicy {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl<E> Policy<E> for RandomPolicy
where
    E: Environment<Action = TradeAction>,
{
    fn predict(&mut self, _observation: &E::Observation) -> Result<TradeAction, StepFault> {
        Ok(match self.rng.gen_range(0..3u8) {
            0 => TradeAction::Hold,
            1 => TradeAction::Buy,
            _ => TradeAction::Sell,
        })
    }
}

/// Epsilon-random wrapper: the non-deterministic sampling mode.
///
/// With probability `epsilon` the inner policy's action is replaced by a
/// uniformly sampled one. Seeded, so runs remain reproducible.
pub struct StochasticPolicy<P> {
    inner: P,
    epsilon: f64,
    rng: StdRng,
}

impl<P> StochasticPolicy<P> {
    pub fn new(inner: P, epsilon: f64, seed: u64) -> Self {
        Self {
            inner,
            epsilon: epsilon.clamp(0.0, 1.0),
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl<E, P> Policy<E> for StochasticPolicy<P>
where
    E: Environment<Action = TradeAction>,
    P: Policy<E>,
{
    fn predict(&mut self, observation: &E::Observation) -> Result<TradeAction, StepFault> {
        if self.rng.gen::<f64>() < self.epsilon {
            return Ok(match self.rng.gen_range(0..3u8) {
                0 => TradeAction::Hold,
                1 => TradeAction::Buy,
                _ => TradeAction::Sell,
            });
        }
        self.inner.predict(observation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn make_rows(closes: &[f64]) -> Vec<MarketRow> {
        let base = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| MarketRow {
                symbol: "TEST".into(),
                open_time: base + Duration::hours(i as i64),
                open: close,
                high: close * 1.01,
                low: close * 0.99,
                close,
                volume: 1_000.0,
            })
            .collect()
    }

    fn scripted_run(rows: Vec<MarketRow>, actions: &[TradeAction]) -> Vec<EnvInfo> {
        let mut env = SimEnv::new(rows, SimConfig::default());
        env.reset().unwrap();
        let mut infos = Vec::new();
        for &action in actions {
            let transition = env.step(action).unwrap();
            infos.push(transition.info);
            if transition.done {
                break;
            }
        }
        infos
    }

    #[test]
    fn reset_on_empty_rows_faults() {
        let mut env = SimEnv::new(Vec::new(), SimConfig::default());
        assert!(env.reset().is_err());
    }

    #[test]
    fn buy_then_signal_exit_produces_one_trade() {
        let rows = make_rows(&[100.0, 101.0, 102.0, 103.0, 104.0]);
        let infos = scripted_run(
            rows,
            &[
                TradeAction::Buy,
                TradeAction::Hold,
                TradeAction::Sell,
                TradeAction::Hold,
                TradeAction::Hold,
            ],
        );

        let closes: Vec<&ClosedPosition> = infos
            .iter()
            .flat_map(|i| i.closed_positions().iter())
            .collect();
        assert_eq!(closes.len(), 1);
        assert_eq!(closes[0].close_reason, "signal-exit");
        assert_eq!(closes[0].entry_price, 100.0);
        assert_eq!(closes[0].exit_price, 102.0);
        assert!(closes[0].pnl > 0.0);
        assert_eq!(closes[0].holding_period, 2);
    }

    #[test]
    fn stop_loss_triggers_on_low() {
        let mut rows = make_rows(&[100.0, 96.0, 96.0]);
        rows[1].low = 94.0; // breaches the 5% stop at 95
        let infos = scripted_run(rows, &[TradeAction::Buy, TradeAction::Hold, TradeAction::Hold]);

        let closes: Vec<&ClosedPosition> = infos
            .iter()
            .flat_map(|i| i.closed_positions().iter())
            .collect();
        assert_eq!(closes.len(), 1);
        assert_eq!(closes[0].close_reason, "stop-loss");
        assert!((closes[0].exit_price - 95.0).abs() < 1e-10);
        assert!(closes[0].pnl < 0.0);
    }

    #[test]
    fn take_profit_triggers_on_high() {
        let mut rows = make_rows(&[100.0, 108.0, 108.0]);
        rows[1].high = 111.0; // breaches the 10% target at 110
        let infos = scripted_run(rows, &[TradeAction::Buy, TradeAction::Hold, TradeAction::Hold]);

        let closes: Vec<&ClosedPosition> = infos
            .iter()
            .flat_map(|i| i.closed_positions().iter())
            .collect();
        assert_eq!(closes.len(), 1);
        assert_eq!(closes[0].close_reason, "take-profit");
        assert!((closes[0].exit_price - 110.0).abs() < 1e-10);
        assert!(closes[0].pnl > 0.0);
    }

    #[test]
    fn open_position_closes_at_end_of_data() {
        let rows = make_rows(&[100.0, 101.0, 102.0]);
        let infos = scripted_run(rows, &[TradeAction::Buy, TradeAction::Hold, TradeAction::Hold]);

        let last = infos.last().unwrap();
        let closes = last.closed_positions();
        assert_eq!(closes.len(), 1);
        assert_eq!(closes[0].close_reason, "end-of-data");
    }

    #[test]
    fn portfolio_value_is_cash_plus_holdings() {
        let rows = make_rows(&[100.0, 100.0, 100.0]);
        let mut env = SimEnv::new(rows, SimConfig::default());
        env.reset().unwrap();

        // Flat price: buying then holding keeps value at the initial balance.
        let t1 = env.step(TradeAction::Buy).unwrap();
        assert!((t1.info.portfolio_value - 10_000.0).abs() < 1e-6);
        let t2 = env.step(TradeAction::Hold).unwrap();
        assert!((t2.info.portfolio_value - 10_000.0).abs() < 1e-6);
    }

    #[test]
    fn rewards_sum_to_value_change() {
        let rows = make_rows(&[100.0, 102.0, 104.0, 103.0, 105.0]);
        let mut env = SimEnv::new(rows, SimConfig::default());
        env.reset().unwrap();

        let mut total_reward = 0.0;
        let mut last_value = 10_000.0;
        for _ in 0..5 {
            let t = env.step(TradeAction::Buy).unwrap();
            total_reward += t.reward;
            last_value = t.info.portfolio_value;
            if t.done {
                break;
            }
        }
        assert!((total_reward - (last_value - 10_000.0)).abs() < 1e-6);
    }

    #[test]
    fn momentum_policy_is_deterministic() {
        let obs = MarketObservation {
            price: 100.0,
            momentum: 0.02,
            in_position: false,
        };
        let mut policy = MomentumPolicy;
        let a1 = Policy::<SimEnv>::predict(&mut policy, &obs).unwrap();
        let a2 = Policy::<SimEnv>::predict(&mut policy, &obs).unwrap();
        assert_eq!(a1, TradeAction::Buy);
        assert_eq!(a1, a2);
    }

    #[test]
    fn stochastic_policy_is_reproducible_per_seed() {
        let obs = MarketObservation {
            price: 100.0,
            momentum: 0.0,
            in_position: false,
        };
        let sample = |seed: u64| -> Vec<TradeAction> {
            let mut policy = StochasticPolicy::new(MomentumPolicy, 1.0, seed);
            (0..20)
                .map(|_| Policy::<SimEnv>::predict(&mut policy, &obs).unwrap())
                .collect()
        };
        assert_eq!(sample(7), sample(7));
        assert_ne!(sample(7), sample(8));
    }

    #[test]
    fn zero_epsilon_defers_to_inner_policy() {
        let obs = MarketObservation {
            price: 100.0,
            momentum: -0.05,
            in_position: true,
        };
        let mut policy = StochasticPolicy::new(MomentumPolicy, 0.0, 1);
        for _ in 0..10 {
            let action = Policy::<SimEnv>::predict(&mut policy, &obs).unwrap();
            assert_eq!(action, TradeAction::Sell);
        }
    }
}
