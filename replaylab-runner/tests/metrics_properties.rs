//! Property tests for the metrics aggregator over arbitrary histories.

use chrono::{Duration, NaiveDate};
use proptest::prelude::*;
use replaylab_core::{extract_trades, ClosedPosition, EnvInfo, StepRecord, Trade};
use replaylab_runner::metrics::{profit_factor, total_reward, win_rate, MetricsSnapshot};

fn arb_trade() -> impl Strategy<Value = Trade> {
    (
        0usize..500,
        -500.0..500.0f64,
        1.0..1_000.0f64,
        prop::sample::select(vec!["stop-loss", "take-profit", "signal-exit", "end-of-data"]),
    )
        .prop_map(|(step, pnl, entry, reason)| Trade {
            timestamp: NaiveDate::from_ymd_opt(2024, 1, 2)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
                + Duration::hours(step as i64),
            step,
            entry_price: entry,
            exit_price: entry + pnl,
            quantity: 1.0,
            pnl,
            pnl_percent: pnl / entry * 100.0,
            holding_period: 1,
            close_reason: reason.to_string(),
            portfolio_value: 10_000.0 + pnl,
        })
}

fn arb_records() -> impl Strategy<Value = Vec<StepRecord>> {
    prop::collection::vec(
        (1_000.0..100_000.0f64, -10.0..10.0f64, any::<bool>()),
        0..80,
    )
    .prop_map(|steps| {
        let base = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        steps
            .into_iter()
            .enumerate()
            .map(|(i, (value, reward, has_close))| StepRecord {
                step_index: i,
                timestamp: base + Duration::hours(i as i64),
                info: if has_close {
                    EnvInfo::with_closed(
                        value,
                        vec![ClosedPosition {
                            pnl: reward * 10.0,
                            ..Default::default()
                        }],
                    )
                } else {
                    EnvInfo::flat(value)
                },
                reward,
            })
            .collect()
    })
}

proptest! {
    /// Total reward equals the sum over the exact step sequence, independent
    /// of how many trades occurred.
    #[test]
    fn total_reward_is_exact_sum(records in arb_records()) {
        let expected: f64 = records.iter().map(|r| r.reward).sum();
        let got = total_reward(&records);
        prop_assert!((got - expected).abs() < 1e-9);

        let trades = extract_trades(&records);
        let snapshot = MetricsSnapshot::compute(&records, &trades, 10_000.0).unwrap();
        prop_assert!((snapshot.total_reward - expected).abs() < 1e-9);
    }

    /// Re-aggregating the identical history yields identical snapshots.
    #[test]
    fn aggregation_is_deterministic(records in arb_records()) {
        let trades = extract_trades(&records);
        let a = MetricsSnapshot::compute(&records, &trades, 10_000.0).unwrap();
        let b = MetricsSnapshot::compute(&records, &trades, 10_000.0).unwrap();
        prop_assert_eq!(&a, &b);
        prop_assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    /// Win/loss buckets partition the non-break-even trades.
    #[test]
    fn buckets_partition_trades(trades in prop::collection::vec(arb_trade(), 0..40)) {
        let snapshot = MetricsSnapshot::compute(&[], &trades, 10_000.0).unwrap();
        let breakeven = trades.iter().filter(|t| t.pnl == 0.0).count();
        prop_assert_eq!(
            snapshot.winning_trades + snapshot.losing_trades + breakeven,
            snapshot.num_trades
        );
    }

    /// Profit factor is finite and non-negative for every trade mix, and
    /// exactly 0 when there are no losing trades.
    #[test]
    fn profit_factor_is_finite_and_nonnegative(trades in prop::collection::vec(arb_trade(), 0..40)) {
        let pf = profit_factor(&trades);
        prop_assert!(pf.is_finite());
        prop_assert!(pf >= 0.0);
        if !trades.iter().any(|t| t.is_loser()) {
            prop_assert_eq!(pf, 0.0);
        }
    }

    /// Expectancy is finite for any mixture of buckets, and win rate stays
    /// in [0, 100].
    #[test]
    fn expectancy_finite_win_rate_bounded(trades in prop::collection::vec(arb_trade(), 0..40)) {
        let snapshot = MetricsSnapshot::compute(&[], &trades, 10_000.0).unwrap();
        prop_assert!(snapshot.expectancy.is_finite());
        let rate = win_rate(&trades);
        prop_assert!((0.0..=100.0).contains(&rate));
    }

    /// The close-reason tally accounts for every trade exactly once.
    #[test]
    fn close_reason_tally_is_complete(trades in prop::collection::vec(arb_trade(), 0..40)) {
        let snapshot = MetricsSnapshot::compute(&[], &trades, 10_000.0).unwrap();
        let tallied: usize = snapshot.close_reasons.iter().map(|(_, n)| n).sum();
        prop_assert_eq!(tallied, snapshot.num_trades);
    }
}
