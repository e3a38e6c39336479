use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::Result;
use crate::models::{ScoreEntry, ScoringPolicy};
use crate::repository::ScoreStore;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreComparison {
    pub rank: i64,
    pub total: i64,
    pub percentile: f64,
}

/// Share of the field a rank outperforms, from 100 (best) to 0 (worst),
/// truncated to one decimal.
pub fn percentile(rank: i64, total: i64) -> f64 {
    if total <= 1 {
        return 100.0;
    }

    let value = Decimal::from(100 * (total - rank)) / Decimal::from(total - 1);
    value
        .clamp(Decimal::ZERO, Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(1, RoundingStrategy::ToZero)
        .to_f64()
        .unwrap_or(0.0)
}

/// Ranks one score against the personal records of its workout and
/// scaling level, using count queries only.
pub struct RankingEngine<'a> {
    store: &'a dyn ScoreStore,
    policy: ScoringPolicy,
}

impl<'a> RankingEngine<'a> {
    pub fn new(store: &'a dyn ScoreStore, policy: ScoringPolicy) -> Self {
        Self { store, policy }
    }

    pub async fn compare(&self, entry: &ScoreEntry) -> Result<ScoreComparison> {
        let total = self
            .store
            .count_personal_records(entry.workout_id, entry.scaling_level)
            .await?;

        let better = if self.policy.is_ranked() {
            self.store
                .count_better_personal_records(
                    entry.workout_id,
                    entry.scaling_level,
                    self.policy,
                    &entry.metrics(),
                )
                .await?
        } else {
            0
        };

        let rank = better + 1;
        Ok(ScoreComparison {
            rank,
            total,
            percentile: percentile(rank, total),
        })
    }
}
