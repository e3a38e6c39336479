use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::score_entry::CanonicalMetrics;

/// Which metric of a workout is authoritative when comparing scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "scoring_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScoringType {
    Time,
    RoundsAndReps,
    Reps,
    Weight,
    Load,
    Calories,
    Distance,
    #[sqlx(rename = "NONE")]
    #[serde(rename = "NONE")]
    Unranked,
}

impl fmt::Display for ScoringType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScoringType::Time => "TIME",
            ScoringType::RoundsAndReps => "ROUNDS_AND_REPS",
            ScoringType::Reps => "REPS",
            ScoringType::Weight => "WEIGHT",
            ScoringType::Load => "LOAD",
            ScoringType::Calories => "CALORIES",
            ScoringType::Distance => "DISTANCE",
            ScoringType::Unranked => "NONE",
        };
        f.write_str(name)
    }
}

/// Difficulty tier. Scores only ever compete within the same tier.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    sqlx::Type,
    ToSchema,
)]
#[sqlx(type_name = "scaling_level", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum ScalingLevel {
    #[default]
    Rx,
    Scaled,
    Elite,
    Custom,
}

impl fmt::Display for ScalingLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScalingLevel::Rx => "RX",
            ScalingLevel::Scaled => "SCALED",
            ScalingLevel::Elite => "ELITE",
            ScalingLevel::Custom => "CUSTOM",
        };
        f.write_str(name)
    }
}

/// Comparison rule selected once per workout from its [`ScoringType`].
///
/// Both the personal record reconciliation and the ranking queries go through
/// this type so that "best" and "strictly better" always agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoringPolicy {
    LowestTime,
    MostRoundsThenReps,
    MostReps,
    HeaviestWeight,
    HighestLoad,
    MostCalories,
    LongestDistance,
    Unranked,
}

/// Ordering key of one score under a policy. Greater is better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Performance {
    primary: Decimal,
    tiebreak: Decimal,
}

impl Performance {
    fn single(value: Decimal) -> Self {
        Self {
            primary: value,
            tiebreak: Decimal::ZERO,
        }
    }
}

impl From<ScoringType> for ScoringPolicy {
    fn from(scoring_type: ScoringType) -> Self {
        match scoring_type {
            ScoringType::Time => ScoringPolicy::LowestTime,
            ScoringType::RoundsAndReps => ScoringPolicy::MostRoundsThenReps,
            ScoringType::Reps => ScoringPolicy::MostReps,
            ScoringType::Weight => ScoringPolicy::HeaviestWeight,
            ScoringType::Load => ScoringPolicy::HighestLoad,
            ScoringType::Calories => ScoringPolicy::MostCalories,
            ScoringType::Distance => ScoringPolicy::LongestDistance,
            ScoringType::Unranked => ScoringPolicy::Unranked,
        }
    }
}

impl ScoringPolicy {
    pub fn is_ranked(self) -> bool {
        self != ScoringPolicy::Unranked
    }

    /// Ordering key of `metrics`, or `None` when the deciding metric is missing.
    ///
    /// Missing reps on a rounds-and-reps score count as zero reps; the rounds
    /// themselves are required.
    pub fn performance(self, metrics: &CanonicalMetrics) -> Option<Performance> {
        match self {
            ScoringPolicy::LowestTime => metrics
                .time_seconds
                .map(|seconds| Performance::single(-Decimal::from(seconds))),
            ScoringPolicy::MostRoundsThenReps => metrics.rounds.map(|rounds| Performance {
                primary: Decimal::from(rounds),
                tiebreak: Decimal::from(metrics.reps.unwrap_or(0)),
            }),
            ScoringPolicy::MostReps => metrics.reps.map(|reps| Performance::single(reps.into())),
            ScoringPolicy::HeaviestWeight => metrics.max_weight_kg.map(Performance::single),
            ScoringPolicy::HighestLoad => metrics.total_load_kg.map(Performance::single),
            ScoringPolicy::MostCalories => metrics
                .total_calories
                .map(|calories| Performance::single(calories.into())),
            ScoringPolicy::LongestDistance => {
                metrics.total_distance_meters.map(Performance::single)
            }
            ScoringPolicy::Unranked => None,
        }
    }

    /// Whether `candidate` beats `target`. A score that has the deciding metric
    /// beats one that lacks it.
    pub fn is_strictly_better(self, candidate: &CanonicalMetrics, target: &CanonicalMetrics) -> bool {
        match (self.performance(candidate), self.performance(target)) {
            (Some(candidate), Some(target)) => candidate > target,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    /// Name of the input a submission must carry for this policy.
    pub fn required_metric(self) -> Option<&'static str> {
        match self {
            ScoringPolicy::LowestTime => Some("time"),
            ScoringPolicy::MostRoundsThenReps => Some("rounds"),
            ScoringPolicy::MostReps => Some("reps"),
            ScoringPolicy::HeaviestWeight => Some("max_weight"),
            ScoringPolicy::HighestLoad => Some("total_load"),
            ScoringPolicy::MostCalories => Some("total_calories"),
            ScoringPolicy::LongestDistance => Some("total_distance"),
            ScoringPolicy::Unranked => None,
        }
    }

    /// Column holding the deciding metric.
    pub fn column(self) -> Option<&'static str> {
        match self {
            ScoringPolicy::LowestTime => Some("time_seconds"),
            ScoringPolicy::MostRoundsThenReps => Some("rounds"),
            ScoringPolicy::MostReps => Some("reps"),
            ScoringPolicy::HeaviestWeight => Some("max_weight_kg"),
            ScoringPolicy::HighestLoad => Some("total_load_kg"),
            ScoringPolicy::MostCalories => Some("total_calories"),
            ScoringPolicy::LongestDistance => Some("total_distance_meters"),
            ScoringPolicy::Unranked => None,
        }
    }
}
