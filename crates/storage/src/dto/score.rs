use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use super::common::{PaginationParams, default_page, default_page_size};
use crate::models::units::{self, Canonical, Unit};
use crate::models::{
    CanonicalMetrics, ScalingLevel, ScoreDetails, ScoreEntry, TimeUnit, UnitPreferences,
};

/// Raw metric values as the athlete typed them, in the units named by
/// [`UnitPreferences`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct ScoreMetricsInput {
    #[validate(range(min = 0, max = 100_000))]
    pub time_minutes: Option<i32>,

    #[validate(range(min = 0, max = 6_000_000))]
    pub time_seconds: Option<i32>,

    #[validate(range(min = 0))]
    pub rounds: Option<i32>,

    #[validate(range(min = 0))]
    pub reps: Option<i32>,

    #[validate(custom(function = "validate_metric_range"))]
    pub max_weight: Option<Decimal>,

    #[validate(custom(function = "validate_metric_range"))]
    pub total_load: Option<Decimal>,

    #[validate(custom(function = "validate_metric_range"))]
    pub total_distance: Option<Decimal>,

    #[validate(range(min = 0))]
    pub total_calories: Option<i32>,
}

impl ScoreMetricsInput {
    /// Converts every value to its canonical base unit.
    pub fn normalize(&self, preferences: &UnitPreferences) -> CanonicalMetrics {
        CanonicalMetrics {
            time_seconds: self.canonical_seconds(),
            rounds: self.rounds,
            reps: self.reps,
            max_weight_kg: self
                .max_weight
                .map(|value| units::to_base(value, preferences.mass_unit).value()),
            total_load_kg: self
                .total_load
                .map(|value| units::to_base(value, preferences.mass_unit).value()),
            total_distance_meters: self
                .total_distance
                .map(|value| units::to_base(value, preferences.distance_unit).value()),
            total_calories: self.total_calories,
        }
    }

    fn canonical_seconds(&self) -> Option<i32> {
        if self.time_minutes.is_none() && self.time_seconds.is_none() {
            return None;
        }

        let minutes = units::to_base(
            Decimal::from(self.time_minutes.unwrap_or(0)),
            TimeUnit::Minutes,
        );
        let seconds = units::to_base(
            Decimal::from(self.time_seconds.unwrap_or(0)),
            TimeUnit::Seconds,
        );

        (minutes + seconds).value().to_i32()
    }
}

/// Request payload for submitting a new score
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct SubmitScoreRequest {
    pub athlete_id: Uuid,
    pub workout_id: Uuid,
    pub score_date: NaiveDate,
    #[serde(default)]
    pub scaling_level: ScalingLevel,
    #[serde(default)]
    pub time_capped: bool,

    #[serde(default)]
    #[validate(nested)]
    pub metrics: ScoreMetricsInput,

    #[serde(default)]
    pub units: UnitPreferences,

    #[validate(length(max = 2000, message = "Notes must be at most 2000 characters"))]
    pub notes: Option<String>,
}

impl SubmitScoreRequest {
    pub fn details(&self) -> ScoreDetails {
        ScoreDetails {
            score_date: self.score_date,
            scaling_level: self.scaling_level,
            time_capped: self.time_capped,
            metrics: self.metrics.normalize(&self.units),
            units: self.units,
            notes: self.notes.clone(),
        }
    }
}

/// Request payload replacing the mutable part of an existing score.
/// Athlete and workout cannot change.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateScoreRequest {
    pub score_date: NaiveDate,
    #[serde(default)]
    pub scaling_level: ScalingLevel,
    #[serde(default)]
    pub time_capped: bool,

    #[serde(default)]
    #[validate(nested)]
    pub metrics: ScoreMetricsInput,

    #[serde(default)]
    pub units: UnitPreferences,

    #[validate(length(max = 2000, message = "Notes must be at most 2000 characters"))]
    pub notes: Option<String>,
}

impl UpdateScoreRequest {
    pub fn details(&self) -> ScoreDetails {
        ScoreDetails {
            score_date: self.score_date,
            scaling_level: self.scaling_level,
            time_capped: self.time_capped,
            metrics: self.metrics.normalize(&self.units),
            units: self.units,
            notes: self.notes.clone(),
        }
    }
}

/// A canonical value re-expressed in the athlete's preferred unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DisplayQuantity {
    pub value: Decimal,
    pub unit: String,
}

impl DisplayQuantity {
    fn from_canonical<U: Unit>(value: Decimal, unit: U) -> Self {
        Self {
            value: units::from_base(Canonical::new(value), unit).round_dp(2),
            unit: unit.symbol().to_string(),
        }
    }
}

/// Score as returned to clients: canonical values plus their display form
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ScoreResponse {
    pub score_id: Uuid,
    pub athlete_id: Uuid,
    pub workout_id: Uuid,
    pub score_date: NaiveDate,
    pub scaling_level: ScalingLevel,
    pub time_capped: bool,
    pub is_personal_record: bool,
    pub time_seconds: Option<i32>,
    pub time_display: Option<String>,
    pub rounds: Option<i32>,
    pub reps: Option<i32>,
    pub max_weight_kg: Option<Decimal>,
    pub max_weight: Option<DisplayQuantity>,
    pub total_load_kg: Option<Decimal>,
    pub total_load: Option<DisplayQuantity>,
    pub total_distance_meters: Option<Decimal>,
    pub total_distance: Option<DisplayQuantity>,
    pub total_calories: Option<i32>,
    pub units: UnitPreferences,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl From<ScoreEntry> for ScoreResponse {
    fn from(entry: ScoreEntry) -> Self {
        let units = entry.units();

        Self {
            score_id: entry.score_id,
            athlete_id: entry.athlete_id,
            workout_id: entry.workout_id,
            score_date: entry.score_date,
            scaling_level: entry.scaling_level,
            time_capped: entry.time_capped,
            is_personal_record: entry.is_personal_record,
            time_seconds: entry.time_seconds,
            time_display: entry
                .time_seconds
                .map(|seconds| units.time_unit.format(seconds)),
            rounds: entry.rounds,
            reps: entry.reps,
            max_weight_kg: entry.max_weight_kg,
            max_weight: entry
                .max_weight_kg
                .map(|kg| DisplayQuantity::from_canonical(kg, units.mass_unit)),
            total_load_kg: entry.total_load_kg,
            total_load: entry
                .total_load_kg
                .map(|kg| DisplayQuantity::from_canonical(kg, units.mass_unit)),
            total_distance_meters: entry.total_distance_meters,
            total_distance: entry
                .total_distance_meters
                .map(|meters| DisplayQuantity::from_canonical(meters, units.distance_unit)),
            total_calories: entry.total_calories,
            units,
            notes: entry.notes,
            created_at: entry.created_at,
            updated_at: entry.updated_at,
        }
    }
}

/// Where one score stands among the personal records of its workout and scaling level
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ScoreComparisonResponse {
    pub score_id: Uuid,
    pub rank: i64,
    pub total: i64,
    pub percentile: f64,
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LeaderboardFilter {
    #[serde(default)]
    pub scaling_level: ScalingLevel,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl LeaderboardFilter {
    pub fn pagination(&self) -> PaginationParams {
        PaginationParams {
            page: self.page,
            page_size: self.page_size,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        self.pagination().validate()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReconcileWorkoutResponse {
    pub workout_id: Uuid,
    pub triples: usize,
    pub changed_flags: usize,
}

/// Largest accepted mass or distance input, in the unit it was entered in.
const MAX_METRIC_INPUT: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

fn validate_metric_range(value: &Decimal) -> Result<(), validator::ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(validator::ValidationError::new("negative_value"));
    }
    if *value > MAX_METRIC_INPUT {
        return Err(validator::ValidationError::new("value_too_large")
            .with_message("must be at most 1000000000".into()));
    }
    Ok(())
}
