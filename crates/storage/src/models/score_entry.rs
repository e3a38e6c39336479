use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use super::scoring::ScalingLevel;
use super::units::{DistanceUnit, MassUnit, TimeUnit, UnitPreferences};

/// One athlete-submitted performance on one workout.
///
/// Metric columns hold canonical values only (seconds, kilograms, meters);
/// the unit columns record how the athlete entered them.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct ScoreEntry {
    pub score_id: Uuid,
    pub athlete_id: Uuid,
    pub workout_id: Uuid,
    pub score_date: NaiveDate,
    pub scaling_level: ScalingLevel,
    pub time_capped: bool,
    pub time_seconds: Option<i32>,
    pub rounds: Option<i32>,
    pub reps: Option<i32>,
    pub max_weight_kg: Option<Decimal>,
    pub total_load_kg: Option<Decimal>,
    pub total_distance_meters: Option<Decimal>,
    pub total_calories: Option<i32>,
    pub mass_unit: MassUnit,
    pub distance_unit: DistanceUnit,
    pub time_unit: TimeUnit,
    pub is_personal_record: bool,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl ScoreEntry {
    pub fn triple(&self) -> ScoreTriple {
        ScoreTriple {
            athlete_id: self.athlete_id,
            workout_id: self.workout_id,
            scaling_level: self.scaling_level,
        }
    }

    pub fn metrics(&self) -> CanonicalMetrics {
        CanonicalMetrics {
            time_seconds: self.time_seconds,
            rounds: self.rounds,
            reps: self.reps,
            max_weight_kg: self.max_weight_kg,
            total_load_kg: self.total_load_kg,
            total_distance_meters: self.total_distance_meters,
            total_calories: self.total_calories,
        }
    }

    pub fn units(&self) -> UnitPreferences {
        UnitPreferences {
            mass_unit: self.mass_unit,
            distance_unit: self.distance_unit,
            time_unit: self.time_unit,
        }
    }

    /// Overwrites everything a revision may change. Identity, timestamps
    /// and the personal record flag are left to the caller.
    pub fn apply(&mut self, details: &ScoreDetails) {
        self.score_date = details.score_date;
        self.scaling_level = details.scaling_level;
        self.time_capped = details.time_capped;
        self.time_seconds = details.metrics.time_seconds;
        self.rounds = details.metrics.rounds;
        self.reps = details.metrics.reps;
        self.max_weight_kg = details.metrics.max_weight_kg;
        self.total_load_kg = details.metrics.total_load_kg;
        self.total_distance_meters = details.metrics.total_distance_meters;
        self.total_calories = details.metrics.total_calories;
        self.mass_unit = details.units.mass_unit;
        self.distance_unit = details.units.distance_unit;
        self.time_unit = details.units.time_unit;
        self.notes = details.notes.clone();
    }
}

/// The (athlete, workout, scaling level) scope a personal record is held in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScoreTriple {
    pub athlete_id: Uuid,
    pub workout_id: Uuid,
    pub scaling_level: ScalingLevel,
}

impl ScoreTriple {
    /// Stable textual key, used to derive the storage-level lock.
    pub fn lock_key(&self) -> String {
        format!(
            "score-triple:{}:{}:{}",
            self.athlete_id, self.workout_id, self.scaling_level
        )
    }
}

impl fmt::Display for ScoreTriple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "athlete={} workout={} scaling={}",
            self.athlete_id, self.workout_id, self.scaling_level
        )
    }
}

/// Canonical metric values of a score. All optional; which ones matter is
/// decided by the workout's scoring policy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CanonicalMetrics {
    pub time_seconds: Option<i32>,
    pub rounds: Option<i32>,
    pub reps: Option<i32>,
    pub max_weight_kg: Option<Decimal>,
    pub total_load_kg: Option<Decimal>,
    pub total_distance_meters: Option<Decimal>,
    pub total_calories: Option<i32>,
}

/// The mutable part of a score, already normalized.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreDetails {
    pub score_date: NaiveDate,
    pub scaling_level: ScalingLevel,
    pub time_capped: bool,
    pub metrics: CanonicalMetrics,
    pub units: UnitPreferences,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewScoreEntry {
    pub athlete_id: Uuid,
    pub workout_id: Uuid,
    pub details: ScoreDetails,
}

impl NewScoreEntry {
    pub fn triple(&self) -> ScoreTriple {
        ScoreTriple {
            athlete_id: self.athlete_id,
            workout_id: self.workout_id,
            scaling_level: self.details.scaling_level,
        }
    }
}
