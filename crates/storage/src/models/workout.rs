use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use super::scoring::{ScoringPolicy, ScoringType};

/// Workout definition as seen by the ledger. The catalog owns these rows;
/// `scoring_type` is immutable once scores reference the workout.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Workout {
    pub workout_id: Uuid,
    pub name: String,
    pub scoring_type: ScoringType,
    pub created_at: chrono::NaiveDateTime,
}

impl Workout {
    pub fn policy(&self) -> ScoringPolicy {
        ScoringPolicy::from(self.scoring_type)
    }
}
