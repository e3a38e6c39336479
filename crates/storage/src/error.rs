use thiserror::Error;
use uuid::Uuid;
use validator::ValidationErrors;

use crate::models::ScoringType;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Not found")]
    NotFound,

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Write conflict: {0}")]
    Conflict(String),

    #[error("Personal record invariant violated: {0}")]
    InvariantViolation(String),
}

pub type Result<T> = std::result::Result<T, StorageError>;

impl StorageError {
    pub fn is_unique_violation(&self) -> bool {
        matches!(
            self,
            StorageError::Database(sqlx::Error::Database(e))
                if e.code().as_deref() == Some("23505")
        )
    }

    pub fn is_foreign_key_violation(&self) -> bool {
        matches!(
            self,
            StorageError::Database(sqlx::Error::Database(e))
                if e.code().as_deref() == Some("23503")
        )
    }

    /// Transient failures where re-running the whole unit of work may succeed:
    /// serialization failure, deadlock, and lock timeout.
    pub fn is_conflict(&self) -> bool {
        match self {
            StorageError::Conflict(_) => true,
            StorageError::Database(sqlx::Error::Database(e)) => {
                matches!(e.code().as_deref(), Some("40001" | "40P01" | "55P03"))
            }
            _ => false,
        }
    }
}

/// Errors surfaced by the score ledger to its callers.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{scoring_type} workouts require a {expected} value")]
    ScoreMismatch {
        scoring_type: ScoringType,
        expected: &'static str,
    },

    #[error("Workout {0} not found")]
    WorkoutNotFound(Uuid),

    #[error("Score {0} not found")]
    ScoreNotFound(Uuid),

    #[error("Concurrent writes kept conflicting after {attempts} attempt(s), try again")]
    ConcurrencyConflict { attempts: u32 },

    #[error("Personal record invariant violated: {0}")]
    InvariantViolation(String),

    #[error(transparent)]
    Storage(StorageError),
}

impl From<StorageError> for LedgerError {
    fn from(error: StorageError) -> Self {
        match error {
            StorageError::InvariantViolation(msg) => {
                tracing::error!("Personal record invariant violated: {}", msg);
                LedgerError::InvariantViolation(msg)
            }
            StorageError::Conflict(_) => LedgerError::ConcurrencyConflict { attempts: 1 },
            other => LedgerError::Storage(other),
        }
    }
}

impl LedgerError {
    pub(crate) fn score_lookup(score_id: Uuid) -> impl FnOnce(StorageError) -> LedgerError {
        move |error| match error {
            StorageError::NotFound => LedgerError::ScoreNotFound(score_id),
            other => other.into(),
        }
    }

    pub(crate) fn workout_lookup(workout_id: Uuid) -> impl FnOnce(StorageError) -> LedgerError {
        move |error| match error {
            StorageError::NotFound => LedgerError::WorkoutNotFound(workout_id),
            other => other.into(),
        }
    }
}

pub type LedgerResult<T> = std::result::Result<T, LedgerError>;
