use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    CanonicalMetrics, NewScoreEntry, ScalingLevel, ScoreDetails, ScoreEntry, ScoreTriple,
    ScoringPolicy, Workout,
};

pub mod memory;
pub mod score;
pub mod workout;

pub use memory::MemoryScoreStore;
pub use score::ScoreRepository;

/// Persistence seen by the score ledger.
///
/// Reads go straight to the store. Every write goes through a [`TripleLock`],
/// so personal record flags are only ever changed while holding the triple.
#[async_trait]
pub trait ScoreStore: Send + Sync {
    async fn find_workout(&self, workout_id: Uuid) -> Result<Workout>;

    async fn find_score(&self, score_id: Uuid) -> Result<ScoreEntry>;

    /// An athlete's history on one workout, newest first.
    async fn list_athlete_scores(&self, athlete_id: Uuid, workout_id: Uuid)
    -> Result<Vec<ScoreEntry>>;

    /// Every triple that has at least one score on the workout.
    async fn list_triples(&self, workout_id: Uuid) -> Result<Vec<ScoreTriple>>;

    /// Takes exclusive hold of the given triples and loads their scores.
    ///
    /// Holds on different triples never wait on each other. Dropping the lock
    /// without committing discards every write made through it.
    async fn lock_triples(&self, triples: &[ScoreTriple]) -> Result<Box<dyn TripleLock>>;

    async fn count_personal_records(
        &self,
        workout_id: Uuid,
        scaling_level: ScalingLevel,
    ) -> Result<i64>;

    /// Personal records strictly better than `target` under `policy`.
    async fn count_better_personal_records(
        &self,
        workout_id: Uuid,
        scaling_level: ScalingLevel,
        policy: ScoringPolicy,
        target: &CanonicalMetrics,
    ) -> Result<i64>;

    /// One page of personal records in leaderboard order, with the total count.
    async fn list_personal_records(
        &self,
        workout_id: Uuid,
        scaling_level: ScalingLevel,
        policy: ScoringPolicy,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<ScoreEntry>, i64)>;
}

/// Exclusive hold on one or more triples.
#[async_trait]
pub trait TripleLock: Send {
    /// Scores of the locked triples, including writes made through this lock.
    fn entries(&self) -> &[ScoreEntry];

    async fn insert_score(&mut self, entry: &NewScoreEntry) -> Result<ScoreEntry>;

    /// Replaces the mutable part of a score. Moving a score to another scaling
    /// level clears its personal record flag; both triples must be locked.
    async fn replace_score(&mut self, score_id: Uuid, details: &ScoreDetails)
    -> Result<ScoreEntry>;

    async fn delete_score(&mut self, score_id: Uuid) -> Result<ScoreEntry>;

    async fn set_personal_record(&mut self, score_id: Uuid, is_personal_record: bool)
    -> Result<()>;

    async fn commit(self: Box<Self>) -> Result<()>;
}

/// Sorted and deduplicated, so every caller acquires locks in the same order.
pub(crate) fn lock_order(triples: &[ScoreTriple]) -> Vec<ScoreTriple> {
    let mut ordered = triples.to_vec();
    ordered.sort();
    ordered.dedup();
    ordered
}
