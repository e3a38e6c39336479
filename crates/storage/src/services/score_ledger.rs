use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use uuid::Uuid;
use validator::Validate;

use super::pr_reconciler::{PrReconciler, ReconcileOutcome, ScoreWrite};
use super::ranking::{RankingEngine, ScoreComparison};
use super::retry::{MAX_ATTEMPTS, RetryPolicy};
use super::workout_cache::WorkoutCache;
use crate::dto::score::{
    LeaderboardFilter, ReconcileWorkoutResponse, SubmitScoreRequest, UpdateScoreRequest,
};
use crate::error::{LedgerError, LedgerResult, StorageError};
use crate::models::{CanonicalMetrics, NewScoreEntry, ScoreEntry, Workout};
use crate::repository::ScoreStore;

#[derive(Debug, Clone, Copy)]
pub struct LedgerSettings {
    pub max_attempts: u32,
    pub backoff: Duration,
    pub workout_cache_ttl: Duration,
    pub workout_cache_capacity: usize,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            backoff: Duration::from_millis(25),
            workout_cache_ttl: Duration::from_secs(300),
            workout_cache_capacity: 1024,
        }
    }
}

/// Entry point for everything that reads or writes scores.
///
/// Every write runs as one cycle under the affected triples' lock: the write
/// itself, then personal record reconciliation, then commit. Conflicts re-run
/// the whole cycle.
#[derive(Clone)]
pub struct ScoreLedger {
    store: Arc<dyn ScoreStore>,
    workouts: Arc<WorkoutCache>,
    retry: RetryPolicy,
}

impl ScoreLedger {
    pub fn new(store: Arc<dyn ScoreStore>, settings: LedgerSettings) -> Self {
        Self {
            store,
            workouts: Arc::new(WorkoutCache::new(
                settings.workout_cache_capacity,
                settings.workout_cache_ttl,
            )),
            retry: RetryPolicy::new(settings.max_attempts, settings.backoff),
        }
    }

    pub async fn submit_score(&self, request: &SubmitScoreRequest) -> LedgerResult<ScoreEntry> {
        request.validate()?;
        ensure_not_future(request.score_date)?;

        let workout = self.workout(request.workout_id).await?;
        let entry = NewScoreEntry {
            athlete_id: request.athlete_id,
            workout_id: request.workout_id,
            details: request.details(),
        };
        ensure_scored(&workout, &entry.details.metrics)?;

        let triples = [entry.triple()];
        let reconciler = PrReconciler::new(self.store.as_ref(), workout.policy());
        let outcome = self
            .retry
            .run("submit_score", || {
                reconciler.run(&triples, ScoreWrite::Insert(&entry))
            })
            .await?;

        let score = written(outcome)?;
        tracing::info!(
            "Score {} submitted for {} (personal record: {})",
            score.score_id,
            score.triple(),
            score.is_personal_record
        );
        Ok(score)
    }

    pub async fn update_score(
        &self,
        score_id: Uuid,
        request: &UpdateScoreRequest,
    ) -> LedgerResult<ScoreEntry> {
        request.validate()?;
        ensure_not_future(request.score_date)?;

        let existing = self.score(score_id).await?;
        let workout = self.workout(existing.workout_id).await?;
        let details = request.details();
        ensure_scored(&workout, &details.metrics)?;

        let store = self.store.as_ref();
        let reconciler = PrReconciler::new(store, workout.policy());
        let details = &details;
        let reconciler = &reconciler;

        let outcome = self
            .retry
            .run("update_score", move || async move {
                // Re-read on every attempt: the scaling level may have moved.
                let current = store.find_score(score_id).await?;
                let mut target = current.triple();
                target.scaling_level = details.scaling_level;

                reconciler
                    .run(
                        &[current.triple(), target],
                        ScoreWrite::Replace(score_id, details),
                    )
                    .await
            })
            .await
            .map_err(score_not_found(score_id))?;

        let score = written(outcome)?;
        tracing::info!(
            "Score {} updated (personal record: {})",
            score.score_id,
            score.is_personal_record
        );
        Ok(score)
    }

    pub async fn delete_score(&self, score_id: Uuid) -> LedgerResult<()> {
        let existing = self.score(score_id).await?;
        let workout = self.workout(existing.workout_id).await?;

        let store = self.store.as_ref();
        let reconciler = PrReconciler::new(store, workout.policy());
        let reconciler = &reconciler;

        let outcome = self
            .retry
            .run("delete_score", move || async move {
                let current = store.find_score(score_id).await?;
                reconciler
                    .run(&[current.triple()], ScoreWrite::Delete(score_id))
                    .await
            })
            .await
            .map_err(score_not_found(score_id))?;

        tracing::info!(
            "Score {} deleted, {} personal record flag(s) changed",
            score_id,
            outcome.changed_flags
        );
        Ok(())
    }

    pub async fn get_score(&self, score_id: Uuid) -> LedgerResult<ScoreEntry> {
        self.score(score_id).await
    }

    /// The athlete's history on one workout, newest first.
    pub async fn list_athlete_scores(
        &self,
        athlete_id: Uuid,
        workout_id: Uuid,
    ) -> LedgerResult<Vec<ScoreEntry>> {
        self.workout(workout_id).await?;
        Ok(self.store.list_athlete_scores(athlete_id, workout_id).await?)
    }

    pub async fn compare_score(&self, score_id: Uuid) -> LedgerResult<ScoreComparison> {
        let score = self.score(score_id).await?;
        let workout = self.workout(score.workout_id).await?;

        let comparison = RankingEngine::new(self.store.as_ref(), workout.policy())
            .compare(&score)
            .await?;
        Ok(comparison)
    }

    /// One page of personal records and the total number of them.
    pub async fn leaderboard(
        &self,
        workout_id: Uuid,
        filter: &LeaderboardFilter,
    ) -> LedgerResult<(Vec<ScoreEntry>, i64)> {
        filter.validate().map_err(LedgerError::InvalidInput)?;
        let workout = self.workout(workout_id).await?;
        let pagination = filter.pagination();

        let page = self
            .store
            .list_personal_records(
                workout_id,
                filter.scaling_level,
                workout.policy(),
                i64::from(pagination.offset()),
                i64::from(pagination.limit()),
            )
            .await?;
        Ok(page)
    }

    /// Recomputes every triple of a workout, each in its own cycle.
    pub async fn reconcile_workout(
        &self,
        workout_id: Uuid,
    ) -> LedgerResult<ReconcileWorkoutResponse> {
        let workout = self.workout(workout_id).await?;
        let triples = self.store.list_triples(workout_id).await?;
        let reconciler = PrReconciler::new(self.store.as_ref(), workout.policy());

        let mut changed_flags = 0;
        for triple in &triples {
            let outcome = self
                .retry
                .run("reconcile_workout", || {
                    reconciler.run(std::slice::from_ref(triple), ScoreWrite::Nothing)
                })
                .await?;
            changed_flags += outcome.changed_flags;
        }

        if changed_flags > 0 {
            tracing::warn!(
                "Repaired {} personal record flag(s) on workout {}",
                changed_flags,
                workout_id
            );
        }

        Ok(ReconcileWorkoutResponse {
            workout_id,
            triples: triples.len(),
            changed_flags,
        })
    }

    async fn workout(&self, workout_id: Uuid) -> LedgerResult<Workout> {
        self.workouts
            .get_or_load(self.store.as_ref(), workout_id)
            .await
            .map_err(LedgerError::workout_lookup(workout_id))
    }

    async fn score(&self, score_id: Uuid) -> LedgerResult<ScoreEntry> {
        self.store
            .find_score(score_id)
            .await
            .map_err(LedgerError::score_lookup(score_id))
    }
}

fn ensure_not_future(score_date: NaiveDate) -> LedgerResult<()> {
    if score_date > Utc::now().date_naive() {
        return Err(LedgerError::InvalidInput(format!(
            "score date {} is in the future",
            score_date
        )));
    }
    Ok(())
}

/// The deciding metric of the workout must be present.
fn ensure_scored(workout: &Workout, metrics: &CanonicalMetrics) -> LedgerResult<()> {
    let policy = workout.policy();

    if let Some(expected) = policy.required_metric()
        && policy.performance(metrics).is_none()
    {
        return Err(LedgerError::ScoreMismatch {
            scoring_type: workout.scoring_type,
            expected,
        });
    }
    Ok(())
}

fn written(outcome: ReconcileOutcome) -> LedgerResult<ScoreEntry> {
    outcome.written.ok_or_else(|| {
        LedgerError::InvariantViolation("write cycle committed without its score".to_string())
    })
}

fn score_not_found(score_id: Uuid) -> impl FnOnce(LedgerError) -> LedgerError {
    move |error| match error {
        LedgerError::Storage(StorageError::NotFound) => LedgerError::ScoreNotFound(score_id),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Days;
    use rust_decimal::Decimal;

    use crate::dto::score::ScoreMetricsInput;
    use crate::models::{DistanceUnit, MassUnit, ScalingLevel, ScoringType, UnitPreferences};
    use crate::repository::MemoryScoreStore;

    fn setup() -> (MemoryScoreStore, ScoreLedger) {
        let store = MemoryScoreStore::new();
        let settings = LedgerSettings {
            backoff: Duration::from_millis(1),
            ..Default::default()
        };
        let ledger = ScoreLedger::new(Arc::new(store.clone()), settings);
        (store, ledger)
    }

    fn score_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()
    }

    fn submission(athlete_id: Uuid, workout_id: Uuid, metrics: ScoreMetricsInput) -> SubmitScoreRequest {
        SubmitScoreRequest {
            athlete_id,
            workout_id,
            score_date: score_date(),
            scaling_level: ScalingLevel::Rx,
            time_capped: false,
            metrics,
            units: UnitPreferences::default(),
            notes: None,
        }
    }

    fn timed(athlete_id: Uuid, workout_id: Uuid, seconds: i32) -> SubmitScoreRequest {
        submission(
            athlete_id,
            workout_id,
            ScoreMetricsInput {
                time_seconds: Some(seconds),
                ..Default::default()
            },
        )
    }

    fn update_of(request: &SubmitScoreRequest) -> UpdateScoreRequest {
        UpdateScoreRequest {
            score_date: request.score_date,
            scaling_level: request.scaling_level,
            time_capped: request.time_capped,
            metrics: request.metrics.clone(),
            units: request.units,
            notes: request.notes.clone(),
        }
    }

    async fn flagged(ledger: &ScoreLedger, athlete_id: Uuid, workout_id: Uuid) -> Vec<ScoreEntry> {
        ledger
            .list_athlete_scores(athlete_id, workout_id)
            .await
            .unwrap()
            .into_iter()
            .filter(|score| score.is_personal_record)
            .collect()
    }

    #[tokio::test]
    async fn test_fran_personal_record_lifecycle() {
        let (store, ledger) = setup();
        let fran = store.add_workout("Fran", ScoringType::Time).await;
        let athlete = Uuid::new_v4();

        let slow = ledger
            .submit_score(&timed(athlete, fran.workout_id, 330))
            .await
            .unwrap();
        assert!(slow.is_personal_record);

        let fast = ledger
            .submit_score(&timed(athlete, fran.workout_id, 290))
            .await
            .unwrap();
        assert!(fast.is_personal_record);
        assert!(!ledger.get_score(slow.score_id).await.unwrap().is_personal_record);

        ledger.delete_score(fast.score_id).await.unwrap();
        assert!(ledger.get_score(slow.score_id).await.unwrap().is_personal_record);
        assert!(matches!(
            ledger.get_score(fast.score_id).await,
            Err(LedgerError::ScoreNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_worse_score_does_not_take_flag() {
        let (store, ledger) = setup();
        let fran = store.add_workout("Fran", ScoringType::Time).await;
        let athlete = Uuid::new_v4();

        let best = ledger.submit_score(&timed(athlete, fran.workout_id, 290)).await.unwrap();
        let worse = ledger.submit_score(&timed(athlete, fran.workout_id, 330)).await.unwrap();

        assert!(!worse.is_personal_record);
        let holders = flagged(&ledger, athlete, fran.workout_id).await;
        assert_eq!(holders.len(), 1);
        assert_eq!(holders[0].score_id, best.score_id);
    }

    #[tokio::test]
    async fn test_missing_metric_is_rejected_without_write() {
        let (store, ledger) = setup();
        let fran = store.add_workout("Fran", ScoringType::Time).await;
        let athlete = Uuid::new_v4();
        let request = submission(
            athlete,
            fran.workout_id,
            ScoreMetricsInput {
                reps: Some(45),
                ..Default::default()
            },
        );

        let result = ledger.submit_score(&request).await;

        assert!(matches!(
            result,
            Err(LedgerError::ScoreMismatch {
                scoring_type: ScoringType::Time,
                expected: "time"
            })
        ));
        assert!(ledger
            .list_athlete_scores(athlete, fran.workout_id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_unknown_workout_is_rejected() {
        let (_store, ledger) = setup();
        let workout_id = Uuid::new_v4();

        let result = ledger.submit_score(&timed(Uuid::new_v4(), workout_id, 300)).await;
        assert!(matches!(result, Err(LedgerError::WorkoutNotFound(id)) if id == workout_id));
    }

    #[tokio::test]
    async fn test_future_date_is_rejected() {
        let (store, ledger) = setup();
        let fran = store.add_workout("Fran", ScoringType::Time).await;
        let mut request = timed(Uuid::new_v4(), fran.workout_id, 300);
        request.score_date = Utc::now().date_naive().checked_add_days(Days::new(2)).unwrap();

        let result = ledger.submit_score(&request).await;
        assert!(matches!(result, Err(LedgerError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_invalid_metrics_fail_validation() {
        let (store, ledger) = setup();
        let fran = store.add_workout("Fran", ScoringType::Time).await;
        let request = timed(Uuid::new_v4(), fran.workout_id, -5);

        let result = ledger.submit_score(&request).await;
        assert!(matches!(result, Err(LedgerError::Validation(_))));
    }

    #[tokio::test]
    async fn test_pounds_are_stored_as_kilograms() {
        let (store, ledger) = setup();
        let deadlift = store.add_workout("1RM Deadlift", ScoringType::Weight).await;
        let mut request = submission(
            Uuid::new_v4(),
            deadlift.workout_id,
            ScoreMetricsInput {
                max_weight: Some(Decimal::new(225, 0)),
                ..Default::default()
            },
        );
        request.units.mass_unit = MassUnit::Pounds;

        let score = ledger.submit_score(&request).await.unwrap();

        assert_eq!(score.max_weight_kg, Some(Decimal::new(10205828325, 8)));
        assert_eq!(score.mass_unit, MassUnit::Pounds);
        assert!(score.is_personal_record);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_submissions_leave_one_record() {
        let (store, ledger) = setup();
        let fran = store.add_workout("Fran", ScoringType::Time).await;
        let athlete = Uuid::new_v4();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let ledger = ledger.clone();
                let request = timed(athlete, fran.workout_id, 300 - i * 10);
                tokio::spawn(async move { ledger.submit_score(&request).await })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let scores = ledger
            .list_athlete_scores(athlete, fran.workout_id)
            .await
            .unwrap();
        assert_eq!(scores.len(), 8);

        let holders: Vec<_> = scores.iter().filter(|s| s.is_personal_record).collect();
        assert_eq!(holders.len(), 1);
        assert_eq!(holders[0].time_seconds, Some(230));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_athletes_each_keep_a_record() {
        let (store, ledger) = setup();
        let grace = store.add_workout("Grace", ScoringType::Time).await;
        let athletes: Vec<Uuid> = (0..5).map(|_| Uuid::new_v4()).collect();

        let mut handles = Vec::new();
        for athlete in &athletes {
            for seconds in [200, 180, 190] {
                let ledger = ledger.clone();
                let request = timed(*athlete, grace.workout_id, seconds);
                handles.push(tokio::spawn(async move { ledger.submit_score(&request).await }));
            }
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        for athlete in athletes {
            let holders = flagged(&ledger, athlete, grace.workout_id).await;
            assert_eq!(holders.len(), 1);
            assert_eq!(holders[0].time_seconds, Some(180));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_moves_and_deletes_keep_one_record_per_level() {
        let (store, ledger) = setup();
        let fran = store.add_workout("Fran", ScoringType::Time).await;
        let athlete = Uuid::new_v4();

        let at_level = |seconds: i32, scaling_level: ScalingLevel| {
            let mut request = timed(athlete, fran.workout_id, seconds);
            request.scaling_level = scaling_level;
            request
        };

        let mut rx = Vec::new();
        for seconds in [300, 290, 280, 270, 260, 250] {
            let score = ledger.submit_score(&at_level(seconds, ScalingLevel::Rx)).await.unwrap();
            rx.push(score.score_id);
        }
        let mut scaled = Vec::new();
        for seconds in [400, 390, 380, 370] {
            let score = ledger
                .submit_score(&at_level(seconds, ScalingLevel::Scaled))
                .await
                .unwrap();
            scaled.push(score.score_id);
        }

        let mut handles = Vec::new();
        for score_id in [rx[5], scaled[3]] {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move { ledger.delete_score(score_id).await }));
        }
        for (score_id, request) in [
            (rx[4], update_of(&at_level(360, ScalingLevel::Scaled))),
            (scaled[2], update_of(&at_level(240, ScalingLevel::Rx))),
            (rx[0], update_of(&at_level(265, ScalingLevel::Rx))),
        ] {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                ledger.update_score(score_id, &request).await.map(|_| ())
            }));
        }
        for request in [
            at_level(275, ScalingLevel::Rx),
            at_level(355, ScalingLevel::Scaled),
            at_level(245, ScalingLevel::Rx),
        ] {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                ledger.submit_score(&request).await.map(|_| ())
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let scores = ledger
            .list_athlete_scores(athlete, fran.workout_id)
            .await
            .unwrap();
        assert_eq!(scores.len(), 11);

        for (level, fastest) in [(ScalingLevel::Rx, 240), (ScalingLevel::Scaled, 355)] {
            let at: Vec<_> = scores.iter().filter(|s| s.scaling_level == level).collect();
            let best = at.iter().filter_map(|s| s.time_seconds).min();
            assert_eq!(best, Some(fastest));

            let holders: Vec<_> = at.iter().filter(|s| s.is_personal_record).collect();
            assert_eq!(holders.len(), 1, "{} must have one record", level);
            assert_eq!(holders[0].time_seconds, Some(fastest));
        }
    }

    #[tokio::test]
    async fn test_oversized_distance_is_rejected() {
        let (store, ledger) = setup();
        let row = store.add_workout("Marathon Row", ScoringType::Distance).await;
        let mut request = submission(
            Uuid::new_v4(),
            row.workout_id,
            ScoreMetricsInput {
                total_distance: Some(Decimal::MAX),
                ..Default::default()
            },
        );
        request.units.distance_unit = DistanceUnit::Miles;

        let result = ledger.submit_score(&request).await;

        assert!(matches!(result, Err(LedgerError::Validation(_))));
        assert!(ledger
            .list_athlete_scores(request.athlete_id, row.workout_id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_leaderboard_rejects_invalid_page() {
        let (store, ledger) = setup();
        let fran = store.add_workout("Fran", ScoringType::Time).await;
        let filter = LeaderboardFilter {
            scaling_level: ScalingLevel::Rx,
            page: 0,
            page_size: 10,
        };

        assert!(matches!(
            ledger.leaderboard(fran.workout_id, &filter).await,
            Err(LedgerError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_conflict_is_retried() {
        let (store, ledger) = setup();
        let fran = store.add_workout("Fran", ScoringType::Time).await;
        let athlete = Uuid::new_v4();
        store.inject_conflicts(2);

        let score = ledger.submit_score(&timed(athlete, fran.workout_id, 300)).await.unwrap();

        assert!(score.is_personal_record);
        let scores = ledger.list_athlete_scores(athlete, fran.workout_id).await.unwrap();
        assert_eq!(scores.len(), 1);
    }

    #[tokio::test]
    async fn test_exhausted_retries_leave_nothing_behind() {
        let (store, ledger) = setup();
        let fran = store.add_workout("Fran", ScoringType::Time).await;
        let athlete = Uuid::new_v4();
        store.inject_conflicts(3);

        let result = ledger.submit_score(&timed(athlete, fran.workout_id, 300)).await;

        assert!(matches!(
            result,
            Err(LedgerError::ConcurrencyConflict { attempts: 3 })
        ));
        assert!(ledger
            .list_athlete_scores(athlete, fran.workout_id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_consistent_workout_reconciles_without_writes() {
        let (store, ledger) = setup();
        let fran = store.add_workout("Fran", ScoringType::Time).await;
        let athlete = Uuid::new_v4();
        ledger.submit_score(&timed(athlete, fran.workout_id, 330)).await.unwrap();
        ledger.submit_score(&timed(athlete, fran.workout_id, 290)).await.unwrap();
        let writes = store.personal_record_writes();

        let summary = ledger.reconcile_workout(fran.workout_id).await.unwrap();

        assert_eq!(summary.triples, 1);
        assert_eq!(summary.changed_flags, 0);
        assert_eq!(store.personal_record_writes(), writes);
    }

    #[tokio::test]
    async fn test_reconcile_repairs_drifted_flags() {
        let (store, ledger) = setup();
        let fran = store.add_workout("Fran", ScoringType::Time).await;
        let athlete = Uuid::new_v4();
        let slow = ledger.submit_score(&timed(athlete, fran.workout_id, 330)).await.unwrap();
        let fast = ledger.submit_score(&timed(athlete, fran.workout_id, 290)).await.unwrap();

        store.force_personal_record_flag(fast.score_id, false).await;
        store.force_personal_record_flag(slow.score_id, true).await;

        let summary = ledger.reconcile_workout(fran.workout_id).await.unwrap();

        assert_eq!(summary.changed_flags, 2);
        let holders = flagged(&ledger, athlete, fran.workout_id).await;
        assert_eq!(holders.len(), 1);
        assert_eq!(holders[0].score_id, fast.score_id);
    }

    #[tokio::test]
    async fn test_update_recomputes_record() {
        let (store, ledger) = setup();
        let fran = store.add_workout("Fran", ScoringType::Time).await;
        let athlete = Uuid::new_v4();
        let first = ledger.submit_score(&timed(athlete, fran.workout_id, 300)).await.unwrap();
        let second = ledger.submit_score(&timed(athlete, fran.workout_id, 320)).await.unwrap();

        let mut revision = update_of(&timed(athlete, fran.workout_id, 280));
        revision.notes = Some("recounted".to_string());
        let updated = ledger.update_score(second.score_id, &revision).await.unwrap();

        assert!(updated.is_personal_record);
        assert_eq!(updated.time_seconds, Some(280));
        assert_eq!(updated.notes.as_deref(), Some("recounted"));
        assert!(!ledger.get_score(first.score_id).await.unwrap().is_personal_record);
    }

    #[tokio::test]
    async fn test_scaling_change_reconciles_both_levels() {
        let (store, ledger) = setup();
        let fran = store.add_workout("Fran", ScoringType::Time).await;
        let athlete = Uuid::new_v4();
        let best = ledger.submit_score(&timed(athlete, fran.workout_id, 300)).await.unwrap();
        let other = ledger.submit_score(&timed(athlete, fran.workout_id, 320)).await.unwrap();
        assert!(best.is_personal_record);

        let mut revision = update_of(&timed(athlete, fran.workout_id, 300));
        revision.scaling_level = ScalingLevel::Scaled;
        let moved = ledger.update_score(best.score_id, &revision).await.unwrap();

        assert_eq!(moved.scaling_level, ScalingLevel::Scaled);
        assert!(moved.is_personal_record);
        assert!(ledger.get_score(other.score_id).await.unwrap().is_personal_record);
    }

    #[tokio::test]
    async fn test_update_and_delete_of_unknown_score() {
        let (store, ledger) = setup();
        let fran = store.add_workout("Fran", ScoringType::Time).await;
        let missing = Uuid::new_v4();
        let revision = update_of(&timed(Uuid::new_v4(), fran.workout_id, 300));

        assert!(matches!(
            ledger.update_score(missing, &revision).await,
            Err(LedgerError::ScoreNotFound(id)) if id == missing
        ));
        assert!(matches!(
            ledger.delete_score(missing).await,
            Err(LedgerError::ScoreNotFound(_))
        ));
        assert!(matches!(
            ledger.compare_score(missing).await,
            Err(LedgerError::ScoreNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_rank_among_ten_records() {
        let (store, ledger) = setup();
        let fran = store.add_workout("Fran", ScoringType::Time).await;

        let mut target = None;
        for seconds in (100..200).step_by(10) {
            let score = ledger
                .submit_score(&timed(Uuid::new_v4(), fran.workout_id, seconds))
                .await
                .unwrap();
            if seconds == 120 {
                target = Some(score.score_id);
            }
        }

        let comparison = ledger.compare_score(target.unwrap()).await.unwrap();

        assert_eq!(comparison.rank, 3);
        assert_eq!(comparison.total, 10);
        assert_eq!(comparison.percentile, 77.7);
    }

    #[tokio::test]
    async fn test_single_record_ranks_first() {
        let (store, ledger) = setup();
        let row = store.add_workout("2k Row", ScoringType::Distance).await;
        let request = submission(
            Uuid::new_v4(),
            row.workout_id,
            ScoreMetricsInput {
                total_distance: Some(Decimal::new(2000, 0)),
                ..Default::default()
            },
        );
        let score = ledger.submit_score(&request).await.unwrap();

        let comparison = ledger.compare_score(score.score_id).await.unwrap();

        assert_eq!(comparison.rank, 1);
        assert_eq!(comparison.total, 1);
        assert_eq!(comparison.percentile, 100.0);
    }

    #[tokio::test]
    async fn test_unranked_workout_always_ranks_first() {
        let (store, ledger) = setup();
        let skills = store.add_workout("Skill Practice", ScoringType::Unranked).await;

        let mut scores = Vec::new();
        for seconds in [120, 90] {
            let score = ledger
                .submit_score(&timed(Uuid::new_v4(), skills.workout_id, seconds))
                .await
                .unwrap();
            assert!(!score.is_personal_record);
            scores.push(score);
        }

        for score in scores {
            let comparison = ledger.compare_score(score.score_id).await.unwrap();
            assert_eq!(comparison.rank, 1);
            assert_eq!(comparison.percentile, 100.0);
        }
    }

    #[tokio::test]
    async fn test_leaderboard_lists_records_in_order() {
        let (store, ledger) = setup();
        let fran = store.add_workout("Fran", ScoringType::Time).await;
        let repeat = Uuid::new_v4();
        ledger.submit_score(&timed(repeat, fran.workout_id, 250)).await.unwrap();
        ledger.submit_score(&timed(repeat, fran.workout_id, 150)).await.unwrap();
        ledger.submit_score(&timed(Uuid::new_v4(), fran.workout_id, 200)).await.unwrap();
        ledger.submit_score(&timed(Uuid::new_v4(), fran.workout_id, 180)).await.unwrap();

        let filter = LeaderboardFilter {
            scaling_level: ScalingLevel::Rx,
            page: 1,
            page_size: 2,
        };
        let (page, total) = ledger.leaderboard(fran.workout_id, &filter).await.unwrap();

        assert_eq!(total, 3);
        let times: Vec<_> = page.iter().map(|s| s.time_seconds).collect();
        assert_eq!(times, vec![Some(150), Some(180)]);

        let beyond = LeaderboardFilter { page: 5, ..filter };
        let (page, total) = ledger.leaderboard(fran.workout_id, &beyond).await.unwrap();
        assert!(page.is_empty());
        assert_eq!(total, 3);
    }

    #[tokio::test]
    async fn test_rounds_and_reps_leaderboard() {
        let (store, ledger) = setup();
        let cindy = store.add_workout("Cindy", ScoringType::RoundsAndReps).await;

        for (rounds, reps) in [(18, Some(3)), (19, None), (18, Some(12))] {
            let request = submission(
                Uuid::new_v4(),
                cindy.workout_id,
                ScoreMetricsInput {
                    rounds: Some(rounds),
                    reps,
                    ..Default::default()
                },
            );
            ledger.submit_score(&request).await.unwrap();
        }

        let filter = LeaderboardFilter {
            scaling_level: ScalingLevel::Rx,
            page: 1,
            page_size: 10,
        };
        let (page, _) = ledger.leaderboard(cindy.workout_id, &filter).await.unwrap();
        let order: Vec<_> = page.iter().map(|s| (s.rounds, s.reps)).collect();

        assert_eq!(
            order,
            vec![(Some(19), None), (Some(18), Some(12)), (Some(18), Some(3))]
        );
    }

    #[tokio::test]
    async fn test_leaderboard_of_unknown_workout() {
        let (_store, ledger) = setup();
        let filter = LeaderboardFilter {
            scaling_level: ScalingLevel::Rx,
            page: 1,
            page_size: 10,
        };

        assert!(matches!(
            ledger.leaderboard(Uuid::new_v4(), &filter).await,
            Err(LedgerError::WorkoutNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_leaderboard_is_empty_page() {
        let (store, ledger) = setup();
        let fran = store.add_workout("Fran", ScoringType::Time).await;
        let filter = LeaderboardFilter {
            scaling_level: ScalingLevel::Elite,
            page: 1,
            page_size: 10,
        };

        let (page, total) = ledger.leaderboard(fran.workout_id, &filter).await.unwrap();
        assert!(page.is_empty());
        assert_eq!(total, 0);
    }
}
