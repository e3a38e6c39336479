use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{NaiveDateTime, TimeDelta, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use uuid::Uuid;

use super::{ScoreStore, TripleLock, lock_order};
use crate::error::{Result, StorageError};
use crate::models::{
    CanonicalMetrics, NewScoreEntry, ScalingLevel, ScoreDetails, ScoreEntry, ScoreTriple,
    ScoringPolicy, ScoringType, Workout,
};

/// Process-local [`ScoreStore`] with the same locking contract as the
/// Postgres repository. Used by tests and for running without a database.
#[derive(Clone, Default)]
pub struct MemoryScoreStore {
    inner: Arc<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    workouts: RwLock<HashMap<Uuid, Workout>>,
    scores: RwLock<HashMap<Uuid, ScoreEntry>>,
    triple_locks: Mutex<HashMap<ScoreTriple, Arc<Mutex<()>>>>,
    last_timestamp: Mutex<Option<NaiveDateTime>>,
    pending_conflicts: AtomicU32,
    personal_record_writes: AtomicU64,
}

impl MemoryState {
    /// Strictly increasing, so creation order is never ambiguous.
    async fn next_timestamp(&self) -> NaiveDateTime {
        let mut last = self.last_timestamp.lock().await;
        let now = Utc::now().naive_utc();
        let next = match *last {
            Some(previous) if previous >= now => previous + TimeDelta::microseconds(1),
            _ => now,
        };
        *last = Some(next);
        next
    }

    fn take_conflict(&self) -> bool {
        self.pending_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl MemoryScoreStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_workout(&self, name: &str, scoring_type: ScoringType) -> Workout {
        let workout = Workout {
            workout_id: Uuid::new_v4(),
            name: name.to_string(),
            scoring_type,
            created_at: self.inner.next_timestamp().await,
        };
        self.inner
            .workouts
            .write()
            .await
            .insert(workout.workout_id, workout.clone());
        workout
    }

    /// The next `count` commits fail with a write conflict.
    pub fn inject_conflicts(&self, count: u32) {
        self.inner.pending_conflicts.fetch_add(count, Ordering::SeqCst);
    }

    /// Committed personal record flag writes so far.
    pub fn personal_record_writes(&self) -> u64 {
        self.inner.personal_record_writes.load(Ordering::SeqCst)
    }

    /// Sets a flag without taking the triple, leaving the ledger inconsistent.
    #[cfg(test)]
    pub(crate) async fn force_personal_record_flag(&self, score_id: Uuid, value: bool) {
        if let Some(entry) = self.inner.scores.write().await.get_mut(&score_id) {
            entry.is_personal_record = value;
        }
    }

    #[cfg(test)]
    async fn tracked_triple_locks(&self) -> usize {
        self.inner.triple_locks.lock().await.len()
    }

    async fn personal_records(
        &self,
        workout_id: Uuid,
        scaling_level: ScalingLevel,
    ) -> Vec<ScoreEntry> {
        self.inner
            .scores
            .read()
            .await
            .values()
            .filter(|entry| {
                entry.is_personal_record
                    && entry.workout_id == workout_id
                    && entry.scaling_level == scaling_level
            })
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ScoreStore for MemoryScoreStore {
    async fn find_workout(&self, workout_id: Uuid) -> Result<Workout> {
        self.inner
            .workouts
            .read()
            .await
            .get(&workout_id)
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn find_score(&self, score_id: Uuid) -> Result<ScoreEntry> {
        self.inner
            .scores
            .read()
            .await
            .get(&score_id)
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn list_athlete_scores(
        &self,
        athlete_id: Uuid,
        workout_id: Uuid,
    ) -> Result<Vec<ScoreEntry>> {
        let mut scores: Vec<ScoreEntry> = self
            .inner
            .scores
            .read()
            .await
            .values()
            .filter(|entry| entry.athlete_id == athlete_id && entry.workout_id == workout_id)
            .cloned()
            .collect();
        scores.sort_by_key(|entry| Reverse((entry.score_date, entry.created_at)));
        Ok(scores)
    }

    async fn list_triples(&self, workout_id: Uuid) -> Result<Vec<ScoreTriple>> {
        let triples: HashSet<ScoreTriple> = self
            .inner
            .scores
            .read()
            .await
            .values()
            .filter(|entry| entry.workout_id == workout_id)
            .map(ScoreEntry::triple)
            .collect();
        Ok(lock_order(&triples.into_iter().collect::<Vec<_>>()))
    }

    async fn lock_triples(&self, triples: &[ScoreTriple]) -> Result<Box<dyn TripleLock>> {
        let triples = lock_order(triples);

        let mut guards = Vec::with_capacity(triples.len());
        for triple in &triples {
            let lock = {
                let mut locks = self.inner.triple_locks.lock().await;
                // Holders and waiters keep a clone, so a lone map reference is idle.
                locks.retain(|_, lock| Arc::strong_count(lock) > 1);
                locks.entry(*triple).or_default().clone()
            };
            guards.push(lock.lock_owned().await);
        }

        let mut entries: Vec<ScoreEntry> = self
            .inner
            .scores
            .read()
            .await
            .values()
            .filter(|entry| triples.contains(&entry.triple()))
            .cloned()
            .collect();
        entries.sort_by_key(|entry| (entry.created_at, entry.score_id));

        Ok(Box::new(MemoryTripleLock {
            state: Arc::clone(&self.inner),
            triples,
            entries,
            deleted: Vec::new(),
            flag_writes: 0,
            guards,
        }))
    }

    async fn count_personal_records(
        &self,
        workout_id: Uuid,
        scaling_level: ScalingLevel,
    ) -> Result<i64> {
        Ok(self.personal_records(workout_id, scaling_level).await.len() as i64)
    }

    async fn count_better_personal_records(
        &self,
        workout_id: Uuid,
        scaling_level: ScalingLevel,
        policy: ScoringPolicy,
        target: &CanonicalMetrics,
    ) -> Result<i64> {
        let better = self
            .personal_records(workout_id, scaling_level)
            .await
            .iter()
            .filter(|entry| policy.is_strictly_better(&entry.metrics(), target))
            .count();
        Ok(better as i64)
    }

    async fn list_personal_records(
        &self,
        workout_id: Uuid,
        scaling_level: ScalingLevel,
        policy: ScoringPolicy,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<ScoreEntry>, i64)> {
        let mut records = self.personal_records(workout_id, scaling_level).await;
        let total_items = records.len() as i64;

        records.sort_by_key(|entry| {
            (
                Reverse(policy.performance(&entry.metrics())),
                entry.created_at,
                entry.score_id,
            )
        });

        let page = records
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();

        Ok((page, total_items))
    }
}

/// Working copy of the locked triples. Nothing reaches the shared maps until
/// [`TripleLock::commit`].
struct MemoryTripleLock {
    state: Arc<MemoryState>,
    triples: Vec<ScoreTriple>,
    entries: Vec<ScoreEntry>,
    deleted: Vec<Uuid>,
    flag_writes: u64,
    guards: Vec<OwnedMutexGuard<()>>,
}

impl MemoryTripleLock {
    fn ensure_locked(&self, triple: &ScoreTriple) -> Result<()> {
        if self.triples.contains(triple) {
            Ok(())
        } else {
            Err(StorageError::ConstraintViolation(format!(
                "write outside locked triples ({})",
                triple
            )))
        }
    }

    fn position(&self, score_id: Uuid) -> Result<usize> {
        self.entries
            .iter()
            .position(|entry| entry.score_id == score_id)
            .ok_or(StorageError::NotFound)
    }
}

#[async_trait]
impl TripleLock for MemoryTripleLock {
    fn entries(&self) -> &[ScoreEntry] {
        &self.entries
    }

    async fn insert_score(&mut self, entry: &NewScoreEntry) -> Result<ScoreEntry> {
        self.ensure_locked(&entry.triple())?;

        if !self.state.workouts.read().await.contains_key(&entry.workout_id) {
            return Err(StorageError::ConstraintViolation(format!(
                "workout {} does not exist",
                entry.workout_id
            )));
        }

        let now = self.state.next_timestamp().await;
        let details = &entry.details;
        let inserted = ScoreEntry {
            score_id: Uuid::new_v4(),
            athlete_id: entry.athlete_id,
            workout_id: entry.workout_id,
            score_date: details.score_date,
            scaling_level: details.scaling_level,
            time_capped: details.time_capped,
            time_seconds: details.metrics.time_seconds,
            rounds: details.metrics.rounds,
            reps: details.metrics.reps,
            max_weight_kg: details.metrics.max_weight_kg,
            total_load_kg: details.metrics.total_load_kg,
            total_distance_meters: details.metrics.total_distance_meters,
            total_calories: details.metrics.total_calories,
            mass_unit: details.units.mass_unit,
            distance_unit: details.units.distance_unit,
            time_unit: details.units.time_unit,
            is_personal_record: false,
            notes: details.notes.clone(),
            created_at: now,
            updated_at: now,
        };

        self.entries.push(inserted.clone());
        Ok(inserted)
    }

    async fn replace_score(
        &mut self,
        score_id: Uuid,
        details: &ScoreDetails,
    ) -> Result<ScoreEntry> {
        let position = self.position(score_id)?;
        let mut updated = self.entries[position].clone();
        let previous_level = updated.scaling_level;

        updated.apply(details);
        self.ensure_locked(&updated.triple())?;
        if updated.scaling_level != previous_level {
            updated.is_personal_record = false;
        }
        updated.updated_at = self.state.next_timestamp().await;

        self.entries[position] = updated.clone();
        Ok(updated)
    }

    async fn delete_score(&mut self, score_id: Uuid) -> Result<ScoreEntry> {
        let position = self.position(score_id)?;
        let deleted = self.entries.remove(position);
        self.deleted.push(deleted.score_id);
        Ok(deleted)
    }

    async fn set_personal_record(
        &mut self,
        score_id: Uuid,
        is_personal_record: bool,
    ) -> Result<()> {
        let position = self.position(score_id)?;
        let triple = self.entries[position].triple();

        if is_personal_record
            && self.entries.iter().any(|entry| {
                entry.score_id != score_id && entry.is_personal_record && entry.triple() == triple
            })
        {
            return Err(StorageError::InvariantViolation(format!(
                "second personal record flag rejected for score {}",
                score_id
            )));
        }

        self.entries[position].is_personal_record = is_personal_record;
        self.flag_writes += 1;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let MemoryTripleLock {
            state,
            entries,
            deleted,
            flag_writes,
            guards,
            ..
        } = *self;

        if state.take_conflict() {
            return Err(StorageError::Conflict(
                "concurrent write on a locked triple".to_string(),
            ));
        }

        let mut holders = HashSet::new();
        for entry in entries.iter().filter(|entry| entry.is_personal_record) {
            if !holders.insert(entry.triple()) {
                return Err(StorageError::InvariantViolation(format!(
                    "more than one personal record for {}",
                    entry.triple()
                )));
            }
        }

        {
            let mut scores = state.scores.write().await;
            for score_id in &deleted {
                scores.remove(score_id);
            }
            for entry in entries {
                scores.insert(entry.score_id, entry);
            }
        }
        state
            .personal_record_writes
            .fetch_add(flag_writes, Ordering::SeqCst);

        drop(guards);
        Ok(())
    }
}
