use std::time::Duration;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

use super::{ScoreStore, TripleLock, lock_order};
use crate::error::{Result, StorageError};
use crate::models::{
    CanonicalMetrics, NewScoreEntry, ScalingLevel, ScoreDetails, ScoreEntry, ScoreTriple,
    ScoringPolicy, Workout,
};
use crate::repository::workout::WorkoutRepository;

macro_rules! score_columns {
    () => {
        "score_id, athlete_id, workout_id, score_date, scaling_level, time_capped, \
         time_seconds, rounds, reps, max_weight_kg, total_load_kg, total_distance_meters, \
         total_calories, mass_unit, distance_unit, time_unit, is_personal_record, notes, \
         created_at, updated_at"
    };
}

/// Postgres-backed [`ScoreStore`].
///
/// Owns a pool handle rather than borrowing one because the ledger shares the
/// store across request tasks.
#[derive(Clone)]
pub struct ScoreRepository {
    pool: PgPool,
    lock_timeout: Duration,
}

impl ScoreRepository {
    pub fn new(pool: PgPool, lock_timeout: Duration) -> Self {
        Self { pool, lock_timeout }
    }
}

#[async_trait]
impl ScoreStore for ScoreRepository {
    async fn find_workout(&self, workout_id: Uuid) -> Result<Workout> {
        WorkoutRepository::new(&self.pool).find_by_id(workout_id).await
    }

    async fn find_score(&self, score_id: Uuid) -> Result<ScoreEntry> {
        let score = sqlx::query_as::<_, ScoreEntry>(concat!(
            "SELECT ",
            score_columns!(),
            " FROM scores WHERE score_id = $1"
        ))
        .bind(score_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StorageError::NotFound)?;

        Ok(score)
    }

    async fn list_athlete_scores(
        &self,
        athlete_id: Uuid,
        workout_id: Uuid,
    ) -> Result<Vec<ScoreEntry>> {
        let scores = sqlx::query_as::<_, ScoreEntry>(concat!(
            "SELECT ",
            score_columns!(),
            " FROM scores WHERE athlete_id = $1 AND workout_id = $2",
            " ORDER BY score_date DESC, created_at DESC"
        ))
        .bind(athlete_id)
        .bind(workout_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(scores)
    }

    async fn list_triples(&self, workout_id: Uuid) -> Result<Vec<ScoreTriple>> {
        let rows: Vec<(Uuid, ScalingLevel)> = sqlx::query_as(
            r#"
            SELECT DISTINCT athlete_id, scaling_level
            FROM scores
            WHERE workout_id = $1
            ORDER BY athlete_id, scaling_level
            "#,
        )
        .bind(workout_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(athlete_id, scaling_level)| ScoreTriple {
                athlete_id,
                workout_id,
                scaling_level,
            })
            .collect())
    }

    async fn lock_triples(&self, triples: &[ScoreTriple]) -> Result<Box<dyn TripleLock>> {
        let triples = lock_order(triples);
        let mut tx = self.pool.begin().await?;

        // Bounded wait: a lock timeout surfaces as 55P03 and is retried upstream.
        sqlx::query("SELECT set_config('lock_timeout', $1, true)")
            .bind(format!("{}ms", self.lock_timeout.as_millis()))
            .execute(&mut *tx)
            .await?;

        for triple in &triples {
            sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
                .bind(triple.lock_key())
                .execute(&mut *tx)
                .await?;
        }

        let mut entries = Vec::new();
        for triple in &triples {
            let rows = sqlx::query_as::<_, ScoreEntry>(concat!(
                "SELECT ",
                score_columns!(),
                " FROM scores WHERE athlete_id = $1 AND workout_id = $2 AND scaling_level = $3",
                " ORDER BY created_at, score_id"
            ))
            .bind(triple.athlete_id)
            .bind(triple.workout_id)
            .bind(triple.scaling_level)
            .fetch_all(&mut *tx)
            .await?;
            entries.extend(rows);
        }

        Ok(Box::new(PgTripleLock {
            tx,
            triples,
            entries,
        }))
    }

    async fn count_personal_records(
        &self,
        workout_id: Uuid,
        scaling_level: ScalingLevel,
    ) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM scores
            WHERE is_personal_record AND workout_id = $1 AND scaling_level = $2
            "#,
        )
        .bind(workout_id)
        .bind(scaling_level)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn count_better_personal_records(
        &self,
        workout_id: Uuid,
        scaling_level: ScalingLevel,
        policy: ScoringPolicy,
        target: &CanonicalMetrics,
    ) -> Result<i64> {
        let mut query = QueryBuilder::new(
            "SELECT COUNT(*) FROM scores WHERE is_personal_record AND workout_id = ",
        );
        query.push_bind(workout_id);
        query.push(" AND scaling_level = ");
        query.push_bind(scaling_level);
        push_better_than(&mut query, policy, target);

        let count = query
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn list_personal_records(
        &self,
        workout_id: Uuid,
        scaling_level: ScalingLevel,
        policy: ScoringPolicy,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<ScoreEntry>, i64)> {
        let total_items = self
            .count_personal_records(workout_id, scaling_level)
            .await?;

        let mut query = QueryBuilder::new(concat!(
            "SELECT ",
            score_columns!(),
            " FROM scores WHERE is_personal_record AND workout_id = "
        ));
        query.push_bind(workout_id);
        query.push(" AND scaling_level = ");
        query.push_bind(scaling_level);
        query.push(" ORDER BY ");
        push_leaderboard_order(&mut query, policy);
        query.push(" LIMIT ");
        query.push_bind(limit);
        query.push(" OFFSET ");
        query.push_bind(offset);

        let entries = query
            .build_query_as::<ScoreEntry>()
            .fetch_all(&self.pool)
            .await?;

        Ok((entries, total_items))
    }
}

/// Appends the "strictly better than `target`" predicate for `policy`.
/// Must agree with [`ScoringPolicy::is_strictly_better`].
fn push_better_than(
    query: &mut QueryBuilder<'_, Postgres>,
    policy: ScoringPolicy,
    target: &CanonicalMetrics,
) {
    match policy {
        ScoringPolicy::LowestTime => push_threshold(query, "time_seconds", "<", target.time_seconds),
        ScoringPolicy::MostRoundsThenReps => match target.rounds {
            Some(rounds) => {
                query.push(" AND (rounds > ");
                query.push_bind(rounds);
                query.push(" OR (rounds = ");
                query.push_bind(rounds);
                query.push(" AND COALESCE(reps, 0) > ");
                query.push_bind(target.reps.unwrap_or(0));
                query.push("))");
            }
            None => {
                query.push(" AND rounds IS NOT NULL");
            }
        },
        ScoringPolicy::MostReps => push_threshold(query, "reps", ">", target.reps),
        ScoringPolicy::HeaviestWeight => {
            push_threshold(query, "max_weight_kg", ">", target.max_weight_kg)
        }
        ScoringPolicy::HighestLoad => {
            push_threshold(query, "total_load_kg", ">", target.total_load_kg)
        }
        ScoringPolicy::MostCalories => {
            push_threshold(query, "total_calories", ">", target.total_calories)
        }
        ScoringPolicy::LongestDistance => push_threshold(
            query,
            "total_distance_meters",
            ">",
            target.total_distance_meters,
        ),
        ScoringPolicy::Unranked => {
            query.push(" AND FALSE");
        }
    }
}

fn push_threshold<'args, T>(
    query: &mut QueryBuilder<'args, Postgres>,
    column: &'static str,
    op: &'static str,
    value: Option<T>,
) where
    T: 'args + sqlx::Encode<'args, Postgres> + sqlx::Type<Postgres>,
{
    match value {
        Some(value) => {
            query.push(format_args!(" AND {} {} ", column, op));
            query.push_bind(value);
        }
        // Anything with the metric beats a score without it.
        None => {
            query.push(format_args!(" AND {} IS NOT NULL", column));
        }
    }
}

fn push_leaderboard_order(query: &mut QueryBuilder<'_, Postgres>, policy: ScoringPolicy) {
    match policy {
        ScoringPolicy::LowestTime => {
            query.push("time_seconds ASC NULLS LAST, ");
        }
        ScoringPolicy::MostRoundsThenReps => {
            query.push("rounds DESC NULLS LAST, COALESCE(reps, 0) DESC, ");
        }
        ScoringPolicy::Unranked => {}
        other => {
            if let Some(column) = other.column() {
                query.push(format_args!("{} DESC NULLS LAST, ", column));
            }
        }
    }
    query.push("created_at ASC, score_id ASC");
}

struct PgTripleLock {
    tx: Transaction<'static, Postgres>,
    triples: Vec<ScoreTriple>,
    entries: Vec<ScoreEntry>,
}

impl PgTripleLock {
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
impl TripleLock for PgTripleLock {
    fn entries(&self) -> &[ScoreEntry] {
        &self.entries
    }

    async fn insert_score(&mut self, entry: &NewScoreEntry) -> Result<ScoreEntry> {
        self.ensure_locked(&entry.triple())?;
        let details = &entry.details;

        let inserted = sqlx::query_as::<_, ScoreEntry>(concat!(
            "INSERT INTO scores (athlete_id, workout_id, score_date, scaling_level, time_capped, ",
            "time_seconds, rounds, reps, max_weight_kg, total_load_kg, total_distance_meters, ",
            "total_calories, mass_unit, distance_unit, time_unit, notes) ",
            "VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16) ",
            "RETURNING ",
            score_columns!()
        ))
        .bind(entry.athlete_id)
        .bind(entry.workout_id)
        .bind(details.score_date)
        .bind(details.scaling_level)
        .bind(details.time_capped)
        .bind(details.metrics.time_seconds)
        .bind(details.metrics.rounds)
        .bind(details.metrics.reps)
        .bind(details.metrics.max_weight_kg)
        .bind(details.metrics.total_load_kg)
        .bind(details.metrics.total_distance_meters)
        .bind(details.metrics.total_calories)
        .bind(details.units.mass_unit)
        .bind(details.units.distance_unit)
        .bind(details.units.time_unit)
        .bind(&details.notes)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|error| {
            let error = StorageError::from(error);
            if error.is_foreign_key_violation() {
                StorageError::ConstraintViolation(format!(
                    "workout {} does not exist",
                    entry.workout_id
                ))
            } else {
                error
            }
        })?;

        self.entries.push(inserted.clone());
        Ok(inserted)
    }

    async fn replace_score(
        &mut self,
        score_id: Uuid,
        details: &ScoreDetails,
    ) -> Result<ScoreEntry> {
        let position = self.position(score_id)?;
        let mut moved = self.entries[position].triple();
        moved.scaling_level = details.scaling_level;
        self.ensure_locked(&moved)?;

        // SET expressions see the old row, so the CASE compares against the
        // scaling level the score is leaving.
        let updated = sqlx::query_as::<_, ScoreEntry>(concat!(
            "UPDATE scores SET score_date = $2, scaling_level = $3, time_capped = $4, ",
            "time_seconds = $5, rounds = $6, reps = $7, max_weight_kg = $8, total_load_kg = $9, ",
            "total_distance_meters = $10, total_calories = $11, mass_unit = $12, ",
            "distance_unit = $13, time_unit = $14, notes = $15, ",
            "is_personal_record = CASE WHEN scaling_level = $3 THEN is_personal_record ELSE FALSE END, ",
            "updated_at = CURRENT_TIMESTAMP ",
            "WHERE score_id = $1 RETURNING ",
            score_columns!()
        ))
        .bind(score_id)
        .bind(details.score_date)
        .bind(details.scaling_level)
        .bind(details.time_capped)
        .bind(details.metrics.time_seconds)
        .bind(details.metrics.rounds)
        .bind(details.metrics.reps)
        .bind(details.metrics.max_weight_kg)
        .bind(details.metrics.total_load_kg)
        .bind(details.metrics.total_distance_meters)
        .bind(details.metrics.total_calories)
        .bind(details.units.mass_unit)
        .bind(details.units.distance_unit)
        .bind(details.units.time_unit)
        .bind(&details.notes)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or(StorageError::NotFound)?;

        self.entries[position] = updated.clone();
        Ok(updated)
    }

    async fn delete_score(&mut self, score_id: Uuid) -> Result<ScoreEntry> {
        let position = self.position(score_id)?;

        let deleted = sqlx::query_as::<_, ScoreEntry>(concat!(
            "DELETE FROM scores WHERE score_id = $1 RETURNING ",
            score_columns!()
        ))
        .bind(score_id)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or(StorageError::NotFound)?;

        self.entries.remove(position);
        Ok(deleted)
    }

    async fn set_personal_record(
        &mut self,
        score_id: Uuid,
        is_personal_record: bool,
    ) -> Result<()> {
        let position = self.position(score_id)?;

        sqlx::query("UPDATE scores SET is_personal_record = $2 WHERE score_id = $1")
            .bind(score_id)
            .bind(is_personal_record)
            .execute(&mut *self.tx)
            .await
            .map_err(|error| {
                let error = StorageError::from(error);
                if error.is_unique_violation() {
                    StorageError::InvariantViolation(format!(
                        "second personal record flag rejected for score {}",
                        score_id
                    ))
                } else {
                    error
                }
            })?;

        self.entries[position].is_personal_record = is_personal_record;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
