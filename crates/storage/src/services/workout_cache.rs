use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use lru::LruCache;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::Result;
use crate::models::Workout;
use crate::repository::ScoreStore;

const DEFAULT_CAPACITY: NonZeroUsize = match NonZeroUsize::new(1024) {
    Some(n) => n,
    None => unreachable!(),
};

#[derive(Debug, Clone)]
struct CachedWorkout {
    workout: Workout,
    /// `None` when the TTL reaches past what `Instant` can represent.
    expires_at: Option<Instant>,
}

impl CachedWorkout {
    fn is_fresh(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|expires_at| now < expires_at)
    }
}

/// Read-through cache of workout definitions with LRU eviction and a TTL.
///
/// Only the scoring type is read from cached workouts, and it does not change
/// once a workout has scores, so staleness is bounded by the TTL alone.
pub struct WorkoutCache {
    entries: Mutex<LruCache<Uuid, CachedWorkout>>,
    ttl: Duration,
}

impl WorkoutCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(DEFAULT_CAPACITY);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    pub async fn get(&self, workout_id: Uuid) -> Option<Workout> {
        let mut entries = self.entries.lock().await;

        match entries.get(&workout_id) {
            Some(cached) if cached.is_fresh(Instant::now()) => Some(cached.workout.clone()),
            Some(_) => {
                entries.pop(&workout_id);
                None
            }
            None => None,
        }
    }

    pub async fn insert(&self, workout: Workout) {
        let cached = CachedWorkout {
            expires_at: Instant::now().checked_add(self.ttl),
            workout,
        };
        self.entries
            .lock()
            .await
            .put(cached.workout.workout_id, cached);
    }

    /// Cached workout, or the store's copy which is then cached.
    pub async fn get_or_load(&self, store: &dyn ScoreStore, workout_id: Uuid) -> Result<Workout> {
        if let Some(workout) = self.get(workout_id).await {
            return Ok(workout);
        }

        let workout = store.find_workout(workout_id).await?;
        tracing::debug!("Cached workout {} ({})", workout.workout_id, workout.name);
        self.insert(workout.clone()).await;
        Ok(workout)
    }
}
