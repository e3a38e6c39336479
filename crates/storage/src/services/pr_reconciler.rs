use std::cmp::Reverse;

use uuid::Uuid;

use crate::error::{Result, StorageError};
use crate::models::{NewScoreEntry, ScoreDetails, ScoreEntry, ScoreTriple, ScoringPolicy};
use crate::repository::{ScoreStore, lock_order};

/// Flag changes that bring one triple back to a single, correct personal record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    pub demote: Vec<Uuid>,
    pub promote: Option<Uuid>,
}

impl ReconcilePlan {
    pub fn is_empty(&self) -> bool {
        self.demote.is_empty() && self.promote.is_none()
    }

    pub fn changes(&self) -> usize {
        self.demote.len() + usize::from(self.promote.is_some())
    }
}

/// Best entry of one triple under `policy`.
///
/// Entries without the deciding metric never hold the record. On equal
/// performance the current holder keeps it, otherwise the earliest entry wins.
pub fn select_personal_record(entries: &[ScoreEntry], policy: ScoringPolicy) -> Option<&ScoreEntry> {
    entries
        .iter()
        .filter_map(|entry| policy.performance(&entry.metrics()).map(|perf| (perf, entry)))
        .max_by_key(|(perf, entry)| {
            (
                *perf,
                entry.is_personal_record,
                Reverse(entry.created_at),
                Reverse(entry.score_id),
            )
        })
        .map(|(_, entry)| entry)
}

/// Recomputes the flags of one triple from scratch. Yields an empty plan when
/// the flags are already right.
pub fn plan(entries: &[ScoreEntry], policy: ScoringPolicy) -> ReconcilePlan {
    let best = select_personal_record(entries, policy);

    ReconcilePlan {
        demote: entries
            .iter()
            .filter(|entry| entry.is_personal_record)
            .filter(|entry| best.is_none_or(|best| best.score_id != entry.score_id))
            .map(|entry| entry.score_id)
            .collect(),
        promote: best
            .filter(|best| !best.is_personal_record)
            .map(|best| best.score_id),
    }
}

/// The write carried out inside the same exclusive unit as the reconciliation.
#[derive(Debug, Clone, Copy)]
pub enum ScoreWrite<'a> {
    Insert(&'a NewScoreEntry),
    Replace(Uuid, &'a ScoreDetails),
    Delete(Uuid),
    Nothing,
}

#[derive(Debug, Clone)]
pub struct ReconcileOutcome {
    /// The written entry with its final flag. For a delete, the removed entry.
    pub written: Option<ScoreEntry>,
    pub changed_flags: usize,
}

/// Applies one write and re-derives the personal record of every affected
/// triple while holding all of them.
pub struct PrReconciler<'a> {
    store: &'a dyn ScoreStore,
    policy: ScoringPolicy,
}

impl<'a> PrReconciler<'a> {
    pub fn new(store: &'a dyn ScoreStore, policy: ScoringPolicy) -> Self {
        Self { store, policy }
    }

    /// One full cycle: lock, write, reconcile, commit. A failure anywhere
    /// leaves storage untouched, so the caller may simply run it again.
    pub async fn run(
        &self,
        triples: &[ScoreTriple],
        write: ScoreWrite<'_>,
    ) -> Result<ReconcileOutcome> {
        let triples = lock_order(triples);
        let mut lock = self.store.lock_triples(&triples).await?;

        // The score left the triples it was read from before the lock was taken.
        if let ScoreWrite::Replace(score_id, _) | ScoreWrite::Delete(score_id) = write
            && !lock.entries().iter().any(|entry| entry.score_id == score_id)
        {
            return Err(StorageError::Conflict(format!(
                "score {} moved while waiting for its triple",
                score_id
            )));
        }

        let mut written = match write {
            ScoreWrite::Insert(entry) => Some(lock.insert_score(entry).await?),
            ScoreWrite::Replace(score_id, details) => {
                Some(lock.replace_score(score_id, details).await?)
            }
            ScoreWrite::Delete(score_id) => Some(lock.delete_score(score_id).await?),
            ScoreWrite::Nothing => None,
        };

        let mut changed_flags = 0;
        for triple in &triples {
            let entries: Vec<ScoreEntry> = lock
                .entries()
                .iter()
                .filter(|entry| entry.triple() == *triple)
                .cloned()
                .collect();

            let plan = plan(&entries, self.policy);
            if plan.is_empty() {
                continue;
            }

            // Demote first: storage rejects two flags in one triple at any point.
            for score_id in &plan.demote {
                lock.set_personal_record(*score_id, false).await?;
            }
            if let Some(score_id) = plan.promote {
                lock.set_personal_record(score_id, true).await?;
            }

            tracing::debug!(
                "Reconciled personal record for {}: demoted {}, promoted {:?}",
                triple,
                plan.demote.len(),
                plan.promote
            );
            changed_flags += plan.changes();
        }

        if let Some(entry) = written.as_mut()
            && let Some(current) = lock
                .entries()
                .iter()
                .find(|current| current.score_id == entry.score_id)
        {
            *entry = current.clone();
        }

        lock.commit().await?;

        Ok(ReconcileOutcome {
            written,
            changed_flags,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};
    use rust_decimal::Decimal;

    use crate::models::{DistanceUnit, MassUnit, ScalingLevel, TimeUnit};

    fn at(second: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 1)
            .unwrap()
            .and_hms_opt(12, 0, second)
            .unwrap()
    }

    fn entry(created: u32, time_seconds: Option<i32>, is_personal_record: bool) -> ScoreEntry {
        ScoreEntry {
            score_id: Uuid::new_v4(),
            athlete_id: Uuid::nil(),
            workout_id: Uuid::nil(),
            score_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            scaling_level: ScalingLevel::Rx,
            time_capped: false,
            time_seconds,
            rounds: None,
            reps: None,
            max_weight_kg: None,
            total_load_kg: None,
            total_distance_meters: None,
            total_calories: None,
            mass_unit: MassUnit::Kilograms,
            distance_unit: DistanceUnit::Meters,
            time_unit: TimeUnit::Minutes,
            is_personal_record,
            notes: None,
            created_at: at(created),
            updated_at: at(created),
        }
    }

    #[test]
    fn test_new_best_takes_flag() {
        let old = entry(0, Some(330), true);
        let new = entry(1, Some(290), false);
        let entries = vec![old.clone(), new.clone()];

        let plan = plan(&entries, ScoringPolicy::LowestTime);

        assert_eq!(plan.demote, vec![old.score_id]);
        assert_eq!(plan.promote, Some(new.score_id));
        assert_eq!(plan.changes(), 2);
    }

    #[test]
    fn test_consistent_triple_needs_nothing() {
        let entries = vec![entry(0, Some(330), false), entry(1, Some(290), true)];
        assert!(plan(&entries, ScoringPolicy::LowestTime).is_empty());
    }

    #[test]
    fn test_tie_keeps_current_holder() {
        let first = entry(0, Some(300), false);
        let holder = entry(1, Some(300), true);
        let entries = vec![first, holder.clone()];

        let best = select_personal_record(&entries, ScoringPolicy::LowestTime).unwrap();
        assert_eq!(best.score_id, holder.score_id);
    }

    #[test]
    fn test_tie_without_holder_goes_to_earliest() {
        let first = entry(0, Some(300), false);
        let second = entry(1, Some(300), false);
        let entries = vec![second, first.clone()];

        let best = select_personal_record(&entries, ScoringPolicy::LowestTime).unwrap();
        assert_eq!(best.score_id, first.score_id);
    }

    #[test]
    fn test_entries_without_metric_are_excluded() {
        let stray = entry(0, None, true);
        let timed = entry(1, Some(400), false);
        let entries = vec![stray.clone(), timed.clone()];

        let plan = plan(&entries, ScoringPolicy::LowestTime);
        assert_eq!(plan.demote, vec![stray.score_id]);
        assert_eq!(plan.promote, Some(timed.score_id));

        let only_untimed = vec![entry(0, None, true)];
        let plan = super::plan(&only_untimed, ScoringPolicy::LowestTime);
        assert_eq!(plan.demote.len(), 1);
        assert_eq!(plan.promote, None);
    }

    #[test]
    fn test_unranked_clears_flags() {
        let mut lifted = entry(0, None, true);
        lifted.max_weight_kg = Some(Decimal::new(100, 0));
        let entries = vec![lifted.clone(), entry(1, Some(200), false)];

        let plan = plan(&entries, ScoringPolicy::Unranked);
        assert_eq!(plan.demote, vec![lifted.score_id]);
        assert_eq!(plan.promote, None);
    }
}
