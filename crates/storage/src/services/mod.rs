pub mod pr_reconciler;
pub mod ranking;
pub mod retry;
pub mod score_ledger;
pub mod workout_cache;

pub use pr_reconciler::{PrReconciler, ReconcileOutcome, ReconcilePlan, ScoreWrite};
pub use ranking::{RankingEngine, ScoreComparison};
pub use retry::RetryPolicy;
pub use score_ledger::{LedgerSettings, ScoreLedger};
pub use workout_cache::WorkoutCache;
