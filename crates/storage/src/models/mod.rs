pub mod score_entry;
pub mod scoring;
pub mod units;
pub mod workout;

pub use score_entry::{CanonicalMetrics, NewScoreEntry, ScoreDetails, ScoreEntry, ScoreTriple};
pub use scoring::{Performance, ScalingLevel, ScoringPolicy, ScoringType};
pub use units::{DistanceUnit, MassUnit, TimeUnit, UnitPreferences};
pub use workout::Workout;
