use axum::{Router, routing::get};
use storage::ScoreLedger;

use super::handlers::list_athlete_scores;

pub fn routes() -> Router<ScoreLedger> {
    Router::new().route(
        "/:athlete_id/workouts/:workout_id/scores",
        get(list_athlete_scores),
    )
}
