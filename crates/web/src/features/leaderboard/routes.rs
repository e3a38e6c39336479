use axum::{Router, routing::get};
use storage::ScoreLedger;

use super::handlers::get_leaderboard;

pub fn routes() -> Router<ScoreLedger> {
    Router::new().route("/:workout_id/leaderboard", get(get_leaderboard))
}
