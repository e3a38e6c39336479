use axum::{Router, routing::post};
use storage::ScoreLedger;

use super::handlers::reconcile_workout;

pub fn routes() -> Router<ScoreLedger> {
    Router::new().route("/workouts/:workout_id/reconcile", post(reconcile_workout))
}
