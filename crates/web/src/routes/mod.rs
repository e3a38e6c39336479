use axum::Router;
use storage::ScoreLedger;

use crate::features::{admin, athletes, leaderboard, scores};

pub fn create_router(ledger: ScoreLedger) -> Router {
    Router::new()
        .nest("/api/scores", scores::routes::routes())
        .nest("/api/athletes", athletes::routes::routes())
        .nest("/api/workouts", leaderboard::routes::routes())
        .nest("/api/admin", admin::routes::routes())
        .with_state(ledger)
}
