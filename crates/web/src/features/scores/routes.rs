use axum::{
    Router,
    routing::{get, post},
};
use storage::ScoreLedger;

use super::handlers::{compare_score, delete_score, get_score, submit_score, update_score};

pub fn routes() -> Router<ScoreLedger> {
    Router::new()
        .route("/", post(submit_score))
        .route(
            "/:score_id",
            get(get_score).put(update_score).delete(delete_score),
        )
        .route("/:score_id/comparison", get(compare_score))
}
