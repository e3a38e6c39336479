use axum::{
    Json,
    extract::{Path, State},
    response::{IntoResponse, Response},
};
use storage::{ScoreLedger, dto::score::ScoreResponse};
use uuid::Uuid;

use crate::error::WebResult;

#[utoipa::path(
    get,
    path = "/api/athletes/{athlete_id}/workouts/{workout_id}/scores",
    params(
        ("athlete_id" = Uuid, Path, description = "Athlete ID"),
        ("workout_id" = Uuid, Path, description = "Workout ID")
    ),
    responses(
        (status = 200, description = "Athlete's scores on the workout, newest first", body = Vec<ScoreResponse>),
        (status = 404, description = "Workout not found")
    ),
    tag = "athletes"
)]
pub async fn list_athlete_scores(
    State(ledger): State<ScoreLedger>,
    Path((athlete_id, workout_id)): Path<(Uuid, Uuid)>,
) -> WebResult<Response> {
    let scores = ledger.list_athlete_scores(athlete_id, workout_id).await?;

    let response: Vec<ScoreResponse> = scores.into_iter().map(ScoreResponse::from).collect();

    Ok(Json(response).into_response())
}
