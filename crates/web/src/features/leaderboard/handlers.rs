use axum::{
    Json,
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};
use storage::{
    ScoreLedger,
    dto::{
        common::PaginatedResponse,
        score::{LeaderboardFilter, ScoreResponse},
    },
};
use uuid::Uuid;

use crate::error::WebResult;

#[utoipa::path(
    get,
    path = "/api/workouts/{workout_id}/leaderboard",
    params(
        ("workout_id" = Uuid, Path, description = "Workout ID"),
        LeaderboardFilter
    ),
    responses(
        (status = 200, description = "Personal records in ranking order", body = PaginatedResponse<ScoreResponse>),
        (status = 400, description = "Invalid query parameters"),
        (status = 404, description = "Workout not found")
    ),
    tag = "leaderboard"
)]
pub async fn get_leaderboard(
    State(ledger): State<ScoreLedger>,
    Path(workout_id): Path<Uuid>,
    Query(filter): Query<LeaderboardFilter>,
) -> WebResult<Response> {
    let (entries, total_items) = ledger.leaderboard(workout_id, &filter).await?;

    let response = PaginatedResponse::new(
        entries.into_iter().map(ScoreResponse::from).collect(),
        filter.page,
        filter.page_size,
        total_items,
    );

    Ok(Json(response).into_response())
}
