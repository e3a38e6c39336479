use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use storage::{
    ScoreLedger,
    dto::score::{ScoreComparisonResponse, ScoreResponse, SubmitScoreRequest, UpdateScoreRequest},
};
use uuid::Uuid;

use crate::error::WebResult;

#[utoipa::path(
    post,
    path = "/api/scores",
    request_body = SubmitScoreRequest,
    responses(
        (status = 201, description = "Score recorded, personal record reconciled", body = ScoreResponse),
        (status = 400, description = "Validation error"),
        (status = 404, description = "Workout not found"),
        (status = 409, description = "Concurrent writes kept conflicting, try again"),
        (status = 422, description = "Required metric for the workout's scoring type is missing")
    ),
    tag = "scores"
)]
pub async fn submit_score(
    State(ledger): State<ScoreLedger>,
    Json(req): Json<SubmitScoreRequest>,
) -> WebResult<Response> {
    let score = ledger.submit_score(&req).await?;

    Ok((StatusCode::CREATED, Json(ScoreResponse::from(score))).into_response())
}

#[utoipa::path(
    get,
    path = "/api/scores/{score_id}",
    params(
        ("score_id" = Uuid, Path, description = "Score ID")
    ),
    responses(
        (status = 200, description = "Score found", body = ScoreResponse),
        (status = 404, description = "Score not found")
    ),
    tag = "scores"
)]
pub async fn get_score(
    State(ledger): State<ScoreLedger>,
    Path(score_id): Path<Uuid>,
) -> WebResult<Response> {
    let score = ledger.get_score(score_id).await?;

    Ok(Json(ScoreResponse::from(score)).into_response())
}

#[utoipa::path(
    put,
    path = "/api/scores/{score_id}",
    params(
        ("score_id" = Uuid, Path, description = "Score ID")
    ),
    request_body = UpdateScoreRequest,
    responses(
        (status = 200, description = "Score updated, personal records reconciled", body = ScoreResponse),
        (status = 400, description = "Validation error"),
        (status = 404, description = "Score not found"),
        (status = 409, description = "Concurrent writes kept conflicting, try again"),
        (status = 422, description = "Required metric for the workout's scoring type is missing")
    ),
    tag = "scores"
)]
pub async fn update_score(
    State(ledger): State<ScoreLedger>,
    Path(score_id): Path<Uuid>,
    Json(req): Json<UpdateScoreRequest>,
) -> WebResult<Response> {
    let score = ledger.update_score(score_id, &req).await?;

    Ok(Json(ScoreResponse::from(score)).into_response())
}

#[utoipa::path(
    delete,
    path = "/api/scores/{score_id}",
    params(
        ("score_id" = Uuid, Path, description = "Score ID")
    ),
    responses(
        (status = 204, description = "Score deleted, personal record reconciled"),
        (status = 404, description = "Score not found"),
        (status = 409, description = "Concurrent writes kept conflicting, try again")
    ),
    tag = "scores"
)]
pub async fn delete_score(
    State(ledger): State<ScoreLedger>,
    Path(score_id): Path<Uuid>,
) -> WebResult<Response> {
    ledger.delete_score(score_id).await?;

    Ok(StatusCode::NO_CONTENT.into_response())
}

#[utoipa::path(
    get,
    path = "/api/scores/{score_id}/comparison",
    params(
        ("score_id" = Uuid, Path, description = "Score ID")
    ),
    responses(
        (status = 200, description = "Rank and percentile among personal records", body = ScoreComparisonResponse),
        (status = 404, description = "Score not found")
    ),
    tag = "scores"
)]
pub async fn compare_score(
    State(ledger): State<ScoreLedger>,
    Path(score_id): Path<Uuid>,
) -> WebResult<Response> {
    let comparison = ledger.compare_score(score_id).await?;

    Ok(Json(ScoreComparisonResponse {
        score_id,
        rank: comparison.rank,
        total: comparison.total,
        percentile: comparison.percentile,
    })
    .into_response())
}
