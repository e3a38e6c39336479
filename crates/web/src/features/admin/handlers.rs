use axum::{
    Json,
    extract::{Path, State},
    response::{IntoResponse, Response},
};
use storage::{ScoreLedger, dto::score::ReconcileWorkoutResponse};
use uuid::Uuid;

use crate::error::WebResult;

/// Re-derives every personal record flag of a workout. Meant for use after
/// bulk imports or manual data repair.
#[utoipa::path(
    post,
    path = "/api/admin/workouts/{workout_id}/reconcile",
    params(
        ("workout_id" = Uuid, Path, description = "Workout ID")
    ),
    responses(
        (status = 200, description = "Workout reconciled", body = ReconcileWorkoutResponse),
        (status = 404, description = "Workout not found"),
        (status = 409, description = "Concurrent writes kept conflicting, try again")
    ),
    tag = "admin"
)]
pub async fn reconcile_workout(
    State(ledger): State<ScoreLedger>,
    Path(workout_id): Path<Uuid>,
) -> WebResult<Response> {
    let summary = ledger.reconcile_workout(workout_id).await?;

    Ok(Json(summary).into_response())
}
