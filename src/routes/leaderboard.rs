use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use uuid::Uuid;

use crate::{
    dto::leaderboard::{LeaderboardQuery, LeaderboardResponse, TimeFrame},
    error::AppError,
    services::leaderboard_service,
    state::SharedState,
};

/// Configure the leaderboard routes subtree.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/groups/{group_id}/leaderboard", get(group_leaderboard))
        .route("/leaderboard", get(global_leaderboard))
}

#[utoipa::path(
    get,
    path = "/groups/{group_id}/leaderboard",
    tag = "leaderboard",
    params(
        ("group_id" = Uuid, Path, description = "Group to rank"),
        ("time_frame" = Option<TimeFrame>, Query, description = "Window to rank over"),
    ),
    responses(
        (status = 200, description = "Live leaderboard for the group", body = LeaderboardResponse),
        (status = 404, description = "Group not found")
    )
)]
/// Compute the group's leaderboard over the requested time frame.
pub async fn group_leaderboard(
    State(state): State<SharedState>,
    Path(group_id): Path<Uuid>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<LeaderboardResponse>, AppError> {
    let board = leaderboard_service::group_leaderboard(&state, group_id, query).await?;
    Ok(Json(board))
}

#[utoipa::path(
    get,
    path = "/leaderboard",
    tag = "leaderboard",
    params(
        ("time_frame" = Option<TimeFrame>, Query, description = "Window to rank over"),
        ("limit" = Option<u64>, Query, description = "Maximum rows returned"),
    ),
    responses((status = 200, description = "Cached global leaderboard", body = LeaderboardResponse))
)]
/// Return the global leaderboard across public groups, served from cache when
/// fresh.
pub async fn global_leaderboard(
    State(state): State<SharedState>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<LeaderboardResponse>, AppError> {
    let board = leaderboard_service::global_leaderboard(&state, query).await?;
    Ok(Json(board))
}
