use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{
        common::{PageQuery, TimerPage},
        timer::{ActiveTimerResponse, CompleteTimerRequest, TimerCompletionView, TimerView},
    },
    error::AppError,
    routes::CallerId,
    services::timer_service,
    state::SharedState,
};

/// Configure the timer lifecycle routes subtree.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/tasks/{task_id}/timers/start", post(start_timer))
        .route("/tasks/{task_id}/timers", get(list_task_timers))
        .route("/timers/complete", post(complete_timer))
        .route("/timers/active", get(get_active_timer))
}

#[utoipa::path(
    post,
    path = "/tasks/{task_id}/timers/start",
    tag = "timers",
    params(("task_id" = Uuid, Path, description = "Task to work on")),
    responses(
        (status = 200, description = "Timer started", body = TimerView),
        (status = 403, description = "Caller may not work this task"),
        (status = 404, description = "Task not found"),
        (status = 409, description = "Caller already has an active timer, or the task is terminal")
    )
)]
/// Start a work timer for the caller on the given task.
pub async fn start_timer(
    State(state): State<SharedState>,
    CallerId(caller): CallerId,
    Path(task_id): Path<Uuid>,
) -> Result<Json<TimerView>, AppError> {
    let timer = timer_service::start_timer(&state, caller, task_id).await?;
    Ok(Json(timer))
}

#[utoipa::path(
    post,
    path = "/timers/complete",
    tag = "timers",
    request_body = CompleteTimerRequest,
    responses(
        (status = 200, description = "Timer completed", body = TimerCompletionView),
        (status = 404, description = "Caller has no active timer"),
        (status = 409, description = "The task no longer accepts completions")
    )
)]
/// Complete the caller's active timer.
pub async fn complete_timer(
    State(state): State<SharedState>,
    CallerId(caller): CallerId,
    Json(payload): Json<CompleteTimerRequest>,
) -> Result<Json<TimerCompletionView>, AppError> {
    payload.validate()?;
    let completion = timer_service::complete_timer(&state, caller, payload).await?;
    Ok(Json(completion))
}

#[utoipa::path(
    get,
    path = "/timers/active",
    tag = "timers",
    responses((status = 200, description = "The caller's active timer, if any", body = ActiveTimerResponse))
)]
/// Return the caller's active timer with its live duration, or null.
pub async fn get_active_timer(
    State(state): State<SharedState>,
    CallerId(caller): CallerId,
) -> Result<Json<ActiveTimerResponse>, AppError> {
    let response = timer_service::get_active_timer(&state, caller).await?;
    Ok(Json(response))
}

#[utoipa::path(
    get,
    path = "/tasks/{task_id}/timers",
    tag = "timers",
    params(
        ("task_id" = Uuid, Path, description = "Task whose timers to list"),
        ("page" = Option<u64>, Query, description = "1-based page number"),
        ("limit" = Option<u64>, Query, description = "Page size"),
    ),
    responses(
        (status = 200, description = "One page of the task's timers, newest first", body = TimerPage),
        (status = 403, description = "Caller may not work this task"),
        (status = 404, description = "Task not found")
    )
)]
/// List the timers recorded against a task, paginated.
pub async fn list_task_timers(
    State(state): State<SharedState>,
    CallerId(caller): CallerId,
    Path(task_id): Path<Uuid>,
    Query(query): Query<PageQuery>,
) -> Result<Json<TimerPage>, AppError> {
    let page = timer_service::list_task_timers(&state, caller, task_id, query).await?;
    Ok(Json(page))
}
