//! Work-timer lifecycle: start, complete, active lookup and task history.
//!
//! Within one call, store mutations happen before the index mutation and
//! before any event leaves the room hub. A subscriber that observes a
//! broadcast can therefore rely on the underlying record being durable.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dao::{
        models::{CompletionRecord, TaskEntity, TimerEntity, TimerPhase},
        tracker_store::TrackerStore,
    },
    dto::{
        common::{PageMeta, PageQuery, TimerPage},
        events::{TimerCompletedEvent, TimerStartedEvent},
        format_system_time,
        timer::{ActiveTimerResponse, CompleteTimerRequest, TimerCompletionView, TimerView},
    },
    error::ServiceError,
    services::room_events,
    state::{
        ActiveTimerKey, SharedState,
        clock::minutes_between,
        task_machine::{self, TaskEvent},
    },
};

/// Start a work timer for `caller` on a task.
///
/// At most one active timer may exist per user; a second start attempt fails
/// with `Conflict` without touching the store. Starting a timer on a pending
/// task moves it to in-progress and implicitly assigns the caller.
pub async fn start_timer(
    state: &SharedState,
    caller: Uuid,
    task_id: Uuid,
) -> Result<TimerView, ServiceError> {
    let store = state.require_store().await?;

    let reservation = match state.active_timers().try_reserve(caller) {
        Some(reservation) => reservation,
        // The slot is taken. Either a timer is on record, or the slot is
        // stale, or another start call is racing us.
        None => {
            if let Some(timer) = store.find_active_timer(caller).await? {
                state.active_timers().bind(
                    caller,
                    ActiveTimerKey {
                        task_id: timer.task_id,
                        timer_id: timer.id,
                    },
                );
                return Err(active_timer_conflict(&timer));
            }
            // Store says no active timer. A bound entry is stale and gets
            // repaired; a bare reservation means another start is in flight.
            if state.active_timers().lookup(caller).is_some() {
                state.active_timers().clear(caller);
            }
            state
                .active_timers()
                .try_reserve(caller)
                .ok_or_else(|| ServiceError::Conflict("another timer start is in flight".into()))?
        }
    };

    // The reservation shields us from concurrent starts, but a durable timer
    // the index never saw may still exist. Store stays authoritative.
    if let Some(timer) = store.find_active_timer(caller).await? {
        let conflict = active_timer_conflict(&timer);
        reservation.commit(ActiveTimerKey {
            task_id: timer.task_id,
            timer_id: timer.id,
        });
        return Err(conflict);
    }

    let mut task = store
        .find_task(task_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("task `{task_id}` not found")))?;

    task_machine::compute_transition(task.status, TaskEvent::TimerStarted)?;
    authorize_worker(&store, &task, caller).await?;

    let now = state.clock().now();
    let timer = TimerEntity {
        id: Uuid::new_v4(),
        task_id,
        user_id: caller,
        group_id: task.group_id,
        started_at: now,
        phase: TimerPhase::Active,
        notes: String::new(),
    };

    task_machine::record_start(&mut task, caller)?;

    // Second guard: the store-level uniqueness constraint turns a lost race
    // into a unique violation, surfaced as Conflict.
    store.insert_timer(timer.clone()).await?;
    if let Err(err) = store.save_task(task).await {
        // Undo the insert so the store never holds a timer the task counters
        // do not account for. The event has not been emitted yet, so nothing
        // outside this call observed the timer.
        if let Err(rollback) = store.delete_timer(timer.id).await {
            warn!(timer_id = %timer.id, error = %rollback, "timer rollback failed after task save error");
        }
        return Err(err.into());
    }

    reservation.commit(ActiveTimerKey {
        task_id,
        timer_id: timer.id,
    });

    info!(user_id = %caller, task_id = %task_id, timer_id = %timer.id, "timer started");
    room_events::broadcast_timer_started(
        state,
        &TimerStartedEvent {
            timer_id: timer.id,
            task_id,
            user_id: caller,
            group_id: timer.group_id,
            started_at: format_system_time(now),
        },
    );

    Ok(TimerView::from_entity(&timer, now))
}

/// Complete the caller's active timer.
///
/// Stamps the duration and on-time flag, advances the task, folds the
/// completion into user and group statistics, then announces it.
pub async fn complete_timer(
    state: &SharedState,
    caller: Uuid,
    request: CompleteTimerRequest,
) -> Result<TimerCompletionView, ServiceError> {
    let store = state.require_store().await?;

    let mut timer = locate_active_timer(state, &store, caller)
        .await?
        .ok_or_else(|| ServiceError::NotFound("no active timer".into()))?;

    // An orphaned timer (its task deleted underneath it) completes nothing:
    // the timer stays active on record for operators to inspect.
    let mut task = store
        .find_task(timer.task_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("task `{}` not found", timer.task_id)))?;

    // Validate the transition before any store write.
    task_machine::compute_transition(task.status, TaskEvent::TimerCompleted)?;

    let now = state.clock().now();
    let duration_minutes = minutes_between(timer.started_at, now);
    let completed_on_time = now <= task.due_date;

    let previous = timer.clone();
    timer.phase = TimerPhase::Completed {
        ended_at: now,
        duration_minutes,
        completed_on_time,
    };
    timer.notes = request.notes.unwrap_or_default();
    store.save_timer(timer.clone()).await?;

    let record = CompletionRecord {
        user_id: caller,
        completed_at: now,
        time_spent_minutes: duration_minutes,
        completed_on_time,
    };
    let task_completed = task_machine::record_completion(&mut task, record.clone())?;
    if let Err(err) = store.save_task(task.clone()).await {
        // Restore the timer to its active state so the whole operation
        // aborts without a half-committed completion.
        if let Err(rollback) = store.save_timer(previous).await {
            warn!(timer_id = %timer.id, error = %rollback, "timer rollback failed after task save error");
        }
        return Err(err.into());
    }

    crate::services::stats_service::record_completion_stats(state, &store, &record, task.group_id)
        .await?;

    state.active_timers().clear(caller);

    info!(
        user_id = %caller,
        timer_id = %timer.id,
        duration_minutes,
        completed_on_time,
        "timer completed"
    );
    room_events::broadcast_timer_completed(
        state,
        &TimerCompletedEvent {
            timer_id: timer.id,
            task_id: task.id,
            user_id: caller,
            group_id: task.group_id,
            duration_minutes,
            completed_on_time,
            task_status: task.status,
            task_completed,
            ended_at: format_system_time(now),
        },
    );

    Ok(TimerCompletionView {
        timer: TimerView::from_entity(&timer, now),
        task_status: task.status,
        task_completed,
    })
}

/// The caller's active timer, if any, with its live duration.
pub async fn get_active_timer(
    state: &SharedState,
    caller: Uuid,
) -> Result<ActiveTimerResponse, ServiceError> {
    let store = state.require_store().await?;
    let timer = locate_active_timer(state, &store, caller).await?;
    let now = state.clock().now();

    Ok(ActiveTimerResponse {
        timer: timer.map(|timer| TimerView::from_entity(&timer, now)),
    })
}

/// One page of a task's timers, newest first.
///
/// Access mirrors `start_timer`: only users who could work the task may read
/// its history.
pub async fn list_task_timers(
    state: &SharedState,
    caller: Uuid,
    task_id: Uuid,
    query: PageQuery,
) -> Result<TimerPage, ServiceError> {
    let store = state.require_store().await?;
    let task = store
        .find_task(task_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("task `{task_id}` not found")))?;
    authorize_worker(&store, &task, caller).await?;

    let config = state.config();
    let page = query.page.unwrap_or(1).max(1);
    let limit = query
        .limit
        .unwrap_or(config.default_page_limit)
        .clamp(1, config.max_page_limit);
    let offset = (page - 1).saturating_mul(limit);

    let (timers, total_items) = store.list_task_timers(task_id, offset, limit).await?;
    let now = state.clock().now();

    Ok(TimerPage {
        items: timers
            .iter()
            .map(|timer| TimerView::from_entity(timer, now))
            .collect(),
        meta: PageMeta::new(page, limit, total_items),
    })
}

/// Resolve the caller's active timer, repairing the index along the way.
///
/// The index is consulted first; whenever it disagrees with the store it is
/// corrected from the store's answer.
async fn locate_active_timer(
    state: &SharedState,
    store: &Arc<dyn TrackerStore>,
    user_id: Uuid,
) -> Result<Option<TimerEntity>, ServiceError> {
    if let Some(key) = state.active_timers().lookup(user_id) {
        match store.find_timer(key.timer_id).await? {
            Some(timer) if timer.is_active() => return Ok(Some(timer)),
            _ => {
                warn!(user_id = %user_id, timer_id = %key.timer_id, "dropping stale active-timer index entry");
                state.active_timers().clear(user_id);
            }
        }
    }

    match store.find_active_timer(user_id).await? {
        Some(timer) => {
            state.active_timers().bind(
                user_id,
                ActiveTimerKey {
                    task_id: timer.task_id,
                    timer_id: timer.id,
                },
            );
            Ok(Some(timer))
        }
        None => Ok(None),
    }
}

/// Creator, assignees, the group's members and its leader may work a task.
async fn authorize_worker(
    store: &Arc<dyn TrackerStore>,
    task: &TaskEntity,
    caller: Uuid,
) -> Result<(), ServiceError> {
    if task.created_by == caller || task.assignees.contains(&caller) {
        return Ok(());
    }
    if let Some(group_id) = task.group_id
        && let Some(group) = store.find_group(group_id).await?
        && (group.leader_id == caller || group.members.contains(&caller))
    {
        return Ok(());
    }
    Err(ServiceError::Forbidden(format!(
        "user `{caller}` may not work task `{}`",
        task.id
    )))
}

fn active_timer_conflict(timer: &TimerEntity) -> ServiceError {
    ServiceError::Conflict(format!(
        "an active timer already exists on task `{}`",
        timer.task_id
    ))
}
