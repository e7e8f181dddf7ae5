use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::{TaskStatus, TimerEntity, TimerPhase},
    state::clock::minutes_between,
};

/// Wire representation of a work timer.
#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct TimerView {
    pub id: Uuid,
    pub task_id: Uuid,
    pub user_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<Uuid>,
    /// RFC 3339 timestamp of when the timer started.
    pub started_at: String,
    pub is_active: bool,
    pub is_completed: bool,
    /// RFC 3339 completion timestamp, present once completed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<String>,
    /// Recorded duration in minutes, present once completed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_on_time: Option<bool>,
    /// Minutes elapsed so far, present while the timer is still running.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub live_duration_minutes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl TimerView {
    /// Build the wire view of a timer; `now` feeds the live duration of a
    /// still-running timer.
    pub fn from_entity(timer: &TimerEntity, now: SystemTime) -> Self {
        let (is_active, ended_at, duration_minutes, completed_on_time, live_duration_minutes) =
            match &timer.phase {
                TimerPhase::Active => (
                    true,
                    None,
                    None,
                    None,
                    Some(minutes_between(timer.started_at, now)),
                ),
                TimerPhase::Completed {
                    ended_at,
                    duration_minutes,
                    completed_on_time,
                } => (
                    false,
                    Some(super::format_system_time(*ended_at)),
                    Some(*duration_minutes),
                    Some(*completed_on_time),
                    None,
                ),
            };

        Self {
            id: timer.id,
            task_id: timer.task_id,
            user_id: timer.user_id,
            group_id: timer.group_id,
            started_at: super::format_system_time(timer.started_at),
            is_active,
            is_completed: !is_active,
            ended_at,
            duration_minutes,
            completed_on_time,
            live_duration_minutes,
            notes: (!timer.notes.is_empty()).then(|| timer.notes.clone()),
        }
    }
}

/// Response for the active-timer lookup; `timer` is null when none is running.
#[derive(Debug, Serialize, ToSchema)]
pub struct ActiveTimerResponse {
    pub timer: Option<TimerView>,
}

/// Outcome of completing a timer, including the task-level effects.
#[derive(Debug, Serialize, ToSchema)]
pub struct TimerCompletionView {
    pub timer: TimerView,
    /// Task status after this completion was applied.
    pub task_status: TaskStatus,
    /// Whether this completion was the one that completed the task.
    pub task_completed: bool,
}

/// Body accepted by the complete-timer endpoint.
#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
pub struct CompleteTimerRequest {
    /// Free-form note attached to the completed timer.
    #[validate(length(max = 500, message = "notes must be at most 500 characters"))]
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn active_timer(started_at: SystemTime) -> TimerEntity {
        TimerEntity {
            id: Uuid::new_v4(),
            task_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            group_id: None,
            started_at,
            phase: TimerPhase::Active,
            notes: String::new(),
        }
    }

    #[test]
    fn active_timer_exposes_live_duration() {
        let start = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        let view = TimerView::from_entity(&active_timer(start), start + Duration::from_secs(600));

        assert!(view.is_active);
        assert!(!view.is_completed);
        assert_eq!(view.live_duration_minutes, Some(10));
        assert_eq!(view.duration_minutes, None);
        assert_eq!(view.ended_at, None);
    }

    #[test]
    fn completed_timer_exposes_recorded_duration() {
        let start = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        let mut timer = active_timer(start);
        timer.phase = TimerPhase::Completed {
            ended_at: start + Duration::from_secs(1_500),
            duration_minutes: 25,
            completed_on_time: true,
        };

        let view = TimerView::from_entity(&timer, start + Duration::from_secs(9_999));
        assert!(!view.is_active);
        assert!(view.is_completed);
        assert_eq!(view.duration_minutes, Some(25));
        assert_eq!(view.completed_on_time, Some(true));
        assert_eq!(view.live_duration_minutes, None);
    }

    #[test]
    fn oversized_notes_fail_validation() {
        let request = CompleteTimerRequest {
            notes: Some("x".repeat(501)),
        };
        assert!(request.validate().is_err());

        let request = CompleteTimerRequest {
            notes: Some("wrapped up the review".into()),
        };
        assert!(request.validate().is_ok());
    }
}
