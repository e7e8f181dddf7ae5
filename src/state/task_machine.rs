//! Pure task state machine: pending → in-progress → completed/cancelled.
//!
//! Transition validation is separated from the counter bookkeeping so both can
//! be tested without a store.

use thiserror::Error;
use uuid::Uuid;

use crate::dao::models::{CompletionRecord, TaskEntity, TaskStatus};

/// Events the timer core applies to a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskEvent {
    /// A timer was started against the task.
    TimerStarted,
    /// A timer against the task was completed.
    TimerCompleted,
}

/// Error returned when an event cannot be applied to the task's status.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while {from:?}")]
pub struct InvalidTransition {
    /// Status the task was in when the event arrived.
    pub from: TaskStatus,
    /// The rejected event.
    pub event: TaskEvent,
}

/// Compute the status an event would move the task to, without applying it.
pub fn compute_transition(
    from: TaskStatus,
    event: TaskEvent,
) -> Result<TaskStatus, InvalidTransition> {
    let next = match (from, event) {
        // Starting a timer is idempotent on status once work is underway.
        (TaskStatus::Pending | TaskStatus::InProgress, TaskEvent::TimerStarted) => {
            TaskStatus::InProgress
        }
        (TaskStatus::InProgress, TaskEvent::TimerCompleted) => TaskStatus::Completed,
        // Further completions of an already-completed task are recorded
        // without changing status (multi-assignee tasks).
        (TaskStatus::Completed, TaskEvent::TimerCompleted) => TaskStatus::Completed,
        (from, event) => return Err(InvalidTransition { from, event }),
    };
    Ok(next)
}

/// Whether the external CRUD layer may cancel or delete the task.
///
/// A task with running timers is never cancellable.
pub fn can_cancel(task: &TaskEntity) -> bool {
    matches!(task.status, TaskStatus::Pending | TaskStatus::InProgress)
        && task.active_timers == 0
}

/// Advance the task for a freshly started timer: status, counters, implicit
/// assignee growth.
pub fn record_start(task: &mut TaskEntity, user_id: Uuid) -> Result<(), InvalidTransition> {
    task.status = compute_transition(task.status, TaskEvent::TimerStarted)?;
    task.active_timers += 1;
    task.total_timers += 1;
    if !task.assignees.contains(&user_id) {
        task.assignees.push(user_id);
    }
    Ok(())
}

/// Advance the task for a completed timer.
///
/// Returns `true` when this was the task's first completion, which is the only
/// one that flips `status` and stamps `completed_at`.
pub fn record_completion(
    task: &mut TaskEntity,
    record: CompletionRecord,
) -> Result<bool, InvalidTransition> {
    let next = compute_transition(task.status, TaskEvent::TimerCompleted)?;
    let first = task.status != TaskStatus::Completed;
    task.status = next;
    if first {
        task.completed_at = Some(record.completed_at);
    }
    task.active_timers = task.active_timers.saturating_sub(1);
    task.completed_by.push(record);
    Ok(first)
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime};

    use super::*;

    fn task(status: TaskStatus) -> TaskEntity {
        TaskEntity {
            id: Uuid::new_v4(),
            title: "write report".into(),
            created_by: Uuid::new_v4(),
            group_id: None,
            status,
            active_timers: 0,
            total_timers: 0,
            due_date: SystemTime::UNIX_EPOCH + Duration::from_secs(3_600),
            assignees: Vec::new(),
            completed_by: Vec::new(),
            completed_at: None,
        }
    }

    fn completion(user_id: Uuid) -> CompletionRecord {
        CompletionRecord {
            user_id,
            completed_at: SystemTime::UNIX_EPOCH + Duration::from_secs(600),
            time_spent_minutes: 10,
            completed_on_time: true,
        }
    }

    #[test]
    fn start_moves_pending_to_in_progress() {
        assert_eq!(
            compute_transition(TaskStatus::Pending, TaskEvent::TimerStarted),
            Ok(TaskStatus::InProgress)
        );
    }

    #[test]
    fn start_is_idempotent_on_in_progress() {
        assert_eq!(
            compute_transition(TaskStatus::InProgress, TaskEvent::TimerStarted),
            Ok(TaskStatus::InProgress)
        );
    }

    #[test]
    fn start_rejected_on_terminal_statuses() {
        for status in [TaskStatus::Completed, TaskStatus::Cancelled] {
            let err = compute_transition(status, TaskEvent::TimerStarted).unwrap_err();
            assert_eq!(err.from, status);
            assert_eq!(err.event, TaskEvent::TimerStarted);
        }
    }

    #[test]
    fn completion_rejected_on_cancelled_task() {
        assert!(compute_transition(TaskStatus::Cancelled, TaskEvent::TimerCompleted).is_err());
    }

    #[test]
    fn record_start_grows_counters_and_assignees() {
        let mut task = task(TaskStatus::Pending);
        let user = Uuid::new_v4();

        record_start(&mut task, user).unwrap();
        record_start(&mut task, user).unwrap();

        assert_eq!(task.status, TaskStatus::InProgress);
        assert_eq!(task.active_timers, 2);
        assert_eq!(task.total_timers, 2);
        assert_eq!(task.assignees, vec![user]);
    }

    #[test]
    fn first_completion_flips_status_and_stamps_completed_at() {
        let mut task = task(TaskStatus::InProgress);
        task.active_timers = 1;

        let first = record_completion(&mut task, completion(Uuid::new_v4())).unwrap();

        assert!(first);
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.active_timers, 0);
        assert!(task.completed_at.is_some());
        assert_eq!(task.completed_by.len(), 1);
    }

    #[test]
    fn second_completion_is_recorded_without_flipping_status() {
        let mut task = task(TaskStatus::InProgress);
        task.active_timers = 2;

        record_completion(&mut task, completion(Uuid::new_v4())).unwrap();
        let completed_at = task.completed_at;
        let first = record_completion(&mut task, completion(Uuid::new_v4())).unwrap();

        assert!(!first);
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.completed_at, completed_at);
        assert_eq!(task.completed_by.len(), 2);
    }

    #[test]
    fn active_timers_never_goes_negative() {
        let mut task = task(TaskStatus::InProgress);
        task.active_timers = 0;

        record_completion(&mut task, completion(Uuid::new_v4())).unwrap();
        assert_eq!(task.active_timers, 0);
    }

    #[test]
    fn cancellation_precondition_requires_no_active_timers() {
        let mut task = task(TaskStatus::InProgress);
        assert!(can_cancel(&task));

        task.active_timers = 1;
        assert!(!can_cancel(&task));

        task.active_timers = 0;
        task.status = TaskStatus::Completed;
        assert!(!can_cancel(&task));
    }
}
