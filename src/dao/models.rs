use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

/// Lifecycle status of a task, advanced by the task state machine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, utoipa::ToSchema)]
pub enum TaskStatus {
    /// No timer has ever run against the task.
    #[serde(rename = "pending")]
    Pending,
    /// At least one timer has started; work is underway.
    #[serde(rename = "in-progress")]
    InProgress,
    /// The task received its first completion.
    #[serde(rename = "completed")]
    Completed,
    /// The task was cancelled by the external CRUD layer.
    #[serde(rename = "cancelled")]
    Cancelled,
}

/// State of a timer once it leaves creation: running or finished, never both.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum TimerPhase {
    /// The timer is running; no end time is recorded yet.
    Active,
    /// The timer is finished and immutable from here on.
    Completed {
        /// Instant the timer was stopped.
        ended_at: SystemTime,
        /// Whole minutes between start and end, rounded to nearest.
        duration_minutes: u64,
        /// Whether the end time preceded the task due date, frozen at completion.
        completed_on_time: bool,
    },
}

/// One continuous work interval by one user on one task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimerEntity {
    /// Stable identifier for the timer.
    pub id: Uuid,
    /// Task the interval was worked against.
    pub task_id: Uuid,
    /// User who ran the timer.
    pub user_id: Uuid,
    /// Group of the task, denormalized for leaderboard queries.
    pub group_id: Option<Uuid>,
    /// Instant the timer was started.
    pub started_at: SystemTime,
    /// Active or completed state.
    pub phase: TimerPhase,
    /// Free-text notes supplied at completion.
    pub notes: String,
}

impl TimerEntity {
    /// Whether the timer is still running.
    pub fn is_active(&self) -> bool {
        matches!(self.phase, TimerPhase::Active)
    }
}

/// Record of one completion of a task by one user, append-only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompletionRecord {
    /// User who completed the task.
    pub user_id: Uuid,
    /// Instant of the completion.
    pub completed_at: SystemTime,
    /// Minutes spent according to the completing timer.
    pub time_spent_minutes: u64,
    /// Whether the completion beat the task due date.
    pub completed_on_time: bool,
}

/// Task fields the timer core reads and advances.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskEntity {
    /// Stable identifier for the task.
    pub id: Uuid,
    /// Display title, carried into event payloads.
    pub title: String,
    /// User who created the task.
    pub created_by: Uuid,
    /// Owning group, if the task belongs to one.
    pub group_id: Option<Uuid>,
    /// Current lifecycle status.
    pub status: TaskStatus,
    /// Number of currently running timers; matches the store's active Timer count.
    pub active_timers: u32,
    /// Monotonic count of timers ever started.
    pub total_timers: u64,
    /// Deadline against which completions are judged on-time.
    pub due_date: SystemTime,
    /// Users allowed to work the task; grown implicitly on first timer start.
    pub assignees: Vec<Uuid>,
    /// Every completion of this task, first one flips `status`.
    pub completed_by: Vec<CompletionRecord>,
    /// Instant of the first completion.
    pub completed_at: Option<SystemTime>,
}

/// User statistics maintained by the stat aggregator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserEntity {
    /// Stable identifier for the user.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Number of task completions credited to the user.
    pub tasks_completed: u64,
    /// Weighted running average of on-time completions, 0–100, 2 decimals.
    pub task_completion_rate: f64,
    /// Total minutes of completed timer work.
    pub total_time_spent_minutes: u64,
}

/// Group membership and statistics the core reads and updates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GroupEntity {
    /// Stable identifier for the group.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Whether the group participates in the global leaderboard.
    pub is_public: bool,
    /// Group leader, always authorized on group tasks.
    pub leader_id: Uuid,
    /// Group members, authorized on group tasks and joined to the group room.
    pub members: Vec<Uuid>,
    /// Number of task completions recorded against the group.
    pub completed_tasks: u64,
    /// Number of tasks ever created in the group (maintained by the CRUD layer).
    pub total_tasks: u64,
    /// Total minutes of completed timer work across the group.
    pub total_time_spent_minutes: u64,
    /// Last instant any member completed a timer.
    pub last_active: SystemTime,
}
