use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dao::models::TaskStatus;

/// Envelope delivered to room subscribers: an event name plus its payload.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoomEvent {
    /// Event name, e.g. `timer.started`.
    pub event: String,
    /// Event payload as free-form JSON.
    #[schema(value_type = Object)]
    pub data: serde_json::Value,
}

impl RoomEvent {
    /// Build an envelope from a serializable payload.
    pub fn json<T: Serialize>(event: &str, payload: &T) -> Result<Self, serde_json::Error> {
        Ok(Self {
            event: event.to_owned(),
            data: serde_json::to_value(payload)?,
        })
    }
}

/// Payload of `timer.started`.
#[derive(Debug, Serialize, ToSchema)]
pub struct TimerStartedEvent {
    pub timer_id: Uuid,
    pub task_id: Uuid,
    pub user_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<Uuid>,
    /// RFC 3339 timestamp of the start.
    pub started_at: String,
}

/// Payload of `timer.completed`.
#[derive(Debug, Serialize, ToSchema)]
pub struct TimerCompletedEvent {
    pub timer_id: Uuid,
    pub task_id: Uuid,
    pub user_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<Uuid>,
    pub duration_minutes: u64,
    pub completed_on_time: bool,
    /// Task status after this completion.
    pub task_status: TaskStatus,
    /// Whether this completion flipped the task to completed.
    pub task_completed: bool,
    /// RFC 3339 timestamp of the completion.
    pub ended_at: String,
}

/// Payload of the `group.task.*` family.
#[derive(Debug, Serialize, ToSchema)]
pub struct GroupTaskEvent {
    pub group_id: Uuid,
    pub task_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
}

/// Payload of the `group.member.*` family.
#[derive(Debug, Serialize, ToSchema)]
pub struct GroupMemberEvent {
    pub group_id: Uuid,
    pub user_id: Uuid,
    /// New role after a role change, absent for join/leave.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}
