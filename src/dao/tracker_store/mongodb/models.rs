use mongodb::bson::{Binary, DateTime, Document, doc, spec::BinarySubtype};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::MongoDaoError;
use crate::dao::models::{CompletionRecord, GroupEntity, TaskEntity, TaskStatus, TimerEntity, TimerPhase};

pub const TIMER_COLLECTION: &str = "timers";
pub const TASK_COLLECTION: &str = "tasks";
pub const USER_COLLECTION: &str = "users";
pub const GROUP_COLLECTION: &str = "groups";

/// Timer document with the tagged phase flattened into queryable flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoTimerDocument {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub task_id: Uuid,
    pub user_id: Uuid,
    pub group_id: Option<Uuid>,
    pub started_at: DateTime,
    pub ended_at: Option<DateTime>,
    pub duration_minutes: i64,
    pub is_active: bool,
    pub is_completed: bool,
    #[serde(default)]
    pub completed_on_time: bool,
    #[serde(default)]
    pub notes: String,
}

impl From<TimerEntity> for MongoTimerDocument {
    fn from(value: TimerEntity) -> Self {
        let (ended_at, duration_minutes, is_active, is_completed, completed_on_time) =
            match value.phase {
                TimerPhase::Active => (None, 0, true, false, false),
                TimerPhase::Completed {
                    ended_at,
                    duration_minutes,
                    completed_on_time,
                } => (
                    Some(DateTime::from_system_time(ended_at)),
                    duration_minutes as i64,
                    false,
                    true,
                    completed_on_time,
                ),
            };

        Self {
            id: value.id,
            task_id: value.task_id,
            user_id: value.user_id,
            group_id: value.group_id,
            started_at: DateTime::from_system_time(value.started_at),
            ended_at,
            duration_minutes,
            is_active,
            is_completed,
            completed_on_time,
            notes: value.notes,
        }
    }
}

impl TryFrom<MongoTimerDocument> for TimerEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoTimerDocument) -> Result<Self, Self::Error> {
        let phase = match (value.is_active, value.is_completed, value.ended_at) {
            (true, false, _) => TimerPhase::Active,
            (false, true, Some(ended_at)) => TimerPhase::Completed {
                ended_at: ended_at.to_system_time(),
                duration_minutes: value.duration_minutes.max(0) as u64,
                completed_on_time: value.completed_on_time,
            },
            (false, true, None) => {
                return Err(MongoDaoError::InvalidDocument {
                    collection: TIMER_COLLECTION,
                    id: value.id,
                    message: "completed timer has no end time".into(),
                });
            }
            (active, completed, _) => {
                return Err(MongoDaoError::InvalidDocument {
                    collection: TIMER_COLLECTION,
                    id: value.id,
                    message: format!(
                        "inconsistent state flags (is_active={active}, is_completed={completed})"
                    ),
                });
            }
        };

        Ok(Self {
            id: value.id,
            task_id: value.task_id,
            user_id: value.user_id,
            group_id: value.group_id,
            started_at: value.started_at.to_system_time(),
            phase,
            notes: value.notes,
        })
    }
}

/// Completion record with a bson-native timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoCompletionRecord {
    pub user_id: Uuid,
    pub completed_at: DateTime,
    pub time_spent_minutes: i64,
    pub completed_on_time: bool,
}

impl From<CompletionRecord> for MongoCompletionRecord {
    fn from(value: CompletionRecord) -> Self {
        Self {
            user_id: value.user_id,
            completed_at: DateTime::from_system_time(value.completed_at),
            time_spent_minutes: value.time_spent_minutes as i64,
            completed_on_time: value.completed_on_time,
        }
    }
}

impl From<MongoCompletionRecord> for CompletionRecord {
    fn from(value: MongoCompletionRecord) -> Self {
        Self {
            user_id: value.user_id,
            completed_at: value.completed_at.to_system_time(),
            time_spent_minutes: value.time_spent_minutes.max(0) as u64,
            completed_on_time: value.completed_on_time,
        }
    }
}

/// Task document mirroring [`TaskEntity`] with bson-native timestamps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoTaskDocument {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub title: String,
    pub created_by: Uuid,
    pub group_id: Option<Uuid>,
    pub status: TaskStatus,
    pub active_timers: i32,
    pub total_timers: i64,
    pub due_date: DateTime,
    pub assignees: Vec<Uuid>,
    pub completed_by: Vec<MongoCompletionRecord>,
    pub completed_at: Option<DateTime>,
}

impl From<TaskEntity> for MongoTaskDocument {
    fn from(value: TaskEntity) -> Self {
        Self {
            id: value.id,
            title: value.title,
            created_by: value.created_by,
            group_id: value.group_id,
            status: value.status,
            active_timers: value.active_timers as i32,
            total_timers: value.total_timers as i64,
            due_date: DateTime::from_system_time(value.due_date),
            assignees: value.assignees,
            completed_by: value.completed_by.into_iter().map(Into::into).collect(),
            completed_at: value.completed_at.map(DateTime::from_system_time),
        }
    }
}

impl From<MongoTaskDocument> for TaskEntity {
    fn from(value: MongoTaskDocument) -> Self {
        Self {
            id: value.id,
            title: value.title,
            created_by: value.created_by,
            group_id: value.group_id,
            status: value.status,
            active_timers: value.active_timers.max(0) as u32,
            total_timers: value.total_timers.max(0) as u64,
            due_date: value.due_date.to_system_time(),
            assignees: value.assignees,
            completed_by: value.completed_by.into_iter().map(Into::into).collect(),
            completed_at: value.completed_at.map(|at| at.to_system_time()),
        }
    }
}

/// Group document mirroring [`GroupEntity`] with a bson-native timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoGroupDocument {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub is_public: bool,
    pub leader_id: Uuid,
    pub members: Vec<Uuid>,
    pub completed_tasks: i64,
    pub total_tasks: i64,
    pub total_time_spent_minutes: i64,
    pub last_active: DateTime,
}

impl From<GroupEntity> for MongoGroupDocument {
    fn from(value: GroupEntity) -> Self {
        Self {
            id: value.id,
            name: value.name,
            is_public: value.is_public,
            leader_id: value.leader_id,
            members: value.members,
            completed_tasks: value.completed_tasks as i64,
            total_tasks: value.total_tasks as i64,
            total_time_spent_minutes: value.total_time_spent_minutes as i64,
            last_active: DateTime::from_system_time(value.last_active),
        }
    }
}

impl From<MongoGroupDocument> for GroupEntity {
    fn from(value: MongoGroupDocument) -> Self {
        Self {
            id: value.id,
            name: value.name,
            is_public: value.is_public,
            leader_id: value.leader_id,
            members: value.members,
            completed_tasks: value.completed_tasks.max(0) as u64,
            total_tasks: value.total_tasks.max(0) as u64,
            total_time_spent_minutes: value.total_time_spent_minutes.max(0) as u64,
            last_active: value.last_active.to_system_time(),
        }
    }
}

pub fn uuid_as_binary(id: Uuid) -> Binary {
    Binary {
        subtype: BinarySubtype::Uuid,
        bytes: id.into_bytes().to_vec(),
    }
}

pub fn doc_id(id: Uuid) -> Document {
    doc! {"_id": uuid_as_binary(id)}
}
