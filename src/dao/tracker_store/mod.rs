pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use std::time::SystemTime;

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::models::{GroupEntity, TaskEntity, TimerEntity, UserEntity};
use crate::dao::storage::StorageResult;

/// Abstraction over the persistence layer for tasks, timers, users and groups.
///
/// The store owns durable truth for all four entities; in-process caches are
/// derived projections repaired from it.
pub trait TrackerStore: Send + Sync {
    /// Load a task by id.
    fn find_task(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<TaskEntity>>>;
    /// Persist a task, replacing any previous version.
    fn save_task(&self, task: TaskEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Load a user by id.
    fn find_user(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<UserEntity>>>;
    /// Persist a user, replacing any previous version.
    fn save_user(&self, user: UserEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Load a group by id.
    fn find_group(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GroupEntity>>>;
    /// Persist a group, replacing any previous version.
    fn save_group(&self, group: GroupEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Load a timer by id.
    fn find_timer(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<TimerEntity>>>;
    /// Insert a brand-new timer. Fails with a unique violation when the user
    /// already has an active timer on record.
    fn insert_timer(&self, timer: TimerEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Persist an existing timer, replacing the stored version.
    fn save_timer(&self, timer: TimerEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Remove a timer by id. Deleting a missing timer is not an error.
    fn delete_timer(&self, id: Uuid) -> BoxFuture<'static, StorageResult<()>>;
    /// Find the single active timer for a user, if any.
    fn find_active_timer(
        &self,
        user_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<TimerEntity>>>;
    /// Page of timers for a task ordered by start time descending, plus the
    /// total number of timers for the task.
    fn list_task_timers(
        &self,
        task_id: Uuid,
        offset: u64,
        limit: u64,
    ) -> BoxFuture<'static, StorageResult<(Vec<TimerEntity>, u64)>>;
    /// Completed timers for one group, optionally restricted to completions at
    /// or after `since`.
    fn completed_timers_for_group(
        &self,
        group_id: Uuid,
        since: Option<SystemTime>,
    ) -> BoxFuture<'static, StorageResult<Vec<TimerEntity>>>;
    /// Completed timers across all public groups, optionally restricted to
    /// completions at or after `since`.
    fn completed_timers_for_public_groups(
        &self,
        since: Option<SystemTime>,
    ) -> BoxFuture<'static, StorageResult<Vec<TimerEntity>>>;
    /// Identifiers of every group the user leads or belongs to.
    fn groups_for_member(&self, user_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<Uuid>>>;
    /// Cheap connectivity probe.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Attempt to re-establish a dropped backend connection.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
