//! In-memory store backend.
//!
//! Backs integration tests and storage-less development. Enforces the same
//! active-timer uniqueness constraint as the MongoDB backend so race tests
//! exercise realistic failure modes.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
    time::SystemTime,
};

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::{
    models::{GroupEntity, TaskEntity, TimerEntity, UserEntity},
    storage::{StorageError, StorageResult},
    tracker_store::TrackerStore,
};

/// Name reported when the per-user active timer constraint rejects an insert.
pub const ACTIVE_TIMER_CONSTRAINT: &str = "active_timer_per_user";

/// HashMap-backed [`TrackerStore`] implementation.
#[derive(Clone, Default)]
pub struct MemoryTrackerStore {
    inner: Arc<Mutex<MemoryInner>>,
}

#[derive(Default)]
struct MemoryInner {
    tasks: HashMap<Uuid, TaskEntity>,
    timers: HashMap<Uuid, TimerEntity>,
    users: HashMap<Uuid, UserEntity>,
    groups: HashMap<Uuid, GroupEntity>,
}

impl MemoryTrackerStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn locked(&self) -> MutexGuard<'_, MemoryInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn completed_at_or_after(timer: &TimerEntity, since: Option<SystemTime>) -> bool {
    match &timer.phase {
        crate::dao::models::TimerPhase::Completed { ended_at, .. } => {
            since.is_none_or(|cutoff| *ended_at >= cutoff)
        }
        crate::dao::models::TimerPhase::Active => false,
    }
}

impl TrackerStore for MemoryTrackerStore {
    fn find_task(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<TaskEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.locked().tasks.get(&id).cloned()) })
    }

    fn save_task(&self, task: TaskEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.locked().tasks.insert(task.id, task);
            Ok(())
        })
    }

    fn find_user(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<UserEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.locked().users.get(&id).cloned()) })
    }

    fn save_user(&self, user: UserEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.locked().users.insert(user.id, user);
            Ok(())
        })
    }

    fn find_group(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GroupEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.locked().groups.get(&id).cloned()) })
    }

    fn save_group(&self, group: GroupEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.locked().groups.insert(group.id, group);
            Ok(())
        })
    }

    fn find_timer(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<TimerEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.locked().timers.get(&id).cloned()) })
    }

    fn insert_timer(&self, timer: TimerEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let mut inner = store.locked();
            let duplicate_active = timer.is_active()
                && inner
                    .timers
                    .values()
                    .any(|existing| existing.user_id == timer.user_id && existing.is_active());
            if duplicate_active || inner.timers.contains_key(&timer.id) {
                return Err(StorageError::UniqueViolation {
                    constraint: ACTIVE_TIMER_CONSTRAINT,
                });
            }
            inner.timers.insert(timer.id, timer);
            Ok(())
        })
    }

    fn save_timer(&self, timer: TimerEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.locked().timers.insert(timer.id, timer);
            Ok(())
        })
    }

    fn delete_timer(&self, id: Uuid) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.locked().timers.remove(&id);
            Ok(())
        })
    }

    fn find_active_timer(
        &self,
        user_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<TimerEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .locked()
                .timers
                .values()
                .find(|timer| timer.user_id == user_id && timer.is_active())
                .cloned())
        })
    }

    fn list_task_timers(
        &self,
        task_id: Uuid,
        offset: u64,
        limit: u64,
    ) -> BoxFuture<'static, StorageResult<(Vec<TimerEntity>, u64)>> {
        let store = self.clone();
        Box::pin(async move {
            let inner = store.locked();
            let mut timers: Vec<TimerEntity> = inner
                .timers
                .values()
                .filter(|timer| timer.task_id == task_id)
                .cloned()
                .collect();
            timers.sort_by(|a, b| b.started_at.cmp(&a.started_at));
            let total = timers.len() as u64;
            let page = timers
                .into_iter()
                .skip(offset as usize)
                .take(limit as usize)
                .collect();
            Ok((page, total))
        })
    }

    fn completed_timers_for_group(
        &self,
        group_id: Uuid,
        since: Option<SystemTime>,
    ) -> BoxFuture<'static, StorageResult<Vec<TimerEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let inner = store.locked();
            let mut timers: Vec<TimerEntity> = inner
                .timers
                .values()
                .filter(|timer| {
                    timer.group_id == Some(group_id) && completed_at_or_after(timer, since)
                })
                .cloned()
                .collect();
            timers.sort_by(|a, b| a.started_at.cmp(&b.started_at));
            Ok(timers)
        })
    }

    fn completed_timers_for_public_groups(
        &self,
        since: Option<SystemTime>,
    ) -> BoxFuture<'static, StorageResult<Vec<TimerEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let inner = store.locked();
            let mut timers: Vec<TimerEntity> = inner
                .timers
                .values()
                .filter(|timer| {
                    timer
                        .group_id
                        .is_some_and(|gid| inner.groups.get(&gid).is_some_and(|g| g.is_public))
                        && completed_at_or_after(timer, since)
                })
                .cloned()
                .collect();
            timers.sort_by(|a, b| a.started_at.cmp(&b.started_at));
            Ok(timers)
        })
    }

    fn groups_for_member(&self, user_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<Uuid>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .locked()
                .groups
                .values()
                .filter(|group| group.leader_id == user_id || group.members.contains(&user_id))
                .map(|group| group.id)
                .collect())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime};

    use super::*;
    use crate::dao::models::TimerPhase;

    fn timer(user_id: Uuid, active: bool) -> TimerEntity {
        TimerEntity {
            id: Uuid::new_v4(),
            task_id: Uuid::new_v4(),
            user_id,
            group_id: None,
            started_at: SystemTime::UNIX_EPOCH,
            phase: if active {
                TimerPhase::Active
            } else {
                TimerPhase::Completed {
                    ended_at: SystemTime::UNIX_EPOCH + Duration::from_secs(600),
                    duration_minutes: 10,
                    completed_on_time: true,
                }
            },
            notes: String::new(),
        }
    }

    #[tokio::test]
    async fn second_active_timer_for_same_user_is_rejected() {
        let store = MemoryTrackerStore::new();
        let user = Uuid::new_v4();
        store.insert_timer(timer(user, true)).await.unwrap();

        let err = store.insert_timer(timer(user, true)).await.unwrap_err();
        assert!(matches!(
            err,
            StorageError::UniqueViolation {
                constraint: ACTIVE_TIMER_CONSTRAINT
            }
        ));
    }

    #[tokio::test]
    async fn completed_timers_do_not_block_inserts() {
        let store = MemoryTrackerStore::new();
        let user = Uuid::new_v4();
        store.insert_timer(timer(user, false)).await.unwrap();
        store.insert_timer(timer(user, true)).await.unwrap();

        let active = store.find_active_timer(user).await.unwrap();
        assert!(active.is_some_and(|t| t.is_active()));
    }

    #[tokio::test]
    async fn task_timer_listing_orders_newest_first() {
        let store = MemoryTrackerStore::new();
        let task_id = Uuid::new_v4();
        for offset in 0..3u64 {
            let mut t = timer(Uuid::new_v4(), false);
            t.task_id = task_id;
            t.started_at = SystemTime::UNIX_EPOCH + Duration::from_secs(offset * 60);
            store.insert_timer(t).await.unwrap();
        }

        let (page, total) = store.list_task_timers(task_id, 0, 2).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(page.len(), 2);
        assert!(page[0].started_at > page[1].started_at);
    }
}
