//! Stat aggregation applied after a timer completes.
//!
//! The pure `apply_*` functions hold the arithmetic; `record_completion_stats`
//! wraps them in retried read-modify-write cycles against the store. Timer and
//! task writes have already committed by the time this runs, so failures here
//! are retried with backoff before being surfaced.

use std::{future::Future, sync::Arc, time::Duration};

use tracing::{error, warn};
use uuid::Uuid;

use crate::{
    dao::{
        models::{CompletionRecord, GroupEntity, UserEntity},
        storage::StorageResult,
        tracker_store::TrackerStore,
    },
    error::ServiceError,
    state::SharedState,
};

/// Fold one completion into a user's running statistics.
///
/// The completion rate is a weighted running average over all completions: the
/// new sample is 100 for an on-time completion and 0 otherwise, and the result
/// is rounded to two decimals.
pub fn apply_user_completion(user: &mut UserEntity, record: &CompletionRecord) {
    user.tasks_completed += 1;
    let count = user.tasks_completed as f64;
    let sample = if record.completed_on_time { 100.0 } else { 0.0 };
    let rate = (user.task_completion_rate * (count - 1.0) + sample) / count;
    user.task_completion_rate = (rate * 100.0).round() / 100.0;
    user.total_time_spent_minutes += record.time_spent_minutes;
}

/// Fold one completion into a group's running statistics.
pub fn apply_group_completion(group: &mut GroupEntity, record: &CompletionRecord) {
    group.completed_tasks += 1;
    group.total_time_spent_minutes += record.time_spent_minutes;
    group.last_active = record.completed_at;
}

/// Apply a completion to the user's stats and, when the task was grouped, the
/// group's stats. Each target is retried independently.
pub async fn record_completion_stats(
    state: &SharedState,
    store: &Arc<dyn TrackerStore>,
    record: &CompletionRecord,
    group_id: Option<Uuid>,
) -> Result<(), ServiceError> {
    retry_stat(state, "user stats", || {
        update_user_stats(Arc::clone(store), record.clone())
    })
    .await?;

    if let Some(group_id) = group_id {
        retry_stat(state, "group stats", || {
            update_group_stats(Arc::clone(store), group_id, record.clone())
        })
        .await?;
    }

    Ok(())
}

async fn update_user_stats(
    store: Arc<dyn TrackerStore>,
    record: CompletionRecord,
) -> StorageResult<()> {
    let Some(mut user) = store.find_user(record.user_id).await? else {
        warn!(user_id = %record.user_id, "completion by unknown user, skipping user stats");
        return Ok(());
    };
    apply_user_completion(&mut user, &record);
    store.save_user(user).await
}

async fn update_group_stats(
    store: Arc<dyn TrackerStore>,
    group_id: Uuid,
    record: CompletionRecord,
) -> StorageResult<()> {
    let Some(mut group) = store.find_group(group_id).await? else {
        warn!(group_id = %group_id, "completion in unknown group, skipping group stats");
        return Ok(());
    };
    apply_group_completion(&mut group, &record);
    store.save_group(group).await
}

/// Run a stat update, retrying with doubling backoff on storage failure.
async fn retry_stat<F, Fut>(
    state: &SharedState,
    what: &'static str,
    mut attempt_fn: F,
) -> Result<(), ServiceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = StorageResult<()>>,
{
    let attempts = state.config().stat_retry_attempts;
    let mut backoff = state.config().stat_retry_backoff;

    let mut attempt = 1;
    let mut result = attempt_fn().await;
    while let Err(err) = &result {
        warn!(target = what, attempt, error = %err, "stat update failed");
        if attempt >= attempts {
            error!(target = what, attempts, "stat update exhausted its retries");
            break;
        }
        tokio::time::sleep(backoff).await;
        backoff = backoff.saturating_mul(2).min(Duration::from_secs(5));
        attempt += 1;
        result = attempt_fn().await;
    }

    result.map_err(ServiceError::from)
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;

    fn user() -> UserEntity {
        UserEntity {
            id: Uuid::new_v4(),
            name: "ada".into(),
            tasks_completed: 0,
            task_completion_rate: 0.0,
            total_time_spent_minutes: 0,
        }
    }

    fn completion(on_time: bool, minutes: u64) -> CompletionRecord {
        CompletionRecord {
            user_id: Uuid::new_v4(),
            completed_at: SystemTime::UNIX_EPOCH,
            time_spent_minutes: minutes,
            completed_on_time: on_time,
        }
    }

    #[test]
    fn first_completion_sets_the_rate_outright() {
        let mut user = user();
        apply_user_completion(&mut user, &completion(true, 10));

        assert_eq!(user.tasks_completed, 1);
        assert_eq!(user.task_completion_rate, 100.0);
        assert_eq!(user.total_time_spent_minutes, 10);
    }

    #[test]
    fn rate_is_a_running_average_over_all_completions() {
        let mut user = user();
        apply_user_completion(&mut user, &completion(true, 5));
        apply_user_completion(&mut user, &completion(false, 5));

        assert_eq!(user.task_completion_rate, 50.0);

        apply_user_completion(&mut user, &completion(true, 5));
        // (50 * 2 + 100) / 3 = 66.666... -> 66.67
        assert_eq!(user.task_completion_rate, 66.67);
    }

    #[test]
    fn group_stats_accumulate_and_stamp_activity() {
        let mut group = GroupEntity {
            id: Uuid::new_v4(),
            name: "backend".into(),
            is_public: true,
            leader_id: Uuid::new_v4(),
            members: Vec::new(),
            completed_tasks: 2,
            total_tasks: 5,
            total_time_spent_minutes: 40,
            last_active: SystemTime::UNIX_EPOCH,
        };
        let record = completion(true, 15);

        apply_group_completion(&mut group, &record);

        assert_eq!(group.completed_tasks, 3);
        assert_eq!(group.total_time_spent_minutes, 55);
        assert_eq!(group.last_active, record.completed_at);
    }
}
