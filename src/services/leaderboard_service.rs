//! Leaderboard computation over completed timers.
//!
//! Group boards are always computed live; the global board over all public
//! groups goes through the time-boxed cache in the application state.

use indexmap::IndexMap;
use uuid::Uuid;

use crate::{
    dao::models::{TimerEntity, TimerPhase},
    dto::leaderboard::{LeaderboardQuery, LeaderboardResponse, LeaderboardRow},
    error::ServiceError,
    state::SharedState,
};

#[derive(Default)]
struct Accumulator {
    tasks_completed: u64,
    total_time_minutes: u64,
    on_time: u64,
}

/// Rank users by completed timers, descending.
///
/// Accumulation preserves the input order of first appearance and the sort is
/// stable, so ties keep the underlying query order.
pub fn aggregate(timers: &[TimerEntity]) -> Vec<LeaderboardRow> {
    let mut per_user: IndexMap<Uuid, Accumulator> = IndexMap::new();
    for timer in timers {
        let TimerPhase::Completed {
            duration_minutes,
            completed_on_time,
            ..
        } = timer.phase
        else {
            continue;
        };
        let entry = per_user.entry(timer.user_id).or_default();
        entry.tasks_completed += 1;
        entry.total_time_minutes += duration_minutes;
        if completed_on_time {
            entry.on_time += 1;
        }
    }

    let mut rows: Vec<LeaderboardRow> = per_user
        .into_iter()
        .map(|(user_id, acc)| LeaderboardRow {
            user_id,
            tasks_completed: acc.tasks_completed,
            total_time_minutes: acc.total_time_minutes,
            completion_rate: ((acc.on_time * 100) as f64 / acc.tasks_completed as f64).round()
                as u32,
        })
        .collect();
    rows.sort_by(|a, b| b.tasks_completed.cmp(&a.tasks_completed));
    rows
}

/// Live leaderboard over one group's completed timers.
pub async fn group_leaderboard(
    state: &SharedState,
    group_id: Uuid,
    query: LeaderboardQuery,
) -> Result<LeaderboardResponse, ServiceError> {
    let store = state.require_store().await?;
    if store.find_group(group_id).await?.is_none() {
        return Err(ServiceError::NotFound(format!(
            "group `{group_id}` not found"
        )));
    }

    let time_frame = query.time_frame.unwrap_or_default();
    let since = time_frame.window_start(state.clock().now());
    let timers = store.completed_timers_for_group(group_id, since).await?;

    Ok(LeaderboardResponse {
        time_frame,
        rows: aggregate(&timers),
    })
}

/// Cached leaderboard over every public group's completed timers, truncated to
/// the requested limit.
pub async fn global_leaderboard(
    state: &SharedState,
    query: LeaderboardQuery,
) -> Result<LeaderboardResponse, ServiceError> {
    let config = state.config();
    let limit = query
        .limit
        .unwrap_or(config.default_page_limit)
        .clamp(1, config.max_page_limit) as usize;
    let time_frame = query.time_frame.unwrap_or_default();

    let mut rows = match state.leaderboards().get(time_frame) {
        Some(cached) => cached,
        None => {
            let store = state.require_store().await?;
            let since = time_frame.window_start(state.clock().now());
            let timers = store.completed_timers_for_public_groups(since).await?;
            let rows = aggregate(&timers);
            state.leaderboards().put(time_frame, rows.clone());
            rows
        }
    };
    rows.truncate(limit);

    Ok(LeaderboardResponse { time_frame, rows })
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime};

    use super::*;

    fn completed(user_id: Uuid, minutes: u64, on_time: bool) -> TimerEntity {
        let started_at = SystemTime::UNIX_EPOCH;
        TimerEntity {
            id: Uuid::new_v4(),
            task_id: Uuid::new_v4(),
            user_id,
            group_id: Some(Uuid::new_v4()),
            started_at,
            phase: TimerPhase::Completed {
                ended_at: started_at + Duration::from_secs(minutes * 60),
                duration_minutes: minutes,
                completed_on_time: on_time,
            },
            notes: String::new(),
        }
    }

    fn active(user_id: Uuid) -> TimerEntity {
        TimerEntity {
            id: Uuid::new_v4(),
            task_id: Uuid::new_v4(),
            user_id,
            group_id: None,
            started_at: SystemTime::UNIX_EPOCH,
            phase: TimerPhase::Active,
            notes: String::new(),
        }
    }

    #[test]
    fn ranks_by_completions_descending() {
        let light = Uuid::new_v4();
        let heavy = Uuid::new_v4();
        let timers = vec![
            completed(light, 10, true),
            completed(heavy, 5, true),
            completed(heavy, 5, false),
        ];

        let rows = aggregate(&timers);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].user_id, heavy);
        assert_eq!(rows[0].tasks_completed, 2);
        assert_eq!(rows[0].total_time_minutes, 10);
        assert_eq!(rows[0].completion_rate, 50);
        assert_eq!(rows[1].user_id, light);
        assert_eq!(rows[1].completion_rate, 100);
    }

    #[test]
    fn active_timers_are_ignored() {
        let user = Uuid::new_v4();
        let rows = aggregate(&[active(user), completed(user, 10, true)]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].tasks_completed, 1);
    }

    #[test]
    fn ties_keep_first_appearance_order() {
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let rows = aggregate(&[completed(first, 5, true), completed(second, 5, true)]);

        assert_eq!(rows[0].user_id, first);
        assert_eq!(rows[1].user_id, second);
    }
}
