//! Leaderboard computation and cache behaviour against the in-memory store.

use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};

use uuid::Uuid;

use taskpulse_back::{
    config::AppConfig,
    dao::{
        models::{GroupEntity, TimerEntity, TimerPhase},
        tracker_store::{TrackerStore, memory::MemoryTrackerStore},
    },
    dto::leaderboard::{LeaderboardQuery, TimeFrame},
    error::ServiceError,
    services::leaderboard_service,
    state::{AppState, Clock, SharedState},
};

fn t0() -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000)
}

fn config(ttl: Duration) -> AppConfig {
    AppConfig {
        leaderboard_ttl: ttl,
        room_capacity: 16,
        default_page_limit: 20,
        max_page_limit: 100,
        stat_retry_attempts: 2,
        stat_retry_backoff: Duration::from_millis(1),
    }
}

async fn setup(ttl: Duration) -> (SharedState, MemoryTrackerStore) {
    let state = AppState::with_clock(config(ttl), Clock::manual(t0()));
    let store = MemoryTrackerStore::new();
    state.install_store(Arc::new(store.clone())).await;
    (state, store)
}

fn group(is_public: bool) -> GroupEntity {
    GroupEntity {
        id: Uuid::new_v4(),
        name: "backend".into(),
        is_public,
        leader_id: Uuid::new_v4(),
        members: Vec::new(),
        completed_tasks: 0,
        total_tasks: 0,
        total_time_spent_minutes: 0,
        last_active: t0(),
    }
}

fn completed_timer(
    user_id: Uuid,
    group_id: Uuid,
    ended_at: SystemTime,
    minutes: u64,
    on_time: bool,
) -> TimerEntity {
    TimerEntity {
        id: Uuid::new_v4(),
        task_id: Uuid::new_v4(),
        user_id,
        group_id: Some(group_id),
        started_at: ended_at - Duration::from_secs(minutes * 60),
        phase: TimerPhase::Completed {
            ended_at,
            duration_minutes: minutes,
            completed_on_time: on_time,
        },
        notes: String::new(),
    }
}

#[tokio::test]
async fn group_board_ranks_members_by_completions() {
    let (state, store) = setup(Duration::from_secs(3_600)).await;
    let group = group(true);
    store.save_group(group.clone()).await.unwrap();

    let busy = Uuid::new_v4();
    let quiet = Uuid::new_v4();
    for minutes in [10, 20] {
        store
            .save_timer(completed_timer(busy, group.id, t0(), minutes, true))
            .await
            .unwrap();
    }
    store
        .save_timer(completed_timer(quiet, group.id, t0(), 5, false))
        .await
        .unwrap();

    let board = leaderboard_service::group_leaderboard(
        &state,
        group.id,
        LeaderboardQuery::default(),
    )
    .await
    .unwrap();

    assert_eq!(board.time_frame, TimeFrame::All);
    assert_eq!(board.rows.len(), 2);
    assert_eq!(board.rows[0].user_id, busy);
    assert_eq!(board.rows[0].tasks_completed, 2);
    assert_eq!(board.rows[0].total_time_minutes, 30);
    assert_eq!(board.rows[0].completion_rate, 100);
    assert_eq!(board.rows[1].user_id, quiet);
    assert_eq!(board.rows[1].completion_rate, 0);
}

#[tokio::test]
async fn unknown_group_board_is_not_found() {
    let (state, _store) = setup(Duration::from_secs(3_600)).await;
    let err = leaderboard_service::group_leaderboard(
        &state,
        Uuid::new_v4(),
        LeaderboardQuery::default(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn weekly_window_excludes_old_completions() {
    let (state, store) = setup(Duration::from_secs(3_600)).await;
    let group = group(true);
    store.save_group(group.clone()).await.unwrap();

    let veteran = Uuid::new_v4();
    let recent = Uuid::new_v4();
    let ten_days_ago = t0() - Duration::from_secs(10 * 24 * 60 * 60);
    store
        .save_timer(completed_timer(veteran, group.id, ten_days_ago, 60, true))
        .await
        .unwrap();
    store
        .save_timer(completed_timer(recent, group.id, t0(), 15, true))
        .await
        .unwrap();

    let board = leaderboard_service::group_leaderboard(
        &state,
        group.id,
        LeaderboardQuery {
            time_frame: Some(TimeFrame::Week),
            limit: None,
        },
    )
    .await
    .unwrap();

    assert_eq!(board.rows.len(), 1);
    assert_eq!(board.rows[0].user_id, recent);
}

#[tokio::test]
async fn global_board_only_sees_public_groups() {
    let (state, store) = setup(Duration::from_secs(3_600)).await;
    let open = group(true);
    let hidden = group(false);
    store.save_group(open.clone()).await.unwrap();
    store.save_group(hidden.clone()).await.unwrap();

    let visible = Uuid::new_v4();
    let invisible = Uuid::new_v4();
    store
        .save_timer(completed_timer(visible, open.id, t0(), 10, true))
        .await
        .unwrap();
    store
        .save_timer(completed_timer(invisible, hidden.id, t0(), 10, true))
        .await
        .unwrap();

    let board = leaderboard_service::global_leaderboard(&state, LeaderboardQuery::default())
        .await
        .unwrap();

    assert_eq!(board.rows.len(), 1);
    assert_eq!(board.rows[0].user_id, visible);
}

#[tokio::test]
async fn global_board_serves_stale_rows_until_the_ttl_expires() {
    let (state, store) = setup(Duration::from_secs(3_600)).await;
    let group = group(true);
    store.save_group(group.clone()).await.unwrap();
    let early = Uuid::new_v4();
    store
        .save_timer(completed_timer(early, group.id, t0(), 10, true))
        .await
        .unwrap();

    let first = leaderboard_service::global_leaderboard(&state, LeaderboardQuery::default())
        .await
        .unwrap();
    assert_eq!(first.rows.len(), 1);

    // A completion landing after the cache fill stays invisible on the
    // global board while the entry is fresh.
    store
        .save_timer(completed_timer(Uuid::new_v4(), group.id, t0(), 10, true))
        .await
        .unwrap();
    let cached = leaderboard_service::global_leaderboard(&state, LeaderboardQuery::default())
        .await
        .unwrap();
    assert_eq!(cached.rows.len(), 1);

    // The group board is never cached and sees it immediately.
    let live = leaderboard_service::group_leaderboard(
        &state,
        group.id,
        LeaderboardQuery::default(),
    )
    .await
    .unwrap();
    assert_eq!(live.rows.len(), 2);
}

#[tokio::test]
async fn expired_global_board_is_recomputed() {
    let (state, store) = setup(Duration::ZERO).await;
    let group = group(true);
    store.save_group(group.clone()).await.unwrap();
    store
        .save_timer(completed_timer(Uuid::new_v4(), group.id, t0(), 10, true))
        .await
        .unwrap();

    let first = leaderboard_service::global_leaderboard(&state, LeaderboardQuery::default())
        .await
        .unwrap();
    assert_eq!(first.rows.len(), 1);

    store
        .save_timer(completed_timer(Uuid::new_v4(), group.id, t0(), 10, true))
        .await
        .unwrap();
    let second = leaderboard_service::global_leaderboard(&state, LeaderboardQuery::default())
        .await
        .unwrap();
    assert_eq!(second.rows.len(), 2);
}

#[tokio::test]
async fn global_board_truncates_to_the_requested_limit() {
    let (state, store) = setup(Duration::from_secs(3_600)).await;
    let group = group(true);
    store.save_group(group.clone()).await.unwrap();
    for _ in 0..5 {
        store
            .save_timer(completed_timer(Uuid::new_v4(), group.id, t0(), 10, true))
            .await
            .unwrap();
    }

    let board = leaderboard_service::global_leaderboard(
        &state,
        LeaderboardQuery {
            time_frame: None,
            limit: Some(3),
        },
    )
    .await
    .unwrap();
    assert_eq!(board.rows.len(), 3);
}
