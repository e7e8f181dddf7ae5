//! Process-wide shared state and the pure machinery it hosts.

pub mod clock;
pub mod leaderboard_cache;
pub mod rooms;
pub mod task_machine;
pub mod timer_index;

use std::sync::Arc;

use tokio::sync::{RwLock, watch};

use crate::{config::AppConfig, dao::tracker_store::TrackerStore, error::ServiceError};

pub use self::clock::Clock;
pub use self::leaderboard_cache::LeaderboardCache;
pub use self::rooms::RoomHub;
pub use self::timer_index::{ActiveTimerIndex, ActiveTimerKey};

/// Cheaply clonable handle on the application state.
pub type SharedState = Arc<AppState>;

/// Central application state: store slot, derived caches and the room hub.
pub struct AppState {
    store: RwLock<Option<Arc<dyn TrackerStore>>>,
    active_timers: ActiveTimerIndex,
    leaderboards: LeaderboardCache,
    rooms: RoomHub,
    degraded: watch::Sender<bool>,
    clock: Clock,
    config: AppConfig,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`].
    ///
    /// The application starts in degraded mode until a storage backend is
    /// installed.
    pub fn new(config: AppConfig) -> SharedState {
        Self::with_clock(config, Clock::system())
    }

    /// Construct with an explicit clock so tests can control time.
    pub fn with_clock(config: AppConfig, clock: Clock) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            store: RwLock::new(None),
            active_timers: ActiveTimerIndex::new(),
            leaderboards: LeaderboardCache::new(config.leaderboard_ttl),
            rooms: RoomHub::new(config.room_capacity),
            degraded: degraded_tx,
            clock,
            config,
        })
    }

    /// Obtain a handle to the current store, if one is installed.
    pub async fn store(&self) -> Option<Arc<dyn TrackerStore>> {
        let guard = self.store.read().await;
        guard.as_ref().cloned()
    }

    /// Store handle, or [`ServiceError::Degraded`] when none is installed.
    pub async fn require_store(&self) -> Result<Arc<dyn TrackerStore>, ServiceError> {
        self.store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a storage backend and leave degraded mode.
    pub async fn install_store(&self, store: Arc<dyn TrackerStore>) {
        {
            let mut guard = self.store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current storage backend and enter degraded mode.
    pub async fn clear_store(&self) {
        {
            let mut guard = self.store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        let guard = self.store.read().await;
        guard.is_none()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Active-timer index guarding the one-timer-per-user invariant.
    pub fn active_timers(&self) -> &ActiveTimerIndex {
        &self.active_timers
    }

    /// Time-boxed cache for global leaderboards.
    pub fn leaderboards(&self) -> &LeaderboardCache {
        &self.leaderboards
    }

    /// Room-addressed broadcast hub for live connections.
    pub fn rooms(&self) -> &RoomHub {
        &self.rooms
    }

    /// Time source used by every timestamp the core records.
    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Immutable runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Update and broadcast the degraded flag when the value changes.
    fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
    }
}
