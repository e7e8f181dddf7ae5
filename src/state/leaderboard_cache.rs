use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::dto::leaderboard::{LeaderboardRow, TimeFrame};

/// Time-boxed cache for the global leaderboard, keyed by time frame.
///
/// Group leaderboards never go through here; only the expensive
/// all-public-groups aggregation is cached. Entries expire after a fixed TTL
/// and are recomputed on the next read.
pub struct LeaderboardCache {
    ttl: Duration,
    entries: DashMap<TimeFrame, CachedBoard>,
}

struct CachedBoard {
    computed_at: Instant,
    rows: Vec<LeaderboardRow>,
}

impl LeaderboardCache {
    /// Cache whose entries stay valid for `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: DashMap::new(),
        }
    }

    /// Fresh cached board for the frame, or `None` when absent or expired.
    /// Expired entries are evicted on the way out.
    pub fn get(&self, frame: TimeFrame) -> Option<Vec<LeaderboardRow>> {
        let expired = match self.entries.get(&frame) {
            Some(entry) if entry.computed_at.elapsed() < self.ttl => {
                return Some(entry.rows.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove(&frame);
        }
        None
    }

    /// Store a freshly computed board for the frame.
    pub fn put(&self, frame: TimeFrame, rows: Vec<LeaderboardRow>) {
        self.entries.insert(
            frame,
            CachedBoard {
                computed_at: Instant::now(),
                rows,
            },
        );
    }
}
