use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

const WEEK: Duration = Duration::from_secs(7 * 24 * 60 * 60);
const MONTH: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Time window a leaderboard is computed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TimeFrame {
    /// Completions of the last 7 days.
    Week,
    /// Completions of the last 30 days.
    Month,
    /// Every completion on record.
    #[default]
    All,
}

impl TimeFrame {
    /// Inclusive lower bound of the window ending at `now`, or `None` for the
    /// unbounded frame.
    pub fn window_start(self, now: SystemTime) -> Option<SystemTime> {
        match self {
            TimeFrame::Week => Some(now.checked_sub(WEEK).unwrap_or(SystemTime::UNIX_EPOCH)),
            TimeFrame::Month => Some(now.checked_sub(MONTH).unwrap_or(SystemTime::UNIX_EPOCH)),
            TimeFrame::All => None,
        }
    }
}

/// One ranked leaderboard entry.
#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct LeaderboardRow {
    pub user_id: Uuid,
    /// Completed timers inside the window.
    pub tasks_completed: u64,
    /// Minutes spent across those completions.
    pub total_time_minutes: u64,
    /// Share of on-time completions inside the window, in percent.
    pub completion_rate: u32,
}

/// Ranked leaderboard plus the window it covers.
#[derive(Debug, Serialize, ToSchema)]
pub struct LeaderboardResponse {
    pub time_frame: TimeFrame,
    pub rows: Vec<LeaderboardRow>,
}

/// Query parameters accepted by the leaderboard endpoints.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct LeaderboardQuery {
    /// Window to rank over; defaults to `all`.
    pub time_frame: Option<TimeFrame>,
    /// Maximum number of rows returned (global board only).
    pub limit: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_deserialize_from_lowercase() {
        let frame: TimeFrame = serde_json::from_str(r#""week""#).unwrap();
        assert_eq!(frame, TimeFrame::Week);
        let frame: TimeFrame = serde_json::from_str(r#""all""#).unwrap();
        assert_eq!(frame, TimeFrame::All);
    }

    #[test]
    fn window_bounds_match_the_frame() {
        let now = SystemTime::UNIX_EPOCH + Duration::from_secs(100 * 24 * 60 * 60);

        assert_eq!(TimeFrame::All.window_start(now), None);
        assert_eq!(TimeFrame::Week.window_start(now), Some(now - WEEK));
        assert_eq!(TimeFrame::Month.window_start(now), Some(now - MONTH));
    }

    #[test]
    fn window_start_saturates_at_epoch() {
        let now = SystemTime::UNIX_EPOCH + Duration::from_secs(60);
        assert_eq!(
            TimeFrame::Week.window_start(now),
            Some(SystemTime::UNIX_EPOCH)
        );
    }
}
