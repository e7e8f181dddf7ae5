use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::dto::timer::TimerView;

/// Pagination metadata attached to list responses.
#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct PageMeta {
    /// 1-based page number this response covers.
    pub page: u64,
    /// Page size used for this response.
    pub limit: u64,
    /// Total matching items across all pages.
    pub total_items: u64,
    /// Total number of pages at this limit.
    pub total_pages: u64,
    /// Whether a later page exists.
    pub has_next: bool,
    /// Whether an earlier page exists.
    pub has_prev: bool,
}

impl PageMeta {
    /// Derive full pagination metadata from a page, a non-zero limit and the
    /// total item count.
    pub fn new(page: u64, limit: u64, total_items: u64) -> Self {
        let total_pages = total_items.div_ceil(limit.max(1));
        Self {
            page,
            limit,
            total_items,
            total_pages,
            has_next: page < total_pages,
            has_prev: page > 1 && total_pages > 0,
        }
    }
}

/// Caller-supplied pagination parameters.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct PageQuery {
    /// 1-based page number; defaults to the first page.
    pub page: Option<u64>,
    /// Page size; clamped to the configured maximum.
    pub limit: Option<u64>,
}

/// One page of timers on a task, newest first.
#[derive(Debug, Serialize, ToSchema)]
pub struct TimerPage {
    pub items: Vec<TimerView>,
    pub meta: PageMeta,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn middle_page_has_both_neighbours() {
        let meta = PageMeta::new(2, 10, 35);
        assert_eq!(meta.total_pages, 4);
        assert!(meta.has_next);
        assert!(meta.has_prev);
    }

    #[test]
    fn first_and_last_pages_are_bounded() {
        let first = PageMeta::new(1, 10, 35);
        assert!(first.has_next);
        assert!(!first.has_prev);

        let last = PageMeta::new(4, 10, 35);
        assert!(!last.has_next);
        assert!(last.has_prev);
    }

    #[test]
    fn empty_result_has_no_pages() {
        let meta = PageMeta::new(1, 10, 0);
        assert_eq!(meta.total_pages, 0);
        assert!(!meta.has_next);
        assert!(!meta.has_prev);
    }

    #[test]
    fn exact_multiple_does_not_round_up() {
        let meta = PageMeta::new(3, 10, 30);
        assert_eq!(meta.total_pages, 3);
        assert!(!meta.has_next);
    }
}
