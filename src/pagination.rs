//! Page-number pagination: `?page=<n>&limit=<m>`, defaulting to the
//! configured page size. Responses carry `count` plus the neighbouring
//! page numbers.

use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

impl PageQuery {
    /// 1-based page number; zero and absent both mean the first page.
    pub fn number(&self) -> u64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self, default: u64) -> u64 {
        match self.limit {
            Some(0) | None => default,
            Some(limit) => limit,
        }
    }
}

/// Number of the last page; an empty collection still has a first page.
pub fn last_page(count: u64, limit: u64) -> u64 {
    count.div_ceil(limit).max(1)
}

#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub count: u64,
    pub next: Option<u64>,
    pub previous: Option<u64>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    pub fn assemble(results: Vec<T>, count: u64, page: u64, limit: u64) -> Self {
        let last = last_page(count, limit);

        Self {
            count,
            next: (page < last).then_some(page + 1),
            previous: (page > 1 && page <= last).then(|| page - 1),
            results,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_first_page() {
        let query = PageQuery::default();

        assert_eq!(query.number(), 1);
        assert_eq!(query.limit(6), 6);
    }

    #[test]
    fn zero_limit_falls_back_to_default() {
        let query = PageQuery {
            page: Some(0),
            limit: Some(0),
        };

        assert_eq!(query.number(), 1);
        assert_eq!(query.limit(6), 6);
    }

    #[test]
    fn window_math() {
        let first: Page<u64> = Page::assemble(vec![1, 2], 5, 1, 2);
        assert_eq!(first.next, Some(2));
        assert_eq!(first.previous, None);

        let middle: Page<u64> = Page::assemble(vec![3, 4], 5, 2, 2);
        assert_eq!(middle.next, Some(3));
        assert_eq!(middle.previous, Some(1));

        let last: Page<u64> = Page::assemble(vec![5], 5, 3, 2);
        assert_eq!(last.next, None);
        assert_eq!(last.previous, Some(2));
    }

    #[test]
    fn last_page_rounds_up() {
        assert_eq!(last_page(0, 6), 1);
        assert_eq!(last_page(6, 6), 1);
        assert_eq!(last_page(7, 6), 2);
        assert_eq!(last_page(12, 6), 2);
    }

    #[test]
    fn empty_result_has_no_neighbours() {
        let page: Page<u64> = Page::assemble(vec![], 0, 1, 6);

        assert_eq!(page.count, 0);
        assert_eq!(page.next, None);
        assert_eq!(page.previous, None);
    }
}
