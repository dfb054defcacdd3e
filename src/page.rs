//! Page requests and paged results.

use serde::Serialize;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Clamp a 1-based page number to a valid value.
pub fn validate_page(page: u32) -> u32 {
    page.max(1)
}

/// Clamp a page size into `[1, MAX_PAGE_SIZE]`; zero falls back to the
/// default.
pub fn validate_page_size(page_size: u32) -> u32 {
    if page_size == 0 {
        DEFAULT_PAGE_SIZE
    } else {
        page_size.min(MAX_PAGE_SIZE)
    }
}

/// LIMIT/OFFSET for a clamped (page, page_size) pair.
pub fn limit_offset(page: u32, page_size: u32) -> (i64, i64) {
    let page = validate_page(page);
    let page_size = validate_page_size(page_size);
    (page_size as i64, ((page - 1) as i64) * page_size as i64)
}

/// One page of results plus totals.
#[derive(Clone, Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, page: u32, page_size: u32, total: u64) -> Self {
        Page {
            items,
            page: validate_page(page),
            page_size: validate_page_size(page_size),
            total,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            page_size: self.page_size,
            total: self.total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_clamps_to_one() {
        assert_eq!(validate_page(0), 1);
        assert_eq!(validate_page(1), 1);
        assert_eq!(validate_page(7), 7);
    }

    #[test]
    fn page_size_clamps_to_bounds() {
        assert_eq!(validate_page_size(0), DEFAULT_PAGE_SIZE);
        assert_eq!(validate_page_size(5), 5);
        assert_eq!(validate_page_size(1000), MAX_PAGE_SIZE);
    }

    #[test]
    fn limit_offset_from_page() {
        assert_eq!(limit_offset(1, 20), (20, 0));
        assert_eq!(limit_offset(3, 10), (10, 20));
        assert_eq!(limit_offset(0, 0), (DEFAULT_PAGE_SIZE as i64, 0));
    }
}
