//! Pagination for list endpoints
//!
//! Lists are small enough to load whole, so pages are cut in memory.

use serde::{Deserialize, Serialize};

/// Page size when the request does not give one
pub const DEFAULT_PAGE_SIZE: i64 = 50;

/// Largest page a client may ask for
pub const MAX_PAGE_SIZE: i64 = 500;

/// Pagination metadata calculated from total results
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pagination {
    /// Current page number (1-indexed)
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
    pub offset: i64,
}

/// Clamp the requested page into `[1, total_pages]` and compute the offset
///
/// # Examples
/// ```
/// use cgm_ui::pagination::calculate_pagination;
///
/// // 250 results in pages of 100 = 3 pages
/// let p = calculate_pagination(250, 2, 100);
/// assert_eq!(p.page, 2);
/// assert_eq!(p.total_pages, 3);
/// assert_eq!(p.offset, 100);
///
/// // Out-of-bounds page is clamped to the last one
/// let p = calculate_pagination(250, 99, 100);
/// assert_eq!(p.page, 3);
/// assert_eq!(p.offset, 200);
/// ```
pub fn calculate_pagination(total_results: i64, requested_page: i64, page_size: i64) -> Pagination {
    let page_size = page_size.clamp(1, MAX_PAGE_SIZE);
    let total_pages = (total_results + page_size - 1) / page_size;
    let page = requested_page.max(1).min(total_pages.max(1));
    let offset = (page - 1) * page_size;

    Pagination {
        page,
        page_size,
        total_pages,
        offset,
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub page: Option<i64>,
    #[serde(default)]
    pub page_size: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
}

/// Cut one page out of a full result list
pub fn paginate<T>(items: Vec<T>, query: &PageQuery) -> Page<T> {
    let total = items.len() as i64;
    let p = calculate_pagination(
        total,
        query.page.unwrap_or(1),
        query.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
    );

    let items = items
        .into_iter()
        .skip(p.offset as usize)
        .take(p.page_size as usize)
        .collect();

    Page {
        items,
        total,
        page: p.page,
        page_size: p.page_size,
        total_pages: p.total_pages,
    }
}
