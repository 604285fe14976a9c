//! Page/per-page handling shared by list endpoints

/// Default number of rows per page
pub const DEFAULT_PER_PAGE: i64 = 20;
/// Upper bound on rows per page
pub const MAX_PER_PAGE: i64 = 100;
/// Highest page number whose offset still fits in an `i64`
pub const MAX_PAGE: i64 = i64::MAX / MAX_PER_PAGE;

/// Normalised pagination request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub per_page: i64,
}

impl PageRequest {
    /// Build a page request from optional query values, clamping out-of-range input.
    pub fn new(page: Option<i64>, per_page: Option<i64>) -> Self {
        Self {
            page: page.unwrap_or(1).clamp(1, MAX_PAGE),
            per_page: per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE),
        }
    }

    /// Number of rows to skip
    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.per_page
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}
