use serde::Deserialize;

pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    limit: i64,
    offset: Option<i64>,
}

impl Pagination {
    pub fn new(limit: i64, offset: Option<i64>) -> Self {
        Self { limit, offset }
    }

    /// Pages are 1-based; anything below 1 is treated as the first page.
    /// `size` is clamped to `1..=MAX_PAGE_SIZE`.
    pub fn page(page: i64, size: i64) -> Self {
        let size = size.clamp(1, MAX_PAGE_SIZE);
        Self::new(size, Some((page.max(1) - 1).saturating_mul(size)))
    }

    pub fn limit(&self) -> i64 {
        self.limit
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PageQuery {
    #[serde(default = "first_page")]
    pub page: i64,
    #[serde(default = "default_size")]
    pub size: i64,
}

pub(crate) fn first_page() -> i64 {
    1
}

pub(crate) fn default_size() -> i64 {
    20
}

impl From<PageQuery> for Pagination {
    fn from(q: PageQuery) -> Self {
        Pagination::page(q.page, q.size)
    }
}
