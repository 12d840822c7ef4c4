//! Paginated variant of the result envelope

use serde::{Deserialize, Serialize};

use super::result::{AdapterResult, ErrorInfo, ResultMetadata};

/// Default page requested when the caller supplies none
pub const DEFAULT_PAGE: u32 = 1;
/// Default page size
pub const DEFAULT_LIMIT: u32 = 50;
/// Largest page size a caller may request
pub const MAX_LIMIT: u32 = 100;

/// Sort direction for list operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Validated pagination request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationParams {
    pub page: u32,
    pub limit: u32,
    pub sort_by: Option<String>,
    pub sort_order: SortOrder,
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
            sort_by: None,
            sort_order: SortOrder::Desc,
        }
    }
}

impl PaginationParams {
    /// Number of rows to skip for this page
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }
}

/// One page of rows as returned by a data collaborator
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_count: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total_count: u64) -> Self {
        Self { items, total_count }
    }

    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            total_count: 0,
        }
    }
}

/// Page position derived from `(current_page, limit, total_count)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: u32,
    pub total_pages: u64,
    pub total_count: u64,
    pub limit: u32,
    pub has_next: bool,
    pub has_prev: bool,
}

impl Pagination {
    /// `total_pages = ceil(total_count / limit)`; a zero limit yields zero pages.
    pub fn new(current_page: u32, limit: u32, total_count: u64) -> Self {
        let total_pages = if limit == 0 {
            0
        } else {
            total_count.div_ceil(u64::from(limit))
        };
        Self {
            current_page,
            total_pages,
            total_count,
            limit,
            has_next: u64::from(current_page) < total_pages,
            has_prev: current_page > 1,
        }
    }
}

/// `AdapterResult<Vec<T>>` plus pagination on success
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaginatedResult<T> {
    #[serde(flatten)]
    result: AdapterResult<Vec<T>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pagination: Option<Pagination>,
}

impl<T> PaginatedResult<T> {
    /// Combine a result with the page position it was produced for
    pub fn from_result(result: AdapterResult<Vec<T>>, pagination: Option<Pagination>) -> Self {
        // Pagination only describes data that is actually present
        let pagination = if result.is_success() { pagination } else { None };
        Self { result, pagination }
    }

    pub fn err(error: ErrorInfo) -> Self {
        Self {
            result: AdapterResult::err(error),
            pagination: None,
        }
    }

    pub fn with_metadata(mut self, metadata: ResultMetadata) -> Self {
        self.result = self.result.with_metadata(metadata);
        self
    }

    pub fn is_success(&self) -> bool {
        self.result.is_success()
    }

    pub fn items(&self) -> Option<&[T]> {
        self.result.data().map(Vec::as_slice)
    }

    pub fn error(&self) -> Option<&ErrorInfo> {
        self.result.error()
    }

    pub fn metadata(&self) -> Option<&ResultMetadata> {
        self.result.metadata()
    }

    pub fn pagination(&self) -> Option<&Pagination> {
        self.pagination.as_ref()
    }

    pub fn into_parts(self) -> (AdapterResult<Vec<T>>, Option<Pagination>) {
        (self.result, self.pagination)
    }
}
