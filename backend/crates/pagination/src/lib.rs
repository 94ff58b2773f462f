//! Page request and pagination envelope primitives shared by list endpoints.
//!
//! Endpoints accept `page` (1-based) and `perPage` query parameters and answer
//! with a [`Page`] envelope:
//!
//! ```json
//! {"items": [], "page": 1, "perPage": 20, "total": 0, "totalPages": 0}
//! ```
//!
//! Adapters translate a [`PageRequest`] into `LIMIT`/`OFFSET` pairs via
//! [`PageRequest::limit`] and [`PageRequest::offset`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default number of items returned when the caller does not ask for a size.
pub const DEFAULT_PER_PAGE: u32 = 20;
/// Largest page size a caller may request.
pub const MAX_PER_PAGE: u32 = 100;

/// Validation failures raised while building a [`PageRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PageRequestError {
    /// The page number was zero.
    #[error("page must be at least 1")]
    ZeroPage,
    /// The requested page size was outside `1..=MAX_PER_PAGE`.
    #[error("perPage must be between 1 and {max}")]
    PerPageOutOfRange {
        /// Upper bound for the page size.
        max: u32,
    },
}

/// Raw query parameters as they arrive from the transport layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageParams {
    /// Requested 1-based page number.
    pub page: Option<u32>,
    /// Requested page size.
    pub per_page: Option<u32>,
}

/// Validated page request.
///
/// ## Invariants
/// - `page >= 1`
/// - `1 <= per_page <= MAX_PER_PAGE`
///
/// # Examples
/// ```
/// use pagination::PageRequest;
///
/// let request = PageRequest::new(3, 10).expect("valid page");
/// assert_eq!(request.offset(), 20);
/// assert_eq!(request.limit(), 10);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    per_page: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl PageRequest {
    /// Validate and construct a page request.
    ///
    /// # Errors
    /// Returns [`PageRequestError`] when either bound is violated.
    pub const fn new(page: u32, per_page: u32) -> Result<Self, PageRequestError> {
        if page == 0 {
            return Err(PageRequestError::ZeroPage);
        }
        if per_page == 0 || per_page > MAX_PER_PAGE {
            return Err(PageRequestError::PerPageOutOfRange { max: MAX_PER_PAGE });
        }
        Ok(Self { page, per_page })
    }

    /// Build a request from optional query parameters, applying defaults.
    ///
    /// # Errors
    /// Returns [`PageRequestError`] when a supplied value is out of range.
    pub fn from_params(params: PageParams) -> Result<Self, PageRequestError> {
        Self::new(
            params.page.unwrap_or(1),
            params.per_page.unwrap_or(DEFAULT_PER_PAGE),
        )
    }

    /// 1-based page number.
    #[must_use]
    pub const fn page(&self) -> u32 {
        self.page
    }

    /// Number of items per page.
    #[must_use]
    pub const fn per_page(&self) -> u32 {
        self.per_page
    }

    /// Number of rows to fetch.
    #[must_use]
    pub fn limit(&self) -> i64 {
        i64::from(self.per_page)
    }

    /// Number of rows to skip.
    #[must_use]
    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.per_page)
    }
}

/// Page envelope returned by list endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    /// Items on this page.
    pub items: Vec<T>,
    /// 1-based page number.
    pub page: u32,
    /// Requested page size.
    pub per_page: u32,
    /// Total items across every page.
    pub total: u64,
    /// Total number of pages.
    pub total_pages: u64,
}

impl<T> Page<T> {
    /// Wrap one page of items together with the overall total.
    #[must_use]
    pub fn new(items: Vec<T>, request: PageRequest, total: u64) -> Self {
        Self {
            items,
            page: request.page(),
            per_page: request.per_page(),
            total,
            total_pages: total.div_ceil(u64::from(request.per_page())),
        }
    }

    /// An empty page for the given request.
    #[must_use]
    pub fn empty(request: PageRequest) -> Self {
        Self::new(Vec::new(), request, 0)
    }

    /// Transform the items while keeping the paging metadata.
    #[must_use]
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            per_page: self.per_page,
            total: self.total,
            total_pages: self.total_pages,
        }
    }

    /// Slice an in-memory collection into the requested page.
    #[must_use]
    pub fn from_slice(all: Vec<T>, request: PageRequest) -> Self {
        let total = all.len() as u64;
        let skip = usize::try_from(request.offset()).unwrap_or(usize::MAX);
        let take = usize::try_from(request.limit()).unwrap_or(usize::MAX);
        let items = all.into_iter().skip(skip).take(take).collect();
        Self::new(items, request, total)
    }
}
