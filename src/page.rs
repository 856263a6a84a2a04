//! Pagination state carried between calls.
//!
//! A logical paged read moves `First` -> `InProgress` -> `Exhausted`. The caller owns
//! every [`PageState`] between calls; the engine only reads it and emits the next one.

use serde::{Deserialize, Serialize};

use crate::criteria::Sort;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageStatus {
    /// No continuation yet.
    First,
    /// A continuation token is present and more pages are expected.
    InProgress,
    /// The backend signalled that no further continuation exists.
    Exhausted,
}

/// Request side of a paged read.
///
/// The continuation token is opaque and must be passed back exactly as received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageState {
    page_number: u64,
    size: usize,
    offset: u64,
    continuation: Option<String>,
    #[serde(default)]
    sort: Sort,
}

impl PageState {
    /// State for the first page of a query.
    #[must_use]
    pub const fn first(size: usize) -> Self {
        Self { page_number: 0, size, offset: 0, continuation: None, sort: Sort::unsorted() }
    }

    /// Rebuilds a state from its parts, e.g. after a round trip through a client.
    #[must_use]
    pub const fn new(page_number: u64, size: usize, offset: u64, continuation: Option<String>) -> Self {
        Self { page_number, size, offset, continuation, sort: Sort::unsorted() }
    }

    #[must_use]
    pub fn with_sort(mut self, sort: Sort) -> Self {
        self.sort = sort;
        self
    }

    #[must_use]
    pub const fn page_number(&self) -> u64 {
        self.page_number
    }

    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    #[must_use]
    pub const fn offset(&self) -> u64 {
        self.offset
    }

    #[must_use]
    pub fn continuation(&self) -> Option<&str> {
        self.continuation.as_deref()
    }

    #[must_use]
    pub const fn sort(&self) -> &Sort {
        &self.sort
    }

    #[must_use]
    pub const fn status(&self) -> PageStatus {
        if self.continuation.is_some() { PageStatus::InProgress } else { PageStatus::First }
    }
}

/// One page of typed results plus the state needed to fetch the next one.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    content: Vec<T>,
    requested: PageState,
    size: usize,
    continuation: Option<String>,
    total_elements: u64,
}

impl<T> Page<T> {
    /// Assembles a page from backend output.
    ///
    /// When the backend returned fewer items than requested (but some), the reported
    /// size shrinks to the returned count; an empty page keeps the requested size.
    #[must_use]
    pub fn new(
        content: Vec<T>,
        requested: PageState,
        continuation: Option<String>,
        total_elements: u64,
    ) -> Self {
        let size = if !content.is_empty() && content.len() < requested.size {
            content.len()
        } else {
            requested.size
        };
        Self { content, requested, size, continuation, total_elements }
    }

    #[must_use]
    pub fn content(&self) -> &[T] {
        &self.content
    }

    #[must_use]
    pub fn into_content(self) -> Vec<T> {
        self.content
    }

    /// Page size after reconciliation with the returned item count.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    #[must_use]
    pub const fn number(&self) -> u64 {
        self.requested.page_number
    }

    #[must_use]
    pub const fn requested(&self) -> &PageState {
        &self.requested
    }

    #[must_use]
    pub fn continuation(&self) -> Option<&str> {
        self.continuation.as_deref()
    }

    #[must_use]
    pub const fn total_elements(&self) -> u64 {
        self.total_elements
    }

    #[must_use]
    pub const fn total_pages(&self) -> u64 {
        let size = self.requested.size as u64;
        if size == 0 { 0 } else { self.total_elements.div_ceil(size) }
    }

    #[must_use]
    pub const fn status(&self) -> PageStatus {
        if self.continuation.is_some() { PageStatus::InProgress } else { PageStatus::Exhausted }
    }

    #[must_use]
    pub const fn has_next(&self) -> bool {
        self.continuation.is_some()
    }

    /// State for the following page, or `None` once the query is exhausted.
    #[must_use]
    pub fn next_page(&self) -> Option<PageState> {
        let continuation = self.continuation.clone()?;
        Some(PageState {
            page_number: self.requested.page_number + 1,
            size: self.size,
            offset: self.requested.offset + self.content.len() as u64,
            continuation: Some(continuation),
            sort: self.requested.sort.clone(),
        })
    }
}
