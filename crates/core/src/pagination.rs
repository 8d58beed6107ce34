//! Page requests, page windows, and request sequencing.
//!
//! A [`PageWindow`] is a snapshot of one page of the server's record
//! collection. It is never updated in place: every page or filter change
//! produces a new window. [`RequestSequencer`] hands out monotonically
//! increasing tickets so a controller can tell whether a response still
//! belongs to the most recently issued request.

use std::ops::Range;

use crate::error::CoreError;
use crate::records::{DetectionRecord, RecordPage, RecordType};

/// Page size used when the caller has not chosen one.
pub const DEFAULT_PAGE_SIZE: u32 = 8;

// ---------------------------------------------------------------------------
// Page request
// ---------------------------------------------------------------------------

/// A validated `(page, limit)` pair. Pages are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    limit: u32,
}

impl PageRequest {
    /// Build a page request, rejecting `page == 0` and `limit == 0`.
    pub fn new(page: u32, limit: u32) -> Result<Self, CoreError> {
        if page == 0 {
            return Err(CoreError::Validation("page must be >= 1".into()));
        }
        if limit == 0 {
            return Err(CoreError::Validation("page size must be > 0".into()));
        }
        Ok(Self { page, limit })
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Index of the first record on this page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }

    /// Half-open index range `[(page-1)*limit, page*limit)`.
    pub fn range(&self) -> Range<u64> {
        let start = self.offset();
        start..start + u64::from(self.limit)
    }

    /// Same page size, different page.
    pub fn with_page(&self, page: u32) -> Result<Self, CoreError> {
        Self::new(page, self.limit)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

// ---------------------------------------------------------------------------
// Page window
// ---------------------------------------------------------------------------

/// The client's snapshot of one page of records.
#[derive(Debug, Clone, PartialEq)]
pub struct PageWindow {
    request: PageRequest,
    filter: Option<RecordType>,
    total_count: u64,
    items: Vec<DetectionRecord>,
}

impl PageWindow {
    /// A window that has not been loaded yet.
    pub fn empty(request: PageRequest, filter: Option<RecordType>) -> Self {
        Self {
            request,
            filter,
            total_count: 0,
            items: Vec::new(),
        }
    }

    /// Build a window from a server page.
    ///
    /// Items beyond the page size are dropped so the window never holds
    /// more than one page, whatever the server sent.
    pub fn from_page(request: PageRequest, filter: Option<RecordType>, page: RecordPage) -> Self {
        let mut items = page.data;
        items.truncate(request.limit() as usize);
        Self {
            request,
            filter,
            total_count: page.total,
            items,
        }
    }

    pub fn request(&self) -> PageRequest {
        self.request
    }

    pub fn page_number(&self) -> u32 {
        self.request.page()
    }

    pub fn page_size(&self) -> u32 {
        self.request.limit()
    }

    pub fn filter(&self) -> Option<RecordType> {
        self.filter
    }

    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    pub fn items(&self) -> &[DetectionRecord] {
        &self.items
    }

    /// Number of pages needed for `total_count` records (at least 1).
    pub fn page_count(&self) -> u64 {
        let limit = u64::from(self.request.limit());
        self.total_count.div_ceil(limit).max(1)
    }

    /// Whether this window starts beyond the last record.
    pub fn is_past_end(&self) -> bool {
        self.request.offset() >= self.total_count && self.total_count > 0
    }
}

// ---------------------------------------------------------------------------
// Request sequencing
// ---------------------------------------------------------------------------

/// Sequence number attached to one issued request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ticket(u64);

impl Ticket {
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Issues tickets for last-requested-wins response handling.
#[derive(Debug, Default)]
pub struct RequestSequencer {
    latest: u64,
}

impl RequestSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a ticket newer than every ticket issued so far.
    pub fn issue(&mut self) -> Ticket {
        self.latest += 1;
        Ticket(self.latest)
    }

    /// `true` only for the most recently issued ticket.
    pub fn is_current(&self, ticket: Ticket) -> bool {
        ticket.0 == self.latest
    }

    /// Abandon interest in every outstanding ticket.
    pub fn invalidate(&mut self) {
        self.latest += 1;
    }
}
