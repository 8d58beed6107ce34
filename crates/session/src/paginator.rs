//! Page-at-a-time browsing over a server-owned record collection.
//!
//! Loads may overlap (a page change while the previous page is still in
//! flight). Only the response to the most recently issued load is applied;
//! anything older is dropped, whether it succeeded or failed.

use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Mutex;

use tracklens_core::pagination::{PageRequest, PageWindow, RequestSequencer};
use tracklens_core::records::{RecordPage, RecordType};

use crate::error::SessionError;
use crate::ports::RecordLister;

/// What happened to the response of one load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The response replaced the current window.
    Applied,
    /// A newer load was issued meanwhile; the response was discarded.
    Superseded,
}

struct PaginatorState {
    request: PageRequest,
    filter: Option<RecordType>,
    window: PageWindow,
    sequencer: RequestSequencer,
}

pub struct Paginator<L: RecordLister> {
    lister: L,
    state: Mutex<PaginatorState>,
    in_flight: AtomicUsize,
}

/// Decrements the in-flight counter when a load ends, including when its
/// future is dropped mid-request.
struct InFlightGuard<'a>(&'a AtomicUsize);

impl<'a> InFlightGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl<L: RecordLister> Paginator<L> {
    /// Start on page 1 with the default page size and no filter.
    pub fn new(lister: L) -> Self {
        Self::with_request(lister, PageRequest::default(), None)
    }

    pub fn with_request(lister: L, request: PageRequest, filter: Option<RecordType>) -> Self {
        Self {
            lister,
            state: Mutex::new(PaginatorState {
                request,
                filter,
                window: PageWindow::empty(request, filter),
                sequencer: RequestSequencer::new(),
            }),
            in_flight: AtomicUsize::new(0),
        }
    }

    /// Whether any load of this paginator is in flight.
    pub fn loading(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    /// Snapshot of the current window.
    pub async fn window(&self) -> PageWindow {
        self.state.lock().await.window.clone()
    }

    /// The page, size and filter the next load will use.
    pub async fn request(&self) -> (PageRequest, Option<RecordType>) {
        let state = self.state.lock().await;
        (state.request, state.filter)
    }

    /// Fetch the current page.
    ///
    /// On failure the previous window stays in place and the error is
    /// returned, unless a newer load has been issued in the meantime.
    pub async fn load(&self) -> Result<LoadOutcome, SessionError> {
        let _guard = InFlightGuard::enter(&self.in_flight);

        let (ticket, request, filter) = {
            let mut state = self.state.lock().await;
            (state.sequencer.issue(), state.request, state.filter)
        };
        tracing::debug!(
            ticket = ticket.value(),
            page = request.page(),
            limit = request.limit(),
            filter = ?filter,
            "Loading records page",
        );

        let result = self.lister.list_records(request, filter).await;

        let mut state = self.state.lock().await;
        if !state.sequencer.is_current(ticket) {
            tracing::warn!(
                ticket = ticket.value(),
                page = request.page(),
                failed = result.is_err(),
                "Discarding superseded page response",
            );
            return Ok(LoadOutcome::Superseded);
        }

        let page = drop_mistyped(result?, filter);
        state.window = PageWindow::from_page(request, filter, page);
        tracing::debug!(
            page = request.page(),
            items = state.window.items().len(),
            total = state.window.total_count(),
            "Records page loaded",
        );
        Ok(LoadOutcome::Applied)
    }

    /// Move to another page and load it.
    ///
    /// Pages past the end are not rejected; they load as empty windows.
    pub async fn on_page_change(&self, new_page: u32) -> Result<LoadOutcome, SessionError> {
        {
            let mut state = self.state.lock().await;
            state.request = state.request.with_page(new_page)?;
        }
        self.load().await
    }

    /// Change the type filter, go back to page 1 and load.
    ///
    /// The current window stays until the new page arrives.
    pub async fn set_filter(
        &self,
        filter: Option<RecordType>,
    ) -> Result<LoadOutcome, SessionError> {
        {
            let mut state = self.state.lock().await;
            state.request = state.request.with_page(1)?;
            state.filter = filter;
        }
        self.load().await
    }

    /// Change the page size, go back to page 1 and load.
    pub async fn set_page_size(&self, page_size: u32) -> Result<LoadOutcome, SessionError> {
        {
            let mut state = self.state.lock().await;
            state.request = PageRequest::new(1, page_size)?;
        }
        self.load().await
    }
}

/// Records of another type than the filter asked for are not shown.
fn drop_mistyped(mut page: RecordPage, filter: Option<RecordType>) -> RecordPage {
    if let Some(expected) = filter {
        let before = page.data.len();
        page.data.retain(|r| r.record_type == expected);
        let dropped = before - page.data.len();
        if dropped > 0 {
            tracing::warn!(
                filter = %expected,
                dropped,
                "Server returned records outside the requested type",
            );
        }
    }
    page
}
