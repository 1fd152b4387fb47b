//! Date-windowed pagination engine.
//!
//! One generic loop drives every site. A site plugs in through [`ListingSource`]
//! (how to open the listing, read its rows, move to the next page and fetch a
//! detail page) and the engine decides, page by page, what to keep and when to
//! stop.
//!
//! # Stop criterion
//!
//! Listings are assumed to be sorted newest first. As soon as a page shows a row
//! dated before the window start, every later page is older still, so the engine
//! finishes the current page and does not ask for another one. A detail page can
//! raise the same signal through [`DetailOutcome::StopSignal`].
//!
//! # Per-page policy
//!
//! 1. Rows dated inside the window, and rows whose date only appears on the
//!    detail page, go to the [`DetailFetcher`]; whatever it matches is kept.
//! 2. A row older than the window (or a stop signal from a detail page) ends
//!    the run after this page.
//! 3. Otherwise the page-count ceiling is checked, then the next page is
//!    requested. No next page, or a failure getting it, ends the run with what
//!    has been collected so far.
//!
//! Dates that fail to parse are ignored: they never match and never stop the
//! run. A layout change that breaks every date therefore runs until the page
//! ceiling; pages where that happens are logged at `warn`.

pub mod detail;

use tracing::{debug, info, instrument, warn};

use crate::dates::{DateWindow, RowDate, classify};
use crate::error::ScrapeError;
use crate::models::{DetailOutcome, ListingPage, ListingRow, Record, ScrapeResult, TerminationReason};
use crate::utils::truncate_for_log;

pub use detail::{Candidate, CandidateKind, DetailBatch, DetailFetcher};

/// Capabilities a site provides to the engine.
///
/// Everything site specific (selectors, URL layout, detail fields) lives behind
/// this boundary; the engine only sees rows, dates and pages.
#[allow(async_fn_in_trait)]
pub trait ListingSource {
    /// Display name used in logs and file names.
    fn name(&self) -> &str;

    /// Accepted date formats, tried in order. The first is the canonical one.
    fn date_formats(&self) -> &[&'static str];

    /// Load the first listing page.
    async fn open(&self) -> Result<ListingPage, ScrapeError>;

    /// Rows of a page in listing order.
    ///
    /// Returns [`ScrapeError::Structure`] when the listing container itself is
    /// missing; an empty container is `Ok(vec![])`.
    fn read_rows(&self, page: &ListingPage) -> Result<Vec<ListingRow>, ScrapeError>;

    /// Move to the page after `page`; `Ok(None)` when there is none.
    async fn advance_page(&self, page: &ListingPage) -> Result<Option<ListingPage>, ScrapeError>;

    /// Fetch the row's detail page and decide what to do with the row.
    async fn fetch_detail(
        &self,
        row: &ListingRow,
        window: &DateWindow,
    ) -> Result<DetailOutcome, ScrapeError>;
}

/// Bounds for one engine run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineLimits {
    /// Hard ceiling on listing pages visited.
    pub max_pages: usize,
    /// Simultaneous detail fetches.
    pub concurrency: usize,
    /// Detail fetches dispatched per batch.
    pub batch_size: usize,
}

impl Default for EngineLimits {
    fn default() -> Self {
        Self {
            max_pages: 50,
            concurrency: 5,
            batch_size: 5,
        }
    }
}

/// Mutable state of one run; never outlives [`paginate`].
#[derive(Debug, Default)]
struct PaginationState {
    page_number: usize,
    stop_requested: bool,
    records: Vec<Record>,
}

/// Date evaluation of one listing page.
#[derive(Debug, Default)]
pub struct PageScan {
    /// Some row is dated inside the window.
    pub has_match: bool,
    /// Some row is dated before the window start.
    pub should_stop: bool,
    /// Rows worth a detail fetch, in listing order.
    pub candidates: Vec<Candidate>,
    /// Rows that carried a listing date.
    pub dated: usize,
    /// Rows whose listing date did not parse.
    pub unparseable: usize,
}

impl PageScan {
    pub fn deferred(&self) -> usize {
        self.candidates
            .iter()
            .filter(|c| c.kind == CandidateKind::Deferred)
            .count()
    }
}

/// Classify every row of a page against the window.
pub fn scan_page(rows: Vec<ListingRow>, formats: &[&str], window: &DateWindow) -> PageScan {
    let mut scan = PageScan::default();
    for row in rows {
        let Some(raw) = row.raw_date.as_deref() else {
            scan.candidates.push(Candidate::deferred(row));
            continue;
        };
        scan.dated += 1;
        match classify(raw, formats, window) {
            RowDate::InWindow(_) => {
                scan.has_match = true;
                scan.candidates.push(Candidate::listed(row));
            }
            RowDate::Older(date) => {
                debug!(%date, row = %truncate_for_log(row.label(), 50), "Row older than window");
                scan.should_stop = true;
            }
            RowDate::Newer(_) => {}
            RowDate::Unparseable => {
                scan.unparseable += 1;
            }
        }
    }
    scan
}

/// Walk a site's listing under `window` and collect matching records.
///
/// Errors only when the first page cannot be loaded or read; anything that
/// goes wrong later ends the run with [`TerminationReason::NavigationFailure`]
/// and the records gathered so far.
#[instrument(level = "info", skip_all, fields(site = %source.name()))]
pub async fn paginate<S: ListingSource>(
    source: &S,
    window: &DateWindow,
    limits: &EngineLimits,
) -> Result<ScrapeResult, ScrapeError> {
    let fetcher = DetailFetcher::new(limits.concurrency, limits.batch_size);
    let max_pages = limits.max_pages.max(1);
    let mut state = PaginationState::default();

    info!(start = %window.start(), end = %window.end(), max_pages, "Starting pagination");
    let mut page = source.open().await?;

    let termination = loop {
        state.page_number += 1;
        let rows = match source.read_rows(&page) {
            Ok(rows) => rows,
            Err(e) if state.page_number == 1 => return Err(e),
            Err(e) => {
                warn!(page = state.page_number, url = %page.url, error = %e, "Could not read listing page");
                break TerminationReason::NavigationFailure;
            }
        };
        let row_count = rows.len();
        let scan = scan_page(rows, source.date_formats(), window);

        if scan.dated > 0 && scan.unparseable == scan.dated {
            warn!(
                page = state.page_number,
                rows = row_count,
                "No listing date on this page could be parsed; the date format may have changed"
            );
        }

        if scan.has_match || scan.deferred() > 0 {
            info!(
                page = state.page_number,
                rows = row_count,
                candidates = scan.candidates.len(),
                deferred = scan.deferred(),
                "Page has candidate rows, extracting"
            );
            let DetailBatch { records, stop } = fetcher.collect(source, scan.candidates, window).await;
            info!(page = state.page_number, matched = records.len(), "Extracted matching rows");
            state.records.extend(records);
            state.stop_requested |= stop;
        } else if !scan.should_stop {
            info!(page = state.page_number, rows = row_count, "No rows in window on this page");
        }

        if scan.should_stop || state.stop_requested {
            info!(page = state.page_number, "Reached notices older than the window, stopping");
            break TerminationReason::StopCriterion;
        }

        if state.page_number >= max_pages {
            info!(max_pages, "Reached page limit, stopping");
            break TerminationReason::PageLimit;
        }

        match source.advance_page(&page).await {
            Ok(Some(next)) => {
                debug!(url = %next.url, "Moved to next page");
                page = next;
            }
            Ok(None) => {
                info!(page = state.page_number, "No more pages");
                break TerminationReason::Exhausted;
            }
            Err(e) => {
                warn!(page = state.page_number, error = %e, "Could not load next page; keeping partial results");
                break TerminationReason::NavigationFailure;
            }
        }
    };

    info!(
        pages = state.page_number,
        records = state.records.len(),
        %termination,
        "Pagination finished"
    );

    Ok(ScrapeResult {
        site: source.name().to_string(),
        records: state.records,
        pages_visited: state.page_number,
        termination,
    })
}
