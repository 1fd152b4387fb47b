//! Bounded concurrent detail-page fetching.
//!
//! Candidates are split into batches. Each batch is dispatched at once and
//! awaited as a whole before the next one starts, and a semaphore caps how many
//! detail fetches are in flight at any moment. One failing fetch never takes
//! the rest of its batch down with it.

use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::ListingSource;
use crate::dates::DateWindow;
use crate::models::{DetailOutcome, ListingRow, Record};
use crate::utils::truncate_for_log;

/// Why a row was handed to the detail fetcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateKind {
    /// Listing date is inside the window; the row is kept even if its detail page fails.
    Listed,
    /// No listing date; only the detail page can say whether the row belongs.
    Deferred,
}

#[derive(Debug, Clone)]
pub struct Candidate {
    pub row: ListingRow,
    pub kind: CandidateKind,
}

impl Candidate {
    pub fn listed(row: ListingRow) -> Self {
        Self {
            row,
            kind: CandidateKind::Listed,
        }
    }

    pub fn deferred(row: ListingRow) -> Self {
        Self {
            row,
            kind: CandidateKind::Deferred,
        }
    }

    /// What to keep when the detail page gives us nothing.
    fn without_detail(&self) -> DetailOutcome {
        match self.kind {
            CandidateKind::Listed => DetailOutcome::Matched(self.row.fields.clone()),
            CandidateKind::Deferred => DetailOutcome::OutOfRange,
        }
    }
}

/// Records matched across all batches of one page.
#[derive(Debug, Default)]
pub struct DetailBatch {
    pub records: Vec<Record>,
    /// Some detail page dated its notice before the window.
    pub stop: bool,
}

#[derive(Debug, Clone)]
pub struct DetailFetcher {
    permits: Arc<Semaphore>,
    batch_size: usize,
}

impl DetailFetcher {
    pub fn new(concurrency: usize, batch_size: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(concurrency.max(1))),
            batch_size: batch_size.max(1),
        }
    }

    /// Fetch details for `candidates`, batch by batch, in listing order.
    ///
    /// After a batch that produced a stop signal, the remaining batches are
    /// not dispatched.
    pub async fn collect<S: ListingSource>(
        &self,
        source: &S,
        candidates: Vec<Candidate>,
        window: &DateWindow,
    ) -> DetailBatch {
        let mut out = DetailBatch::default();
        let batches = candidates.len().div_ceil(self.batch_size);

        for (i, batch) in candidates.chunks(self.batch_size).enumerate() {
            debug!(batch = i + 1, of = batches, size = batch.len(), "Dispatching detail batch");

            let outcomes = join_all(batch.iter().map(|c| self.fetch_one(source, c, window))).await;

            let before = out.records.len();
            let mut batch_stop = false;
            for outcome in outcomes {
                match outcome {
                    DetailOutcome::Matched(record) => out.records.push(record),
                    DetailOutcome::OutOfRange => {}
                    DetailOutcome::StopSignal => batch_stop = true,
                }
            }
            debug!(batch = i + 1, matched = out.records.len() - before, "Detail batch done");

            if batch_stop {
                info!(batch = i + 1, "Detail page dated before window; skipping remaining batches");
                out.stop = true;
                break;
            }
        }

        out
    }

    async fn fetch_one<S: ListingSource>(
        &self,
        source: &S,
        candidate: &Candidate,
        window: &DateWindow,
    ) -> DetailOutcome {
        let Some(link) = candidate.row.detail_link.as_ref() else {
            if candidate.kind == CandidateKind::Deferred {
                debug!(row = %truncate_for_log(candidate.row.label(), 50), "Undated row without detail link; dropping");
            }
            return candidate.without_detail();
        };

        let _permit = match self.permits.acquire().await {
            Ok(permit) => permit,
            Err(e) => {
                warn!(error = %e, "Detail permit pool closed");
                return candidate.without_detail();
            }
        };

        match source.fetch_detail(&candidate.row, window).await {
            Ok(DetailOutcome::Matched(extra)) => {
                let mut fields = candidate.row.fields.clone();
                fields.merge(extra);
                debug!(url = %link, "Merged detail fields");
                DetailOutcome::Matched(fields)
            }
            Ok(other) => {
                debug!(url = %link, outcome = ?other, "Detail page excludes row");
                other
            }
            Err(e) => {
                warn!(url = %link, error = %e, "Detail fetch failed; falling back to listing fields");
                candidate.without_detail()
            }
        }
    }
}
