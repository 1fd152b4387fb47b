//! Calendar-date windows and site date formats.
//!
//! Every site prints publication dates in its own locale format ("28 Feb 2025",
//! "February 28, 2025", "28-Feb-2025", ...). This module turns those strings into
//! [`NaiveDate`]s and answers the two questions the pagination engine asks about
//! each row: is it inside the window, and is it older than the window.
//!
//! Parsing never fails loudly. A string that matches none of the site's formats
//! is [`RowDate::Unparseable`], which is neither a match nor a reason to stop.

use chrono::{Days, Local, NaiveDate};
use serde::Serialize;
use tracing::debug;

use crate::error::ScrapeError;

/// Inclusive `[start, end]` range of calendar dates considered "recent".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateWindow {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateWindow {
    /// Build a window, rejecting `start > end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, ScrapeError> {
        if start > end {
            return Err(ScrapeError::InvalidWindow { start, end });
        }
        Ok(Self { start, end })
    }

    /// The `days` days before `end`, plus `end` itself.
    pub fn ending_on(end: NaiveDate, days: u64) -> Self {
        let start = end.checked_sub_days(Days::new(days)).unwrap_or(NaiveDate::MIN);
        Self { start, end }
    }

    /// Window ending today in local time.
    pub fn last_days(days: u64) -> Self {
        Self::ending_on(Local::now().date_naive(), days)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Strictly before `start`.
    pub fn is_older(&self, date: NaiveDate) -> bool {
        date < self.start
    }
}

/// Where a row's date falls relative to a [`DateWindow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowDate {
    InWindow(NaiveDate),
    Older(NaiveDate),
    /// Later than the window end; still early in the listing.
    Newer(NaiveDate),
    Unparseable,
}

/// Try each format in order; the first one that parses wins.
pub fn parse_date(raw: &str, formats: &[&str]) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let parsed = formats
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok());
    if parsed.is_none() {
        debug!(raw = %trimmed, ?formats, "Could not parse date");
    }
    parsed
}

pub fn classify(raw: &str, formats: &[&str], window: &DateWindow) -> RowDate {
    match parse_date(raw, formats) {
        Some(date) if window.contains(date) => RowDate::InWindow(date),
        Some(date) if window.is_older(date) => RowDate::Older(date),
        Some(date) => RowDate::Newer(date),
        None => RowDate::Unparseable,
    }
}

/// Re-render a site date in the site's primary format.
///
/// Returns `None` when the input does not parse. Normalising an already
/// normalised string yields the same string.
pub fn normalize(raw: &str, formats: &[&str]) -> Option<String> {
    let primary = formats.first()?;
    parse_date(raw, formats).map(|d| d.format(primary).to_string())
}
