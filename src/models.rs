//! Data models shared by the engine, the site scrapers and the outputs.
//!
//! - [`Record`]: an ordered, flat `column -> value` mapping; one CSV row
//! - [`ListingRow`]: one entry read off a listing page
//! - [`ListingPage`]: a fetched listing page (URL + HTML body)
//! - [`DetailOutcome`]: what a detail-page fetch says about its row
//! - [`ScrapeResult`]: everything one site run produced
//! - [`SiteReport`] / [`RunSummary`]: what the run summary file records

use chrono::{DateTime, Local};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;
use url::Url;

use crate::dates::DateWindow;

/// Placeholder written when a detail page lacks a field.
pub const NOT_AVAILABLE: &str = "N/A";

/// Ordered flat mapping of column name to optional value.
///
/// Insertion order is kept so the CSV columns come out in the order the site
/// presents them. Setting an existing key replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: Vec<(String, Option<String>)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: Option<String>) {
        let key = key.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((key, value)),
        }
    }

    /// Set a present value.
    pub fn put(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.set(key, Some(value.into()));
    }

    /// Set a value, falling back to [`NOT_AVAILABLE`].
    pub fn put_or_na(&mut self, key: impl Into<String>, value: Option<String>) {
        self.set(key, Some(value.unwrap_or_else(|| NOT_AVAILABLE.to_string())));
    }

    /// Builder-style [`Record::put`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.put(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, v)| v.as_deref())
    }

    #[cfg(test)]
    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.iter().any(|(k, _)| k == key)
    }

    /// Overlay `other` on top of `self`; shared keys take `other`'s value.
    pub fn merge(&mut self, other: Record) {
        for (k, v) in other.fields {
            self.set(k, v);
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (k, v) in &self.fields {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// One entry on a listing page.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingRow {
    /// Date as printed on the listing, if the listing shows one at all.
    pub raw_date: Option<String>,
    /// Display fields read from the listing (title, country, sector, ...).
    pub fields: Record,
    /// Absolute URL of the notice's detail page.
    pub detail_link: Option<Url>,
}

impl ListingRow {
    pub fn new(raw_date: Option<String>, fields: Record, detail_link: Option<Url>) -> Self {
        Self {
            raw_date,
            fields,
            detail_link,
        }
    }

    /// Short human label for logs.
    pub fn label(&self) -> &str {
        self.fields
            .get("title")
            .or_else(|| self.fields.get("description"))
            .or_else(|| self.detail_link.as_ref().map(|u| u.as_str()))
            .unwrap_or("<untitled>")
    }
}

/// A fetched listing page.
#[derive(Debug, Clone)]
pub struct ListingPage {
    pub url: Url,
    pub body: String,
}

/// What a detail-page fetch concluded about its row.
#[derive(Debug, Clone, PartialEq)]
pub enum DetailOutcome {
    /// Keep the row; these fields are merged over the listing fields.
    Matched(Record),
    /// The detail page dates the notice outside the window; drop the row.
    OutOfRange,
    /// The detail page dates the notice before the window; drop it and stop paginating.
    StopSignal,
}

/// Why a site's pagination ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    /// The site reported no further page.
    Exhausted,
    /// A row older than the window was seen.
    StopCriterion,
    /// The page-count ceiling was reached.
    PageLimit,
    /// Moving to the next page failed; results so far are kept.
    NavigationFailure,
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TerminationReason::Exhausted => "no more pages",
            TerminationReason::StopCriterion => "older notices reached",
            TerminationReason::PageLimit => "page limit reached",
            TerminationReason::NavigationFailure => "navigation failed",
        };
        f.write_str(s)
    }
}

/// Output of one site run.
#[derive(Debug, Clone)]
pub struct ScrapeResult {
    pub site: String,
    pub records: Vec<Record>,
    pub pages_visited: usize,
    pub termination: TerminationReason,
}

/// Outcome of one site in a run, successful or not.
#[derive(Debug, Clone, Serialize)]
pub struct SiteReport {
    pub site: String,
    pub rows: usize,
    pub output: Option<PathBuf>,
    pub pages_visited: usize,
    pub termination: Option<TerminationReason>,
    pub error: Option<String>,
}

impl SiteReport {
    /// A site that produced nothing because of `error`.
    pub fn failed(site: impl Into<String>, error: impl fmt::Display) -> Self {
        Self {
            site: site.into(),
            rows: 0,
            output: None,
            pages_visited: 0,
            termination: None,
            error: Some(error.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: DateTime<Local>,
    pub window: DateWindow,
    pub total_rows: usize,
    pub sites: Vec<SiteReport>,
}

impl RunSummary {
    pub fn new(started_at: DateTime<Local>, window: DateWindow, sites: Vec<SiteReport>) -> Self {
        let total_rows = sites.iter().map(|s| s.rows).sum();
        Self {
            started_at,
            window,
            total_rows,
            sites,
        }
    }

    pub fn failures(&self) -> usize {
        self.sites.iter().filter(|s| s.error.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_keeps_insertion_order() {
        let record = Record::new()
            .with("title", "Road works")
            .with("country", "Kenya")
            .with("publish_date", "20-Feb-2025");
        assert_eq!(
            record.keys().collect::<Vec<_>>(),
            vec!["title", "country", "publish_date"]
        );
    }

    #[test]
    fn test_record_set_replaces_in_place() {
        let mut record = Record::new().with("a", "1").with("b", "2");
        record.put("a", "3");
        assert_eq!(record.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(record.get("a"), Some("3"));
    }

    #[test]
    fn test_merge_overlays_detail_fields() {
        let mut listing = Record::new().with("title", "Bridge").with("sector", "?");
        let detail = Record::new().with("sector", "Transport").with("reference", "R-1");
        listing.merge(detail);
        assert_eq!(listing.get("sector"), Some("Transport"));
        assert_eq!(listing.get("reference"), Some("R-1"));
        assert_eq!(listing.len(), 3);
    }

    #[test]
    fn test_put_or_na() {
        let mut record = Record::new();
        record.put_or_na("funding_agency", None);
        assert_eq!(record.get("funding_agency"), Some(NOT_AVAILABLE));
    }

    #[test]
    fn test_record_serializes_as_ordered_map() {
        let mut record = Record::new().with("z", "last?");
        record.set("a", None);
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"z":"last?","a":null}"#);
    }

    #[test]
    fn test_row_label_falls_back() {
        let row = ListingRow::new(None, Record::new().with("description", "Supply"), None);
        assert_eq!(row.label(), "Supply");
        let bare = ListingRow::new(None, Record::new(), None);
        assert_eq!(bare.label(), "<untitled>");
    }

    #[test]
    fn test_run_summary_totals() {
        let window = DateWindow::ending_on(chrono::NaiveDate::from_ymd_opt(2025, 2, 27).unwrap(), 7);
        let ok = SiteReport {
            site: "AIIB".into(),
            rows: 4,
            output: Some(PathBuf::from("data/processed/AIIB_data_20250227_090000.csv")),
            pages_visited: 2,
            termination: Some(TerminationReason::StopCriterion),
            error: None,
        };
        let failed = SiteReport::failed("EBRD", "timed out loading https://www.ebrd.com/");
        let summary = RunSummary::new(Local::now(), window, vec![ok, failed]);

        assert_eq!(summary.total_rows, 4);
        assert_eq!(summary.failures(), 1);

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["sites"][0]["termination"], "stop_criterion");
        assert_eq!(json["sites"][1]["rows"], 0);
        assert_eq!(json["window"]["start"], "2025-02-20");
    }
}
