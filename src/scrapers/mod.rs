//! Procurement-notice sources, one module per site.
//!
//! Every site implements [`ListingSource`](crate::engine::ListingSource) and
//! leaves the paging and date logic to the engine. A site module only knows
//! its selectors:
//!
//! 1. **Listing**: which elements are rows, where the date and link sit
//! 2. **Pagination**: where the "next" link is
//! 3. **Detail**: which fields to lift off a notice's own page
//!
//! # Supported Sources
//!
//! | Source | Module | Listing date | Detail page |
//! |--------|--------|--------------|-------------|
//! | World Bank | [`worldbank`] | `February 28, 2025` | project page |
//! | EBRD | [`ebrd`] | `28 Feb 2025` | notice overview |
//! | TendersInfo | [`tendersinfo`] | none (detail: `28 Feb 2025`) | tender form |
//! | ISDB | [`isdb`] | none (detail: `28 December 2022`) | tender fields |
//! | AfDB | [`afdb`] | `28-Feb-2025` | sector keywords |
//! | AIIB | [`aiib`] | `Feb 28, 2025` / `February 28, 2025` | none |
//! | AFD (dgMarket) | [`afd`] | `Feb 28, 2025` | notice page |
//!
//! Pages are retrieved over plain HTTP and parsed with `scraper`; "clicking
//! next" means following the next link's `href`. Missing detail fields are
//! written as [`NOT_AVAILABLE`](crate::models::NOT_AVAILABLE).

pub mod afd;
pub mod afdb;
pub mod aiib;
pub mod ebrd;
pub mod isdb;
pub mod tendersinfo;
pub mod worldbank;

use clap::ValueEnum;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;
use url::Url;

use crate::dates::{DateWindow, RowDate, classify, normalize};
use crate::error::ScrapeError;
use crate::fetch::SiteClient;
use crate::models::{DetailOutcome, ListingPage, ListingRow, Record};
use crate::utils::{clean_text, resolve_link};

/// The sites this tool knows how to crawl.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum Site {
    WorldBank,
    Ebrd,
    TendersInfo,
    Isdb,
    Afdb,
    Aiib,
    Afd,
}

/// Per-site tuning that the config file may override.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SiteDefaults {
    pub max_pages: usize,
    pub concurrency: usize,
    pub batch_size: usize,
    pub timeout_secs: u64,
}

impl Site {
    /// Run order.
    pub const ALL: [Site; 7] = [
        Site::WorldBank,
        Site::Ebrd,
        Site::TendersInfo,
        Site::Isdb,
        Site::Afdb,
        Site::Aiib,
        Site::Afd,
    ];

    /// Name used in logs and output file names.
    pub fn display_name(self) -> &'static str {
        match self {
            Site::WorldBank => "WorldBank",
            Site::Ebrd => "EBRD",
            Site::TendersInfo => "TendersInfo",
            Site::Isdb => "ISDB",
            Site::Afdb => "AfDB",
            Site::Aiib => "AIIB",
            Site::Afd => "AFD",
        }
    }

    pub fn default_url(self) -> &'static str {
        match self {
            Site::WorldBank => worldbank::LISTING_URL,
            Site::Ebrd => ebrd::LISTING_URL,
            Site::TendersInfo => tendersinfo::LISTING_URL,
            Site::Isdb => isdb::LISTING_URL,
            Site::Afdb => afdb::LISTING_URL,
            Site::Aiib => aiib::LISTING_URL,
            Site::Afd => afd::LISTING_URL,
        }
    }

    pub fn defaults(self) -> SiteDefaults {
        let base = SiteDefaults {
            max_pages: 50,
            concurrency: 5,
            batch_size: 5,
            timeout_secs: 60,
        };
        match self {
            Site::WorldBank => SiteDefaults {
                max_pages: 100,
                timeout_secs: 180,
                ..base
            },
            Site::Afdb => SiteDefaults {
                max_pages: 10,
                ..base
            },
            Site::Aiib => SiteDefaults {
                concurrency: 10,
                batch_size: 10,
                ..base
            },
            Site::Isdb => SiteDefaults {
                batch_size: 10,
                ..base
            },
            Site::Ebrd | Site::TendersInfo | Site::Afd => base,
        }
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// HTTP client and entry URL shared by every site implementation.
#[derive(Debug)]
pub struct SiteContext {
    pub client: SiteClient,
    pub entry_url: Url,
}

impl SiteContext {
    pub fn new(client: SiteClient, entry_url: Url) -> Self {
        Self { client, entry_url }
    }

    /// Load the first listing page (retried).
    pub async fn open(&self) -> Result<ListingPage, ScrapeError> {
        let body = self.client.entry(&self.entry_url).await?;
        Ok(ListingPage {
            url: self.entry_url.clone(),
            body,
        })
    }

    /// Load `next`, unless there is none or it points back at `current`.
    pub async fn follow(
        &self,
        current: &ListingPage,
        next: Option<Url>,
    ) -> Result<Option<ListingPage>, ScrapeError> {
        let Some(url) = next else {
            return Ok(None);
        };
        if url == current.url {
            debug!(%url, "Next link points at current page");
            return Ok(None);
        }
        let body = self.client.page(&url).await?;
        Ok(Some(ListingPage { url, body }))
    }

    /// Body of a row's detail page.
    pub async fn detail(&self, row: &ListingRow) -> Result<(Url, String), ScrapeError> {
        let url = row
            .detail_link
            .clone()
            .ok_or_else(|| ScrapeError::Structure("row has no detail link".into()))?;
        let body = self.client.page(&url).await?;
        Ok((url, body))
    }
}

/// Decide a detail page whose `key` date is the only one the row has.
///
/// Older than the window stops pagination; a missing, unparseable or newer
/// date drops the row. A kept row has its date re-rendered in the site's
/// primary format.
pub(crate) fn judge_by_date(
    mut record: Record,
    key: &str,
    formats: &[&str],
    window: &DateWindow,
) -> DetailOutcome {
    let Some(raw) = record.get(key).map(str::to_string) else {
        debug!(key, "Detail page carries no date");
        return DetailOutcome::OutOfRange;
    };
    match classify(&raw, formats, window) {
        RowDate::InWindow(_) => {
            if let Some(canonical) = normalize(&raw, formats) {
                record.put(key, canonical);
            }
            DetailOutcome::Matched(record)
        }
        RowDate::Older(_) => DetailOutcome::StopSignal,
        RowDate::Newer(_) | RowDate::Unparseable => DetailOutcome::OutOfRange,
    }
}

pub(crate) fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid selector {css:?}: {e:?}"))
}

/// Cleaned text content of an element.
pub(crate) fn element_text(el: ElementRef<'_>) -> String {
    clean_text(&el.text().collect::<Vec<_>>().join(" "))
}

/// Cleaned text of the first match under `scope`; `None` if absent or blank.
pub(crate) fn first_text(scope: ElementRef<'_>, sel: &Selector) -> Option<String> {
    scope
        .select(sel)
        .next()
        .map(element_text)
        .filter(|t| !t.is_empty())
}

/// Resolved `href` of the first match under `scope`.
pub(crate) fn first_link(scope: ElementRef<'_>, sel: &Selector, base: &Url) -> Option<Url> {
    scope
        .select(sel)
        .find_map(|el| el.value().attr("href"))
        .and_then(|href| resolve_link(base, href))
}

/// Text of the value that follows a label, e.g. `<label>Status</label><p class="x">Active</p>`.
///
/// Labels are compared after whitespace cleanup and with a trailing colon
/// removed. The value is the first following sibling element if it matches
/// `value`, otherwise the first `value` match inside that sibling.
pub(crate) fn labelled_value(
    doc: &Html,
    label: &Selector,
    text: &str,
    value: &Selector,
) -> Option<String> {
    doc.select(label)
        .filter(|el| element_text(*el).trim_end_matches(':').trim() == text)
        .find_map(|el| {
            let sibling = el.next_siblings().find_map(ElementRef::wrap)?;
            if value.matches(&sibling) {
                Some(element_text(sibling))
            } else {
                first_text(sibling, value)
            }
        })
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_site_has_a_valid_url_and_formats() {
        for site in Site::ALL {
            assert!(Url::parse(site.default_url()).is_ok(), "{site}");
            let d = site.defaults();
            assert!(d.max_pages >= 10 && d.max_pages <= 100, "{site}");
            assert!(d.concurrency >= 5 && d.concurrency <= 10, "{site}");
        }
    }

    #[test]
    fn test_site_names_round_trip_through_serde() {
        let parsed: Site = serde_yaml::from_str("world-bank").unwrap();
        assert_eq!(parsed, Site::WorldBank);
        let parsed: Site = serde_yaml::from_str("tenders-info").unwrap();
        assert_eq!(parsed, Site::TendersInfo);
        assert_eq!(serde_json::to_string(&Site::Afdb).unwrap(), "\"afdb\"");
    }

    #[test]
    fn test_labelled_value() {
        let doc = Html::parse_document(
            r#"<div>
                <label>Project ID</label><p class="document-info">P123456</p>
                <label>Status:</label>
                <div><p>Active</p></div>
            </div>"#,
        );
        let label = selector("label");
        assert_eq!(
            labelled_value(&doc, &label, "Project ID", &selector("p.document-info")),
            Some("P123456".to_string())
        );
        assert_eq!(
            labelled_value(&doc, &label, "Status", &selector("p")),
            Some("Active".to_string())
        );
        assert_eq!(labelled_value(&doc, &label, "Borrower", &selector("p")), None);
    }

    #[test]
    fn test_judge_by_date() {
        let window = DateWindow::new(
            chrono::NaiveDate::from_ymd_opt(2025, 2, 20).unwrap(),
            chrono::NaiveDate::from_ymd_opt(2025, 2, 27).unwrap(),
        )
        .unwrap();
        let formats = &["%d %B %Y", "%d %b %Y"];
        let dated = |d: &str| Record::new().with("ref_no", "TI-1").with("date", d);

        assert_eq!(
            judge_by_date(dated("21 February 2025"), "date", formats, &window),
            DetailOutcome::Matched(dated("21 February 2025"))
        );
        assert_eq!(
            judge_by_date(dated("21 Feb 2025"), "date", formats, &window),
            DetailOutcome::Matched(dated("21 February 2025"))
        );
        assert_eq!(
            judge_by_date(dated("19 Feb 2025"), "date", formats, &window),
            DetailOutcome::StopSignal
        );
        assert_eq!(
            judge_by_date(dated("28 Feb 2025"), "date", formats, &window),
            DetailOutcome::OutOfRange
        );
        assert_eq!(
            judge_by_date(dated("TBD"), "date", formats, &window),
            DetailOutcome::OutOfRange
        );
        let undated = Record::new().with("ref_no", "TI-1");
        assert_eq!(judge_by_date(undated, "date", formats, &window), DetailOutcome::OutOfRange);
    }

    #[test]
    fn test_first_link_resolves_relative_href() {
        let doc = Html::parse_fragment(r#"<div><a href="/notice/7">Notice</a></div>"#);
        let base = Url::parse("https://www.isdb.org/project-procurement/tenders").unwrap();
        assert_eq!(
            first_link(doc.root_element(), &selector("a"), &base).unwrap().as_str(),
            "https://www.isdb.org/notice/7"
        );
    }
}
