//! TendersInfo landing page.
//!
//! The landing page shows panels of tender links without dates: "Global
//! Tenders" plus one country panel. Whether a tender belongs in the window is
//! only known from the "Tender Date" on its own page.

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument};
use url::Url;

use super::{SiteContext, element_text, first_link, judge_by_date, labelled_value, selector};
use crate::dates::DateWindow;
use crate::engine::ListingSource;
use crate::error::ScrapeError;
use crate::models::{DetailOutcome, ListingPage, ListingRow, Record};
use crate::utils::resolve_link;

pub const LISTING_URL: &str = "https://www.tendersinfo.com/";
pub const DATE_FORMATS: &[&str] = &["%d %b %Y"];

static PANEL: Lazy<Selector> = Lazy::new(|| selector(".panel"));
static PANEL_HEADING: Lazy<Selector> = Lazy::new(|| selector(".panel-heading"));
static TENDER_LINK: Lazy<Selector> = Lazy::new(|| selector("a.tenderBrief"));
static ACTIVE_PAGE: Lazy<Selector> = Lazy::new(|| selector("ul.pagination li.active"));
static ANCHOR: Lazy<Selector> = Lazy::new(|| selector("a"));
static LABEL: Lazy<Selector> = Lazy::new(|| selector("label"));
static VALUE: Lazy<Selector> = Lazy::new(|| selector("p"));

const GLOBAL: &str = "Global Tenders";
const FREE: &str = "Free Tenders";

const FORM_FIELDS: &[(&str, &str)] = &[
    ("Tender TI Ref No", "ref_no"),
    ("Tender Date", "date"),
    ("Tender Description", "description"),
    ("Tender Deadline", "deadline"),
    ("Tender Project Location", "location"),
    ("Tender Sector", "sector"),
    ("Tender CPV", "cpv"),
    ("Tender Document Type", "document_type"),
];

#[derive(Debug)]
pub struct TendersInfo {
    ctx: SiteContext,
}

impl TendersInfo {
    pub fn new(ctx: SiteContext) -> Self {
        Self { ctx }
    }
}

impl ListingSource for TendersInfo {
    fn name(&self) -> &str {
        "TendersInfo"
    }

    fn date_formats(&self) -> &[&'static str] {
        DATE_FORMATS
    }

    async fn open(&self) -> Result<ListingPage, ScrapeError> {
        self.ctx.open().await
    }

    fn read_rows(&self, page: &ListingPage) -> Result<Vec<ListingRow>, ScrapeError> {
        parse_rows(page)
    }

    async fn advance_page(&self, page: &ListingPage) -> Result<Option<ListingPage>, ScrapeError> {
        let next = next_page(page);
        self.ctx.follow(page, next).await
    }

    #[instrument(level = "debug", skip_all, fields(row = %row.label()))]
    async fn fetch_detail(
        &self,
        row: &ListingRow,
        window: &DateWindow,
    ) -> Result<DetailOutcome, ScrapeError> {
        let (url, body) = self.ctx.detail(row).await?;
        let record = parse_tender(&body, &url);
        Ok(judge_by_date(record, "date", DATE_FORMATS, window))
    }
}

fn heading_text(panel: ElementRef<'_>) -> String {
    panel
        .select(&PANEL_HEADING)
        .next()
        .map(element_text)
        .unwrap_or_default()
}

/// Links of the Global Tenders panel, then of the first country panel.
pub fn parse_rows(page: &ListingPage) -> Result<Vec<ListingRow>, ScrapeError> {
    let doc = Html::parse_document(&page.body);
    let panels = doc
        .select(&PANEL)
        .map(|p| (heading_text(p), p))
        .filter(|(heading, _)| !heading.is_empty())
        .collect::<Vec<_>>();
    if panels.is_empty() {
        return Err(ScrapeError::Structure(format!(
            "no tender panels on {}",
            page.url
        )));
    }

    let global = panels.iter().find(|(h, _)| h.contains(GLOBAL));
    let country = panels
        .iter()
        .find(|(h, _)| !h.contains(GLOBAL) && !h.contains(FREE));

    let mut rows = Vec::new();
    for (heading, panel) in global.into_iter().chain(country) {
        let before = rows.len();
        rows.extend(panel_links(*panel, &page.url));
        debug!(panel = %heading, links = rows.len() - before, "Read tender panel");
    }
    Ok(rows)
}

fn panel_links(panel: ElementRef<'_>, base: &Url) -> Vec<ListingRow> {
    panel
        .select(&TENDER_LINK)
        .filter_map(|a| {
            let link = resolve_link(base, a.value().attr("href")?)?;
            let fields = Record::new()
                .with("title", element_text(a))
                .with("url", link.as_str());
            Some(ListingRow::new(None, fields, Some(link)))
        })
        .collect()
}

/// The page after the active one in the numbered pager.
pub fn next_page(page: &ListingPage) -> Option<Url> {
    let doc = Html::parse_document(&page.body);
    let active = doc.select(&ACTIVE_PAGE).next()?;
    let next = active.next_siblings().find_map(ElementRef::wrap)?;
    if next.value().classes().any(|c| c == "disabled") {
        return None;
    }
    first_link(next, &ANCHOR, &page.url)
}

pub fn parse_tender(body: &str, url: &Url) -> Record {
    let doc = Html::parse_document(body);
    let mut record = Record::new();
    for (label, key) in FORM_FIELDS {
        let value = labelled_value(&doc, &LABEL, label, &VALUE);
        // The date decides the row, so it is never papered over with N/A.
        if *key == "date" {
            record.set(*key, value);
        } else {
            record.put_or_na(*key, value);
        }
    }
    record.put("url", url.to_string());
    record
}
