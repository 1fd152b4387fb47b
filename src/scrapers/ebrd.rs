//! EBRD procurement notices.
//!
//! Search results are cards with an issue date block; each card links to a
//! notice page laid out as titled overview cards.

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument};
use url::Url;

use super::{SiteContext, element_text, first_link, first_text, selector};
use crate::dates::DateWindow;
use crate::engine::ListingSource;
use crate::error::ScrapeError;
use crate::models::{DetailOutcome, ListingPage, ListingRow, Record};

pub const LISTING_URL: &str = "https://www.ebrd.com/work-with-us/procurement/notices.html";
pub const DATE_FORMATS: &[&str] = &["%d %b %Y", "%d %B %Y"];

static RESULTS: Lazy<Selector> = Lazy::new(|| selector("[class*='search-result']"));
static CARD: Lazy<Selector> = Lazy::new(|| selector(".search-result__result-card"));
static ISSUE_DATE: Lazy<Selector> = Lazy::new(|| {
    selector(".search-result__project-details.date-block div:first-child p:last-child span:last-child")
});
static TITLE_LINK: Lazy<Selector> = Lazy::new(|| selector("h4.project-details a"));
static NEXT: Lazy<Selector> = Lazy::new(|| selector("a.pagination__button--next:not(.disabled)"));
static PROJECT_ID: Lazy<Selector> = Lazy::new(|| selector(".project-overview__projectID"));
static OVERVIEW_CARD: Lazy<Selector> = Lazy::new(|| selector(".project-overview__main-card"));
static CARD_TITLE: Lazy<Selector> = Lazy::new(|| selector(".project-overview__card-title"));
static CARD_VALUE: Lazy<Selector> = Lazy::new(|| selector(".project-overview__card-description"));

const OVERVIEW_FIELDS: &[(&str, &str)] = &[
    ("Procurement Ref No.", "procurement_ref_no"),
    ("Location", "location"),
    ("City Name", "city_name"),
    ("Business Sector", "business_sector"),
    ("Funding Source", "funding_source"),
    ("Notice Type", "notice_type"),
    ("Contract Type", "contract_type"),
    ("Issue Date", "issue_date"),
    ("Closing Date", "closing_date"),
];

/// Keys also read from the listing card.
const LISTING_KEYS: &[&str] = &["issue_date"];

#[derive(Debug)]
pub struct Ebrd {
    ctx: SiteContext,
}

impl Ebrd {
    pub fn new(ctx: SiteContext) -> Self {
        Self { ctx }
    }
}

impl ListingSource for Ebrd {
    fn name(&self) -> &str {
        "EBRD"
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
        _window: &DateWindow,
    ) -> Result<DetailOutcome, ScrapeError> {
        let (url, body) = self.ctx.detail(row).await?;
        Ok(DetailOutcome::Matched(parse_notice(&body, &url)))
    }
}

pub fn parse_rows(page: &ListingPage) -> Result<Vec<ListingRow>, ScrapeError> {
    let doc = Html::parse_document(&page.body);
    if doc.select(&RESULTS).next().is_none() {
        return Err(ScrapeError::Structure(format!(
            "search results missing on {}",
            page.url
        )));
    }
    let rows = doc
        .select(&CARD)
        .filter_map(|card| parse_card(card, &page.url))
        .collect::<Vec<_>>();
    debug!(rows = rows.len(), "Read EBRD cards");
    Ok(rows)
}

fn parse_card(card: ElementRef<'_>, base: &Url) -> Option<ListingRow> {
    let date = first_text(card, &ISSUE_DATE)?;
    let link = first_link(card, &TITLE_LINK, base);

    let mut fields = Record::new();
    if let Some(title) = first_text(card, &TITLE_LINK) {
        fields.put("title", title);
    }
    fields.put("issue_date", date.clone());
    if let Some(link) = &link {
        fields.put("url", link.to_string());
    }
    Some(ListingRow::new(Some(date), fields, link))
}

pub fn next_page(page: &ListingPage) -> Option<Url> {
    let doc = Html::parse_document(&page.body);
    first_link(doc.root_element(), &NEXT, &page.url)
}

/// Overview fields of a notice page; absent cards become `N/A`, except
/// fields the listing card already carries, which are left out.
pub fn parse_notice(body: &str, url: &Url) -> Record {
    let doc = Html::parse_document(body);
    let mut record = Record::new();
    record.put_or_na("project_id", first_text(doc.root_element(), &PROJECT_ID));
    for (title, key) in OVERVIEW_FIELDS {
        match overview_value(&doc, title) {
            Some(value) => record.put(*key, value),
            None if LISTING_KEYS.contains(key) => {}
            None => record.put_or_na(*key, None),
        }
    }
    record.put("url", url.to_string());
    record
}

fn overview_value(doc: &Html, title: &str) -> Option<String> {
    doc.select(&OVERVIEW_CARD)
        .find(|card| card.select(&CARD_TITLE).next().map(element_text).as_deref() == Some(title))
        .and_then(|card| first_text(card, &CARD_VALUE))
}
