//! Islamic Development Bank tenders.
//!
//! The listing only carries titles; the issue date lives on each tender page
//! in Drupal `field--name-field-*` blocks.

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument};
use url::Url;

use super::{SiteContext, element_text, first_link, first_text, judge_by_date, selector};
use crate::dates::DateWindow;
use crate::engine::ListingSource;
use crate::error::ScrapeError;
use crate::models::{DetailOutcome, ListingPage, ListingRow, Record};

pub const LISTING_URL: &str = "https://www.isdb.org/project-procurement/tenders";
pub const DATE_FORMATS: &[&str] = &["%d %B %Y", "%d %b %Y"];

static LISTING: Lazy<Selector> = Lazy::new(|| selector("[data-index-view='tenders_listing']"));
static ARTICLE: Lazy<Selector> = Lazy::new(|| selector("[data-index-view='tenders_listing'] article"));
static TITLE_LINK: Lazy<Selector> = Lazy::new(|| selector(".field-title a"));
static NEXT: Lazy<Selector> = Lazy::new(|| selector("li.pager__item--next a"));
static ISSUE_DATE: Lazy<Selector> = Lazy::new(|| selector(".field--name-field-issue-date .field--item"));
static DOCUMENT: Lazy<Selector> = Lazy::new(|| selector(".field--name-field-documents .file-link a"));

/// Drupal field machine names and the columns they fill.
const TENDER_FIELDS: &[(&str, &str)] = &[
    ("notice-type", "notice_type"),
    ("close-date", "submission_date"),
    ("tender-type", "tender_type"),
    ("project-code", "project_code"),
    ("project-title", "project_title"),
    ("email", "email"),
];

static TENDER_SELECTORS: Lazy<Vec<(Selector, &'static str)>> = Lazy::new(|| {
    TENDER_FIELDS
        .iter()
        .map(|(field, key)| (selector(&format!(".field--name-field-{field} .field--item")), *key))
        .collect()
});

#[derive(Debug)]
pub struct Isdb {
    ctx: SiteContext,
}

impl Isdb {
    pub fn new(ctx: SiteContext) -> Self {
        Self { ctx }
    }
}

impl ListingSource for Isdb {
    fn name(&self) -> &str {
        "ISDB"
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
        debug!(issue_date = ?record.get("issue_date"), "Read tender issue date");
        Ok(judge_by_date(record, "issue_date", DATE_FORMATS, window))
    }
}

pub fn parse_rows(page: &ListingPage) -> Result<Vec<ListingRow>, ScrapeError> {
    let doc = Html::parse_document(&page.body);
    if doc.select(&LISTING).next().is_none() {
        return Err(ScrapeError::Structure(format!(
            "tenders listing missing on {}",
            page.url
        )));
    }
    Ok(doc
        .select(&ARTICLE)
        .filter_map(|article| parse_article(article, &page.url))
        .collect())
}

fn parse_article(article: ElementRef<'_>, base: &Url) -> Option<ListingRow> {
    let link = first_link(article, &TITLE_LINK, base)?;
    let title = article
        .select(&TITLE_LINK)
        .next()
        .map(element_text)
        .unwrap_or_default();
    let fields = Record::new().with("title", title);
    Some(ListingRow::new(None, fields, Some(link)))
}

pub fn next_page(page: &ListingPage) -> Option<Url> {
    let doc = Html::parse_document(&page.body);
    first_link(doc.root_element(), &NEXT, &page.url)
}

pub fn parse_tender(body: &str, url: &Url) -> Record {
    let doc = Html::parse_document(body);
    let root = doc.root_element();
    let mut record = Record::new();
    record.set("issue_date", first_text(root, &ISSUE_DATE));
    for (sel, key) in TENDER_SELECTORS.iter() {
        record.put_or_na(*key, first_text(root, sel));
    }
    record.put_or_na(
        "document_link",
        first_link(root, &DOCUMENT, url).map(|u| u.to_string()),
    );
    record.put("url", url.to_string());
    record
}
