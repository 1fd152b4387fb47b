//! Agence Française de Développement notices, hosted on dgMarket.
//!
//! `table#notice` lists notices with a published date (`Feb 28, 2025`),
//! country, title link and deadline. The notice page adds the description,
//! funding agency, reference and document links.

use itertools::Itertools;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument};
use url::Url;

use super::{SiteContext, element_text, first_link, first_text, selector};
use crate::dates::DateWindow;
use crate::engine::ListingSource;
use crate::error::ScrapeError;
use crate::models::{DetailOutcome, ListingPage, ListingRow, Record};
use crate::utils::resolve_link;

pub const LISTING_URL: &str = "https://tenders-afd.dgmarket.com/tenders/brandedNoticeList.do";
pub const DATE_FORMATS: &[&str] = &["%b %d, %Y", "%B %d, %Y"];

/// Separator between document links in one cell.
const LINK_SEPARATOR: &str = " | ";

static TABLE: Lazy<Selector> = Lazy::new(|| selector("table#notice"));
static ROW: Lazy<Selector> = Lazy::new(|| selector("table#notice tbody tr"));
static PUBLISHED: Lazy<Selector> = Lazy::new(|| selector("td.published"));
static COUNTRY: Lazy<Selector> = Lazy::new(|| selector("td.country"));
static TITLE: Lazy<Selector> = Lazy::new(|| selector("td a"));
static DEADLINE: Lazy<Selector> = Lazy::new(|| selector("td.deadline"));
static ANCHOR: Lazy<Selector> = Lazy::new(|| selector("a"));
static CONTENT: Lazy<Selector> = Lazy::new(|| selector("div.content"));
static LABEL: Lazy<Selector> = Lazy::new(|| selector("span.label"));
static DOWNLOAD: Lazy<Selector> = Lazy::new(|| selector("a[href*='download']"));

#[derive(Debug)]
pub struct Afd {
    ctx: SiteContext,
}

impl Afd {
    pub fn new(ctx: SiteContext) -> Self {
        Self { ctx }
    }
}

impl ListingSource for Afd {
    fn name(&self) -> &str {
        "AFD"
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
    if doc.select(&TABLE).next().is_none() {
        return Err(ScrapeError::Structure(format!(
            "notice table missing on {}",
            page.url
        )));
    }
    let rows = doc
        .select(&ROW)
        .filter_map(|tr| parse_row(tr, &page.url))
        .collect::<Vec<_>>();
    debug!(rows = rows.len(), "Read AFD notices");
    Ok(rows)
}

fn parse_row(tr: ElementRef<'_>, base: &Url) -> Option<ListingRow> {
    let date = first_text(tr, &PUBLISHED)?;
    let link = first_link(tr, &TITLE, base);

    let mut fields = Record::new();
    fields.put("published_date", date.clone());
    fields.put_or_na("country", first_text(tr, &COUNTRY));
    fields.put_or_na("title", first_text(tr, &TITLE));
    fields.put_or_na("deadline", first_text(tr, &DEADLINE));
    fields.put_or_na("url", link.as_ref().map(Url::to_string));
    Some(ListingRow::new(Some(date), fields, link))
}

/// The pager link labelled "Next".
pub fn next_page(page: &ListingPage) -> Option<Url> {
    let doc = Html::parse_document(&page.body);
    doc.select(&ANCHOR)
        .find(|a| element_text(*a).to_lowercase().starts_with("next"))
        .and_then(|a| a.value().attr("href"))
        .and_then(|href| resolve_link(&page.url, href))
}

/// Value in the `<span>` right after a `<span class="label">` containing `label`.
fn span_value(doc: &Html, label: &str) -> Option<String> {
    doc.select(&LABEL)
        .find(|el| element_text(*el).contains(label))
        .and_then(|el| el.next_siblings().find_map(ElementRef::wrap))
        .filter(|sibling| sibling.value().name() == "span")
        .map(element_text)
        .filter(|t| !t.is_empty())
}

pub fn parse_notice(body: &str, url: &Url) -> Record {
    let doc = Html::parse_document(body);
    let documents = doc
        .select(&DOWNLOAD)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| resolve_link(url, href))
        .map(|u| u.to_string())
        .unique()
        .join(LINK_SEPARATOR);

    let mut record = Record::new();
    record.put_or_na("description", first_text(doc.root_element(), &CONTENT));
    record.put_or_na("funding_agency", span_value(&doc, "Funding Agency"));
    record.put_or_na("reference_number", span_value(&doc, "Reference"));
    record.put_or_na("document_links", Some(documents).filter(|d| !d.is_empty()));
    record
}
