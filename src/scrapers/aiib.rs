//! Asian Infrastructure Investment Bank project procurement list.
//!
//! Everything needed sits in the listing rows, so no detail page is fetched.

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

use super::{SiteContext, first_link, first_text, selector};
use crate::dates::DateWindow;
use crate::engine::ListingSource;
use crate::error::ScrapeError;
use crate::models::{DetailOutcome, ListingPage, ListingRow, Record};

pub const LISTING_URL: &str =
    "https://www.aiib.org/en/opportunities/business/project-procurement/list.html";
pub const DATE_FORMATS: &[&str] = &["%b %d, %Y", "%B %d, %Y"];

static TABLE: Lazy<Selector> = Lazy::new(|| selector(".table-body"));
static ROW: Lazy<Selector> = Lazy::new(|| selector(".table-row"));
static DATE: Lazy<Selector> = Lazy::new(|| selector(".table-col.table-date .s2"));
static COUNTRY: Lazy<Selector> = Lazy::new(|| selector(".table-col.table-country .country-value"));
static TITLE: Lazy<Selector> = Lazy::new(|| selector(".table-col.table-project .title-value"));
static DOWNLOAD: Lazy<Selector> = Lazy::new(|| selector(".table-col.table-project a"));
static SECTOR: Lazy<Selector> = Lazy::new(|| selector(".table-col.table-energy .sector-value"));
static KIND: Lazy<Selector> = Lazy::new(|| selector(".table-col.table-type .type-value"));
static NEXT: Lazy<Selector> = Lazy::new(|| selector("a.next"));

#[derive(Debug)]
pub struct Aiib {
    ctx: SiteContext,
}

impl Aiib {
    pub fn new(ctx: SiteContext) -> Self {
        Self { ctx }
    }
}

impl ListingSource for Aiib {
    fn name(&self) -> &str {
        "AIIB"
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

    /// Rows carry no detail link, so this is only reached for a row built
    /// elsewhere; it adds nothing.
    async fn fetch_detail(
        &self,
        _row: &ListingRow,
        _window: &DateWindow,
    ) -> Result<DetailOutcome, ScrapeError> {
        Ok(DetailOutcome::Matched(Record::new()))
    }
}

pub fn parse_rows(page: &ListingPage) -> Result<Vec<ListingRow>, ScrapeError> {
    let doc = Html::parse_document(&page.body);
    if doc.select(&TABLE).next().is_none() {
        return Err(ScrapeError::Structure(format!(
            "procurement table missing on {}",
            page.url
        )));
    }
    let rows = doc
        .select(&ROW)
        .filter_map(|row| parse_row(row, &page.url))
        .collect::<Vec<_>>();
    debug!(rows = rows.len(), "Read AIIB rows");
    Ok(rows)
}

fn parse_row(row: ElementRef<'_>, base: &Url) -> Option<ListingRow> {
    let date = first_text(row, &DATE)?;
    let mut fields = Record::new();
    fields.put("issue_date", date.clone());
    fields.put_or_na("country", first_text(row, &COUNTRY));
    fields.put_or_na("title", first_text(row, &TITLE));
    fields.put_or_na("sector", first_text(row, &SECTOR));
    fields.put_or_na("notice_type", first_text(row, &KIND));
    fields.put_or_na(
        "download_link",
        first_link(row, &DOWNLOAD, base).map(|u| u.to_string()),
    );
    Some(ListingRow::new(Some(date), fields, None))
}

pub fn next_page(page: &ListingPage) -> Option<Url> {
    let doc = Html::parse_document(&page.body);
    first_link(doc.root_element(), &NEXT, &page.url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NOT_AVAILABLE;

    const TABLE_PAGE: &str = r#"
        <div class="table-body">
          <div class="table-row">
            <div class="table-col table-date"><p class="s2">Feb 26, 2025</p></div>
            <div class="table-col table-country"><span class="country-value">Bangladesh</span></div>
            <div class="table-col table-project">
              <span class="title-value">Dhaka Sanitation Improvement</span>
              <a href="/en/projects/details/2025/_download/bangladesh/ifb-dsip.pdf">Download</a>
            </div>
            <div class="table-col table-energy"><span class="sector-value">Water</span></div>
            <div class="table-col table-type"><span class="type-value">Invitation for Bids</span></div>
          </div>
          <div class="table-row">
            <div class="table-col table-date"><p class="s2">January 30, 2025</p></div>
            <div class="table-col table-project"><span class="title-value">Metro Line 4</span></div>
          </div>
          <div class="table-row table-header"><div class="table-col">Date</div></div>
        </div>
        <div class="pagination"><a class="next" href="list.html?page=2">&gt;</a></div>"#;

    fn page(body: &str) -> ListingPage {
        ListingPage {
            url: Url::parse(LISTING_URL).unwrap(),
            body: body.to_string(),
        }
    }

    #[test]
    fn test_parse_rows() {
        let rows = parse_rows(&page(TABLE_PAGE)).unwrap();
        assert_eq!(rows.len(), 2);

        let first = &rows[0];
        assert_eq!(first.raw_date.as_deref(), Some("Feb 26, 2025"));
        assert!(first.detail_link.is_none());
        assert_eq!(first.fields.get("country"), Some("Bangladesh"));
        assert_eq!(first.fields.get("sector"), Some("Water"));
        assert_eq!(
            first.fields.get("download_link"),
            Some("https://www.aiib.org/en/projects/details/2025/_download/bangladesh/ifb-dsip.pdf")
        );

        let second = &rows[1];
        assert_eq!(second.raw_date.as_deref(), Some("January 30, 2025"));
        assert_eq!(second.fields.get("country"), Some(NOT_AVAILABLE));
        assert_eq!(second.fields.get("download_link"), Some(NOT_AVAILABLE));
    }

    #[test]
    fn test_both_month_styles_parse() {
        use crate::dates::parse_date;
        assert!(parse_date("Feb 26, 2025", DATE_FORMATS).is_some());
        assert!(parse_date("January 30, 2025", DATE_FORMATS).is_some());
    }

    #[test]
    fn test_next_page() {
        assert_eq!(
            next_page(&page(TABLE_PAGE)).unwrap().as_str(),
            "https://www.aiib.org/en/opportunities/business/project-procurement/list.html?page=2"
        );
    }
}
