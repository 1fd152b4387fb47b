//! African Development Bank procurement notices.
//!
//! A Drupal bootstrap grid: each cell holds a `dd-Mon-YYYY` date and a title
//! of the form `"<kind> - <country> - <subject>"`. The notice page only adds
//! the sector keywords.

use itertools::Itertools;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument, warn};
use url::Url;

use super::{SiteContext, element_text, first_link, first_text, selector};
use crate::dates::DateWindow;
use crate::engine::ListingSource;
use crate::error::ScrapeError;
use crate::models::{DetailOutcome, ListingPage, ListingRow, NOT_AVAILABLE, Record};

pub const LISTING_URL: &str = "https://www.afdb.org/en/projects-and-operations/procurement";
pub const DATE_FORMATS: &[&str] = &["%d-%b-%Y", "%d-%B-%Y"];

static GRID: Lazy<Selector> = Lazy::new(|| selector(".views-bootstrap-grid-plugin-style"));
static CELL: Lazy<Selector> = Lazy::new(|| selector(".views-bootstrap-grid-plugin-style .row > div"));
static DATE: Lazy<Selector> = Lazy::new(|| selector("span.date-display-single"));
static TITLE: Lazy<Selector> = Lazy::new(|| selector("span.field-content a"));
static NEXT: Lazy<Selector> = Lazy::new(|| selector("li.next a[title='Go to next page']"));
static KEYWORDS: Lazy<Selector> = Lazy::new(|| selector("#block-views-keywords-block"));
static KEYWORD: Lazy<Selector> = Lazy::new(|| selector("ul li a"));

#[derive(Debug)]
pub struct Afdb {
    ctx: SiteContext,
}

impl Afdb {
    pub fn new(ctx: SiteContext) -> Self {
        Self { ctx }
    }
}

impl ListingSource for Afdb {
    fn name(&self) -> &str {
        "AfDB"
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
        let sector = parse_sectors(&body);
        if sector.is_none() {
            warn!(%url, "Keyword block not found");
        }
        Ok(DetailOutcome::Matched(Record::new().with(
            "sector",
            sector.unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        )))
    }
}

pub fn parse_rows(page: &ListingPage) -> Result<Vec<ListingRow>, ScrapeError> {
    let doc = Html::parse_document(&page.body);
    if doc.select(&GRID).next().is_none() {
        return Err(ScrapeError::Structure(format!(
            "procurement grid missing on {}",
            page.url
        )));
    }
    let rows = doc
        .select(&CELL)
        .filter_map(|cell| parse_cell(cell, &page.url))
        .collect::<Vec<_>>();
    debug!(rows = rows.len(), "Read AfDB grid");
    Ok(rows)
}

fn parse_cell(cell: ElementRef<'_>, base: &Url) -> Option<ListingRow> {
    let date = first_text(cell, &DATE)?;
    let title = first_text(cell, &TITLE)?;
    let link = first_link(cell, &TITLE, base);

    let mut fields = Record::new();
    fields.put("publish_date", date.clone());
    fields.put("country", country_from_title(&title));
    fields.put("title", title);
    fields.put("sector", NOT_AVAILABLE);
    if let Some(link) = &link {
        fields.put("url", link.to_string());
    }
    Some(ListingRow::new(Some(date), fields, link))
}

/// Second dash-separated segment of a notice title.
pub fn country_from_title(title: &str) -> String {
    title
        .split('-')
        .nth(1)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(NOT_AVAILABLE)
        .to_string()
}

pub fn next_page(page: &ListingPage) -> Option<Url> {
    let doc = Html::parse_document(&page.body);
    first_link(doc.root_element(), &NEXT, &page.url)
}

/// Sector keywords joined with `" - "`; `None` when the keyword block is absent.
pub fn parse_sectors(body: &str) -> Option<String> {
    let doc = Html::parse_document(body);
    let block = doc.select(&KEYWORDS).next()?;
    Some(
        block
            .select(&KEYWORD)
            .map(element_text)
            .filter(|s| !s.is_empty())
            .join(" - "),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const GRID_PAGE: &str = r#"
        <div class="views-bootstrap-grid-plugin-style">
          <div class="row">
            <div class="col-md-4">
              <div class="field-content"><span class="date-display-single">26-Feb-2025</span></div>
              <span class="field-content"><a href="/en/documents/gpn-nigeria-rural-roads">GPN - Nigeria - Rural Roads Programme</a></span>
            </div>
            <div class="col-md-4">
              <div class="field-content"><span class="date-display-single">13-Feb-2025</span></div>
              <span class="field-content"><a href="/en/documents/spn-multinational">SPN Multinational Corridor</a></span>
            </div>
            <div class="col-md-4"><span class="field-content">Advertisement</span></div>
          </div>
        </div>
        <ul class="pager"><li class="next"><a title="Go to next page" href="/en/projects-and-operations/procurement?page=1">next</a></li></ul>"#;

    fn page(body: &str) -> ListingPage {
        ListingPage {
            url: Url::parse(LISTING_URL).unwrap(),
            body: body.to_string(),
        }
    }

    #[test]
    fn test_parse_rows() {
        let rows = parse_rows(&page(GRID_PAGE)).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].raw_date.as_deref(), Some("26-Feb-2025"));
        assert_eq!(rows[0].fields.get("country"), Some("Nigeria"));
        assert_eq!(rows[0].fields.get("sector"), Some(NOT_AVAILABLE));
        assert_eq!(
            rows[0].detail_link.as_ref().unwrap().as_str(),
            "https://www.afdb.org/en/documents/gpn-nigeria-rural-roads"
        );
        assert_eq!(rows[1].fields.get("country"), Some(NOT_AVAILABLE));
    }

    #[test]
    fn test_missing_grid_is_structural() {
        assert!(matches!(
            parse_rows(&page("<div class=\"view-empty\"></div>")),
            Err(ScrapeError::Structure(_))
        ));
    }

    #[test]
    fn test_country_from_title() {
        assert_eq!(country_from_title("GPN - Kenya - Water supply"), "Kenya");
        assert_eq!(country_from_title("No dash here"), NOT_AVAILABLE);
    }

    #[test]
    fn test_next_page() {
        assert_eq!(
            next_page(&page(GRID_PAGE)).unwrap().as_str(),
            "https://www.afdb.org/en/projects-and-operations/procurement?page=1"
        );
    }

    #[test]
    fn test_parse_sectors() {
        let body = r#"
            <div id="block-views-keywords-block">
              <ul><li><a href="/en/topics/transport">Transport</a></li><li><a href="/en/topics/agri">Agriculture</a></li></ul>
            </div>"#;
        assert_eq!(parse_sectors(body).as_deref(), Some("Transport - Agriculture"));
        assert_eq!(parse_sectors("<div></div>"), None);
    }
}
