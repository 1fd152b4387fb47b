//! World Bank procurement notices.
//!
//! The listing is a table sorted by publication date, newest first. The date
//! sits in the sixth column; the project column links to a project page whose
//! `<label>` / `<p class="document-info">` pairs carry the project details.

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument};
use url::Url;

use super::{SiteContext, element_text, first_link, labelled_value, selector};
use crate::dates::DateWindow;
use crate::engine::ListingSource;
use crate::error::ScrapeError;
use crate::models::{DetailOutcome, ListingPage, ListingRow, Record};
use crate::utils::resolve_link;

pub const LISTING_URL: &str = "https://projects.worldbank.org/en/projects-operations/procurement?srce=both";
pub const DATE_FORMATS: &[&str] = &["%B %d, %Y"];

static TABLE: Lazy<Selector> = Lazy::new(|| selector("table.project-opt-table"));
static ROWS: Lazy<Selector> = Lazy::new(|| selector("table.project-opt-table tbody tr"));
static CELL: Lazy<Selector> = Lazy::new(|| selector("td"));
static LINK: Lazy<Selector> = Lazy::new(|| selector("a"));
static PAGER_LINK: Lazy<Selector> = Lazy::new(|| selector("li:not(.disabled) a"));
static NEXT_ICON: Lazy<Selector> = Lazy::new(|| selector("i.fa-angle-right"));
static LABEL: Lazy<Selector> = Lazy::new(|| selector("label"));
static INFO: Lazy<Selector> = Lazy::new(|| selector("p.document-info"));

/// Project-page labels and the columns they fill.
const PROJECT_FIELDS: &[(&str, &str)] = &[
    ("Project ID", "project_id"),
    ("Status", "status"),
    ("Team Leader", "team_leader"),
    ("Borrower", "borrower"),
    ("Disclosure Date", "disclosure_date"),
    ("Approval Date", "approval_date"),
    ("Effective Date", "effective_date"),
    ("Total Project Cost", "total_project_cost"),
    ("Implementing Agency", "implementing_agency"),
    ("Region", "region"),
    ("Fiscal Year", "fiscal_year"),
    ("Commitment Amount", "commitment_amount"),
    ("Environmental Category", "environmental_category"),
    ("Environmental and Social Risk", "environmental_social_risk"),
    ("Closing Date", "closing_date"),
    ("Last Update Date", "last_update_date"),
];

#[derive(Debug)]
pub struct WorldBank {
    ctx: SiteContext,
}

impl WorldBank {
    pub fn new(ctx: SiteContext) -> Self {
        Self { ctx }
    }
}

impl ListingSource for WorldBank {
    fn name(&self) -> &str {
        "WorldBank"
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
        let (_, body) = self.ctx.detail(row).await?;
        Ok(DetailOutcome::Matched(parse_project(&body)))
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
        .select(&ROWS)
        .filter_map(|tr| parse_row(tr, &page.url))
        .collect::<Vec<_>>();
    debug!(rows = rows.len(), "Read World Bank rows");
    Ok(rows)
}

fn parse_row(tr: ElementRef<'_>, base: &Url) -> Option<ListingRow> {
    let cells = tr.select(&CELL).collect::<Vec<_>>();
    if cells.len() < 6 {
        return None;
    }
    let date = element_text(cells[5]);

    let mut fields = Record::new();
    fields.put("description", element_text(cells[0]));
    if let Some(link) = first_link(cells[0], &LINK, base) {
        fields.put("description_link", link.to_string());
    }
    fields.put("country", element_text(cells[1]));
    fields.put("project_title", element_text(cells[2]));
    fields.put("notice_type", element_text(cells[3]));
    fields.put("language", element_text(cells[4]));
    fields.put("publish_date", date.clone());

    let project = first_link(cells[2], &LINK, base);
    if let Some(link) = &project {
        fields.put("project_link", link.to_string());
    }
    Some(ListingRow::new(Some(date), fields, project))
}

/// The single right-angle pager link; the double-angle "last page" link is skipped.
pub fn next_page(page: &ListingPage) -> Option<Url> {
    let doc = Html::parse_document(&page.body);
    doc.select(&PAGER_LINK)
        .find(|a| a.select(&NEXT_ICON).count() == 1)
        .and_then(|a| a.value().attr("href"))
        .and_then(|href| resolve_link(&page.url, href))
}

pub fn parse_project(body: &str) -> Record {
    let doc = Html::parse_document(body);
    let mut record = Record::new();
    for (label, key) in PROJECT_FIELDS {
        record.put_or_na(*key, labelled_value(&doc, &LABEL, label, &INFO));
    }
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NOT_AVAILABLE;

    const LISTING: &str = r##"
        <table class="project-opt-table">
          <thead><tr><th>Description</th><th>Country</th><th>Project</th><th>Type</th><th>Language</th><th>Date</th></tr></thead>
          <tbody>
            <tr>
              <td><a href="/en/projects-operations/procurement-detail/OP00312345">Supply of medical equipment</a></td>
              <td>Kenya</td>
              <td><a href="https://projects.worldbank.org/en/projects-operations/project-detail/P176543">Health Systems Project</a></td>
              <td>Invitation for Bids</td>
              <td>English</td>
              <td>February 26, 2025</td>
            </tr>
            <tr>
              <td>Consulting services</td>
              <td>Peru</td>
              <td>Water Project</td>
              <td>Request for Expression of Interest</td>
              <td>Spanish</td>
              <td>February 12, 2025</td>
            </tr>
            <tr><td colspan="6">No more results</td></tr>
          </tbody>
        </table>
        <ul class="pagination">
          <li class="disabled"><a href="#"><i class="fa fa-angle-left"></i></a></li>
          <li class="active"><a href="?page=1">1</a></li>
          <li><a href="?srce=both&amp;page=2"><i class="fa fa-angle-right"></i></a></li>
          <li><a href="?srce=both&amp;page=40"><i class="fa fa-angle-right"></i><i class="fa fa-angle-right"></i></a></li>
        </ul>"##;

    fn page(body: &str) -> ListingPage {
        ListingPage {
            url: Url::parse(LISTING_URL).unwrap(),
            body: body.to_string(),
        }
    }

    #[test]
    fn test_parse_rows() {
        let rows = parse_rows(&page(LISTING)).unwrap();
        assert_eq!(rows.len(), 2);

        let first = &rows[0];
        assert_eq!(first.raw_date.as_deref(), Some("February 26, 2025"));
        assert_eq!(first.fields.get("description"), Some("Supply of medical equipment"));
        assert_eq!(
            first.fields.get("description_link"),
            Some("https://projects.worldbank.org/en/projects-operations/procurement-detail/OP00312345")
        );
        assert_eq!(first.fields.get("country"), Some("Kenya"));
        assert_eq!(first.fields.get("publish_date"), Some("February 26, 2025"));
        assert_eq!(
            first.detail_link.as_ref().unwrap().as_str(),
            "https://projects.worldbank.org/en/projects-operations/project-detail/P176543"
        );

        assert!(rows[1].detail_link.is_none());
        assert!(!rows[1].fields.contains_key("description_link"));
    }

    #[test]
    fn test_missing_table_is_structural() {
        assert!(matches!(
            parse_rows(&page("<html><body>Maintenance</body></html>")),
            Err(ScrapeError::Structure(_))
        ));
    }

    #[test]
    fn test_next_page_skips_last_page_link() {
        assert_eq!(
            next_page(&page(LISTING)).unwrap().as_str(),
            "https://projects.worldbank.org/en/projects-operations/procurement?srce=both&page=2"
        );
    }

    #[test]
    fn test_next_page_absent_on_last_page() {
        let body = r##"<ul class="pagination">
            <li class="disabled"><a href="#"><i class="fa fa-angle-right"></i></a></li>
        </ul>"##;
        assert!(next_page(&page(body)).is_none());
    }

    #[test]
    fn test_parse_project() {
        let body = r#"
            <div class="detail-download-section">
              <label>Project ID</label><p class="document-info">P176543</p>
              <label>Status</label><p class="document-info">Active</p>
              <label>Borrower</label><p class="document-info">Republic of Kenya</p>
              <label>Commitment Amount</label><p class="document-info">US$ 150.00 million</p>
            </div>"#;
        let record = parse_project(body);
        assert_eq!(record.get("project_id"), Some("P176543"));
        assert_eq!(record.get("status"), Some("Active"));
        assert_eq!(record.get("borrower"), Some("Republic of Kenya"));
        assert_eq!(record.get("commitment_amount"), Some("US$ 150.00 million"));
        assert_eq!(record.get("team_leader"), Some(NOT_AVAILABLE));
        assert_eq!(record.len(), PROJECT_FIELDS.len());
    }
}
