//! Run orchestration: one site after another, each isolated from the others.
//!
//! A site run is: build its HTTP client, paginate under the window, write the
//! CSV. Whatever goes wrong inside one site is logged and recorded in its
//! [`SiteReport`]; the next site still runs.

use chrono::Local;
use std::path::Path;
use std::time::Instant;
use tracing::{error, info, instrument, warn};

use crate::config::{AppConfig, SiteSettings};
use crate::dates::DateWindow;
use crate::engine::{EngineLimits, ListingSource, paginate};
use crate::error::ScrapeError;
use crate::fetch::{FetchSettings, SiteClient};
use crate::models::SiteReport;
use crate::outputs::csv::write_site_csv;
use crate::scrapers::{
    Site, SiteContext, afd::Afd, afdb::Afdb, aiib::Aiib, ebrd::Ebrd, isdb::Isdb,
    tendersinfo::TendersInfo, worldbank::WorldBank,
};

/// Paginate one source and save what it found.
#[instrument(level = "info", skip_all, fields(site = %source.name()))]
pub async fn run_site<S: ListingSource>(
    source: &S,
    window: &DateWindow,
    limits: &EngineLimits,
    output_dir: &Path,
) -> SiteReport {
    let t0 = Instant::now();
    let result = match paginate(source, window, limits).await {
        Ok(result) => result,
        Err(e) => {
            error!(error = %e, "Site run failed");
            return SiteReport::failed(source.name(), e);
        }
    };

    match write_site_csv(output_dir, &result.site, &result.records, Local::now()).await {
        Ok(output) => {
            info!(
                rows = result.records.len(),
                pages = result.pages_visited,
                termination = %result.termination,
                elapsed_ms = t0.elapsed().as_millis() as u64,
                "Site finished"
            );
            SiteReport {
                site: result.site,
                rows: result.records.len(),
                output,
                pages_visited: result.pages_visited,
                termination: Some(result.termination),
                error: None,
            }
        }
        Err(e) => {
            error!(error = %e, rows = result.records.len(), "Could not save results");
            SiteReport {
                pages_visited: result.pages_visited,
                termination: Some(result.termination),
                ..SiteReport::failed(result.site, e)
            }
        }
    }
}

fn site_context(settings: &SiteSettings, user_agent: &str) -> Result<SiteContext, ScrapeError> {
    let fetch = FetchSettings {
        request_timeout: settings.timeout,
        user_agent: user_agent.to_string(),
        ..FetchSettings::default()
    };
    let client = SiteClient::new(&fetch, settings.entry_attempts, settings.retry_delay)?;
    Ok(SiteContext::new(client, settings.url.clone()))
}

/// Build the configured site and run it.
pub async fn run_configured(
    settings: &SiteSettings,
    config: &AppConfig,
    window: &DateWindow,
) -> SiteReport {
    let name = settings.site.display_name();
    let ctx = match site_context(settings, &config.user_agent) {
        Ok(ctx) => ctx,
        Err(e) => {
            error!(site = name, error = %e, "Could not build HTTP client");
            return SiteReport::failed(name, e);
        }
    };
    let limits = &settings.limits;
    let dir = config.output_dir.as_path();
    match settings.site {
        Site::WorldBank => run_site(&WorldBank::new(ctx), window, limits, dir).await,
        Site::Ebrd => run_site(&Ebrd::new(ctx), window, limits, dir).await,
        Site::TendersInfo => run_site(&TendersInfo::new(ctx), window, limits, dir).await,
        Site::Isdb => run_site(&Isdb::new(ctx), window, limits, dir).await,
        Site::Afdb => run_site(&Afdb::new(ctx), window, limits, dir).await,
        Site::Aiib => run_site(&Aiib::new(ctx), window, limits, dir).await,
        Site::Afd => run_site(&Afd::new(ctx), window, limits, dir).await,
    }
}

/// Run `sites` sequentially and collect one report per site.
#[instrument(level = "info", skip_all, fields(sites = sites.len()))]
pub async fn run_all(config: &AppConfig, sites: &[Site], window: &DateWindow) -> Vec<SiteReport> {
    let mut reports = Vec::with_capacity(sites.len());
    for site in sites {
        info!(site = %site, "Running scraper");
        let report = match config.site_settings(*site) {
            Ok(settings) => run_configured(&settings, config, window).await,
            Err(e) => {
                error!(site = %site, error = %e, "Invalid site settings");
                SiteReport::failed(site.display_name(), e)
            }
        };
        if report.rows == 0 && report.error.is_none() {
            info!(site = %site, "No data to save");
        }
        reports.push(report);
    }

    let total: usize = reports.iter().map(|r| r.rows).sum();
    let failed = reports.iter().filter(|r| r.error.is_some()).count();
    if failed > 0 {
        warn!(failed, "Some sites failed");
    }
    info!(total_rows = total, "Scraping completed");
    reports
}
