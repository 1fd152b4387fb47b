//! # Tender Scout
//!
//! Collects recent procurement notices from multilateral development bank
//! websites (World Bank, EBRD, TendersInfo, ISDB, AfDB, AIIB, AFD) into one CSV
//! file per site.
//!
//! ## Usage
//!
//! ```sh
//! tender_scout -d 7 -o ./data/processed
//! ```
//!
//! ## Architecture
//!
//! 1. **Window**: the last N days, today included
//! 2. **Pagination**: one generic engine walks each site's listing newest
//!    first and stops at the first notice older than the window
//! 3. **Details**: rows worth keeping get their detail pages fetched in
//!    bounded concurrent batches
//! 4. **Output**: a CSV per site with results, plus an optional JSON run summary
//!
//! Sites run one after another; a failing site is logged and skipped.

use chrono::Local;
use clap::Parser;
use std::error::Error;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod dates;
mod engine;
mod error;
mod fetch;
mod models;
mod outputs;
mod run;
mod scrapers;
mod utils;

use cli::Cli;
use config::AppConfig;
use dates::DateWindow;
use models::RunSummary;
use outputs::json;
use utils::ensure_writable_dir;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    let started_at = Local::now();
    info!("tender_scout starting up");

    let args = Cli::parse();
    debug!(?args.config, ?args.output_dir, ?args.days, ?args.sites, "Parsed CLI arguments");

    let config = AppConfig::resolve(&args)?;

    // Early check: ensure output dir is writable
    if let Err(e) = ensure_writable_dir(&config.output_dir).await {
        error!(
            path = %config.output_dir.display(),
            error = %e,
            "Output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    let window = DateWindow::last_days(config.window_days);
    let sites = config.selected_sites(&args.sites);
    info!(
        start = %window.start(),
        end = %window.end(),
        sites = sites.len(),
        "Collecting notices"
    );
    if sites.is_empty() {
        warn!("No sites enabled; nothing to do");
    }

    let reports = run::run_all(&config, &sites, &window).await;
    let summary = RunSummary::new(started_at, window, reports);

    for report in &summary.sites {
        match &report.error {
            Some(e) => warn!(site = %report.site, error = %e, "Site failed"),
            None => info!(site = %report.site, rows = report.rows, "Site done"),
        }
    }

    if config.write_summary {
        if let Err(e) = json::write_summary(&summary, &config.output_dir, Local::now()).await {
            error!(error = %e, "Failed to write run summary");
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        total_rows = summary.total_rows,
        failed_sites = summary.failures(),
        "Execution complete"
    );

    Ok(())
}
