//! YAML configuration with per-site overrides.
//!
//! ```yaml
//! window_days: 7
//! output_dir: data/processed
//! write_summary: true
//! sites:
//!   world-bank:
//!     max_pages: 40
//!     timeout_secs: 240
//!   tenders-info:
//!     enabled: false
//! ```
//!
//! Every key is optional. Per-site values not given fall back to the site's
//! built-in defaults (see [`Site::defaults`]).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, instrument};
use url::Url;

use crate::cli::Cli;
use crate::engine::EngineLimits;
use crate::error::ScrapeError;
use crate::fetch::DEFAULT_USER_AGENT;
use crate::scrapers::Site;

const DEFAULT_WINDOW_DAYS: u64 = 7;
const DEFAULT_OUTPUT_DIR: &str = "data/processed";
const DEFAULT_ENTRY_ATTEMPTS: usize = 3;
const DEFAULT_RETRY_DELAY_SECS: u64 = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Days counted back from today; the window also includes today.
    pub window_days: u64,
    pub output_dir: PathBuf,
    pub user_agent: String,
    pub write_summary: bool,
    pub sites: BTreeMap<Site, SiteOverrides>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            window_days: DEFAULT_WINDOW_DAYS,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            write_summary: true,
            sites: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteOverrides {
    pub enabled: Option<bool>,
    pub url: Option<String>,
    pub max_pages: Option<usize>,
    pub concurrency: Option<usize>,
    pub batch_size: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub entry_attempts: Option<usize>,
    pub retry_delay_secs: Option<u64>,
}

/// Fully resolved settings for one site run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteSettings {
    pub site: Site,
    pub url: Url,
    pub limits: EngineLimits,
    pub timeout: Duration,
    pub entry_attempts: usize,
    pub retry_delay: Duration,
}

impl AppConfig {
    /// Read and parse a YAML config file.
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self, ScrapeError> {
        let raw = std::fs::read_to_string(path)?;
        let config = Self::from_yaml(&raw)?;
        info!(sites = config.sites.len(), "Loaded configuration");
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, ScrapeError> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(raw)?)
    }

    /// Config file (if any) with command-line flags layered on top.
    pub fn resolve(cli: &Cli) -> Result<Self, ScrapeError> {
        let mut config = match &cli.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_cli(cli);
        Ok(config)
    }

    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(dir) = &cli.output_dir {
            self.output_dir = dir.clone();
        }
        if let Some(days) = cli.days {
            self.window_days = days;
        }
        if let Some(summary) = cli.summary_override() {
            self.write_summary = summary;
        }
        debug!(
            window_days = self.window_days,
            output_dir = %self.output_dir.display(),
            write_summary = self.write_summary,
            "Applied command-line overrides"
        );
    }

    /// Sites to run, in run order: `filter` if non-empty, else every enabled site.
    ///
    /// Naming a site on the command line runs it even if the config disables it.
    pub fn selected_sites(&self, filter: &[Site]) -> Vec<Site> {
        Site::ALL
            .into_iter()
            .filter(|site| {
                if filter.is_empty() {
                    self.overrides(*site).enabled.unwrap_or(true)
                } else {
                    filter.contains(site)
                }
            })
            .collect()
    }

    fn overrides(&self, site: Site) -> SiteOverrides {
        self.sites.get(&site).cloned().unwrap_or_default()
    }

    pub fn site_settings(&self, site: Site) -> Result<SiteSettings, ScrapeError> {
        let defaults = site.defaults();
        let o = self.overrides(site);
        let url = Url::parse(o.url.as_deref().unwrap_or(site.default_url()))?;
        let concurrency = o.concurrency.unwrap_or(defaults.concurrency).max(1);

        Ok(SiteSettings {
            site,
            url,
            limits: EngineLimits {
                max_pages: o.max_pages.unwrap_or(defaults.max_pages).max(1),
                concurrency,
                batch_size: o.batch_size.unwrap_or(defaults.batch_size).max(1),
            },
            timeout: Duration::from_secs(o.timeout_secs.unwrap_or(defaults.timeout_secs)),
            entry_attempts: o.entry_attempts.unwrap_or(DEFAULT_ENTRY_ATTEMPTS).max(1),
            retry_delay: Duration::from_secs(o.retry_delay_secs.unwrap_or(DEFAULT_RETRY_DELAY_SECS)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = AppConfig::from_yaml("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.window_days, 7);
        assert_eq!(config.output_dir, PathBuf::from("data/processed"));
        assert!(config.write_summary);
    }

    #[test]
    fn test_site_defaults_without_overrides() {
        let config = AppConfig::default();

        let wb = config.site_settings(Site::WorldBank).unwrap();
        assert_eq!(wb.limits.max_pages, 100);
        assert_eq!(wb.limits.concurrency, 5);
        assert_eq!(wb.timeout, Duration::from_secs(180));
        assert_eq!(wb.entry_attempts, 3);
        assert_eq!(wb.url.as_str(), Site::WorldBank.default_url());

        let aiib = config.site_settings(Site::Aiib).unwrap();
        assert_eq!(aiib.limits.concurrency, 10);

        let isdb = config.site_settings(Site::Isdb).unwrap();
        assert_eq!(isdb.limits.batch_size, 10);

        let afdb = config.site_settings(Site::Afdb).unwrap();
        assert_eq!(afdb.limits.max_pages, 10);
    }

    #[test]
    fn test_overrides_apply_per_site() {
        let yaml = r#"
window_days: 14
output_dir: /tmp/tenders
write_summary: false
sites:
  world-bank:
    max_pages: 3
    concurrency: 2
    timeout_secs: 30
    url: http://127.0.0.1:8080/procurement
  tenders-info:
    enabled: false
"#;
        let config = AppConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.window_days, 14);
        assert!(!config.write_summary);

        let wb = config.site_settings(Site::WorldBank).unwrap();
        assert_eq!(wb.limits.max_pages, 3);
        assert_eq!(wb.limits.concurrency, 2);
        assert_eq!(wb.limits.batch_size, 5);
        assert_eq!(wb.timeout, Duration::from_secs(30));
        assert_eq!(wb.url.as_str(), "http://127.0.0.1:8080/procurement");

        let selected = config.selected_sites(&[]);
        assert_eq!(selected.len(), 6);
        assert!(!selected.contains(&Site::TendersInfo));
        assert_eq!(config.selected_sites(&[Site::TendersInfo]), vec![Site::TendersInfo]);
    }

    #[test]
    fn test_zero_limits_are_clamped() {
        let config = AppConfig::from_yaml("sites:\n  ebrd:\n    max_pages: 0\n    concurrency: 0\n").unwrap();
        let ebrd = config.site_settings(Site::Ebrd).unwrap();
        assert_eq!(ebrd.limits.max_pages, 1);
        assert_eq!(ebrd.limits.concurrency, 1);
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        assert!(matches!(
            AppConfig::from_yaml("window_dayz: 3"),
            Err(ScrapeError::Config(_))
        ));
        assert!(AppConfig::from_yaml("sites:\n  imf: {}\n").is_err());
    }

    #[test]
    fn test_bad_url_is_an_error() {
        let config = AppConfig::from_yaml("sites:\n  afd:\n    url: not a url\n").unwrap();
        assert!(matches!(
            config.site_settings(Site::Afd),
            Err(ScrapeError::Url(_))
        ));
    }

    #[test]
    fn test_cli_overrides_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "window_days: 30\noutput_dir: from-file").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let cli = Cli::parse_from(["tender_scout", "-c", &path, "-d", "2", "--no-summary"]);
        let config = AppConfig::resolve(&cli).unwrap();

        assert_eq!(config.window_days, 2);
        assert!(!config.write_summary);
        // -o not given; env var is not set in tests
        if std::env::var_os("TENDER_SCOUT_OUTPUT_DIR").is_none() {
            assert_eq!(config.output_dir, PathBuf::from("from-file"));
        }
    }

    #[test]
    fn test_missing_config_file_is_io_error() {
        let cli = Cli::parse_from(["tender_scout", "-c", "/nonexistent/tender_scout.yaml"]);
        assert!(matches!(AppConfig::resolve(&cli), Err(ScrapeError::Io(_))));
    }
}
