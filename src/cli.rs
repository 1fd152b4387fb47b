//! Command-line interface definitions for Tender Scout.
//!
//! Every flag is optional. Anything given here overrides the YAML config file,
//! which in turn overrides the built-in defaults.

use clap::Parser;
use std::path::PathBuf;

use crate::scrapers::Site;

/// Command-line arguments for the Tender Scout application.
///
/// # Examples
///
/// ```sh
/// # All sites, last 7 days, CSVs under data/processed
/// tender_scout
///
/// # Two sites, a two-week window, custom output directory
/// tender_scout -s world-bank -s afdb -d 14 -o ./out
///
/// # Per-site tuning from a config file
/// tender_scout -c config.yaml --no-summary
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Directory for the per-site CSV files and the run summary
    #[arg(short, long, env = "TENDER_SCOUT_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Optional path to config.yaml file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Window length in days, counted back from today
    #[arg(short, long)]
    pub days: Option<u64>,

    /// Only run these sites (repeatable); defaults to every enabled site
    #[arg(short, long = "site", value_enum)]
    pub sites: Vec<Site>,

    /// Write a JSON run summary next to the CSV files
    #[arg(long, overrides_with = "no_summary")]
    pub summary: bool,

    /// Do not write a JSON run summary
    #[arg(long, overrides_with = "summary")]
    pub no_summary: bool,
}

impl Cli {
    /// Summary switch from the command line; `None` defers to the config file.
    pub fn summary_override(&self) -> Option<bool> {
        match (self.summary, self.no_summary) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["tender_scout"]);

        assert!(cli.config.is_none());
        assert!(cli.days.is_none());
        assert!(cli.sites.is_empty());
        assert_eq!(cli.summary_override(), None);
    }

    #[test]
    fn test_cli_long_flags() {
        let cli = Cli::parse_from([
            "tender_scout",
            "--output-dir",
            "./out",
            "--config",
            "config.yaml",
            "--days",
            "14",
            "--site",
            "world-bank",
            "--site",
            "tenders-info",
            "--no-summary",
        ]);

        assert_eq!(cli.output_dir, Some(PathBuf::from("./out")));
        assert_eq!(cli.config, Some(PathBuf::from("config.yaml")));
        assert_eq!(cli.days, Some(14));
        assert_eq!(cli.sites, vec![Site::WorldBank, Site::TendersInfo]);
        assert_eq!(cli.summary_override(), Some(false));
    }

    #[test]
    fn test_cli_short_flags() {
        let cli = Cli::parse_from(["tender_scout", "-o", "/tmp/csv", "-d", "3", "-s", "afdb"]);

        assert_eq!(cli.output_dir, Some(PathBuf::from("/tmp/csv")));
        assert_eq!(cli.days, Some(3));
        assert_eq!(cli.sites, vec![Site::Afdb]);
    }

    #[test]
    fn test_cli_last_summary_flag_wins() {
        let cli = Cli::parse_from(["tender_scout", "--no-summary", "--summary"]);
        assert_eq!(cli.summary_override(), Some(true));
    }

    #[test]
    fn test_cli_rejects_unknown_site() {
        assert!(Cli::try_parse_from(["tender_scout", "-s", "imf"]).is_err());
    }
}
