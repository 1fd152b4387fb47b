//! JSON run summary.
//!
//! Written once per run, after every site has finished:
//! ```text
//! output_dir/
//! ├── WorldBank_data_20250227_090512.csv
//! ├── AfDB_data_20250227_091133.csv
//! └── run_summary_20250227_091410.json
//! ```

use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, instrument};

use crate::error::ScrapeError;
use crate::models::RunSummary;
use crate::utils::file_timestamp;

/// Write `summary` as pretty JSON to `{dir}/run_summary_{timestamp}.json`.
#[instrument(level = "info", skip_all, fields(dir = %dir.display()))]
pub async fn write_summary(
    summary: &RunSummary,
    dir: &Path,
    now: DateTime<Local>,
) -> Result<PathBuf, ScrapeError> {
    let json = serde_json::to_string_pretty(summary)?;
    let path = dir.join(format!("run_summary_{}.json", file_timestamp(now)));

    if let Err(e) = fs::write(&path, json).await {
        error!(path = %path.display(), error = %e, "Failed to write run summary");
        return Err(e.into());
    }
    info!(path = %path.display(), total_rows = summary.total_rows, "Wrote run summary");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dates::DateWindow;
    use crate::models::{SiteReport, TerminationReason};
    use chrono::{NaiveDate, TimeZone};

    #[tokio::test]
    async fn test_write_summary() {
        let tmp = tempfile::tempdir().unwrap();
        let now = Local.with_ymd_and_hms(2025, 2, 27, 9, 14, 10).unwrap();
        let window = DateWindow::ending_on(NaiveDate::from_ymd_opt(2025, 2, 27).unwrap(), 7);
        let report = SiteReport {
            site: "ISDB".into(),
            rows: 2,
            output: None,
            pages_visited: 3,
            termination: Some(TerminationReason::Exhausted),
            error: None,
        };
        let summary = RunSummary::new(now, window, vec![report]);

        let path = write_summary(&summary, tmp.path(), now).await.unwrap();
        assert!(path.ends_with("run_summary_20250227_091410.json"));

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["total_rows"], 2);
        assert_eq!(value["sites"][0]["site"], "ISDB");
        assert_eq!(value["sites"][0]["termination"], "exhausted");
        assert_eq!(value["window"]["end"], "2025-02-27");
    }

    #[tokio::test]
    async fn test_write_summary_into_missing_dir_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("nope");
        let summary = RunSummary::new(Local::now(), DateWindow::last_days(7), vec![]);
        assert!(matches!(
            write_summary(&summary, &missing, Local::now()).await,
            Err(ScrapeError::Io(_))
        ));
    }
}
