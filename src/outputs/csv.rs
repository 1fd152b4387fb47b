//! Per-site CSV output.
//!
//! One file per site and run: `{output_dir}/{Site}_data_{YYYYmmdd_HHMMSS}.csv`.
//! Columns are the union of every record's keys in first-seen order; a record
//! lacking a column gets an empty cell.

use chrono::{DateTime, Local};
use itertools::Itertools;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument};

use crate::error::ScrapeError;
use crate::models::Record;
use crate::utils::file_timestamp;

const SEP: char = ',';

/// Column names across `records`, in first-seen order.
pub fn columns(records: &[Record]) -> Vec<String> {
    records
        .iter()
        .flat_map(|r| r.keys())
        .unique()
        .map(str::to_string)
        .collect()
}

fn needs_quotes(field: &str, sep: char) -> bool {
    field.contains(sep) || field.contains('"') || field.contains('\n') || field.contains('\r')
}

/// Write a single CSV row to any writer.
pub fn write_row<W: Write, S: AsRef<str>>(mut w: W, row: &[S], sep: char) -> io::Result<()> {
    for (i, cell) in row.iter().enumerate() {
        if i > 0 {
            write!(w, "{sep}")?;
        }
        let cell = cell.as_ref();
        if needs_quotes(cell, sep) {
            write!(w, "\"{}\"", cell.replace('"', "\"\""))?;
        } else {
            write!(w, "{cell}")?;
        }
    }
    writeln!(w)
}

/// Header line plus one line per record.
pub fn to_csv_bytes(records: &[Record]) -> io::Result<Vec<u8>> {
    let header = columns(records);
    let mut buf = Vec::new();
    write_row(&mut buf, &header, SEP)?;
    for record in records {
        let row = header
            .iter()
            .map(|col| record.get(col).unwrap_or(""))
            .collect::<Vec<_>>();
        write_row(&mut buf, &row, SEP)?;
    }
    Ok(buf)
}

pub fn output_path(dir: &Path, site: &str, now: DateTime<Local>) -> PathBuf {
    dir.join(format!("{site}_data_{}.csv", file_timestamp(now)))
}

/// Write a site's records; returns `Ok(None)` without touching the disk when
/// there is nothing to write.
#[instrument(level = "info", skip(records, now), fields(records = records.len()))]
pub async fn write_site_csv(
    dir: &Path,
    site: &str,
    records: &[Record],
    now: DateTime<Local>,
) -> Result<Option<PathBuf>, ScrapeError> {
    if records.is_empty() {
        info!("No data to save");
        return Ok(None);
    }
    let path = output_path(dir, site, now);
    let bytes = to_csv_bytes(records)?;
    fs::write(&path, bytes).await?;
    info!(path = %path.display(), "Saved CSV");
    Ok(Some(path))
}
