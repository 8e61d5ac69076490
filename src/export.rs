//! # CSV Export
//!
//! Writes the currently viewed top list as CSV, one row per track group, in
//! the order the list is shown.

use crate::view::TopRow;
use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use log::info;
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Default file name for exports.
pub const DEFAULT_FILE_NAME: &str = "audyssey-top-songs.csv";

pub const HEADER: [&str; 7] = [
    "title",
    "artist",
    "album",
    "plays",
    "minutesPlayed",
    "firstPlay",
    "lastPlay",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRow {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub plays: usize,
    /// Total duration in minutes with two decimals.
    pub minutes_played: String,
    /// ISO-8601 UTC with milliseconds, empty when the group has no dated play.
    pub first_play: String,
    pub last_play: String,
}

fn iso_or_empty(ts: Option<DateTime<Utc>>) -> String {
    ts.map(|ts| ts.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_default()
}

impl From<&TopRow<'_>> for ExportRow {
    fn from(row: &TopRow<'_>) -> Self {
        let record = row.representative;
        Self {
            title: record.title().to_string(),
            artist: record.artist().to_string(),
            album: record.album().to_string(),
            plays: row.stats.count,
            minutes_played: format!("{:.2}", row.stats.total_duration_ms as f64 / 60_000.0),
            first_play: iso_or_empty(row.stats.first),
            last_play: iso_or_empty(row.stats.last),
        }
    }
}

/// Writes the header and one record per row. The header is written even for
/// an empty list.
pub fn write_csv<W: Write>(writer: W, rows: &[TopRow<'_>]) -> Result<()> {
    let mut csv = csv::WriterBuilder::new().has_headers(false).from_writer(writer);
    csv.write_record(HEADER).context("Failed to write CSV header")?;
    for row in rows {
        csv.serialize(ExportRow::from(row))
            .with_context(|| format!("Failed to write CSV row for {}", row.key))?;
    }
    csv.flush().context("Failed to flush CSV output")?;
    Ok(())
}

/// Writes the CSV to `path`, replacing any existing file only once the whole
/// export has been written.
pub fn write_csv_file(path: &Path, rows: &[TopRow<'_>]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temporary file in {}", dir.display()))?;
    write_csv(&mut tmp, rows)?;
    tmp.persist(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    info!("Exported {} track groups to {}", rows.len(), path.display());
    Ok(())
}
