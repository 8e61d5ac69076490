//! # Batch Import
//!
//! Reads listening-history export files and feeds them through the
//! deduplicating ingestor one at a time. Each file is fully parsed and merged
//! before the next is opened, so progress and duplicate counts always reflect
//! everything ingested so far.
//!
//! A file that cannot be read or parsed is reported and skipped; the batch
//! carries on with the remaining files.

use crate::error::{ImportError, SessionError};
use crate::persist::KeyValueStore;
use crate::record::PlayRecord;
use crate::session::Session;
use crate::store::IngestReport;
use log::{debug, info, warn};
use path_absolutize::Absolutize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// Emitted before each file is processed, and once more when the batch ends.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportProgress<'a> {
    /// Zero-based position of the file about to be read; equals `total` on
    /// the final event.
    pub index: usize,
    pub total: usize,
    /// File name of the current file, empty on the final event.
    pub name: &'a str,
    /// Share of files already processed, `0.0..=100.0`.
    pub percent: f64,
}

/// Parses one export document: either a JSON array of play objects or a
/// single play object.
pub fn parse_export(text: &str) -> Result<Vec<PlayRecord>, serde_json::Error> {
    match serde_json::from_str::<Value>(text)? {
        Value::Array(items) => items.into_iter().map(serde_json::from_value).collect(),
        single => Ok(vec![serde_json::from_value(single)?]),
    }
}

/// Reads and parses the export file at `path`.
pub fn read_export(path: &Path) -> Result<Vec<PlayRecord>, ImportError> {
    let text = fs::read_to_string(path).map_err(|source| ImportError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_export(&text).map_err(|source| ImportError::Parse {
        name: display_name(path),
        source,
    })
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |name| name.to_string_lossy().into_owned())
}

/// Outcome of importing one file.
#[derive(Debug)]
pub struct FileReport {
    pub name: String,
    pub path: PathBuf,
    pub outcome: Result<IngestReport, ImportError>,
}

#[derive(Debug, Default)]
pub struct ImportSummary {
    pub files: Vec<FileReport>,
    /// Added and ignored plays summed over every file that parsed.
    pub totals: IngestReport,
}

impl ImportSummary {
    /// Files that were skipped because they could not be read or parsed.
    pub fn failed(&self) -> impl Iterator<Item = &FileReport> {
        self.files.iter().filter(|file| file.outcome.is_err())
    }
}

/// Imports `paths` in order into `session`.
///
/// Per-file read and parse failures end up in the returned summary. Only a
/// failure to persist the store aborts the batch.
pub fn import_files<S, P, F>(
    session: &mut Session<S>,
    paths: &[P],
    mut on_progress: F,
) -> Result<ImportSummary, SessionError>
where
    S: KeyValueStore,
    P: AsRef<Path>,
    F: FnMut(ImportProgress<'_>),
{
    let total = paths.len();
    let mut summary = ImportSummary::default();

    for (index, path) in paths.iter().enumerate() {
        let path = path.as_ref();
        let path = path
            .absolutize()
            .map_or_else(|_| path.to_path_buf(), |abs| abs.into_owned());
        let name = display_name(&path);

        on_progress(ImportProgress {
            index,
            total,
            name: &name,
            percent: index as f64 / total as f64 * 100.0,
        });

        let outcome = match read_export(&path) {
            Ok(records) => {
                debug!("Parsed {} plays from {}", records.len(), path.display());
                let report = session.ingest(records)?;
                summary.totals += report;
                info!("{name}: {} added, {} duplicates", report.added, report.ignored);
                Ok(report)
            }
            Err(e) => {
                warn!("Skipping {name}: {e}");
                Err(e)
            }
        };

        summary.files.push(FileReport { name, path, outcome });
    }

    on_progress(ImportProgress {
        index: total,
        total,
        name: "",
        percent: 100.0,
    });
    info!(
        "Import finished: {} added, {} duplicates, {} of {total} files failed",
        summary.totals.added,
        summary.totals.ignored,
        summary.failed().count()
    );
    Ok(summary)
}

/// Ingests a single export document held in memory. `name` only labels the
/// error if the document does not parse.
pub fn import_json_str<S: KeyValueStore>(
    session: &mut Session<S>,
    name: &str,
    text: &str,
) -> Result<IngestReport, SessionError> {
    let records = parse_export(text).map_err(|source| ImportError::Parse {
        name: name.to_string(),
        source,
    })?;
    session.ingest(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::MemoryKv;
    use tempfile::TempDir;

    const TWO_PLAYS: &str = r#"[
        {"ts": "2023-01-01T00:00:00Z", "ms_played": 40000, "spotify_track_uri": "uri1"},
        {"ts": "2023-01-02T00:00:00Z", "ms_played": 50000, "spotify_track_uri": "uri2"}
    ]"#;

    #[test]
    fn test_parse_array_and_singleton() {
        assert_eq!(parse_export(TWO_PLAYS).unwrap().len(), 2);

        let single = parse_export(r#"{"ts": "2023-01-01T00:00:00Z", "ms_played": 1}"#).unwrap();
        assert_eq!(single.len(), 1);
        assert_eq!(single[0].ms_played, 1);

        assert!(parse_export("[]").unwrap().is_empty());
    }

    #[test]
    fn test_parse_rejects_malformed_input() {
        assert!(parse_export("{\"ts\": ").is_err());
        assert!(parse_export("[1, 2]").is_err());
    }

    #[test]
    fn test_batch_skips_bad_files_and_reports_progress() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let good = dir.path().join("Streaming_History_0.json");
        let bad = dir.path().join("broken.json");
        let again = dir.path().join("Streaming_History_0_copy.json");
        let missing = dir.path().join("missing.json");
        fs::write(&good, TWO_PLAYS)?;
        fs::write(&bad, "not json at all")?;
        fs::write(&again, TWO_PLAYS)?;

        let mut session = Session::open(MemoryKv::default());
        let mut events = Vec::new();
        let summary = import_files(&mut session, &[&good, &bad, &again, &missing], |p| {
            events.push((p.index, p.name.to_string(), p.percent));
        })?;

        assert_eq!(summary.totals, IngestReport { added: 2, ignored: 2 });
        assert_eq!(summary.files.len(), 4);
        assert_eq!(summary.failed().count(), 2);
        assert!(matches!(summary.files[1].outcome, Err(ImportError::Parse { .. })));
        assert!(matches!(summary.files[3].outcome, Err(ImportError::Read { .. })));
        assert!(summary.files[0].path.is_absolute());

        assert_eq!(events.len(), 5);
        assert_eq!(events[0], (0, "Streaming_History_0.json".to_string(), 0.0));
        assert_eq!(events[2].2, 50.0);
        assert_eq!(events[4], (4, String::new(), 100.0));

        assert_eq!(session.store().len(), 2);
        Ok(())
    }

    #[test]
    fn test_empty_batch_still_finishes() -> anyhow::Result<()> {
        let mut session = Session::open(MemoryKv::default());
        let mut last = None;
        let summary = import_files::<_, PathBuf, _>(&mut session, &[], |p| last = Some(p.percent))?;
        assert!(summary.files.is_empty());
        assert_eq!(last, Some(100.0));
        Ok(())
    }

    #[test]
    fn test_import_json_str() {
        let mut session = Session::open(MemoryKv::default());
        let report = import_json_str(&mut session, "paste", TWO_PLAYS).unwrap();
        assert_eq!(report.added, 2);

        let err = import_json_str(&mut session, "paste", "oops").unwrap_err();
        assert!(err.to_string().contains("paste"));
        assert_eq!(session.store().len(), 2);
    }
}
