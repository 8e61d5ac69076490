//! # Record Store
//!
//! The single source of truth: every ingested [`PlayRecord`] in arrival
//! order, unique by dedupe key. Records are only ever appended by
//! [`RecordStore::ingest`]; removal is an explicit call.

use crate::canon;
use crate::record::PlayRecord;
use chrono::NaiveDate;
use log::{debug, warn};
use std::collections::HashSet;
use std::ops::AddAssign;

/// Outcome of merging a batch into the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub added: usize,
    pub ignored: usize,
}

impl AddAssign for IngestReport {
    fn add_assign(&mut self, other: Self) {
        self.added += other.added;
        self.ignored += other.ignored;
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecordStore {
    records: Vec<PlayRecord>,
    keys: HashSet<String>,
}

impl RecordStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a store from persisted records.
    ///
    /// Records without a dedupe key get one computed; later records that
    /// repeat a key are dropped so the uniqueness invariant holds even for
    /// hand-edited state.
    #[must_use]
    pub fn from_records(records: Vec<PlayRecord>) -> Self {
        let mut store = Self::new();
        let mut dropped = 0;
        for mut record in records {
            if record.dedupe_key.is_empty() {
                record.dedupe_key = canon::dedupe_key(&record);
            }
            if store.keys.insert(record.dedupe_key.clone()) {
                store.records.push(record);
            } else {
                dropped += 1;
            }
        }
        if dropped > 0 {
            warn!("Dropped {dropped} persisted plays with duplicate dedupe keys");
        }
        store
    }

    /// Appends every record whose dedupe key is not yet present, in input
    /// order. Duplicates, including repeats within `batch`, are counted as
    /// ignored and never overwrite what is stored.
    pub fn ingest<I>(&mut self, batch: I) -> IngestReport
    where
        I: IntoIterator<Item = PlayRecord>,
    {
        let mut report = IngestReport::default();
        for mut record in batch {
            let key = canon::dedupe_key(&record);
            if self.keys.contains(&key) {
                report.ignored += 1;
                continue;
            }
            self.keys.insert(key.clone());
            record.dedupe_key = key;
            self.records.push(record);
            report.added += 1;
        }
        debug!(
            "Ingested batch: {} added, {} ignored, {} stored",
            report.added,
            report.ignored,
            self.records.len()
        );
        report
    }

    #[must_use]
    pub fn records(&self) -> &[PlayRecord] {
        &self.records
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn contains(&self, dedupe_key: &str) -> bool {
        self.keys.contains(dedupe_key)
    }

    /// Deletes one record by dedupe key, keeping the order of the rest.
    pub fn remove(&mut self, dedupe_key: &str) -> Option<PlayRecord> {
        if !self.keys.remove(dedupe_key) {
            return None;
        }
        let position = self
            .records
            .iter()
            .position(|record| record.dedupe_key == dedupe_key)?;
        Some(self.records.remove(position))
    }

    /// Drops every record after the first `len`, undoing the tail of an
    /// ingest.
    pub fn truncate(&mut self, len: usize) {
        let len = len.min(self.records.len());
        for record in self.records.drain(len..) {
            self.keys.remove(&record.dedupe_key);
        }
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.keys.clear();
    }

    /// Calendar dates (UTC) of the earliest and latest parseable play.
    #[must_use]
    pub fn date_span(&self) -> Option<(NaiveDate, NaiveDate)> {
        let mut stamps = self.records.iter().filter_map(PlayRecord::timestamp);
        let first = stamps.next()?;
        let (min, max) = stamps.fold((first, first), |(min, max), ts| (min.min(ts), max.max(ts)));
        Some((min.date_naive(), max.date_naive()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn play(ts: &str, uri: &str) -> PlayRecord {
        PlayRecord {
            ts: Some(ts.to_string()),
            ms_played: 40_000,
            track_uri: Some(uri.to_string()),
            track_name: Some("Song".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_ingest_is_idempotent() {
        let batch = vec![
            play("2023-01-01T00:00:00Z", "uri1"),
            play("2023-01-02T00:00:00Z", "uri1"),
            play("2023-01-01T00:00:00Z", "uri2"),
        ];
        let mut store = RecordStore::new();

        let first = store.ingest(batch.clone());
        assert_eq!(first, IngestReport { added: 3, ignored: 0 });

        let second = store.ingest(batch);
        assert_eq!(second, IngestReport { added: 0, ignored: 3 });
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_ingest_rejects_duplicates_within_batch() {
        let mut store = RecordStore::new();
        let report = store.ingest(vec![
            play("2023-01-01T00:00:00Z", "uri1"),
            play("2023-01-01T00:00:00Z", "uri1"),
        ]);
        assert_eq!(report, IngestReport { added: 1, ignored: 1 });
    }

    #[test]
    fn test_ingest_attaches_key_and_keeps_order() {
        let mut store = RecordStore::new();
        store.ingest(vec![play("2023-01-02T00:00:00Z", "b"), play("2023-01-01T00:00:00Z", "a")]);
        let keys: Vec<_> = store.records().iter().map(|r| r.dedupe_key.as_str()).collect();
        assert_eq!(keys, ["2023-01-02T00:00:00Z-b", "2023-01-01T00:00:00Z-a"]);
    }

    #[test]
    fn test_ingest_never_alters_existing_records() {
        let mut store = RecordStore::new();
        store.ingest(vec![play("2023-01-01T00:00:00Z", "uri1")]);
        let before = store.records()[0].clone();

        let mut changed = play("2023-01-01T00:00:00Z", "uri1");
        changed.ms_played = 1;
        let report = store.ingest(vec![changed, play("2023-01-03T00:00:00Z", "uri3")]);

        assert_eq!(store.len(), 1 + report.added);
        assert_eq!(store.records()[0], before);
    }

    #[test]
    fn test_from_records_repairs_state() {
        let mut keyed = play("2023-01-01T00:00:00Z", "uri1");
        keyed.dedupe_key = canon::dedupe_key(&keyed);
        let store = RecordStore::from_records(vec![
            play("2023-01-01T00:00:00Z", "uri1"),
            keyed,
            play("2023-01-02T00:00:00Z", "uri1"),
        ]);
        assert_eq!(store.len(), 2);
        assert!(store.contains("2023-01-02T00:00:00Z-uri1"));
    }

    #[test]
    fn test_remove() {
        let mut store = RecordStore::new();
        store.ingest(vec![
            play("2023-01-01T00:00:00Z", "a"),
            play("2023-01-02T00:00:00Z", "b"),
            play("2023-01-03T00:00:00Z", "c"),
        ]);
        let removed = store.remove("2023-01-02T00:00:00Z-b").unwrap();
        assert_eq!(removed.track_uri(), Some("b"));
        assert_eq!(store.len(), 2);
        assert!(store.remove("2023-01-02T00:00:00Z-b").is_none());

        let report = store.ingest(vec![play("2023-01-02T00:00:00Z", "b")]);
        assert_eq!(report.added, 1, "forgotten plays can be imported again");
    }

    #[test]
    fn test_truncate_forgets_dropped_keys() {
        let mut store = RecordStore::new();
        store.ingest(vec![play("2023-01-01T00:00:00Z", "uri1")]);
        store.ingest(vec![
            play("2023-01-02T00:00:00Z", "uri2"),
            play("2023-01-03T00:00:00Z", "uri3"),
        ]);

        store.truncate(1);
        assert_eq!(store.len(), 1);
        assert!(store.contains("2023-01-01T00:00:00Z-uri1"));
        assert!(!store.contains("2023-01-02T00:00:00Z-uri2"));

        store.truncate(5);
        assert_eq!(store.len(), 1);

        let report = store.ingest(vec![play("2023-01-02T00:00:00Z", "uri2")]);
        assert_eq!(report, IngestReport { added: 1, ignored: 0 });
    }

    #[test]
    fn test_date_span() {
        let mut store = RecordStore::new();
        assert_eq!(store.date_span(), None);

        store.ingest(vec![
            play("2023-03-05T10:00:00Z", "a"),
            play("2022-12-31T23:59:59Z", "b"),
            play("not a date", "c"),
            play("2023-01-15T00:00:00Z", "d"),
        ]);
        let (first, last) = store.date_span().unwrap();
        assert_eq!(first, NaiveDate::from_ymd_opt(2022, 12, 31).unwrap());
        assert_eq!(last, NaiveDate::from_ymd_opt(2023, 3, 5).unwrap());
    }
}
