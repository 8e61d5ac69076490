//! # Session
//!
//! Owns all mutable state of one user session and exposes every user action
//! as an explicit command. The record store is the single source of truth;
//! the aggregation view is rebuilt from it on every store or filter change;
//! done marks and manual merges are sibling state with their own entries in
//! the key-value store.
//!
//! Each mutating command overwrites the affected persisted entries in full
//! before returning.
//!
//! ```
//! use audyssey::persist::MemoryKv;
//! use audyssey::session::Session;
//! use audyssey::view::SortMode;
//!
//! let mut session = Session::open(MemoryKv::default());
//! let records = audyssey::import::parse_export(
//!     r#"[{"ts": "2023-01-01T00:00:00Z", "ms_played": 40000, "spotify_track_uri": "uri1"}]"#,
//! )?;
//! let report = session.ingest(records)?;
//! assert_eq!(report.added, 1);
//! assert_eq!(session.top_list("", SortMode::Count).len(), 1);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::aggregate::{self, AggregationView, Filters, ManualMerge};
use crate::done::DoneMarks;
use crate::error::SessionError;
use crate::persist::{self, KeyValueStore};
use crate::record::PlayRecord;
use crate::store::{IngestReport, RecordStore};
use crate::summary::{self, DatasetTotals};
use crate::view::{self, GroupDetail, SortMode, TopRow};
use chrono::Utc;
use log::{debug, info, trace, warn};

pub struct Session<S: KeyValueStore> {
    kv: S,
    store: RecordStore,
    done: DoneMarks,
    merges: Vec<ManualMerge>,
    filters: Filters,
    view: AggregationView,
    selected: Option<String>,
}

impl<S: KeyValueStore> Session<S> {
    /// Loads persisted state from `kv` (empty state for anything missing or
    /// corrupted) and aggregates it with default filters.
    pub fn open(kv: S) -> Self {
        let store = persist::load_records(&kv);
        let done = persist::load_done_marks(&kv);
        let merges = persist::load_merges(&kv);
        info!(
            "Loaded {} plays, {} done marks, {} manual merges",
            store.len(),
            done.len(),
            merges.len()
        );

        let mut session = Self {
            kv,
            store,
            done,
            merges,
            filters: Filters::default(),
            view: AggregationView::default(),
            selected: None,
        };
        session.refresh();
        session
    }

    pub fn kv(&self) -> &S {
        &self.kv
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn view(&self) -> &AggregationView {
        &self.view
    }

    pub fn filters(&self) -> &Filters {
        &self.filters
    }

    pub fn done_marks(&self) -> &DoneMarks {
        &self.done
    }

    pub fn manual_merges(&self) -> &[ManualMerge] {
        &self.merges
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Rebuilds the view from the store and current filters, then replays
    /// manual merges in the order they were made.
    pub fn refresh(&mut self) {
        self.view = aggregate::aggregate(self.store.records(), &self.filters);
        for merge in &self.merges {
            if let Err(e) = self.view.merge(&merge.source, &merge.target) {
                trace!("Skipping manual merge replay: {e}");
            }
        }
        if let Some(selected) = &self.selected {
            if !self.view.contains(selected) {
                debug!("Selected group {selected} left the view");
                self.selected = None;
            }
        }
    }

    pub fn set_filters(&mut self, filters: Filters) {
        if filters != self.filters {
            self.filters = filters;
            self.refresh();
        }
    }

    /// Merges a batch of records into the store, persists it and refreshes
    /// the view.
    ///
    /// If the store cannot be persisted the batch is rolled back, so the
    /// store and view are as they were and a retry ingests it afresh.
    pub fn ingest(&mut self, records: Vec<PlayRecord>) -> Result<IngestReport, SessionError> {
        let stored = self.store.len();
        let report = self.store.ingest(records);
        if let Err(e) = persist::save_records(&mut self.kv, &self.store) {
            warn!("Rolling back {} ingested plays: {e:#}", report.added);
            self.store.truncate(stored);
            return Err(e.into());
        }
        self.refresh();
        Ok(report)
    }

    pub fn top_list(&self, query: &str, sort: SortMode) -> Vec<TopRow<'_>> {
        view::build_top_list(&self.view, query, sort)
    }

    pub fn totals(&self) -> DatasetTotals {
        summary::dataset_totals(&self.view)
    }

    pub fn detail(&self, key: &str) -> Option<GroupDetail<'_>> {
        view::group_detail(&self.view, key)
    }

    pub fn select(&mut self, key: &str) -> Result<(), SessionError> {
        if !self.view.contains(key) {
            return Err(SessionError::UnknownGroup(key.to_string()));
        }
        self.selected = Some(key.to_string());
        Ok(())
    }

    /// Manually folds group `source` into `target` and selects `target`.
    ///
    /// The merge is recorded so it survives later re-aggregation.
    ///
    /// Nothing changes if the ledger cannot be persisted.
    pub fn merge(&mut self, source: &str, target: &str) -> Result<(), SessionError> {
        self.view.merge(source, target)?;
        self.merges.push(ManualMerge {
            source: source.to_string(),
            target: target.to_string(),
        });
        if let Err(e) = persist::save_merges(&mut self.kv, &self.merges) {
            self.merges.pop();
            self.refresh();
            return Err(e.into());
        }
        info!("Merged track group {source} into {target}");
        self.selected = Some(target.to_string());
        Ok(())
    }

    pub fn mark_done(&mut self, key: &str) -> Result<(), SessionError> {
        self.mark_done_at(key, Utc::now().timestamp_millis())
    }

    /// Marks `key` done at `now_ms`. The mark is kept only once persisted.
    pub fn mark_done_at(&mut self, key: &str, now_ms: i64) -> Result<(), SessionError> {
        let mut done = self.done.clone();
        done.mark_done_at(key, now_ms);
        persist::save_done_marks(&mut self.kv, &done)?;
        self.done = done;
        Ok(())
    }

    pub fn is_done(&self, key: &str) -> bool {
        self.done.is_done(key)
    }

    pub fn is_done_at(&self, key: &str, now_ms: i64) -> bool {
        self.done.is_done_at(key, now_ms)
    }

    /// Removes one play from a group in the current view only.
    ///
    /// The record store is left as is, so the play comes back on the next
    /// refresh. Use [`Session::forget_play`] to delete it for good.
    pub fn delete_play(&mut self, group_key: &str, dedupe_key: &str) -> Result<PlayRecord, SessionError> {
        if !self.view.contains(group_key) {
            return Err(SessionError::UnknownGroup(group_key.to_string()));
        }
        self.view
            .remove_play(group_key, dedupe_key)
            .ok_or_else(|| SessionError::UnknownPlay(dedupe_key.to_string()))
    }

    /// Deletes a play from the record store, persists and refreshes.
    ///
    /// The play stays stored if the deletion cannot be persisted.
    pub fn forget_play(&mut self, dedupe_key: &str) -> Result<PlayRecord, SessionError> {
        let mut store = self.store.clone();
        let removed = store
            .remove(dedupe_key)
            .ok_or_else(|| SessionError::UnknownPlay(dedupe_key.to_string()))?;
        persist::save_records(&mut self.kv, &store)?;
        self.store = store;
        self.refresh();
        Ok(removed)
    }

    /// Drops every record, done mark and manual merge, and wipes the
    /// key-value store.
    pub fn reset(&mut self) -> Result<(), SessionError> {
        self.kv.clear()?;
        self.store.clear();
        self.done.clear();
        self.merges.clear();
        self.selected = None;
        self.view = AggregationView::default();
        info!("Session state reset");
        Ok(())
    }
}
