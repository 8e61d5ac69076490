//! # Aggregator
//!
//! Builds an [`AggregationView`] from the record store under a set of
//! [`Filters`]. The view is disposable: it is rebuilt from scratch whenever
//! the store or the filters change and is never persisted.
//!
//! Aggregation runs in two passes:
//!
//! 1. **Grouping** - records are visited in store order, filtered, and
//!    appended to the group for their [`group_key`](crate::canon::group_key).
//!    The first record seen becomes the group's representative.
//! 2. **Signature coalescing** (only with `merge_duplicates`) - groups are
//!    visited in insertion order and every group whose representative shares
//!    a [`merge_signature`](crate::canon::merge_signature) with an earlier
//!    group is folded into that earlier group. First seen wins.
//!
//! Insertion order of the view is part of its contract: it decides which
//! group survives coalescing and the tie order of the top list.

use crate::canon;
use crate::error::MergeError;
use crate::record::PlayRecord;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Plays shorter than this are dropped when short plays are skipped.
pub const SHORT_PLAY_THRESHOLD_MS: u64 = 30_000;

/// Active aggregation filters. The default admits every record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filters {
    /// Inclusive lower bound on play time.
    pub start: Option<DateTime<Utc>>,
    /// Inclusive upper bound on play time.
    pub end: Option<DateTime<Utc>>,
    /// Exclude plays under [`SHORT_PLAY_THRESHOLD_MS`].
    pub skip_short_plays: bool,
    /// Group by normalized artist and title instead of exact URI.
    pub merge_duplicates: bool,
}

impl Filters {
    /// Bounds covering whole calendar days (UTC), both ends inclusive.
    #[must_use]
    pub fn with_date_range(mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        self.start = from.map(start_of_day);
        self.end = to.map(end_of_day);
        self
    }

    /// Whether `record` takes part in aggregation at all.
    ///
    /// A record with no parseable timestamp only passes when no date bound
    /// is set.
    #[must_use]
    pub fn admits(&self, record: &PlayRecord) -> bool {
        if self.start.is_some() || self.end.is_some() {
            let Some(ts) = record.timestamp() else {
                return false;
            };
            if self.start.is_some_and(|start| ts < start) {
                return false;
            }
            if self.end.is_some_and(|end| ts > end) {
                return false;
            }
        }
        !(self.skip_short_plays && record.ms_played < SHORT_PLAY_THRESHOLD_MS)
    }
}

#[must_use]
pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

#[must_use]
pub fn end_of_day(date: NaiveDate) -> DateTime<Utc> {
    start_of_day(date) + Duration::days(1) - Duration::milliseconds(1)
}

/// One logical track and every play attributed to it.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackGroup {
    pub key: String,
    /// First record seen for the group; its metadata is what gets displayed.
    pub representative: PlayRecord,
    /// Members in insertion order, not time order.
    pub plays: Vec<PlayRecord>,
}

impl TrackGroup {
    fn new(key: String, first: PlayRecord) -> Self {
        Self {
            key,
            representative: first.clone(),
            plays: vec![first],
        }
    }
}

/// A manual merge, kept so it can be replayed after re-aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualMerge {
    pub source: String,
    pub target: String,
}

/// Insertion-ordered mapping from grouping key to [`TrackGroup`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregationView {
    groups: Vec<TrackGroup>,
    index: HashMap<String, usize>,
}

impl AggregationView {
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&TrackGroup> {
        self.index.get(key).map(|&pos| &self.groups[pos])
    }

    /// Groups in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &TrackGroup> {
        self.groups.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|group| group.key.as_str())
    }

    fn push(&mut self, group: TrackGroup) {
        self.index.insert(group.key.clone(), self.groups.len());
        self.groups.push(group);
    }

    fn get_mut(&mut self, key: &str) -> Option<&mut TrackGroup> {
        let pos = *self.index.get(key)?;
        self.groups.get_mut(pos)
    }

    fn remove(&mut self, key: &str) -> Option<TrackGroup> {
        let pos = self.index.remove(key)?;
        let removed = self.groups.remove(pos);
        for group in &self.groups[pos..] {
            if let Some(slot) = self.index.get_mut(&group.key) {
                *slot -= 1;
            }
        }
        Some(removed)
    }

    /// Folds `source` into `target`: source's plays are appended to target
    /// in their existing order and source leaves the view.
    ///
    /// # Errors
    ///
    /// Identical keys or a key missing from the view leave the view
    /// untouched and report why.
    pub fn merge(&mut self, source: &str, target: &str) -> Result<(), MergeError> {
        if source == target {
            return Err(MergeError::SameGroup(source.to_string()));
        }
        if !self.contains(source) {
            return Err(MergeError::UnknownSource(source.to_string()));
        }
        if !self.contains(target) {
            return Err(MergeError::UnknownTarget(target.to_string()));
        }
        let Some(moved) = self.remove(source) else {
            return Err(MergeError::UnknownSource(source.to_string()));
        };
        let Some(destination) = self.get_mut(target) else {
            return Err(MergeError::UnknownTarget(target.to_string()));
        };
        destination.plays.extend(moved.plays);
        Ok(())
    }

    /// Drops one play from a group's member list, in this view only.
    ///
    /// The record store is not touched, so the play reappears on the next
    /// aggregation.
    pub fn remove_play(&mut self, key: &str, dedupe_key: &str) -> Option<PlayRecord> {
        let group = self.get_mut(key)?;
        let pos = group
            .plays
            .iter()
            .position(|play| play.dedupe_key == dedupe_key)?;
        Some(group.plays.remove(pos))
    }
}

/// Builds the view for `records` under `filters`. Deterministic for a
/// fixed input order.
#[must_use]
pub fn aggregate(records: &[PlayRecord], filters: &Filters) -> AggregationView {
    let mut view = AggregationView::default();
    let mut admitted = 0usize;

    for record in records.iter().filter(|record| filters.admits(record)) {
        admitted += 1;
        let key = canon::group_key(record, filters.merge_duplicates);
        match view.get_mut(&key) {
            Some(group) => group.plays.push(record.clone()),
            None => view.push(TrackGroup::new(key, record.clone())),
        }
    }
    debug!(
        "Grouped {admitted} of {} plays into {} track groups",
        records.len(),
        view.len()
    );

    if filters.merge_duplicates {
        view = coalesce_by_signature(view);
    }
    view
}

fn coalesce_by_signature(view: AggregationView) -> AggregationView {
    let mut canonical: HashMap<String, String> = HashMap::new();
    let mut coalesced = AggregationView::default();

    for group in view.groups {
        let Some(signature) = canon::merge_signature(&group.representative) else {
            coalesced.push(group);
            continue;
        };
        match canonical.get(&signature).and_then(|key| coalesced.get_mut(key)) {
            Some(target) => {
                trace!("Coalescing {} into {} ({signature})", group.key, target.key);
                target.plays.extend(group.plays);
            }
            None => {
                canonical.insert(signature, group.key.clone());
                coalesced.push(group);
            }
        }
    }
    debug!("Signature coalescing left {} track groups", coalesced.len());
    coalesced
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::RecordStore;
    use chrono::TimeZone;

    fn play(ts: &str, ms: u64, uri: Option<&str>, title: &str, artist: &str) -> PlayRecord {
        PlayRecord {
            ts: Some(ts.to_string()),
            ms_played: ms,
            track_uri: uri.map(str::to_string),
            track_name: Some(title.to_string()),
            artist_name: Some(artist.to_string()),
            album_name: Some("Album".to_string()),
            ..Default::default()
        }
    }

    fn store(records: Vec<PlayRecord>) -> RecordStore {
        let mut store = RecordStore::new();
        store.ingest(records);
        store
    }

    fn merging() -> Filters {
        Filters {
            merge_duplicates: true,
            ..Filters::default()
        }
    }

    #[test]
    fn test_groups_by_uri_without_merging() {
        let store = store(vec![
            play("2023-01-01T00:00:00Z", 40_000, Some("uri1"), "Song", "Band"),
            play("2023-01-02T00:00:00Z", 40_000, Some("uri2"), "Song (Live)", "Band"),
            play("2023-01-03T00:00:00Z", 40_000, Some("uri1"), "Song", "Band"),
        ]);
        let view = aggregate(store.records(), &Filters::default());

        assert_eq!(view.keys().collect::<Vec<_>>(), ["uri1", "uri2"]);
        assert_eq!(view.get("uri1").unwrap().plays.len(), 2);
    }

    #[test]
    fn test_representative_is_first_seen() {
        let store = store(vec![
            play("2023-02-01T00:00:00Z", 40_000, Some("uri1"), "Later Name", "Band"),
            play("2023-01-01T00:00:00Z", 40_000, Some("uri1"), "Earlier Name", "Band"),
        ]);
        let view = aggregate(store.records(), &Filters::default());
        assert_eq!(view.get("uri1").unwrap().representative.title(), "Later Name");
    }

    #[test]
    fn test_merge_mode_collapses_live_versions() {
        let store = store(vec![
            play("2023-01-01T00:00:00Z", 40_000, None, "Song (Live)", "Band"),
            play("2023-01-02T00:00:00Z", 40_000, None, "song", "Band"),
        ]);
        let view = aggregate(store.records(), &merging());

        assert_eq!(view.len(), 1);
        assert_eq!(view.get("band::song").unwrap().plays.len(), 2);
    }

    #[test]
    fn test_signature_coalescing_first_group_wins() {
        let mut view = AggregationView::default();
        view.push(TrackGroup::new(
            "first".to_string(),
            play("2023-01-01T00:00:00Z", 40_000, None, "Song", "Band"),
        ));
        view.push(TrackGroup::new(
            "other".to_string(),
            play("2023-01-02T00:00:00Z", 40_000, None, "Other", "Band"),
        ));
        view.push(TrackGroup::new(
            "second".to_string(),
            play("2023-01-03T00:00:00Z", 40_000, None, "Song (Live)", " band"),
        ));

        let coalesced = coalesce_by_signature(view);
        assert_eq!(coalesced.keys().collect::<Vec<_>>(), ["first", "other"]);

        let first = coalesced.get("first").unwrap();
        assert_eq!(first.representative.title(), "Song");
        let ts: Vec<_> = first.plays.iter().map(|p| p.ts.as_deref()).collect();
        assert_eq!(ts, [Some("2023-01-01T00:00:00Z"), Some("2023-01-03T00:00:00Z")]);
    }

    #[test]
    fn test_generic_titles_never_coalesce() {
        let mut view = AggregationView::default();
        view.push(TrackGroup::new(
            "one".to_string(),
            play("2023-01-01T00:00:00Z", 40_000, None, "Intro", "Band"),
        ));
        view.push(TrackGroup::new(
            "two".to_string(),
            play("2023-01-02T00:00:00Z", 40_000, None, "Intro", "Band"),
        ));
        view.push(TrackGroup::new(
            "three".to_string(),
            play("2023-01-03T00:00:00Z", 40_000, None, "Song", ""),
        ));
        view.push(TrackGroup::new(
            "four".to_string(),
            play("2023-01-04T00:00:00Z", 40_000, None, "Song", ""),
        ));

        assert_eq!(coalesce_by_signature(view).len(), 4);
    }

    #[test]
    fn test_short_plays_excluded_from_view_only() {
        let store = store(vec![
            play("2023-01-01T00:00:00Z", 10_000, Some("uri1"), "Song", "Band"),
            play("2023-01-02T00:00:00Z", 30_000, Some("uri2"), "Other", "Band"),
        ]);
        let filters = Filters {
            skip_short_plays: true,
            ..Filters::default()
        };
        let view = aggregate(store.records(), &filters);

        assert!(!view.contains("uri1"));
        assert!(view.contains("uri2"), "threshold is inclusive of 30 s");
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_date_bounds_are_inclusive() {
        let store = store(vec![
            play("2022-12-31T23:59:59Z", 40_000, Some("before"), "A", "Band"),
            play("2023-01-01T00:00:00Z", 40_000, Some("first"), "B", "Band"),
            play("2023-01-31T23:59:59Z", 40_000, Some("last"), "C", "Band"),
            play("2023-02-01T00:00:00Z", 40_000, Some("after"), "D", "Band"),
            play("garbage", 40_000, Some("undated"), "E", "Band"),
        ]);
        let filters = Filters::default().with_date_range(
            NaiveDate::from_ymd_opt(2023, 1, 1),
            NaiveDate::from_ymd_opt(2023, 1, 31),
        );
        let view = aggregate(store.records(), &filters);
        assert_eq!(view.keys().collect::<Vec<_>>(), ["first", "last"]);

        let unbounded = aggregate(store.records(), &Filters::default());
        assert!(unbounded.contains("undated"));
    }

    #[test]
    fn test_any_date_bound_drops_undated() {
        let store = store(vec![
            play("2023-06-01T12:00:00Z", 40_000, Some("dated"), "A", "Band"),
            play("", 40_000, Some("undated"), "B", "Band"),
        ]);
        let day = NaiveDate::from_ymd_opt(2023, 6, 1);

        for filters in [
            Filters::default().with_date_range(day, None),
            Filters::default().with_date_range(None, day),
        ] {
            let view = aggregate(store.records(), &filters);
            assert_eq!(view.keys().collect::<Vec<_>>(), ["dated"]);
        }
    }

    #[test]
    fn test_day_bounds() {
        let day = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        assert_eq!(start_of_day(day), Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(
            end_of_day(day),
            Utc.with_ymd_and_hms(2023, 1, 2, 0, 0, 0).unwrap() - Duration::milliseconds(1)
        );
    }

    #[test]
    fn test_aggregation_is_deterministic() {
        let store = store(
            (0..50)
                .map(|i| {
                    play(
                        &format!("2023-01-01T00:00:{:02}Z", i % 60),
                        40_000,
                        if i % 3 == 0 { None } else { Some("uri") },
                        &format!("Song {}", i % 7),
                        "Band",
                    )
                })
                .collect(),
        );
        let first = aggregate(store.records(), &merging());
        let second = aggregate(store.records(), &merging());
        assert_eq!(first, second);
    }

    #[test]
    fn test_merge_conserves_plays() {
        let store = store(vec![
            play("2023-01-01T00:00:00Z", 40_000, Some("a"), "A", "Band"),
            play("2023-01-02T00:00:00Z", 40_000, Some("b"), "B", "Band"),
            play("2023-01-03T00:00:00Z", 40_000, Some("a"), "A", "Band"),
            play("2023-01-04T00:00:00Z", 40_000, Some("c"), "C", "Band"),
        ]);
        let mut view = aggregate(store.records(), &Filters::default());

        view.merge("a", "b").unwrap();
        assert!(!view.contains("a"));
        assert_eq!(view.get("b").unwrap().plays.len(), 3);
        assert_eq!(view.keys().collect::<Vec<_>>(), ["b", "c"]);
        assert_eq!(view.get("c").unwrap().key, "c", "index shifted after removal");
    }

    #[test]
    fn test_invalid_merges_are_noops() {
        let store = store(vec![play("2023-01-01T00:00:00Z", 40_000, Some("a"), "A", "Band")]);
        let mut view = aggregate(store.records(), &Filters::default());
        let before = view.clone();

        assert_eq!(view.merge("a", "a"), Err(MergeError::SameGroup("a".into())));
        assert_eq!(view.merge("x", "a"), Err(MergeError::UnknownSource("x".into())));
        assert_eq!(view.merge("a", "x"), Err(MergeError::UnknownTarget("x".into())));
        assert_eq!(view, before);
    }

    #[test]
    fn test_remove_play_is_view_only() {
        let store = store(vec![
            play("2023-01-01T00:00:00Z", 40_000, Some("a"), "A", "Band"),
            play("2023-01-02T00:00:00Z", 40_000, Some("a"), "A", "Band"),
        ]);
        let mut view = aggregate(store.records(), &Filters::default());

        let removed = view.remove_play("a", "2023-01-01T00:00:00Z-a").unwrap();
        assert_eq!(removed.ts.as_deref(), Some("2023-01-01T00:00:00Z"));
        assert_eq!(view.get("a").unwrap().plays.len(), 1);
        assert!(view.remove_play("a", "missing").is_none());

        let rebuilt = aggregate(store.records(), &Filters::default());
        assert_eq!(rebuilt.get("a").unwrap().plays.len(), 2);
    }
}
