//! # Summarizer
//!
//! Statistics over an arbitrary set of plays: one track group, or the whole
//! view for dataset totals.

use crate::aggregate::AggregationView;
use crate::record::PlayRecord;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};

/// Occurrence counts per observed value, in order of first occurrence.
///
/// The order matters: [`Tally::top_key`] breaks ties in favour of the value
/// seen first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tally {
    entries: Vec<(String, usize)>,
}

impl Tally {
    pub fn add(&mut self, value: &str) {
        match self.entries.iter_mut().find(|(seen, _)| seen == value) {
            Some((_, count)) => *count += 1,
            None => self.entries.push((value.to_string(), 1)),
        }
    }

    #[must_use]
    pub fn get(&self, value: &str) -> usize {
        self.entries
            .iter()
            .find(|(seen, _)| seen == value)
            .map_or(0, |(_, count)| *count)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.entries.iter().map(|(value, count)| (value.as_str(), *count))
    }

    /// Value with strictly the highest count; on ties the earliest wins.
    #[must_use]
    pub fn top_key(&self) -> Option<&str> {
        let mut best: Option<(&str, usize)> = None;
        for (value, count) in self.iter() {
            if best.map_or(true, |(_, best_count)| count > best_count) {
                best = Some((value, count));
            }
        }
        best.map(|(value, _)| value)
    }
}

impl<'a> FromIterator<&'a str> for Tally {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        let mut tally = Self::default();
        for value in iter {
            tally.add(value);
        }
        tally
    }
}

/// Categorical fields that can be tallied. Absent values are skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TallyField {
    Platform,
    Country,
}

impl TallyField {
    fn read(self, record: &PlayRecord) -> Option<&str> {
        match self {
            Self::Platform => record.platform(),
            Self::Country => record.country(),
        }
    }
}

#[must_use]
pub fn tally<'a, I>(records: I, field: TallyField) -> Tally
where
    I: IntoIterator<Item = &'a PlayRecord>,
{
    records.into_iter().filter_map(|record| field.read(record)).collect()
}

#[must_use]
pub fn top_key(tally: &Tally) -> Option<&str> {
    tally.top_key()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stats {
    pub count: usize,
    pub total_duration_ms: u64,
    /// Earliest parseable timestamp; `None` for an empty or undated set.
    pub first: Option<DateTime<Utc>>,
    pub last: Option<DateTime<Utc>>,
    pub platforms: Tally,
    pub countries: Tally,
}

/// Summarizes `records`. An empty set yields zeroed [`Stats`].
#[must_use]
pub fn summarize<'a, I>(records: I) -> Stats
where
    I: IntoIterator<Item = &'a PlayRecord>,
{
    let mut stats = Stats::default();
    for record in records {
        stats.count += 1;
        stats.total_duration_ms = stats.total_duration_ms.saturating_add(record.ms_played);
        if let Some(ts) = record.timestamp() {
            stats.first = Some(stats.first.map_or(ts, |first| first.min(ts)));
            stats.last = Some(stats.last.map_or(ts, |last| last.max(ts)));
        }
        if let Some(platform) = TallyField::Platform.read(record) {
            stats.platforms.add(platform);
        }
        if let Some(country) = TallyField::Country.read(record) {
            stats.countries.add(country);
        }
    }
    stats
}

/// Headline numbers for everything currently in the view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DatasetTotals {
    pub tracks: usize,
    pub plays: usize,
    pub total_duration_ms: u64,
    /// Distinct non-empty platforms.
    pub platforms: usize,
}

impl DatasetTotals {
    #[must_use]
    pub fn hours_played(&self) -> f64 {
        self.total_duration_ms as f64 / 3_600_000.0
    }
}

#[must_use]
pub fn dataset_totals(view: &AggregationView) -> DatasetTotals {
    let mut totals = DatasetTotals {
        tracks: view.len(),
        ..DatasetTotals::default()
    };
    let mut platforms = HashSet::new();
    for play in view.iter().flat_map(|group| group.plays.iter()) {
        totals.plays += 1;
        totals.total_duration_ms = totals.total_duration_ms.saturating_add(play.ms_played);
        if let Some(platform) = play.platform() {
            platforms.insert(platform);
        }
    }
    totals.platforms = platforms.len();
    totals
}

/// Plays per calendar month (`YYYY-MM`, UTC), oldest month first.
#[must_use]
pub fn monthly_timeline<'a, I>(records: I) -> Vec<(String, usize)>
where
    I: IntoIterator<Item = &'a PlayRecord>,
{
    let mut buckets: BTreeMap<String, usize> = BTreeMap::new();
    for ts in records.into_iter().filter_map(PlayRecord::timestamp) {
        *buckets.entry(ts.format("%Y-%m").to_string()).or_default() += 1;
    }
    buckets.into_iter().collect()
}

/// Human listening time: seconds below a minute, else minutes to one decimal.
#[must_use]
pub fn format_listen_time(ms: u64) -> String {
    if ms < 60_000 {
        format!("{:.0}s", ms as f64 / 1000.0)
    } else {
        format!("{:.1} min", ms as f64 / 60_000.0)
    }
}
