//! # View Builder
//!
//! Read-only projections of an [`AggregationView`] for presentation: the
//! searched and sorted top list, and the detail of a single group.

use crate::aggregate::AggregationView;
use crate::record::PlayRecord;
use crate::summary::{self, Stats};
use std::fmt;
use std::str::FromStr;

/// Ordering of the top list, always descending.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortMode {
    /// Number of plays.
    #[default]
    Count,
    /// Total listening time.
    Time,
    /// Most recent play; undated groups sort last.
    Recent,
}

impl SortMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Count => "count",
            Self::Time => "time",
            Self::Recent => "recent",
        }
    }
}

impl fmt::Display for SortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "count" | "plays" => Ok(Self::Count),
            "time" => Ok(Self::Time),
            "recent" => Ok(Self::Recent),
            other => Err(format!("unknown sort mode '{other}' (use count, time or recent)")),
        }
    }
}

/// One line of the top list.
#[derive(Debug, Clone, PartialEq)]
pub struct TopRow<'a> {
    pub key: &'a str,
    pub representative: &'a PlayRecord,
    pub stats: Stats,
}

fn matches_query(record: &PlayRecord, query: &str) -> bool {
    let haystack = format!("{} {} {}", record.title(), record.artist(), record.album());
    haystack.to_lowercase().contains(query)
}

/// Summarizes every group, keeps those whose title, artist or album contain
/// `query` (case-insensitive; empty matches all), and sorts them by `sort`.
/// The sort is stable, so ties keep view order.
#[must_use]
pub fn build_top_list<'a>(view: &'a AggregationView, query: &str, sort: SortMode) -> Vec<TopRow<'a>> {
    let query = query.to_lowercase();
    let mut rows: Vec<TopRow<'a>> = view
        .iter()
        .filter(|group| query.is_empty() || matches_query(&group.representative, &query))
        .map(|group| TopRow {
            key: &group.key,
            representative: &group.representative,
            stats: summary::summarize(&group.plays),
        })
        .collect();

    match sort {
        SortMode::Count => rows.sort_by(|a, b| b.stats.count.cmp(&a.stats.count)),
        SortMode::Time => {
            rows.sort_by(|a, b| b.stats.total_duration_ms.cmp(&a.stats.total_duration_ms));
        }
        // `None < Some`, so descending order leaves undated groups last.
        SortMode::Recent => rows.sort_by(|a, b| b.stats.last.cmp(&a.stats.last)),
    }
    rows
}

/// Everything shown for a single selected group.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupDetail<'a> {
    pub key: &'a str,
    pub representative: &'a PlayRecord,
    pub stats: Stats,
    pub top_platform: Option<String>,
    pub top_country: Option<String>,
    pub timeline: Vec<(String, usize)>,
    /// Member plays, newest first; undated plays at the end.
    pub plays: Vec<&'a PlayRecord>,
}

#[must_use]
pub fn group_detail<'a>(view: &'a AggregationView, key: &str) -> Option<GroupDetail<'a>> {
    let group = view.get(key)?;
    let stats = summary::summarize(&group.plays);
    let mut plays: Vec<&PlayRecord> = group.plays.iter().collect();
    plays.sort_by_key(|play| std::cmp::Reverse(play.timestamp()));

    Some(GroupDetail {
        key: &group.key,
        representative: &group.representative,
        top_platform: stats.platforms.top_key().map(str::to_string),
        top_country: stats.countries.top_key().map(str::to_string),
        timeline: summary::monthly_timeline(&group.plays),
        stats,
        plays,
    })
}
