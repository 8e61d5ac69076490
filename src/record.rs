//! # Play Records
//!
//! One [`PlayRecord`] is one listening event from a streaming-history export.
//! The serde shape mirrors the export's JSON field names so files can be read
//! directly, and any field this crate does not interpret is carried through
//! ingestion and persistence untouched.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// A single play event.
///
/// Text fields are optional because real exports contain `null` for podcasts,
/// local files and deleted tracks. Empty strings are treated the same as
/// absent values by every accessor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayRecord {
    /// ISO-8601 timestamp of the play, kept verbatim for dedupe identity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<String>,

    /// Milliseconds listened. Absent, null or negative values become 0.
    #[serde(default, deserialize_with = "deserialize_ms_played")]
    pub ms_played: u64,

    #[serde(
        rename = "spotify_track_uri",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub track_uri: Option<String>,

    #[serde(
        rename = "master_metadata_track_name",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub track_name: Option<String>,

    #[serde(
        rename = "master_metadata_album_artist_name",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub artist_name: Option<String>,

    #[serde(
        rename = "master_metadata_album_album_name",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub album_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,

    #[serde(
        rename = "conn_country",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub country: Option<String>,

    /// Identity attached at ingestion; empty until the record enters a store.
    #[serde(rename = "_dedupeKey", default, skip_serializing_if = "String::is_empty")]
    pub dedupe_key: String,

    /// Every other export field (`reason_start`, `shuffle`, `skipped`, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn deserialize_ms_played<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<f64>::deserialize(deserializer)?;
    Ok(match raw {
        Some(ms) if ms.is_finite() && ms > 0.0 => ms as u64,
        _ => 0,
    })
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

impl PlayRecord {
    pub fn track_uri(&self) -> Option<&str> {
        non_empty(&self.track_uri)
    }

    pub fn track_name(&self) -> Option<&str> {
        non_empty(&self.track_name)
    }

    pub fn artist_name(&self) -> Option<&str> {
        non_empty(&self.artist_name)
    }

    pub fn album_name(&self) -> Option<&str> {
        non_empty(&self.album_name)
    }

    pub fn platform(&self) -> Option<&str> {
        non_empty(&self.platform)
    }

    pub fn country(&self) -> Option<&str> {
        non_empty(&self.country)
    }

    /// Title for display and search, empty when unknown.
    pub fn title(&self) -> &str {
        self.track_name().unwrap_or_default()
    }

    /// Artist for display and search, empty when unknown.
    pub fn artist(&self) -> &str {
        self.artist_name().unwrap_or_default()
    }

    /// Album for display and search, empty when unknown.
    pub fn album(&self) -> &str {
        self.album_name().unwrap_or_default()
    }

    /// Parsed play time, or `None` when `ts` is missing or unparseable.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.ts.as_deref().and_then(parse_timestamp)
    }
}

/// Parses the timestamp forms found in exports.
///
/// Accepts RFC 3339 (`2023-01-01T00:00:00Z`), a zone-less date-time which is
/// read as UTC, and a bare date which is read as UTC midnight.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
