//! # Canonicalizer
//!
//! Pure functions that derive identities from a [`PlayRecord`]:
//!
//! - [`dedupe_key`] - identity of the play event itself
//! - [`group_key`] - identity of the track group the play belongs to
//! - [`merge_signature`] - coarser identity used for automatic coalescing
//!
//! Titles are compared through [`normalize_title`], which drops bracketed
//! qualifiers such as "(Remastered)" or "[Live]" and all punctuation.

use crate::record::PlayRecord;
use lazy_static::lazy_static;
use regex::Regex;

/// Normalized titles too generic to identify a track across albums.
pub const FORBIDDEN_TITLES: [&str; 3] = ["intro", "outro", "interlude"];

lazy_static! {
    static ref BRACKETED: Regex =
        Regex::new(r"\(.*?\)|\[.*?\]").expect("bracket pattern is valid");
}

/// `"{ts}-{uri or track name}"`; two records with the same key are one event.
#[must_use]
pub fn dedupe_key(record: &PlayRecord) -> String {
    let ts = record.ts.as_deref().unwrap_or_default();
    let identity = record
        .track_uri()
        .or_else(|| record.track_name())
        .unwrap_or_default();
    format!("{ts}-{identity}")
}

/// Lowercases, strips bracketed segments and everything outside
/// `[a-z0-9 ]`, then collapses whitespace.
#[must_use]
pub fn normalize_title(title: &str) -> String {
    let lowered = title.to_lowercase();
    let unbracketed = BRACKETED.replace_all(&lowered, "");
    let kept: String = unbracketed
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c.is_whitespace())
        .collect();
    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[must_use]
pub fn is_forbidden_title(normalized: &str) -> bool {
    FORBIDDEN_TITLES.contains(&normalized)
}

fn artist_key(record: &PlayRecord) -> String {
    record.artist().to_lowercase().trim().to_string()
}

/// Grouping key for `record`.
///
/// Without duplicate merging a track URI is an exact identity. Otherwise the
/// key is `artist::normalized title`. Records missing either part fall back
/// to their URI or raw title. Generic titles stay per-URI, or per-album when
/// there is no URI, so unrelated interludes never share a group.
#[must_use]
pub fn group_key(record: &PlayRecord, merge_duplicates: bool) -> String {
    let uri = record.track_uri();
    if !merge_duplicates {
        if let Some(uri) = uri {
            return uri.to_string();
        }
    }

    let artist = artist_key(record);
    let title = normalize_title(record.title());
    if artist.is_empty() || title.is_empty() {
        return uri
            .or_else(|| record.track_name())
            .unwrap_or_default()
            .to_string();
    }
    if is_forbidden_title(&title) {
        return match uri {
            Some(uri) => uri.to_string(),
            None => format!("{artist}-{title}-{}", record.album()),
        };
    }
    format!("{artist}::{title}")
}

/// `artist-normalized title`, or `None` when the record must never be
/// auto-merged (missing artist or title, or a generic title).
#[must_use]
pub fn merge_signature(representative: &PlayRecord) -> Option<String> {
    let artist = artist_key(representative);
    let title = normalize_title(representative.title());
    if artist.is_empty() || title.is_empty() || is_forbidden_title(&title) {
        return None;
    }
    Some(format!("{artist}-{title}"))
}
