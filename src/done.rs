//! # Done Marks
//!
//! Per-group "handled" annotations with a rolling expiry. Marks live beside
//! the record store, not inside it: resetting imports does not touch them,
//! and an expired mark stays stored but inert.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Four 30-day months in milliseconds. A fixed duration, not calendar months.
pub const DONE_WINDOW_MS: i64 = 1000 * 60 * 60 * 24 * 30 * 4;

/// Grouping key to mark time (milliseconds since the Unix epoch).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DoneMarks {
    marks: HashMap<String, i64>,
}

impl DoneMarks {
    pub fn mark_done(&mut self, key: &str) {
        self.mark_done_at(key, Utc::now().timestamp_millis());
    }

    /// Records (or refreshes) a mark for `key` at `now_ms`.
    pub fn mark_done_at(&mut self, key: &str, now_ms: i64) {
        self.marks.insert(key.to_string(), now_ms);
    }

    #[must_use]
    pub fn is_done(&self, key: &str) -> bool {
        self.is_done_at(key, Utc::now().timestamp_millis())
    }

    /// True iff `key` was marked less than [`DONE_WINDOW_MS`] before `now_ms`.
    #[must_use]
    pub fn is_done_at(&self, key: &str, now_ms: i64) -> bool {
        self.marks
            .get(key)
            .is_some_and(|&marked| now_ms.saturating_sub(marked) < DONE_WINDOW_MS)
    }

    #[must_use]
    pub fn marked_at(&self, key: &str) -> Option<i64> {
        self.marks.get(key).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.marks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }

    pub fn clear(&mut self) {
        self.marks.clear();
    }
}
