//! # Persistence
//!
//! State is written to a plain key-value store as whole JSON documents, one
//! per entry, overwritten in full after every mutation. There is exactly one
//! writer, so no locking or transactions are involved.
//!
//! Loading never fails: a missing entry is empty state, and an entry that
//! does not parse is logged and treated as empty state too.

use crate::aggregate::ManualMerge;
use crate::done::DoneMarks;
use crate::record::PlayRecord;
use crate::store::RecordStore;
use anyhow::{Context, Result};
use log::{debug, warn};
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;

pub const PLAYS_KEY: &str = "audyssey-plays";
pub const DONE_KEY: &str = "audyssey-done";
pub const MERGES_KEY: &str = "audyssey-merges";

/// Minimal string key-value storage.
pub trait KeyValueStore {
    /// Returns `None` when the key has never been written.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Replaces the whole value stored under `key`.
    fn set(&mut self, key: &str, value: &str) -> Result<()>;

    /// Removes every entry.
    fn clear(&mut self) -> Result<()>;
}

/// In-memory backend, for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct MemoryKv {
    entries: HashMap<String, String>,
}

impl KeyValueStore for MemoryKv {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        Ok(())
    }
}

/// SQLite-backed store: one `kv` table, one row per key.
#[derive(Debug)]
pub struct SqliteKv {
    conn: Connection,
}

impl SqliteKv {
    /// Opens (creating if needed) the database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open state database at {}", path.display()))?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )
        .context("Failed to create kv table")?;
        Ok(Self { conn })
    }
}

impl KeyValueStore for SqliteKv {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| row.get(0))
            .optional()
            .with_context(|| format!("Failed to read {key}"))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
                params![key, value],
            )
            .with_context(|| format!("Failed to write {key}"))?;
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.conn
            .execute("DELETE FROM kv", [])
            .context("Failed to clear state database")?;
        Ok(())
    }
}

fn load_json<T, S>(kv: &S, key: &str) -> T
where
    T: DeserializeOwned + Default,
    S: KeyValueStore + ?Sized,
{
    let raw = match kv.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return T::default(),
        Err(e) => {
            warn!("Could not read {key}, starting empty: {e:#}");
            return T::default();
        }
    };
    serde_json::from_str(&raw).unwrap_or_else(|e| {
        warn!("Stored {key} is corrupted, starting empty: {e}");
        T::default()
    })
}

fn save_json<T, S>(kv: &mut S, key: &str, value: &T) -> Result<()>
where
    T: Serialize + ?Sized,
    S: KeyValueStore + ?Sized,
{
    let json = serde_json::to_string(value).with_context(|| format!("Failed to serialize {key}"))?;
    kv.set(key, &json)?;
    debug!("Persisted {key} ({} bytes)", json.len());
    Ok(())
}

pub fn load_records<S: KeyValueStore + ?Sized>(kv: &S) -> RecordStore {
    RecordStore::from_records(load_json::<Vec<PlayRecord>, _>(kv, PLAYS_KEY))
}

pub fn save_records<S: KeyValueStore + ?Sized>(kv: &mut S, store: &RecordStore) -> Result<()> {
    save_json(kv, PLAYS_KEY, store.records())
}

pub fn load_done_marks<S: KeyValueStore + ?Sized>(kv: &S) -> DoneMarks {
    load_json(kv, DONE_KEY)
}

pub fn save_done_marks<S: KeyValueStore + ?Sized>(kv: &mut S, marks: &DoneMarks) -> Result<()> {
    save_json(kv, DONE_KEY, marks)
}

pub fn load_merges<S: KeyValueStore + ?Sized>(kv: &S) -> Vec<ManualMerge> {
    load_json(kv, MERGES_KEY)
}

pub fn save_merges<S: KeyValueStore + ?Sized>(kv: &mut S, merges: &[ManualMerge]) -> Result<()> {
    save_json(kv, MERGES_KEY, merges)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_store() -> RecordStore {
        let mut store = RecordStore::new();
        store.ingest(vec![PlayRecord {
            ts: Some("2023-01-01T00:00:00Z".to_string()),
            ms_played: 40_000,
            track_uri: Some("uri1".to_string()),
            ..Default::default()
        }]);
        store
    }

    #[test]
    fn test_records_round_trip_with_dedupe_key() -> Result<()> {
        let mut kv = MemoryKv::default();
        save_records(&mut kv, &sample_store())?;

        let raw = kv.get(PLAYS_KEY)?.unwrap_or_default();
        assert!(raw.contains("\"_dedupeKey\":\"2023-01-01T00:00:00Z-uri1\""));

        let loaded = load_records(&kv);
        assert_eq!(loaded.records(), sample_store().records());
        Ok(())
    }

    #[test]
    fn test_missing_state_is_empty() {
        let kv = MemoryKv::default();
        assert!(load_records(&kv).is_empty());
        assert!(load_done_marks(&kv).is_empty());
        assert!(load_merges(&kv).is_empty());
    }

    #[test]
    fn test_corrupted_state_falls_back_to_empty() -> Result<()> {
        let mut kv = MemoryKv::default();
        kv.set(PLAYS_KEY, "{not json")?;
        kv.set(DONE_KEY, "[1, 2, 3]")?;
        kv.set(MERGES_KEY, "null")?;

        assert!(load_records(&kv).is_empty());
        assert!(load_done_marks(&kv).is_empty());
        assert!(load_merges(&kv).is_empty());
        Ok(())
    }

    #[test]
    fn test_sqlite_backend() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("state.db");

        {
            let mut kv = SqliteKv::open(&path)?;
            assert_eq!(kv.get("missing")?, None);
            kv.set("a", "1")?;
            kv.set("a", "2")?;
            kv.set("b", "3")?;
        }

        let mut kv = SqliteKv::open(&path)?;
        assert_eq!(kv.get("a")?.as_deref(), Some("2"));
        kv.clear()?;
        assert_eq!(kv.get("b")?, None);
        Ok(())
    }

    #[test]
    fn test_done_and_merges_round_trip() -> Result<()> {
        let mut kv = SqliteKv::open_in_memory()?;
        let mut marks = DoneMarks::default();
        marks.mark_done_at("uri1", 1_000);
        let merges = vec![ManualMerge {
            source: "a".to_string(),
            target: "b".to_string(),
        }];

        save_done_marks(&mut kv, &marks)?;
        save_merges(&mut kv, &merges)?;

        assert_eq!(load_done_marks(&kv), marks);
        assert_eq!(load_merges(&kv), merges);
        Ok(())
    }
}
