//! Deduplicated listening statistics from personal music-listening exports.
//!
//! Audyssey ingests listening-history export files (JSON arrays of play
//! events), drops plays it has already seen, groups the rest into track
//! groups and derives per-track statistics. Near-duplicate tracks such as
//! remasters and live versions can be folded together automatically, and any
//! two groups can be merged by hand.
//!
//! Core modules:
//! - [`record`] - The play event data model
//! - [`canon`] - Dedupe keys, group keys and title normalization
//! - [`store`] - Deduplicating record store
//! - [`aggregate`] - Filters, track groups and the merge operator
//! - [`summary`] - Statistics over sets of plays
//! - [`view`] - Searched and sorted top list, group detail
//! - [`done`] - Expiring "handled" marks per group
//! - [`session`] - All session state behind explicit commands
//!
//! ### Supporting Modules
//!
//! - [`import`] - Batch import of export files with progress reporting
//! - [`export`] - CSV export of the top list
//! - [`persist`] - Key-value persistence of records, done marks and merges
//! - [`config`] - Data directory and database location
//! - [`cli`] - Command-line interface definitions with clap integration
//! - [`completion`] - Shell completion generation
//! - [`error`] - Typed errors for merges, imports and session commands
//!
//! ## Quick Start Example
//!
//! ```no_run
//! use audyssey::aggregate::Filters;
//! use audyssey::persist::SqliteKv;
//! use audyssey::session::Session;
//! use audyssey::view::SortMode;
//! use audyssey::import;
//!
//! let kv = SqliteKv::open(&audyssey::config::get_db_path()?)?;
//! let mut session = Session::open(kv);
//!
//! let summary = import::import_files(&mut session, &["Streaming_History_Audio_2023.json"], |p| {
//!     println!("{:>5.1}% {}", p.percent, p.name);
//! })?;
//! println!("{} added, {} duplicates", summary.totals.added, summary.totals.ignored);
//!
//! session.set_filters(Filters {
//!     skip_short_plays: true,
//!     merge_duplicates: true,
//!     ..Filters::default()
//! });
//! for row in session.top_list("", SortMode::Count).iter().take(10) {
//!     println!("{:>5}  {} - {}", row.stats.count, row.representative.artist(), row.representative.title());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Grouping
//!
//! Without duplicate merging every track URI is its own group. With it,
//! plays group by lowercased artist and a normalized title that ignores
//! bracketed qualifiers and punctuation, so "Song (Live)" and "song" by the
//! same artist land together. Generic titles ("Intro", "Outro",
//! "Interlude") are kept apart per track.
//!
//! ## Error Handling
//!
//! Library operations that can fail in ways callers branch on return the
//! typed errors in [`error`]; persistence and file I/O use `anyhow` with
//! context. Corrupted stored state is logged and replaced by empty state
//! rather than failing.
//!
//! ## Logging
//!
//! All modules log through the `log` facade. The binary installs
//! `env_logger`, controlled via `RUST_LOG`:
//! ```bash
//! RUST_LOG=debug audyssey import history.json
//! RUST_LOG=audyssey::aggregate=trace audyssey top --merge-duplicates
//! ```

pub mod aggregate;
pub mod canon;
pub mod cli;
pub mod completion;
pub mod config;
pub mod done;
pub mod error;
pub mod export;
pub mod import;
pub mod persist;
pub mod record;
pub mod session;
pub mod store;
pub mod summary;
pub mod view;
