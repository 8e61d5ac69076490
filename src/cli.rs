//! # Command-Line Interface Module
//!
//! Defines the `audyssey` command line using Clap derive macros.
//!
//! ## Commands
//!
//! - `import`: Ingest one or more listening-history export files
//! - `top`: Ranked list of track groups under the active filters
//! - `show`: Detail of a single track group
//! - `merge`: Manually fold one track group into another
//! - `done`: Mark a track group as handled for four months
//! - `export`: Write the ranked list as CSV
//! - `stats`: Dataset totals and stored date span
//! - `forget`: Delete a single play from the store
//! - `reset`: Drop all stored state
//!
//! ## Examples
//!
//! ```bash
//! audyssey import Streaming_History_Audio_2023_*.json
//! audyssey top --merge-duplicates --skip-short --sort time --limit 20
//! audyssey merge spotify:track:abc spotify:track:def
//! audyssey export --from 2023-01-01 --to 2023-12-31 --output top-2023.csv
//! ```

use crate::aggregate::Filters;
use crate::view::SortMode;
use chrono::NaiveDate;
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Shell types supported for completion generation
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    /// Bash shell
    Bash,
    /// Zsh shell
    Zsh,
    /// Fish shell
    Fish,
    /// PowerShell
    PowerShell,
    /// Elvish shell
    Elvish,
}

/// Main application arguments structure.
#[derive(Parser, Debug)]
#[command(name = "audyssey")]
#[command(about = "Audyssey: deduplicated play counts from your listening-history exports")]
#[command(version)]
pub struct Args {
    /// State database location (defaults to the platform data directory)
    #[arg(long, global = true, env = "AUDYSSEY_DB", value_hint = clap::ValueHint::FilePath)]
    pub db: Option<PathBuf>,

    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Aggregation filters shared by every command that reads the view.
#[derive(ClapArgs, Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterArgs {
    /// Only count plays on or after this day (YYYY-MM-DD, UTC)
    #[arg(long, value_name = "DATE")]
    pub from: Option<NaiveDate>,

    /// Only count plays on or before this day (YYYY-MM-DD, UTC)
    #[arg(long, value_name = "DATE")]
    pub to: Option<NaiveDate>,

    /// Ignore plays shorter than 30 seconds
    #[arg(long)]
    pub skip_short: bool,

    /// Group tracks by artist and normalized title instead of track URI
    ///
    /// Folds remasters, live versions and re-releases of the same song into
    /// one entry. Generic titles such as "Intro" are never folded across
    /// albums.
    #[arg(long)]
    pub merge_duplicates: bool,
}

impl FilterArgs {
    #[must_use]
    pub fn to_filters(&self) -> Filters {
        Filters {
            skip_short_plays: self.skip_short,
            merge_duplicates: self.merge_duplicates,
            ..Filters::default()
        }
        .with_date_range(self.from, self.to)
    }
}

/// Search and ordering of the ranked list.
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct ListArgs {
    /// Case-insensitive substring of title, artist or album
    #[arg(short, long, default_value = "")]
    pub query: String,

    /// Ordering: count, time or recent
    #[arg(short, long, default_value_t = SortMode::Count)]
    pub sort: SortMode,
}

/// Enumeration of all available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Import listening-history export files
    ///
    /// Each file must hold a JSON array of play objects or a single play
    /// object. Files are processed in order; plays already stored are
    /// skipped as duplicates, and files that fail to parse are reported
    /// without stopping the batch.
    Import {
        /// Export files to import
        #[arg(required = true, value_hint = clap::ValueHint::FilePath)]
        files: Vec<PathBuf>,
    },

    /// Show the ranked list of track groups
    Top {
        #[command(flatten)]
        filters: FilterArgs,

        #[command(flatten)]
        list: ListArgs,

        /// Maximum number of rows to print
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Show statistics, timeline and plays of one track group
    Show {
        /// Group key as printed by `top`
        #[arg(value_hint = clap::ValueHint::Other)]
        key: String,

        #[command(flatten)]
        filters: FilterArgs,
    },

    /// Merge one track group into another
    ///
    /// All plays of SOURCE move to TARGET. The merge is remembered and
    /// reapplied whenever both groups exist under later filters.
    Merge {
        #[arg(value_hint = clap::ValueHint::Other)]
        source: String,

        #[arg(value_hint = clap::ValueHint::Other)]
        target: String,

        #[command(flatten)]
        filters: FilterArgs,
    },

    /// Mark a track group as handled for the next four months
    Done {
        #[arg(value_hint = clap::ValueHint::Other)]
        key: String,
    },

    /// Export the ranked list as CSV
    Export {
        #[command(flatten)]
        filters: FilterArgs,

        #[command(flatten)]
        list: ListArgs,

        /// Output file; writes to stdout when omitted
        #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
        output: Option<PathBuf>,
    },

    /// Show dataset totals and the stored date span
    Stats {
        #[command(flatten)]
        filters: FilterArgs,
    },

    /// Permanently delete one play from the store
    Forget {
        /// Dedupe key as printed by `show`
        dedupe_key: String,
    },

    /// Delete all imported plays, done marks and merges
    Reset,

    /// Generate shell completions
    ///
    /// Usage: audyssey completion bash > ~/.local/share/bash-completion/completions/audyssey
    Completion {
        /// Shell to generate completions for
        shell: Shell,
    },

    /// List track group keys for completion (hidden command)
    #[command(hide = true)]
    CompleteKeys {
        /// Print keys unquoted, for fish
        #[arg(long)]
        fish: bool,
    },
}
