//! # Audyssey
//!
//! Command-line front end over the [`audyssey`] library: imports
//! listening-history exports into a local state database and prints ranked,
//! deduplicated play statistics.
//!
//! ## Usage
//!
//! ```bash
//! # Import exports (safe to repeat, duplicates are skipped)
//! audyssey import Streaming_History_Audio_*.json
//!
//! # Top tracks of 2023, folding remasters and live versions together
//! audyssey top --from 2023-01-01 --to 2023-12-31 --merge-duplicates
//!
//! # Inspect and clean up
//! audyssey show spotify:track:4uLU6hMCjMI75M1A2tKUQC
//! audyssey merge spotify:track:old spotify:track:new
//! audyssey done spotify:track:new
//!
//! # CSV
//! audyssey export --sort time --output audyssey-top-songs.csv
//! ```

use anyhow::{Context, Result};
use audyssey::cli::{self, Command, FilterArgs};
use audyssey::completion;
use audyssey::config::RuntimeConfig;
use audyssey::export;
use audyssey::import;
use audyssey::persist::SqliteKv;
use audyssey::session::Session;
use audyssey::summary::format_listen_time;
use chrono::{DateTime, Utc};
use clap::{CommandFactory, Parser};
use log::{debug, info};
use std::io;

type CliSession = Session<SqliteKv>;

fn open_session(config: &RuntimeConfig) -> Result<CliSession> {
    debug!("Using state database {}", config.db_path.display());
    let kv = SqliteKv::open(&config.db_path)?;
    Ok(Session::open(kv))
}

fn open_filtered(config: &RuntimeConfig, filters: &FilterArgs) -> Result<CliSession> {
    let mut session = open_session(config)?;
    session.set_filters(filters.to_filters());
    Ok(session)
}

fn day(ts: Option<DateTime<Utc>>) -> String {
    ts.map_or_else(|| "-".to_string(), |ts| ts.format("%Y-%m-%d").to_string())
}

fn print_top(session: &CliSession, list: &cli::ListArgs, limit: Option<usize>) {
    let rows = session.top_list(&list.query, list.sort);
    if rows.is_empty() {
        println!("No plays match the current filters.");
        return;
    }

    let shown = limit.unwrap_or(rows.len());
    println!(
        "{:>4}  {:>6}  {:>10}  {:<10}  {:<10}  {:<4}  {}",
        "#", "plays", "time", "first", "last", "done", "track"
    );
    for (rank, row) in rows.iter().take(shown).enumerate() {
        let record = row.representative;
        println!(
            "{:>4}  {:>6}  {:>10}  {:<10}  {:<10}  {:<4}  {} - {}",
            rank + 1,
            row.stats.count,
            format_listen_time(row.stats.total_duration_ms),
            day(row.stats.first),
            day(row.stats.last),
            if session.is_done(row.key) { "yes" } else { "" },
            record.artist(),
            record.title(),
        );
        println!("{:>54}[{}]", "", row.key);
    }
    if shown < rows.len() {
        println!("... {} more", rows.len() - shown);
    }
}

fn print_detail(session: &CliSession, key: &str) -> Result<()> {
    let detail = session
        .detail(key)
        .with_context(|| format!("No track group with key {key} under the current filters"))?;
    let record = detail.representative;

    println!("{}", record.title());
    println!("  Artist:   {}", record.artist());
    println!("  Album:    {}", record.album());
    println!("  Key:      {}", detail.key);
    println!("  Plays:    {}", detail.stats.count);
    println!("  Time:     {}", format_listen_time(detail.stats.total_duration_ms));
    println!("  First:    {}", day(detail.stats.first));
    println!("  Last:     {}", day(detail.stats.last));
    println!("  Platform: {}", detail.top_platform.as_deref().unwrap_or("-"));
    println!("  Country:  {}", detail.top_country.as_deref().unwrap_or("-"));
    if session.is_done(detail.key) {
        println!("  Marked done");
    }

    if !detail.timeline.is_empty() {
        println!();
        println!("Timeline:");
        for (month, count) in &detail.timeline {
            println!("  {month}  {count:>4}  {}", "#".repeat((*count).min(60)));
        }
    }

    println!();
    println!("Plays (newest first):");
    for play in &detail.plays {
        println!(
            "  {:<24}  {:>8}  {:<10}  {}",
            play.ts.as_deref().unwrap_or("-"),
            format_listen_time(play.ms_played),
            play.platform().unwrap_or("-"),
            play.dedupe_key
        );
    }
    Ok(())
}

/// Main entry point for the Audyssey CLI.
///
/// Logging is controlled via `RUST_LOG`, e.g. `RUST_LOG=debug audyssey top`.
fn main() -> Result<()> {
    env_logger::init();

    let args = cli::Args::parse();

    match args.command {
        Command::Completion { shell } => {
            let mut cmd = cli::Args::command();
            completion::generate_completions(completion::shell_to_completion_shell(&shell), &mut cmd);
            return Ok(());
        }
        Command::CompleteKeys { fish } => {
            // Completion must stay silent when there is no usable database.
            let Ok(config) = RuntimeConfig::resolve(args.db.as_deref()) else {
                return Ok(());
            };
            if !config.db_path.exists() {
                return Ok(());
            }
            if let Ok(session) = open_session(&config) {
                completion::write_group_key_completions(&mut io::stdout().lock(), session.view(), fish)?;
            }
            return Ok(());
        }
        _ => {}
    }

    let config = RuntimeConfig::resolve(args.db.as_deref())?;

    match args.command {
        Command::Import { files } => {
            let mut session = open_session(&config)?;
            info!("Importing {} files", files.len());
            let summary = import::import_files(&mut session, &files, |progress| {
                if progress.index < progress.total {
                    eprintln!(
                        "[{:>3.0}%] Reading {} ({}/{})",
                        progress.percent,
                        progress.name,
                        progress.index + 1,
                        progress.total
                    );
                }
            })?;

            for file in &summary.files {
                match &file.outcome {
                    Ok(report) => println!("{}: {} added, {} duplicates", file.name, report.added, report.ignored),
                    Err(e) => println!("{}: failed: {e}", file.name),
                }
            }
            println!(
                "Finished. Added {} plays ({} skipped as duplicates).",
                summary.totals.added, summary.totals.ignored
            );
        }
        Command::Top { filters, list, limit } => {
            let session = open_filtered(&config, &filters)?;
            print_top(&session, &list, limit);
        }
        Command::Show { key, filters } => {
            let mut session = open_filtered(&config, &filters)?;
            session.select(&key)?;
            print_detail(&session, &key)?;
        }
        Command::Merge { source, target, filters } => {
            let mut session = open_filtered(&config, &filters)?;
            session.merge(&source, &target)?;
            println!("Merged {source} into {target}");
            if let Some(selected) = session.selected() {
                print_detail(&session, selected)?;
            }
        }
        Command::Done { key } => {
            let mut session = open_session(&config)?;
            session.mark_done(&key)?;
            println!("Marked {key} as done for the next four months");
        }
        Command::Export { filters, list, output } => {
            let session = open_filtered(&config, &filters)?;
            let rows = session.top_list(&list.query, list.sort);
            match output {
                Some(path) => {
                    export::write_csv_file(&path, &rows)?;
                    println!("Exported {} tracks to {}", rows.len(), path.display());
                }
                None => export::write_csv(io::stdout().lock(), &rows)?,
            }
        }
        Command::Stats { filters } => {
            let session = open_filtered(&config, &filters)?;
            let totals = session.totals();
            println!("Tracks:         {}", totals.tracks);
            println!("Plays in view:  {}", totals.plays);
            println!("Hours played:   {:.2}", totals.hours_played());
            println!("Platforms:      {}", totals.platforms);
            println!("Stored plays:   {}", session.store().len());
            if let Some((first, last)) = session.store().date_span() {
                println!("Date span:      {first} to {last}");
            }
            println!("Done marks:     {}", session.done_marks().len());
            println!("Manual merges:  {}", session.manual_merges().len());
        }
        Command::Forget { dedupe_key } => {
            let mut session = open_session(&config)?;
            let removed = session.forget_play(&dedupe_key)?;
            println!(
                "Deleted play of {} - {} at {}",
                removed.artist(),
                removed.title(),
                removed.ts.as_deref().unwrap_or("-")
            );
        }
        Command::Reset => {
            let mut session = open_session(&config)?;
            session.reset()?;
            println!("All stored plays, done marks and merges deleted.");
        }
        Command::Completion { .. } | Command::CompleteKeys { .. } => {}
    }

    Ok(())
}
