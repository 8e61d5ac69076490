//! # Shell Completion Module
//!
//! Generates completion scripts through clap_complete, and lists the track
//! group keys of the stored data for dynamic completion of `show`, `merge`
//! and `done`.
//!
//! ## Usage
//!
//! ```bash
//! # Generate bash completions
//! audyssey completion bash > ~/.local/share/bash-completion/completions/audyssey
//!
//! # Generate zsh completions
//! audyssey completion zsh > ~/.config/zsh/completions/_audyssey
//! ```

use crate::aggregate::AggregationView;
use crate::cli::Shell;
use clap::Command;
use clap_complete::{generate, Generator, Shell as CompletionShell};
use std::io::{self, Write};

/// Generate shell completions for the given shell
pub fn generate_completions<G: Generator>(gen: G, cmd: &mut Command) {
    let name = cmd.get_name().to_string();
    generate(gen, cmd, name, &mut io::stdout());
}

/// Convert our Shell enum to clap_complete's Shell enum
#[must_use]
pub fn shell_to_completion_shell(shell: &Shell) -> CompletionShell {
    match shell {
        Shell::Bash => CompletionShell::Bash,
        Shell::Zsh => CompletionShell::Zsh,
        Shell::Fish => CompletionShell::Fish,
        Shell::PowerShell => CompletionShell::PowerShell,
        Shell::Elvish => CompletionShell::Elvish,
    }
}

/// Formats one completion candidate. Fish handles escaping itself; other
/// shells get keys containing whitespace wrapped in double quotes.
fn format_candidate(key: &str, fish: bool) -> String {
    if !fish && key.contains(char::is_whitespace) {
        format!("\"{}\"", key.replace('"', "\\\""))
    } else {
        key.to_string()
    }
}

/// Writes every group key of `view`, sorted, one per line.
pub fn write_group_key_completions<W: Write>(out: &mut W, view: &AggregationView, fish: bool) -> io::Result<()> {
    let mut keys: Vec<&str> = view.keys().filter(|key| !key.is_empty()).collect();
    keys.sort_unstable();
    for key in keys {
        writeln!(out, "{}", format_candidate(key, fish))?;
    }
    Ok(())
}
