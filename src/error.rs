//! Typed failures callers are expected to branch on.
//!
//! Everything here is recoverable: an error means the operation contributed
//! nothing, never that the session is unusable.

use std::path::PathBuf;
use thiserror::Error;

/// Rejected manual merge request. The view is left unchanged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MergeError {
    #[error("cannot merge track group {0} into itself")]
    SameGroup(String),

    #[error("unknown source track group: {0}")]
    UnknownSource(String),

    #[error("unknown target track group: {0}")]
    UnknownTarget(String),
}

/// A single export file that could not be ingested.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {name}: {source}")]
    Parse {
        name: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Failure of a [`Session`](crate::session::Session) command.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Merge(#[from] MergeError),

    #[error(transparent)]
    Import(#[from] ImportError),

    #[error("no track group with key {0}")]
    UnknownGroup(String),

    #[error("no play with dedupe key {0}")]
    UnknownPlay(String),

    /// Writing state to the key-value store failed.
    #[error("failed to persist state: {0:#}")]
    Persist(#[from] anyhow::Error),
}
