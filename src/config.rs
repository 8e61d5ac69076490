//! # Configuration Module
//!
//! Locates the state database and carries the runtime settings the CLI
//! resolves from its flags and environment.
//!
//! ## Data Storage
//!
//! Audyssey keeps its state database in the platform-standard data directory:
//! - Linux: `~/.local/share/audyssey/`
//! - macOS: `~/Library/Application Support/audyssey/`
//! - Windows: `%APPDATA%\audyssey\`
//!
//! The location can be overridden per invocation with `--db` or the
//! `AUDYSSEY_DB` environment variable.

use anyhow::{Context, Result};
use path_absolutize::Absolutize;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const APP_DIR_NAME: &str = "audyssey";
pub const DB_FILE_NAME: &str = "audyssey.db";

/// Returns the platform-appropriate Audyssey data directory, creating it if
/// needed.
///
/// # Errors
///
/// Fails if the system data directory cannot be determined or the
/// `audyssey` subdirectory cannot be created.
pub fn get_data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir().ok_or_else(|| {
        anyhow::anyhow!(
            "Could not determine system data directory. Use --db to choose a database location."
        )
    })?;

    let app_dir = data_dir.join(APP_DIR_NAME);
    fs::create_dir_all(&app_dir).with_context(|| {
        format!(
            "Failed to create Audyssey data directory at {}. Please check file permissions.",
            app_dir.display()
        )
    })?;

    Ok(app_dir)
}

/// Returns the default state database path, `<data dir>/audyssey/audyssey.db`.
///
/// ```no_run
/// use audyssey::config::get_db_path;
///
/// let db_path = get_db_path()?;
/// println!("Database location: {}", db_path.display());
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn get_db_path() -> Result<PathBuf> {
    Ok(get_data_dir()?.join(DB_FILE_NAME))
}

/// Configuration for runtime behavior
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Path to the state database file
    pub db_path: PathBuf,
}

impl RuntimeConfig {
    /// Configuration pointing at the default database location.
    pub fn new() -> Result<Self> {
        Ok(Self {
            db_path: get_db_path()?,
        })
    }

    /// Configuration with an explicit database path. Relative paths are
    /// resolved against the working directory and missing parent
    /// directories are created.
    pub fn with_db_path(db_path: &Path) -> Result<Self> {
        let db_path = db_path
            .absolutize()
            .with_context(|| format!("Invalid database path {}", db_path.display()))?
            .into_owned();
        if let Some(parent) = db_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        Ok(Self { db_path })
    }

    /// Uses `override_path` when given, else the default location.
    pub fn resolve(override_path: Option<&Path>) -> Result<Self> {
        match override_path {
            Some(path) => Self::with_db_path(path),
            None => Self::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_db_path_structure() {
        let path = get_db_path().expect("Should get valid path");

        assert_eq!(path.file_name().unwrap(), DB_FILE_NAME);
        let parent = path.parent().expect("Should have parent directory");
        assert_eq!(parent.file_name().unwrap(), APP_DIR_NAME);
        assert!(parent.is_dir());
        assert!(path.is_absolute(), "Database path should be absolute");
    }

    #[test]
    fn test_get_db_path_consistent_results() {
        let path1 = get_db_path().expect("First call should succeed");
        let path2 = get_db_path().expect("Second call should succeed");
        assert_eq!(path1, path2);
    }

    #[test]
    fn test_explicit_db_path_creates_parent() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let wanted = temp_dir.path().join("nested").join("state.db");

        let config = RuntimeConfig::resolve(Some(&wanted))?;
        assert_eq!(config.db_path, wanted);
        assert!(wanted.parent().unwrap().is_dir());
        Ok(())
    }

    #[test]
    fn test_relative_db_path_is_absolutized() -> Result<()> {
        let config = RuntimeConfig::with_db_path(Path::new("state.db"))?;
        assert!(config.db_path.is_absolute());
        assert!(config.db_path.ends_with("state.db"));
        Ok(())
    }
}
