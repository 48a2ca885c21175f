//! Storage layer for whosaid
//!
//! Atomic file replacement for caches and tables, the history/quiz CSV
//! tables, and the SQLite game database

pub mod database;
pub mod tables;

use crate::error::{Result, WhosaidError};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub use database::Database;
pub use tables::{read_history, read_quiz, write_history, write_quiz, HistoryRow, QuizRow};

/// Replace `path` with `data` so readers never observe a partial file
///
/// Data goes to a sibling temp file which is synced and then renamed over
/// the destination.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).map_err(|e| WhosaidError::Io {
        source: e,
        context: format!("Failed to create parent directory: {}", parent.display()),
    })?;

    let temp_path = temp_path(path);
    let mut file = fs::File::create(&temp_path).map_err(|e| WhosaidError::Io {
        source: e,
        context: format!("Failed to create temp file: {}", temp_path.display()),
    })?;

    file.write_all(data).map_err(|e| WhosaidError::Io {
        source: e,
        context: format!("Failed to write temp file: {}", temp_path.display()),
    })?;
    file.sync_all().map_err(|e| WhosaidError::Io {
        source: e,
        context: format!("Failed to sync temp file: {}", temp_path.display()),
    })?;
    drop(file);

    fs::rename(&temp_path, path).map_err(|e| WhosaidError::Io {
        source: e,
        context: format!(
            "Failed to rename temp file to final location: {} -> {}",
            temp_path.display(),
            path.display()
        ),
    })?;

    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(format!(".{}.tmp", std::process::id()));
    path.with_file_name(name)
}
