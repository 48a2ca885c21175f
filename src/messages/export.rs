// Reader for exported message tables (one CSV per channel export)
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{Result, WhosaidError};

/// One row of an export table, before any cleaning
///
/// Columns are addressed by header name; any extra columns the exporter
/// writes (author ids, attachments, ...) are ignored.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RawRow {
    #[serde(rename = "Author")]
    pub author: Option<String>,
    #[serde(rename = "Date")]
    pub date: Option<String>,
    #[serde(rename = "Content")]
    pub content: Option<String>,
    #[serde(rename = "Reactions")]
    pub reactions: Option<String>,
}

impl RawRow {
    pub fn new(author: &str, date: &str, content: &str) -> Self {
        Self {
            author: Some(author.to_string()),
            date: Some(date.to_string()),
            content: Some(content.to_string()),
            reactions: None,
        }
    }
}

/// Read every `*.csv` export directly inside `data_path`
///
/// Files are read in file-name order so the concatenated row order, and with
/// it the tie order of equal timestamps, is reproducible.
pub fn load_exports(data_path: &Path) -> Result<Vec<RawRow>> {
    let files = export_files(data_path)?;
    if files.is_empty() {
        return Err(WhosaidError::MissingInput {
            path: data_path.to_path_buf(),
        });
    }

    let mut rows = Vec::new();
    for file in &files {
        let before = rows.len();
        read_export(file, &mut rows)?;
        tracing::debug!("Read {} rows from {}", rows.len() - before, file.display());
    }

    tracing::info!("Read {} rows from {} export files", rows.len(), files.len());
    Ok(rows)
}

fn export_files(data_path: &Path) -> Result<Vec<PathBuf>> {
    if !data_path.is_dir() {
        return Err(WhosaidError::MissingInput {
            path: data_path.to_path_buf(),
        });
    }

    let entries = std::fs::read_dir(data_path).map_err(|e| WhosaidError::Io {
        source: e,
        context: format!("Failed to read data directory: {}", data_path.display()),
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| WhosaidError::Io {
            source: e,
            context: "Failed to read directory entry".to_string(),
        })?;
        let path = entry.path();
        let is_csv = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("csv"))
            .unwrap_or(false);
        if path.is_file() && is_csv {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

fn read_export(path: &Path, rows: &mut Vec<RawRow>) -> Result<()> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| WhosaidError::Csv {
            source: e,
            context: format!("Failed to open export: {}", path.display()),
        })?;

    for record in reader.deserialize::<RawRow>() {
        let row = record.map_err(|e| WhosaidError::Csv {
            source: e,
            context: format!("Malformed row in {}", path.display()),
        })?;
        rows.push(row);
    }

    Ok(())
}

/// Parse an export timestamp into UTC
///
/// Offset-carrying forms are converted; naive forms are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%z"] {
        if let Ok(dt) = DateTime::parse_from_str(raw, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    for format in [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%d-%b-%y %I:%M %p",
        "%d-%b-%Y %I:%M %p",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    None
}
