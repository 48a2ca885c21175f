//! History and quiz tables
//!
//! Both tables are header-addressed CSV. The quiz table is the history
//! table plus a space-joined `Candidates` column; its `Index` refers to a
//! position in the candidate pool.

use crate::error::{Result, WhosaidError};
use crate::messages::Message;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRow {
    #[serde(rename = "Index")]
    pub index: usize,
    #[serde(rename = "Author")]
    pub author: String,
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "Content")]
    pub content: String,
    #[serde(rename = "Reactions", default)]
    pub reactions: String,
}

impl HistoryRow {
    pub fn from_message(index: usize, message: &Message) -> Self {
        Self {
            index,
            author: message.author.clone(),
            date: message.formatted_date(),
            content: message.content.clone(),
            reactions: message.reactions.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizRow {
    #[serde(rename = "Index")]
    pub index: usize,
    #[serde(rename = "Author")]
    pub author: String,
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "Content")]
    pub content: String,
    #[serde(rename = "Reactions", default)]
    pub reactions: String,
    #[serde(rename = "Candidates")]
    pub candidates: String,
}

impl QuizRow {
    /// Candidate names in persisted order
    pub fn candidate_names(&self) -> Vec<&str> {
        self.candidates.split_whitespace().collect()
    }
}

pub fn write_history(path: &Path, rows: &[HistoryRow]) -> Result<()> {
    write_table(path, rows)
}

pub fn write_quiz(path: &Path, rows: &[QuizRow]) -> Result<()> {
    write_table(path, rows)
}

pub fn read_history(path: &Path) -> Result<Vec<HistoryRow>> {
    read_table(path)
}

pub fn read_quiz(path: &Path) -> Result<Vec<QuizRow>> {
    read_table(path)
}

fn write_table<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer.serialize(row).map_err(|e| WhosaidError::Csv {
            source: e,
            context: format!("Failed to encode row for {}", path.display()),
        })?;
    }

    let bytes = writer.into_inner().map_err(|e| WhosaidError::Io {
        source: std::io::Error::new(e.error().kind(), e.to_string()),
        context: format!("Failed to flush table for {}", path.display()),
    })?;

    super::write_atomic(path, &bytes)?;
    tracing::debug!("Wrote {} rows to {}", rows.len(), path.display());
    Ok(())
}

fn read_table<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Err(WhosaidError::MissingTable {
            path: path.to_path_buf(),
        });
    }

    let mut reader = csv::Reader::from_path(path).map_err(|e| WhosaidError::Csv {
        source: e,
        context: format!("Failed to open table: {}", path.display()),
    })?;

    reader
        .deserialize()
        .map(|row| {
            row.map_err(|e| WhosaidError::Csv {
                source: e,
                context: format!("Malformed row in {}", path.display()),
            })
        })
        .collect()
}
