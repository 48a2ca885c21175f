//! Chat messages and the raw export reader
//!
//! A `Message` is one cleaned row of chat history. Its identity is its
//! position in the collection that holds it, so collections are plain
//! vectors that are rebuilt (and therefore densely reindexed) by every pass.

mod export;

pub use export::{load_exports, parse_timestamp, RawRow};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// A single cleaned chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub author: String,
    pub timestamp: DateTime<Utc>,
    /// Message text, byte-for-byte as exported
    pub content: String,
    /// Reactions column, carried through untouched
    pub reactions: String,
}

impl Message {
    /// Timestamp as written to the output tables
    pub fn formatted_date(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, false)
    }
}

/// Full cleaned history, sorted ascending by timestamp
pub type History = Vec<Message>;

/// Strictly filtered messages eligible to become quiz questions
pub type GameCandidatePool = Vec<Message>;
