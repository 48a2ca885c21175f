//! Read-only view over the preprocessed tables
//!
//! The quiz book is what a game front end needs: the questions with their
//! answer options, and the surrounding conversation for the reveal.

use crate::config::Config;
use crate::error::{Result, WhosaidError};
use crate::storage::{read_history, read_quiz, HistoryRow, QuizRow};
use chrono::DateTime;
use std::path::Path;

/// Messages shown before the quoted message on a reveal
pub const CONTEXT_BEFORE: usize = 3;
/// Messages shown after the quoted message on a reveal
pub const CONTEXT_AFTER: usize = 3;

/// One line of reveal context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextLine<'a> {
    pub author: &'a str,
    pub date: &'a str,
    pub content: &'a str,
    /// This is the quoted message
    pub focal: bool,
}

impl ContextLine<'_> {
    /// Date as `dd-mm-YYYY HH:MM:SS`, or the stored text if it does not parse
    pub fn display_date(&self) -> String {
        DateTime::parse_from_rfc3339(self.date)
            .map(|d| d.format("%d-%m-%Y %H:%M:%S").to_string())
            .unwrap_or_else(|_| self.date.to_string())
    }
}

pub struct QuizBook {
    history: Vec<HistoryRow>,
    questions: Vec<QuizRow>,
}

impl QuizBook {
    /// Load the tables written by `preprocess`
    pub fn load(config: &Config) -> Result<Self> {
        Self::load_from(&config.history_path(), &config.quiz_path())
    }

    pub fn load_from(history_path: &Path, quiz_path: &Path) -> Result<Self> {
        let history = read_history(history_path)?;
        let questions = read_quiz(quiz_path)?;
        tracing::debug!(
            "Loaded quiz book: {} questions, {} history messages",
            questions.len(),
            history.len()
        );
        Ok(Self::from_rows(history, questions))
    }

    pub fn from_rows(history: Vec<HistoryRow>, questions: Vec<QuizRow>) -> Self {
        Self { history, questions }
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn question(&self, index: usize) -> Option<&QuizRow> {
        self.questions.get(index)
    }

    pub fn questions(&self) -> &[QuizRow] {
        &self.questions
    }

    /// Whether `choice` is the true author of question `index`
    pub fn is_correct(&self, index: usize, choice: &str) -> Option<bool> {
        self.question(index).map(|q| q.author == choice)
    }

    /// Conversation around question `index`
    ///
    /// The quoted message is found in the history by exact content match;
    /// the window is clamped to the ends of the history.
    pub fn context(&self, index: usize) -> Result<Vec<ContextLine<'_>>> {
        let question = self
            .question(index)
            .ok_or_else(|| WhosaidError::Game(format!("No quiz question {}", index)))?;

        let position = self
            .history
            .iter()
            .position(|row| row.content == question.content)
            .ok_or_else(|| {
                WhosaidError::Game(format!(
                    "Quiz question {} does not appear in the history; rerun preprocess",
                    index
                ))
            })?;

        let start = position.saturating_sub(CONTEXT_BEFORE);
        let end = (position + CONTEXT_AFTER + 1).min(self.history.len());

        Ok(self.history[start..end]
            .iter()
            .enumerate()
            .map(|(offset, row)| ContextLine {
                author: &row.author,
                date: &row.date,
                content: &row.content,
                focal: start + offset == position,
            })
            .collect())
    }
}
