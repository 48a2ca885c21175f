use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::candidates::CandidateError;
use crate::embedding::EmbeddingError;

/// Main error type for whosaid
#[derive(Error, Debug)]
pub enum WhosaidError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration validation errors
    #[error("Configuration validation failed: {errors:?}")]
    ConfigValidation { errors: Vec<ValidationError> },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Invalid configuration value
    #[error("Invalid configuration value at {path}: {message}")]
    InvalidConfigValue { path: String, message: String },

    /// No message exports in the input directory
    #[error("No message exports (*.csv) found in {path}. Put exported message files there!")]
    MissingInput { path: PathBuf },

    /// A preprocessed table has not been written yet
    #[error("Table not found: {path}. Run 'whosaid preprocess' first.")]
    MissingTable { path: PathBuf },

    /// A pipeline stage was invoked before the stage it depends on
    #[error("Cannot run '{stage}' before '{requires}' has completed")]
    MissingPrerequisite {
        stage: &'static str,
        requires: &'static str,
    },

    /// A pipeline stage produced nothing usable
    #[error("{0}")]
    EmptyStage(String),

    /// Failure inside a named pipeline stage
    #[error("Stage '{stage}' failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: Box<WhosaidError>,
    },

    /// Embedding backend errors
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    /// Candidate selection errors
    #[error(transparent)]
    Candidates(#[from] CandidateError),

    /// Game session rule violations
    #[error("Game error: {0}")]
    Game(String),

    /// IO errors
    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    /// CSV errors
    #[error("CSV error: {context}: {source}")]
    Csv { source: csv::Error, context: String },

    /// TOML deserialization errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),

    /// JSON errors
    #[error("JSON error: {context}: {source}")]
    Json {
        source: serde_json::Error,
        context: String,
    },

    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Generic errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl WhosaidError {
    /// Attach the failing pipeline stage to an error
    pub fn in_stage(self, stage: Stage) -> Self {
        match self {
            already @ WhosaidError::Stage { .. } => already,
            other => WhosaidError::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }
}

/// Preprocessing stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    LoadExports,
    CreateHistory,
    EmbedPool,
    SelectUnique,
    FindNeighbors,
    BuildCandidates,
    WriteQuiz,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::LoadExports => "load exports",
            Stage::CreateHistory => "create history",
            Stage::EmbedPool => "embed pool",
            Stage::SelectUnique => "select unique",
            Stage::FindNeighbors => "find neighbors",
            Stage::BuildCandidates => "build candidates",
            Stage::WriteQuiz => "write quiz",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Path to the configuration key that failed validation
    pub path: String,
    /// Error message describing the validation failure
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type for whosaid operations
pub type Result<T> = std::result::Result<T, WhosaidError>;
