//! Configuration management for whosaid
//!
//! Loads the TOML configuration, applies profile and environment overrides,
//! and validates the result before any preprocessing or game command runs.

use crate::error::{Result, WhosaidError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

mod validator;

pub use validator::ConfigValidator;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    pub game: GameConfig,
    pub selection: SelectionConfig,
    pub filters: FiltersConfig,
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub profiles: HashMap<String, ProfileOverrides>,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
    #[serde(default = "current_timestamp")]
    pub last_modified: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Input/output locations and the eligible authors
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    pub server_name: String,
    /// Directory holding the exported message tables (*.csv)
    pub data_path: PathBuf,
    /// Directory for history, quiz table and embedding caches
    pub processed_path: PathBuf,
    /// Directory for the game session database
    pub game_save_path: PathBuf,
    pub users_to_include: Vec<String>,
}

/// Quiz selection tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionConfig {
    /// Minimum L2 distance from the mean embedding for a message to be quizzed
    pub distance_threshold: f32,
    /// Neighbour pool size used for candidate voting
    pub k_similar: usize,
    /// Number of author candidates per question
    pub candidates: usize,
}

/// Strict content filters for the quiz candidate pool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FiltersConfig {
    pub min_tokens: usize,
    pub max_tokens: usize,
    pub link_pattern: String,
    pub mention_marker: String,
    pub system_messages: Vec<String>,
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub model: String,
    pub batch_size: usize,
    pub max_concurrent: usize,
}

/// Profile-specific configuration overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_threshold: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub k_similar: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidates: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        Self::read(path)?.resolve(None, std::env::vars())
    }

    /// Load configuration with a specific profile applied
    pub fn load_with_profile(path: &Path, profile: &str) -> Result<Self> {
        Self::read(path)?.resolve(Some(profile), std::env::vars())
    }

    /// Built-in defaults with profile and environment overrides, validated
    /// the same way as a file-backed configuration
    pub fn load_defaults(profile: Option<&str>) -> Result<Self> {
        Self::default().resolve(profile, std::env::vars())
    }

    fn resolve<I>(mut self, profile: Option<&str>, vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        if let Some(profile) = profile {
            self.apply_profile(profile)?;
        }
        self.apply_overrides(vars);
        ConfigValidator::validate(&self)?;
        Ok(self)
    }

    fn read(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(WhosaidError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| WhosaidError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        crate::storage::write_atomic(path, content.as_bytes())
    }

    /// Apply a profile's overrides to the configuration
    pub fn apply_profile(&mut self, profile: &str) -> Result<()> {
        let overrides = self
            .profiles
            .get(profile)
            .cloned()
            .ok_or_else(|| WhosaidError::Config(format!("Unknown profile: {}", profile)))?;

        if let Some(threshold) = overrides.distance_threshold {
            self.selection.distance_threshold = threshold;
        }
        if let Some(k) = overrides.k_similar {
            self.selection.k_similar = k;
        }
        if let Some(candidates) = overrides.candidates {
            self.selection.candidates = candidates;
        }
        if let Some(model) = overrides.embedding_model {
            self.embedding.model = model;
        }
        tracing::debug!("Applied profile '{}'", profile);
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: WHOSAID_SECTION__KEY=value
    fn apply_overrides<I>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            if let Some(config_key) = key.strip_prefix("WHOSAID_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "GAME__DATA_PATH" => self.game.data_path = PathBuf::from(value),
            "GAME__PROCESSED_PATH" => self.game.processed_path = PathBuf::from(value),
            "GAME__GAME_SAVE_PATH" => self.game.game_save_path = PathBuf::from(value),
            "GAME__USERS_TO_INCLUDE" => {
                self.game.users_to_include = value
                    .split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
                    .collect();
            }
            "SELECTION__DISTANCE_THRESHOLD" => {
                self.selection.distance_threshold = parse_env(path, value)?;
            }
            "SELECTION__K_SIMILAR" => self.selection.k_similar = parse_env(path, value)?,
            "SELECTION__CANDIDATES" => self.selection.candidates = parse_env(path, value)?,
            "EMBEDDING__MODEL" => self.embedding.model = value.to_string(),
            "EMBEDDING__BATCH_SIZE" => self.embedding.batch_size = parse_env(path, value)?,
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Get the default configuration file path
    ///
    /// `./whosaid.toml` wins when present so a game folder can carry its own config.
    pub fn default_path() -> Result<PathBuf> {
        let local = PathBuf::from("whosaid.toml");
        if local.exists() {
            return Ok(local);
        }

        let config_dir = dirs::config_dir().ok_or_else(|| {
            WhosaidError::Config("Cannot determine config directory".to_string())
        })?;

        Ok(config_dir.join("whosaid").join("config.toml"))
    }

    pub fn history_path(&self) -> PathBuf {
        self.game.processed_path.join("history.csv")
    }

    pub fn quiz_path(&self) -> PathBuf {
        self.game.processed_path.join("game.csv")
    }

    pub fn pool_cache_path(&self) -> PathBuf {
        self.game.processed_path.join("embeddings.cache")
    }

    pub fn shortlist_cache_path(&self) -> PathBuf {
        self.game.processed_path.join("embeddings_shortlist.cache")
    }

    pub fn state_db_path(&self) -> PathBuf {
        self.game.game_save_path.join("state.sqlite")
    }
}

fn parse_env<T: std::str::FromStr>(path: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| WhosaidError::InvalidConfigValue {
        path: path.to_string(),
        message: format!("Cannot parse '{}'", value),
    })
}

impl Default for Config {
    fn default() -> Self {
        Self {
            meta: MetaConfig {
                schema_version: "1.0.0".to_string(),
                created_at: current_timestamp(),
                last_modified: current_timestamp(),
            },
            game: GameConfig {
                server_name: "SERVER NAME".to_string(),
                data_path: PathBuf::from("data"),
                processed_path: PathBuf::from("processed"),
                game_save_path: PathBuf::from("saved"),
                users_to_include: vec!["user1".to_string(), "user2".to_string()],
            },
            selection: SelectionConfig {
                distance_threshold: 0.95,
                k_similar: 45,
                candidates: 4,
            },
            filters: FiltersConfig {
                min_tokens: 3,
                max_tokens: 10,
                link_pattern: r"(?i)https?://|\bwww\.".to_string(),
                mention_marker: "@".to_string(),
                system_messages: vec![
                    "Joined the server.".to_string(),
                    "Pinned a message.".to_string(),
                ],
            },
            embedding: EmbeddingConfig {
                model: "paraphrase-multilingual-MiniLM-L12-v2".to_string(),
                batch_size: 512,
                max_concurrent: 2,
            },
            profiles: HashMap::new(),
        }
    }
}
