use crate::config::Config;
use crate::embedding::FastEmbedProvider;
use crate::error::{Result, ValidationError, WhosaidError};
use std::collections::HashSet;

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration, collecting every problem before failing
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_game(config, &mut errors);
        Self::validate_selection(config, &mut errors);
        Self::validate_filters(config, &mut errors);
        Self::validate_embedding(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(WhosaidError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != "1.0.0" {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_game(config: &Config, errors: &mut Vec<ValidationError>) {
        let game = &config.game;

        for (key, path) in [
            ("game.data_path", &game.data_path),
            ("game.processed_path", &game.processed_path),
            ("game.game_save_path", &game.game_save_path),
        ] {
            if path.as_os_str().is_empty() {
                errors.push(ValidationError::new(key, "Path cannot be empty"));
            }
        }

        if game.users_to_include.is_empty() {
            errors.push(ValidationError::new(
                "game.users_to_include",
                "At least one author must be included",
            ));
        }

        // Candidates are stored space-joined, so names must be single tokens
        let mut seen = HashSet::new();
        for name in &game.users_to_include {
            if name.is_empty() || name.chars().any(char::is_whitespace) {
                errors.push(ValidationError::new(
                    "game.users_to_include",
                    format!("Author name '{}' must be non-empty without whitespace", name),
                ));
            }
            if !seen.insert(name) {
                errors.push(ValidationError::new(
                    "game.users_to_include",
                    format!("Duplicate author name '{}'", name),
                ));
            }
        }
    }

    fn validate_selection(config: &Config, errors: &mut Vec<ValidationError>) {
        let selection = &config.selection;

        if !selection.distance_threshold.is_finite() || selection.distance_threshold < 0.0 {
            errors.push(ValidationError::new(
                "selection.distance_threshold",
                format!(
                    "Threshold must be a non-negative number, got {}",
                    selection.distance_threshold
                ),
            ));
        }

        if selection.k_similar == 0 {
            errors.push(ValidationError::new(
                "selection.k_similar",
                "k_similar must be greater than 0",
            ));
        }

        if selection.candidates == 0 {
            errors.push(ValidationError::new(
                "selection.candidates",
                "candidates must be greater than 0",
            ));
        }
    }

    fn validate_filters(config: &Config, errors: &mut Vec<ValidationError>) {
        let filters = &config.filters;

        if filters.min_tokens > filters.max_tokens {
            errors.push(ValidationError::new(
                "filters.min_tokens",
                format!(
                    "min_tokens ({}) cannot exceed max_tokens ({})",
                    filters.min_tokens, filters.max_tokens
                ),
            ));
        }

        if let Err(e) = regex::Regex::new(&filters.link_pattern) {
            errors.push(ValidationError::new(
                "filters.link_pattern",
                format!("Invalid regex: {}", e),
            ));
        }

        if filters.mention_marker.is_empty() {
            errors.push(ValidationError::new(
                "filters.mention_marker",
                "Mention marker cannot be empty",
            ));
        }
    }

    fn validate_embedding(config: &Config, errors: &mut Vec<ValidationError>) {
        let embedding = &config.embedding;

        if embedding.batch_size == 0 {
            errors.push(ValidationError::new(
                "embedding.batch_size",
                "Batch size must be greater than 0",
            ));
        }

        if embedding.max_concurrent == 0 {
            errors.push(ValidationError::new(
                "embedding.max_concurrent",
                "max_concurrent must be greater than 0",
            ));
        }

        if !FastEmbedProvider::supports(&embedding.model) {
            errors.push(ValidationError::new(
                "embedding.model",
                format!(
                    "Unsupported model '{}'. Supported: {}",
                    embedding.model,
                    FastEmbedProvider::SUPPORTED_MODELS.join(", ")
                ),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error_paths(config: &Config) -> Vec<String> {
        match ConfigValidator::validate(config) {
            Err(WhosaidError::ConfigValidation { errors }) => {
                errors.into_iter().map(|e| e.path).collect()
            }
            _ => Vec::new(),
        }
    }

    #[test]
    fn test_valid_config() {
        let config = Config::default();
        assert!(ConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_author_with_whitespace() {
        let mut config = Config::default();
        config.game.users_to_include = vec!["two words".to_string()];
        assert_eq!(error_paths(&config), vec!["game.users_to_include"]);
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = Config::default();
        config.selection.candidates = 0;
        config.filters.min_tokens = 20;
        config.embedding.model = "LaBSE".to_string();

        let paths = error_paths(&config);
        assert!(paths.contains(&"selection.candidates".to_string()));
        assert!(paths.contains(&"filters.min_tokens".to_string()));
        assert!(paths.contains(&"embedding.model".to_string()));
    }

    #[test]
    fn test_invalid_link_pattern() {
        let mut config = Config::default();
        config.filters.link_pattern = "(unclosed".to_string();
        assert_eq!(error_paths(&config), vec!["filters.link_pattern"]);
    }
}
