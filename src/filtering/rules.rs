// Strict content rules, compiled once from the filters configuration
use regex::Regex;

use crate::config::FiltersConfig;
use crate::error::{Result, WhosaidError};
use crate::filtering::types::{DropReason, FilterDecision};

/// Pre-compiled content rules for the quiz candidate pool
#[derive(Debug, Clone)]
pub struct ContentRules {
    link: Regex,
    mention_marker: String,
    min_tokens: usize,
    max_tokens: usize,
    system_messages: Vec<String>,
}

impl ContentRules {
    /// Compile rules from configuration
    pub fn from_config(config: &FiltersConfig) -> Result<Self> {
        let link = Regex::new(&config.link_pattern).map_err(|e| {
            WhosaidError::InvalidConfigValue {
                path: "filters.link_pattern".to_string(),
                message: e.to_string(),
            }
        })?;

        Ok(Self {
            link,
            mention_marker: config.mention_marker.clone(),
            min_tokens: config.min_tokens,
            max_tokens: config.max_tokens,
            system_messages: config.system_messages.clone(),
        })
    }

    /// Decide whether a message's content is fit for the quiz
    ///
    /// Rules are checked in a fixed order so the reported reason is stable.
    pub fn check(&self, content: &str) -> FilterDecision {
        if self.link.is_match(content) {
            return FilterDecision::Discard(DropReason::Link);
        }

        if content.contains(self.mention_marker.as_str()) {
            return FilterDecision::Discard(DropReason::Mention);
        }

        let tokens = content.split_whitespace().count();
        if tokens < self.min_tokens {
            return FilterDecision::Discard(DropReason::TooShort);
        }
        if tokens > self.max_tokens {
            return FilterDecision::Discard(DropReason::TooLong);
        }

        if self
            .system_messages
            .iter()
            .any(|notice| content.contains(notice.as_str()))
        {
            return FilterDecision::Discard(DropReason::SystemMessage);
        }

        FilterDecision::Keep
    }
}
