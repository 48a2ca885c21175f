// Two-pass cleaning of raw export rows
//
// Light pass: complete rows from included authors, sorted by time (history)
// Strict pass: history rows fit to be quiz questions (candidate pool)

mod rules;
mod types;

pub use rules::ContentRules;
pub use types::{CleanStats, DropReason, FilterDecision};

use crate::config::Config;
use crate::error::Result;
use crate::messages::{parse_timestamp, GameCandidatePool, History, Message, RawRow};
use std::collections::HashSet;
use std::time::Instant;

/// Cleaner producing the history and the quiz candidate pool
pub struct Cleaner {
    rules: ContentRules,
    users: HashSet<String>,
}

impl Cleaner {
    /// Create a cleaner from compiled rules and the eligible authors
    pub fn new(rules: ContentRules, users: impl IntoIterator<Item = String>) -> Self {
        Self {
            rules,
            users: users.into_iter().collect(),
        }
    }

    /// Build a cleaner from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let rules = ContentRules::from_config(&config.filters)?;
        Ok(Self::new(rules, config.game.users_to_include.iter().cloned()))
    }

    /// Run both passes
    ///
    /// # Returns
    /// Tuple of (history, candidate pool, statistics)
    pub fn clean(&self, rows: Vec<RawRow>) -> (History, GameCandidatePool, CleanStats) {
        let start = Instant::now();
        let (history, mut stats) = self.clean_history(rows);
        let pool = self.build_pool(&history, &mut stats);

        tracing::info!(
            "Cleaned {} rows into {} history messages and {} quiz candidates ({}ms)",
            stats.raw_rows,
            stats.history_rows,
            stats.pool_rows,
            start.elapsed().as_millis()
        );

        (history, pool, stats)
    }

    /// Light pass: drop incomplete rows and excluded authors, sort by time
    ///
    /// Nothing else is filtered so the history keeps full context for display.
    pub fn clean_history(&self, rows: Vec<RawRow>) -> (History, CleanStats) {
        let mut stats = CleanStats {
            raw_rows: rows.len(),
            ..Default::default()
        };

        let mut history: History = Vec::with_capacity(rows.len());
        for row in rows {
            let (Some(author), Some(date), Some(content)) = (
                non_empty(row.author),
                non_empty(row.date),
                non_empty(row.content),
            ) else {
                stats.dropped_incomplete += 1;
                continue;
            };

            if !self.users.contains(&author) {
                stats.dropped_excluded_author += 1;
                continue;
            }

            let Some(timestamp) = parse_timestamp(&date) else {
                tracing::warn!("Dropping message with unparseable date '{}'", date);
                stats.dropped_bad_date += 1;
                continue;
            };

            history.push(Message {
                author,
                timestamp,
                content,
                reactions: row.reactions.unwrap_or_default(),
            });
        }

        // Stable: equal timestamps keep export order
        history.sort_by_key(|message| message.timestamp);
        stats.history_rows = history.len();

        (history, stats)
    }

    /// Strict pass: keep history messages that pass every content rule
    pub fn build_pool(&self, history: &History, stats: &mut CleanStats) -> GameCandidatePool {
        let pool: GameCandidatePool = history
            .iter()
            .filter(|message| match self.rules.check(&message.content) {
                FilterDecision::Keep => true,
                FilterDecision::Discard(reason) => {
                    stats.record_drop(reason);
                    false
                }
            })
            .cloned()
            .collect();

        stats.pool_rows = pool.len();
        pool
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
