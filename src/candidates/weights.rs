use crate::messages::Message;
use ahash::AHashMap;

/// Inverse-frequency author weights: `weight = 100 / count`
///
/// Counts are taken over the whole quiz candidate pool, not just the
/// selected messages.
#[derive(Debug, Clone, Default)]
pub struct AuthorWeights {
    counts: AHashMap<String, u64>,
}

impl AuthorWeights {
    pub fn from_pool(pool: &[Message]) -> Self {
        let mut counts = AHashMap::new();
        for message in pool {
            *counts.entry(message.author.clone()).or_insert(0) += 1;
        }
        Self { counts }
    }

    /// Messages by `author` in the pool
    pub fn count(&self, author: &str) -> u64 {
        self.counts.get(author).copied().unwrap_or(0)
    }

    /// `ceil(tally * weight)` in exact integer arithmetic
    pub fn reweigh(&self, author: &str, tally: u64) -> u64 {
        match self.count(author) {
            0 => 0,
            count => (100 * tally).div_ceil(count),
        }
    }

    pub fn authors(&self) -> usize {
        self.counts.len()
    }
}
