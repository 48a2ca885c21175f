//! Author candidate selection
//!
//! For every quiz message the authors of its nearest neighbours vote for
//! who could plausibly have written it. Votes are scaled by inverse author
//! frequency so chatty authors do not win every question, and the true
//! author is always forced into the final list.

mod weights;

pub use weights::AuthorWeights;

use crate::messages::Message;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CandidateError {
    #[error(
        "Not enough likely authors found for {required} candidates per message \
         ({} message(s) affected, first at quiz position {}). \
         Try reducing 'candidates' or increasing 'k_similar' (currently {k_similar}).",
        .affected.len(),
        .affected.first().copied().unwrap_or_default()
    )]
    InsufficientCandidates {
        /// Quiz positions whose neighbour pool had too few distinct authors
        affected: Vec<usize>,
        required: usize,
        k_similar: usize,
    },

    #[error("Neighbour lists cover {neighbors} messages but {unique} were selected")]
    MisalignedNeighbors { neighbors: usize, unique: usize },

    #[error("Index {index} is outside a collection of {len} messages")]
    IndexOutOfRange { index: usize, len: usize },
}

/// Exactly K distinct author names, one of them the true author
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateList(Vec<String>);

impl CandidateList {
    pub fn names(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, author: &str) -> bool {
        self.0.iter().any(|name| name == author)
    }

    /// Space-joined form stored in the quiz table
    pub fn joined(&self) -> String {
        self.0.join(" ")
    }
}

/// Candidate lists for every quiz message
#[derive(Debug, Clone)]
pub struct CandidateSet {
    /// One list per quiz message, aligned with the unique index order
    pub lists: Vec<CandidateList>,
    /// How often the true author had to be forced into the last slot
    pub substitutions: usize,
}

/// Build K-name candidate lists for the quiz messages `unique`
///
/// `neighbors[j]` holds positions into `unique`, not pool indices.
pub fn build_candidates(
    pool: &[Message],
    unique: &[usize],
    neighbors: &[Vec<usize>],
    weights: &AuthorWeights,
    candidates: usize,
    k_similar: usize,
) -> Result<CandidateSet, CandidateError> {
    CandidateBuilder::new(weights, candidates, k_similar).build(pool, unique, neighbors)
}

/// Builder turning neighbour lists into candidate lists
pub struct CandidateBuilder<'a> {
    weights: &'a AuthorWeights,
    candidates: usize,
    k_similar: usize,
}

impl<'a> CandidateBuilder<'a> {
    /// # Arguments
    /// * `weights` - Inverse-frequency author weights over the candidate pool
    /// * `candidates` - K, the list size
    /// * `k_similar` - Neighbour pool size (reported in configuration errors)
    pub fn new(weights: &'a AuthorWeights, candidates: usize, k_similar: usize) -> Self {
        Self {
            weights,
            candidates,
            k_similar,
        }
    }

    /// Build candidate lists for all quiz messages
    ///
    /// # Arguments
    /// * `pool` - The quiz candidate pool
    /// * `unique` - Pool indices of the quiz messages
    /// * `neighbors` - For each quiz message, positions into `unique` of its
    ///   nearest neighbours (itself included)
    pub fn build(
        &self,
        pool: &[Message],
        unique: &[usize],
        neighbors: &[Vec<usize>],
    ) -> Result<CandidateSet, CandidateError> {
        if neighbors.len() != unique.len() {
            return Err(CandidateError::MisalignedNeighbors {
                neighbors: neighbors.len(),
                unique: unique.len(),
            });
        }

        let author_at = |position: usize| -> Result<&str, CandidateError> {
            let index = *unique.get(position).ok_or(CandidateError::IndexOutOfRange {
                index: position,
                len: unique.len(),
            })?;
            pool.get(index)
                .map(|message| message.author.as_str())
                .ok_or(CandidateError::IndexOutOfRange {
                    index,
                    len: pool.len(),
                })
        };

        let mut lists = Vec::with_capacity(unique.len());
        let mut affected = Vec::new();
        let mut substitutions = 0;

        for (position, neighbor_positions) in neighbors.iter().enumerate() {
            let true_author = author_at(position)?;
            let neighbor_authors = neighbor_positions
                .iter()
                .map(|&p| author_at(p))
                .collect::<Result<Vec<_>, _>>()?;

            let (names, substituted) = self.rank(true_author, &neighbor_authors);
            if substituted {
                substitutions += 1;
            }

            if names.len() < self.candidates {
                tracing::debug!(
                    "Quiz position {} has only {} distinct candidate authors",
                    position,
                    names.len()
                );
                affected.push(position);
            }
            lists.push(CandidateList(names));
        }

        if !affected.is_empty() {
            return Err(CandidateError::InsufficientCandidates {
                affected,
                required: self.candidates,
                k_similar: self.k_similar,
            });
        }

        tracing::info!(
            "Original author outside the top {} for {}/{} messages; substituted in",
            self.candidates,
            substitutions,
            lists.len()
        );

        Ok(CandidateSet {
            lists,
            substitutions,
        })
    }

    /// Rank neighbour authors for one message
    ///
    /// # Returns
    /// The (possibly short) top-K names and whether the true author was
    /// substituted into the last slot
    pub fn rank(&self, true_author: &str, neighbor_authors: &[&str]) -> (Vec<String>, bool) {
        // Tally in first-encounter order so ties resolve the same way every run
        let mut tally: Vec<(&str, u64)> = Vec::new();
        for &author in neighbor_authors {
            match tally.iter_mut().find(|(name, _)| *name == author) {
                Some((_, count)) => *count += 1,
                None => tally.push((author, 1)),
            }
        }

        let mut scored: Vec<(&str, u64)> = tally
            .into_iter()
            .map(|(author, count)| (author, self.weights.reweigh(author, count)))
            .collect();
        // Stable sort keeps first-encounter order among equal scores
        scored.sort_by(|a, b| b.1.cmp(&a.1));

        let mut names: Vec<String> = scored
            .into_iter()
            .take(self.candidates)
            .map(|(author, _)| author.to_string())
            .collect();

        let mut substituted = false;
        if !names.iter().any(|name| name == true_author) {
            substituted = true;
            match names.last_mut() {
                Some(last) => *last = true_author.to_string(),
                None => names.push(true_author.to_string()),
            }
        }

        (names, substituted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn message(author: &str, n: i64) -> Message {
        Message {
            author: author.to_string(),
            timestamp: Utc.timestamp_opt(1_600_000_000 + n, 0).unwrap(),
            content: format!("message number {} here", n),
            reactions: String::new(),
        }
    }

    fn pool_with_counts(counts: &[(&str, usize)]) -> Vec<Message> {
        let mut pool = Vec::new();
        for (author, count) in counts {
            for _ in 0..*count {
                let n = pool.len() as i64;
                pool.push(message(author, n));
            }
        }
        pool
    }

    #[test]
    fn test_reweighting_prefers_rare_authors() {
        // Counts {A:100, B:10, C:1}, neighbour tally {A:5, B:2, C:1}
        let pool = pool_with_counts(&[("A", 100), ("B", 10), ("C", 1)]);
        let weights = AuthorWeights::from_pool(&pool);
        let builder = CandidateBuilder::new(&weights, 3, 8);

        let neighbors = ["A", "A", "B", "A", "C", "A", "B", "A"];
        let (names, substituted) = builder.rank("A", &neighbors);

        assert_eq!(names, vec!["C", "B", "A"]);
        assert!(!substituted);
    }

    #[test]
    fn test_true_author_forced_into_last_slot() {
        let pool = pool_with_counts(&[("A", 10), ("B", 10), ("C", 10), ("D", 10), ("E", 10)]);
        let weights = AuthorWeights::from_pool(&pool);
        let builder = CandidateBuilder::new(&weights, 4, 12);

        let neighbors = ["A", "A", "A", "B", "B", "B", "C", "C", "D", "D", "E"];
        let (names, substituted) = builder.rank("E", &neighbors);

        assert_eq!(names, vec!["A", "B", "C", "E"]);
        assert!(substituted);
    }

    #[test]
    fn test_ties_keep_first_encounter_order() {
        let pool = pool_with_counts(&[("A", 4), ("B", 4), ("C", 4)]);
        let weights = AuthorWeights::from_pool(&pool);
        let builder = CandidateBuilder::new(&weights, 3, 3);

        let (names, _) = builder.rank("B", &["B", "C", "A"]);
        assert_eq!(names, vec!["B", "C", "A"]);
    }

    #[test]
    fn test_build_counts_substitutions() {
        // Quiz messages: 0..4 are A,B,C,D,E at pool indices 0,10,20,30,40
        let pool = pool_with_counts(&[("A", 10), ("B", 10), ("C", 10), ("D", 10), ("E", 10)]);
        let weights = AuthorWeights::from_pool(&pool);
        let unique = vec![0, 10, 20, 30, 40];
        let neighbors = vec![
            vec![0, 1, 2, 3],
            vec![1, 0, 2, 3],
            vec![2, 0, 1, 3],
            vec![3, 0, 1, 2],
            // E appears only as itself and drops out of the top four
            vec![4, 0, 1, 2, 3, 0, 1, 2, 3],
        ];

        let builder = CandidateBuilder::new(&weights, 4, 8);
        let set = builder.build(&pool, &unique, &neighbors).unwrap();

        assert_eq!(set.lists.len(), 5);
        assert_eq!(set.substitutions, 1);
        for (position, list) in set.lists.iter().enumerate() {
            assert_eq!(list.len(), 4);
            assert!(list.contains(&pool[unique[position]].author));
        }
        assert_eq!(set.lists[4].names(), ["A", "B", "C", "E"]);
        assert_eq!(set.lists[0].joined(), "A B C D");
    }

    #[test]
    fn test_too_few_authors_is_configuration_error() {
        // Only three authors exist, four candidates requested
        let pool = pool_with_counts(&[("A", 2), ("B", 2), ("C", 2)]);
        let weights = AuthorWeights::from_pool(&pool);
        let unique = vec![0, 2, 4];
        let neighbors = vec![vec![0, 1, 2], vec![1, 0, 2], vec![2, 0, 1]];

        let builder = CandidateBuilder::new(&weights, 4, 3);
        let err = builder.build(&pool, &unique, &neighbors).unwrap_err();

        match &err {
            CandidateError::InsufficientCandidates {
                affected, required, ..
            } => {
                assert_eq!(affected, &vec![0, 1, 2]);
                assert_eq!(*required, 4);
            }
            other => panic!("unexpected error: {other}"),
        }
        let text = err.to_string();
        assert!(text.contains("k_similar"));
        assert!(text.contains("candidates"));
    }

    #[test]
    fn test_misaligned_neighbors() {
        let pool = pool_with_counts(&[("A", 2)]);
        let weights = AuthorWeights::from_pool(&pool);
        let builder = CandidateBuilder::new(&weights, 1, 1);
        assert!(matches!(
            builder.build(&pool, &[0, 1], &[vec![0]]),
            Err(CandidateError::MisalignedNeighbors { .. })
        ));
    }
}
