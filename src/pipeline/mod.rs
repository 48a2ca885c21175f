// Preprocessing pipeline: exports in, history and quiz tables out
//
// Each stage consumes the previous stage's output and refuses to run
// before it. `run` drives all of them and tags failures with the stage.

use crate::candidates::{build_candidates, AuthorWeights, CandidateSet};
use crate::config::{Config, ConfigValidator};
use crate::embedding::{
    find_neighbors, find_outliers, BatchEmbedder, CacheKey, EmbeddingCache, EmbeddingProvider,
    Embeddings,
};
use crate::error::{Result, Stage, WhosaidError};
use crate::filtering::{CleanStats, Cleaner};
use crate::messages::{load_exports, GameCandidatePool, RawRow};
use crate::storage::{write_history, write_quiz, HistoryRow, QuizRow};
use ndarray::Axis;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Summary of a preprocessing run
#[derive(Debug, Clone, Default)]
pub struct PreprocessReport {
    pub clean: CleanStats,
    pub history_rows: usize,
    pub pool_rows: usize,
    pub unique_rows: usize,
    pub quiz_rows: usize,
    /// Questions whose true author was forced into the candidate list
    pub substitutions: usize,
    /// Pool embeddings came from the on-disk cache
    pub cache_hit: bool,
    pub elapsed: Duration,
}

/// Stage-by-stage preprocessor
pub struct Preprocessor {
    config: Config,
    cleaner: Cleaner,
    embedder: BatchEmbedder,

    raw: Option<Vec<RawRow>>,
    pool: Option<GameCandidatePool>,
    embeddings: Option<Embeddings>,
    unique: Option<Vec<usize>>,
    neighbors: Option<Vec<Vec<usize>>>,
    candidates: Option<CandidateSet>,

    report: PreprocessReport,
}

impl Preprocessor {
    pub fn new(config: Config, provider: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        ConfigValidator::validate(&config)?;
        let cleaner = Cleaner::from_config(&config)?;
        let embedder = BatchEmbedder::new(
            provider,
            config.embedding.batch_size,
            config.embedding.max_concurrent,
        );

        Ok(Self {
            config,
            cleaner,
            embedder,
            raw: None,
            pool: None,
            embeddings: None,
            unique: None,
            neighbors: None,
            candidates: None,
            report: PreprocessReport::default(),
        })
    }

    /// Run every stage in order
    pub async fn run(mut self) -> Result<PreprocessReport> {
        let start = Instant::now();
        self.log_settings();

        self.load_exports()
            .map_err(|e| e.in_stage(Stage::LoadExports))?;
        self.create_history()
            .map_err(|e| e.in_stage(Stage::CreateHistory))?;
        self.embed_pool()
            .await
            .map_err(|e| e.in_stage(Stage::EmbedPool))?;
        self.select_unique()
            .map_err(|e| e.in_stage(Stage::SelectUnique))?;
        self.find_neighbors()
            .map_err(|e| e.in_stage(Stage::FindNeighbors))?;
        self.build_candidates()
            .map_err(|e| e.in_stage(Stage::BuildCandidates))?;
        self.write_quiz()
            .map_err(|e| e.in_stage(Stage::WriteQuiz))?;

        self.report.elapsed = start.elapsed();
        tracing::info!(
            "Preprocessing finished: {} quiz questions from {} messages ({}ms)",
            self.report.quiz_rows,
            self.report.history_rows,
            self.report.elapsed.as_millis()
        );

        Ok(self.report)
    }

    pub fn pool(&self) -> Option<&GameCandidatePool> {
        self.pool.as_ref()
    }

    pub fn unique(&self) -> Option<&[usize]> {
        self.unique.as_deref()
    }

    pub fn candidates(&self) -> Option<&CandidateSet> {
        self.candidates.as_ref()
    }

    fn log_settings(&self) {
        let game = &self.config.game;
        let selection = &self.config.selection;
        tracing::info!("Preprocessing chat exports for {}", game.server_name);
        tracing::info!("  Authors:         {}", game.users_to_include.join(", "));
        tracing::info!("  Exports:         {}", game.data_path.display());
        tracing::info!("  Output:          {}", game.processed_path.display());
        tracing::info!("  Distance:        > {}", selection.distance_threshold);
        tracing::info!("  Neighbours (k):  {}", selection.k_similar);
        tracing::info!("  Candidates:      {}", selection.candidates);
    }

    /// Read every export table under `data_path`
    pub fn load_exports(&mut self) -> Result<usize> {
        let rows = load_exports(&self.config.game.data_path)?;
        tracing::info!(
            "Loaded {} rows from {}",
            rows.len(),
            self.config.game.data_path.display()
        );

        let count = rows.len();
        self.raw = Some(rows);
        Ok(count)
    }

    /// Clean the exports and persist the history table
    pub fn create_history(&mut self) -> Result<()> {
        let rows = self
            .raw
            .take()
            .ok_or_else(|| missing(Stage::CreateHistory, Stage::LoadExports))?;

        let (history, pool, stats) = self.cleaner.clean(rows);
        tracing::debug!("Clean stats: {:?}", stats);

        if pool.is_empty() {
            return Err(WhosaidError::EmptyStage(format!(
                "No message survived filtering ({} history rows). \
                 Check 'users_to_include' or relax the [filters] section.",
                history.len()
            )));
        }

        let rows: Vec<HistoryRow> = history
            .iter()
            .enumerate()
            .map(|(index, message)| HistoryRow::from_message(index, message))
            .collect();
        write_history(&self.config.history_path(), &rows)?;

        self.report.clean = stats;
        self.report.history_rows = history.len();
        self.report.pool_rows = pool.len();
        self.pool = Some(pool);
        Ok(())
    }

    /// Embed the candidate pool, reusing the cache when it still matches
    pub async fn embed_pool(&mut self) -> Result<()> {
        let pool = self
            .pool
            .as_ref()
            .ok_or_else(|| missing(Stage::EmbedPool, Stage::CreateHistory))?;

        let texts: Vec<String> = pool.iter().map(|m| m.content.clone()).collect();
        let provider = self.embedder.provider();
        let key = CacheKey::for_texts(provider.model_name(), provider.dimension(), &texts);
        let cache_path = self.config.pool_cache_path();

        if let Some(cached) = EmbeddingCache::load_valid(&cache_path, &key)? {
            self.report.cache_hit = true;
            self.embeddings = Some(cached.vectors);
            return Ok(());
        }

        let vectors = self.embedder.embed_all(&texts).await?;
        EmbeddingCache::save(&cache_path, &key, &vectors, None)?;

        self.report.cache_hit = false;
        self.embeddings = Some(vectors);
        Ok(())
    }

    /// Keep the messages farthest from the mean embedding
    pub fn select_unique(&mut self) -> Result<()> {
        let (Some(pool), Some(embeddings)) = (self.pool.as_ref(), self.embeddings.as_ref())
        else {
            return Err(missing(Stage::SelectUnique, Stage::EmbedPool));
        };

        let threshold = self.config.selection.distance_threshold;
        let unique = find_outliers(embeddings, threshold);
        tracing::info!(
            "Selected {} of {} messages beyond distance {}",
            unique.len(),
            pool.len(),
            threshold
        );

        if unique.is_empty() {
            return Err(WhosaidError::EmptyStage(format!(
                "No message is farther than {} from the mean embedding. \
                 Lower 'distance_threshold'.",
                threshold
            )));
        }

        let shortlist = embeddings.select(Axis(0), &unique);
        let texts: Vec<&str> = unique.iter().map(|&i| pool[i].content.as_str()).collect();
        let provider = self.embedder.provider();
        let key = CacheKey::for_texts(provider.model_name(), provider.dimension(), &texts);
        EmbeddingCache::save(
            &self.config.shortlist_cache_path(),
            &key,
            &shortlist,
            Some(&unique),
        )?;

        self.report.unique_rows = unique.len();
        self.unique = Some(unique);
        Ok(())
    }

    /// Nearest neighbours among the selected messages
    pub fn find_neighbors(&mut self) -> Result<()> {
        let (Some(unique), Some(embeddings)) = (self.unique.as_ref(), self.embeddings.as_ref())
        else {
            return Err(missing(Stage::FindNeighbors, Stage::SelectUnique));
        };

        let shortlist = embeddings.select(Axis(0), unique);
        let neighbors = find_neighbors(&shortlist, self.config.selection.k_similar);
        tracing::debug!(
            "Found up to {} neighbours for {} messages",
            self.config.selection.k_similar,
            neighbors.len()
        );

        self.neighbors = Some(neighbors);
        Ok(())
    }

    /// Vote candidate authors for every selected message
    pub fn build_candidates(&mut self) -> Result<()> {
        let (Some(pool), Some(unique), Some(neighbors)) = (
            self.pool.as_ref(),
            self.unique.as_ref(),
            self.neighbors.as_ref(),
        ) else {
            return Err(missing(Stage::BuildCandidates, Stage::FindNeighbors));
        };

        let weights = AuthorWeights::from_pool(pool);
        tracing::debug!(
            "Voting among {} authors for {} messages",
            weights.authors(),
            unique.len()
        );
        let set = build_candidates(
            pool,
            unique,
            neighbors,
            &weights,
            self.config.selection.candidates,
            self.config.selection.k_similar,
        )?;

        self.report.substitutions = set.substitutions;
        self.candidates = Some(set);
        Ok(())
    }

    /// Persist the quiz table
    pub fn write_quiz(&mut self) -> Result<()> {
        let (Some(pool), Some(unique), Some(set)) = (
            self.pool.as_ref(),
            self.unique.as_ref(),
            self.candidates.as_ref(),
        ) else {
            return Err(missing(Stage::WriteQuiz, Stage::BuildCandidates));
        };

        let rows: Vec<QuizRow> = unique
            .iter()
            .zip(&set.lists)
            .map(|(&index, list)| {
                let message = &pool[index];
                QuizRow {
                    index,
                    author: message.author.clone(),
                    date: message.formatted_date(),
                    content: message.content.clone(),
                    reactions: message.reactions.clone(),
                    candidates: list.joined(),
                }
            })
            .collect();

        let path = self.config.quiz_path();
        write_quiz(&path, &rows)?;
        tracing::info!("Wrote {} quiz questions to {}", rows.len(), path.display());

        self.report.quiz_rows = rows.len();
        Ok(())
    }
}

fn missing(stage: Stage, requires: Stage) -> WhosaidError {
    WhosaidError::MissingPrerequisite {
        stage: stage.name(),
        requires: requires.name(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::EmbeddingError;

    struct NullProvider;

    impl EmbeddingProvider for NullProvider {
        fn embed(&self, _text: &str) -> std::result::Result<Vec<f32>, EmbeddingError> {
            Ok(vec![0.0, 0.0])
        }

        fn embed_batch(
            &self,
            texts: &[String],
        ) -> std::result::Result<Vec<Vec<f32>>, EmbeddingError> {
            Ok(texts.iter().map(|_| vec![0.0, 0.0]).collect())
        }

        fn dimension(&self) -> usize {
            2
        }

        fn model_name(&self) -> &str {
            "null"
        }
    }

    fn preprocessor() -> Preprocessor {
        let mut config = Config::default();
        config.game.users_to_include = vec!["ana".to_string()];
        Preprocessor::new(config, Arc::new(NullProvider)).unwrap()
    }

    #[test]
    fn test_stage_before_prerequisite() {
        let mut pre = preprocessor();

        match pre.build_candidates() {
            Err(WhosaidError::MissingPrerequisite { stage, requires }) => {
                assert_eq!(stage, "build candidates");
                assert_eq!(requires, "find neighbors");
            }
            other => panic!("unexpected result: {:?}", other.err()),
        }
        assert!(matches!(
            pre.create_history(),
            Err(WhosaidError::MissingPrerequisite { .. })
        ));
        assert!(matches!(
            pre.select_unique(),
            Err(WhosaidError::MissingPrerequisite { .. })
        ));
        assert!(matches!(
            pre.write_quiz(),
            Err(WhosaidError::MissingPrerequisite { .. })
        ));
    }

    #[test]
    fn test_rejects_unvalidated_config() {
        let mut config = Config::default();
        config.game.users_to_include = vec!["ana smith".to_string(), "bo".to_string()];
        assert!(matches!(
            Preprocessor::new(config, Arc::new(NullProvider)),
            Err(WhosaidError::ConfigValidation { .. })
        ));

        let mut config = Config::default();
        config.selection.candidates = 0;
        assert!(matches!(
            Preprocessor::new(config, Arc::new(NullProvider)),
            Err(WhosaidError::ConfigValidation { .. })
        ));
    }

    #[tokio::test]
    async fn test_embed_before_history() {
        let mut pre = preprocessor();
        assert!(matches!(
            pre.embed_pool().await,
            Err(WhosaidError::MissingPrerequisite { .. })
        ));
    }
}
