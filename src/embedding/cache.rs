//! On-disk embedding cache
//!
//! A cache file is only valid for the exact collection it was computed
//! from. The key records the model, the dimension, the row count and a
//! BLAKE3 fingerprint over the ordered texts; any difference means the
//! vectors no longer line up with the pool and must be recomputed.

use super::Embeddings;
use crate::error::{Result, WhosaidError};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::path::Path;

const COMPRESSION_LEVEL: i32 = 3;

/// Identity of the collection a cache belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheKey {
    pub model: String,
    pub dimension: usize,
    pub rows: usize,
    pub fingerprint: String,
}

impl CacheKey {
    /// Build the key for `texts` embedded with `model`
    pub fn for_texts<S: AsRef<str>>(model: &str, dimension: usize, texts: &[S]) -> Self {
        let mut hasher = blake3::Hasher::new();
        for text in texts {
            let bytes = text.as_ref().as_bytes();
            // Length prefix keeps ["ab", "c"] and ["a", "bc"] apart
            hasher.update(&(bytes.len() as u64).to_le_bytes());
            hasher.update(bytes);
        }

        Self {
            model: model.to_string(),
            dimension,
            rows: texts.len(),
            fingerprint: hasher.finalize().to_hex().to_string(),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct CacheFile {
    key: CacheKey,
    /// Pool indices the rows were taken from, when the cache holds a subset
    #[serde(default)]
    source_indices: Option<Vec<usize>>,
    /// Row-major vectors
    vectors: Vec<f32>,
}

/// A loaded cache entry
#[derive(Debug, Clone, PartialEq)]
pub struct CachedEmbeddings {
    pub vectors: Embeddings,
}

/// Embedding cache persistence
pub struct EmbeddingCache;

impl EmbeddingCache {
    /// Load the cache at `path` if it exists and matches `key`
    ///
    /// Returns `Ok(None)` for a missing, unreadable or stale file; the
    /// caller recomputes in all three cases.
    pub fn load_valid(path: &Path, key: &CacheKey) -> Result<Option<CachedEmbeddings>> {
        if !path.exists() {
            tracing::debug!("No embedding cache at {}", path.display());
            return Ok(None);
        }

        let file = match Self::read(path) {
            Ok(file) => file,
            Err(e) => {
                tracing::warn!(
                    "Ignoring unreadable embedding cache {}: {}",
                    path.display(),
                    e
                );
                return Ok(None);
            }
        };

        if &file.key != key {
            tracing::warn!(
                "Embedding cache {} is stale (cached {} rows of {}, need {} rows of {}); recomputing",
                path.display(),
                file.key.rows,
                file.key.model,
                key.rows,
                key.model
            );
            return Ok(None);
        }

        let vectors = match Array2::from_shape_vec((key.rows, key.dimension), file.vectors) {
            Ok(vectors) => vectors,
            Err(e) => {
                tracing::warn!("Embedding cache {} has a bad shape: {}", path.display(), e);
                return Ok(None);
            }
        };

        tracing::info!("Loaded {} cached embeddings from {}", key.rows, path.display());
        Ok(Some(CachedEmbeddings { vectors }))
    }

    /// Persist `vectors` under `key`, replacing any previous file atomically
    pub fn save(
        path: &Path,
        key: &CacheKey,
        vectors: &Embeddings,
        source_indices: Option<&[usize]>,
    ) -> Result<()> {
        let file = CacheFile {
            key: key.clone(),
            source_indices: source_indices.map(<[usize]>::to_vec),
            vectors: vectors.iter().copied().collect(),
        };

        let json = serde_json::to_vec(&file).map_err(|e| WhosaidError::Json {
            source: e,
            context: "Failed to serialize embedding cache".to_string(),
        })?;
        let compressed =
            zstd::encode_all(&json[..], COMPRESSION_LEVEL).map_err(|e| WhosaidError::Io {
                source: e,
                context: "Failed to compress embedding cache".to_string(),
            })?;

        crate::storage::write_atomic(path, &compressed)?;
        tracing::debug!("Saved {} embeddings to {}", key.rows, path.display());
        Ok(())
    }

    fn read(path: &Path) -> Result<CacheFile> {
        let compressed = std::fs::read(path).map_err(|e| WhosaidError::Io {
            source: e,
            context: format!("Failed to read embedding cache: {}", path.display()),
        })?;
        let json = zstd::decode_all(&compressed[..]).map_err(|e| WhosaidError::Io {
            source: e,
            context: format!("Failed to decompress embedding cache: {}", path.display()),
        })?;
        serde_json::from_slice(&json).map_err(|e| WhosaidError::Json {
            source: e,
            context: format!("Failed to parse embedding cache: {}", path.display()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use tempfile::TempDir;

    fn texts() -> Vec<String> {
        vec!["pizza tonight at mine".to_string(), "who broke the build".to_string()]
    }

    #[test]
    fn test_missing_file_is_none() {
        let temp = TempDir::new().unwrap();
        let key = CacheKey::for_texts("m", 2, &texts());
        let loaded = EmbeddingCache::load_valid(&temp.path().join("none.cache"), &key).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("embeddings.cache");
        let key = CacheKey::for_texts("m", 2, &texts());
        let vectors = array![[0.1f32, -0.25], [1.0 / 3.0, 7.5e-8]];

        EmbeddingCache::save(&path, &key, &vectors, Some(&[3, 9])).unwrap();
        let loaded = EmbeddingCache::load_valid(&path, &key).unwrap().unwrap();

        assert_eq!(loaded.vectors, vectors);
        assert_eq!(
            EmbeddingCache::read(&path).unwrap().source_indices,
            Some(vec![3, 9])
        );
    }

    #[test]
    fn test_changed_pool_invalidates() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("embeddings.cache");
        let key = CacheKey::for_texts("m", 2, &texts());
        EmbeddingCache::save(&path, &key, &array![[0.0f32, 0.0], [1.0, 1.0]], None).unwrap();

        let mut grown = texts();
        grown.push("a brand new message".to_string());
        let grown_key = CacheKey::for_texts("m", 2, &grown);
        assert!(EmbeddingCache::load_valid(&path, &grown_key).unwrap().is_none());

        // Same shape, different content
        let edited = vec!["pizza tonight at yours".to_string(), texts()[1].clone()];
        let edited_key = CacheKey::for_texts("m", 2, &edited);
        assert_eq!(edited_key.rows, key.rows);
        assert!(EmbeddingCache::load_valid(&path, &edited_key).unwrap().is_none());

        let other_model = CacheKey::for_texts("other", 2, &texts());
        assert!(EmbeddingCache::load_valid(&path, &other_model).unwrap().is_none());
    }

    #[test]
    fn test_corrupt_file_is_none() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("embeddings.cache");
        std::fs::write(&path, b"not zstd at all").unwrap();

        let key = CacheKey::for_texts("m", 2, &texts());
        assert!(EmbeddingCache::load_valid(&path, &key).unwrap().is_none());
    }

    #[test]
    fn test_fingerprint_is_order_sensitive() {
        let forward = CacheKey::for_texts("m", 2, &["a", "bc"]);
        let split = CacheKey::for_texts("m", 2, &["ab", "c"]);
        let reversed = CacheKey::for_texts("m", 2, &["bc", "a"]);
        assert_ne!(forward.fingerprint, split.fingerprint);
        assert_ne!(forward.fingerprint, reversed.fingerprint);
    }
}
