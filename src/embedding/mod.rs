mod batch;
mod cache;
/// Embedding of the quiz candidate pool
///
/// Architecture:
/// - EmbeddingProvider trait for abstraction over the encoder
/// - FastEmbedProvider for local embedding
/// - BatchEmbedder for ordered, bounded-concurrency batching
/// - EmbeddingCache for persisting vectors keyed to their source collection
/// - vector_space for outlier selection and exact nearest neighbours
mod provider;
pub mod vector_space;

pub use batch::BatchEmbedder;
pub use cache::{CacheKey, CachedEmbeddings, EmbeddingCache};
pub use provider::{EmbeddingError, EmbeddingProvider, FastEmbedProvider};
pub use vector_space::{find_neighbors, find_outliers};

/// Embedding matrix: one row per message, in collection order
pub type Embeddings = ndarray::Array2<f32>;
