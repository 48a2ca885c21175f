/// Batched, order-preserving embedding of a whole message collection
use super::{EmbeddingError, EmbeddingProvider, Embeddings};
use ndarray::Array2;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, info};

/// Batch embedder
///
/// Splits the input into `batch_size` chunks and runs up to
/// `max_concurrent` of them on blocking worker threads. Row `i` of the
/// result always belongs to input `i`, whatever the scheduling.
pub struct BatchEmbedder {
    provider: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
    max_concurrent: usize,
}

impl BatchEmbedder {
    /// Create a new batch embedder
    ///
    /// # Arguments
    /// * `provider` - Embedding provider
    /// * `batch_size` - Number of texts per provider call
    /// * `max_concurrent` - Maximum batches in flight
    pub fn new(provider: Arc<dyn EmbeddingProvider>, batch_size: usize, max_concurrent: usize) -> Self {
        Self {
            provider,
            batch_size: batch_size.max(1),
            max_concurrent: max_concurrent.max(1),
        }
    }

    pub fn provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.provider
    }

    /// Embed every text, returning a rows × dimension matrix
    pub async fn embed_all(&self, texts: &[String]) -> Result<Embeddings, EmbeddingError> {
        let start = Instant::now();
        let dimension = self.provider.dimension();
        let total = texts.len();

        info!(
            "Computing embeddings for {} messages in batches of {}",
            total, self.batch_size
        );

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let failed = Arc::new(AtomicBool::new(false));
        let mut handles = Vec::new();

        for (batch_no, chunk) in texts.chunks(self.batch_size).enumerate() {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| EmbeddingError::GenerationError(e.to_string()))?;

            // A failed batch is fatal; stop handing out more work
            if failed.load(Ordering::SeqCst) {
                debug!("Stopping after batch failure, {} batches spawned", batch_no);
                break;
            }

            let provider = self.provider.clone();
            let failed = failed.clone();
            let chunk = chunk.to_vec();
            handles.push(tokio::task::spawn_blocking(move || {
                let result = provider.embed_batch(&chunk);
                if result.is_err() {
                    failed.store(true, Ordering::SeqCst);
                }
                drop(permit);
                debug!("Embedded batch {} ({} texts)", batch_no, chunk.len());
                result.map(|vectors| (chunk.len(), vectors))
            }));
        }

        // Joined in spawn order, which is input order
        let mut flat = Vec::with_capacity(total * dimension);
        for handle in handles {
            let (expected, vectors) = handle
                .await
                .map_err(|e| EmbeddingError::GenerationError(format!("Worker failed: {}", e)))??;

            if vectors.len() != expected {
                return Err(EmbeddingError::GenerationError(format!(
                    "Embedding count mismatch: expected {}, got {}",
                    expected,
                    vectors.len()
                )));
            }

            for vector in vectors {
                if vector.len() != dimension {
                    return Err(EmbeddingError::DimensionMismatch {
                        expected: dimension,
                        actual: vector.len(),
                    });
                }
                flat.extend_from_slice(&vector);
            }
        }

        let embeddings = Array2::from_shape_vec((total, dimension), flat)
            .map_err(|e| EmbeddingError::GenerationError(e.to_string()))?;

        info!(
            "Computed {} embeddings ({}ms)",
            total,
            start.elapsed().as_millis()
        );

        Ok(embeddings)
    }
}
