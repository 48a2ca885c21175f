/// Embedding integration tests against the real local model
///
/// These download the model on first use, so they only run on request.
use std::sync::Arc;
use tempfile::TempDir;
use whosaid::config::Config;
use whosaid::embedding::{
    find_neighbors, find_outliers, BatchEmbedder, CacheKey, EmbeddingCache, EmbeddingProvider,
    FastEmbedProvider,
};

fn quotes() -> Vec<String> {
    [
        "the build is broken again, who pushed to main",
        "someone broke the build, was it a push to main",
        "pizza tonight at my place, bring drinks",
        "dinner at mine tonight, pizza and drinks",
        "my cat learned to open the fridge",
        "has anyone seen my keys, left them on the desk",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[tokio::test]
#[ignore] // Requires model download (~470MB) - run with: cargo test -- --ignored
async fn test_real_model_neighbours() {
    let config = Config::default();
    let provider = Arc::new(
        FastEmbedProvider::new(&config.embedding.model).expect("Failed to initialize embedding provider"),
    );
    let texts = quotes();

    let vectors = BatchEmbedder::new(provider.clone(), 4, 2)
        .embed_all(&texts)
        .await
        .unwrap();
    assert_eq!(vectors.dim(), (texts.len(), provider.dimension()));

    // Paraphrases find each other first
    let neighbors = find_neighbors(&vectors, 2);
    assert_eq!(neighbors[0], vec![0, 1]);
    assert_eq!(neighbors[2], vec![2, 3]);

    let everything = find_outliers(&vectors, 0.0);
    assert_eq!(everything.len(), texts.len());

    let temp = TempDir::new().unwrap();
    let path = temp.path().join("embeddings.cache");
    let key = CacheKey::for_texts(provider.model_name(), provider.dimension(), &texts);
    EmbeddingCache::save(&path, &key, &vectors, None).unwrap();
    let cached = EmbeddingCache::load_valid(&path, &key).unwrap().unwrap();
    assert_eq!(cached.vectors, vectors);
}

#[test]
#[ignore] // Requires model download
fn test_real_model_batch_matches_single() {
    let provider = FastEmbedProvider::new(&Config::default().embedding.model).unwrap();
    let texts = quotes();

    let batch = provider.embed_batch(&texts).unwrap();
    let single = provider.embed(&texts[4]).unwrap();

    let diff: f32 = batch[4]
        .iter()
        .zip(&single)
        .map(|(a, b)| (a - b).abs())
        .sum();
    assert!(diff < 1e-3);
}
