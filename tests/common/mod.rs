// Shared fixtures for integration tests
#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use whosaid::config::Config;
use whosaid::embedding::{EmbeddingError, EmbeddingProvider};

pub const AUTHORS: [&str; 5] = ["ana", "bo", "cy", "dee", "eli"];

/// Deterministic encoder: eight components taken from the BLAKE3 hash of the text
pub struct HashProvider {
    calls: AtomicUsize,
}

impl HashProvider {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }

    /// Texts embedded so far
    pub fn embedded(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl EmbeddingProvider for HashProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.is_empty() {
            return Err(EmbeddingError::InvalidInput("empty text".to_string()));
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        let hash = blake3::hash(text.as_bytes());
        Ok(hash.as_bytes()[..8]
            .iter()
            .map(|&b| b as f32 / 127.5 - 1.0)
            .collect())
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    fn dimension(&self) -> usize {
        8
    }

    fn model_name(&self) -> &str {
        "hash-8"
    }
}

/// Config rooted in `root` with data/, processed/ and saves/ subdirectories
pub fn config_in(root: &Path, authors: &[&str]) -> Config {
    let mut config = Config::default();
    config.game.data_path = root.join("data");
    config.game.processed_path = root.join("processed");
    config.game.game_save_path = root.join("saves");
    config.game.users_to_include = authors.iter().map(|a| a.to_string()).collect();
    config.selection.distance_threshold = 0.1;
    config.selection.k_similar = 45;
    config.selection.candidates = 4;
    config.embedding.batch_size = 7;
    config.embedding.max_concurrent = 2;
    config
}

/// One export row
pub fn row(author: &str, minute: u32, content: &str) -> String {
    format!(
        "{},2023-05-0{} {:02}:{:02}:00,\"{}\",\n",
        author,
        1 + minute / 1440,
        (minute / 60) % 24,
        minute % 60,
        content.replace('"', "\"\"")
    )
}

/// Write `rows` as an export file named `name` under `data_path`
pub fn write_export(config: &Config, name: &str, rows: &[String]) {
    std::fs::create_dir_all(&config.game.data_path).unwrap();
    let mut body = String::from("AuthorID,Author,Date,Content,Reactions\n");
    for line in rows {
        body.push_str("0,");
        body.push_str(line);
    }
    std::fs::write(config.game.data_path.join(name), body).unwrap();
}

/// Eight quiz-worthy messages per author plus noise the strict pass must drop
pub fn sample_rows(authors: &[&str], offset: u32) -> Vec<String> {
    let mut rows = Vec::new();
    let mut minute = offset;
    for round in 0..8 {
        for author in authors {
            rows.push(row(
                author,
                minute,
                &format!("{} thinks round {} was the best one yet", author, round),
            ));
            minute += 1;
        }
    }

    rows.push(row("ana", minute, "look at https://example.com right now"));
    rows.push(row("bo", minute + 1, "hey @cy you there today"));
    rows.push(row("cy", minute + 2, "ok"));
    rows.push(row("dee", minute + 3, "Joined the server."));
    rows.push(row("mallory", minute + 4, "i am not on the guest list today"));
    rows
}
