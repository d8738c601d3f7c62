//! Deterministic hash-based embedding, the last link of the fallback chain.
//!
//! Distributes the characters of each word across dimensions with a fixed
//! mixing function, so the same text always produces the same vector and
//! the pipeline keeps working with no connectivity at all. Quality is far
//! below a real model; it only has to beat returning nothing.

use anyhow::Result;

use crate::embed::{l2_normalize, Embedder};

pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        assert!(dimension > 0, "embedding dimension must be non-zero");
        Self { dimension }
    }

    fn encode(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimension];

        for (word_index, word) in text.to_lowercase().split_whitespace().enumerate() {
            for (i, ch) in word.chars().enumerate() {
                let code = ch as usize;
                let dim = (code + word_index * 17 + i * 7) % self.dimension;
                embedding[dim] += ((code + word_index) as f32).sin() * 0.1;
            }
        }

        l2_normalize(embedding)
    }
}

#[async_trait::async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.encode(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &'static str {
        "hash"
    }
}
