//! In-memory vector index with cosine similarity search.
//!
//! Selected when no Qdrant endpoint is configured; also the backend the
//! integration tests run against. Records are gone on restart.

use anyhow::Result;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::index::{cosine_similarity, ScoredRecord, VectorIndex};
use crate::models::ImageRecord;

struct Entry {
    record: ImageRecord,
    vector: Vec<f32>,
}

#[derive(Default)]
pub struct MemoryIndex {
    entries: RwLock<Vec<Entry>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry_count(&self) -> usize {
        self.entries.read().len()
    }
}

#[async_trait::async_trait]
impl VectorIndex for MemoryIndex {
    async fn ensure_collection(&self, _dimension: usize) -> Result<()> {
        Ok(())
    }

    async fn upsert(&self, record: &ImageRecord, vector: &[f32]) -> Result<()> {
        let mut entries = self.entries.write();
        entries.retain(|e| e.record.id != record.id);
        entries.push(Entry {
            record: record.clone(),
            vector: vector.to_vec(),
        });
        Ok(())
    }

    async fn search_by_vector(
        &self,
        vector: &[f32],
        limit: usize,
        min_score: Option<f32>,
    ) -> Result<Vec<ScoredRecord>> {
        let entries = self.entries.read();

        let mut scored: Vec<ScoredRecord> = entries
            .iter()
            .map(|e| ScoredRecord {
                record: e.record.clone(),
                score: cosine_similarity(vector, &e.vector),
            })
            .filter(|s| min_score.map_or(true, |floor| s.score >= floor))
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        Ok(scored)
    }

    async fn scroll_all(&self, limit: usize) -> Result<Vec<ImageRecord>> {
        let entries = self.entries.read();
        Ok(entries.iter().take(limit).map(|e| e.record.clone()).collect())
    }

    async fn retrieve(&self, id: Uuid) -> Result<Option<ImageRecord>> {
        let entries = self.entries.read();
        Ok(entries
            .iter()
            .find(|e| e.record.id == id)
            .map(|e| e.record.clone()))
    }
}
