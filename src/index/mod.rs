//! Vector index adapters.
//!
//! The pipeline treats the index as an external service with a narrow
//! contract: upsert-by-id, nearest-neighbor search, full scroll for stages
//! that need direct payload inspection, and point retrieval for image
//! serving. `QdrantIndex` talks to a Qdrant server over REST; `MemoryIndex`
//! is an in-process stand-in used when no endpoint is configured and by the
//! tests.

pub mod memory;
pub mod qdrant;

pub use memory::MemoryIndex;
pub use qdrant::QdrantIndex;

use anyhow::Result;
use uuid::Uuid;

use crate::models::ImageRecord;

/// A record returned from similarity search with its cosine score.
#[derive(Debug, Clone)]
pub struct ScoredRecord {
    pub record: ImageRecord,
    pub score: f32,
}

#[async_trait::async_trait]
pub trait VectorIndex: Send + Sync {
    /// Idempotent: creates the backing collection if absent. If it exists
    /// with a mismatched dimension it is dropped and recreated, so this is
    /// only safe at startup, never mid-traffic.
    async fn ensure_collection(&self, dimension: usize) -> Result<()>;

    /// Insert or replace by id.
    async fn upsert(&self, record: &ImageRecord, vector: &[f32]) -> Result<()>;

    /// Up to `limit` records ordered by descending cosine similarity,
    /// optionally dropping everything below `min_score`.
    async fn search_by_vector(
        &self,
        vector: &[f32],
        limit: usize,
        min_score: Option<f32>,
    ) -> Result<Vec<ScoredRecord>>;

    /// Full retrieval for ranking stages that match raw payloads (entity
    /// and keyword passes) instead of going through vector search.
    async fn scroll_all(&self, limit: usize) -> Result<Vec<ImageRecord>>;

    /// Fetch one record by id, payload included.
    async fn retrieve(&self, id: Uuid) -> Result<Option<ImageRecord>>;
}

pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for i in 0..a.len() {
        dot += a[i] * b[i];
        norm_a += a[i] * a[i];
        norm_b += b[i] * b[i];
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}
