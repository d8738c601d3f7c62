//! Stage 3 backends. Two interchangeable implementations of the semantic
//! match: embedding similarity (cheap, fuzzy) and direct vision re-analysis
//! (expensive, precise, strictly bounded).

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use base64::Engine;
use uuid::Uuid;

use crate::config::RankingConfig;
use crate::embed::EmbedderChain;
use crate::index::VectorIndex;
use crate::models::{ImageRecord, MatchCandidate, MatchType};
use crate::vision::VisionScorer;

/// Capability seam for the semantic stage. `exclude` holds ids already
/// matched by earlier stages; implementations must not return them.
#[async_trait::async_trait]
pub trait SemanticMatcher: Send + Sync {
    async fn find_matches(
        &self,
        query: &str,
        snapshot: &[ImageRecord],
        exclude: &HashSet<Uuid>,
        limit: usize,
    ) -> Result<Vec<MatchCandidate>>;
}

/// Embedding similarity: embed the (enhanced) query and run nearest-neighbor
/// search against the index.
pub struct EmbeddingMatcher {
    embedder: Arc<EmbedderChain>,
    index: Arc<dyn VectorIndex>,
    score_floor: f32,
}

impl EmbeddingMatcher {
    pub fn new(
        embedder: Arc<EmbedderChain>,
        index: Arc<dyn VectorIndex>,
        cfg: &RankingConfig,
    ) -> Self {
        Self {
            embedder,
            index,
            score_floor: cfg.vector_score_floor,
        }
    }
}

#[async_trait::async_trait]
impl SemanticMatcher for EmbeddingMatcher {
    async fn find_matches(
        &self,
        query: &str,
        _snapshot: &[ImageRecord],
        exclude: &HashSet<Uuid>,
        limit: usize,
    ) -> Result<Vec<MatchCandidate>> {
        let enhanced = enhance_query(query);
        let embedding = self.embedder.embed(&enhanced).await?;

        // Fetch more than needed, then confidence-filter. Ids already
        // matched by earlier stages are dropped before truncation so they
        // never consume result slots.
        let hits: Vec<_> = self
            .index
            .search_by_vector(&embedding, limit * 2, None)
            .await?
            .into_iter()
            .filter(|h| !exclude.contains(&h.record.id))
            .collect();

        let above_floor: Vec<_> = hits
            .iter()
            .filter(|h| h.score >= self.score_floor)
            .cloned()
            .collect();

        // Nothing clears the floor: surface the top few anyway so a voice
        // query never comes back completely empty-handed from this stage.
        let kept = if above_floor.is_empty() {
            hits.into_iter().take(3).collect()
        } else {
            above_floor.into_iter().take(limit).collect::<Vec<_>>()
        };

        Ok(kept
            .into_iter()
            .map(|h| MatchCandidate {
                record: h.record,
                score: h.score,
                match_type: MatchType::VectorSimilarity,
            })
            .collect())
    }
}

/// Direct vision re-analysis: ask the vision model to score each remaining
/// candidate's image against the query. Bounded by a batch cap and a
/// concurrency limit regardless of database size; a failed or timed-out
/// candidate contributes nothing instead of failing the batch.
pub struct VisionMatcher {
    scorer: Arc<dyn VisionScorer>,
    score_floor: f32,
    batch_cap: usize,
    concurrency: usize,
}

impl VisionMatcher {
    pub fn new(scorer: Arc<dyn VisionScorer>, cfg: &RankingConfig) -> Self {
        Self {
            scorer,
            score_floor: cfg.vision_score_floor,
            batch_cap: cfg.vision_batch_cap,
            concurrency: cfg.vision_concurrency.max(1),
        }
    }
}

#[async_trait::async_trait]
impl SemanticMatcher for VisionMatcher {
    async fn find_matches(
        &self,
        query: &str,
        snapshot: &[ImageRecord],
        exclude: &HashSet<Uuid>,
        _limit: usize,
    ) -> Result<Vec<MatchCandidate>> {
        let candidates: Vec<&ImageRecord> = snapshot
            .iter()
            .filter(|r| !exclude.contains(&r.id) && r.image_data.is_some())
            .take(self.batch_cap)
            .collect();

        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let semaphore = Arc::new(tokio::sync::Semaphore::new(self.concurrency));
        let mut handles = Vec::with_capacity(candidates.len());

        for record in candidates {
            let record = record.clone();
            let query = query.to_string();
            let scorer = self.scorer.clone();
            let sem = semaphore.clone();

            handles.push(tokio::spawn(async move {
                let _permit = sem.acquire().await;
                let data = record.image_data.as_deref().unwrap_or_default();
                let bytes = match base64::engine::general_purpose::STANDARD.decode(data) {
                    Ok(bytes) => bytes,
                    Err(_) => return None,
                };
                match scorer.relevance(&bytes, &query).await {
                    Ok(score) => Some((record, score)),
                    Err(e) => {
                        tracing::warn!("vision scoring failed for {}: {e}", record.id);
                        None
                    }
                }
            }));
        }

        let mut matches = Vec::new();
        for handle in handles {
            if let Ok(Some((record, score))) = handle.await {
                if score >= self.score_floor {
                    matches.push(MatchCandidate {
                        record,
                        score,
                        match_type: MatchType::VisionSemantic,
                    });
                }
            }
        }

        Ok(matches)
    }
}

/// Expand common voice-query terms with synonyms before embedding, so a
/// spoken "car" also pulls in records described as "automobile" or
/// "vehicle". Applied only to the embedding path; exact-match stages see
/// the literal query.
pub fn enhance_query(query: &str) -> String {
    let normalized = query.to_lowercase().trim().to_string();

    if normalized.contains("car") || normalized.contains("vehicle") || normalized.contains("sedan")
    {
        format!("{normalized} automobile motor vehicle transportation wheels tires driving road")
    } else if normalized.contains("house") || normalized.contains("home") {
        format!("{normalized} building residence dwelling property architecture")
    } else if normalized.contains("metal") {
        format!("{normalized} metallic chrome steel aluminum shiny surface")
    } else if normalized.contains("person") || normalized.contains("people") {
        format!("{normalized} human individual face portrait man woman")
    } else {
        normalized
    }
}
