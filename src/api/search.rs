use axum::extract::State;
use axum::Json;
use chrono::Utc;

use crate::error::ApiError;
use crate::index::VectorIndex;
use crate::models::{SearchRequest, SearchResponse};
use crate::search::format::format_results;
use crate::search::pipeline::RankingPipeline;
use crate::search::semantic::{EmbeddingMatcher, SemanticMatcher, VisionMatcher};
use crate::state::AppState;

/// Upper bound on the snapshot pulled for payload-inspection stages.
const SNAPSHOT_CAP: usize = 10_000;

/// POST /search - run the staged ranking pipeline over a snapshot of all
/// stored records. A failed backing search is "no matches", never a 5xx:
/// the response stays `success: true` with `count: 0`.
pub async fn search(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    let query = req.text.trim().to_string();
    if query.is_empty() {
        return Err(ApiError::InvalidInput("No text provided".to_string()));
    }

    let top_k = req.limit.clamp(1, 50);
    tracing::info!(
        "searching for {query:?} (source: {})",
        req.source.as_deref().unwrap_or("unknown")
    );

    // Every query works on an immutable snapshot fetched up front, so
    // concurrent queries need no coordination.
    let snapshot = match state.index.scroll_all(SNAPSHOT_CAP).await {
        Ok(records) => records,
        Err(e) => {
            tracing::warn!("index unreachable, degrading to empty result set: {e}");
            Vec::new()
        }
    };

    let matcher: Box<dyn SemanticMatcher> = if state.config.ranking.use_vision_semantic {
        Box::new(VisionMatcher::new(
            state.vision_scorer.clone(),
            &state.config.ranking,
        ))
    } else {
        Box::new(EmbeddingMatcher::new(
            state.embedder.clone(),
            state.index.clone(),
            &state.config.ranking,
        ))
    };

    let pipeline = RankingPipeline::new(state.config.ranking.clone());
    let candidates = pipeline.rank(&query, &snapshot, matcher.as_ref(), top_k).await;
    let results = format_results(candidates);

    tracing::info!("found {} matches for {query:?}", results.len());

    Ok(Json(SearchResponse {
        success: true,
        query,
        count: results.len(),
        show_similar_results: !results.is_empty(),
        results,
        timestamp: Utc::now(),
    }))
}
