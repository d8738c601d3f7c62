//! Maps ranked candidates to the external result shape: stable 1-based
//! ranks, a human-readable match explanation, and the relative image URL.
//! Pure, no failure modes.

use crate::models::{MatchCandidate, MatchType, SearchResult};

pub fn format_results(candidates: Vec<MatchCandidate>) -> Vec<SearchResult> {
    candidates
        .into_iter()
        .enumerate()
        .map(|(i, candidate)| {
            let record = candidate.record;
            SearchResult {
                image_url: format!("/images/{}", record.id),
                reason: explain(candidate.match_type, candidate.score),
                rank: i + 1,
                score: candidate.score,
                match_type: candidate.match_type,
                id: record.id,
                filename: record.filename,
                labels: record.labels,
                entities: record.entities,
                texts: record.texts,
                created_at: record.created_at,
            }
        })
        .collect()
}

fn explain(match_type: MatchType, score: f32) -> String {
    let pct = score * 100.0;
    match match_type {
        MatchType::ExactEntity => format!("Recognized name match: {pct:.1}%"),
        MatchType::EntityGroup => "Photo contains a recognized person".to_string(),
        MatchType::VectorSimilarity => format!("Vector similarity match: {pct:.1}%"),
        MatchType::VisionSemantic => format!("Visual relevance match: {pct:.1}%"),
        MatchType::Keyword => "Label keyword match".to_string(),
        MatchType::Text => "Text found in image".to_string(),
    }
}
