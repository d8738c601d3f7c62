use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One stored photo. Created once at ingestion, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRecord {
    pub id: Uuid,
    pub filename: String,
    /// Lowercase object/scene tags from the annotator
    pub labels: Vec<String>,
    /// Lowercase named-entity strings (recognized persons); empty if none
    pub entities: Vec<String>,
    /// Lowercase OCR strings; empty if none
    pub texts: Vec<String>,
    pub created_at: DateTime<Utc>,
    /// Base64-encoded image bytes for later serving. Not used by ranking.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_data: Option<String>,
}

/// Raw output of the vision annotator, validated once at the boundary.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnnotationResult {
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub entities: Vec<String>,
    #[serde(default, alias = "texts")]
    pub text: Vec<String>,
}

/// Which ranking stage produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    ExactEntity,
    EntityGroup,
    VectorSimilarity,
    VisionSemantic,
    Keyword,
    Text,
}

/// Transient scored reference to a record, alive for one query only.
/// Scores are comparable within a single search invocation, not across.
#[derive(Debug, Clone)]
pub struct MatchCandidate {
    pub record: ImageRecord,
    pub score: f32,
    pub match_type: MatchType,
}

/// Search request body
#[derive(Debug, Clone, Deserialize)]
pub struct SearchRequest {
    pub text: String,
    /// Optional origin tag from the client ("voice", "typed"), logging only
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    10
}

/// External result shape returned to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub id: Uuid,
    pub filename: String,
    pub labels: Vec<String>,
    pub entities: Vec<String>,
    pub texts: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub score: f32,
    /// Stable 1-based position after the final sort
    pub rank: usize,
    pub match_type: MatchType,
    /// Human-readable explanation templated from match type and score
    pub reason: String,
    /// Relative byte-serving path for this image
    pub image_url: String,
}

/// Search response envelope
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub success: bool,
    pub query: String,
    pub results: Vec<SearchResult>,
    pub count: usize,
    pub show_similar_results: bool,
    pub timestamp: DateTime<Utc>,
}

/// Per-file outcome reported after an upload batch
#[derive(Debug, Clone, Serialize)]
pub struct UploadedImage {
    pub id: Uuid,
    pub filename: String,
    pub labels: Vec<String>,
    pub entities: Vec<String>,
    pub texts: Vec<String>,
}

/// Upload response envelope. A single file's failure never aborts the batch.
#[derive(Debug, Clone, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub message: String,
    pub total_processed: usize,
    pub total_failed: usize,
    /// First few successful records, so mobile clients can confirm quickly
    pub results: Vec<UploadedImage>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_type_serializes_to_snake_case() {
        let json = serde_json::to_value(MatchType::ExactEntity).unwrap();
        assert_eq!(json, "exact_entity");
        let json = serde_json::to_value(MatchType::VectorSimilarity).unwrap();
        assert_eq!(json, "vector_similarity");
    }

    #[test]
    fn test_annotation_result_missing_fields_default_empty() {
        let parsed: AnnotationResult = serde_json::from_str(r#"{"labels":["car"]}"#).unwrap();
        assert_eq!(parsed.labels, vec!["car"]);
        assert!(parsed.entities.is_empty());
        assert!(parsed.text.is_empty());
    }

    #[test]
    fn test_annotation_result_accepts_texts_alias() {
        let parsed: AnnotationResult =
            serde_json::from_str(r#"{"texts":["stop sign"]}"#).unwrap();
        assert_eq!(parsed.text, vec!["stop sign"]);
    }

    #[test]
    fn test_search_request_defaults() {
        let req: SearchRequest = serde_json::from_str(r#"{"text":"beach sunset"}"#).unwrap();
        assert_eq!(req.limit, 10);
        assert!(req.source.is_none());
    }
}
