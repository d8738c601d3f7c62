//! Per-candidate relevance scoring for the vision-semantic ranking stage.
//!
//! The model answers whether an image matches the query with a confidence
//! value; the two fold into a single score in [0,1]. Each call carries its
//! own timeout, so one slow candidate costs only its own score.

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::config::VisionConfig;
use crate::vision::annotate::call_vision_chat;

/// Capability seam for the vision-semantic stage; tests swap in a counting
/// spy to verify the stage's short-circuit and batching behavior.
#[async_trait::async_trait]
pub trait VisionScorer: Send + Sync {
    /// Relevance of one image to the query, in [0,1].
    async fn relevance(&self, image_bytes: &[u8], query: &str) -> Result<f32>;
}

pub struct HttpVisionScorer {
    client: reqwest::Client,
    config: VisionConfig,
}

impl HttpVisionScorer {
    pub fn new(client: reqwest::Client, config: VisionConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait::async_trait]
impl VisionScorer for HttpVisionScorer {
    async fn relevance(&self, image_bytes: &[u8], query: &str) -> Result<f32> {
        let prompt = format!(
            "Does this photo match the search query \"{query}\"? \
             Answer with ONLY a JSON object: {{\"relevant\": true/false, \"confidence\": 0.0-1.0}}"
        );

        let response = call_vision_chat(&self.client, &self.config, &prompt, image_bytes)
            .await
            .context("Vision relevance call failed")?;

        parse_relevance_score(&response)
    }
}

#[derive(Deserialize)]
struct RelevanceResponse {
    relevant: bool,
    #[serde(default = "default_confidence")]
    confidence: f32,
}

fn default_confidence() -> f32 {
    0.5
}

fn parse_relevance_score(content: &str) -> Result<f32> {
    // Try JSON parse first
    if let Ok(v) = serde_json::from_str::<RelevanceResponse>(content) {
        return Ok(fold_score(&v));
    }

    // Try to extract JSON from response
    if let Some(start) = content.find('{') {
        if let Some(end) = content.rfind('}') {
            if let Ok(v) = serde_json::from_str::<RelevanceResponse>(&content[start..=end]) {
                return Ok(fold_score(&v));
            }
        }
    }

    // Fallback: check for yes/no keywords. Whole words only, so "know"
    // and "not" never read as a negative answer.
    let lower = content.to_lowercase();
    if lower.contains("\"relevant\": true") || contains_word(&lower, "yes") {
        Ok(0.7)
    } else if lower.contains("\"relevant\": false") || contains_word(&lower, "no") {
        Ok(0.2)
    } else {
        Ok(0.5) // Uncertain
    }
}

fn contains_word(text: &str, word: &str) -> bool {
    text.split(|c: char| !c.is_alphanumeric())
        .any(|token| token == word)
}

fn fold_score(v: &RelevanceResponse) -> f32 {
    let base = if v.relevant { 0.5 } else { 0.0 };
    (base + v.confidence.clamp(0.0, 1.0) * 0.5).clamp(0.0, 1.0)
}
