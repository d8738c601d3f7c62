//! The staged ranking pipeline.
//!
//! A pure function of (query, snapshot of stored records) plus the
//! injected semantic matcher. Stages run in descending-precision order and
//! later stages are skipped once `min_desired_results` candidates exist,
//! since they are strictly more expensive or less precise. A record id
//! appears at most once in the output; the earliest stage that matched it
//! wins the tag and ties in the final sort.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use uuid::Uuid;

use crate::config::RankingConfig;
use crate::models::{ImageRecord, MatchCandidate, MatchType};
use crate::search::semantic::SemanticMatcher;

/// Query terms that ask for the "famous person" class rather than a
/// specific name.
const CATEGORY_TERMS: &[&str] = &["celebrity", "celebrities", "famous", "actor", "actress"];

/// Stopwords plus common object/scene words. A query containing any of
/// these is an object query, not a person's name, no matter its shape.
const NON_NAME_WORDS: &[&str] = &[
    "a", "an", "the", "at", "on", "in", "of", "with", "and", "or", "my", "me",
    "show", "find", "photo", "photos", "picture", "pictures", "image", "images",
    "car", "cars", "vehicle", "truck", "bike", "house", "home", "building",
    "beach", "sunset", "sunrise", "mountain", "tree", "trees", "sky", "water",
    "road", "street", "city", "food", "dog", "cat", "bird", "flower", "flowers",
    "person", "people", "man", "woman", "kid", "kids", "baby", "group",
    "red", "blue", "green", "yellow", "white", "black", "old", "new", "big",
    "small", "night", "day",
];

static PHONE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{3}[\s.-]?\d{3,4}[\s.-]?\d{0,4}").unwrap());
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\S+@\S+\.\S+").unwrap());
static ADDRESS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\d+\s+\w+\s+(street|st|road|rd|avenue|ave|lane|ln|drive|dr|boulevard|blvd)\b")
        .unwrap()
});

pub struct RankingPipeline {
    cfg: RankingConfig,
}

impl RankingPipeline {
    pub fn new(cfg: RankingConfig) -> Self {
        Self { cfg }
    }

    /// Run all stages and return the deduplicated, sorted, truncated
    /// candidate list. Never errors: a failing stage contributes nothing.
    pub async fn rank(
        &self,
        raw_query: &str,
        snapshot: &[ImageRecord],
        semantic: &dyn SemanticMatcher,
        top_k: usize,
    ) -> Vec<MatchCandidate> {
        let query = raw_query.trim().to_lowercase();
        let mut candidates: Vec<MatchCandidate> = Vec::new();
        let mut matched: HashSet<Uuid> = HashSet::new();

        // ── Stage 1: exact/partial entity match ──────────────────
        for record in snapshot {
            if let Some(score) = entity_match_score(&query, &record.entities, &self.cfg) {
                matched.insert(record.id);
                candidates.push(MatchCandidate {
                    record: record.clone(),
                    score,
                    match_type: MatchType::ExactEntity,
                });
            }
        }
        tracing::debug!("entity stage: {} candidates", candidates.len());

        // ── Stage 2: entity-category match ───────────────────────
        if is_category_query(&query) {
            for record in snapshot {
                if !record.entities.is_empty() && matched.insert(record.id) {
                    candidates.push(MatchCandidate {
                        record: record.clone(),
                        score: self.cfg.entity_group_score,
                        match_type: MatchType::EntityGroup,
                    });
                }
            }
        }

        // ── Stage 3: semantic match ──────────────────────────────
        // Skipped for name-shaped queries: the entity stages own those,
        // and similarity search would surface look-alike wrong people.
        if candidates.len() < self.cfg.min_desired_results && !looks_like_person_name(&query) {
            let deadline = std::time::Duration::from_secs(self.cfg.semantic_timeout_secs);
            match tokio::time::timeout(
                deadline,
                semantic.find_matches(&query, snapshot, &matched, top_k),
            )
            .await
            {
                Ok(Ok(found)) => {
                    for candidate in found {
                        if matched.insert(candidate.record.id) {
                            candidates.push(candidate);
                        }
                    }
                }
                Ok(Err(e)) => {
                    tracing::warn!("semantic stage degraded: {e}");
                }
                Err(_) => {
                    tracing::warn!("semantic stage timed out after {deadline:?}");
                }
            }
        }

        // ── Stage 4: keyword fallback over labels ────────────────
        if candidates.len() < self.cfg.min_desired_results {
            for record in snapshot {
                if keyword_overlap(&query, &record.labels) && matched.insert(record.id) {
                    candidates.push(MatchCandidate {
                        record: record.clone(),
                        score: self.cfg.keyword_score,
                        match_type: MatchType::Keyword,
                    });
                }
            }
        }

        // ── Stage 5: OCR text fallback ───────────────────────────
        // Gated on text-shaped queries so OCR noise never pollutes
        // ordinary object queries.
        if candidates.len() < self.cfg.min_desired_results && looks_like_text_query(&query) {
            for record in snapshot {
                if keyword_overlap(&query, &record.texts) && matched.insert(record.id) {
                    candidates.push(MatchCandidate {
                        record: record.clone(),
                        score: self.cfg.text_score,
                        match_type: MatchType::Text,
                    });
                }
            }
        }

        // Stable sort keeps insertion (stage) order for equal scores, so
        // results are reproducible run to run.
        candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        candidates.truncate(top_k);
        candidates
    }
}

/// Best entity score tier reached for a record, or None.
///
/// Exact equality and multi-token overlap share the top tier; single-word
/// substring containment sits one tier below, so an exact match never
/// scores under a partial one.
fn entity_match_score(query: &str, entities: &[String], cfg: &RankingConfig) -> Option<f32> {
    if entities.is_empty() {
        return None;
    }

    let query_tokens: Vec<&str> = query.split_whitespace().collect();
    let mut best: Option<f32> = None;

    for entity in entities {
        let score = if entity == query {
            Some(cfg.entity_exact_score)
        } else if query_tokens.len() >= 2 {
            let entity_tokens: HashSet<&str> = entity.split_whitespace().collect();
            let overlap = query_tokens.iter().filter(|t| entity_tokens.contains(**t)).count();
            (overlap >= 2).then_some(cfg.entity_exact_score)
        } else if query_tokens.len() == 1 {
            let q = query_tokens[0];
            (entity.contains(q) || q.contains(entity.as_str()))
                .then_some(cfg.entity_partial_score)
        } else {
            None
        };

        if let Some(s) = score {
            best = Some(best.map_or(s, |b: f32| b.max(s)));
        }
    }
    best
}

fn is_category_query(query: &str) -> bool {
    CATEGORY_TERMS.iter().any(|t| query.contains(t))
}

/// Heuristic: two to four purely alphabetic tokens, none of them a known
/// category word, stopword, or common object/scene word, reads like a
/// person's name.
fn looks_like_person_name(query: &str) -> bool {
    let tokens: Vec<&str> = query.split_whitespace().collect();
    if !(2..=4).contains(&tokens.len()) {
        return false;
    }
    tokens.iter().all(|t| {
        t.chars().all(|c| c.is_alphabetic())
            && !CATEGORY_TERMS.contains(t)
            && !NON_NAME_WORDS.contains(t)
    })
}

/// Phone number, email, or street address shape.
fn looks_like_text_query(query: &str) -> bool {
    PHONE_RE.is_match(query) || EMAIL_RE.is_match(query) || ADDRESS_RE.is_match(query)
}

/// Substring overlap in either direction between the query (whole, or per
/// token of length ≥ 3) and any of the stored values.
fn keyword_overlap(query: &str, values: &[String]) -> bool {
    values.iter().any(|v| {
        if v.contains(query) || query.contains(v.as_str()) {
            return true;
        }
        query
            .split_whitespace()
            .filter(|t| t.len() >= 3)
            .any(|t| v.contains(t) || t.contains(v.as_str()))
    })
}
