//! Feature normalizer: turns raw annotator output into the canonical
//! searchable record fields and the composite text fed to the embedder.

use crate::models::AnnotationResult;

/// Canonical record fields: lowercased, trimmed, deduplicated with
/// insertion order preserved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedFeatures {
    pub labels: Vec<String>,
    pub entities: Vec<String>,
    pub texts: Vec<String>,
}

/// Placeholder fed to the embedder when an image yields no features at all,
/// so the embedder never receives empty input.
pub const GENERIC_DESCRIPTION: &str = "generic image content";

pub fn normalize(raw: &AnnotationResult) -> NormalizedFeatures {
    NormalizedFeatures {
        labels: normalize_set(&raw.labels),
        entities: normalize_set(&raw.entities),
        texts: normalize_set(&raw.text),
    }
}

impl NormalizedFeatures {
    /// Composite description for embedding: labels first (most reliable
    /// signal), then entities, then OCR text, space-joined.
    pub fn description(&self) -> String {
        let joined = self
            .labels
            .iter()
            .chain(self.entities.iter())
            .chain(self.texts.iter())
            .cloned()
            .collect::<Vec<_>>()
            .join(" ");

        if joined.trim().is_empty() {
            GENERIC_DESCRIPTION.to_string()
        } else {
            joined
        }
    }
}

fn normalize_set(values: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(values.len());
    for v in values {
        let v = v.trim().to_lowercase();
        if v.is_empty() || out.contains(&v) {
            continue;
        }
        out.push(v);
    }
    out
}
