//! Text embedding backends.
//!
//! The service never fails a query outright for lack of connectivity: an
//! ordered chain of backends is tried in sequence and the first success
//! wins. The last link is a deterministic hash embedder that cannot fail.

pub mod hash;
pub mod http;

pub use hash::HashEmbedder;
pub use http::HttpEmbedder;

use anyhow::Result;

/// A single embedding backend. Every implementation must return exactly
/// `dimension()` components, L2-normalized.
#[async_trait::async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
    fn dimension(&self) -> usize;
    /// Backend name for logging
    fn name(&self) -> &'static str;
}

/// Ordered fallback chain: try each backend in sequence, first success wins.
pub struct EmbedderChain {
    backends: Vec<Box<dyn Embedder>>,
}

impl EmbedderChain {
    pub fn new(backends: Vec<Box<dyn Embedder>>) -> Self {
        assert!(!backends.is_empty(), "embedder chain cannot be empty");
        Self { backends }
    }

    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let text = if text.trim().is_empty() {
            crate::features::GENERIC_DESCRIPTION
        } else {
            text
        };

        let mut last_err = None;
        for backend in &self.backends {
            match backend.embed(text).await {
                Ok(vector) => {
                    if vector.len() != backend.dimension() {
                        tracing::warn!(
                            "embedder {} returned {} components, expected {}",
                            backend.name(),
                            vector.len(),
                            backend.dimension()
                        );
                        last_err = Some(anyhow::anyhow!(
                            "embedder {} returned wrong dimension",
                            backend.name()
                        ));
                        continue;
                    }
                    return Ok(l2_normalize(vector));
                }
                Err(e) => {
                    tracing::warn!("embedder {} failed, trying next: {e}", backend.name());
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("no embedding backends configured")))
    }

    pub fn dimension(&self) -> usize {
        self.backends[0].dimension()
    }
}

/// Scale a vector to unit length. Zero vectors are returned unchanged.
pub fn l2_normalize(mut v: Vec<f32>) -> Vec<f32> {
    let magnitude = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if magnitude > 0.0 {
        for x in &mut v {
            *x /= magnitude;
        }
    }
    v
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FailingEmbedder {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl Embedder for FailingEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("backend unreachable")
        }

        fn dimension(&self) -> usize {
            4
        }

        fn name(&self) -> &'static str {
            "failing"
        }
    }

    struct FixedEmbedder;

    #[async_trait::async_trait]
    impl Embedder for FixedEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![3.0, 4.0, 0.0, 0.0])
        }

        fn dimension(&self) -> usize {
            4
        }

        fn name(&self) -> &'static str {
            "fixed"
        }
    }

    #[tokio::test]
    async fn test_chain_falls_through_to_next_backend() {
        let calls = Arc::new(AtomicUsize::new(0));
        let chain = EmbedderChain::new(vec![
            Box::new(FailingEmbedder { calls: calls.clone() }),
            Box::new(FixedEmbedder),
        ]);

        let v = chain.embed("a red car").await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(v.len(), 4);
    }

    #[tokio::test]
    async fn test_chain_output_is_unit_length() {
        let chain = EmbedderChain::new(vec![Box::new(FixedEmbedder)]);
        let v = chain.embed("anything").await.unwrap();
        let magnitude = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((magnitude - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_chain_errors_when_all_backends_fail() {
        let calls = Arc::new(AtomicUsize::new(0));
        let chain = EmbedderChain::new(vec![
            Box::new(FailingEmbedder { calls: calls.clone() }),
            Box::new(FailingEmbedder { calls: calls.clone() }),
        ]);
        assert!(chain.embed("query").await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_l2_normalize_zero_vector_unchanged() {
        let v = l2_normalize(vec![0.0, 0.0, 0.0]);
        assert_eq!(v, vec![0.0, 0.0, 0.0]);
    }
}
