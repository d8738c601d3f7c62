use std::sync::Arc;

use crate::config::Config;
use crate::embed::{EmbedderChain, HashEmbedder, HttpEmbedder};
use crate::index::{MemoryIndex, QdrantIndex, VectorIndex};
use crate::vision::{Annotator, HttpAnnotator, HttpVisionScorer, VisionScorer};

/// Shared application state. Connection handles are constructor-injected
/// here and handed to the components that need them; nothing is ambient.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub http_client: reqwest::Client,
    pub index: Arc<dyn VectorIndex>,
    pub embedder: Arc<EmbedderChain>,
    pub annotator: Arc<dyn Annotator>,
    pub vision_scorer: Arc<dyn VisionScorer>,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .timeout(std::time::Duration::from_secs(120))
            .build()?;

        let index: Arc<dyn VectorIndex> = match &config.index.qdrant_url {
            Some(url) => {
                tracing::info!("using Qdrant index at {url}");
                Arc::new(QdrantIndex::new(
                    http_client.clone(),
                    &config.index,
                    url.clone(),
                ))
            }
            None => {
                tracing::warn!("no Qdrant endpoint configured, using in-memory index");
                Arc::new(MemoryIndex::new())
            }
        };

        // Fallback order: hosted model first, deterministic hash last, so
        // an embedding is always produced.
        let embedder = Arc::new(EmbedderChain::new(vec![
            Box::new(HttpEmbedder::new(
                http_client.clone(),
                config.embedding.clone(),
            )),
            Box::new(HashEmbedder::new(config.embedding.dimension)),
        ]));

        let annotator: Arc<dyn Annotator> =
            Arc::new(HttpAnnotator::new(http_client.clone(), config.vision.clone()));
        let vision_scorer: Arc<dyn VisionScorer> =
            Arc::new(HttpVisionScorer::new(http_client.clone(), config.vision.clone()));

        Ok(Self {
            config,
            http_client,
            index,
            embedder,
            annotator,
            vision_scorer,
        })
    }
}
