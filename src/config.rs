use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server bind address
    pub bind_addr: String,
    /// Maximum number of files accepted in one upload batch
    pub max_upload_files: usize,
    /// Vision service configuration (annotation + re-analysis)
    pub vision: VisionConfig,
    /// Embedding service configuration
    pub embedding: EmbeddingConfig,
    /// Vector index configuration
    pub index: IndexConfig,
    /// Ranking pipeline thresholds
    pub ranking: RankingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisionConfig {
    /// Base URL for the vision-capable chat API (OpenAI-compatible)
    pub base_url: String,
    /// Model name used for annotation and relevance scoring
    pub model: String,
    /// API key (only needed for cloud providers)
    pub api_key: Option<String>,
    /// Per-call timeout in seconds; a timed-out candidate is dropped,
    /// never the whole batch
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// "ollama" or "openai"
    pub provider: String,
    /// Base URL for the embedding API
    pub base_url: String,
    /// Model name for embeddings
    pub model: String,
    /// API key (only needed for cloud providers)
    pub api_key: Option<String>,
    /// Embedding vector dimension. Fixed at collection-creation time;
    /// changing it forces a destructive collection recreate at startup.
    pub dimension: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Qdrant endpoint. If None, an in-memory index is used instead.
    pub qdrant_url: Option<String>,
    /// Qdrant API key
    pub qdrant_api_key: Option<String>,
    /// Collection name
    pub collection: String,
}

/// Every threshold the pipeline uses. The source variants never settled on
/// consistent values, so all of them are tunable with these defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingConfig {
    /// Stop running further stages once this many candidates exist
    pub min_desired_results: usize,
    /// Result list cap after the final sort
    pub top_k: usize,
    /// Score for an exact or multi-token entity match
    pub entity_exact_score: f32,
    /// Score for a single-word substring entity match
    pub entity_partial_score: f32,
    /// Score for records matched only by having any recognized person
    pub entity_group_score: f32,
    /// Similarity floor for embedding search results
    pub vector_score_floor: f32,
    /// Relevance floor for vision re-analysis results
    pub vision_score_floor: f32,
    /// Maximum candidates sent to vision re-analysis per query
    pub vision_batch_cap: usize,
    /// Concurrent vision re-analysis calls
    pub vision_concurrency: usize,
    /// Soft deadline for the whole semantic stage, in seconds. On expiry
    /// the stage contributes nothing and the cheaper fallbacks still run.
    pub semantic_timeout_secs: u64,
    /// Score for label keyword fallback matches
    pub keyword_score: f32,
    /// Score for OCR text fallback matches
    pub text_score: f32,
    /// Use vision re-analysis instead of embedding similarity for stage 3
    pub use_vision_semantic: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
            max_upload_files: 50,
            vision: VisionConfig::default(),
            embedding: EmbeddingConfig::default(),
            index: IndexConfig::default(),
            ranking: RankingConfig::default(),
        }
    }
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "llava".to_string(),
            api_key: None,
            timeout_secs: 20,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            base_url: "http://localhost:11434".to_string(),
            model: "nomic-embed-text".to_string(),
            api_key: None,
            dimension: 768,
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            qdrant_url: None,
            qdrant_api_key: None,
            collection: "photo_lens".to_string(),
        }
    }
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            min_desired_results: 5,
            top_k: 10,
            entity_exact_score: 0.98,
            entity_partial_score: 0.85,
            entity_group_score: 0.75,
            vector_score_floor: 0.3,
            vision_score_floor: 0.7,
            vision_batch_cap: 15,
            vision_concurrency: 4,
            semantic_timeout_secs: 30,
            keyword_score: 0.5,
            text_score: 0.4,
            use_vision_semantic: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("PHOTO_LENS_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Ok(val) = std::env::var("PHOTO_LENS_MAX_UPLOAD_FILES") {
            if let Ok(v) = val.parse() {
                config.max_upload_files = v;
            }
        }

        // Vision service
        if let Ok(url) = std::env::var("VISION_BASE_URL") {
            config.vision.base_url = url;
        }
        if let Ok(model) = std::env::var("VISION_MODEL") {
            config.vision.model = model;
        }
        if let Ok(key) = std::env::var("VISION_API_KEY") {
            config.vision.api_key = Some(key);
        }
        if let Ok(val) = std::env::var("VISION_TIMEOUT_SECS") {
            if let Ok(v) = val.parse() {
                config.vision.timeout_secs = v;
            }
        }

        // Embedding service
        if let Ok(provider) = std::env::var("EMBEDDING_PROVIDER") {
            config.embedding.provider = provider;
        }
        if let Ok(url) = std::env::var("EMBEDDING_BASE_URL") {
            config.embedding.base_url = url;
        }
        if let Ok(model) = std::env::var("EMBEDDING_MODEL") {
            config.embedding.model = model;
        }
        if let Ok(key) = std::env::var("EMBEDDING_API_KEY") {
            config.embedding.api_key = Some(key);
        }
        if let Ok(dim) = std::env::var("EMBEDDING_DIM") {
            if let Ok(d) = dim.parse() {
                config.embedding.dimension = d;
            }
        }

        // Vector index
        if let Ok(url) = std::env::var("QDRANT_URL") {
            config.index.qdrant_url = Some(url);
        }
        if let Ok(key) = std::env::var("QDRANT_API_KEY") {
            config.index.qdrant_api_key = Some(key);
        }
        if let Ok(name) = std::env::var("QDRANT_COLLECTION") {
            config.index.collection = name;
        }

        // Ranking thresholds
        if let Ok(val) = std::env::var("RANKING_MIN_DESIRED_RESULTS") {
            if let Ok(v) = val.parse() {
                config.ranking.min_desired_results = v;
            }
        }
        if let Ok(val) = std::env::var("RANKING_TOP_K") {
            if let Ok(v) = val.parse() {
                config.ranking.top_k = v;
            }
        }
        if let Ok(val) = std::env::var("RANKING_VECTOR_SCORE_FLOOR") {
            if let Ok(v) = val.parse() {
                config.ranking.vector_score_floor = v;
            }
        }
        if let Ok(val) = std::env::var("RANKING_VISION_SCORE_FLOOR") {
            if let Ok(v) = val.parse() {
                config.ranking.vision_score_floor = v;
            }
        }
        if let Ok(val) = std::env::var("RANKING_VISION_BATCH_CAP") {
            if let Ok(v) = val.parse() {
                config.ranking.vision_batch_cap = v;
            }
        }
        if let Ok(val) = std::env::var("RANKING_VISION_CONCURRENCY") {
            if let Ok(v) = val.parse() {
                config.ranking.vision_concurrency = v;
            }
        }
        if let Ok(val) = std::env::var("RANKING_SEMANTIC_TIMEOUT_SECS") {
            if let Ok(v) = val.parse() {
                config.ranking.semantic_timeout_secs = v;
            }
        }
        if let Ok(val) = std::env::var("RANKING_USE_VISION_SEMANTIC") {
            config.ranking.use_vision_semantic = val == "1" || val.eq_ignore_ascii_case("true");
        }

        config
    }
}
