//! Qdrant REST adapter. Owns the collection schema (vector size, cosine
//! distance) and the payload shape stored alongside each vector.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::config::IndexConfig;
use crate::index::{ScoredRecord, VectorIndex};
use crate::models::ImageRecord;

/// Page size for scroll pagination.
const SCROLL_PAGE: usize = 256;

pub struct QdrantIndex {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    collection: String,
}

/// Payload stored with each point. The point id carries the record id.
#[derive(Debug, Serialize, Deserialize)]
struct RecordPayload {
    filename: String,
    labels: Vec<String>,
    entities: Vec<String>,
    texts: Vec<String>,
    created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_data: Option<String>,
}

impl RecordPayload {
    fn from_record(record: &ImageRecord) -> Self {
        Self {
            filename: record.filename.clone(),
            labels: record.labels.clone(),
            entities: record.entities.clone(),
            texts: record.texts.clone(),
            created_at: record.created_at,
            image_data: record.image_data.clone(),
        }
    }

    fn into_record(self, id: Uuid) -> ImageRecord {
        ImageRecord {
            id,
            filename: self.filename,
            labels: self.labels,
            entities: self.entities,
            texts: self.texts,
            created_at: self.created_at,
            image_data: self.image_data,
        }
    }
}

#[derive(Deserialize)]
struct CollectionInfoResponse {
    result: CollectionInfo,
}

#[derive(Deserialize)]
struct CollectionInfo {
    config: CollectionConfig,
}

#[derive(Deserialize)]
struct CollectionConfig {
    params: CollectionParams,
}

#[derive(Deserialize)]
struct CollectionParams {
    vectors: VectorParams,
}

#[derive(Deserialize)]
struct VectorParams {
    size: usize,
}

#[derive(Deserialize)]
struct SearchResponseBody {
    result: Vec<ScoredPoint>,
}

#[derive(Deserialize)]
struct ScoredPoint {
    id: Uuid,
    score: f32,
    payload: Option<RecordPayload>,
}

#[derive(Deserialize)]
struct ScrollResponseBody {
    result: ScrollResult,
}

#[derive(Deserialize)]
struct ScrollResult {
    points: Vec<ScrollPoint>,
    next_page_offset: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct ScrollPoint {
    id: Uuid,
    payload: Option<RecordPayload>,
}

#[derive(Deserialize)]
struct RetrieveResponseBody {
    result: Vec<ScrollPoint>,
}

impl QdrantIndex {
    pub fn new(client: reqwest::Client, config: &IndexConfig, base_url: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: config.qdrant_api_key.clone(),
            collection: config.collection.clone(),
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        if let Some(key) = &self.api_key {
            builder = builder.header("api-key", key);
        }
        builder
    }

    async fn create_collection(&self, dimension: usize) -> Result<()> {
        let resp = self
            .request(
                reqwest::Method::PUT,
                &format!("/collections/{}", self.collection),
            )
            .json(&json!({
                "vectors": { "size": dimension, "distance": "Cosine" }
            }))
            .send()
            .await
            .context("Failed to create Qdrant collection")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Qdrant create collection returned {status}: {body}");
        }
        Ok(())
    }

    async fn drop_collection(&self) -> Result<()> {
        let resp = self
            .request(
                reqwest::Method::DELETE,
                &format!("/collections/{}", self.collection),
            )
            .send()
            .await
            .context("Failed to drop Qdrant collection")?;

        if !resp.status().is_success() {
            let status = resp.status();
            anyhow::bail!("Qdrant drop collection returned {status}");
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl VectorIndex for QdrantIndex {
    async fn ensure_collection(&self, dimension: usize) -> Result<()> {
        let resp = self
            .request(
                reqwest::Method::GET,
                &format!("/collections/{}", self.collection),
            )
            .send()
            .await
            .context("Failed to reach Qdrant")?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            tracing::info!("collection {} missing, creating", self.collection);
            return self.create_collection(dimension).await;
        }

        if !resp.status().is_success() {
            let status = resp.status();
            anyhow::bail!("Qdrant get collection returned {status}");
        }

        let info: CollectionInfoResponse = resp
            .json()
            .await
            .context("Failed to parse Qdrant collection info")?;

        let existing = info.result.config.params.vectors.size;
        if existing != dimension {
            // Destructive recreate. Only called at startup, before traffic.
            tracing::warn!(
                "collection {} has dimension {existing}, expected {dimension}; recreating",
                self.collection
            );
            self.drop_collection().await?;
            return self.create_collection(dimension).await;
        }

        tracing::info!("collection {} ready (dimension {dimension})", self.collection);
        Ok(())
    }

    async fn upsert(&self, record: &ImageRecord, vector: &[f32]) -> Result<()> {
        let resp = self
            .request(
                reqwest::Method::PUT,
                &format!("/collections/{}/points", self.collection),
            )
            .json(&json!({
                "points": [{
                    "id": record.id,
                    "vector": vector,
                    "payload": RecordPayload::from_record(record),
                }]
            }))
            .send()
            .await
            .context("Index unavailable during upsert")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Qdrant upsert returned {status}: {body}");
        }
        Ok(())
    }

    async fn search_by_vector(
        &self,
        vector: &[f32],
        limit: usize,
        min_score: Option<f32>,
    ) -> Result<Vec<ScoredRecord>> {
        let mut body = json!({
            "vector": vector,
            "limit": limit,
            "with_payload": true,
        });
        if let Some(floor) = min_score {
            body["score_threshold"] = json!(floor);
        }

        let resp = self
            .request(
                reqwest::Method::POST,
                &format!("/collections/{}/points/search", self.collection),
            )
            .json(&body)
            .send()
            .await
            .context("Index unavailable during search")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Qdrant search returned {status}: {body}");
        }

        let body: SearchResponseBody = resp
            .json()
            .await
            .context("Failed to parse Qdrant search response")?;

        Ok(body
            .result
            .into_iter()
            .filter_map(|p| {
                p.payload.map(|payload| ScoredRecord {
                    record: payload.into_record(p.id),
                    score: p.score,
                })
            })
            .collect())
    }

    async fn scroll_all(&self, limit: usize) -> Result<Vec<ImageRecord>> {
        let mut records = Vec::new();
        let mut offset: Option<serde_json::Value> = None;

        loop {
            let mut body = json!({
                "limit": SCROLL_PAGE.min(limit - records.len()),
                "with_payload": true,
            });
            if let Some(off) = &offset {
                body["offset"] = off.clone();
            }

            let resp = self
                .request(
                    reqwest::Method::POST,
                    &format!("/collections/{}/points/scroll", self.collection),
                )
                .json(&body)
                .send()
                .await
                .context("Index unavailable during scroll")?;

            if !resp.status().is_success() {
                let status = resp.status();
                anyhow::bail!("Qdrant scroll returned {status}");
            }

            let page: ScrollResponseBody = resp
                .json()
                .await
                .context("Failed to parse Qdrant scroll response")?;

            for point in page.result.points {
                if let Some(payload) = point.payload {
                    records.push(payload.into_record(point.id));
                }
            }

            match page.result.next_page_offset {
                Some(next) if records.len() < limit => offset = Some(next),
                _ => break,
            }
        }

        Ok(records)
    }

    async fn retrieve(&self, id: Uuid) -> Result<Option<ImageRecord>> {
        let resp = self
            .request(
                reqwest::Method::POST,
                &format!("/collections/{}/points", self.collection),
            )
            .json(&json!({ "ids": [id], "with_payload": true }))
            .send()
            .await
            .context("Index unavailable during retrieve")?;

        if !resp.status().is_success() {
            let status = resp.status();
            anyhow::bail!("Qdrant retrieve returned {status}");
        }

        let body: RetrieveResponseBody = resp
            .json()
            .await
            .context("Failed to parse Qdrant retrieve response")?;

        Ok(body
            .result
            .into_iter()
            .next()
            .and_then(|p| p.payload.map(|payload| payload.into_record(p.id))))
    }
}
