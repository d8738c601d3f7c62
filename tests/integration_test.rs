//! Integration tests for the upload and search flow.
//!
//! These exercise the full HTTP surface against the in-memory index with
//! scripted vision and embedding backends, so no model server is needed.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::routing::{get, post};
use axum::Router;
use chrono::Utc;
use http_body_util::BodyExt;
use tower::ServiceExt;
use uuid::Uuid;

use photo_lens::api;
use photo_lens::config::Config;
use photo_lens::embed::{Embedder, EmbedderChain};
use photo_lens::index::{MemoryIndex, QdrantIndex, VectorIndex};
use photo_lens::models::{AnnotationResult, ImageRecord};
use photo_lens::state::AppState;
use photo_lens::vision::{Annotator, VisionScorer};

/// Embedder returning a fixed vector, with a call counter for asserting
/// that the semantic stage was (or was not) reached.
struct FixedEmbedder {
    vector: Vec<f32>,
    calls: Arc<AtomicUsize>,
}

#[async_trait::async_trait]
impl Embedder for FixedEmbedder {
    async fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.vector.clone())
    }

    fn dimension(&self) -> usize {
        self.vector.len()
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}

/// Annotator returning a canned annotation, failing on one scripted call.
struct ScriptedAnnotator {
    annotation: AnnotationResult,
    fail_on_call: Option<usize>,
    calls: AtomicUsize,
}

#[async_trait::async_trait]
impl Annotator for ScriptedAnnotator {
    async fn annotate(&self, _image_bytes: &[u8]) -> anyhow::Result<AnnotationResult> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_on_call == Some(call) {
            anyhow::bail!("vision service unavailable");
        }
        Ok(self.annotation.clone())
    }
}

struct FixedScorer(f32);

#[async_trait::async_trait]
impl VisionScorer for FixedScorer {
    async fn relevance(&self, _image_bytes: &[u8], _query: &str) -> anyhow::Result<f32> {
        Ok(self.0)
    }
}

struct TestHarness {
    app: Router,
    index: Arc<MemoryIndex>,
    embed_calls: Arc<AtomicUsize>,
}

fn harness_with(annotation: AnnotationResult, fail_on_call: Option<usize>) -> TestHarness {
    let config = Config::default();
    let http_client = reqwest::Client::new();
    let index = Arc::new(MemoryIndex::new());
    let embed_calls = Arc::new(AtomicUsize::new(0));

    let embedder = Arc::new(EmbedderChain::new(vec![Box::new(FixedEmbedder {
        vector: vec![0.81, 0.5866],
        calls: embed_calls.clone(),
    })]));

    let state = AppState {
        config,
        http_client,
        index: index.clone(),
        embedder,
        annotator: Arc::new(ScriptedAnnotator {
            annotation,
            fail_on_call,
            calls: AtomicUsize::new(0),
        }),
        vision_scorer: Arc::new(FixedScorer(0.9)),
    };

    TestHarness {
        app: router(state),
        index,
        embed_calls,
    }
}

fn harness() -> TestHarness {
    harness_with(AnnotationResult::default(), None)
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/images", post(api::images::upload_images))
        .route("/images/{id}", get(api::images::serve_image))
        .route("/search", post(api::search::search))
        .route("/health", get(api::health::health))
        .with_state(state)
}

fn record(labels: &[&str], entities: &[&str], texts: &[&str]) -> ImageRecord {
    ImageRecord {
        id: Uuid::new_v4(),
        filename: "photo.jpg".to_string(),
        labels: labels.iter().map(|s| s.to_string()).collect(),
        entities: entities.iter().map(|s| s.to_string()).collect(),
        texts: texts.iter().map(|s| s.to_string()).collect(),
        created_at: Utc::now(),
        image_data: None,
    }
}

async fn post_search(app: Router, text: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .oneshot(
            Request::post("/search")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    serde_json::json!({ "text": text }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&body).unwrap())
}

/// Multipart body with `count` image parts named "files".
fn multipart_body(count: usize) -> (String, Vec<u8>) {
    let boundary = "XBOUNDARYX";
    let mut body = Vec::new();
    for i in 0..count {
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"files\"; filename=\"photo{i}.jpg\"\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: image/jpeg\r\n\r\n");
        body.extend_from_slice(&[0xFF, 0xD8, 0xFF, 0xE0, i as u8]);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    (format!("multipart/form-data; boundary={boundary}"), body)
}

#[tokio::test]
async fn test_health_endpoint() {
    let h = harness();
    let response = h
        .app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "healthy");
}

#[tokio::test]
async fn test_name_query_ranks_exact_entity_first() {
    let h = harness();
    h.index
        .upsert(&record(&["person"], &["akshay kumar"], &[]), &[1.0, 0.0])
        .await
        .unwrap();
    h.index
        .upsert(&record(&["person"], &["salman khan"], &[]), &[0.0, 1.0])
        .await
        .unwrap();

    let (status, json) = post_search(h.app, "akshay kumar").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["count"], 1);

    let top = &json["results"][0];
    assert_eq!(top["rank"], 1);
    assert_eq!(top["match_type"], "exact_entity");
    assert_eq!(top["entities"][0], "akshay kumar");
    assert!((top["score"].as_f64().unwrap() - 0.98).abs() < 1e-6);
    assert_eq!(top["reason"], "Recognized name match: 98.0%");

    // Name-shaped query: semantic stage must not run.
    assert_eq!(h.embed_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_object_query_falls_through_to_vector_similarity() {
    let h = harness();
    // Stored at [1, 0]; the scripted query embedding is [0.81, 0.5866],
    // putting the cosine at 0.81.
    h.index
        .upsert(&record(&["car"], &[], &[]), &[1.0, 0.0])
        .await
        .unwrap();
    h.index
        .upsert(&record(&["house"], &[], &[]), &[0.0, 1.0])
        .await
        .unwrap();

    let (status, json) = post_search(h.app, "vehicle").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 2);
    assert_eq!(h.embed_calls.load(Ordering::SeqCst), 1);

    let top = &json["results"][0];
    assert_eq!(top["match_type"], "vector_similarity");
    assert_eq!(top["labels"][0], "car");
    let score = top["score"].as_f64().unwrap();
    assert!((score - 0.81).abs() < 0.01, "unexpected score {score}");
    // Second hit is the weaker direction, still above the 0.3 floor.
    assert!(json["results"][1]["score"].as_f64().unwrap() < score);
}

#[tokio::test]
async fn test_enough_entity_matches_skip_semantic_stage() {
    let h = harness();
    let names = ["amitabh bachchan", "salman khan", "shah rukh khan", "aamir khan", "akshay kumar"];
    for (i, name) in names.iter().enumerate() {
        h.index
            .upsert(&record(&["person"], &[name], &[]), &[i as f32, 1.0])
            .await
            .unwrap();
    }

    let (status, json) = post_search(h.app, "celebrity").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 5);
    for result in json["results"].as_array().unwrap() {
        assert_eq!(result["match_type"], "entity_group");
    }
    assert_eq!(h.embed_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_no_match_returns_success_with_empty_results() {
    let h = harness();
    for _ in 0..20 {
        h.index
            .upsert(&record(&["tree"], &[], &[]), &[1.0, 0.0])
            .await
            .unwrap();
    }

    // Name-shaped, so no semantic fallback; nothing overlaps "john doe".
    let (status, json) = post_search(h.app, "john doe").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["count"], 0);
    assert_eq!(json["results"].as_array().unwrap().len(), 0);
    assert_eq!(json["show_similar_results"], false);
}

#[tokio::test]
async fn test_empty_search_text_is_rejected() {
    let h = harness();
    let (status, json) = post_search(h.app, "   ").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn test_upload_batch_counts_failed_file_and_continues() {
    let annotation = AnnotationResult {
        labels: vec!["car".to_string(), "road".to_string()],
        entities: vec![],
        text: vec![],
    };
    // Third file's annotation call fails; the batch must finish anyway.
    let h = harness_with(annotation, Some(2));

    let (content_type, body) = multipart_body(5);
    let response = h
        .app
        .oneshot(
            Request::post("/images")
                .header(header::CONTENT_TYPE, content_type)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["success"], true);
    assert_eq!(json["total_processed"], 4);
    assert_eq!(json["total_failed"], 1);
    assert_eq!(h.index.entry_count(), 4);
}

#[tokio::test]
async fn test_upload_then_serve_image_bytes() {
    let h = harness_with(
        AnnotationResult {
            labels: vec!["sunset".to_string()],
            entities: vec![],
            text: vec![],
        },
        None,
    );

    let (content_type, body) = multipart_body(1);
    let response = h
        .app
        .clone()
        .oneshot(
            Request::post("/images")
                .header(header::CONTENT_TYPE, content_type)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let upload_body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&upload_body).unwrap();
    let id = json["results"][0]["id"].as_str().unwrap().to_string();

    let response = h
        .app
        .oneshot(
            Request::get(format!("/images/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "image/jpeg"
    );
    assert_eq!(
        response.headers()[header::CACHE_CONTROL],
        "public, max-age=86400"
    );
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..4], &[0xFF, 0xD8, 0xFF, 0xE0]);
}

#[tokio::test]
async fn test_serve_unknown_image_is_404() {
    let h = harness();
    let response = h
        .app
        .oneshot(
            Request::get(format!("/images/{}", Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_empty_upload_batch_is_rejected() {
    let h = harness();
    let (content_type, body) = multipart_body(0);
    let response = h
        .app
        .oneshot(
            Request::post("/images")
                .header(header::CONTENT_TYPE, content_type)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

/// An unreachable vector index degrades search to an empty result set
/// instead of a 5xx.
#[tokio::test]
async fn test_search_degrades_gracefully_when_index_is_down() {
    let mut config = Config::default();
    config.index.qdrant_url = Some("http://127.0.0.1:9".to_string());
    let http_client = reqwest::Client::builder()
        .connect_timeout(std::time::Duration::from_millis(500))
        .build()
        .unwrap();

    let index: Arc<dyn VectorIndex> = Arc::new(QdrantIndex::new(
        http_client.clone(),
        &config.index,
        "http://127.0.0.1:9".to_string(),
    ));
    let state = AppState {
        config,
        http_client,
        index,
        embedder: Arc::new(EmbedderChain::new(vec![Box::new(FixedEmbedder {
            vector: vec![1.0, 0.0],
            calls: Arc::new(AtomicUsize::new(0)),
        })])),
        annotator: Arc::new(ScriptedAnnotator {
            annotation: AnnotationResult::default(),
            fail_on_call: None,
            calls: AtomicUsize::new(0),
        }),
        vision_scorer: Arc::new(FixedScorer(0.9)),
    };

    let (status, json) = post_search(router(state), "beach sunset photos").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["count"], 0);
}
