use axum::Json;
use serde_json::{json, Value};

/// GET /health - liveness only, no dependency checks.
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "photo-lens",
        "timestamp": chrono::Utc::now(),
    }))
}
