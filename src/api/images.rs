use axum::extract::{Multipart, Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use base64::Engine;
use chrono::Utc;
use uuid::Uuid;

use crate::error::ApiError;
use crate::features;
use crate::index::VectorIndex;
use crate::models::{ImageRecord, UploadResponse, UploadedImage};
use crate::state::AppState;
use crate::vision::Annotator;

/// POST /images - multipart batch upload. Each file runs through
/// annotate → normalize → embed → upsert independently; one file's failure
/// is counted and the batch continues.
pub async fn upload_images(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut processed = 0usize;
    let mut failed = 0usize;
    let mut results: Vec<UploadedImage> = Vec::new();
    let mut seen_any = false;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::InvalidInput(format!("Malformed multipart body: {e}")))?
    {
        if processed + failed >= state.config.max_upload_files {
            tracing::warn!("upload batch cap {} reached, ignoring remaining files", state.config.max_upload_files);
            break;
        }

        let filename = field
            .file_name()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "upload.jpg".to_string());

        let bytes = match field.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("failed reading upload field {filename}: {e}");
                failed += 1;
                continue;
            }
        };
        seen_any = true;

        if bytes.is_empty() {
            tracing::warn!("empty upload {filename}");
            failed += 1;
            continue;
        }

        match process_image(&state, &filename, &bytes).await {
            Ok(uploaded) => {
                processed += 1;
                if results.len() < 5 {
                    results.push(uploaded);
                }
            }
            Err(e) => {
                tracing::warn!("failed to process {filename}: {e:#}");
                failed += 1;
            }
        }
    }

    if !seen_any && failed == 0 {
        return Err(ApiError::InvalidInput("No images uploaded".to_string()));
    }

    tracing::info!("upload batch complete: {processed} processed, {failed} failed");

    Ok(Json(UploadResponse {
        success: true,
        message: format!("Processed {processed} images successfully, {failed} failed"),
        total_processed: processed,
        total_failed: failed,
        results,
    }))
}

/// One file's ingestion path. Annotation transport failure fails the file;
/// the embedder chain only fails once every fallback is exhausted.
async fn process_image(
    state: &AppState,
    filename: &str,
    bytes: &[u8],
) -> anyhow::Result<UploadedImage> {
    let annotation = state.annotator.annotate(bytes).await?;
    let normalized = features::normalize(&annotation);

    let embedding = state.embedder.embed(&normalized.description()).await?;

    let record = ImageRecord {
        id: Uuid::new_v4(),
        filename: filename.to_string(),
        labels: normalized.labels,
        entities: normalized.entities,
        texts: normalized.texts,
        created_at: Utc::now(),
        image_data: Some(base64::engine::general_purpose::STANDARD.encode(bytes)),
    };

    state.index.upsert(&record, &embedding).await?;
    tracing::info!("stored {} as {}", filename, record.id);

    Ok(UploadedImage {
        id: record.id,
        filename: record.filename,
        labels: record.labels,
        entities: record.entities,
        texts: record.texts,
    })
}

/// GET /images/{id} - byte-serving of the stored image payload.
pub async fn serve_image(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let record = state
        .index
        .retrieve(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Image not found".to_string()))?;

    let data = record
        .image_data
        .ok_or_else(|| ApiError::NotFound("Image data not stored".to_string()))?;

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(data)
        .map_err(|e| anyhow::anyhow!("corrupt stored image payload: {e}"))?;

    Ok((
        [
            (header::CONTENT_TYPE, sniff_content_type(&bytes)),
            (header::CACHE_CONTROL, "public, max-age=86400"),
        ],
        bytes,
    )
        .into_response())
}

/// JPEG/PNG magic-byte sniff; anything else is served as JPEG, matching
/// what mobile galleries overwhelmingly send.
fn sniff_content_type(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
        "image/png"
    } else {
        "image/jpeg"
    }
}
