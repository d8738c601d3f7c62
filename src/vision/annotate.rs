//! Image annotation: one vision call per upload, returning object labels,
//! recognized person names, and OCR text as strict JSON.

use anyhow::{Context, Result};
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::config::VisionConfig;
use crate::models::AnnotationResult;

const ANNOTATE_PROMPT: &str = "Analyze this photo. Respond with ONLY a JSON object:\n\
    {\"labels\": [up to 10 lowercase object/scene tags], \
    \"entities\": [full names of any recognizable public figures, lowercase, or empty], \
    \"text\": [any readable text in the image, lowercase, or empty]}\n\
    No explanation.";

/// Capability seam for annotation. A transport or API failure is an error
/// (the caller reports that file as failed and continues the batch); a
/// response the implementation cannot interpret degrades to an empty
/// annotation instead.
#[async_trait::async_trait]
pub trait Annotator: Send + Sync {
    async fn annotate(&self, image_bytes: &[u8]) -> Result<AnnotationResult>;
}

pub struct HttpAnnotator {
    client: reqwest::Client,
    config: VisionConfig,
}

impl HttpAnnotator {
    pub fn new(client: reqwest::Client, config: VisionConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait::async_trait]
impl Annotator for HttpAnnotator {
    async fn annotate(&self, image_bytes: &[u8]) -> Result<AnnotationResult> {
        let response = call_vision_chat(
            &self.client,
            &self.config,
            ANNOTATE_PROMPT,
            image_bytes,
        )
        .await?;

        Ok(parse_annotation(&response))
    }
}

fn parse_annotation(content: &str) -> AnnotationResult {
    // Extract the JSON object from the response; models wrap it in prose
    // or code fences often enough that a direct parse is not reliable.
    if let Some(start) = content.find('{') {
        if let Some(end) = content.rfind('}') {
            if let Ok(parsed) = serde_json::from_str::<AnnotationResult>(&content[start..=end]) {
                return parsed;
            }
        }
    }

    tracing::warn!("unparseable annotation response, treating as empty: {content}");
    AnnotationResult::default()
}

// ─── OpenAI-compatible vision chat ───────────────────────

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: Vec<ContentPart>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

pub(crate) async fn call_vision_chat(
    client: &reqwest::Client,
    config: &VisionConfig,
    prompt: &str,
    image_bytes: &[u8],
) -> Result<String> {
    let url = format!("{}/v1/chat/completions", config.base_url);
    let api_key = config.api_key.as_deref().unwrap_or_default();

    let data_url = format!(
        "data:image/jpeg;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(image_bytes)
    );

    let req = ChatRequest {
        model: config.model.clone(),
        messages: vec![ChatMessage {
            role: "user".to_string(),
            content: vec![
                ContentPart::Text {
                    text: prompt.to_string(),
                },
                ContentPart::ImageUrl {
                    image_url: ImageUrl { url: data_url },
                },
            ],
        }],
        temperature: 0.0,
        max_tokens: 300,
    };

    let resp = client
        .post(&url)
        .header("Authorization", format!("Bearer {api_key}"))
        .timeout(std::time::Duration::from_secs(config.timeout_secs))
        .json(&req)
        .send()
        .await
        .context("Failed to call vision API")?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("Vision API returned {status}: {body}");
    }

    let body: ChatResponse = resp
        .json()
        .await
        .context("Failed to parse vision API response")?;

    Ok(body
        .choices
        .into_iter()
        .next()
        .map(|c| c.message.content)
        .unwrap_or_default())
}
