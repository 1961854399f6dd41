//! Gemini (Google) image editing provider.

use crate::error::{parse_retry_after, sanitize_error_message, LockVizError, Result};
use crate::image::prompt::EditRequest;
use crate::image::provider::ImageEditor;
use crate::image::types::{GeneratedImage, GenerationMetadata, ImagePayload, DEFAULT_MIME_TYPE};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "GOOGLE_API_KEY";

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini image model variants.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum GeminiModel {
    /// Nano Banana - Gemini 2.5 Flash Image (fast, economical).
    #[default]
    NanoBanana,
    /// Nano Banana Pro - Gemini 3 Pro Image (highest quality).
    NanoBananaPro,
    /// Any other model id accepted by `generateContent`.
    Custom(String),
}

impl GeminiModel {
    /// Returns the API model identifier.
    pub fn as_str(&self) -> &str {
        match self {
            Self::NanoBanana => "gemini-2.5-flash-image",
            Self::NanoBananaPro => "nano-banana-pro-preview",
            Self::Custom(id) => id,
        }
    }

    /// Maps a model id to a known variant, or wraps it as custom.
    pub fn from_id(id: &str) -> Self {
        match id {
            "gemini-2.5-flash-image" => Self::NanoBanana,
            "nano-banana-pro-preview" => Self::NanoBananaPro,
            other => Self::Custom(other.to_string()),
        }
    }
}

/// Builder for GeminiProvider.
#[derive(Debug, Clone, Default)]
pub struct GeminiProviderBuilder {
    api_key: Option<String>,
    model: GeminiModel,
    base_url: Option<String>,
    timeout: Option<Duration>,
    client: Option<reqwest::Client>,
}

impl GeminiProviderBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key. Falls back to `GOOGLE_API_KEY` env var.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the Gemini model variant.
    pub fn model(mut self, model: GeminiModel) -> Self {
        self.model = model;
        self
    }

    /// Overrides the API base URL (proxies, regional endpoints).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets a transport-level timeout on every HTTP request.
    ///
    /// Ignored when a client is supplied with [`Self::http_client`].
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Uses an existing HTTP client instead of building one.
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Builds the provider, resolving the API key.
    ///
    /// Fails with [`LockVizError::Config`] before any network activity if no
    /// non-blank key is available.
    pub fn build(self) -> Result<GeminiProvider> {
        let api_key = self
            .api_key
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                LockVizError::Config(format!(
                    "{API_KEY_ENV} not set and no API key provided"
                ))
            })?;

        let client = match self.client {
            Some(client) => client,
            None => {
                let mut client = reqwest::Client::builder();
                if let Some(timeout) = self.timeout {
                    client = client.timeout(timeout);
                }
                client.build()?
            }
        };

        Ok(GeminiProvider {
            client,
            api_key,
            model: self.model,
            base_url: self
                .base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
        })
    }
}

/// Gemini image editing provider.
pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    model: GeminiModel,
    base_url: String,
}

impl GeminiProvider {
    /// Creates a new `GeminiProviderBuilder`.
    pub fn builder() -> GeminiProviderBuilder {
        GeminiProviderBuilder::new()
    }

    /// Returns the configured model.
    pub fn model(&self) -> &GeminiModel {
        &self.model
    }

    async fn edit_impl(&self, request: &EditRequest) -> Result<GeneratedImage> {
        let start = Instant::now();

        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url,
            self.model.as_str(),
        );

        let body = GeminiRequest::from_edit_request(request);

        tracing::debug!(
            model = self.model.as_str(),
            lock_id = %request.lock_id,
            "submitting Gemini edit request"
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let text = response.text().await.unwrap_or_default();
            return Err(parse_error(status.as_u16(), &text, &headers));
        }

        let gemini_response: GeminiResponse = response.json().await?;
        let inline = extract_inline_image(gemini_response)?;

        let duration_ms = start.elapsed().as_millis() as u64;

        tracing::debug!(
            lock_id = %request.lock_id,
            duration_ms,
            encoded_len = inline.data.len(),
            "Gemini edit complete"
        );

        Ok(GeneratedImage::new(
            inline.data,
            inline.mime_type,
            GenerationMetadata {
                model: Some(self.model.as_str().to_string()),
                lock_id: Some(request.lock_id.clone()),
                duration_ms: Some(duration_ms),
            },
        ))
    }
}

/// Finds the first inline image among the first candidate's parts.
fn extract_inline_image(response: GeminiResponse) -> Result<InlineData> {
    // Prompt blocks come back as HTTP 200
    if let Some(ref feedback) = response.prompt_feedback {
        if let Some(ref reason) = feedback.block_reason {
            let msg = feedback
                .block_reason_message
                .clone()
                .unwrap_or_else(|| format!("Prompt blocked: {}", reason));
            return Err(LockVizError::ContentBlocked(msg));
        }
    }

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| LockVizError::EmptyResult("no candidates in Gemini response".into()))?;

    if let Some(ref finish_reason) = candidate.finish_reason {
        match finish_reason.as_str() {
            "SAFETY"
            | "IMAGE_SAFETY"
            | "IMAGE_PROHIBITED_CONTENT"
            | "IMAGE_RECITATION"
            | "RECITATION"
            | "PROHIBITED_CONTENT"
            | "BLOCKLIST" => {
                return Err(LockVizError::ContentBlocked(format!(
                    "Content blocked by Gemini safety filter: {}",
                    finish_reason
                )));
            }
            "IMAGE_OTHER" | "NO_IMAGE" => {
                return Err(LockVizError::EmptyResult(format!(
                    "generation finished with {}",
                    finish_reason
                )));
            }
            _ => {} // STOP, MAX_TOKENS, etc. are normal
        }
    }

    let mut inline = candidate
        .content
        .map(|c| c.parts)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|p| p.inline_data)
        .find(|inline| !inline.data.trim().is_empty())
        .ok_or_else(|| LockVizError::EmptyResult("no image data in Gemini response".into()))?;

    if inline.mime_type.trim().is_empty() {
        inline.mime_type = DEFAULT_MIME_TYPE.to_string();
    }
    Ok(inline)
}

fn parse_error(status: u16, text: &str, headers: &reqwest::header::HeaderMap) -> LockVizError {
    let text = sanitize_error_message(text);
    if status == 429 {
        let retry_after = parse_retry_after(headers).map(Duration::from_secs);
        return LockVizError::RateLimited { retry_after };
    }
    if status == 401 || status == 403 {
        return LockVizError::Auth(text);
    }
    if status == 404 {
        return LockVizError::InvalidRequest(
            "Model not found. Verify the model name is correct.".into(),
        );
    }
    let lower = text.to_lowercase();
    if status == 400 && lower.contains("api key not valid") {
        return LockVizError::Auth(text);
    }
    if lower.contains("safety")
        || lower.contains("blocked")
        || lower.contains("content_policy")
        || lower.contains("prohibited")
    {
        return LockVizError::ContentBlocked(text);
    }
    LockVizError::Api {
        status,
        message: text,
    }
}

#[async_trait]
impl ImageEditor for GeminiProvider {
    async fn edit(&self, request: &EditRequest) -> Result<GeneratedImage> {
        self.edit_impl(request).await
    }

    fn name(&self) -> &str {
        "Gemini (Google)"
    }

    async fn health_check(&self) -> Result<()> {
        let url = format!("{}/models/{}", self.base_url, self.model.as_str());

        let response = self
            .client
            .get(&url)
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await?;

        match response.status().as_u16() {
            401 | 403 => Err(LockVizError::Auth("Invalid API key".into())),
            404 => Err(LockVizError::InvalidRequest(
                "Model not found. Verify the model name is correct.".into(),
            )),
            429 => Err(LockVizError::RateLimited { retry_after: None }),
            s if !(200..300).contains(&s) => Err(LockVizError::Api {
                status: s,
                message: "Health check failed".into(),
            }),
            _ => Ok(()),
        }
    }
}

// Request/Response types
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GeminiConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiRequestPart>,
}

/// A part in a Gemini request - can be text or inline image data.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GeminiRequestPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

impl From<&ImagePayload> for GeminiRequestPart {
    fn from(payload: &ImagePayload) -> Self {
        Self::InlineData {
            inline_data: InlineData {
                mime_type: payload.mime_type.clone(),
                data: payload.data.clone(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiConfig {
    response_modalities: Vec<String>,
}

impl GeminiRequest {
    fn from_edit_request(req: &EditRequest) -> Self {
        let parts = vec![
            GeminiRequestPart::from(&req.door),
            GeminiRequestPart::from(&req.reference),
            GeminiRequestPart::Text {
                text: req.instruction.clone(),
            },
        ];

        Self {
            contents: vec![GeminiContent { parts }],
            generation_config: GeminiConfig {
                response_modalities: vec!["IMAGE".to_string()],
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContentResponse>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
    #[serde(default)]
    block_reason_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiContentResponse {
    #[serde(default)]
    parts: Vec<GeminiPartResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPartResponse {
    #[serde(default)]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    data: String,
}
