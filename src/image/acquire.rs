//! Input acquisition: the uploaded door photo and the catalog reference image.

use crate::error::{LockVizError, Result};
use crate::image::types::{DataUrl, ImageFormat, ImagePayload, DEFAULT_MIME_TYPE};
use async_trait::async_trait;
use std::path::Path;

/// Reads a local door photo into a data URL.
pub async fn read_door_image(path: impl AsRef<Path>) -> Result<DataUrl> {
    let path = path.as_ref();
    let bytes = tokio::fs::read(path).await?;
    if bytes.is_empty() {
        return Err(LockVizError::InvalidRequest(format!(
            "door image is empty: {}",
            path.display()
        )));
    }
    let mime = detect_mime(&bytes, path);
    tracing::debug!(path = %path.display(), mime, size = bytes.len(), "read door image");
    Ok(DataUrl::from_bytes(mime, &bytes))
}

/// Guesses a MIME type from content, then from the file extension.
fn detect_mime(bytes: &[u8], path: &Path) -> &'static str {
    ImageFormat::from_magic_bytes(bytes)
        .or_else(|| {
            path.extension()
                .and_then(|e| e.to_str())
                .and_then(ImageFormat::from_extension)
        })
        .map(|f| f.mime_type())
        .unwrap_or(DEFAULT_MIME_TYPE)
}

/// Source of lock reference images.
#[async_trait]
pub trait ReferenceFetcher: Send + Sync {
    /// Fetches the image at `url` as a base64 payload with its origin MIME type.
    async fn fetch(&self, url: &str) -> Result<ImagePayload>;
}

/// Fetches reference images over HTTP, from `data:` URLs, or from disk.
#[derive(Debug, Clone, Default)]
pub struct HttpReferenceFetcher {
    client: reqwest::Client,
}

impl HttpReferenceFetcher {
    /// Creates a fetcher with a default HTTP client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a fetcher sharing an existing HTTP client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn fetch_http(&self, url: &str) -> Result<ImagePayload> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LockVizError::ReferenceFetch(format!(
                "HTTP {} from {url}",
                status.as_u16()
            )));
        }

        let header_mime = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or_default().trim().to_string())
            .filter(|v| v.starts_with("image/"));

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(LockVizError::ReferenceFetch(format!("empty body from {url}")));
        }

        let mime = header_mime.unwrap_or_else(|| {
            ImageFormat::from_magic_bytes(&bytes)
                .map(|f| f.mime_type())
                .unwrap_or(DEFAULT_MIME_TYPE)
                .to_string()
        });
        Ok(ImagePayload::from_bytes(mime, &bytes))
    }

    async fn fetch_file(&self, path: &Path) -> Result<ImagePayload> {
        let bytes = tokio::fs::read(path).await?;
        if bytes.is_empty() {
            return Err(LockVizError::ReferenceFetch(format!(
                "empty file {}",
                path.display()
            )));
        }
        Ok(ImagePayload::from_bytes(detect_mime(&bytes, path), &bytes))
    }

    async fn fetch_impl(&self, url: &str) -> Result<ImagePayload> {
        if url.starts_with("data:") {
            return Ok(DataUrl::parse(url)?.to_payload());
        }
        if url.starts_with("http://") || url.starts_with("https://") {
            return self.fetch_http(url).await;
        }
        let path = url.strip_prefix("file://").unwrap_or(url);
        self.fetch_file(Path::new(path)).await
    }
}

#[async_trait]
impl ReferenceFetcher for HttpReferenceFetcher {
    async fn fetch(&self, url: &str) -> Result<ImagePayload> {
        match self.fetch_impl(url).await {
            Ok(payload) => {
                tracing::debug!(url, mime = %payload.mime_type, "fetched lock reference image");
                Ok(payload)
            }
            Err(e @ LockVizError::ReferenceFetch(_)) => Err(e),
            Err(e) => Err(LockVizError::ReferenceFetch(e.to_string())),
        }
    }
}
