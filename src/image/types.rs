//! Core image types: formats, base64 payloads, data URLs and results.

use crate::error::{LockVizError, Result};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// MIME type assumed when nothing better is known.
pub const DEFAULT_MIME_TYPE: &str = "image/png";

/// Supported image formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// PNG format (lossless).
    #[default]
    Png,
    /// JPEG format (lossy).
    Jpeg,
    /// WebP format (modern, efficient).
    WebP,
}

impl ImageFormat {
    /// Returns the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::WebP => "webp",
        }
    }

    /// Returns the MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
        }
    }

    /// Attempts to detect format from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "webp" => Some(Self::WebP),
            _ => None,
        }
    }

    /// Maps a MIME type (parameters ignored) to a format.
    pub fn from_mime_type(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or_default().trim();
        match essence.to_ascii_lowercase().as_str() {
            "image/png" => Some(Self::Png),
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/webp" => Some(Self::WebP),
            _ => None,
        }
    }

    /// Detects image format from magic bytes.
    pub fn from_magic_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < 12 {
            return None;
        }

        // PNG: 89 50 4E 47 0D 0A 1A 0A
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
            return Some(Self::Png);
        }

        // JPEG: FF D8 FF
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(Self::Jpeg);
        }

        // WebP: RIFF....WEBP
        if data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
            return Some(Self::WebP);
        }

        None
    }
}

/// Decodes base64 that may carry a data URL prefix, whitespace or no padding.
pub(crate) fn decode_base64_lenient(input: &str) -> Result<Vec<u8>> {
    let b64 = match input.find(";base64,") {
        Some(pos) => &input[pos + 8..],
        None => input,
    };

    let cleaned: String = b64.chars().filter(|c| !c.is_ascii_whitespace()).collect();

    if let Ok(data) = base64::engine::general_purpose::STANDARD.decode(&cleaned) {
        return Ok(data);
    }

    base64::engine::general_purpose::STANDARD_NO_PAD
        .decode(cleaned.trim_end_matches('='))
        .map_err(|e| LockVizError::Decode(e.to_string()))
}

/// A base64-encoded image together with its MIME type.
///
/// This is the shape images take inside a generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    /// MIME type, e.g. `image/jpeg`.
    pub mime_type: String,
    /// Base64 of the image bytes, without any data URL prefix.
    pub data: String,
}

impl ImagePayload {
    /// Creates a payload from already-encoded base64 text.
    pub fn new(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    /// Encodes raw bytes.
    pub fn from_bytes(mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self::new(
            mime_type,
            base64::engine::general_purpose::STANDARD.encode(bytes),
        )
    }

    /// Decodes the payload back into raw bytes.
    pub fn decode(&self) -> Result<Vec<u8>> {
        decode_base64_lenient(&self.data)
    }

    /// Returns the payload as a data URL.
    pub fn to_data_url(&self) -> DataUrl {
        DataUrl(format!("data:{};base64,{}", self.mime_type, self.data).into())
    }
}

/// A `data:<mime>;base64,<payload>` string usable directly as an image source.
///
/// Clones share one buffer, so snapshots holding images stay cheap to copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DataUrl(Arc<str>);

impl DataUrl {
    /// Validates and wraps a data URL string.
    pub fn parse(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        let (prefix, _) = raw
            .split_once(',')
            .ok_or_else(|| LockVizError::Decode("data URL has no ',' separator".into()))?;
        if !prefix.starts_with("data:") {
            return Err(LockVizError::Decode(
                "data URL must start with 'data:'".into(),
            ));
        }
        if !prefix.ends_with(";base64") {
            return Err(LockVizError::Decode("data URL is not base64".into()));
        }
        Ok(Self(raw.into()))
    }

    /// Encodes raw bytes as a data URL.
    pub fn from_bytes(mime_type: &str, bytes: &[u8]) -> Self {
        ImagePayload::from_bytes(mime_type, bytes).to_data_url()
    }

    /// Returns the full data URL string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the MIME type declared in the prefix.
    pub fn mime_type(&self) -> &str {
        let (prefix, _) = self.split();
        let mime = prefix
            .trim_start_matches("data:")
            .split(';')
            .next()
            .unwrap_or_default();
        if mime.is_empty() {
            DEFAULT_MIME_TYPE
        } else {
            mime
        }
    }

    /// Returns the base64 text after the first comma.
    pub fn payload(&self) -> &str {
        self.split().1
    }

    /// Splits into an owned request payload.
    pub fn to_payload(&self) -> ImagePayload {
        ImagePayload::new(self.mime_type(), self.payload())
    }

    /// Decodes the embedded bytes.
    pub fn decode(&self) -> Result<Vec<u8>> {
        decode_base64_lenient(self.payload())
    }

    fn split(&self) -> (&str, &str) {
        // Validated in `parse`; every constructor goes through a ',' form.
        self.0.split_once(',').unwrap_or(("", &self.0))
    }
}

impl std::fmt::Display for DataUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for DataUrl {
    type Error = LockVizError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(value)
    }
}

impl From<DataUrl> for String {
    fn from(value: DataUrl) -> Self {
        value.0.to_string()
    }
}

/// Splits either a full data URL or bare base64 text into a payload.
///
/// Bare text (no comma) is taken as base64 of an image of the default type.
pub fn payload_from_lenient(raw: &str) -> ImagePayload {
    match DataUrl::parse(raw) {
        Ok(url) => url.to_payload(),
        Err(_) => match raw.split_once(',') {
            Some((_, data)) => ImagePayload::new(DEFAULT_MIME_TYPE, data),
            None => ImagePayload::new(DEFAULT_MIME_TYPE, raw),
        },
    }
}

/// Metadata about the generation process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationMetadata {
    /// Model used for generation.
    pub model: Option<String>,
    /// Catalog id of the lock that was composited.
    pub lock_id: Option<String>,
    /// Generation duration in milliseconds.
    pub duration_ms: Option<u64>,
}

/// A generated preview image with its data and metadata.
#[derive(Debug, Clone)]
#[must_use = "generated image should be saved or processed"]
pub struct GeneratedImage {
    /// Base64 image data exactly as the remote service returned it.
    pub data: String,
    /// MIME type declared by the remote service.
    pub mime_type: String,
    /// Generation metadata.
    pub metadata: GenerationMetadata,
}

impl GeneratedImage {
    /// Creates a new generated image from base64 text.
    pub fn new(
        data: impl Into<String>,
        mime_type: impl Into<String>,
        metadata: GenerationMetadata,
    ) -> Self {
        Self {
            data: data.into(),
            mime_type: mime_type.into(),
            metadata,
        }
    }

    /// Decodes the image bytes.
    pub fn decode(&self) -> Result<Vec<u8>> {
        decode_base64_lenient(&self.data)
    }

    /// Returns the image as a data URL carrying the returned base64 verbatim.
    pub fn to_data_url(&self) -> DataUrl {
        ImagePayload::new(self.mime_type.clone(), self.data.clone()).to_data_url()
    }
}

/// Picks a file extension for an image: known MIME types first, then the
/// MIME subtype, then magic bytes, then `png`.
pub fn file_extension(mime_type: &str, bytes: &[u8]) -> String {
    if let Some(format) = ImageFormat::from_mime_type(mime_type) {
        return format.extension().to_string();
    }
    let essence = mime_type.split(';').next().unwrap_or_default().trim();
    let subtype = essence
        .strip_prefix("image/")
        .map(|s| s.split('+').next().unwrap_or_default().to_ascii_lowercase())
        .filter(|s| !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric()));
    if let Some(subtype) = subtype {
        return subtype;
    }
    ImageFormat::from_magic_bytes(bytes)
        .unwrap_or_default()
        .extension()
        .to_string()
}

/// Builds the download file name for a preview: `<prefix>-preview-<millis>.<ext>`.
pub fn preview_file_name(prefix: &str, unix_millis: u128, extension: &str) -> String {
    format!("{prefix}-preview-{unix_millis}.{extension}")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: [u8; 12] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
    const JPEG_MAGIC: [u8; 12] = [0xFF, 0xD8, 0xFF, 0xE0, 0, 0, 0, 0, 0, 0, 0, 0];
    const WEBP_MAGIC: [u8; 12] = *b"RIFF\x00\x00\x00\x00WEBP";

    #[test]
    fn test_format_from_magic_bytes() {
        assert_eq!(
            ImageFormat::from_magic_bytes(&PNG_MAGIC),
            Some(ImageFormat::Png)
        );
        assert_eq!(
            ImageFormat::from_magic_bytes(&JPEG_MAGIC),
            Some(ImageFormat::Jpeg)
        );
        assert_eq!(
            ImageFormat::from_magic_bytes(&WEBP_MAGIC),
            Some(ImageFormat::WebP)
        );
        assert_eq!(ImageFormat::from_magic_bytes(b"short"), None);
    }

    #[test]
    fn test_format_from_mime_type() {
        assert_eq!(
            ImageFormat::from_mime_type("image/jpeg"),
            Some(ImageFormat::Jpeg)
        );
        assert_eq!(
            ImageFormat::from_mime_type("image/png; charset=binary"),
            Some(ImageFormat::Png)
        );
        assert_eq!(ImageFormat::from_mime_type("text/html"), None);
    }

    #[test]
    fn test_data_url_splits_on_first_comma() {
        let url = DataUrl::parse("data:image/jpeg;base64,QUJD,extra").unwrap();
        assert_eq!(url.mime_type(), "image/jpeg");
        assert_eq!(url.payload(), "QUJD,extra");
    }

    #[test]
    fn test_data_url_rejects_malformed() {
        assert!(DataUrl::parse("QUJD").is_err());
        assert!(DataUrl::parse("image/png;base64,QUJD").is_err());
        assert!(DataUrl::parse("data:text/plain,hello").is_err());
    }

    #[test]
    fn test_data_url_missing_mime_defaults_to_png() {
        let url = DataUrl::parse("data:;base64,QUJD").unwrap();
        assert_eq!(url.mime_type(), DEFAULT_MIME_TYPE);
    }

    #[test]
    fn test_byte_exact_round_trip() {
        let bytes: Vec<u8> = (0..=255).collect();
        let url = DataUrl::from_bytes("image/png", &bytes);
        assert!(url.as_str().starts_with("data:image/png;base64,"));
        assert_eq!(url.decode().unwrap(), bytes);

        let image = GeneratedImage::new(url.payload(), url.mime_type(), Default::default());
        assert_eq!(image.to_data_url(), url);
        assert_eq!(image.decode().unwrap(), bytes);
    }

    #[test]
    fn test_decode_accepts_unpadded_and_wrapped_base64() {
        assert_eq!(decode_base64_lenient("QUJD").unwrap(), b"ABC");
        assert_eq!(decode_base64_lenient("QUI").unwrap(), b"AB");
        assert_eq!(decode_base64_lenient("QU\nI=").unwrap(), b"AB");
        assert_eq!(
            decode_base64_lenient("data:image/png;base64,QUI").unwrap(),
            b"AB"
        );
        assert!(matches!(
            decode_base64_lenient("not base64!"),
            Err(LockVizError::Decode(_))
        ));
    }

    #[test]
    fn test_generated_image_keeps_returned_text() {
        let image = GeneratedImage::new("QUI", "image/png", Default::default());
        assert_eq!(image.to_data_url().as_str(), "data:image/png;base64,QUI");
        assert_eq!(image.decode().unwrap(), b"AB");
    }

    #[test]
    fn test_data_url_clones_share_buffer() {
        let url = DataUrl::from_bytes("image/png", &[0u8; 4096]);
        let copy = url.clone();
        assert_eq!(url.as_str().as_ptr(), copy.as_str().as_ptr());
    }

    #[test]
    fn test_payload_from_lenient() {
        let full = payload_from_lenient("data:image/webp;base64,QUJD");
        assert_eq!(full, ImagePayload::new("image/webp", "QUJD"));

        let bare = payload_from_lenient("QUJD");
        assert_eq!(bare, ImagePayload::new("image/png", "QUJD"));
    }

    #[test]
    fn test_data_url_serde() {
        let url: DataUrl = serde_json::from_str(r#""data:image/png;base64,QUJD""#).unwrap();
        assert_eq!(url.payload(), "QUJD");
        assert!(serde_json::from_str::<DataUrl>(r#""not a data url""#).is_err());
    }

    #[test]
    fn test_file_extension() {
        assert_eq!(file_extension("image/jpeg", &PNG_MAGIC), "jpg");
        assert_eq!(file_extension("image/gif", b"GIF89a"), "gif");
        assert_eq!(file_extension("image/svg+xml", b"<svg/>"), "svg");
        assert_eq!(file_extension("application/octet-stream", &WEBP_MAGIC), "webp");
        assert_eq!(file_extension("", b"??"), "png");
    }

    #[test]
    fn test_preview_file_name() {
        assert_eq!(
            preview_file_name("lockviz", 1_700_000_000_000, "png"),
            "lockviz-preview-1700000000000.png"
        );
    }
}
