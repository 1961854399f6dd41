//! Error types for preview generation.

use crate::locale::MessageKind;
use std::time::Duration;

/// Errors that can occur while producing a door preview.
#[derive(Debug, thiserror::Error)]
pub enum LockVizError {
    /// Required configuration (e.g. the API credential) is missing.
    #[error("configuration error: {0}")]
    Config(String),

    /// API key rejected by the remote service.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Sanitized response body.
        message: String,
    },

    /// Rate limit or quota exceeded.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited {
        /// Server-suggested delay, if one was sent.
        retry_after: Option<Duration>,
    },

    /// The generation call did not finish before its deadline.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// The generation was cancelled before it completed.
    #[error("generation cancelled")]
    Cancelled,

    /// Content was blocked by safety filters.
    #[error("content blocked: {0}")]
    ContentBlocked(String),

    /// Invalid request parameters.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Generation was triggered before a door photo was uploaded.
    #[error("no door image uploaded")]
    MissingDoorImage,

    /// Generation was triggered while another one is still running.
    #[error("a generation is already in progress")]
    AlreadyGenerating,

    /// The requested lock id is not in the catalog.
    #[error("unknown lock model: {0}")]
    UnknownLock(String),

    /// The catalog reference image could not be fetched or read.
    #[error("could not process the lock reference image: {0}")]
    ReferenceFetch(String),

    /// The model answered without an inline image.
    #[error("AI output empty: {0}")]
    EmptyResult(String),

    /// Network or HTTP error.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Failed to decode base64 data or a data URL.
    #[error("failed to decode: {0}")]
    Decode(String),

    /// I/O error (reading the door photo, saving the preview).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LockVizError {
    /// Returns true if this error is likely transient.
    ///
    /// Nothing in the pipeline retries automatically; this is a hint for
    /// the caller deciding whether to offer a retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::Timeout(_) | Self::Network(_)
        )
    }

    /// Returns the suggested retry delay, if available.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            Self::Timeout(_) => Some(Duration::from_secs(1)),
            Self::Network(_) => Some(Duration::from_secs(2)),
            _ => None,
        }
    }

    /// Classifies this error into the user-facing message it maps to.
    pub fn message_kind(&self) -> MessageKind {
        match self {
            Self::MissingDoorImage => MessageKind::UploadFirst,
            Self::Config(_) => MessageKind::Config,
            Self::RateLimited { .. } => MessageKind::Quota,
            Self::Api { status: 429, .. } => MessageKind::Quota,
            Self::Timeout(_) => MessageKind::Timeout,
            Self::Cancelled => MessageKind::Cancelled,
            _ => MessageKind::Generic,
        }
    }
}

/// Result type alias for preview generation operations.
pub type Result<T> = std::result::Result<T, LockVizError>;

/// Maximum length of a server error body kept in an error message.
const MAX_ERROR_MESSAGE_LEN: usize = 500;

/// Parses a `Retry-After` header given in whole seconds.
pub(crate) fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// Trims a server error body and masks anything that looks like an API key.
///
/// Error bodies can echo the request URL, which for some Google endpoints
/// carries the key as a `key=` query parameter.
pub(crate) fn sanitize_error_message(text: &str) -> String {
    let masked: Vec<String> = text
        .split_whitespace()
        .map(|word| {
            if let Some(pos) = word.find("key=") {
                format!("{}key=***", &word[..pos])
            } else if word.starts_with("AIza") && word.len() > 30 {
                "***".to_string()
            } else {
                word.to_string()
            }
        })
        .collect();
    let joined = masked.join(" ");

    if joined.chars().count() > MAX_ERROR_MESSAGE_LEN {
        let truncated: String = joined.chars().take(MAX_ERROR_MESSAGE_LEN).collect();
        format!("{truncated}...")
    } else {
        joined
    }
}
