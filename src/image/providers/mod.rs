//! Image editor providers.

#[cfg(feature = "gemini-image")]
mod gemini;

#[cfg(feature = "gemini-image")]
pub use gemini::{GeminiModel, GeminiProvider, GeminiProviderBuilder, API_KEY_ENV};
