//! Image editor trait.

use crate::error::Result;
use crate::image::prompt::EditRequest;
use crate::image::types::GeneratedImage;
use async_trait::async_trait;

/// A hosted model that can edit a door photo using a reference image.
///
/// Implementations make exactly one attempt per call; nothing retries.
#[async_trait]
pub trait ImageEditor: Send + Sync {
    /// Sends one edit request and extracts the returned image.
    async fn edit(&self, request: &EditRequest) -> Result<GeneratedImage>;

    /// Returns the name of this editor for display.
    fn name(&self) -> &str;

    /// Checks if the service is reachable and the credential is accepted.
    async fn health_check(&self) -> Result<()>;
}
