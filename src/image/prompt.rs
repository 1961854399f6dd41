//! Request composition: two images plus one instruction.

use crate::catalog::LockModel;
use crate::error::{LockVizError, Result};
use crate::image::types::ImagePayload;
use std::path::Path;

/// Placeholder replaced with the selected lock's display name.
pub const LOCK_NAME_PLACEHOLDER: &str = "{lock_name}";

const DEFAULT_INSTRUCTION: &str = "\
ROLE: Professional architectural visualizer.
TASK: Install the smart lock ({lock_name}) from the second image (REFERENCE) onto the door in the first image (DOOR).
RULES:
1. Remove the existing handle or lock on the door and put the reference lock exactly where it was. Clone the exact design and shape of the reference lock.
2. Match the door's perspective, lighting and shadows so the lock looks physically installed.
3. Do not add any text, watermarks or people.
4. If the reference lock has no handle (push-pull style), do not add one.
OUTPUT: Only the modified door image.";

/// Instruction text sent alongside the two images.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    text: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            text: DEFAULT_INSTRUCTION.to_string(),
        }
    }
}

impl PromptTemplate {
    /// Creates a custom template. `{lock_name}` is substituted when rendering.
    pub fn new(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(LockVizError::InvalidRequest(
                "prompt template is empty".into(),
            ));
        }
        Ok(Self { text })
    }

    /// Reads a template from a text file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::new(std::fs::read_to_string(path)?)
    }

    /// Returns the raw template text.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Renders the instruction for the given lock.
    pub fn render(&self, lock: &LockModel) -> String {
        self.text.replace(LOCK_NAME_PLACEHOLDER, &lock.name)
    }
}

/// A single multimodal edit request.
///
/// Parts are always sent in order: door image, reference image, instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditRequest {
    /// The uploaded door photo.
    pub door: ImagePayload,
    /// The catalog lock reference image.
    pub reference: ImagePayload,
    /// Natural-language instruction.
    pub instruction: String,
    /// Catalog id of the lock, carried through to result metadata.
    pub lock_id: String,
}

/// Composes the edit request for one generation.
pub fn compose(
    door: ImagePayload,
    reference: ImagePayload,
    template: &PromptTemplate,
    lock: &LockModel,
) -> EditRequest {
    EditRequest {
        door,
        reference,
        instruction: template.render(lock),
        lock_id: lock.id.clone(),
    }
}
