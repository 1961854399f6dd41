//! Image acquisition, request composition and remote editing.

pub mod acquire;
mod prompt;
mod provider;
pub mod providers;
mod types;

pub use acquire::{read_door_image, HttpReferenceFetcher, ReferenceFetcher};
pub use prompt::{compose, EditRequest, PromptTemplate, LOCK_NAME_PLACEHOLDER};
pub use provider::ImageEditor;
pub use types::{
    file_extension, payload_from_lenient, preview_file_name, DataUrl, GeneratedImage,
    GenerationMetadata, ImageFormat, ImagePayload, DEFAULT_MIME_TYPE,
};
