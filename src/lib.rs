#![warn(missing_docs)]
//! LockViz - smart-lock door previews via hosted multimodal image models.
//!
//! A door photo and a catalog lock reference image are sent to an image
//! model together with an installation instruction; the returned image is
//! a preview of the door with the lock fitted.
//!
//! # Quick Start
//!
//! ```no_run
//! use lockviz::{Catalog, GeminiProvider, HttpReferenceFetcher, Session, SessionConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> lockviz::Result<()> {
//!     let catalog = Catalog::load("locks.json")?;
//!     let editor = Arc::new(GeminiProvider::builder().build()?);
//!     let session = Session::new(
//!         catalog,
//!         editor,
//!         Arc::new(HttpReferenceFetcher::new()),
//!         SessionConfig::default(),
//!     );
//!
//!     session.upload("door.jpg").await?;
//!     session.select_lock("L-02")?;
//!     session.generate().await?;
//!     let saved = session.save_result(".").await?;
//!     println!("saved {}", saved.display());
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - `gemini-image`: Gemini (Google) image editing provider
//! - `cli`: Command-line interface

mod catalog;
mod error;
pub mod image;
pub mod locale;
pub mod session;

pub use catalog::{Catalog, LockModel};
pub use error::{LockVizError, Result};

pub use image::{
    DataUrl, EditRequest, GeneratedImage, GenerationMetadata, HttpReferenceFetcher, ImageEditor,
    ImageFormat, ImagePayload, PromptTemplate, ReferenceFetcher,
};
pub use locale::{Language, MessageKind};
pub use session::{Session, SessionConfig, SessionState, Status};

#[cfg(feature = "gemini-image")]
pub use image::providers::{GeminiModel, GeminiProvider, GeminiProviderBuilder};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::catalog::{Catalog, LockModel};
    pub use crate::error::{LockVizError, Result};
    pub use crate::image::{DataUrl, GeneratedImage, ImageEditor, PromptTemplate};
    pub use crate::locale::Language;
    pub use crate::session::{Session, SessionConfig, Status};

    #[cfg(feature = "gemini-image")]
    pub use crate::image::providers::GeminiProvider;
}
