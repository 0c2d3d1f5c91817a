//! Template-based visual classification.
//!
//! Captured regions are converted to grayscale, run through a [`Preprocessor`]
//! and compared against every reference template of every label with
//! zero-mean normalized cross-correlation.

pub mod preprocess;
pub mod ncc;
pub mod recognizer;
pub mod templates;

pub use self::preprocess::{Identity, LinearStretch, Preprocessor};
pub use self::recognizer::{Confidence, Recognition, Recognizer, HIGH_THRESH, LOW_THRESH};
pub use self::templates::{DirectoryTemplates, MemoryTemplates, ReferenceTemplateStore, TemplateSource};

/// Malformed input handed to the classifier.
#[derive(Debug, thiserror::Error)]
pub enum RecognitionError {
    #[error("empty region {width}x{height}")]
    EmptyRegion { width: u32, height: u32 },
    #[error("unsupported pixel format {0}")]
    UnsupportedFormat(String),
}
