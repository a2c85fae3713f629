//! OCR engine abstraction layer for recorte.
//!
//! This crate provides a unified interface over text-recognition engines:
//! - Tesseract via `leptess` on native platforms (behind the `tesseract`
//!   feature, since it needs system libtesseract + libleptonica)
//! - scriptable mock engines for testing the extraction pipeline without
//!   any OCR installation

mod backend;
mod error;

pub use backend::{OcrBackend, SegmentationMode};
pub use backend::mock::{MockBackend, ScriptedBackend, SilentBackend};
pub use error::EngineError;

#[cfg(feature = "tesseract")]
pub use backend::tesseract::TesseractBackend;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
