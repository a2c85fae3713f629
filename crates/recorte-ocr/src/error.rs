//! Error types for the engine layer.

use thiserror::Error;

/// Errors that can occur inside an OCR engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The engine could not decode the supplied image bytes.
    #[error("image decode error: {0}")]
    ImageDecode(String),

    /// The engine itself failed while recognizing.
    #[error("engine error: {0}")]
    Engine(String),

    /// The engine is not compiled in or not installed on this host.
    #[error("engine not available - build with the `tesseract` feature")]
    NotAvailable,
}
