//! Error types for the recorte-core library.

use thiserror::Error;

/// Main error type for the recorte library.
#[derive(Error, Debug)]
pub enum RecorteError {
    /// Page rasterization error.
    #[error("raster error: {0}")]
    Raster(#[from] RasterError),

    /// Image processing error.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// I/O error on the session directory.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Profile configuration error.
    #[error("profile error: {0}")]
    Profile(String),
}

/// Errors related to turning input bytes into page images.
///
/// These are the only *fatal* conditions in the pipeline: a request that
/// cannot be rasterized has nothing to segment. OCR and matching failures
/// are absorbed downstream as fallback results and never surface here.
#[derive(Error, Debug)]
pub enum RasterError {
    /// The declared content kind is not one we can rasterize.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The bytes do not parse as a valid document of the declared kind.
    #[error("corrupt input: {0}")]
    CorruptInput(String),

    /// The PDF rendering backend could not be initialized.
    #[error("pdf backend unavailable: {0}")]
    Backend(String),

    /// The PDF parsed but contains no pages.
    #[error("document has no pages")]
    NoPages,
}

/// Result type for the recorte library.
pub type Result<T> = std::result::Result<T, RecorteError>;
