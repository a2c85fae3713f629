//! Core library for receipt ("comprobante") extraction from scanned pages.
//!
//! This crate provides:
//! - PDF/image rasterization to per-page images
//! - binary-morphology segmentation of individual receipts on a page
//! - ROI preprocessing (CLAHE + Otsu) tuned for OCR legibility
//! - multi-engine OCR with ordered fallback and per-call timeouts
//! - tolerant pattern matching for document numbers and NET totals
//! - session assembly with per-region cropped output images

pub mod error;
pub mod extract;
pub mod preprocess;
pub mod profile;
pub mod raster;
pub mod segment;
pub mod session;

pub use error::{RasterError, RecorteError, Result};
pub use extract::{EngineAttempt, FieldOutcome, OcrExtractor, PatternSet};
pub use profile::{ExtractionProfile, ProfileKind, RoiFraction, RoiScope};
pub use raster::{ContentKind, Page, Rasterizer};
pub use segment::{Rect, Region, Segmenter};
pub use session::{
    ExtractionResult, Grouping, Session, SessionAssembler, SessionOutcome,
    SessionSummary, ValueSource,
};

/// Re-export engine types so callers wire backends without a direct
/// dependency on recorte-ocr.
pub use recorte_ocr::{EngineError, OcrBackend, SegmentationMode};

#[cfg(feature = "tesseract")]
pub use recorte_ocr::TesseractBackend;
