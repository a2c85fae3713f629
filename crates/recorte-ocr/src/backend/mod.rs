//! OCR backend implementations.

pub mod mock;

#[cfg(feature = "tesseract")]
pub mod tesseract;

use crate::Result;

/// Page-segmentation assumption handed to an engine for one attempt.
///
/// These map onto Tesseract's `--psm` modes; the extraction pipeline walks
/// an engine's preferred modes in order until one of them yields usable
/// text. Engines that have no notion of segmentation modes can expose a
/// single mode and ignore the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentationMode {
    /// Uniform block of text (`--psm 6`).
    Block,
    /// Single column of variable-height text (`--psm 4`).
    Column,
    /// Single line (`--psm 7`).
    Line,
    /// Single word (`--psm 8`).
    Word,
    /// Sparse text in no particular order (`--psm 11`).
    Sparse,
    /// Raw line, bypassing Tesseract hacks (`--psm 13`).
    RawLine,
}

impl SegmentationMode {
    /// The Tesseract `--psm` number for this mode.
    pub fn psm(self) -> u32 {
        match self {
            SegmentationMode::Block => 6,
            SegmentationMode::Column => 4,
            SegmentationMode::Line => 7,
            SegmentationMode::Word => 8,
            SegmentationMode::Sparse => 11,
            SegmentationMode::RawLine => 13,
        }
    }

    /// The attempt ladder used for receipt fields: start with the layout
    /// assumptions that suit printed labels, end with the permissive ones.
    pub fn ladder() -> &'static [SegmentationMode] {
        &[
            SegmentationMode::Block,
            SegmentationMode::Column,
            SegmentationMode::Line,
            SegmentationMode::Word,
            SegmentationMode::Sparse,
            SegmentationMode::RawLine,
        ]
    }
}

/// Trait for OCR engines.
///
/// Implementations accept raw PNG image bytes and return the recognized
/// text. Engines must be shareable across threads because recognition
/// calls are dispatched to a worker thread so they can be bounded by a
/// timeout.
pub trait OcrBackend: Send + Sync {
    /// Short engine name used in logs.
    fn name(&self) -> &'static str;

    /// Segmentation modes this engine wants tried, in order.
    fn modes(&self) -> &[SegmentationMode];

    /// Recognize text in the given PNG-encoded image.
    fn recognize(
        &self,
        image_png: &[u8],
        languages: &str,
        mode: SegmentationMode,
    ) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ladder_starts_strict_ends_permissive() {
        let ladder = SegmentationMode::ladder();
        assert_eq!(ladder.first(), Some(&SegmentationMode::Block));
        assert_eq!(ladder.last(), Some(&SegmentationMode::RawLine));
    }

    #[test]
    fn psm_numbers_match_tesseract() {
        assert_eq!(SegmentationMode::Block.psm(), 6);
        assert_eq!(SegmentationMode::Sparse.psm(), 11);
        assert_eq!(SegmentationMode::RawLine.psm(), 13);
    }
}
