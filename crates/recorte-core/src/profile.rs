//! Extraction profiles - the per-request configuration bundle.
//!
//! A profile carries everything that distinguishes one document family
//! from another: the minimum region area, the fractional ROI to OCR, the
//! pattern family, OCR languages, render DPI. Two built-in families
//! exist (bank receipts identified by a "Documento:" number, and invoice
//! pages carrying a "NETO" total); the branching between them is data in
//! the profile, not code paths.

use serde::{Deserialize, Serialize};

use crate::error::{RecorteError, Result};
use crate::segment::Rect;

/// Which pattern family the field matcher applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileKind {
    /// Bank receipt document number ("Documento: 825714301-08").
    DocumentId,
    /// Monetary NET total ("NETO $ 16,220,167.00").
    NetTotal,
}

/// Whether the ROI fraction is taken from each detected region's
/// bounding box or from the full page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoiScope {
    /// ROI is a sub-rectangle of each segmented region.
    Region,
    /// ROI is a sub-rectangle of the whole page; the page itself is the
    /// single region.
    Page,
}

/// A fractional sub-rectangle, each edge in `0.0..=1.0` of the target
/// width/height.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoiFraction {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl RoiFraction {
    pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self { left, top, right, bottom }
    }

    /// The whole target rectangle.
    pub fn full() -> Self {
        Self::new(0.0, 0.0, 1.0, 1.0)
    }

    /// Resolve against concrete pixel dimensions. Returns `None` when the
    /// resolved rectangle is empty (degenerate fractions or a tiny crop).
    pub fn apply(&self, width: u32, height: u32) -> Option<Rect> {
        let x0 = (width as f32 * self.left.clamp(0.0, 1.0)) as u32;
        let y0 = (height as f32 * self.top.clamp(0.0, 1.0)) as u32;
        let x1 = (width as f32 * self.right.clamp(0.0, 1.0)) as u32;
        let y1 = (height as f32 * self.bottom.clamp(0.0, 1.0)) as u32;

        if x1 <= x0 || y1 <= y0 {
            return None;
        }

        Some(Rect {
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0,
        })
    }
}

/// Configuration bundle supplied by the caller per request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionProfile {
    /// Pattern family to match.
    pub kind: ProfileKind,

    /// Minimum region area in px^2; contours below it are discarded.
    pub min_area: u64,

    /// Fractional rectangle to OCR.
    pub roi: RoiFraction,

    /// What the ROI fraction is relative to.
    pub roi_scope: RoiScope,

    /// OCR languages, Tesseract-style (e.g. "spa+eng").
    pub languages: String,

    /// Render DPI for PDF inputs.
    pub dpi: u32,

    /// Per-OCR-call timeout in milliseconds.
    pub ocr_timeout_ms: u64,

    /// CLAHE clip limit used by the ROI preprocessor.
    pub clahe_clip: f32,
}

impl Default for ExtractionProfile {
    fn default() -> Self {
        Self::bank_document()
    }
}

impl ExtractionProfile {
    /// Bank receipt profile: document-id extraction from the upper-right
    /// portion of each detected receipt.
    pub fn bank_document() -> Self {
        Self {
            kind: ProfileKind::DocumentId,
            min_area: 50_000,
            roi: RoiFraction::new(0.60, 0.35, 1.0, 0.70),
            roi_scope: RoiScope::Region,
            languages: "spa+eng".to_string(),
            dpi: 144,
            ocr_timeout_ms: 10_000,
            clahe_clip: 3.0,
        }
    }

    /// Grid profile: same as `bank_document` but with the area threshold
    /// lowered by an order of magnitude, so dense pages of 10+ small
    /// receipts keep all of them.
    pub fn grid() -> Self {
        Self {
            min_area: 3_000,
            ..Self::bank_document()
        }
    }

    /// Invoice NET-total profile: the lower-right totals band of the full
    /// page is OCRed and each page yields one result.
    pub fn net_total() -> Self {
        Self {
            kind: ProfileKind::NetTotal,
            min_area: 50_000,
            roi: RoiFraction::new(0.50, 0.85, 1.0, 1.0),
            roi_scope: RoiScope::Page,
            languages: "spa+eng".to_string(),
            dpi: 300,
            ocr_timeout_ms: 10_000,
            clahe_clip: 2.0,
        }
    }

    /// Load a profile from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| RecorteError::Profile(e.to_string()))
    }

    /// Save a profile to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| RecorteError::Profile(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn roi_fraction_resolves_upper_right() {
        let roi = RoiFraction::new(0.60, 0.35, 1.0, 0.70);
        let rect = roi.apply(1000, 800).unwrap();
        assert_eq!(rect, Rect { x: 600, y: 280, width: 400, height: 280 });
    }

    #[test]
    fn roi_fraction_empty_when_degenerate() {
        let roi = RoiFraction::new(0.9, 0.9, 0.9, 0.9);
        assert!(roi.apply(100, 100).is_none());
        // Tiny crop where the fractions collapse to the same pixel row.
        let narrow = RoiFraction::new(0.60, 0.35, 1.0, 0.70);
        assert!(narrow.apply(1, 1).is_none());
    }

    #[test]
    fn grid_profile_lowers_threshold_only() {
        let bank = ExtractionProfile::bank_document();
        let grid = ExtractionProfile::grid();
        assert_eq!(grid.min_area, 3_000);
        assert_eq!(bank.min_area, 50_000);
        assert_eq!(grid.kind, bank.kind);
        assert_eq!(grid.roi, bank.roi);
    }

    #[test]
    fn profile_json_round_trip() {
        let profile = ExtractionProfile::net_total();
        let json = serde_json::to_string(&profile).unwrap();
        let back: ExtractionProfile = serde_json::from_str(&json).unwrap();
        assert_eq!(back.kind, ProfileKind::NetTotal);
        assert_eq!(back.roi_scope, RoiScope::Page);
        assert_eq!(back.dpi, 300);
    }
}
