//! Tesseract backend via leptess.

use leptess::LepTess;
use tracing::debug;

use super::{OcrBackend, SegmentationMode};
use crate::{EngineError, Result};

/// Tesseract OCR engine.
///
/// A fresh `LepTess` is created per call: leptess handles are not `Sync`,
/// and recognition calls may be abandoned on timeout, so no handle is
/// ever reused across attempts.
pub struct TesseractBackend {
    data_path: Option<String>,
}

impl TesseractBackend {
    /// `data_path` points at the tessdata directory; `None` uses the
    /// TESSDATA_PREFIX environment the system Tesseract was built with.
    pub fn new(data_path: Option<String>) -> Self {
        Self { data_path }
    }
}

impl OcrBackend for TesseractBackend {
    fn name(&self) -> &'static str {
        "tesseract"
    }

    fn modes(&self) -> &[SegmentationMode] {
        SegmentationMode::ladder()
    }

    fn recognize(
        &self,
        image_png: &[u8],
        languages: &str,
        mode: SegmentationMode,
    ) -> Result<String> {
        let mut lt = LepTess::new(self.data_path.as_deref(), languages)
            .map_err(|e| EngineError::Engine(e.to_string()))?;

        lt.set_variable(
            leptess::Variable::TesseditPagesegMode,
            &mode.psm().to_string(),
        )
        .map_err(|e| EngineError::Engine(e.to_string()))?;

        lt.set_image_from_mem(image_png)
            .map_err(|e| EngineError::ImageDecode(e.to_string()))?;

        let text = lt
            .get_utf8_text()
            .map_err(|e| EngineError::Engine(e.to_string()))?;

        debug!(psm = mode.psm(), len = text.len(), "tesseract attempt");
        Ok(text)
    }
}
