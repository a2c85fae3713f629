//! OCR field extraction: candidate images x engines x segmentation modes.
//!
//! Extraction walks the preprocessed ROI variants in order (binary,
//! enhanced, raw) and for each one runs the engine fallback chain, each
//! engine stepping through its segmentation-mode ladder. The first
//! recognized text that survives the pattern set wins; everything else
//! only contributes to the raw-text trail reported on a miss.

pub mod amount;
pub mod matcher;
pub mod patterns;

pub use matcher::PatternSet;

use std::io::Cursor;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use image::{DynamicImage, GrayImage, ImageFormat};
use tracing::{debug, warn};

use recorte_ocr::{OcrBackend, SegmentationMode};

use crate::preprocess::PreparedRoi;

/// Default wall-clock budget for a single recognize call.
const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Progress through the engine fallback chain for one candidate image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineAttempt {
    NotTried,
    TriedPrimary,
    TriedSecondary,
    Exhausted,
}

impl EngineAttempt {
    pub fn exhausted(self) -> bool {
        matches!(self, EngineAttempt::Exhausted)
    }
}

/// What an extraction attempt produced for one region of interest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldOutcome {
    /// A pattern matched; `raw_text` is the engine output it came from.
    Matched { value: String, raw_text: String },
    /// Engines produced text but no pattern accepted any of it.
    NoMatch { raw_text: String },
    /// No engine produced any text at all.
    NoText,
}

/// Runs OCR engines against a prepared ROI with per-attempt timeouts.
#[derive(Clone)]
pub struct OcrExtractor {
    primary: Option<Arc<dyn OcrBackend>>,
    secondary: Option<Arc<dyn OcrBackend>>,
    timeout: Duration,
}

impl OcrExtractor {
    pub fn new(
        primary: Option<Arc<dyn OcrBackend>>,
        secondary: Option<Arc<dyn OcrBackend>>,
    ) -> Self {
        Self {
            primary,
            secondary,
            timeout: DEFAULT_ATTEMPT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn has_engines(&self) -> bool {
        self.primary.is_some() || self.secondary.is_some()
    }

    /// Extract one field from a prepared ROI.
    ///
    /// The candidate loop is outermost so the binary image, which
    /// usually reads best, gets the full engine chain before the
    /// enhanced and raw variants are consulted.
    pub fn extract_field(
        &self,
        roi: &PreparedRoi,
        languages: &str,
        set: &PatternSet,
    ) -> FieldOutcome {
        let mut best_raw: Option<String> = None;

        for candidate in roi.candidates() {
            let png = match encode_png(candidate) {
                Some(bytes) => Arc::new(bytes),
                None => continue,
            };

            let mut state = EngineAttempt::NotTried;
            while !state.exhausted() {
                let engine = match self.next_engine(&mut state) {
                    Some(engine) => engine,
                    None => break,
                };
                for &mode in engine.modes() {
                    let text = recognize_with_deadline(
                        engine.clone(),
                        png.clone(),
                        languages.to_string(),
                        mode,
                        self.timeout,
                    );
                    let Some(text) = text else { continue };
                    let trimmed = text.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    if let Some(value) = set.find(trimmed) {
                        debug!(engine = engine.name(), ?mode, %value, "field matched");
                        return FieldOutcome::Matched {
                            value,
                            raw_text: trimmed.to_string(),
                        };
                    }
                    // Keep the longest text seen; it is the most useful
                    // trail when every pattern misses.
                    if best_raw.as_ref().map_or(true, |b| trimmed.len() > b.len()) {
                        best_raw = Some(trimmed.to_string());
                    }
                }
            }
        }

        match best_raw {
            Some(raw_text) => FieldOutcome::NoMatch { raw_text },
            None => FieldOutcome::NoText,
        }
    }

    /// Advances the fallback chain and hands out the next engine, if any.
    fn next_engine(&self, state: &mut EngineAttempt) -> Option<Arc<dyn OcrBackend>> {
        loop {
            match *state {
                EngineAttempt::NotTried => {
                    *state = EngineAttempt::TriedPrimary;
                    if let Some(engine) = &self.primary {
                        return Some(engine.clone());
                    }
                }
                EngineAttempt::TriedPrimary => {
                    *state = EngineAttempt::TriedSecondary;
                    if let Some(engine) = &self.secondary {
                        return Some(engine.clone());
                    }
                }
                EngineAttempt::TriedSecondary => {
                    *state = EngineAttempt::Exhausted;
                }
                EngineAttempt::Exhausted => return None,
            }
        }
    }
}

/// Runs one recognize call on its own thread and abandons it past the
/// deadline. A timed-out or failed attempt is logged and treated as
/// producing no text.
fn recognize_with_deadline(
    engine: Arc<dyn OcrBackend>,
    png: Arc<Vec<u8>>,
    languages: String,
    mode: SegmentationMode,
    timeout: Duration,
) -> Option<String> {
    let name = engine.name();
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(engine.recognize(&png, &languages, mode));
    });
    match rx.recv_timeout(timeout) {
        Ok(Ok(text)) => Some(text),
        Ok(Err(err)) => {
            warn!(engine = name, ?mode, error = %err, "ocr attempt failed");
            None
        }
        Err(_) => {
            warn!(
                engine = name,
                ?mode,
                timeout_ms = timeout.as_millis() as u64,
                "ocr attempt timed out"
            );
            None
        }
    }
}

fn encode_png(image: &GrayImage) -> Option<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageLuma8(image.clone())
        .write_to(&mut buffer, ImageFormat::Png)
        .ok()?;
    Some(buffer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use recorte_ocr::{MockBackend, ScriptedBackend, SilentBackend};

    fn blank_roi() -> PreparedRoi {
        let gray = GrayImage::from_pixel(8, 8, image::Luma([255]));
        PreparedRoi {
            binary: gray.clone(),
            enhanced: gray.clone(),
            raw: gray,
        }
    }

    #[test]
    fn primary_match_short_circuits() {
        let extractor = OcrExtractor::new(
            Some(Arc::new(MockBackend::new("Documento: 825714301"))),
            Some(Arc::new(MockBackend::new("unused"))),
        );
        let outcome =
            extractor.extract_field(&blank_roi(), "spa+eng", &PatternSet::document_id());
        assert_eq!(
            outcome,
            FieldOutcome::Matched {
                value: "825714301".to_string(),
                raw_text: "Documento: 825714301".to_string(),
            }
        );
    }

    #[test]
    fn secondary_engine_rescues_silent_primary() {
        let extractor = OcrExtractor::new(
            Some(Arc::new(SilentBackend)),
            Some(Arc::new(MockBackend::new("NETO $ 16,220,167.00"))),
        );
        let outcome =
            extractor.extract_field(&blank_roi(), "spa+eng", &PatternSet::net_total());
        assert_eq!(
            outcome,
            FieldOutcome::Matched {
                value: "16,220,167.00".to_string(),
                raw_text: "NETO $ 16,220,167.00".to_string(),
            }
        );
    }

    #[test]
    fn engine_error_falls_through_to_next_mode() {
        let primary = ScriptedBackend::new(vec![None, Some("Documento: 825714301")])
            .with_modes(vec![SegmentationMode::Block, SegmentationMode::Column]);
        let extractor = OcrExtractor::new(Some(Arc::new(primary)), None);
        let outcome =
            extractor.extract_field(&blank_roi(), "spa", &PatternSet::document_id());
        assert!(matches!(outcome, FieldOutcome::Matched { ref value, .. } if value == "825714301"));
    }

    #[test]
    fn garbled_text_reports_no_match_with_trail() {
        let extractor =
            OcrExtractor::new(Some(Arc::new(MockBackend::new("l|ll OI lO"))), None);
        let outcome =
            extractor.extract_field(&blank_roi(), "spa", &PatternSet::document_id());
        assert_eq!(
            outcome,
            FieldOutcome::NoMatch {
                raw_text: "l|ll OI lO".to_string(),
            }
        );
    }

    #[test]
    fn no_engines_means_no_text() {
        let extractor = OcrExtractor::new(None, None);
        let outcome =
            extractor.extract_field(&blank_roi(), "spa", &PatternSet::document_id());
        assert_eq!(outcome, FieldOutcome::NoText);
    }

    #[test]
    fn slow_engine_times_out() {
        struct SleepyBackend;
        impl OcrBackend for SleepyBackend {
            fn name(&self) -> &'static str {
                "sleepy"
            }
            fn modes(&self) -> &[SegmentationMode] {
                &[SegmentationMode::Block]
            }
            fn recognize(
                &self,
                _image_png: &[u8],
                _languages: &str,
                _mode: SegmentationMode,
            ) -> recorte_ocr::Result<String> {
                thread::sleep(Duration::from_millis(250));
                Ok("Documento: 825714301".to_string())
            }
        }

        let extractor = OcrExtractor::new(Some(Arc::new(SleepyBackend)), None)
            .with_timeout(Duration::from_millis(20));
        let outcome =
            extractor.extract_field(&blank_roi(), "spa", &PatternSet::document_id());
        assert_eq!(outcome, FieldOutcome::NoText);
    }

    #[test]
    fn fallback_chain_state_machine() {
        let extractor = OcrExtractor::new(
            Some(Arc::new(SilentBackend)),
            Some(Arc::new(SilentBackend)),
        );
        let mut state = EngineAttempt::NotTried;
        assert!(extractor.next_engine(&mut state).is_some());
        assert_eq!(state, EngineAttempt::TriedPrimary);
        assert!(extractor.next_engine(&mut state).is_some());
        assert_eq!(state, EngineAttempt::TriedSecondary);
        assert!(extractor.next_engine(&mut state).is_none());
        assert!(state.exhausted());
    }

    #[test]
    fn missing_primary_skips_straight_to_secondary() {
        let extractor = OcrExtractor::new(
            None,
            Some(Arc::new(MockBackend::new("Documento: 825714301"))),
        );
        let outcome =
            extractor.extract_field(&blank_roi(), "spa", &PatternSet::document_id());
        assert!(matches!(outcome, FieldOutcome::Matched { .. }));
    }
}
