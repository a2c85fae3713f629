//! Mock engines for exercising the extraction pipeline without Tesseract.

use std::sync::Mutex;

use super::{OcrBackend, SegmentationMode};
use crate::{EngineError, Result};

/// Returns a pre-set string for every call.
pub struct MockBackend {
    text: String,
}

impl MockBackend {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl OcrBackend for MockBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn modes(&self) -> &[SegmentationMode] {
        &[SegmentationMode::Block]
    }

    fn recognize(
        &self,
        _image_png: &[u8],
        _languages: &str,
        _mode: SegmentationMode,
    ) -> Result<String> {
        Ok(self.text.clone())
    }
}

/// Replays a scripted sequence of outcomes, one per call.
///
/// Lets tests drive the mode ladder and the primary/secondary fallback:
/// each entry is either recognized text or `None` for an engine error.
/// Once the script runs out, further calls return empty text.
pub struct ScriptedBackend {
    script: Mutex<Vec<Option<String>>>,
    modes: Vec<SegmentationMode>,
}

impl ScriptedBackend {
    pub fn new<I, S>(script: I) -> Self
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<String>,
    {
        Self {
            script: Mutex::new(
                script.into_iter().map(|s| s.map(Into::into)).collect(),
            ),
            modes: SegmentationMode::ladder().to_vec(),
        }
    }

    /// Restrict the modes this engine advertises.
    pub fn with_modes(mut self, modes: Vec<SegmentationMode>) -> Self {
        self.modes = modes;
        self
    }

    /// Number of recognize calls left in the script.
    pub fn remaining(&self) -> usize {
        self.script.lock().unwrap().len()
    }
}

impl OcrBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn modes(&self) -> &[SegmentationMode] {
        &self.modes
    }

    fn recognize(
        &self,
        _image_png: &[u8],
        _languages: &str,
        _mode: SegmentationMode,
    ) -> Result<String> {
        let mut script = self.script.lock().unwrap();
        if script.is_empty() {
            return Ok(String::new());
        }
        match script.remove(0) {
            Some(text) => Ok(text),
            None => Err(EngineError::Engine("scripted failure".to_string())),
        }
    }
}

/// Always returns empty text - an engine that runs but sees nothing.
pub struct SilentBackend;

impl OcrBackend for SilentBackend {
    fn name(&self) -> &'static str {
        "silent"
    }

    fn modes(&self) -> &[SegmentationMode] {
        SegmentationMode::ladder()
    }

    fn recognize(
        &self,
        _image_png: &[u8],
        _languages: &str,
        _mode: SegmentationMode,
    ) -> Result<String> {
        Ok(String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn mock_returns_preset_text() {
        let engine = MockBackend::new("Documento: 825714301");
        let text = engine
            .recognize(b"fake png", "spa+eng", SegmentationMode::Block)
            .unwrap();
        assert_eq!(text, "Documento: 825714301");
    }

    #[test]
    fn scripted_replays_in_order_then_goes_silent() {
        let engine = ScriptedBackend::new(vec![
            None,
            Some("second try"),
        ]);
        assert!(engine
            .recognize(b"", "spa", SegmentationMode::Block)
            .is_err());
        assert_eq!(
            engine
                .recognize(b"", "spa", SegmentationMode::Column)
                .unwrap(),
            "second try"
        );
        assert_eq!(
            engine.recognize(b"", "spa", SegmentationMode::Line).unwrap(),
            ""
        );
    }

    #[test]
    fn silent_engine_yields_empty_text() {
        let engine = SilentBackend;
        assert_eq!(
            engine.recognize(b"", "spa", SegmentationMode::Sparse).unwrap(),
            ""
        );
    }
}
