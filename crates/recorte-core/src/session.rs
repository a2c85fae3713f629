//! Session assembly: one input document in, a directory of named
//! receipt crops plus a manifest out.
//!
//! A session owns a directory under the output root. Every detected
//! region is cropped, run through field extraction, and saved under the
//! extracted value's name; regions whose value could not be read fall
//! back to a positional `PAGnn_COMPnn` name so no crop is ever dropped.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use image::{imageops, DynamicImage, GrayImage, RgbImage};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::extract::{FieldOutcome, OcrExtractor, PatternSet};
use crate::preprocess;
use crate::profile::{ExtractionProfile, RoiScope};
use crate::raster::{ContentKind, Page, Rasterizer};
use crate::segment::{Rect, Region, Segmenter};

/// Where a result's identifier came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValueSource {
    /// An OCR pattern matched; the identifier is the extracted value.
    OcrMatched,
    /// Nothing matched; the identifier encodes page and position.
    FallbackPositional,
}

/// One cropped region with its extraction outcome.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionResult {
    pub region: Region,
    /// Extracted value, or the positional fallback name.
    pub identifier: String,
    /// The extracted value when one matched.
    pub value: Option<String>,
    pub source: ValueSource,
    /// Raw engine text behind the decision, when any was produced.
    pub raw_text: Option<String>,
    /// File name of the saved crop, relative to the session directory.
    pub image_file: String,
}

/// Aggregate counts for a finished session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub pages: u32,
    pub total_regions: usize,
    pub matched: usize,
    pub fallback: usize,
}

impl SessionSummary {
    fn from_results(pages: u32, results: &[ExtractionResult]) -> Self {
        let matched = results
            .iter()
            .filter(|r| r.source == ValueSource::OcrMatched)
            .count();
        Self {
            pages,
            total_regions: results.len(),
            matched,
            fallback: results.len() - matched,
        }
    }
}

/// A processed document's crops, results, and on-disk directory.
#[derive(Debug, Serialize)]
pub struct Session {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub results: Vec<ExtractionResult>,
    pub summary: SessionSummary,
    #[serde(skip)]
    pub dir: PathBuf,
}

impl Session {
    /// Serializes the session into `session.json` inside its directory.
    pub fn write_manifest(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        fs::write(self.dir.join("session.json"), json)?;
        Ok(())
    }
}

/// How detected regions are packaged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grouping {
    /// All regions share one session directory.
    Combined,
    /// Every region becomes its own child session.
    Individual,
}

#[derive(Debug)]
pub enum SessionOutcome {
    Combined(Session),
    Individual(Vec<Session>),
}

impl SessionOutcome {
    pub fn sessions(&self) -> Vec<&Session> {
        match self {
            SessionOutcome::Combined(session) => vec![session],
            SessionOutcome::Individual(sessions) => sessions.iter().collect(),
        }
    }
}

/// Drives rasterize -> segment -> extract -> save for one document.
pub struct SessionAssembler {
    rasterizer: Rasterizer,
    segmenter: Segmenter,
    extractor: OcrExtractor,
    output_root: PathBuf,
}

impl SessionAssembler {
    pub fn new(extractor: OcrExtractor, output_root: impl Into<PathBuf>) -> Self {
        Self {
            rasterizer: Rasterizer::new(),
            segmenter: Segmenter::new(),
            extractor,
            output_root: output_root.into(),
        }
    }

    /// Processes one document. The session directory is removed again
    /// if anything fails partway, so the output root never accumulates
    /// half-written sessions.
    pub fn process(
        &self,
        bytes: &[u8],
        kind: ContentKind,
        profile: &ExtractionProfile,
        grouping: Grouping,
    ) -> Result<SessionOutcome> {
        let id = format!("session_{}", Uuid::new_v4().simple());
        let dir = self.output_root.join(&id);
        fs::create_dir_all(&dir)?;

        match self.run(bytes, kind, profile, grouping, &id, &dir) {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                if let Err(cleanup) = fs::remove_dir_all(&dir) {
                    warn!(session = %id, error = %cleanup, "failed to clean up session dir");
                }
                Err(err)
            }
        }
    }

    fn run(
        &self,
        bytes: &[u8],
        kind: ContentKind,
        profile: &ExtractionProfile,
        grouping: Grouping,
        id: &str,
        dir: &Path,
    ) -> Result<SessionOutcome> {
        let extractor = self
            .extractor
            .clone()
            .with_timeout(Duration::from_millis(profile.ocr_timeout_ms));
        let set = PatternSet::for_kind(profile.kind);

        let mut results = Vec::new();
        let mut pages_seen = 0u32;

        for page in self.rasterizer.rasterize(bytes, kind, profile.dpi)? {
            pages_seen += 1;
            let regions = match profile.roi_scope {
                RoiScope::Region => self.segmenter.segment(&page, profile.min_area),
                RoiScope::Page => vec![full_page_region(&page)],
            };
            for region in regions {
                let result =
                    self.process_region(&page, region, profile, &extractor, &set, dir)?;
                results.push(result);
            }
        }

        let summary = SessionSummary::from_results(pages_seen, &results);
        info!(
            session = %id,
            pages = summary.pages,
            regions = summary.total_regions,
            matched = summary.matched,
            "session assembled"
        );

        let session = Session {
            id: id.to_string(),
            created_at: Utc::now(),
            results,
            summary,
            dir: dir.to_path_buf(),
        };

        match grouping {
            Grouping::Combined => {
                session.write_manifest()?;
                Ok(SessionOutcome::Combined(session))
            }
            Grouping::Individual => {
                let children = split_individual(session)?;
                Ok(SessionOutcome::Individual(children))
            }
        }
    }

    fn process_region(
        &self,
        page: &Page,
        region: Region,
        profile: &ExtractionProfile,
        extractor: &OcrExtractor,
        set: &PatternSet,
        dir: &Path,
    ) -> Result<ExtractionResult> {
        let crop = crop_rgb(page.image(), region.bbox);
        let roi = roi_of(&crop, profile);
        let prepared = preprocess::prepare(roi, profile.clahe_clip);
        let outcome = extractor.extract_field(&prepared, &profile.languages, set);

        let fallback = format!("PAG{:02}_COMP{:02}", region.page_index, region.ordinal);
        let (identifier, value, source, raw_text) = match outcome {
            FieldOutcome::Matched { value, raw_text } => (
                value.clone(),
                Some(value),
                ValueSource::OcrMatched,
                Some(raw_text),
            ),
            FieldOutcome::NoMatch { raw_text } => {
                debug!(%fallback, "no pattern matched, using positional name");
                (fallback, None, ValueSource::FallbackPositional, Some(raw_text))
            }
            FieldOutcome::NoText => {
                (fallback, None, ValueSource::FallbackPositional, None)
            }
        };

        let image_file = unique_file_name(dir, &sanitize(&identifier));
        DynamicImage::ImageRgb8(crop).save(dir.join(&image_file))?;

        Ok(ExtractionResult {
            region,
            identifier,
            value,
            source,
            raw_text,
            image_file,
        })
    }
}

/// ROI of the crop per the profile, falling back to the whole crop when
/// the fractional window collapses to nothing.
fn roi_of(crop: &RgbImage, profile: &ExtractionProfile) -> GrayImage {
    profile
        .roi
        .apply(crop.width(), crop.height())
        .and_then(|rect| preprocess::crop_gray(crop, rect))
        .unwrap_or_else(|| DynamicImage::ImageRgb8(crop.clone()).to_luma8())
}

fn full_page_region(page: &Page) -> Region {
    let bbox = Rect {
        x: 0,
        y: 0,
        width: page.width(),
        height: page.height(),
    };
    Region {
        area: bbox.area(),
        bbox,
        page_index: page.index(),
        ordinal: 1,
    }
}

fn crop_rgb(image: &RgbImage, rect: Rect) -> RgbImage {
    imageops::crop_imm(image, rect.x, rect.y, rect.width, rect.height).to_image()
}

/// Replaces anything outside `[A-Za-z0-9._-]` so extracted values are
/// safe as file names.
fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "comp".to_string()
    } else {
        cleaned
    }
}

/// `<stem>.png`, with an increasing numeric suffix when earlier regions
/// already claimed the name. Ordinals restart per page, so uniqueness
/// has to come from the directory contents alone.
fn unique_file_name(dir: &Path, stem: &str) -> String {
    let plain = format!("{stem}.png");
    if !dir.join(&plain).exists() {
        return plain;
    }
    let mut n = 2u32;
    loop {
        let candidate = format!("{stem}_{n:02}.png");
        if !dir.join(&candidate).exists() {
            return candidate;
        }
        n += 1;
    }
}

/// Splits a combined session into one child session per result, moving
/// each crop into its own `<parent>_comp_<n>` directory.
fn split_individual(parent: Session) -> Result<Vec<Session>> {
    let root = match parent.dir.parent() {
        Some(root) => root.to_path_buf(),
        None => parent.dir.clone(),
    };

    let mut children = Vec::with_capacity(parent.results.len());
    for (i, result) in parent.results.into_iter().enumerate() {
        let child_id = format!("{}_comp_{}", parent.id, i + 1);
        let child_dir = root.join(&child_id);
        fs::create_dir_all(&child_dir)?;
        fs::rename(
            parent.dir.join(&result.image_file),
            child_dir.join(&result.image_file),
        )?;

        let summary = SessionSummary::from_results(1, std::slice::from_ref(&result));
        let child = Session {
            id: child_id,
            created_at: parent.created_at,
            results: vec![result],
            summary,
            dir: child_dir,
        };
        child.write_manifest()?;
        children.push(child);
    }

    if let Err(err) = fs::remove_dir_all(&parent.dir) {
        warn!(dir = %parent.dir.display(), error = %err, "could not remove parent session dir");
    }
    Ok(children)
}
