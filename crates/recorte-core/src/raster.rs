//! Page rasterization - turning input bytes into per-page images.
//!
//! PDFs render through pdfium at the profile's DPI; plain images pass
//! through as a single synthetic page. Rasterization failures are the
//! fatal end of the error taxonomy: everything downstream degrades
//! gracefully, but a document we cannot decode aborts the request.

use image::RgbImage;
use pdfium_render::prelude::*;
use tracing::debug;

use crate::error::RasterError;

/// Ceiling on either rendered dimension, to keep pathological page sizes
/// from exhausting memory.
const MAX_DIMENSION: u32 = 4000;

/// Declared content kind of an input document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Pdf,
    Image,
}

impl ContentKind {
    /// Classify raw bytes by magic prefix (`%PDF` vs. anything else the
    /// image decoder might accept).
    pub fn sniff(bytes: &[u8]) -> ContentKind {
        if bytes.len() >= 4 && &bytes[0..4] == b"%PDF" {
            ContentKind::Pdf
        } else {
            ContentKind::Image
        }
    }

    /// Map a declared MIME type onto a kind, `None` for anything we do
    /// not rasterize.
    pub fn from_mime(mime: &str) -> Option<ContentKind> {
        match mime {
            "application/pdf" => Some(ContentKind::Pdf),
            "image/png" | "image/jpeg" | "image/jpg" | "image/tiff"
            | "image/bmp" | "image/webp" => Some(ContentKind::Image),
            _ => None,
        }
    }

    /// Like [`ContentKind::from_mime`] but fails with
    /// [`RasterError::UnsupportedFormat`] for unknown types.
    pub fn from_declared(mime: &str) -> Result<ContentKind, RasterError> {
        Self::from_mime(mime)
            .ok_or_else(|| RasterError::UnsupportedFormat(mime.to_string()))
    }
}

/// One rasterized page. Immutable once created; pages are discarded as
/// soon as their regions have been extracted.
#[derive(Debug, Clone)]
pub struct Page {
    index: u32,
    image: RgbImage,
}

impl Page {
    pub fn new(index: u32, image: RgbImage) -> Self {
        Self { index, image }
    }

    /// 1-based page number.
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }
}

/// Finite, non-restartable sequence of pages in document order.
pub struct Pages(std::vec::IntoIter<Page>);

impl Iterator for Pages {
    type Item = Page;

    fn next(&mut self) -> Option<Page> {
        self.0.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.0.size_hint()
    }
}

impl ExactSizeIterator for Pages {}

/// Rasterizer for PDF and image inputs.
///
/// The pdfium binding is resolved lazily on the first PDF request, so
/// image-only workloads never need the native library.
#[derive(Default)]
pub struct Rasterizer;

impl Rasterizer {
    pub fn new() -> Self {
        Self
    }

    /// Rasterize `bytes` of the declared `kind` at `dpi`.
    pub fn rasterize(
        &self,
        bytes: &[u8],
        kind: ContentKind,
        dpi: u32,
    ) -> Result<Pages, RasterError> {
        let pages = match kind {
            ContentKind::Image => vec![self.decode_image(bytes)?],
            ContentKind::Pdf => self.render_pdf(bytes, dpi)?,
        };
        Ok(Pages(pages.into_iter()))
    }

    fn decode_image(&self, bytes: &[u8]) -> Result<Page, RasterError> {
        let img = image::load_from_memory(bytes)
            .map_err(|e| RasterError::CorruptInput(e.to_string()))?;
        debug!(width = img.width(), height = img.height(), "decoded image input");
        Ok(Page::new(1, img.to_rgb8()))
    }

    fn render_pdf(&self, bytes: &[u8], dpi: u32) -> Result<Vec<Page>, RasterError> {
        let pdfium = bind_pdfium()?;
        let document = pdfium
            .load_pdf_from_byte_slice(bytes, None)
            .map_err(|e| RasterError::CorruptInput(e.to_string()))?;

        let page_count = document.pages().len();
        if page_count == 0 {
            return Err(RasterError::NoPages);
        }

        debug!(pages = page_count, dpi, "rendering pdf");

        let mut pages = Vec::with_capacity(page_count as usize);
        for (idx, page) in document.pages().iter().enumerate() {
            let image = render_page(&page, dpi).map_err(|e| {
                RasterError::CorruptInput(format!("page {}: {}", idx + 1, e))
            })?;
            pages.push(Page::new(idx as u32 + 1, image));
        }

        Ok(pages)
    }
}

fn bind_pdfium() -> Result<Pdfium, RasterError> {
    let bindings = Pdfium::bind_to_library(
        Pdfium::pdfium_platform_library_name_at_path("./"),
    )
    .or_else(|_| {
        Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(
            "/usr/lib",
        ))
    })
    .or_else(|_| {
        Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(
            "/usr/local/lib",
        ))
    })
    .or_else(|_| Pdfium::bind_to_system_library())
    .map_err(|e| RasterError::Backend(e.to_string()))?;

    Ok(Pdfium::new(bindings))
}

fn render_page(page: &PdfPage, dpi: u32) -> Result<RgbImage, PdfiumError> {
    let width_points = page.width().value;
    let height_points = page.height().value;

    // 72 PDF points per inch.
    let scale = dpi as f32 / 72.0;
    let mut width_px = (width_points * scale) as u32;
    let mut height_px = (height_points * scale) as u32;

    if width_px > MAX_DIMENSION || height_px > MAX_DIMENSION {
        let ratio = if width_px > height_px {
            MAX_DIMENSION as f32 / width_px as f32
        } else {
            MAX_DIMENSION as f32 / height_px as f32
        };
        width_px = (width_px as f32 * ratio) as u32;
        height_px = (height_px as f32 * ratio) as u32;
    }

    let render_config = PdfRenderConfig::new()
        .set_target_width(width_px as i32)
        .set_target_height(height_px as i32)
        .render_form_data(true)
        .render_annotations(true);

    let bitmap = page.render_with_config(&render_config)?;
    Ok(bitmap.as_image().to_rgb8())
}
