//! ROI preprocessing - getting a crop ready for OCR.
//!
//! Narrow crops are upscaled, uneven scan lighting is normalized with
//! CLAHE, and Otsu binarization produces the clean black/white image the
//! engines read best. The intermediate images are kept because the
//! extractor retries OCR on the enhanced and raw crops when the binary
//! one yields nothing.

use image::{imageops, DynamicImage, GrayImage, RgbImage};
use imageproc::contrast::{otsu_level, threshold, ThresholdType};
use tracing::debug;

use crate::segment::Rect;

/// Minimum ROI width in pixels before we upscale for OCR.
const MIN_OCR_WIDTH: u32 = 300;

/// CLAHE tile grid (8x8, the usual default).
const CLAHE_TILES: u32 = 8;

/// A ROI prepared for OCR, with its intermediate stages.
pub struct PreparedRoi {
    /// Otsu-binarized image - the primary OCR input.
    pub binary: GrayImage,
    /// CLAHE-enhanced grayscale - first retry.
    pub enhanced: GrayImage,
    /// Plain (possibly upscaled) grayscale crop - last retry.
    pub raw: GrayImage,
}

impl PreparedRoi {
    /// OCR attempt ladder, best candidate first.
    pub fn candidates(&self) -> [&GrayImage; 3] {
        [&self.binary, &self.enhanced, &self.raw]
    }
}

/// Crop `rect` out of an RGB image as grayscale. `rect` is clamped to
/// the image bounds; returns `None` if nothing remains.
pub fn crop_gray(image: &RgbImage, rect: Rect) -> Option<GrayImage> {
    let (w, h) = image.dimensions();
    if rect.x >= w || rect.y >= h {
        return None;
    }
    let cw = rect.width.min(w - rect.x);
    let ch = rect.height.min(h - rect.y);
    if cw == 0 || ch == 0 {
        return None;
    }

    let cropped = imageops::crop_imm(image, rect.x, rect.y, cw, ch).to_image();
    Some(DynamicImage::ImageRgb8(cropped).to_luma8())
}

/// Run the full preprocessing pipeline on a grayscale crop.
pub fn prepare(mut roi: GrayImage, clahe_clip: f32) -> PreparedRoi {
    // Upscale narrow ROIs with an integer factor; cubic interpolation
    // keeps the glyph edges smooth enough for OCR.
    if roi.width() < MIN_OCR_WIDTH && roi.width() > 0 {
        let scale = MIN_OCR_WIDTH / roi.width() + 1;
        debug!(width = roi.width(), scale, "upscaling narrow roi");
        roi = imageops::resize(
            &roi,
            roi.width() * scale,
            roi.height() * scale,
            imageops::FilterType::CatmullRom,
        );
    }

    let enhanced = clahe(&roi, clahe_clip, CLAHE_TILES, CLAHE_TILES);
    let level = otsu_level(&enhanced);
    let binary = threshold(&enhanced, level, ThresholdType::Binary);

    PreparedRoi {
        binary,
        enhanced,
        raw: roi,
    }
}

/// Contrast-limited adaptive histogram equalization.
///
/// Per-tile histograms are clipped at `clip_limit` times the uniform bin
/// height and the excess redistributed, then each pixel bilinearly
/// interpolates between the equalization LUTs of its four surrounding
/// tile centers.
pub fn clahe(image: &GrayImage, clip_limit: f32, tiles_x: u32, tiles_y: u32) -> GrayImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return image.clone();
    }

    let tiles_x = tiles_x.clamp(1, width) as usize;
    let tiles_y = tiles_y.clamp(1, height) as usize;
    let tile_w = width.div_ceil(tiles_x as u32);
    let tile_h = height.div_ceil(tiles_y as u32);

    // Build one 256-entry LUT per tile.
    let mut luts = vec![[0u8; 256]; tiles_x * tiles_y];
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let x0 = tx as u32 * tile_w;
            let y0 = ty as u32 * tile_h;
            let x1 = (x0 + tile_w).min(width);
            let y1 = (y0 + tile_h).min(height);

            let mut hist = [0u32; 256];
            let mut count = 0u32;
            for y in y0..y1 {
                for x in x0..x1 {
                    hist[image.get_pixel(x, y)[0] as usize] += 1;
                    count += 1;
                }
            }
            if count == 0 {
                continue;
            }

            // Clip and redistribute the excess uniformly.
            let clip = ((clip_limit * count as f32 / 256.0).max(1.0)) as u32;
            let mut excess = 0u32;
            for bin in hist.iter_mut() {
                if *bin > clip {
                    excess += *bin - clip;
                    *bin = clip;
                }
            }
            let bonus = excess / 256;
            for bin in hist.iter_mut() {
                *bin += bonus;
            }

            // CDF -> LUT.
            let mut cdf = 0u64;
            let total: u64 = hist.iter().map(|&v| v as u64).sum();
            let lut = &mut luts[ty * tiles_x + tx];
            for (value, &bin) in hist.iter().enumerate() {
                cdf += bin as u64;
                lut[value] = ((cdf * 255) / total.max(1)) as u8;
            }
        }
    }

    // Bilinear interpolation between tile LUTs.
    let mut out = GrayImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let value = image.get_pixel(x, y)[0] as usize;

            // Position relative to tile centers.
            let fx = (x as f32 - tile_w as f32 / 2.0) / tile_w as f32;
            let fy = (y as f32 - tile_h as f32 / 2.0) / tile_h as f32;

            let tx0 = (fx.max(0.0).floor() as usize).min(tiles_x - 1);
            let ty0 = (fy.max(0.0).floor() as usize).min(tiles_y - 1);
            let tx1 = (tx0 + 1).min(tiles_x - 1);
            let ty1 = (ty0 + 1).min(tiles_y - 1);

            // Before the first tile center the edge tile stands alone; a
            // negative fractional offset must not pull in a neighbor.
            let wx = if fx < 0.0 { 0.0 } else { fx - fx.floor() };
            let wy = if fy < 0.0 { 0.0 } else { fy - fy.floor() };

            let v00 = luts[ty0 * tiles_x + tx0][value] as f32;
            let v01 = luts[ty0 * tiles_x + tx1][value] as f32;
            let v10 = luts[ty1 * tiles_x + tx0][value] as f32;
            let v11 = luts[ty1 * tiles_x + tx1][value] as f32;

            let top = v00 * (1.0 - wx) + v01 * wx;
            let bottom = v10 * (1.0 - wx) + v11 * wx;
            let blended = top * (1.0 - wy) + bottom * wy;

            out.put_pixel(x, y, image::Luma([blended.round() as u8]));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Luma, Rgb};
    use pretty_assertions::assert_eq;

    fn gradient_gray(width: u32, height: u32) -> GrayImage {
        ImageBuffer::from_fn(width, height, |x, _| {
            Luma([(x * 255 / width.max(1)) as u8])
        })
    }

    #[test]
    fn crop_clamps_to_image_bounds() {
        let img = RgbImage::from_pixel(100, 80, Rgb([200, 200, 200]));
        let crop = crop_gray(
            &img,
            Rect { x: 60, y: 40, width: 100, height: 100 },
        )
        .unwrap();
        assert_eq!((crop.width(), crop.height()), (40, 40));
    }

    #[test]
    fn crop_outside_image_is_none() {
        let img = RgbImage::from_pixel(50, 50, Rgb([0, 0, 0]));
        assert!(crop_gray(&img, Rect { x: 60, y: 0, width: 10, height: 10 }).is_none());
    }

    #[test]
    fn narrow_roi_is_upscaled_by_integer_factor() {
        let roi = GrayImage::from_pixel(120, 40, Luma([128u8]));
        let prepared = prepare(roi, 3.0);
        // 300 / 120 + 1 = 3
        assert_eq!(prepared.raw.width(), 360);
        assert_eq!(prepared.raw.height(), 120);
        assert_eq!(prepared.binary.width(), 360);
    }

    #[test]
    fn wide_roi_keeps_its_size() {
        let roi = GrayImage::from_pixel(400, 100, Luma([128u8]));
        let prepared = prepare(roi, 2.0);
        assert_eq!(prepared.raw.width(), 400);
    }

    #[test]
    fn binary_output_is_black_and_white_only() {
        let mut roi = gradient_gray(400, 120);
        // Some dark "text" so Otsu has two classes.
        for x in 40..200 {
            for y in 50..60 {
                roi.put_pixel(x, y, Luma([5u8]));
            }
        }
        let prepared = prepare(roi, 3.0);
        assert!(prepared
            .binary
            .pixels()
            .all(|p| p[0] == 0 || p[0] == 255));
    }

    #[test]
    fn clahe_spreads_a_flat_low_contrast_band() {
        // Pixels packed into 100..140 should spread over a wider range.
        let img: GrayImage = ImageBuffer::from_fn(160, 160, |x, _| {
            Luma([100 + (x % 40) as u8])
        });
        let enhanced = clahe(&img, 3.0, 8, 8);

        let (mut min, mut max) = (255u8, 0u8);
        for p in enhanced.pixels() {
            min = min.min(p[0]);
            max = max.max(p[0]);
        }
        let input_range = 39u8;
        assert!(max - min > input_range, "range {} not expanded", max - min);
    }

    #[test]
    fn clahe_is_stable_on_uniform_input() {
        let img = GrayImage::from_pixel(64, 64, Luma([180u8]));
        let enhanced = clahe(&img, 2.0, 8, 8);
        assert_eq!((enhanced.width(), enhanced.height()), (64, 64));
        // A uniform image must stay uniform (single gray level out).
        let first = enhanced.get_pixel(0, 0)[0];
        assert!(enhanced.pixels().all(|p| p[0] == first));
    }

    #[test]
    fn clahe_edge_pixels_use_their_own_tile() {
        // Left half dark, right half bright, one tile per half. The
        // top-left corner pixel sits before the first tile center and
        // must map through the left tile's LUT alone, not a blend with
        // the bright tile's.
        let img: GrayImage = ImageBuffer::from_fn(32, 32, |x, _| {
            if x < 16 {
                Luma([50u8])
            } else {
                Luma([200u8])
            }
        });
        let enhanced = clahe(&img, 2.0, 2, 2);
        // Uniform left tile equalizes 50 to full white; any bleed from
        // the right tile (where 50 maps to 0) would pull this down.
        assert_eq!(enhanced.get_pixel(0, 0)[0], 255);
    }

    #[test]
    fn candidates_ladder_order() {
        let prepared = prepare(GrayImage::from_pixel(320, 50, Luma([90u8])), 3.0);
        let [first, second, third] = prepared.candidates();
        assert_eq!(first.dimensions(), prepared.binary.dimensions());
        assert_eq!(second.dimensions(), prepared.enhanced.dimensions());
        assert_eq!(third.dimensions(), prepared.raw.dimensions());
    }
}
