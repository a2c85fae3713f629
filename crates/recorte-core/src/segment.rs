//! Region segmentation - locating individual receipts on a page.
//!
//! The page goes through grayscale -> blur -> inverted adaptive
//! threshold -> morphological closing, so that the printed strokes of
//! each receipt merge into one solid blob without bridging the gutters
//! between receipts. External contours of the blobs become candidate
//! regions, filtered by area and shape and sorted into reading order.

use image::{DynamicImage, GrayImage, Luma};
use imageproc::contours::{find_contours, BorderType, Contour};
use imageproc::distance_transform::Norm;
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology::close;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::raster::Page;

/// Axis-aligned rectangle in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Center point, used for reading-order sorting.
    pub fn center(&self) -> (u32, u32) {
        (self.x + self.width / 2, self.y + self.height / 2)
    }
}

/// A detected receipt candidate on a page.
#[derive(Debug, Clone, Serialize)]
pub struct Region {
    /// Bounding box within the page.
    pub bbox: Rect,
    /// Bounding-box area in px^2.
    pub area: u64,
    /// 1-based page number this region was found on.
    pub page_index: u32,
    /// 1-based position in reading order (top-to-bottom, left-to-right).
    pub ordinal: u32,
}

/// Region segmenter.
///
/// The threshold block size and offset are the scan-tuned constants that
/// separate printed content from paper background on 144-300 DPI pages.
pub struct Segmenter {
    /// Adaptive threshold window (odd, in pixels).
    block_size: u32,
    /// Offset subtracted from the local mean; ink must be this much
    /// darker than its surroundings.
    offset: i32,
    /// Vertical tolerance when grouping regions into reading-order rows.
    row_tolerance: u32,
}

impl Default for Segmenter {
    fn default() -> Self {
        Self {
            block_size: 51,
            offset: 9,
            row_tolerance: 20,
        }
    }
}

impl Segmenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Find receipt regions on `page`, keeping only those with contour
    /// area of at least `min_area`. Returns an empty vec (never an
    /// error) when nothing qualifies.
    pub fn segment(&self, page: &Page, min_area: u64) -> Vec<Region> {
        let page_area = page.width() as u64 * page.height() as u64;
        let effective_min_area = effective_min_area(min_area, page_area);
        if effective_min_area != min_area {
            debug!(
                min_area,
                effective_min_area, "area threshold relaxed for small page"
            );
        }

        let gray: GrayImage =
            DynamicImage::ImageRgb8(page.image().clone()).to_luma8();

        // Equivalent of a 5x5 Gaussian kernel.
        let blurred = gaussian_blur_f32(&gray, 1.1);
        let mask = adaptive_threshold_inv(&blurred, self.block_size, self.offset);

        // Closing kernel scales with page width so a dense grid of small
        // receipts is not merged into one blob.
        let kernel = (page.width() / 100).clamp(10, 25);
        let closed = close(&mask, Norm::LInf, (kernel / 2).max(1) as u8);

        let contours: Vec<Contour<i32>> = find_contours(&closed);
        let mut boxes: Vec<(Rect, f64)> = Vec::new();

        for contour in &contours {
            if contour.border_type != BorderType::Outer {
                continue;
            }
            let Some(bbox) = contour_bbox(contour, page.width(), page.height())
            else {
                continue;
            };
            let poly_area = polygon_area(contour);

            if poly_area < effective_min_area as f64 {
                continue;
            }

            let aspect = bbox.width as f64 / bbox.height.max(1) as f64;
            if !(0.3..=3.0).contains(&aspect) || bbox.width <= 50 || bbox.height <= 50 {
                debug!(?bbox, poly_area, aspect, "contour rejected");
                continue;
            }

            boxes.push((bbox, poly_area));
        }

        // Reading order: rows by vertical center (within tolerance), then
        // left to right by horizontal center.
        let tol = self.row_tolerance.max(1);
        boxes.sort_by_key(|(bbox, _)| {
            let (cx, cy) = bbox.center();
            (cy / tol, cx)
        });

        let regions: Vec<Region> = boxes
            .into_iter()
            .enumerate()
            .map(|(i, (bbox, _))| Region {
                area: bbox.area(),
                bbox,
                page_index: page.index(),
                ordinal: i as u32 + 1,
            })
            .collect();

        if regions.is_empty() {
            warn!(page = page.index(), "no regions above area threshold");
        } else {
            debug!(page = page.index(), count = regions.len(), "regions found");
        }

        regions
    }
}

/// Cap outsized thresholds at 2% of the page area (floor 5000 px^2) so
/// dense grids of small receipts are not dropped wholesale. The cap is
/// uniform, which keeps the effective threshold non-decreasing in
/// `min_area`: lowering the requested threshold can never lose regions.
fn effective_min_area(min_area: u64, page_area: u64) -> u64 {
    min_area.min((page_area / 50).max(5_000))
}

/// Inverted mean-adaptive threshold: ink (darker than the local mean by
/// more than `offset`) becomes white, background black. A summed-area
/// table keeps the large window affordable on full pages.
fn adaptive_threshold_inv(image: &GrayImage, block_size: u32, offset: i32) -> GrayImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return image.clone();
    }

    let w = width as usize;
    let h = height as usize;

    // integral[y][x] = sum of pixels above and left of (x, y).
    let mut integral = vec![0u64; (w + 1) * (h + 1)];
    for y in 0..h {
        let mut row_sum = 0u64;
        for x in 0..w {
            row_sum += image.get_pixel(x as u32, y as u32)[0] as u64;
            integral[(y + 1) * (w + 1) + (x + 1)] =
                integral[y * (w + 1) + (x + 1)] + row_sum;
        }
    }

    let half = (block_size / 2) as i64;
    let mut out = GrayImage::new(width, height);

    for y in 0..h as i64 {
        for x in 0..w as i64 {
            let x0 = (x - half).max(0) as usize;
            let y0 = (y - half).max(0) as usize;
            let x1 = ((x + half + 1).min(w as i64)) as usize;
            let y1 = ((y + half + 1).min(h as i64)) as usize;

            let count = ((x1 - x0) * (y1 - y0)) as u64;
            let sum = integral[y1 * (w + 1) + x1] + integral[y0 * (w + 1) + x0]
                - integral[y0 * (w + 1) + x1]
                - integral[y1 * (w + 1) + x0];
            let mean = (sum / count) as i32;

            let pixel = image.get_pixel(x as u32, y as u32)[0] as i32;
            let value = if pixel <= mean - offset { 255 } else { 0 };
            out.put_pixel(x as u32, y as u32, Luma([value]));
        }
    }

    out
}

/// Bounding box of a contour, clamped to the page.
fn contour_bbox(contour: &Contour<i32>, width: u32, height: u32) -> Option<Rect> {
    let mut min_x = i32::MAX;
    let mut min_y = i32::MAX;
    let mut max_x = i32::MIN;
    let mut max_y = i32::MIN;

    for p in &contour.points {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }

    if contour.points.is_empty() {
        return None;
    }

    let x = min_x.clamp(0, width.saturating_sub(1) as i32) as u32;
    let y = min_y.clamp(0, height.saturating_sub(1) as i32) as u32;
    let x1 = (max_x.max(0) as u32 + 1).min(width);
    let y1 = (max_y.max(0) as u32 + 1).min(height);

    if x1 <= x || y1 <= y {
        return None;
    }

    Some(Rect {
        x,
        y,
        width: x1 - x,
        height: y1 - y,
    })
}

/// Shoelace area of the contour polygon.
fn polygon_area(contour: &Contour<i32>) -> f64 {
    let pts = &contour.points;
    if pts.len() < 3 {
        return 0.0;
    }

    let mut area = 0.0f64;
    for i in 0..pts.len() {
        let j = (i + 1) % pts.len();
        area += pts[i].x as f64 * pts[j].y as f64;
        area -= pts[j].x as f64 * pts[i].y as f64;
    }
    (area / 2.0).abs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use pretty_assertions::assert_eq;

    /// White page with solid dark rectangles drawn on it.
    fn page_with_rects(width: u32, height: u32, rects: &[Rect]) -> Page {
        let mut img = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));
        for r in rects {
            for y in r.y..(r.y + r.height).min(height) {
                for x in r.x..(r.x + r.width).min(width) {
                    img.put_pixel(x, y, Rgb([20, 20, 20]));
                }
            }
        }
        Page::new(1, img)
    }

    fn rect(x: u32, y: u32, width: u32, height: u32) -> Rect {
        Rect { x, y, width, height }
    }

    #[test]
    fn blank_page_yields_no_regions() {
        let page = page_with_rects(600, 800, &[]);
        let regions = Segmenter::new().segment(&page, 10_000);
        assert!(regions.is_empty());
    }

    #[test]
    fn detects_two_stacked_receipts_in_order() {
        let page = page_with_rects(
            600,
            900,
            &[rect(60, 80, 300, 220), rect(60, 500, 300, 220)],
        );
        let regions = Segmenter::new().segment(&page, 20_000);

        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].ordinal, 1);
        assert_eq!(regions[1].ordinal, 2);
        // Top receipt first.
        assert!(regions[0].bbox.y < regions[1].bbox.y);
        // Boxes land close to where the rectangles were drawn.
        assert!(regions[0].bbox.y.abs_diff(80) <= 10);
        assert!(regions[1].bbox.y.abs_diff(500) <= 10);
    }

    #[test]
    fn same_row_sorts_left_to_right() {
        let page = page_with_rects(
            900,
            500,
            &[rect(480, 100, 300, 220), rect(60, 104, 300, 220)],
        );
        let regions = Segmenter::new().segment(&page, 20_000);

        assert_eq!(regions.len(), 2);
        assert!(regions[0].bbox.x < regions[1].bbox.x);
    }

    #[test]
    fn area_filter_is_monotone_in_min_area() {
        let page = page_with_rects(
            700,
            1000,
            &[
                rect(50, 50, 320, 240),
                rect(50, 600, 120, 110),
                rect(350, 620, 200, 150),
            ],
        );
        let segmenter = Segmenter::new();

        let loose = segmenter.segment(&page, 8_000);
        // Thresholds below, at, and above the cap boundary: each strict
        // result set must be a subset of the looser one.
        for threshold in [30_000, 45_000, 60_000] {
            let strict = segmenter.segment(&page, threshold);
            assert!(loose.len() >= strict.len());
            for r in &strict {
                assert!(loose.iter().any(|l| l.bbox == r.bbox));
            }
        }
    }

    #[test]
    fn capped_threshold_never_beats_a_lower_one() {
        // A mid-sized receipt well under both requested thresholds.
        let page = page_with_rects(
            700,
            1000,
            &[rect(350, 620, 200, 150)],
        );
        let segmenter = Segmenter::new();

        let relieved = segmenter.segment(&page, 60_000);
        let plain = segmenter.segment(&page, 45_000);
        assert_eq!(relieved.len(), plain.len());
    }

    #[test]
    fn min_area_relaxed_for_small_pages() {
        // 50k threshold against a page of 240k px^2 is over the cap.
        assert_eq!(effective_min_area(50_000, 240_000), 5_000);
        // Large page keeps the caller's threshold.
        assert_eq!(effective_min_area(50_000, 4_000_000), 50_000);
        // The cap is uniform: a higher requested threshold never yields
        // a lower effective one.
        assert_eq!(effective_min_area(60_000, 1_000_000), 20_000);
        assert_eq!(effective_min_area(45_000, 1_000_000), 20_000);
    }

    #[test]
    fn shoelace_area_of_square() {
        use imageproc::point::Point;
        let contour = Contour {
            points: vec![
                Point::new(0, 0),
                Point::new(10, 0),
                Point::new(10, 10),
                Point::new(0, 10),
            ],
            border_type: BorderType::Outer,
            parent: None,
        };
        assert_eq!(polygon_area(&contour), 100.0);
    }

    #[test]
    fn adaptive_threshold_marks_ink_not_flat_background() {
        let mut img = GrayImage::from_pixel(120, 120, Luma([220u8]));
        // A dark stroke across the middle.
        for x in 20..100 {
            for y in 58..62 {
                img.put_pixel(x, y, Luma([10u8]));
            }
        }
        let mask = adaptive_threshold_inv(&img, 51, 9);

        assert_eq!(mask.get_pixel(60, 60)[0], 255);
        assert_eq!(mask.get_pixel(5, 5)[0], 0);
    }
}
