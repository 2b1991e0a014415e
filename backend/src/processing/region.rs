use image::{RgbImage, imageops};
use imageproc::contours::{BorderType, Contour, find_contours};

use super::color::to_gray;
use super::edges::canny_5x5;

/// Axis-aligned box in pixel coordinates, `width`/`height` in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropBox {
    /// Grow by `margin` on every side, then clip to a `bounds_w x bounds_h` image.
    pub fn expand_clamped(&self, margin: u32, bounds_w: u32, bounds_h: u32) -> CropBox {
        let x0 = self.x.saturating_sub(margin);
        let y0 = self.y.saturating_sub(margin);
        let x1 = (self.x + self.width + margin).min(bounds_w);
        let y1 = (self.y + self.height + margin).min(bounds_h);
        CropBox {
            x: x0,
            y: y0,
            width: x1.saturating_sub(x0),
            height: y1.saturating_sub(y0),
        }
    }
}

/// Finds the dominant foliage region from its outer edge contour.
#[derive(Debug, Clone)]
pub struct RegionDetector {
    /// Hysteresis thresholds on `|gx| + |gy|` after the 5x5 blur.
    low_threshold: f32,
    high_threshold: f32,
    margin: u32,
}

impl Default for RegionDetector {
    fn default() -> Self {
        Self {
            low_threshold: 50.0,
            high_threshold: 150.0,
            margin: 20,
        }
    }
}

impl RegionDetector {
    /// Box to crop to, or `None` when the edge map has no contours.
    pub fn locate(&self, image: &RgbImage) -> Option<CropBox> {
        let edges = canny_5x5(&to_gray(image), self.low_threshold, self.high_threshold);

        let contours = find_contours::<i32>(&edges);
        let outer = contours
            .iter()
            .filter(|c| matches!(c.border_type, BorderType::Outer) && c.parent.is_none())
            .filter_map(|c| Some((contour_area(c), bounding_box(c)?)));

        let largest = select_largest(outer)?;
        Some(largest.expand_clamped(self.margin, image.width(), image.height()))
    }

    /// Crop to the located region. An image without contours comes back as-is.
    pub fn isolate(&self, image: RgbImage) -> RgbImage {
        match self.locate(&image) {
            Some(region) => {
                log::debug!(
                    "Cropping to region x={} y={} {}x{} of {}x{}",
                    region.x,
                    region.y,
                    region.width,
                    region.height,
                    image.width(),
                    image.height()
                );
                imageops::crop_imm(&image, region.x, region.y, region.width, region.height)
                    .to_image()
            }
            None => {
                log::debug!("No contours found, keeping full frame");
                image
            }
        }
    }
}

/// Largest area wins. Equal areas go to the box nearest the top, then the left.
fn select_largest(candidates: impl Iterator<Item = (f64, CropBox)>) -> Option<CropBox> {
    candidates
        .fold(None, |best: Option<(f64, CropBox)>, (area, bbox)| match best {
            None => Some((area, bbox)),
            Some((best_area, best_box)) => {
                let wins = area > best_area
                    || (area == best_area && (bbox.y, bbox.x) < (best_box.y, best_box.x));
                if wins {
                    Some((area, bbox))
                } else {
                    Some((best_area, best_box))
                }
            }
        })
        .map(|(_, bbox)| bbox)
}

/// Shoelace area of the closed polygon through the contour points.
fn contour_area(contour: &Contour<i32>) -> f64 {
    let points = &contour.points;
    if points.len() < 3 {
        return 0.0;
    }
    let twice: i64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(p, q)| p.x as i64 * q.y as i64 - q.x as i64 * p.y as i64)
        .sum();
    twice.abs() as f64 / 2.0
}

fn bounding_box(contour: &Contour<i32>) -> Option<CropBox> {
    let first = contour.points.first()?;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
    for p in &contour.points {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    Some(CropBox {
        x: min_x.max(0) as u32,
        y: min_y.max(0) as u32,
        width: (max_x - min_x + 1) as u32,
        height: (max_y - min_y + 1) as u32,
    })
}
