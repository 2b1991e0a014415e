//! Canny edge map over a single 5x5 Gaussian pass.
//!
//! Blur and gradients are kept in integer arithmetic (the blurred image is
//! scaled by 256), so the two pixels either side of a clean step get exactly
//! equal gradient magnitude. Non-maximum suppression then keeps the pixel on
//! the brighter side of the step.

use image::{GrayImage, ImageBuffer, Luma};
use imageproc::definitions::Image;
use imageproc::filter::{filter3x3, separable_filter_equal};
use imageproc::gradients::{HORIZONTAL_SOBEL, VERTICAL_SOBEL};

/// Binomial 5-tap Gaussian. The outer product sums to `BLUR_SCALE`.
const GAUSSIAN_5: [i32; 5] = [1, 4, 6, 4, 1];
const BLUR_SCALE: i32 = 256;

/// Neighbour offsets by 45° sector, counter-clockwise from +x with y pointing down.
const SECTOR_STEPS: [(isize, isize); 8] = [
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
];

/// 5x5 Gaussian blur, returned at 256x scale so no precision is lost.
pub fn gaussian_blur_5x5(gray: &GrayImage) -> Image<Luma<u16>> {
    let widened: Image<Luma<u16>> =
        ImageBuffer::from_fn(gray.width(), gray.height(), |x, y| Luma([gray.get_pixel(x, y).0[0] as u16]));
    separable_filter_equal(&widened, &GAUSSIAN_5)
}

/// Binary edge map (255 = edge). Gradient strength is `|gx| + |gy|` of the
/// Sobel operator on the blurred image. Pixels above `high` seed edges, which
/// then grow through 8-connected pixels above `low`.
pub fn canny_5x5(gray: &GrayImage, low: f32, high: f32) -> GrayImage {
    let (width, height) = gray.dimensions();
    if width < 3 || height < 3 {
        return GrayImage::new(width, height);
    }

    let blurred = gaussian_blur_5x5(gray);
    let gx = filter3x3::<Luma<u16>, i32, i32>(&blurred, &HORIZONTAL_SOBEL);
    let gy = filter3x3::<Luma<u16>, i32, i32>(&blurred, &VERTICAL_SOBEL);
    let magnitude: Vec<i32> = gx.iter().zip(gy.iter()).map(|(h, v)| h.abs() + v.abs()).collect();

    let thinned = suppress_non_maxima(&magnitude, &gx, &gy, width as usize, height as usize);
    hysteresis(&thinned, width, height, scaled(low), scaled(high))
}

fn scaled(threshold: f32) -> i32 {
    (threshold * BLUR_SCALE as f32).round() as i32
}

/// Step towards increasing intensity, snapped to the nearest of 8 directions.
fn uphill(gx: i32, gy: i32) -> (isize, isize) {
    let angle = (gy as f32).atan2(gx as f32).to_degrees();
    let sector = ((angle / 45.0).round() as i32).rem_euclid(8) as usize;
    SECTOR_STEPS[sector]
}

/// A pixel survives when it beats its uphill neighbour and is no weaker than
/// its downhill one. Border pixels never survive.
fn suppress_non_maxima(
    magnitude: &[i32],
    gx: &Image<Luma<i32>>,
    gy: &Image<Luma<i32>>,
    width: usize,
    height: usize,
) -> Vec<i32> {
    let mut out = vec![0; magnitude.len()];
    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let i = y * width + x;
            let m = magnitude[i];
            if m == 0 {
                continue;
            }
            let (dx, dy) = uphill(gx.as_raw()[i], gy.as_raw()[i]);
            let ahead = magnitude[y.wrapping_add_signed(dy) * width + x.wrapping_add_signed(dx)];
            let behind = magnitude[y.wrapping_add_signed(-dy) * width + x.wrapping_add_signed(-dx)];
            if m > ahead && m >= behind {
                out[i] = m;
            }
        }
    }
    out
}

fn hysteresis(thinned: &[i32], width: u32, height: u32, low: i32, high: i32) -> GrayImage {
    let mut edges = GrayImage::new(width, height);
    let w = width as usize;
    let marks: &mut [u8] = &mut edges;
    let mut stack = Vec::new();

    for seed in 0..thinned.len() {
        if thinned[seed] <= high || marks[seed] != 0 {
            continue;
        }
        marks[seed] = 255;
        stack.push(seed);
        // Only interior pixels are non-zero, so neighbours stay in bounds.
        while let Some(i) = stack.pop() {
            for dy in [-1isize, 0, 1] {
                for dx in [-1isize, 0, 1] {
                    let n = (i / w).wrapping_add_signed(dy) * w + (i % w).wrapping_add_signed(dx);
                    if thinned[n] > low && marks[n] == 0 {
                        marks[n] = 255;
                        stack.push(n);
                    }
                }
            }
        }
    }
    edges
}
