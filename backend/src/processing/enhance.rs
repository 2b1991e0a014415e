use image::{GrayImage, Luma, RgbImage};

use super::color::{lab_to_rgb, rgb_to_lab};

const HIST_BINS: usize = 256;

/// Local contrast correction on the lightness channel only.
#[derive(Debug, Clone)]
pub struct ImageEnhancer {
    clip_limit: f32,
    tiles: (u32, u32),
}

impl Default for ImageEnhancer {
    fn default() -> Self {
        Self {
            clip_limit: 3.0,
            tiles: (8, 8),
        }
    }
}

impl ImageEnhancer {
    /// RGB -> Lab, CLAHE on L, Lab -> RGB. `a`/`b` pass through untouched.
    pub fn enhance(&self, image: &RgbImage) -> RgbImage {
        if image.width() == 0 || image.height() == 0 {
            return image.clone();
        }
        let [l, a, b] = rgb_to_lab(image);
        let l = clahe(&l, self.clip_limit, self.tiles);
        lab_to_rgb(&[l, a, b])
    }
}

/// Mirror index without repeating the edge sample (`dcb|abcd|cba`).
fn reflect101(i: u32, len: u32) -> u32 {
    if len == 1 {
        return 0;
    }
    let period = 2 * (len - 1);
    let i = i % period;
    if i < len { i } else { period - i }
}

/// Contrast-limited adaptive histogram equalization.
///
/// The image is split into a `tiles.0 x tiles.1` grid, padded by reflection when
/// its size is not a multiple of the grid. Each tile gets a clipped, equalized
/// lookup table and every output pixel is bilinearly blended from the four
/// nearest tile tables.
pub fn clahe(src: &GrayImage, clip_limit: f32, tiles: (u32, u32)) -> GrayImage {
    let (width, height) = src.dimensions();
    let (tiles_x, tiles_y) = (tiles.0.max(1), tiles.1.max(1));
    let tile_w = width.div_ceil(tiles_x);
    let tile_h = height.div_ceil(tiles_y);
    let tile_area = (tile_w * tile_h) as usize;

    let clip = if clip_limit > 0.0 {
        ((clip_limit * tile_area as f32 / HIST_BINS as f32) as usize).max(1)
    } else {
        usize::MAX
    };
    let lut_scale = 255.0 / tile_area as f32;

    let mut luts = vec![[0u8; HIST_BINS]; (tiles_x * tiles_y) as usize];
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let mut hist = [0usize; HIST_BINS];
            for y in ty * tile_h..(ty + 1) * tile_h {
                let sy = reflect101(y, height);
                for x in tx * tile_w..(tx + 1) * tile_w {
                    let sx = reflect101(x, width);
                    hist[src.get_pixel(sx, sy).0[0] as usize] += 1;
                }
            }

            clip_histogram(&mut hist, clip);

            let lut = &mut luts[(ty * tiles_x + tx) as usize];
            let mut sum = 0usize;
            for (bin, count) in hist.iter().enumerate() {
                sum += count;
                lut[bin] = (sum as f32 * lut_scale).round().min(255.0) as u8;
            }
        }
    }

    let inv_tw = 1.0 / tile_w as f32;
    let inv_th = 1.0 / tile_h as f32;
    let mut out = GrayImage::new(width, height);

    for y in 0..height {
        let tyf = y as f32 * inv_th - 0.5;
        let ty1 = tyf.floor() as i64;
        let ya = tyf - ty1 as f32;
        let ty2 = (ty1 + 1).min(tiles_y as i64 - 1) as u32;
        let ty1 = ty1.max(0) as u32;

        for x in 0..width {
            let txf = x as f32 * inv_tw - 0.5;
            let tx1 = txf.floor() as i64;
            let xa = txf - tx1 as f32;
            let tx2 = (tx1 + 1).min(tiles_x as i64 - 1) as u32;
            let tx1 = tx1.max(0) as u32;

            let v = src.get_pixel(x, y).0[0] as usize;
            let at = |tx: u32, ty: u32| luts[(ty * tiles_x + tx) as usize][v] as f32;

            let top = at(tx1, ty1) * (1.0 - xa) + at(tx2, ty1) * xa;
            let bottom = at(tx1, ty2) * (1.0 - xa) + at(tx2, ty2) * xa;
            let value = top * (1.0 - ya) + bottom * ya;
            out.put_pixel(x, y, Luma([value.round().clamp(0.0, 255.0) as u8]));
        }
    }

    out
}

/// Cap every bin at `clip` and spread the excess evenly, remainder first-come.
fn clip_histogram(hist: &mut [usize; HIST_BINS], clip: usize) {
    let mut clipped = 0usize;
    for count in hist.iter_mut() {
        if *count > clip {
            clipped += *count - clip;
            *count = clip;
        }
    }

    let batch = clipped / HIST_BINS;
    let mut residual = clipped - batch * HIST_BINS;
    for count in hist.iter_mut() {
        *count += batch;
    }
    if residual > 0 {
        let step = (HIST_BINS / residual).max(1);
        let mut i = 0;
        while i < HIST_BINS && residual > 0 {
            hist[i] += 1;
            residual -= 1;
            i += step;
        }
    }
}
