//! Colour-space helpers shared by the conditioning stages.
//!
//! Lab values use the 8-bit encoding common to imaging libraries:
//! `L` is scaled from `[0, 100]` to `[0, 255]`, `a` and `b` are offset by 128.
//! White point is D65 and the RGB input is gamma-encoded sRGB.

use image::{GrayImage, Luma, Rgb, RgbImage};

const XYZ_FROM_RGB: [[f32; 3]; 3] = [
    [0.412453, 0.357580, 0.180423],
    [0.212671, 0.715160, 0.072169],
    [0.019334, 0.119193, 0.950227],
];

const RGB_FROM_XYZ: [[f32; 3]; 3] = [
    [3.240479, -1.537150, -0.498535],
    [-0.969256, 1.875991, 0.041556],
    [0.055648, -0.204043, 1.057311],
];

const WHITE_X: f32 = 0.950456;
const WHITE_Z: f32 = 1.088754;

const EPSILON: f32 = 0.008856;
const KAPPA: f32 = 903.3;

/// 8-bit BT.601 luma in 14-bit fixed point: `round(0.299 R + 0.587 G + 0.114 B)`.
#[inline]
pub fn luma(pixel: &Rgb<u8>) -> u8 {
    let [r, g, b] = pixel.0;
    ((r as u32 * 4899 + g as u32 * 9617 + b as u32 * 1868 + (1 << 13)) >> 14) as u8
}

pub fn to_gray(image: &RgbImage) -> GrayImage {
    let (width, height) = image.dimensions();
    let mut gray = GrayImage::new(width, height);
    for (src, dst) in image.pixels().zip(gray.pixels_mut()) {
        *dst = Luma([luma(src)]);
    }
    gray
}

fn srgb_to_linear_table() -> [f32; 256] {
    let mut table = [0.0f32; 256];
    for (i, slot) in table.iter_mut().enumerate() {
        let c = i as f32 / 255.0;
        *slot = if c <= 0.04045 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        };
    }
    table
}

#[inline]
fn linear_to_srgb(c: f32) -> f32 {
    if c <= 0.003_130_8 {
        12.92 * c
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

#[inline]
fn lab_f(t: f32) -> f32 {
    if t > EPSILON {
        t.cbrt()
    } else {
        7.787 * t + 16.0 / 116.0
    }
}

#[inline]
fn lab_f_inv(f: f32) -> f32 {
    let cube = f * f * f;
    if cube > EPSILON {
        cube
    } else {
        (f - 16.0 / 116.0) / 7.787
    }
}

#[inline]
fn saturate(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// Split an RGB image into its three 8-bit Lab planes.
pub fn rgb_to_lab(image: &RgbImage) -> [GrayImage; 3] {
    let (width, height) = image.dimensions();
    let table = srgb_to_linear_table();
    let mut l_plane = GrayImage::new(width, height);
    let mut a_plane = GrayImage::new(width, height);
    let mut b_plane = GrayImage::new(width, height);

    for (x, y, pixel) in image.enumerate_pixels() {
        let rgb = pixel.0.map(|c| table[c as usize]);
        let [xr, yr, zr] = XYZ_FROM_RGB.map(|row| row[0] * rgb[0] + row[1] * rgb[1] + row[2] * rgb[2]);

        let fx = lab_f(xr / WHITE_X);
        let fy = lab_f(yr);
        let fz = lab_f(zr / WHITE_Z);

        let l = if yr > EPSILON { 116.0 * fy - 16.0 } else { KAPPA * yr };
        let a = 500.0 * (fx - fy);
        let b = 200.0 * (fy - fz);

        l_plane.put_pixel(x, y, Luma([saturate(l * 255.0 / 100.0)]));
        a_plane.put_pixel(x, y, Luma([saturate(a + 128.0)]));
        b_plane.put_pixel(x, y, Luma([saturate(b + 128.0)]));
    }

    [l_plane, a_plane, b_plane]
}

/// Recombine 8-bit Lab planes of equal size into an RGB image.
pub fn lab_to_rgb(planes: &[GrayImage; 3]) -> RgbImage {
    let [l_plane, a_plane, b_plane] = planes;
    let (width, height) = l_plane.dimensions();
    let mut out = RgbImage::new(width, height);

    for (x, y, pixel) in out.enumerate_pixels_mut() {
        let l = l_plane.get_pixel(x, y).0[0] as f32 * 100.0 / 255.0;
        let a = a_plane.get_pixel(x, y).0[0] as f32 - 128.0;
        let b = b_plane.get_pixel(x, y).0[0] as f32 - 128.0;

        let fy = (l + 16.0) / 116.0;
        let fx = fy + a / 500.0;
        let fz = fy - b / 200.0;

        let yr = if l > KAPPA * EPSILON { fy * fy * fy } else { l / KAPPA };
        let xyz = [lab_f_inv(fx) * WHITE_X, yr, lab_f_inv(fz) * WHITE_Z];

        let rgb = RGB_FROM_XYZ.map(|row| {
            let linear = row[0] * xyz[0] + row[1] * xyz[1] + row[2] * xyz[2];
            saturate(linear_to_srgb(linear.clamp(0.0, 1.0)) * 255.0)
        });
        *pixel = Rgb(rgb);
    }

    out
}
