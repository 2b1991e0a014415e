use image::{RgbImage, imageops::FilterType};
use ndarray::Array4;

/// ImageNet normalization mean values (RGB)
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
/// ImageNet normalization std values (RGB)
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

pub const INPUT_SIZE: u32 = 224;

/// Shape every prepared tensor has: batch 1, channel-first.
pub const INPUT_SHAPE: [usize; 4] = [1, 3, INPUT_SIZE as usize, INPUT_SIZE as usize];

#[derive(Debug, Clone)]
pub struct Preprocessor {
    mean: [f32; 3],
    std: [f32; 3],
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self {
            mean: IMAGENET_MEAN,
            std: IMAGENET_STD,
        }
    }
}

impl Preprocessor {
    /// Bilinear resize to 224x224, scale to [0, 1], normalize per channel,
    /// lay out as `[1, 3, H, W]`.
    pub fn prepare(&self, image: &RgbImage) -> Array4<f32> {
        let resized = image::imageops::resize(image, INPUT_SIZE, INPUT_SIZE, FilterType::Triangle);
        let mut tensor = Array4::<f32>::zeros(INPUT_SHAPE);

        for (x, y, pixel) in resized.enumerate_pixels() {
            for c in 0..3 {
                let value = pixel.0[c] as f32 / 255.0;
                tensor[[0, c, y as usize, x as usize]] = (value - self.mean[c]) / self.std[c];
            }
        }

        tensor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn shape_is_fixed_for_any_input_size() {
        let pre = Preprocessor::default();
        for (w, h) in [(100, 100), (640, 120), (150, 900), (224, 224)] {
            let image = RgbImage::from_fn(w, h, |x, y| Rgb([(x % 255) as u8, (y % 255) as u8, 7]));
            assert_eq!(pre.prepare(&image).shape(), &INPUT_SHAPE);
        }
    }

    #[test]
    fn channels_are_normalized_independently() {
        let image = RgbImage::from_pixel(300, 200, Rgb([255, 0, 128]));
        let tensor = Preprocessor::default().prepare(&image);

        let r = tensor[[0, 0, 10, 10]];
        let g = tensor[[0, 1, 100, 50]];
        let b = tensor[[0, 2, 223, 223]];
        assert!((r - (1.0 - 0.485) / 0.229).abs() < 1e-5);
        assert!((g - (0.0 - 0.456) / 0.224).abs() < 1e-5);
        assert!((b - (128.0 / 255.0 - 0.406) / 0.225).abs() < 1e-5);
    }

    #[test]
    fn layout_is_channel_first() {
        // Left half red, right half blue.
        let image = RgbImage::from_fn(448, 448, |x, _| {
            if x < 224 { Rgb([255, 0, 0]) } else { Rgb([0, 0, 255]) }
        });
        let tensor = Preprocessor::default().prepare(&image);
        assert!(tensor[[0, 0, 50, 10]] > tensor[[0, 0, 50, 200]]);
        assert!(tensor[[0, 2, 50, 200]] > tensor[[0, 2, 50, 10]]);
    }
}
