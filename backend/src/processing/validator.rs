use image::RgbImage;
use serde::Deserialize;
use shared::RejectionReason;

use super::color::luma;

/// Size and brightness bounds an upload must satisfy. Both ends inclusive.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ValidationBounds {
    pub min_dimension: u32,
    pub max_dimension: u32,
    pub min_brightness: f64,
    pub max_brightness: f64,
}

impl Default for ValidationBounds {
    fn default() -> Self {
        Self {
            min_dimension: 100,
            max_dimension: 5000,
            min_brightness: 20.0,
            max_brightness: 235.0,
        }
    }
}

/// Measurements taken from an image that passed validation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageStats {
    pub width: u32,
    pub height: u32,
    pub mean_brightness: f64,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{}", .reason.message())]
pub struct ValidationFailure {
    pub reason: RejectionReason,
    pub width: u32,
    pub height: u32,
    /// Absent when the size check failed first; brightness is never measured then.
    pub mean_brightness: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct ImageValidator {
    bounds: ValidationBounds,
}

impl ImageValidator {
    pub fn new(bounds: ValidationBounds) -> Self {
        Self { bounds }
    }

    pub fn bounds(&self) -> &ValidationBounds {
        &self.bounds
    }

    /// Size first, then mean luma. The first failing check wins.
    pub fn validate(&self, image: &RgbImage) -> Result<ImageStats, ValidationFailure> {
        let (width, height) = image.dimensions();
        let reject = |reason, mean_brightness| ValidationFailure {
            reason,
            width,
            height,
            mean_brightness,
        };

        if width < self.bounds.min_dimension || height < self.bounds.min_dimension {
            return Err(reject(RejectionReason::TooSmall, None));
        }
        if width > self.bounds.max_dimension || height > self.bounds.max_dimension {
            return Err(reject(RejectionReason::TooLarge, None));
        }

        let mean_brightness = mean_luma(image);
        if mean_brightness < self.bounds.min_brightness {
            return Err(reject(RejectionReason::TooDark, Some(mean_brightness)));
        }
        if mean_brightness > self.bounds.max_brightness {
            return Err(reject(RejectionReason::TooBright, Some(mean_brightness)));
        }

        Ok(ImageStats {
            width,
            height,
            mean_brightness,
        })
    }
}

fn mean_luma(image: &RgbImage) -> f64 {
    let count = image.width() as u64 * image.height() as u64;
    if count == 0 {
        return 0.0;
    }
    let total: u64 = image.pixels().map(|p| luma(p) as u64).sum();
    total as f64 / count as f64
}
