//! Deterministic image conditioning ahead of classification:
//! validate, enhance, isolate the leaf, shape into a tensor.

pub mod color;
pub mod edges;
pub mod enhance;
pub mod region;
pub mod tensor;
pub mod validator;

pub use enhance::ImageEnhancer;
pub use region::{CropBox, RegionDetector};
pub use tensor::{INPUT_SHAPE, Preprocessor};
pub use validator::{ImageStats, ImageValidator, ValidationBounds, ValidationFailure};
