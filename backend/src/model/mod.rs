pub mod classifier;
pub mod labels;
#[cfg(feature = "torch")]
pub mod torch;

use std::path::Path;

use crate::error::StartupError;

pub use classifier::{ClassificationResult, Classifier, Network};
pub use labels::ClassLabels;

/// Loads the network stored at `model_path`.
#[cfg(feature = "torch")]
pub fn load_network(model_path: &Path) -> Result<Box<dyn Network>, StartupError> {
    Ok(Box::new(torch::TorchNetwork::load(model_path)?))
}

/// Without libtorch there is nothing that can read the weights file.
#[cfg(not(feature = "torch"))]
pub fn load_network(model_path: &Path) -> Result<Box<dyn Network>, StartupError> {
    log::error!(
        "Cannot load {}: built without the `torch` feature",
        model_path.display()
    );
    Err(StartupError::TorchUnavailable)
}
