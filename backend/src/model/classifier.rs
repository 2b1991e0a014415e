use ndarray::Array4;
use serde::Serialize;

use crate::error::{InferenceError, StartupError};
use crate::processing::INPUT_SHAPE;

use super::labels::ClassLabels;

/// A trained network, opaque apart from its output width.
///
/// Implementations must run in inference mode: no gradient tracking and no
/// training-only randomness such as dropout. The same input must always give
/// the same logits.
pub trait Network: Send + Sync {
    /// Raw scores for one `[1, 3, 224, 224]` input, one per class.
    fn forward(&self, input: &Array4<f32>) -> Result<Vec<f32>, InferenceError>;

    fn output_dim(&self) -> usize;
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassificationResult {
    pub class_index: usize,
    /// Probability of `class_index`, in `[0, 1]`.
    pub confidence: f32,
    pub probabilities: Vec<f32>,
}

pub struct Classifier {
    network: Box<dyn Network>,
    num_classes: usize,
}

impl std::fmt::Debug for Classifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Classifier")
            .field("num_classes", &self.num_classes)
            .finish_non_exhaustive()
    }
}

impl Classifier {
    /// Pairs a network with its label list. A width mismatch means the labels
    /// belong to a different training run and the process must not start.
    pub fn new(network: Box<dyn Network>, labels: &ClassLabels) -> Result<Self, StartupError> {
        let outputs = network.output_dim();
        if outputs != labels.len() {
            return Err(StartupError::LabelMismatch {
                labels: labels.len(),
                outputs,
            });
        }
        Ok(Self {
            network,
            num_classes: outputs,
        })
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    pub fn classify(&self, input: &Array4<f32>) -> Result<ClassificationResult, InferenceError> {
        if input.shape() != &INPUT_SHAPE[..] {
            return Err(InferenceError::ShapeMismatch {
                expected: INPUT_SHAPE,
                actual: input.shape().to_vec(),
            });
        }

        let logits = self.network.forward(input)?;
        if logits.len() != self.num_classes {
            return Err(InferenceError::OutputMismatch {
                expected: self.num_classes,
                actual: logits.len(),
            });
        }

        let probabilities = softmax(&logits)?;
        let (class_index, confidence) = argmax(&probabilities);
        Ok(ClassificationResult {
            class_index,
            confidence,
            probabilities,
        })
    }
}

/// Max-shifted softmax, accumulated in f64.
pub fn softmax(logits: &[f32]) -> Result<Vec<f32>, InferenceError> {
    if logits.iter().any(|v| !v.is_finite()) {
        return Err(InferenceError::NonFinite);
    }
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max) as f64;
    let exps: Vec<f64> = logits.iter().map(|&v| (v as f64 - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    Ok(exps.iter().map(|e| (e / total) as f32).collect())
}

/// First index holding the maximum.
fn argmax(values: &[f32]) -> (usize, f32) {
    values
        .iter()
        .copied()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |best, (i, v)| if v > best.1 { (i, v) } else { best })
}
