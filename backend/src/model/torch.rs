use std::path::Path;
use std::sync::Mutex;

use ndarray::Array4;
use tch::{CModule, Device, Kind, Tensor};

use crate::error::{InferenceError, StartupError};
use crate::processing::INPUT_SHAPE;

use super::classifier::Network;

/// TorchScript export of the trained classifier.
///
/// `CModule` is not `Sync`, so forward passes are serialized through a mutex.
/// The module itself is never mutated after `load`.
pub struct TorchNetwork {
    module: Mutex<CModule>,
    device: Device,
    output_dim: usize,
}

fn input_dims() -> [i64; 4] {
    INPUT_SHAPE.map(|d| d as i64)
}

impl TorchNetwork {
    pub fn load(model_path: &Path) -> Result<Self, StartupError> {
        let device = Device::cuda_if_available();
        let mut module = CModule::load_on_device(model_path, device).map_err(|e| {
            StartupError::ModelLoad(format!("{}: {}", model_path.display(), e))
        })?;
        module.set_eval();

        let probe = Tensor::zeros(input_dims(), (Kind::Float, device));
        let output = tch::no_grad(|| module.forward_ts(&[probe]))
            .map_err(|e| StartupError::ModelLoad(format!("probe forward pass failed: {}", e)))?;
        let output_dim = output.size().last().copied().unwrap_or(0) as usize;
        if output_dim == 0 {
            return Err(StartupError::ModelLoad("model produced an empty output".into()));
        }

        log::info!(
            "Loaded TorchScript model from {} on {:?} ({} outputs)",
            model_path.display(),
            device,
            output_dim
        );
        Ok(Self {
            module: Mutex::new(module),
            device,
            output_dim,
        })
    }
}

impl Network for TorchNetwork {
    fn forward(&self, input: &Array4<f32>) -> Result<Vec<f32>, InferenceError> {
        let data = input
            .as_slice()
            .ok_or_else(|| InferenceError::Backend("input tensor is not contiguous".into()))?;
        let tensor = Tensor::from_slice(data)
            .view(input_dims())
            .to_device(self.device);

        let module = self
            .module
            .lock()
            .map_err(|_| InferenceError::Backend("model lock poisoned".into()))?;
        let output = tch::no_grad(|| module.forward_ts(&[tensor]))?;
        drop(module);

        let output_flat = output
            .to_kind(Kind::Float)
            .to_device(Device::Cpu)
            .view([-1]);
        let num_elements = output_flat.size()[0] as usize;
        let mut output_vec = vec![0.0f32; num_elements];
        output_flat.copy_data(&mut output_vec, num_elements);
        Ok(output_vec)
    }

    fn output_dim(&self) -> usize {
        self.output_dim
    }
}
