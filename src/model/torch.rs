use std::{fs, path::Path};

use parking_lot::Mutex;
use tch::{Device, Kind, Tensor, no_grad};

use crate::{
    error::ServiceError,
    model::{DigitClassifier, INPUT_LEN, ModelMetadata, PixelTensor},
};

/// A TorchScript module traced or scripted with a `[1, 784]` float input.
pub struct TorchClassifier {
    path: String,
    size_bytes: u64,
    device: Device,
    module: Mutex<tch::CModule>,
}

impl TorchClassifier {
    pub fn load(module_path: &Path, device: Device) -> Result<Self, ServiceError> {
        let size_bytes = fs::metadata(module_path)?.len();
        let mut module = tch::CModule::load_on_device(module_path, device)
            .map_err(|e| ServiceError::ModelLoad(e.to_string()))?;
        module.set_eval();

        Ok(Self {
            path: module_path.display().to_string(),
            size_bytes,
            device,
            module: Mutex::new(module),
        })
    }
}

impl DigitClassifier for TorchClassifier {
    fn scores(&self, input: &PixelTensor) -> Result<Vec<f32>, ServiceError> {
        let input = Tensor::from_slice(input.as_slice())
            .reshape([1, INPUT_LEN as i64])
            .to(self.device);

        let output = no_grad(|| {
            let module = self.module.lock();
            module.forward_ts(&[input])
        })
        .map_err(|e| ServiceError::Inference(e.to_string()))?;

        // [1, classes] -> [classes] on the host
        let flat = output
            .flatten(0, -1)
            .to_kind(Kind::Float)
            .to(Device::Cpu);
        Vec::<f32>::try_from(&flat).map_err(|e| ServiceError::Inference(e.to_string()))
    }

    fn metadata(&self) -> ModelMetadata {
        ModelMetadata {
            backend: "torchscript",
            path: self.path.clone(),
            size_bytes: self.size_bytes,
        }
    }
}

