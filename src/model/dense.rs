use std::{fs, path::Path};

use ndarray::{Array1, Array2};
use serde::Deserialize;

use crate::{
    error::ServiceError,
    model::{DIGIT_CLASSES, DigitClassifier, INPUT_LEN, ModelMetadata, PixelTensor},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    Relu,
    Sigmoid,
    Softmax,
    #[default]
    Linear,
}

#[derive(Debug, Deserialize)]
struct NetworkFile {
    layers: Vec<LayerFile>,
}

#[derive(Debug, Deserialize)]
struct LayerFile {
    weights: Vec<Vec<f32>>,
    bias: Vec<f32>,
    #[serde(default)]
    activation: Activation,
}

/// One fully connected layer: `activation(weights · x + bias)`.
#[derive(Debug, Clone)]
pub struct DenseLayer {
    weights: Array2<f32>,
    bias: Array1<f32>,
    activation: Activation,
}

impl DenseLayer {
    pub fn new(
        weights: Array2<f32>,
        bias: Array1<f32>,
        activation: Activation,
    ) -> Result<Self, ServiceError> {
        if weights.nrows() != bias.len() {
            return Err(ServiceError::ModelLoad(format!(
                "layer has {} output rows but {} bias terms",
                weights.nrows(),
                bias.len()
            )));
        }
        Ok(Self {
            weights,
            bias,
            activation,
        })
    }

    pub fn inputs(&self) -> usize {
        self.weights.ncols()
    }

    pub fn outputs(&self) -> usize {
        self.weights.nrows()
    }

    fn forward(&self, input: &Array1<f32>) -> Array1<f32> {
        let mut out = self.weights.dot(input) + &self.bias;
        match self.activation {
            Activation::Relu => out.mapv_inplace(|v| v.max(0.0)),
            Activation::Sigmoid => out.mapv_inplace(|v| 1.0 / (1.0 + (-v).exp())),
            Activation::Softmax => {
                let max = out.fold(f32::NEG_INFINITY, |acc, &v| acc.max(v));
                out.mapv_inplace(|v| (v - max).exp());
                let sum = out.sum();
                if sum > 0.0 {
                    out /= sum;
                }
            }
            Activation::Linear => {}
        }
        out
    }
}

/// A feed-forward network stored as plain JSON weight matrices.
#[derive(Debug, Clone)]
pub struct DenseNetwork {
    layers: Vec<DenseLayer>,
    metadata: ModelMetadata,
}

impl DenseNetwork {
    pub fn load(path: &Path) -> Result<Self, ServiceError> {
        let raw = fs::read_to_string(path)?;
        let mut network = Self::from_json(&raw)?;
        network.metadata.path = path.display().to_string();
        Ok(network)
    }

    pub fn from_json(raw: &str) -> Result<Self, ServiceError> {
        let file: NetworkFile = serde_json::from_str(raw)
            .map_err(|e| ServiceError::ModelLoad(format!("invalid dense model file: {e}")))?;

        let mut layers = Vec::with_capacity(file.layers.len());
        for (idx, layer) in file.layers.into_iter().enumerate() {
            let rows = layer.weights.len();
            let cols = layer.weights.first().map_or(0, Vec::len);
            if layer.weights.iter().any(|row| row.len() != cols) {
                return Err(ServiceError::ModelLoad(format!(
                    "layer {idx} has ragged weight rows"
                )));
            }
            let flat: Vec<f32> = layer.weights.into_iter().flatten().collect();
            let weights = Array2::from_shape_vec((rows, cols), flat)
                .map_err(|e| ServiceError::ModelLoad(format!("layer {idx}: {e}")))?;
            layers.push(DenseLayer::new(
                weights,
                Array1::from(layer.bias),
                layer.activation,
            )?);
        }

        Self::new(layers, raw.len() as u64)
    }

    pub fn new(layers: Vec<DenseLayer>, size_bytes: u64) -> Result<Self, ServiceError> {
        let first = layers
            .first()
            .ok_or_else(|| ServiceError::ModelLoad("dense model has no layers".into()))?;
        if first.inputs() != INPUT_LEN {
            return Err(ServiceError::ModelLoad(format!(
                "first layer takes {} inputs, expected {INPUT_LEN}",
                first.inputs()
            )));
        }
        for (idx, pair) in layers.windows(2).enumerate() {
            if pair[0].outputs() != pair[1].inputs() {
                return Err(ServiceError::ModelLoad(format!(
                    "layer {} outputs {} values but layer {} takes {}",
                    idx,
                    pair[0].outputs(),
                    idx + 1,
                    pair[1].inputs()
                )));
            }
        }
        let classes = layers.last().map_or(0, DenseLayer::outputs);
        if classes != DIGIT_CLASSES {
            return Err(ServiceError::ModelLoad(format!(
                "final layer outputs {classes} classes, expected {DIGIT_CLASSES}"
            )));
        }

        Ok(Self {
            layers,
            metadata: ModelMetadata {
                backend: "dense",
                path: String::from("<memory>"),
                size_bytes,
            },
        })
    }
}

impl DigitClassifier for DenseNetwork {
    fn scores(&self, input: &PixelTensor) -> Result<Vec<f32>, ServiceError> {
        let mut activations = Array1::from(input.as_slice().to_vec());
        for layer in &self.layers {
            activations = layer.forward(&activations);
        }
        Ok(activations.to_vec())
    }

    fn metadata(&self) -> ModelMetadata {
        self.metadata.clone()
    }
}
