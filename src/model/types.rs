use serde::Serialize;

use crate::error::ServiceError;

/// Width and height of the square image the classifier was trained on.
pub const INPUT_SIDE: u32 = 28;
/// Number of values in a flattened input tensor.
pub const INPUT_LEN: usize = (INPUT_SIDE * INPUT_SIDE) as usize;
/// Number of output classes (digits 0 through 9).
pub const DIGIT_CLASSES: usize = 10;

/// A flattened 28x28 grayscale image with every value normalized to `[0.0, 1.0]`.
///
/// Values are row-major. The length is always [`INPUT_LEN`].
#[derive(Debug, Clone, PartialEq)]
pub struct PixelTensor {
    values: Vec<f32>,
}

impl PixelTensor {
    pub fn new(values: Vec<f32>) -> Result<Self, ServiceError> {
        if values.len() != INPUT_LEN {
            return Err(ServiceError::Shape {
                expected: INPUT_LEN,
                actual: values.len(),
            });
        }
        Ok(Self { values })
    }

    /// Normalizes raw 8-bit luma samples.
    pub fn from_luma(pixels: &[u8]) -> Result<Self, ServiceError> {
        Self::new(pixels.iter().map(|&p| f32::from(p) / 255.0).collect())
    }

    pub fn zeros() -> Self {
        Self {
            values: vec![0.0; INPUT_LEN],
        }
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PredictResponse {
    pub digit: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelMetadata {
    pub backend: &'static str,
    pub path: String,
    pub size_bytes: u64,
}
