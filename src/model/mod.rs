mod dense;
mod loader;
mod predictor;
mod registry;
mod types;

#[cfg(feature = "tch-backend")]
mod torch;

pub use dense::{Activation, DenseLayer, DenseNetwork};
pub use loader::load_classifier;
pub use predictor::{DigitClassifier, argmax, predict_digit};
pub use registry::ModelRegistry;
pub use types::{DIGIT_CLASSES, INPUT_LEN, INPUT_SIDE, ModelMetadata, PixelTensor, PredictResponse};

#[cfg(feature = "tch-backend")]
pub use torch::TorchClassifier;
