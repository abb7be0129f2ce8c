use std::sync::Arc;

use axum::body::Bytes;
use tokio::task;

use crate::{
    config::AppConfig,
    error::ServiceError,
    model::{
        DigitClassifier, ModelMetadata, PixelTensor, PredictResponse, load_classifier,
        predict_digit,
    },
    preprocess::PreprocessMode,
};

/// Owns the loaded classifier and the preprocessing strategy chosen at startup.
pub struct ModelRegistry {
    classifier: Arc<dyn DigitClassifier>,
    preprocess: PreprocessMode,
}

impl ModelRegistry {
    /// Loads the model and runs one probe inference so an incompatible model
    /// fails here rather than on the first request.
    pub fn initialize(config: &AppConfig) -> Result<Self, ServiceError> {
        let classifier = load_classifier(config)?;
        let registry = Self::with_classifier(classifier, config.preprocess);
        registry.probe()?;
        Ok(registry)
    }

    pub fn with_classifier(
        classifier: Arc<dyn DigitClassifier>,
        preprocess: PreprocessMode,
    ) -> Self {
        Self {
            classifier,
            preprocess,
        }
    }

    pub fn metadata(&self) -> ModelMetadata {
        self.classifier.metadata()
    }

    pub fn preprocess_mode(&self) -> PreprocessMode {
        self.preprocess
    }

    fn probe(&self) -> Result<(), ServiceError> {
        predict_digit(self.classifier.as_ref(), &PixelTensor::zeros())
            .map(|_| ())
            .map_err(|e| ServiceError::ModelLoad(format!("probe inference failed: {e}")))
    }

    /// Decodes and classifies one upload on the calling thread.
    pub fn classify(&self, image: &[u8]) -> Result<PredictResponse, ServiceError> {
        classify_with(self.classifier.as_ref(), self.preprocess, image)
    }

    /// Runs [`ModelRegistry::classify`] on the blocking pool.
    pub async fn predict(&self, image: Bytes) -> Result<PredictResponse, ServiceError> {
        let classifier = self.classifier.clone();
        let preprocess = self.preprocess;

        task::spawn_blocking(move || classify_with(classifier.as_ref(), preprocess, &image))
            .await
            .map_err(|err| ServiceError::Inference(format!("inference task failed: {err}")))?
    }
}

fn classify_with(
    classifier: &dyn DigitClassifier,
    preprocess: PreprocessMode,
    image: &[u8],
) -> Result<PredictResponse, ServiceError> {
    let tensor = preprocess.preprocess(image)?;
    let digit = predict_digit(classifier, &tensor)?;
    tracing::debug!(%digit, "prediction complete");
    Ok(PredictResponse { digit })
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{DynamicImage, GrayImage, ImageFormat};

    use super::*;
    use crate::model::DIGIT_CLASSES;

    /// Scores each class by the mean brightness, so a blank image predicts 0.
    struct BrightnessModel;

    impl DigitClassifier for BrightnessModel {
        fn scores(&self, input: &PixelTensor) -> Result<Vec<f32>, ServiceError> {
            let mean = input.as_slice().iter().sum::<f32>() / input.len() as f32;
            let hot = ((mean * 9.0).round() as usize).min(DIGIT_CLASSES - 1);
            let mut scores = vec![0.0; DIGIT_CLASSES];
            scores[hot] = 1.0;
            Ok(scores)
        }

        fn metadata(&self) -> ModelMetadata {
            ModelMetadata {
                backend: "brightness",
                path: String::new(),
                size_bytes: 0,
            }
        }
    }

    struct ThreeClassModel;

    impl DigitClassifier for ThreeClassModel {
        fn scores(&self, _input: &PixelTensor) -> Result<Vec<f32>, ServiceError> {
            Ok(vec![0.2, 0.3, 0.5])
        }

        fn metadata(&self) -> ModelMetadata {
            ModelMetadata {
                backend: "three",
                path: String::new(),
                size_bytes: 0,
            }
        }
    }

    fn png(image: GrayImage) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageLuma8(image)
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    #[test]
    fn classify_runs_the_full_pipeline() {
        let registry = ModelRegistry::with_classifier(Arc::new(BrightnessModel), PreprocessMode::Exact);
        let blank = registry.classify(&png(GrayImage::new(28, 28))).unwrap();
        assert_eq!(blank.digit, "0");

        let white = registry
            .classify(&png(GrayImage::from_pixel(28, 28, image::Luma([255]))))
            .unwrap();
        assert_eq!(white.digit, "9");
    }

    #[tokio::test]
    async fn predict_offloads_to_blocking_pool() {
        let registry = ModelRegistry::with_classifier(Arc::new(BrightnessModel), PreprocessMode::Resize);
        let response = registry
            .predict(Bytes::from(png(GrayImage::new(64, 48))))
            .await
            .unwrap();
        assert_eq!(response.digit, "0");
        assert_eq!(registry.preprocess_mode(), PreprocessMode::Resize);
    }

    #[tokio::test]
    async fn decode_failures_surface_unchanged() {
        let registry = ModelRegistry::with_classifier(Arc::new(BrightnessModel), PreprocessMode::Exact);
        let err = registry
            .predict(Bytes::from_static(b"\x89PNG but not really"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Decode(_)));
    }

    #[test]
    fn probe_rejects_models_with_wrong_class_count() {
        let registry = ModelRegistry::with_classifier(Arc::new(ThreeClassModel), PreprocessMode::Exact);
        let err = registry.probe().unwrap_err();
        assert!(matches!(err, ServiceError::ModelLoad(_)));
    }
}
