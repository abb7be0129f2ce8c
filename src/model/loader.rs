use std::{path::Path, sync::Arc};

use crate::{
    config::AppConfig,
    error::ServiceError,
    model::{DenseNetwork, DigitClassifier},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ModelFormat {
    Dense,
    TorchScript,
}

fn detect_format(path: &Path) -> Result<ModelFormat, ServiceError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("json") => Ok(ModelFormat::Dense),
        Some("pt" | "ts" | "torchscript") => Ok(ModelFormat::TorchScript),
        _ => Err(ServiceError::ModelLoad(format!(
            "unsupported model format: {}",
            path.display()
        ))),
    }
}

/// Loads the classifier named by `config.model_path`, picking the backend from
/// the file extension.
pub fn load_classifier(config: &AppConfig) -> Result<Arc<dyn DigitClassifier>, ServiceError> {
    let path = config.model_path.as_path();
    if !path.exists() {
        return Err(ServiceError::ModelLoad(format!(
            "model artifact missing: {}",
            path.display()
        )));
    }

    match detect_format(path)? {
        ModelFormat::Dense => Ok(Arc::new(DenseNetwork::load(path)?)),
        ModelFormat::TorchScript => load_torchscript(config),
    }
}

#[cfg(feature = "tch-backend")]
fn load_torchscript(config: &AppConfig) -> Result<Arc<dyn DigitClassifier>, ServiceError> {
    let model = crate::model::TorchClassifier::load(&config.model_path, config.device)?;
    Ok(Arc::new(model))
}

#[cfg(not(feature = "tch-backend"))]
fn load_torchscript(config: &AppConfig) -> Result<Arc<dyn DigitClassifier>, ServiceError> {
    Err(ServiceError::ModelLoad(format!(
        "{} is a TorchScript module; rebuild with the `tch-backend` feature to load it",
        config.model_path.display()
    )))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use serde_json::json;

    use super::*;
    use crate::{
        model::{DIGIT_CLASSES, INPUT_LEN, PixelTensor},
        preprocess::PreprocessMode,
    };

    fn write_model(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_dense_json_model() {
        let raw = json!({
            "layers": [{
                "weights": vec![vec![0.0; INPUT_LEN]; DIGIT_CLASSES],
                "bias": [0.0, 0.0, 0.0, 0.0, 5.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            }]
        })
        .to_string();
        let file = write_model(".json", &raw);
        let config = AppConfig::for_model(file.path(), PreprocessMode::Exact);

        let model = load_classifier(&config).unwrap();
        let metadata = model.metadata();
        assert_eq!(metadata.backend, "dense");
        assert_eq!(metadata.size_bytes, raw.len() as u64);
        assert_eq!(metadata.path, file.path().display().to_string());

        let scores = model.scores(&PixelTensor::zeros()).unwrap();
        assert_eq!(scores[4], 5.0);
    }

    #[test]
    fn missing_file_fails_to_load() {
        let config = AppConfig::for_model("/nonexistent/model.json", PreprocessMode::Exact);
        match load_classifier(&config) {
            Err(ServiceError::ModelLoad(msg)) => assert!(msg.contains("missing"), "{msg}"),
            Err(other) => panic!("unexpected error {other:?}"),
            Ok(_) => panic!("load should fail"),
        }
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let file = write_model(".h5", "HDF");
        let config = AppConfig::for_model(file.path(), PreprocessMode::Exact);
        let err = load_classifier(&config).err().unwrap();
        assert!(err.to_string().contains("unsupported model format"), "{err}");
    }

    #[test]
    fn corrupt_dense_file_is_rejected() {
        let file = write_model(".json", "{\"layers\": 12}");
        let config = AppConfig::for_model(file.path(), PreprocessMode::Exact);
        assert!(matches!(
            load_classifier(&config),
            Err(ServiceError::ModelLoad(_))
        ));
    }

    #[test]
    fn detects_formats_case_insensitively() {
        assert_eq!(detect_format(Path::new("a/MODEL.JSON")).unwrap(), ModelFormat::Dense);
        assert_eq!(detect_format(Path::new("mnist.pt")).unwrap(), ModelFormat::TorchScript);
        assert!(detect_format(Path::new("weights")).is_err());
    }
}
