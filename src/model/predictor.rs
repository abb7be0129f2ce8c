use crate::{
    error::ServiceError,
    model::{DIGIT_CLASSES, ModelMetadata, PixelTensor},
};

/// A loaded model that maps one input tensor to per-class scores.
pub trait DigitClassifier: Send + Sync {
    fn scores(&self, input: &PixelTensor) -> Result<Vec<f32>, ServiceError>;

    fn metadata(&self) -> ModelMetadata;
}

/// Index of the largest score. Ties resolve to the lowest index and NaN
/// entries never win.
pub fn argmax(scores: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (idx, &score) in scores.iter().enumerate() {
        if score.is_nan() {
            continue;
        }
        match best {
            Some((_, top)) if score <= top => {}
            _ => best = Some((idx, score)),
        }
    }
    best.map(|(idx, _)| idx)
}

pub fn predict_digit(
    model: &dyn DigitClassifier,
    input: &PixelTensor,
) -> Result<String, ServiceError> {
    let scores = model.scores(input)?;
    if scores.len() != DIGIT_CLASSES {
        return Err(ServiceError::Inference(format!(
            "model produced {} scores, expected {DIGIT_CLASSES}",
            scores.len()
        )));
    }
    let digit = argmax(&scores)
        .ok_or_else(|| ServiceError::Inference("model produced only NaN scores".into()))?;
    Ok(digit.to_string())
}
