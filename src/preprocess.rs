//! Conversion of uploaded image bytes into the tensor the classifier expects.

use std::io::Cursor;

use clap::ValueEnum;
use image::{DynamicImage, GrayImage, ImageReader, Limits, Luma, imageops::FilterType};

use crate::{
    error::ServiceError,
    model::{INPUT_LEN, INPUT_SIDE, PixelTensor},
};

/// Largest width or height an upload may declare.
pub const MAX_IMAGE_SIDE: u32 = 4096;
/// Upper bound on the decoder's buffer allocation.
pub const MAX_DECODE_BYTES: u64 = 128 * 1024 * 1024;

/// How an upload is turned into a 28x28 grayscale tensor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum PreprocessMode {
    /// The upload is already a 28x28 digit; it is only converted to grayscale.
    #[default]
    Exact,
    /// The upload may be any size and color; it is resized to 28x28 first.
    Resize,
}

impl PreprocessMode {
    pub fn preprocess(self, bytes: &[u8]) -> Result<PixelTensor, ServiceError> {
        match self {
            PreprocessMode::Exact => preprocess_exact(bytes),
            PreprocessMode::Resize => preprocess_resized(bytes),
        }
    }
}

/// Decodes to grayscale and flattens without resampling.
///
/// Any image whose pixel count is exactly 784 is accepted, regardless of its
/// width and height.
pub fn preprocess_exact(bytes: &[u8]) -> Result<PixelTensor, ServiceError> {
    let gray = to_gray(&decode(bytes)?);
    let (width, height) = gray.dimensions();
    let actual = width as usize * height as usize;
    if actual != INPUT_LEN {
        return Err(ServiceError::Shape {
            expected: INPUT_LEN,
            actual,
        });
    }
    PixelTensor::from_luma(gray.as_raw())
}

/// Decodes, resizes to 28x28 with a bilinear filter, then converts to luma.
pub fn preprocess_resized(bytes: &[u8]) -> Result<PixelTensor, ServiceError> {
    let resized = decode(bytes)?.resize_exact(INPUT_SIDE, INPUT_SIDE, FilterType::Triangle);
    PixelTensor::from_luma(to_gray(&resized).as_raw())
}

/// Decodes with bounded dimensions so a tiny file cannot declare a huge canvas.
fn decode(bytes: &[u8]) -> Result<DynamicImage, ServiceError> {
    let mut limits = Limits::default();
    limits.max_image_width = Some(MAX_IMAGE_SIDE);
    limits.max_image_height = Some(MAX_IMAGE_SIDE);
    limits.max_alloc = Some(MAX_DECODE_BYTES);

    let mut reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| ServiceError::Decode(e.to_string()))?;
    reader.limits(limits);
    Ok(reader.decode()?)
}

/// Grayscale images pass through; color is reduced with BT.601 weights in the
/// same 14-bit fixed point OpenCV uses, so trained models see identical input.
fn to_gray(image: &DynamicImage) -> GrayImage {
    match image {
        DynamicImage::ImageLuma8(_)
        | DynamicImage::ImageLumaA8(_)
        | DynamicImage::ImageLuma16(_)
        | DynamicImage::ImageLumaA16(_) => image.to_luma8(),
        _ => {
            let rgb = image.to_rgb8();
            GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
                let [r, g, b] = rgb.get_pixel(x, y).0;
                Luma([bt601_luma(r, g, b)])
            })
        }
    }
}

fn bt601_luma(r: u8, g: u8, b: u8) -> u8 {
    const R: u32 = 4899;
    const G: u32 = 9617;
    const B: u32 = 1868;
    let y = (u32::from(r) * R + u32::from(g) * G + u32::from(b) * B + (1 << 13)) >> 14;
    y.min(255) as u8
}
