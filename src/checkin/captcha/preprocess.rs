//! Image cleanup applied before recognition.

use std::io::Cursor;

use image::{GrayImage, ImageFormat, Luma, imageops};

use super::CaptchaError;

/// Fixed preprocessing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preprocessing {
    /// Pixels brighter than this become white, the rest black.
    pub threshold: u8,
    pub sharpen: bool,
}

impl Default for Preprocessing {
    fn default() -> Self {
        Self {
            threshold: 140,
            sharpen: false,
        }
    }
}

/// Decode, convert to grayscale, optionally sharpen, then binarize.
pub fn preprocess(image_bytes: &[u8], params: Preprocessing) -> Result<GrayImage, CaptchaError> {
    let decoded =
        image::load_from_memory(image_bytes).map_err(|err| CaptchaError::Decode(err.to_string()))?;
    let mut gray = decoded.to_luma8();

    if params.sharpen {
        gray = imageops::unsharpen(&gray, 1.0, 8);
    }

    binarize(&mut gray, params.threshold);
    Ok(gray)
}

fn binarize(image: &mut GrayImage, threshold: u8) {
    for pixel in image.pixels_mut() {
        let Luma([value]) = *pixel;
        *pixel = Luma([if value > threshold { 255 } else { 0 }]);
    }
}

pub fn encode_png(image: &GrayImage) -> Result<Vec<u8>, CaptchaError> {
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, ImageFormat::Png)
        .map_err(|err| CaptchaError::Decode(err.to_string()))?;
    Ok(buffer.into_inner())
}
