//! Text recognition engines.
//!
//! Provides a shared trait and error type used by the CAPTCHA solver, along
//! with concrete engine adapters. The solver treats engines as opaque: it
//! hands over a preprocessed image and takes back whatever text comes out.

mod tesseract;

pub use tesseract::TesseractRecognizer;

use async_trait::async_trait;
use thiserror::Error;

/// Recognition settings forwarded to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionOptions {
    /// Characters the engine may emit.
    pub whitelist: String,
    /// Treat the image as a single word rather than a single line.
    pub single_word: bool,
}

impl Default for RecognitionOptions {
    fn default() -> Self {
        Self {
            whitelist: DEFAULT_WHITELIST.to_string(),
            single_word: true,
        }
    }
}

pub const DEFAULT_WHITELIST: &str =
    "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Abstraction over OCR engines capable of reading CAPTCHA images.
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Read the text in a PNG-encoded, already preprocessed image.
    async fn recognize(&self, png: &[u8], options: &RecognitionOptions) -> OcrResult<String>;
}

/// Failures produced by recognition engines.
#[derive(Debug, Error)]
pub enum OcrError {
    #[error("ocr engine '{0}' is unavailable: {1}")]
    Unavailable(&'static str, String),
    #[error("ocr engine failed: {0}")]
    Engine(String),
}

/// Convenience alias for engine results.
pub type OcrResult<T> = Result<T, OcrError>;
