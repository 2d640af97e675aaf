//! Integrations that rely on programs outside the crate.
//!
//! Currently only text recognition, used by the CAPTCHA solver; the engine
//! sits behind [`ocr::TextRecognizer`] so it can be swapped or stubbed.

pub mod ocr;

pub use ocr::{OcrError, OcrResult, RecognitionOptions, TesseractRecognizer, TextRecognizer};
