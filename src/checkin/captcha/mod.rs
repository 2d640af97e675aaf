//! CAPTCHA solving for plugins that meet an image challenge.
//!
//! [`CaptchaSolver`] turns raw image bytes into a best-effort guess: decode,
//! clean up, hand the result to an opaque [`TextRecognizer`], then apply the
//! validity filter. [`retry`] holds the bounded attempt loop plugins wrap
//! around fetch → solve → submit.

pub mod preprocess;
pub mod retry;

pub use preprocess::{Preprocessing, encode_png, preprocess};
pub use retry::{AttemptVerdict, RetryOutcome, run_attempts};

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::Deserialize;
use thiserror::Error;

use crate::external_deps::ocr::{
    DEFAULT_WHITELIST, OcrError, RecognitionOptions, TesseractRecognizer, TextRecognizer,
};

/// Upper bound on a single recognizer call.
pub const DEFAULT_RECOGNITION_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors surfaced while producing a guess.
#[derive(Debug, Error)]
pub enum CaptchaError {
    #[error("captcha image could not be processed: {0}")]
    Decode(String),
    #[error("captcha recognition failed: {0}")]
    Recognition(#[from] OcrError),
}

/// Tuning knobs read from a plugin's `captcha` option section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CaptchaConfig {
    /// Guesses shorter than this are discarded.
    pub min_length: usize,
    pub max_attempts: usize,
    pub threshold: u8,
    pub sharpen: bool,
    pub whitelist: String,
    /// Form field carrying the guess on submission.
    pub field_name: String,
    /// Selectors tried in order to locate the challenge image.
    pub image_selectors: Vec<String>,
}

impl Default for CaptchaConfig {
    fn default() -> Self {
        Self {
            min_length: 4,
            max_attempts: 3,
            threshold: Preprocessing::default().threshold,
            sharpen: false,
            whitelist: DEFAULT_WHITELIST.to_string(),
            field_name: "captcha".to_string(),
            image_selectors: [
                "img#captcha",
                "img.captcha",
                "img#verify_code",
                "img[src*='captcha']",
                "img[src*='verify']",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

impl CaptchaConfig {
    pub fn preprocessing(&self) -> Preprocessing {
        Preprocessing {
            threshold: self.threshold,
            sharpen: self.sharpen,
        }
    }

    pub fn recognition(&self) -> RecognitionOptions {
        RecognitionOptions {
            whitelist: self.whitelist.clone(),
            single_word: true,
        }
    }

    /// Attempt ceiling, never below one.
    pub fn attempt_ceiling(&self) -> usize {
        self.max_attempts.max(1)
    }
}

/// One pass through the fetch → solve cycle. Never persisted.
#[derive(Debug, Clone)]
pub struct CaptchaAttempt {
    pub index: usize,
    pub image: Bytes,
    pub text: String,
}

impl CaptchaAttempt {
    /// The recognizer produced nothing usable.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Validity filter: trim and upper-case; anything shorter than `min_length`
/// becomes the empty string.
pub fn normalize_guess(raw: &str, min_length: usize) -> String {
    let cleaned = raw.trim().to_uppercase();

    if cleaned.chars().count() < min_length {
        String::new()
    } else {
        cleaned
    }
}

/// Image-to-text pipeline with fixed preprocessing and recognition settings.
#[derive(Clone)]
pub struct CaptchaSolver {
    recognizer: Arc<dyn TextRecognizer>,
    config: CaptchaConfig,
    timeout: Duration,
}

impl CaptchaSolver {
    pub fn new(recognizer: Arc<dyn TextRecognizer>, config: CaptchaConfig) -> Self {
        Self {
            recognizer,
            config,
            timeout: DEFAULT_RECOGNITION_TIMEOUT,
        }
    }

    /// Bound each recognizer call; an engine that overruns is abandoned (and
    /// its process killed) and the attempt counts as unreadable.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Solver backed by the `tesseract` command-line engine.
    pub fn tesseract(config: CaptchaConfig) -> Self {
        Self::new(Arc::new(TesseractRecognizer::new()), config)
    }

    pub fn config(&self) -> &CaptchaConfig {
        &self.config
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Best-effort guess; any failure yields the empty string.
    pub async fn solve(&self, image_bytes: &[u8]) -> String {
        match self.try_solve(image_bytes).await {
            Ok(text) => text,
            Err(err) => {
                log::debug!("captcha via {} produced no result: {err}", self.recognizer.name());
                String::new()
            }
        }
    }

    pub async fn try_solve(&self, image_bytes: &[u8]) -> Result<String, CaptchaError> {
        let cleaned = preprocess(image_bytes, self.config.preprocessing())?;
        let png = encode_png(&cleaned)?;
        let options = self.config.recognition();
        let raw = tokio::time::timeout(self.timeout, self.recognizer.recognize(&png, &options))
            .await
            .map_err(|_| {
                OcrError::Engine(format!(
                    "{} timed out after {:?}",
                    self.recognizer.name(),
                    self.timeout
                ))
            })??;
        Ok(normalize_guess(&raw, self.config.min_length))
    }

    /// Solve one fetched image and record it as attempt `index`.
    pub async fn attempt(&self, index: usize, image: Bytes) -> CaptchaAttempt {
        let text = self.solve(&image).await;
        CaptchaAttempt { index, image, text }
    }
}
