use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::{OcrError, OcrResult, RecognitionOptions, TextRecognizer};

const ENGINE: &str = "tesseract";

/// Adapter for the `tesseract` command-line engine.
///
/// The image is streamed on stdin and the text read back from stdout, so no
/// temporary files are involved.
#[derive(Debug, Clone)]
pub struct TesseractRecognizer {
    binary: String,
    language: String,
}

impl TesseractRecognizer {
    pub fn new() -> Self {
        Self {
            binary: ENGINE.to_string(),
            language: "eng".to_string(),
        }
    }

    /// Use a specific executable instead of the one on `PATH`.
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    fn arguments(&self, options: &RecognitionOptions) -> Vec<String> {
        let page_mode = if options.single_word { "8" } else { "7" };
        let mut args = vec![
            "stdin".to_string(),
            "stdout".to_string(),
            "-l".to_string(),
            self.language.clone(),
            "--psm".to_string(),
            page_mode.to_string(),
        ];
        if !options.whitelist.is_empty() {
            args.push("-c".to_string());
            args.push(format!("tessedit_char_whitelist={}", options.whitelist));
        }
        args
    }
}

impl Default for TesseractRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextRecognizer for TesseractRecognizer {
    fn name(&self) -> &'static str {
        ENGINE
    }

    async fn recognize(&self, png: &[u8], options: &RecognitionOptions) -> OcrResult<String> {
        let mut child = Command::new(&self.binary)
            .args(self.arguments(options))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| OcrError::Unavailable(ENGINE, err.to_string()))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(png)
                .await
                .map_err(|err| OcrError::Engine(err.to_string()))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|err| OcrError::Engine(err.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::Engine(format!(
                "{ENGINE} exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
