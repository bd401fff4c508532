//! Public entry point: validate the input, run the catalogue, shape the report.

use crate::config::{ConfigError, Options};
use crate::envelope::{Offenders, Stats, Transforms};
use crate::imaging::ImageBackend;
use crate::pipeline::{CancelToken, ModuleFailure, ModulesRunner, RunError, RunOutcome};
use crate::types::BrowserData;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

/// Value of the report's `generator` field.
pub const GENERATOR: &str = concat!("analyze-image v", env!("CARGO_PKG_VERSION"));

/// Process exit code for invalid options.
pub const EXIT_INVALID_OPTION: i32 = 2;
/// Process exit code for an empty image.
pub const EXIT_EMPTY_IMAGE: i32 = 252;
/// Process exit code for input that is not an image representation.
pub const EXIT_IMAGE_PASSED_IS_INVALID: i32 = 253;

#[derive(Error, Debug)]
pub enum AnalyzeError {
    #[error("Image passed is not valid: {0}")]
    InvalidInput(String),
    #[error("Image is empty")]
    EmptyInput,
    #[error("Invalid option: {0}")]
    InvalidOption(#[from] ConfigError),
    #[error(transparent)]
    Run(#[from] RunError),
}

impl AnalyzeError {
    pub fn exit_code(&self) -> i32 {
        match self {
            AnalyzeError::InvalidInput(_) => EXIT_IMAGE_PASSED_IS_INVALID,
            AnalyzeError::EmptyInput => EXIT_EMPTY_IMAGE,
            AnalyzeError::InvalidOption(_) => EXIT_INVALID_OPTION,
            AnalyzeError::Run(_) => 1,
        }
    }
}

/// An image as handed over by the caller.
///
/// Text is either markup (an SVG document) or a base64 encoding of the
/// image bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageInput {
    Bytes(Vec<u8>),
    Text(String),
}

impl From<Vec<u8>> for ImageInput {
    fn from(bytes: Vec<u8>) -> Self {
        ImageInput::Bytes(bytes)
    }
}

impl From<&[u8]> for ImageInput {
    fn from(bytes: &[u8]) -> Self {
        ImageInput::Bytes(bytes.to_vec())
    }
}

impl From<String> for ImageInput {
    fn from(text: String) -> Self {
        ImageInput::Text(text)
    }
}

impl From<&str> for ImageInput {
    fn from(text: &str) -> Self {
        ImageInput::Text(text.to_string())
    }
}

impl ImageInput {
    /// Resolve to the raw image bytes.
    pub fn into_bytes(self) -> Result<Vec<u8>, AnalyzeError> {
        let bytes = match self {
            ImageInput::Bytes(bytes) => bytes,
            ImageInput::Text(text) => {
                let trimmed = text.trim_start();
                if trimmed.is_empty() {
                    return Err(AnalyzeError::EmptyInput);
                }
                if trimmed.starts_with('<') {
                    text.into_bytes()
                } else {
                    let compact: String =
                        text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
                    BASE64.decode(compact).map_err(|e| {
                        AnalyzeError::InvalidInput(format!(
                            "text is neither markup nor base64 ({e})"
                        ))
                    })?
                }
            }
        };
        if bytes.is_empty() {
            return Err(AnalyzeError::EmptyInput);
        }
        Ok(bytes)
    }
}

/// The analysis result handed back to callers.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub generator: String,
    pub stats: Stats,
    pub transforms: Transforms,
    pub offenders: Offenders,
    /// Modules that failed. Not part of the serialized report.
    #[serde(skip)]
    pub failures: Vec<ModuleFailure>,
}

impl Report {
    fn from_outcome(outcome: RunOutcome, strip_bodies: bool) -> Self {
        let mut envelope = outcome.envelope;
        if strip_bodies {
            envelope.strip_bodies();
        }
        Self {
            generator: GENERATOR.to_string(),
            stats: envelope.stats,
            transforms: envelope.transforms,
            offenders: envelope.offenders,
            failures: outcome.failures,
        }
    }
}

/// Analyze one image.
///
/// Options are validated and the input resolved before any module runs.
pub fn analyze(
    backend: &dyn ImageBackend,
    input: impl Into<ImageInput>,
    browser: &BrowserData,
    options: &Options,
) -> Result<Report, AnalyzeError> {
    analyze_cancellable(backend, input, browser, options, CancelToken::new())
}

/// [`analyze`] with a token that can stop the run between rounds.
pub fn analyze_cancellable(
    backend: &dyn ImageBackend,
    input: impl Into<ImageInput>,
    browser: &BrowserData,
    options: &Options,
    cancel: CancelToken,
) -> Result<Report, AnalyzeError> {
    options.validate()?;
    let image = input.into().into_bytes()?;
    debug!(bytes = image.len(), "Starting analysis");

    let outcome = ModulesRunner::new(backend, &image, options, browser)
        .with_cancel_token(cancel)
        .run()?;
    Ok(Report::from_outcome(
        outcome,
        options.output.remove_buffers_from_transforms,
    ))
}
