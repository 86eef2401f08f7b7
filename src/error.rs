//! Error types for the pdf2record library.
//!
//! Two layers reflect the propagation policy of the pipeline:
//!
//! * [`PipelineError`] — **Terminal**: the run cannot produce a record
//!   (every extraction method exhausted, repair budget spent, model not
//!   configured). Returned as `Err(PipelineError)` from the top-level
//!   `process*` functions.
//!
//! * [`MethodError`] — **Absorbed**: a single extraction method failed
//!   (pdfium could not open the file, the OCR binary is missing). Folded
//!   into the [`crate::output::ExtractionAttempt`] trail; the chain moves
//!   on to the next method.
//!
//! Capability errors ([`ModelError`], [`OcrError`]) never cross the API
//! boundary directly — they are converted into attempt entries or into the
//! `detail` of a terminal error.

use crate::output::{Branch, ExtractionAttempt, NormalizationAttempt};
use std::path::PathBuf;
use thiserror::Error;

/// All terminal errors returned by the pdf2record library.
///
/// Per-method failures use [`MethodError`] and are stored in
/// [`crate::output::ExtractionAttempt`] rather than propagated here.
#[derive(Debug, Error)]
pub enum PipelineError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    ///
    /// Only returned by [`crate::process::inspect`]; the processing pipeline
    /// absorbs corrupt input into the extraction trail and reports
    /// [`PipelineError::ExtractionFailed`] instead.
    #[error("PDF '{path}' is corrupt: {detail}\nTry repairing with: qpdf --decrypt input.pdf output.pdf")]
    CorruptPdf { path: PathBuf, detail: String },

    // ── Extraction errors ─────────────────────────────────────────────────
    /// Every method in every applicable chain failed or scored below the
    /// minimum-acceptable threshold. No model call was made.
    #[error("Text extraction failed on the {branch} branch: all {} methods were exhausted.\nFirst error: {}", attempts.len(), first_attempt_error(attempts))]
    ExtractionFailed {
        branch: Branch,
        attempts: Vec<ExtractionAttempt>,
    },

    // ── Normalization errors ──────────────────────────────────────────────
    /// The repair budget was exhausted without producing schema-valid JSON.
    #[error("Normalization failed after {} attempts: {detail}", attempts.len())]
    NormalizationFailed {
        attempts: Vec<NormalizationAttempt>,
        detail: String,
    },

    /// No completion model is configured (no injected handle, no API key).
    #[error("Completion model '{model}' is not configured.\n{hint}")]
    ModelNotConfigured { model: String, hint: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output record file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

fn first_attempt_error(attempts: &[ExtractionAttempt]) -> String {
    attempts
        .iter()
        .find_map(|a| a.error.clone())
        .unwrap_or_else(|| "no method produced usable text".to_string())
}

/// A non-fatal failure of a single extraction method.
///
/// Recorded in the [`crate::output::ExtractionAttempt`] trail; the chain
/// continues with the next method.
#[derive(Debug, Clone, Error)]
pub enum MethodError {
    /// The method ran but could not produce text.
    #[error("{0}")]
    Failed(String),

    /// The capability backing this method is not usable on this host.
    #[error("engine unavailable: {0}")]
    EngineUnavailable(String),

    /// Page rasterisation failed; affects every OCR method in the chain.
    #[error("rasterisation failed: {0}")]
    RenderFailed(String),
}

impl From<OcrError> for MethodError {
    fn from(e: OcrError) -> Self {
        match e {
            OcrError::EngineUnavailable(hint) => MethodError::EngineUnavailable(hint),
            other => MethodError::Failed(other.to_string()),
        }
    }
}

/// Errors from the injected completion-model capability.
///
/// Transient variants (connection, rate limit, timeout, 5xx) consume repair
/// budget like any other failed normalization attempt; there is no retry
/// loop outside that budget.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Could not reach the API endpoint at all.
    #[error("connection to completion API failed: {0}")]
    Connection(String),

    /// The API returned a non-success status.
    #[error("completion API returned HTTP {status}: {body}")]
    ApiStatus { status: u16, body: String },

    /// HTTP 429 — check `retry_after_secs` for a server-specified delay.
    #[error("completion API rate limit exceeded")]
    RateLimited { retry_after_secs: Option<u64> },

    /// The call exceeded the configured timeout.
    #[error("completion API call timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The response body did not contain a completion.
    #[error("completion API response could not be parsed: {0}")]
    ResponseParse(String),
}

/// Errors from the injected OCR capability.
#[derive(Debug, Error)]
pub enum OcrError {
    /// The engine cannot run on this host (missing binary, model init failed).
    #[error("OCR engine unavailable: {0}")]
    EngineUnavailable(String),

    /// The engine ran but recognition failed.
    #[error("OCR recognition failed: {0}")]
    RecognitionFailed(String),

    /// Scratch-file I/O around the engine failed.
    #[error("OCR I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extraction_failed_display_names_branch() {
        let e = PipelineError::ExtractionFailed {
            branch: Branch::Scanned,
            attempts: vec![],
        };
        let msg = e.to_string();
        assert!(msg.contains("scanned"), "got: {msg}");
    }

    #[test]
    fn extraction_failed_display_surfaces_first_error() {
        let attempt = ExtractionAttempt {
            method: "pdfium-text".into(),
            ordinal: 1,
            branch: Branch::Digital,
            chars: 0,
            score: 0.0,
            elapsed_ms: 3,
            error: Some("no text layer".into()),
        };
        let e = PipelineError::ExtractionFailed {
            branch: Branch::Digital,
            attempts: vec![attempt],
        };
        assert!(e.to_string().contains("no text layer"));
    }

    #[test]
    fn model_not_configured_display_includes_hint() {
        let e = PipelineError::ModelNotConfigured {
            model: "llama-3.3-70b-versatile".into(),
            hint: "Set GROQ_API_KEY".into(),
        };
        assert!(e.to_string().contains("GROQ_API_KEY"));
    }

    #[test]
    fn rate_limited_display() {
        let e = ModelError::RateLimited {
            retry_after_secs: Some(30),
        };
        assert!(e.to_string().contains("rate limit"));
    }

    #[test]
    fn ocr_unavailable_folds_into_method_error() {
        let m: MethodError = OcrError::EngineUnavailable("tesseract not found".into()).into();
        assert!(matches!(m, MethodError::EngineUnavailable(_)));
        assert!(m.to_string().contains("tesseract not found"));
    }

    #[test]
    fn ocr_recognition_folds_into_method_failed() {
        let m: MethodError = OcrError::RecognitionFailed("empty output".into()).into();
        assert!(matches!(m, MethodError::Failed(_)));
    }
}
