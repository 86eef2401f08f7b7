//! Result types produced by the pipeline.
//!
//! Everything here is scoped to a single pipeline invocation: attempt trails
//! are built up as the run progresses and handed to the caller inside the
//! final [`NormalizedRecord`] (or inside the terminal error). Nothing is
//! shared between concurrent runs and nothing outlives the call.
//!
//! All types are `Serialize` so callers can persist the full trail for
//! diagnostics (`--json` in the CLI prints it verbatim).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification verdict: which extraction chain the document starts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Branch {
    /// The document has an extractable text layer.
    Digital,
    /// The document is effectively an image; text must be recognized via OCR.
    Scanned,
}

impl Branch {
    /// The other branch, used for cross-chain fallback.
    pub fn other(self) -> Branch {
        match self {
            Branch::Digital => Branch::Scanned,
            Branch::Scanned => Branch::Digital,
        }
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Branch::Digital => write!(f, "digital"),
            Branch::Scanned => write!(f, "scanned"),
        }
    }
}

/// One extraction method try, kept for diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionAttempt {
    /// Method name, e.g. "pdfium-text", "raster-ocr".
    pub method: String,
    /// 1-indexed position of this try across the whole run.
    pub ordinal: usize,
    /// Which chain the method ran under.
    pub branch: Branch,
    /// Characters of text the method produced (0 on failure).
    pub chars: usize,
    /// Quality score of the produced text (0.0 on failure).
    pub score: f64,
    /// Wall-clock time spent in this method.
    pub elapsed_ms: u64,
    /// Failure detail, if the method failed.
    pub error: Option<String>,
}

/// The outcome of the extraction phase: the chosen text plus the full trail.
///
/// Invariant: `text` is non-empty. A run where every method failed is a
/// terminal [`crate::error::PipelineError::ExtractionFailed`], never an
/// empty-text success.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// Name of the method whose text was chosen.
    pub method: String,
    /// Which branch the classifier selected (the chosen method may come from
    /// the other chain after cross-chain fallback).
    pub branch: Branch,
    /// The extracted plain text, page markers included.
    pub text: String,
    /// Quality score of the chosen text.
    pub score: f64,
    /// Every method tried, in order.
    pub attempts: Vec<ExtractionAttempt>,
}

impl ExtractionResult {
    /// A bounded preview of the extracted text for logs and the CLI.
    pub fn preview(&self, max_chars: usize) -> &str {
        truncate_at_char_boundary(&self.text, max_chars)
    }
}

/// Which repair mechanism produced the model output behind an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepairStrategy {
    /// Initial request; no repair involved.
    None,
    /// Model-assisted repair round-trip.
    Model,
}

impl fmt::Display for RepairStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepairStrategy::None => write!(f, "initial"),
            RepairStrategy::Model => write!(f, "model-repair"),
        }
    }
}

/// How one normalization attempt ended.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// Strictly-valid JSON satisfying the contract.
    Valid,
    /// The output was not parseable JSON, even after local repairs.
    ParseFailed { detail: String },
    /// Parsed, but violated the schema contract.
    SchemaViolations { violations: Vec<SchemaViolation> },
    /// The model call itself failed (connection, rate limit, timeout).
    CallFailed { detail: String },
}

/// One schema-contract violation with the instance path it occurred at.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaViolation {
    /// JSON pointer into the offending instance, e.g. `/items/2/category`.
    pub instance_path: String,
    /// Human-readable violation message.
    pub message: String,
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.instance_path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "at {}: {}", self.instance_path, self.message)
        }
    }
}

/// One normalization try: what the model returned and how validation went.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizationAttempt {
    /// 1-indexed attempt number.
    pub ordinal: usize,
    /// Mechanism that produced the raw output for this attempt.
    pub strategy: RepairStrategy,
    /// Whether deterministic local repairs were applied before parsing
    /// succeeded. Local repairs never consume the model budget.
    pub local_repair_applied: bool,
    /// Truncated raw model output, for diagnostics.
    pub output_preview: String,
    /// Outcome of this attempt.
    pub outcome: AttemptOutcome,
}

/// Durations and counters for one pipeline run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStats {
    pub extract_duration_ms: u64,
    pub normalize_duration_ms: u64,
    pub total_duration_ms: u64,
    /// Extraction methods tried across all chains.
    pub extraction_attempts: usize,
    /// Normalization attempts, including the initial request.
    pub normalization_attempts: usize,
    /// Completion-model calls actually made.
    pub model_calls: usize,
}

/// The final product of a successful run: a strictly-valid JSON value
/// conforming to the schema contract, plus the full trail for observability.
#[derive(Debug, Clone, Serialize)]
pub struct NormalizedRecord {
    /// The validated JSON record.
    pub record: serde_json::Value,
    /// Name of the contract the record satisfies.
    pub contract: String,
    /// How the text was obtained.
    pub extraction: ExtractionResult,
    /// The normalization attempt trail.
    pub attempts: Vec<NormalizationAttempt>,
    /// Run statistics.
    pub stats: RunStats,
}

/// Document metadata read from the PDF, no model involved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub page_count: usize,
    pub pdf_version: String,
}

/// Truncate at a char boundary so previews never split a multi-byte char.
pub(crate) fn truncate_at_char_boundary(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn branch_other_flips() {
        assert_eq!(Branch::Digital.other(), Branch::Scanned);
        assert_eq!(Branch::Scanned.other(), Branch::Digital);
    }

    #[test]
    fn branch_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Branch::Digital).unwrap(), "\"digital\"");
    }

    #[test]
    fn preview_respects_char_boundaries() {
        let r = ExtractionResult {
            method: "pdfium-text".into(),
            branch: Branch::Digital,
            text: "héllo wörld".into(),
            score: 0.9,
            attempts: vec![],
        };
        assert_eq!(r.preview(5), "héllo");
        assert_eq!(r.preview(500), "héllo wörld");
    }

    #[test]
    fn violation_display_includes_path() {
        let v = SchemaViolation {
            instance_path: "/items/0/amount".into(),
            message: "\"abc\" is not of type \"number\"".into(),
        };
        assert!(v.to_string().contains("/items/0/amount"));
    }
}
