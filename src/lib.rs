//! # pdf2record
//!
//! Turn messy PDFs — digital or scanned — into strictly-valid JSON records.
//!
//! ## Why this crate?
//!
//! PDF text extraction is unreliable in two independent ways: the text may
//! be missing (scanned pages need OCR) and even a good text layer comes out
//! as unstructured prose. This crate solves both halves: an extraction
//! phase that classifies the document and drives ordered fallback chains of
//! methods until one produces acceptable text, and a normalization phase
//! that prompts a completion model for JSON and then validates and repairs
//! the output against a schema contract inside a bounded budget. A run
//! either returns a record that provably satisfies the contract or a
//! terminal error carrying the full attempt trail.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Classify   probe the text layer of the first pages → digital | scanned
//!  ├─ 2. Extract    ordered method chain per branch, quality-scored,
//!  │                cross-chain fallback (pdfium text / pdf-extract /
//!  │                layout OCR / raster OCR via tesseract)
//!  ├─ 3. Request    completion model call with the contract description
//!  ├─ 4. Validate   parse (+ free local repairs) and check the JSON Schema
//!  ├─ 5. Repair     model round-trips quoting the exact violations,
//!  │                bounded by max_repair_attempts
//!  └─ 6. Output     NormalizedRecord: validated JSON + full attempt trail
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf2record::{process, PipelineConfig, SourceDocument};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Model read from GROQ_API_KEY
//!     let config = PipelineConfig::default();
//!     let doc = SourceDocument::from_path("expenses.pdf").await?;
//!     let record = process(&doc, &config).await?;
//!     println!("{}", serde_json::to_string_pretty(&record.record)?);
//!     eprintln!("extracted via {} ({} model calls)",
//!         record.extraction.method,
//!         record.stats.model_calls);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2record` binary (clap + indicatif + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdf2record = { version = "0.1", default-features = false }
//! ```
//!
//! ## Injecting capabilities
//!
//! Both external capabilities sit behind narrow traits so they can be
//! swapped without touching the pipeline: implement
//! [`TextModel`](model::TextModel) for a different completion backend, or
//! [`OcrEngine`](ocr::OcrEngine) for a different recogniser, and inject
//! them via the [`PipelineConfigBuilder`].

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod document;
pub mod error;
pub mod model;
pub mod ocr;
pub mod output;
pub mod pipeline;
pub mod process;
pub mod progress;
pub mod prompts;
pub mod schema;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{PipelineConfig, PipelineConfigBuilder};
pub use document::SourceDocument;
pub use error::{MethodError, ModelError, OcrError, PipelineError};
pub use model::{CompletionRequest, GroqModel, TextModel, DEFAULT_MODEL};
pub use ocr::{OcrEngine, PageImage, TesseractEngine};
pub use output::{
    AttemptOutcome, Branch, DocumentMetadata, ExtractionAttempt, ExtractionResult,
    NormalizationAttempt, NormalizedRecord, RepairStrategy, RunStats, SchemaViolation,
};
pub use process::{extract_only, inspect, process, process_sync, process_to_file};
pub use progress::{NoopProgressCallback, PipelineProgressCallback, ProgressCallback};
pub use schema::{SchemaContract, EXPENSE_CATEGORIES};
