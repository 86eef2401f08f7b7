//! Configuration for the extraction and normalization pipeline.
//!
//! Every knob lives in one [`PipelineConfig`], built via its
//! [`PipelineConfigBuilder`]. Keeping all thresholds in one struct makes it
//! trivial to share configs across threads, log them, and diff two runs to
//! understand why their outputs differ.
//!
//! # Design choice: builder over constructor
//! A struct this wide is unusable as a constructor. The builder lets
//! callers set only what they care about and rely on documented defaults
//! for the rest; setters clamp obviously-wrong values and `build()`
//! rejects combinations that would make the pipeline misbehave.

use crate::error::PipelineError;
use crate::model::TextModel;
use crate::ocr::OcrEngine;
use crate::progress::PipelineProgressCallback;
use crate::schema::SchemaContract;
use std::fmt;
use std::sync::Arc;

/// Configuration for one pipeline invocation.
///
/// Built via [`PipelineConfig::builder()`] or [`PipelineConfig::default()`].
///
/// # Example
/// ```rust
/// use pdf2record::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .dpi(300)
///     .max_repair_attempts(5)
///     .model("llama-3.3-70b-versatile")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Pages the classifier probes from the front of the document. Default: 3.
    ///
    /// Document type rarely changes past the first pages, so probing three
    /// answers the digital-vs-scanned question at a fraction of the cost of
    /// a full text pass. Raise it for documents that open with scanned
    /// cover sheets.
    pub classifier_sample_pages: usize,

    /// Characters a probed page must exceed to count as digital. Default: 10.
    ///
    /// Scanned pages often carry a handful of stray text-layer characters
    /// (a watermark, a page number stamped by the scanner). Ten characters
    /// separates those from a real text layer.
    pub min_chars_per_page: usize,

    /// Fraction of sampled pages that must be digital for a digital
    /// verdict; at the threshold counts as digital. Default: 0.5.
    pub digital_page_fraction: f64,

    /// Minimum quality score an extraction candidate needs to be accepted
    /// without trying further methods. Range 0.0–1.0. Default: 0.35.
    pub min_acceptable_score: f64,

    /// Minimum non-whitespace characters an accepted candidate must carry.
    /// Default: 20.
    ///
    /// A high-scoring but near-empty result (a lone heading recognised off
    /// an otherwise blank render) is not worth sending to the model.
    pub min_content_chars: usize,

    /// Single-character-word ratio above which OCR output is treated as
    /// recognition noise and its score is gated down. Default: 0.4.
    pub noise_single_char_ratio: f64,

    /// Rendering DPI for the OCR raster pass. Range 72–600. Default: 216.
    ///
    /// Tesseract's accuracy drops sharply below ~150 DPI and plateaus
    /// around 300; 216 (3× the 72-point PDF unit) keeps renders sharp
    /// without ballooning memory on large pages.
    pub dpi: u32,

    /// Concurrent per-page OCR recognitions. Default: 4.
    ///
    /// Tesseract is CPU-bound, so this should track core count rather than
    /// network width. Layout OCR is sequential regardless — its value is
    /// reading order, which parallelism would have to re-sort anyway.
    pub concurrency: usize,

    /// Model calls the normalizer may spend after the initial one. Default: 3.
    ///
    /// Each repair round-trip or transient call failure consumes one;
    /// deterministic local repairs are free. Zero disables model repair
    /// entirely: the first output is validated once and either passes or
    /// the run fails.
    pub max_repair_attempts: u32,

    /// Initial backoff in milliseconds after a failed model call. Default: 500.
    ///
    /// Doubles per consumed attempt: 500 ms → 1 s → 2 s.
    pub retry_backoff_ms: u64,

    /// Sampling temperature for model calls. Default: 0.0.
    ///
    /// Strict-JSON output wants determinism, not creativity.
    pub temperature: f32,

    /// Maximum tokens the model may generate per call. Default: 4000.
    pub max_tokens: usize,

    /// Model identifier. If None, [`crate::model::DEFAULT_MODEL`] is used.
    pub model: Option<String>,

    /// Tesseract language code for the default OCR engine. Default: "eng".
    pub ocr_language: String,

    /// Pre-constructed completion model. Takes precedence over `model` and
    /// the environment; tests inject stubs here.
    pub model_handle: Option<Arc<dyn TextModel>>,

    /// Pre-constructed OCR engine. If None, the Tesseract engine is used.
    pub ocr_engine: Option<Arc<dyn OcrEngine>>,

    /// Target schema contract. Default: the expense-report contract.
    pub contract: Arc<SchemaContract>,

    /// Progress observer for long-running conversions (CLI spinners, UIs).
    pub progress_callback: Option<Arc<dyn PipelineProgressCallback>>,

    /// Per-model-call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            classifier_sample_pages: 3,
            min_chars_per_page: 10,
            digital_page_fraction: 0.5,
            min_acceptable_score: 0.35,
            min_content_chars: 20,
            noise_single_char_ratio: 0.4,
            dpi: 216,
            concurrency: 4,
            max_repair_attempts: 3,
            retry_backoff_ms: 500,
            temperature: 0.0,
            max_tokens: 4000,
            model: None,
            ocr_language: "eng".to_string(),
            model_handle: None,
            ocr_engine: None,
            contract: SchemaContract::expense_report(),
            progress_callback: None,
            api_timeout_secs: 60,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("classifier_sample_pages", &self.classifier_sample_pages)
            .field("min_chars_per_page", &self.min_chars_per_page)
            .field("digital_page_fraction", &self.digital_page_fraction)
            .field("min_acceptable_score", &self.min_acceptable_score)
            .field("min_content_chars", &self.min_content_chars)
            .field("noise_single_char_ratio", &self.noise_single_char_ratio)
            .field("dpi", &self.dpi)
            .field("concurrency", &self.concurrency)
            .field("max_repair_attempts", &self.max_repair_attempts)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("model", &self.model)
            .field("ocr_language", &self.ocr_language)
            .field("model_handle", &self.model_handle.as_ref().map(|m| m.model_id()))
            .field("ocr_engine", &self.ocr_engine.as_ref().map(|_| "<dyn OcrEngine>"))
            .field("contract", &self.contract.name())
            .field("api_timeout_secs", &self.api_timeout_secs)
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn classifier_sample_pages(mut self, n: usize) -> Self {
        self.config.classifier_sample_pages = n.max(1);
        self
    }

    pub fn min_chars_per_page(mut self, n: usize) -> Self {
        self.config.min_chars_per_page = n;
        self
    }

    pub fn digital_page_fraction(mut self, fraction: f64) -> Self {
        self.config.digital_page_fraction = fraction.clamp(0.0, 1.0);
        self
    }

    pub fn min_acceptable_score(mut self, score: f64) -> Self {
        self.config.min_acceptable_score = score.clamp(0.0, 1.0);
        self
    }

    pub fn min_content_chars(mut self, n: usize) -> Self {
        self.config.min_content_chars = n;
        self
    }

    pub fn noise_single_char_ratio(mut self, ratio: f64) -> Self {
        self.config.noise_single_char_ratio = ratio.clamp(0.0, 1.0);
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 600);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn max_repair_attempts(mut self, n: u32) -> Self {
        self.config.max_repair_attempts = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn ocr_language(mut self, language: impl Into<String>) -> Self {
        self.config.ocr_language = language.into();
        self
    }

    pub fn model_handle(mut self, model: Arc<dyn TextModel>) -> Self {
        self.config.model_handle = Some(model);
        self
    }

    pub fn ocr_engine(mut self, engine: Arc<dyn OcrEngine>) -> Self {
        self.config.ocr_engine = Some(engine);
        self
    }

    pub fn contract(mut self, contract: Arc<SchemaContract>) -> Self {
        self.config.contract = contract;
        self
    }

    pub fn progress_callback(mut self, cb: Arc<dyn PipelineProgressCallback>) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, PipelineError> {
        let c = &self.config;
        if !(72..=600).contains(&c.dpi) {
            return Err(PipelineError::InvalidConfig(format!(
                "DPI must be 72–600, got {}",
                c.dpi
            )));
        }
        if c.concurrency == 0 {
            return Err(PipelineError::InvalidConfig(
                "concurrency must be ≥ 1".into(),
            ));
        }
        if !(0.0..=1.0).contains(&c.min_acceptable_score) {
            return Err(PipelineError::InvalidConfig(format!(
                "min_acceptable_score must be in 0.0–1.0, got {}",
                c.min_acceptable_score
            )));
        }
        if !(0.0..=1.0).contains(&c.digital_page_fraction) {
            return Err(PipelineError::InvalidConfig(format!(
                "digital_page_fraction must be in 0.0–1.0, got {}",
                c.digital_page_fraction
            )));
        }
        if c.ocr_language.is_empty() {
            return Err(PipelineError::InvalidConfig(
                "ocr_language must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_thresholds() {
        let config = PipelineConfig::default();
        assert_eq!(config.classifier_sample_pages, 3);
        assert_eq!(config.min_chars_per_page, 10);
        assert_eq!(config.digital_page_fraction, 0.5);
        assert_eq!(config.min_acceptable_score, 0.35);
        assert_eq!(config.max_repair_attempts, 3);
        assert_eq!(config.dpi, 216);
        assert_eq!(config.temperature, 0.0);
        assert_eq!(config.contract.name(), "expense-report");
    }

    #[test]
    fn builder_clamps_out_of_range_values() {
        let config = PipelineConfig::builder()
            .dpi(9999)
            .concurrency(0)
            .min_acceptable_score(1.5)
            .digital_page_fraction(-0.2)
            .temperature(5.0)
            .build()
            .unwrap();
        assert_eq!(config.dpi, 600);
        assert_eq!(config.concurrency, 1);
        assert_eq!(config.min_acceptable_score, 1.0);
        assert_eq!(config.digital_page_fraction, 0.0);
        assert_eq!(config.temperature, 2.0);
    }

    #[test]
    fn build_rejects_empty_ocr_language() {
        let result = PipelineConfig::builder().ocr_language("").build();
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn zero_repair_attempts_is_allowed() {
        let config = PipelineConfig::builder().max_repair_attempts(0).build().unwrap();
        assert_eq!(config.max_repair_attempts, 0);
    }

    #[test]
    fn debug_redacts_trait_objects() {
        let rendered = format!("{:?}", PipelineConfig::default());
        assert!(rendered.contains("classifier_sample_pages"));
        assert!(!rendered.contains("dyn TextModel"));
    }
}
