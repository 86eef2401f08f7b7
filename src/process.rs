//! Top-level entry points: document in, validated record out.
//!
//! [`process`] is the primary API: it resolves the model and OCR engine,
//! runs the extraction phase, drives the normalization state machine, and
//! returns a [`NormalizedRecord`] carrying the validated JSON plus the full
//! attempt trail. The other functions are convenience surfaces over it.

use crate::config::PipelineConfig;
use crate::document::SourceDocument;
use crate::error::PipelineError;
use crate::model::{GroqModel, TextModel, DEFAULT_MODEL};
use crate::ocr::{OcrEngine, TesseractEngine};
use crate::output::{DocumentMetadata, ExtractionResult, NormalizedRecord, RunStats};
use crate::pipeline::{extract, normalize, render};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Process a document into a schema-valid JSON record.
///
/// # Errors
/// Returns `Err(PipelineError)` only for terminal failures:
/// - No completion model configured (no handle, no `GROQ_API_KEY`)
/// - Every extraction method exhausted ([`PipelineError::ExtractionFailed`];
///   no model call is made in that case)
/// - Repair budget exhausted ([`PipelineError::NormalizationFailed`])
pub async fn process(
    doc: &SourceDocument,
    config: &PipelineConfig,
) -> Result<NormalizedRecord, PipelineError> {
    let total_start = Instant::now();
    info!("processing '{}' ({} pages)", doc.name(), doc.page_count());

    if let Some(ref cb) = config.progress_callback {
        cb.on_pipeline_start(doc.name(), doc.page_count());
    }

    // Resolve the model before extraction: a missing API key should surface
    // immediately, not after seconds of OCR.
    let model = resolve_model(config)?;
    let engine = resolve_engine(config);

    let extract_start = Instant::now();
    let extraction = match extract::extract(doc, config, &engine).await {
        Ok(result) => result,
        Err(e) => {
            if let Some(ref cb) = config.progress_callback {
                cb.on_pipeline_complete(false);
            }
            return Err(e);
        }
    };
    let extract_duration_ms = extract_start.elapsed().as_millis() as u64;
    info!(
        "extraction done via '{}' in {}ms ({} chars)",
        extraction.method,
        extract_duration_ms,
        extraction.text.len()
    );

    let normalize_start = Instant::now();
    let normalized = normalize::normalize(&extraction.text, config, &model).await;
    let normalize_duration_ms = normalize_start.elapsed().as_millis() as u64;

    let (record, attempts) = match normalized {
        Ok(pair) => pair,
        Err(e) => {
            if let Some(ref cb) = config.progress_callback {
                cb.on_pipeline_complete(false);
            }
            return Err(e);
        }
    };

    // Every attempt entry corresponds to exactly one model call: successful
    // calls land as validated attempts, failed calls as CallFailed entries.
    let stats = RunStats {
        extract_duration_ms,
        normalize_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        extraction_attempts: extraction.attempts.len(),
        normalization_attempts: attempts.len(),
        model_calls: attempts.len(),
    };
    info!(
        "record valid after {} normalization attempt(s), {}ms total",
        stats.normalization_attempts, stats.total_duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_pipeline_complete(true);
    }

    Ok(NormalizedRecord {
        record,
        contract: config.contract.name().to_string(),
        extraction,
        attempts,
        stats,
    })
}

/// Process a document and write the validated record to a file as pretty
/// JSON.
///
/// Uses atomic write (temp file + rename) so a crash never leaves a
/// partial record behind.
pub async fn process_to_file(
    doc: &SourceDocument,
    output_path: impl AsRef<Path>,
    config: &PipelineConfig,
) -> Result<NormalizedRecord, PipelineError> {
    let result = process(doc, config).await?;
    let path = output_path.as_ref();

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                PipelineError::OutputWriteFailed {
                    path: path.to_path_buf(),
                    source: e,
                }
            })?;
        }
    }

    let rendered = serde_json::to_string_pretty(&result.record)
        .map_err(|e| PipelineError::Internal(format!("record serialization: {e}")))?;

    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, rendered.as_bytes())
        .await
        .map_err(|e| PipelineError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| PipelineError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    debug!("record written to '{}'", path.display());
    Ok(result)
}

/// Synchronous wrapper around [`process`] for a local file.
///
/// Creates a temporary tokio runtime internally.
pub fn process_sync(
    path: impl AsRef<Path>,
    config: &PipelineConfig,
) -> Result<NormalizedRecord, PipelineError> {
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| PipelineError::Internal(format!("failed to create tokio runtime: {e}")))?;
    runtime.block_on(async {
        let doc = SourceDocument::from_path(path).await?;
        process(&doc, config).await
    })
}

/// Run only the extraction phase: classify, drive the chains, return the
/// best text with its trail. No model is resolved and no API key is needed.
pub async fn extract_only(
    doc: &SourceDocument,
    config: &PipelineConfig,
) -> Result<ExtractionResult, PipelineError> {
    let engine = resolve_engine(config);
    extract::extract(doc, config, &engine).await
}

/// Read document metadata without extracting content.
///
/// Does not require a model, an API key, or an OCR engine.
pub async fn inspect(path: impl AsRef<Path>) -> Result<DocumentMetadata, PipelineError> {
    let doc = SourceDocument::from_path(path).await?;
    render::read_metadata(doc.path()).await
}

/// Resolve the completion model: injected handle first, then `GROQ_API_KEY`.
fn resolve_model(config: &PipelineConfig) -> Result<Arc<dyn TextModel>, PipelineError> {
    if let Some(ref handle) = config.model_handle {
        return Ok(Arc::clone(handle));
    }
    let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
    Ok(Arc::new(GroqModel::from_env(model, config.api_timeout_secs)?))
}

/// Resolve the OCR engine: injected engine first, then Tesseract.
fn resolve_engine(config: &PipelineConfig) -> Arc<dyn OcrEngine> {
    match config.ocr_engine {
        Some(ref engine) => Arc::clone(engine),
        None => Arc::new(TesseractEngine::new(config.ocr_language.as_str())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_model_without_key_or_handle_fails() {
        std::env::remove_var("GROQ_API_KEY");
        let config = PipelineConfig::default();
        assert!(matches!(
            resolve_model(&config),
            Err(PipelineError::ModelNotConfigured { .. })
        ));
    }

    #[test]
    fn resolve_engine_defaults_to_tesseract() {
        let config = PipelineConfig::default();
        // Just asserts the default path constructs an engine; availability
        // depends on the host.
        let engine = resolve_engine(&config);
        let _ = engine.availability_hint();
    }
}
