//! Extraction chains and the coordinator that drives them.
//!
//! Each chain is a statically ordered list of [`ExtractionMethod`]s
//! dispatched by one driver — adding, removing, or reordering a method is
//! editing a list, and every candidate is gated by the same scoring
//! function so results from different methods are directly comparable.
//!
//! The coordinator runs the classifier's branch first. If that branch's
//! best candidate is not acceptable, the other chain runs as a last resort
//! and the overall best-scoring candidate wins. Every method failure is
//! absorbed into the attempt trail; only a fully exhausted run crosses the
//! API boundary, as `ExtractionFailed` carrying that trail.

use crate::config::PipelineConfig;
use crate::document::SourceDocument;
use crate::error::{MethodError, PipelineError};
use crate::ocr::{OcrEngine, PageImage};
use crate::output::{Branch, ExtractionAttempt, ExtractionResult};
use crate::pipeline::{classify, clean_text, join_pages, render, score};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// One extraction strategy. Chains are slices of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionMethod {
    /// pdfium text layer, page by page.
    PdfiumText,
    /// Whole-document text via the pdf-extract parser.
    PdfExtract,
    /// Structured layout OCR over rendered pages.
    LayoutOcr,
    /// Plain text OCR per rasterised page.
    RasterOcr,
}

impl ExtractionMethod {
    pub fn name(self) -> &'static str {
        match self {
            ExtractionMethod::PdfiumText => "pdfium-text",
            ExtractionMethod::PdfExtract => "pdf-extract",
            ExtractionMethod::LayoutOcr => "layout-ocr",
            ExtractionMethod::RasterOcr => "raster-ocr",
        }
    }

    /// OCR candidates additionally pass the recognition-noise gate.
    fn is_ocr(self) -> bool {
        matches!(self, ExtractionMethod::LayoutOcr | ExtractionMethod::RasterOcr)
    }
}

/// The digital branch: text-layer methods in priority order.
pub const DIGITAL_CHAIN: &[ExtractionMethod] =
    &[ExtractionMethod::PdfiumText, ExtractionMethod::PdfExtract];

/// The scanned branch: OCR methods, then the digital methods as a tail —
/// "scanned" PDFs sometimes carry a partial text layer worth trying last.
pub const SCANNED_CHAIN: &[ExtractionMethod] = &[
    ExtractionMethod::LayoutOcr,
    ExtractionMethod::RasterOcr,
    ExtractionMethod::PdfiumText,
    ExtractionMethod::PdfExtract,
];

/// Cross-chain fallback for a document classified digital: only the OCR
/// methods — the digital methods already ran on the primary branch.
const OCR_ONLY_CHAIN: &[ExtractionMethod] =
    &[ExtractionMethod::LayoutOcr, ExtractionMethod::RasterOcr];

/// The best candidate seen so far in a run.
struct Candidate {
    method: &'static str,
    text: String,
    score: f64,
}

/// Run the full extraction phase: classify, drive the branch chain, fall
/// back across chains, select the best candidate.
pub async fn extract(
    doc: &SourceDocument,
    config: &PipelineConfig,
    engine: &Arc<dyn OcrEngine>,
) -> Result<ExtractionResult, PipelineError> {
    let branch = classify::classify(doc, config).await;
    if let Some(ref cb) = config.progress_callback {
        cb.on_classified(branch);
    }

    // One shared render pass per run; both OCR methods reuse it.
    let mut rendered: Option<Result<Vec<PageImage>, MethodError>> = None;

    let primary = match branch {
        Branch::Digital => DIGITAL_CHAIN,
        Branch::Scanned => SCANNED_CHAIN,
    };

    let mut attempts = Vec::new();
    let mut best = run_chain(doc, branch, primary, config, engine, &mut rendered, &mut attempts).await;

    if !is_acceptable(best.as_ref(), config) && branch == Branch::Digital {
        info!(
            "digital chain best score {:.2} below threshold, falling back to OCR chain",
            best.as_ref().map_or(0.0, |c| c.score)
        );
        let fallback = run_chain(
            doc,
            branch.other(),
            OCR_ONLY_CHAIN,
            config,
            engine,
            &mut rendered,
            &mut attempts,
        )
        .await;
        best = select_best(best, fallback);
    }

    match best {
        Some(candidate) if is_acceptable(Some(&candidate), config) => {
            info!(
                "extraction chose '{}' with score {:.2} ({} chars)",
                candidate.method,
                candidate.score,
                candidate.text.len()
            );
            Ok(ExtractionResult {
                method: candidate.method.to_string(),
                branch,
                text: candidate.text,
                score: candidate.score,
                attempts,
            })
        }
        _ => Err(PipelineError::ExtractionFailed { branch, attempts }),
    }
}

/// A candidate is usable when it clears the score threshold and carries a
/// minimum of real (non-whitespace) content.
fn is_acceptable(candidate: Option<&Candidate>, config: &PipelineConfig) -> bool {
    match candidate {
        Some(c) => {
            c.score >= config.min_acceptable_score
                && non_whitespace_chars(&c.text) >= config.min_content_chars
        }
        None => false,
    }
}

fn non_whitespace_chars(text: &str) -> usize {
    text.chars().filter(|c| !c.is_whitespace()).count()
}

fn select_best(a: Option<Candidate>, b: Option<Candidate>) -> Option<Candidate> {
    match (a, b) {
        (Some(x), Some(y)) => Some(if y.score > x.score { y } else { x }),
        (x, None) => x,
        (None, y) => y,
    }
}

/// Drive one ordered method list. Stops at the first acceptable candidate;
/// otherwise keeps the highest-scoring one across all attempted methods.
#[allow(clippy::too_many_arguments)]
async fn run_chain(
    doc: &SourceDocument,
    branch: Branch,
    chain: &[ExtractionMethod],
    config: &PipelineConfig,
    engine: &Arc<dyn OcrEngine>,
    rendered: &mut Option<Result<Vec<PageImage>, MethodError>>,
    attempts: &mut Vec<ExtractionAttempt>,
) -> Option<Candidate> {
    let mut best: Option<Candidate> = None;

    for &method in chain {
        if let Some(ref cb) = config.progress_callback {
            cb.on_method_start(method.name());
        }
        let start = Instant::now();
        let outcome = run_method(doc, method, config, engine, rendered).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(text) => {
                let raw_score = score::quality_score(&text);
                let method_score = if method.is_ocr() {
                    score::apply_noise_gate(raw_score, &text, config.noise_single_char_ratio)
                } else {
                    raw_score
                };
                debug!(
                    "method '{}': {} chars, score {:.2} in {}ms",
                    method.name(),
                    text.len(),
                    method_score,
                    elapsed_ms
                );
                if let Some(ref cb) = config.progress_callback {
                    cb.on_method_complete(method.name(), method_score, text.chars().count());
                }
                attempts.push(ExtractionAttempt {
                    method: method.name().to_string(),
                    ordinal: attempts.len() + 1,
                    branch,
                    chars: text.chars().count(),
                    score: method_score,
                    elapsed_ms,
                    error: None,
                });

                let candidate = Candidate {
                    method: method.name(),
                    text,
                    score: method_score,
                };
                if best.as_ref().map_or(true, |b| candidate.score > b.score) {
                    best = Some(candidate);
                }
                if is_acceptable(best.as_ref(), config) {
                    break;
                }
            }
            Err(e) => {
                warn!("method '{}' failed: {e}", method.name());
                if let Some(ref cb) = config.progress_callback {
                    cb.on_method_failed(method.name(), &e.to_string());
                }
                attempts.push(ExtractionAttempt {
                    method: method.name().to_string(),
                    ordinal: attempts.len() + 1,
                    branch,
                    chars: 0,
                    score: 0.0,
                    elapsed_ms,
                    error: Some(e.to_string()),
                });
            }
        }
    }

    best
}

/// Dispatch one method.
async fn run_method(
    doc: &SourceDocument,
    method: ExtractionMethod,
    config: &PipelineConfig,
    engine: &Arc<dyn OcrEngine>,
    rendered: &mut Option<Result<Vec<PageImage>, MethodError>>,
) -> Result<String, MethodError> {
    match method {
        ExtractionMethod::PdfiumText => pdfium_text(doc).await,
        ExtractionMethod::PdfExtract => pdf_extract_text(doc).await,
        ExtractionMethod::LayoutOcr => {
            let pages = rendered_pages(doc, config, rendered).await?;
            layout_ocr(engine, pages).await
        }
        ExtractionMethod::RasterOcr => {
            let pages = rendered_pages(doc, config, rendered).await?;
            raster_ocr(engine, pages, config.concurrency).await
        }
    }
}

/// Render pages once and reuse them for every OCR method in the run.
async fn rendered_pages<'a>(
    doc: &SourceDocument,
    config: &PipelineConfig,
    rendered: &'a mut Option<Result<Vec<PageImage>, MethodError>>,
) -> Result<&'a [PageImage], MethodError> {
    if rendered.is_none() {
        *rendered = Some(render::render_page_images(doc.path(), config.dpi).await);
    }
    match rendered.as_ref() {
        Some(Ok(pages)) => Ok(pages),
        Some(Err(e)) => Err(e.clone()),
        None => unreachable!("rendered pages were just populated"),
    }
}

/// pdfium text layer, page by page in index order. Per-page errors are
/// logged and skipped; the method fails only when no page produces text.
async fn pdfium_text(doc: &SourceDocument) -> Result<String, MethodError> {
    let page_texts = render::probe_page_texts(doc.path(), None).await?;

    let mut pages: Vec<(usize, String)> = Vec::with_capacity(page_texts.len());
    for (idx, result) in page_texts.into_iter().enumerate() {
        match result {
            Ok(text) => pages.push((idx, clean_text(&text))),
            Err(e) => warn!("pdfium-text page {}: {e}", idx + 1),
        }
    }

    let joined = join_pages(pages);
    if joined.is_empty() {
        Err(MethodError::Failed("no page produced text".to_string()))
    } else {
        Ok(joined)
    }
}

/// Whole-document text via pdf-extract, run on a blocking thread. The
/// parser can panic on hostile input; the panic is absorbed as a method
/// failure via the JoinError.
async fn pdf_extract_text(doc: &SourceDocument) -> Result<String, MethodError> {
    let path = doc.path().to_path_buf();
    let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text(&path))
        .await
        .map_err(|e| MethodError::Failed(format!("pdf-extract parser panicked: {e}")))?
        .map_err(|e| MethodError::Failed(format!("pdf-extract failed: {e}")))?;

    let cleaned = clean_text(&text);
    if cleaned.is_empty() {
        Err(MethodError::Failed("document produced no text".to_string()))
    } else {
        Ok(cleaned)
    }
}

/// Structured layout OCR over all rendered pages.
async fn layout_ocr(
    engine: &Arc<dyn OcrEngine>,
    pages: &[PageImage],
) -> Result<String, MethodError> {
    if !engine.is_available() {
        return Err(MethodError::EngineUnavailable(engine.availability_hint()));
    }
    let text = engine.layout_ocr(pages).await?;
    let cleaned = clean_text(&text);
    if cleaned.is_empty() {
        Err(MethodError::Failed("layout OCR produced no text".to_string()))
    } else {
        Ok(cleaned)
    }
}

/// Plain text OCR per page, pages run concurrently up to the configured
/// limit. Results are reassembled strictly in page-index order regardless
/// of completion order. A failed page is logged and skipped; the method
/// fails when every page fails.
async fn raster_ocr(
    engine: &Arc<dyn OcrEngine>,
    pages: &[PageImage],
    concurrency: usize,
) -> Result<String, MethodError> {
    if !engine.is_available() {
        return Err(MethodError::EngineUnavailable(engine.availability_hint()));
    }
    if pages.is_empty() {
        return Err(MethodError::Failed("no pages to recognise".to_string()));
    }

    let results: Vec<(usize, Result<String, String>)> = stream::iter(pages.iter().map(|page| {
        let engine = Arc::clone(engine);
        let page = page.clone();
        async move {
            let index = page.index;
            let result = engine.text_ocr(&page).await.map_err(|e| e.to_string());
            (index, result)
        }
    }))
    .buffer_unordered(concurrency.max(1))
    .collect()
    .await;

    let mut recognised: Vec<(usize, String)> = Vec::with_capacity(results.len());
    let mut failures = 0usize;
    for (index, result) in results {
        match result {
            Ok(text) => recognised.push((index, clean_text(&text))),
            Err(e) => {
                warn!("raster-ocr page {}: {e}", index + 1);
                failures += 1;
            }
        }
    }

    if recognised.is_empty() {
        return Err(MethodError::Failed(format!(
            "every page failed recognition ({failures} pages)"
        )));
    }

    let joined = join_pages(recognised);
    if joined.is_empty() {
        Err(MethodError::Failed("recognised pages were empty".to_string()))
    } else {
        Ok(joined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(method: &'static str, score: f64) -> Candidate {
        Candidate {
            method,
            text: "enough non-whitespace content to clear the minimum".to_string(),
            score,
        }
    }

    #[test]
    fn select_best_prefers_higher_score() {
        let chosen = select_best(Some(candidate("a", 0.3)), Some(candidate("b", 0.7)));
        assert_eq!(chosen.unwrap().method, "b");
        let chosen = select_best(Some(candidate("a", 0.7)), Some(candidate("b", 0.3)));
        assert_eq!(chosen.unwrap().method, "a");
    }

    #[test]
    fn select_best_handles_missing_sides() {
        assert!(select_best(None, None).is_none());
        assert_eq!(select_best(Some(candidate("a", 0.1)), None).unwrap().method, "a");
        assert_eq!(select_best(None, Some(candidate("b", 0.1))).unwrap().method, "b");
    }

    #[test]
    fn acceptance_requires_score_and_content() {
        let config = PipelineConfig::default();
        assert!(is_acceptable(Some(&candidate("a", 0.5)), &config));
        assert!(!is_acceptable(Some(&candidate("a", 0.1)), &config));
        assert!(!is_acceptable(None, &config));

        let thin = Candidate {
            method: "a",
            text: "tiny".to_string(),
            score: 0.9,
        };
        assert!(!is_acceptable(Some(&thin), &config));
    }

    #[test]
    fn chains_are_ordered_as_documented() {
        assert_eq!(DIGITAL_CHAIN[0], ExtractionMethod::PdfiumText);
        assert_eq!(SCANNED_CHAIN[0], ExtractionMethod::LayoutOcr);
        assert_eq!(SCANNED_CHAIN[1], ExtractionMethod::RasterOcr);
        // Scanned chain ends with the digital methods as its fallback tail.
        assert_eq!(&SCANNED_CHAIN[2..], DIGITAL_CHAIN);
    }

    #[test]
    fn non_whitespace_counting() {
        assert_eq!(non_whitespace_chars("a b\nc\t"), 3);
        assert_eq!(non_whitespace_chars("   "), 0);
    }
}
