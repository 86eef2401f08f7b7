//! Classifier: digital vs. scanned verdict from a sampled text-layer probe.
//!
//! The classifier never fails. Any error while probing a page counts that
//! page as non-digital, and a document-level probe error classifies the
//! whole document as scanned — errors bias toward the OCR path, which can
//! always fall back to digital extraction if the verdict was wrong. The
//! cost of a wrong Scanned verdict is some wasted OCR time; the cost of a
//! wrong Digital verdict would be garbage text, so the bias is asymmetric
//! on purpose.

use crate::config::PipelineConfig;
use crate::document::SourceDocument;
use crate::output::Branch;
use crate::pipeline::render;
use tracing::{debug, info};

/// Fraction of replacement characters above which a page's text layer is
/// considered decode artifacts rather than real text.
const MAX_ARTIFACT_RATIO: f64 = 0.2;

/// Classify the document by probing the first
/// `min(classifier_sample_pages, page_count)` pages.
pub async fn classify(doc: &SourceDocument, config: &PipelineConfig) -> Branch {
    if doc.page_count() == 0 {
        debug!("zero probed pages, classifying as scanned");
        return Branch::Scanned;
    }

    let sample = config.classifier_sample_pages.min(doc.page_count());
    let texts = match render::probe_page_texts(doc.path(), Some(sample)).await {
        Ok(texts) => texts,
        Err(e) => {
            info!("classifier probe failed ({e}), classifying as scanned");
            return Branch::Scanned;
        }
    };

    let digital_pages = count_digital_pages(&texts, config.min_chars_per_page);
    let verdict = decide(digital_pages, texts.len(), config.digital_page_fraction);
    info!(
        "classified as {verdict}: {digital_pages}/{} sampled pages digital",
        texts.len()
    );
    verdict
}

/// Count the sampled pages with a digital text layer. A page whose probe
/// failed counts as non-digital.
pub(crate) fn count_digital_pages(texts: &[Result<String, String>], min_chars: usize) -> usize {
    texts
        .iter()
        .filter(|page| match page {
            Ok(text) => page_is_digital(text, min_chars),
            Err(_) => false,
        })
        .count()
}

/// A page counts as digital when its text layer has enough trimmed
/// characters and is not dominated by decode artifacts.
pub(crate) fn page_is_digital(text: &str, min_chars: usize) -> bool {
    let trimmed = text.trim();
    if trimmed.chars().count() <= min_chars {
        return false;
    }
    let total = trimmed.chars().count();
    let artifacts = trimmed.chars().filter(|c| *c == '\u{FFFD}').count();
    (artifacts as f64 / total as f64) < MAX_ARTIFACT_RATIO
}

/// Digital when the digital fraction of sampled pages is at least the
/// threshold. Zero sampled pages is scanned.
pub(crate) fn decide(digital_pages: usize, sampled: usize, fraction: f64) -> Branch {
    if sampled == 0 {
        return Branch::Scanned;
    }
    if digital_pages as f64 / sampled as f64 >= fraction {
        Branch::Digital
    } else {
        Branch::Scanned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(text: &str) -> Result<String, String> {
        Ok(text.to_string())
    }

    fn failed_page() -> Result<String, String> {
        Err("page could not be probed".to_string())
    }

    #[test]
    fn errored_pages_count_as_non_digital() {
        let texts = vec![
            page("this page has plenty of real text on it"),
            failed_page(),
            failed_page(),
        ];
        assert_eq!(count_digital_pages(&texts, 10), 1);
    }

    #[test]
    fn all_errored_sample_counts_zero_digital_pages() {
        let texts = vec![failed_page(), failed_page()];
        assert_eq!(count_digital_pages(&texts, 10), 0);
        // Which the decision rule turns into the scanned verdict.
        assert_eq!(decide(0, texts.len(), 0.5), Branch::Scanned);
    }

    #[test]
    fn counting_applies_the_per_page_rule() {
        let texts = vec![
            page("a long enough digital text layer here"),
            page("hi"),
            page("    "),
        ];
        assert_eq!(count_digital_pages(&texts, 10), 1);
    }

    #[test]
    fn decide_at_threshold_is_digital() {
        // Exactly at the default 0.5 fraction.
        assert_eq!(decide(1, 2, 0.5), Branch::Digital);
        assert_eq!(decide(2, 4, 0.5), Branch::Digital);
    }

    #[test]
    fn decide_below_threshold_is_scanned() {
        assert_eq!(decide(1, 3, 0.5), Branch::Scanned);
        assert_eq!(decide(0, 4, 0.5), Branch::Scanned);
    }

    #[test]
    fn decide_zero_pages_is_scanned() {
        assert_eq!(decide(0, 0, 0.5), Branch::Scanned);
    }

    #[test]
    fn decide_is_order_independent() {
        // The verdict depends only on counts, so page order cannot matter.
        assert_eq!(decide(3, 3, 0.5), Branch::Digital);
    }

    #[test]
    fn short_page_is_not_digital() {
        assert!(!page_is_digital("hi", 10));
        assert!(!page_is_digital("exactly10c", 10));
        assert!(page_is_digital("this page has plenty of text", 10));
    }

    #[test]
    fn artifact_dominated_page_is_not_digital() {
        let garbled: String = "\u{FFFD}".repeat(30) + "some text";
        assert!(!page_is_digital(&garbled, 10));
    }

    #[test]
    fn whitespace_only_page_is_not_digital() {
        assert!(!page_is_digital("                         ", 10));
    }
}
