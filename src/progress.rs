//! Progress-callback trait for pipeline phase events.
//!
//! Inject an [`Arc<dyn PipelineProgressCallback>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to receive
//! real-time events as the pipeline classifies, runs extraction methods,
//! and drives normalization attempts.
//!
//! # Why callbacks instead of channels?
//!
//! The callback approach is the least-invasive integration point: callers
//! can forward events to a broadcast channel, a WebSocket, a database
//! record, or a terminal spinner — without the library knowing anything
//! about how the host application communicates. The trait is `Send + Sync`
//! so it works when the pipeline runs on a multi-threaded runtime.

use crate::output::{Branch, RepairStrategy};
use std::sync::Arc;

/// Called by the pipeline as each phase progresses.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Extraction-method events fire strictly in attempt
/// order; normalization events fire once per validated model output.
pub trait PipelineProgressCallback: Send + Sync {
    /// Called once when processing starts.
    ///
    /// # Arguments
    /// * `name`       — source document name
    /// * `page_count` — pages the document reports (0 for corrupt input)
    fn on_pipeline_start(&self, name: &str, page_count: usize) {
        let _ = (name, page_count);
    }

    /// Called when the classifier has produced its verdict.
    fn on_classified(&self, branch: Branch) {
        let _ = branch;
    }

    /// Called just before an extraction method runs.
    fn on_method_start(&self, method: &str) {
        let _ = method;
    }

    /// Called when an extraction method produced text.
    ///
    /// # Arguments
    /// * `method` — method name, e.g. "pdfium-text"
    /// * `score`  — quality score in 0.0–1.0
    /// * `chars`  — characters of text produced
    fn on_method_complete(&self, method: &str, score: f64, chars: usize) {
        let _ = (method, score, chars);
    }

    /// Called when an extraction method failed; the chain continues.
    fn on_method_failed(&self, method: &str, error: &str) {
        let _ = (method, error);
    }

    /// Called for each normalization attempt about to be validated.
    ///
    /// # Arguments
    /// * `ordinal`  — 1-indexed attempt number
    /// * `strategy` — how the output being validated was obtained
    fn on_normalization_attempt(&self, ordinal: usize, strategy: RepairStrategy) {
        let _ = (ordinal, strategy);
    }

    /// Called once when the run finishes, successfully or not.
    fn on_pipeline_complete(&self, success: bool) {
        let _ = success;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl PipelineProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn PipelineProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct TrackingCallback {
        methods_started: AtomicUsize,
        methods_completed: AtomicUsize,
        methods_failed: AtomicUsize,
        normalizations: AtomicUsize,
    }

    impl PipelineProgressCallback for TrackingCallback {
        fn on_method_start(&self, _method: &str) {
            self.methods_started.fetch_add(1, Ordering::SeqCst);
        }

        fn on_method_complete(&self, _method: &str, _score: f64, _chars: usize) {
            self.methods_completed.fetch_add(1, Ordering::SeqCst);
        }

        fn on_method_failed(&self, _method: &str, _error: &str) {
            self.methods_failed.fetch_add(1, Ordering::SeqCst);
        }

        fn on_normalization_attempt(&self, _ordinal: usize, _strategy: RepairStrategy) {
            self.normalizations.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_pipeline_start("doc.pdf", 3);
        cb.on_classified(Branch::Digital);
        cb.on_method_start("pdfium-text");
        cb.on_method_complete("pdfium-text", 0.8, 1200);
        cb.on_method_failed("layout-ocr", "tesseract not found");
        cb.on_normalization_attempt(1, RepairStrategy::None);
        cb.on_pipeline_complete(true);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback {
            methods_started: AtomicUsize::new(0),
            methods_completed: AtomicUsize::new(0),
            methods_failed: AtomicUsize::new(0),
            normalizations: AtomicUsize::new(0),
        };

        tracker.on_method_start("pdfium-text");
        tracker.on_method_failed("pdfium-text", "no text layer");
        tracker.on_method_start("pdf-extract");
        tracker.on_method_complete("pdf-extract", 0.6, 800);
        tracker.on_normalization_attempt(1, RepairStrategy::None);
        tracker.on_normalization_attempt(2, RepairStrategy::Model);

        assert_eq!(tracker.methods_started.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.methods_completed.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.methods_failed.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.normalizations.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: Arc<dyn PipelineProgressCallback> = Arc::new(NoopProgressCallback);
        cb.on_pipeline_start("doc.pdf", 10);
        cb.on_classified(Branch::Scanned);
        cb.on_pipeline_complete(false);
    }
}
