//! Source documents: the immutable input to one pipeline invocation.
//!
//! A [`SourceDocument`] owns its bytes for the whole run. In-memory bytes
//! are staged to a managed temp file so the pdfium-based stages can open a
//! path; the temp file lives exactly as long as the document and is cleaned
//! up on drop, even on panic.
//!
//! Construction tolerates corrupt or empty input: the page count probe
//! simply reports 0 and the document flows through the pipeline, where it
//! surfaces as `ExtractionFailed` with a full attempt trail — never as a
//! model call on garbage.

use crate::error::PipelineError;
use crate::pipeline::render;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

enum Backing {
    /// The caller's own file; not copied.
    Local(PathBuf),
    /// In-memory bytes staged to a managed temp file.
    Staged(NamedTempFile),
}

/// The immutable input to one pipeline invocation.
pub struct SourceDocument {
    name: String,
    backing: Backing,
    byte_len: usize,
    page_count: usize,
}

impl SourceDocument {
    /// Open a local PDF file.
    ///
    /// Fails only on missing files or permission problems; a file that is
    /// not a parseable PDF is accepted (page count 0) and fails later in
    /// the extraction phase.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let path = path.as_ref().to_path_buf();

        match std::fs::File::open(&path) {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                return Err(PipelineError::PermissionDenied { path });
            }
            Err(_) => {
                return Err(PipelineError::FileNotFound { path });
            }
        }

        let byte_len = std::fs::metadata(&path)
            .map(|m| m.len() as usize)
            .unwrap_or(0);
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document.pdf".to_string());

        let page_count = render::probe_page_count(&path).await;
        debug!("opened '{name}': {byte_len} bytes, {page_count} pages");

        Ok(Self {
            name,
            backing: Backing::Local(path),
            byte_len,
            page_count,
        })
    }

    /// Stage raw PDF bytes from memory (database, network, upload buffer).
    pub async fn from_bytes(
        name: impl Into<String>,
        bytes: &[u8],
    ) -> Result<Self, PipelineError> {
        let mut staged = tempfile::Builder::new()
            .suffix(".pdf")
            .tempfile()
            .map_err(|e| PipelineError::Internal(format!("tempfile: {e}")))?;
        staged
            .write_all(bytes)
            .map_err(|e| PipelineError::Internal(format!("tempfile write: {e}")))?;
        staged
            .flush()
            .map_err(|e| PipelineError::Internal(format!("tempfile flush: {e}")))?;

        let name = name.into();
        let page_count = render::probe_page_count(staged.path()).await;
        debug!("staged '{name}': {} bytes, {page_count} pages", bytes.len());

        Ok(Self {
            name,
            byte_len: bytes.len(),
            backing: Backing::Staged(staged),
            page_count,
        })
    }

    /// Path the pdfium-based stages can open.
    pub fn path(&self) -> &Path {
        match &self.backing {
            Backing::Local(path) => path,
            Backing::Staged(staged) => staged.path(),
        }
    }

    /// Source name, for logs and diagnostics.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn byte_len(&self) -> usize {
        self.byte_len
    }

    /// Pages pdfium could see; 0 for corrupt or unopenable input.
    pub fn page_count(&self) -> usize {
        self.page_count
    }
}

impl std::fmt::Debug for SourceDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceDocument")
            .field("name", &self.name)
            .field("byte_len", &self.byte_len)
            .field("page_count", &self.page_count)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_is_file_not_found() {
        let result = SourceDocument::from_path("/no/such/file.pdf").await;
        assert!(matches!(result, Err(PipelineError::FileNotFound { .. })));
    }

    #[tokio::test]
    async fn corrupt_bytes_are_tolerated_with_zero_pages() {
        let doc = SourceDocument::from_bytes("garbage.pdf", b"this is not a pdf")
            .await
            .unwrap();
        assert_eq!(doc.page_count(), 0);
        assert_eq!(doc.byte_len(), 17);
        assert!(doc.path().exists());
    }

    #[tokio::test]
    async fn staged_file_is_removed_on_drop() {
        let doc = SourceDocument::from_bytes("x.pdf", b"%PDF-1.4 stub")
            .await
            .unwrap();
        let path = doc.path().to_path_buf();
        assert!(path.exists());
        drop(doc);
        assert!(!path.exists());
    }
}
