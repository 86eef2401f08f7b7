//! pdfium access: text layer, rasterisation, and metadata.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async
//! contexts. `tokio::task::spawn_blocking` moves the work onto a dedicated
//! thread pool so the Tokio worker threads never stall on CPU-heavy
//! rendering or parsing.
//!
//! ## Why every function is fallible-per-method
//!
//! A missing pdfium library or a corrupt file must fail the *method* that
//! needed it, not the pipeline: the chain records the failure and moves on.
//! Only [`read_metadata`] (the `inspect` surface) maps a load failure to a
//! terminal [`PipelineError::CorruptPdf`].

use crate::error::{MethodError, PipelineError};
use crate::ocr::PageImage;
use crate::output::DocumentMetadata;
use pdfium_render::prelude::*;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Bind to a pdfium library: `PDFIUM_LIB_PATH` if set, else the system copy.
fn bind_pdfium() -> Result<Pdfium, MethodError> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(dir) if !dir.is_empty() => {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(&dir))
        }
        _ => Pdfium::bind_to_system_library(),
    };
    bindings
        .map(Pdfium::new)
        .map_err(|e| MethodError::EngineUnavailable(format!("pdfium binding failed: {e}")))
}

/// Number of pages, or 0 when the document cannot be opened at all.
///
/// Corrupt input flows through the pipeline (and fails there with a full
/// attempt trail) rather than failing at construction.
pub async fn probe_page_count(path: &Path) -> usize {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let pdfium = match bind_pdfium() {
            Ok(p) => p,
            Err(e) => {
                warn!("page-count probe skipped: {e}");
                return 0;
            }
        };
        let count = match pdfium.load_pdf_from_file(&path, None) {
            Ok(document) => document.pages().len() as usize,
            Err(e) => {
                warn!("page-count probe failed: {e:?}");
                0
            }
        };
        count
    })
    .await
    .unwrap_or(0)
}

/// Per-page text-layer extraction for the first `limit` pages (all pages
/// when `limit` is `None`). The outer `Err` means the document could not be
/// opened; an inner `Err` is a single page that failed.
pub async fn probe_page_texts(
    path: &Path,
    limit: Option<usize>,
) -> Result<Vec<Result<String, String>>, MethodError> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || probe_page_texts_blocking(&path, limit))
        .await
        .map_err(|e| MethodError::Failed(format!("text-layer task panicked: {e}")))?
}

fn probe_page_texts_blocking(
    path: &Path,
    limit: Option<usize>,
) -> Result<Vec<Result<String, String>>, MethodError> {
    let pdfium = bind_pdfium()?;
    let document = pdfium
        .load_pdf_from_file(path, None)
        .map_err(|e| MethodError::Failed(format!("failed to open PDF: {e:?}")))?;

    let pages = document.pages();
    let total = pages.len() as usize;
    let take = limit.unwrap_or(total).min(total);

    let mut out = Vec::with_capacity(take);
    for idx in 0..take {
        let text = pages
            .get(idx as u16)
            .map_err(|e| format!("{e:?}"))
            .and_then(|page| {
                page.text()
                    .map(|t| t.all())
                    .map_err(|e| format!("{e:?}"))
            });
        out.push(text);
    }
    Ok(out)
}

/// Rasterise every page to a PNG [`PageImage`], in page-index order.
///
/// One shared render pass per chain: both OCR methods consume the same
/// images, so rendering happens once.
pub async fn render_page_images(path: &Path, dpi: u32) -> Result<Vec<PageImage>, MethodError> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || render_page_images_blocking(&path, dpi))
        .await
        .map_err(|e| MethodError::RenderFailed(format!("render task panicked: {e}")))?
}

fn render_page_images_blocking(path: &Path, dpi: u32) -> Result<Vec<PageImage>, MethodError> {
    let pdfium = bind_pdfium()?;
    let document = pdfium
        .load_pdf_from_file(path, None)
        .map_err(|e| MethodError::RenderFailed(format!("failed to open PDF: {e:?}")))?;

    // 612 pt is US-Letter width; the target pixel width scales with DPI and
    // the height cap keeps tall pages bounded.
    let target_width = (612.0 * dpi as f32 / 72.0) as i32;
    let render_config = PdfRenderConfig::new()
        .set_target_width(target_width)
        .set_maximum_height(target_width * 2);

    let pages = document.pages();
    let mut images = Vec::with_capacity(pages.len() as usize);

    for (idx, page) in pages.iter().enumerate() {
        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| MethodError::RenderFailed(format!("page {}: {e:?}", idx + 1)))?;
        let image = bitmap.as_image();

        let mut png = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .map_err(|e| MethodError::RenderFailed(format!("page {}: PNG encode: {e}", idx + 1)))?;

        debug!(
            "rendered page {} → {}x{} px, {} bytes PNG",
            idx + 1,
            image.width(),
            image.height(),
            png.len()
        );
        images.push(PageImage { index: idx, png });
    }

    Ok(images)
}

/// Read document metadata without touching page content.
pub async fn read_metadata(path: &Path) -> Result<DocumentMetadata, PipelineError> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || read_metadata_blocking(&path))
        .await
        .map_err(|e| PipelineError::Internal(format!("metadata task panicked: {e}")))?
}

fn read_metadata_blocking(path: &PathBuf) -> Result<DocumentMetadata, PipelineError> {
    let pdfium = bind_pdfium().map_err(|e| PipelineError::CorruptPdf {
        path: path.clone(),
        detail: e.to_string(),
    })?;
    let document = pdfium
        .load_pdf_from_file(path, None)
        .map_err(|e| PipelineError::CorruptPdf {
            path: path.clone(),
            detail: format!("{e:?}"),
        })?;

    let metadata = document.metadata();
    let pages = document.pages();

    let get_meta = |tag: PdfDocumentMetadataTagType| -> Option<String> {
        metadata.get(tag).and_then(|t| {
            let v = t.value().to_string();
            if v.is_empty() {
                None
            } else {
                Some(v)
            }
        })
    };

    Ok(DocumentMetadata {
        title: get_meta(PdfDocumentMetadataTagType::Title),
        author: get_meta(PdfDocumentMetadataTagType::Author),
        subject: get_meta(PdfDocumentMetadataTagType::Subject),
        creator: get_meta(PdfDocumentMetadataTagType::Creator),
        producer: get_meta(PdfDocumentMetadataTagType::Producer),
        page_count: pages.len() as usize,
        pdf_version: format!("{:?}", document.version()),
    })
}
