//! OCR capability: a two-operation trait plus the default Tesseract engine.
//!
//! The pipeline consumes `layout_ocr(pages) → assembled text` (structured,
//! reading-order output) and `text_ocr(page) → text` (plain per-page
//! recognition). Both take pre-rendered PNG pages so implementations never
//! touch the PDF itself, and tests can feed synthetic pages.
//!
//! The default engine shells out to the `tesseract` binary: plain mode for
//! `text_ocr`, TSV mode for `layout_ocr` (words regrouped by block /
//! paragraph / line, which recovers reading order on region-heavy pages).
//! A missing binary is an availability failure of the engine, not of the
//! pipeline — the extraction chain records it and moves on.

use crate::error::OcrError;
use async_trait::async_trait;
use std::io::Write;
use std::process::Command;
use tracing::debug;

/// One rendered page, PNG-encoded, tagged with its 0-based index.
#[derive(Debug, Clone)]
pub struct PageImage {
    pub index: usize,
    pub png: Vec<u8>,
}

/// The OCR capability consumed by the scanned-branch extraction chain.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Structured layout OCR over all pages: regions and tables assembled in
    /// reading order, pages joined with page markers by the caller's rules.
    async fn layout_ocr(&self, pages: &[PageImage]) -> Result<String, OcrError>;

    /// Plain text OCR over a single page.
    async fn text_ocr(&self, page: &PageImage) -> Result<String, OcrError>;

    /// Whether the engine can run on this host.
    fn is_available(&self) -> bool;

    /// Actionable message when the engine is unavailable.
    fn availability_hint(&self) -> String;
}

/// Tesseract subprocess engine.
pub struct TesseractEngine {
    language: String,
}

impl TesseractEngine {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
        }
    }

    /// Run tesseract over PNG bytes with the given extra args, via a scratch
    /// file (tesseract reads images from disk).
    fn run_blocking(language: &str, png: &[u8], extra_args: &[&str]) -> Result<String, OcrError> {
        let mut scratch = tempfile::Builder::new().suffix(".png").tempfile()?;
        scratch.write_all(png)?;
        scratch.flush()?;

        let output = Command::new("tesseract")
            .arg(scratch.path())
            .arg("stdout")
            .args(["-l", language])
            .args(extra_args)
            .output();

        match output {
            Ok(output) if output.status.success() => {
                Ok(String::from_utf8_lossy(&output.stdout).to_string())
            }
            Ok(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                Err(OcrError::RecognitionFailed(format!(
                    "tesseract exited with {}: {}",
                    output.status, stderr
                )))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(OcrError::EngineUnavailable(
                "tesseract not found (install tesseract-ocr)".to_string(),
            )),
            Err(e) => Err(OcrError::Io(e)),
        }
    }
}

impl Default for TesseractEngine {
    fn default() -> Self {
        Self::new("eng")
    }
}

#[async_trait]
impl OcrEngine for TesseractEngine {
    async fn layout_ocr(&self, pages: &[PageImage]) -> Result<String, OcrError> {
        let mut assembled: Vec<(usize, String)> = Vec::with_capacity(pages.len());
        for page in pages {
            let language = self.language.clone();
            let png = page.png.clone();
            let tsv = tokio::task::spawn_blocking(move || {
                Self::run_blocking(&language, &png, &["tsv"])
            })
            .await
            .map_err(|e| OcrError::RecognitionFailed(format!("layout OCR task failed: {e}")))??;
            let text = assemble_tsv(&tsv);
            debug!("layout OCR page {}: {} chars", page.index + 1, text.len());
            assembled.push((page.index, text));
        }
        Ok(crate::pipeline::join_pages(assembled))
    }

    async fn text_ocr(&self, page: &PageImage) -> Result<String, OcrError> {
        let language = self.language.clone();
        let png = page.png.clone();
        tokio::task::spawn_blocking(move || Self::run_blocking(&language, &png, &[]))
            .await
            .map_err(|e| OcrError::RecognitionFailed(format!("text OCR task failed: {e}")))?
    }

    fn is_available(&self) -> bool {
        Command::new("tesseract")
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn availability_hint(&self) -> String {
        if self.is_available() {
            "Tesseract is available".to_string()
        } else {
            "Tesseract not installed. Install with: apt install tesseract-ocr".to_string()
        }
    }
}

/// Reassemble tesseract TSV output into reading-order text.
///
/// TSV rows carry (level, page, block, par, line, word, …, conf, text);
/// level 5 rows are words. Words are joined with spaces within a line,
/// lines with newlines, and a blank line separates blocks — which keeps
/// table regions and columns visually grouped.
fn assemble_tsv(tsv: &str) -> String {
    let mut out = String::new();
    let mut current_line: Option<(u32, u32, u32)> = None;
    let mut current_block: Option<u32> = None;

    for row in tsv.lines().skip(1) {
        let cols: Vec<&str> = row.split('\t').collect();
        if cols.len() < 12 || cols[0] != "5" {
            continue;
        }
        let word = cols[11].trim();
        if word.is_empty() {
            continue;
        }
        let block: u32 = cols[2].parse().unwrap_or(0);
        let par: u32 = cols[3].parse().unwrap_or(0);
        let line: u32 = cols[4].parse().unwrap_or(0);
        let key = (block, par, line);

        match current_line {
            Some(prev) if prev == key => out.push(' '),
            Some(_) => {
                if current_block != Some(block) {
                    out.push('\n');
                }
                out.push('\n');
            }
            None => {}
        }
        current_line = Some(key);
        current_block = Some(block);
        out.push_str(word);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const TSV_HEADER: &str =
        "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext";

    fn word_row(block: u32, par: u32, line: u32, word: u32, text: &str) -> String {
        format!("5\t1\t{block}\t{par}\t{line}\t{word}\t0\t0\t10\t10\t96\t{text}")
    }

    #[test]
    fn assemble_tsv_joins_words_in_a_line() {
        let tsv = format!(
            "{TSV_HEADER}\n{}\n{}",
            word_row(1, 1, 1, 1, "Invoice"),
            word_row(1, 1, 1, 2, "Total")
        );
        assert_eq!(assemble_tsv(&tsv), "Invoice Total");
    }

    #[test]
    fn assemble_tsv_breaks_lines_and_blocks() {
        let tsv = format!(
            "{TSV_HEADER}\n{}\n{}\n{}",
            word_row(1, 1, 1, 1, "Header"),
            word_row(1, 1, 2, 1, "Row"),
            word_row(2, 1, 1, 1, "Footer")
        );
        assert_eq!(assemble_tsv(&tsv), "Header\nRow\n\nFooter");
    }

    #[test]
    fn assemble_tsv_ignores_non_word_rows_and_empty_words() {
        let tsv = format!(
            "{TSV_HEADER}\n4\t1\t1\t1\t1\t0\t0\t0\t10\t10\t-1\t\n{}\n5\t1\t1\t1\t1\t2\t0\t0\t10\t10\t-1\t \n",
            word_row(1, 1, 1, 1, "only")
        );
        assert_eq!(assemble_tsv(&tsv), "only");
    }
}
