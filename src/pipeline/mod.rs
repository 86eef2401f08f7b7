//! Pipeline stages for PDF-to-record extraction.
//!
//! Each submodule implements exactly one stage. Keeping stages separate
//! makes each independently testable and lets a strategy chain be edited
//! as a list rather than as nested branching.
//!
//! ## Data Flow
//!
//! ```text
//! classify ──▶ extract ──▶ normalize
//! (text probe)  (method chains    (model request + bounded
//!                + scoring)        validate/repair loop)
//! ```
//!
//! 1. [`classify`] — digital vs. scanned verdict from a sampled text-layer probe
//! 2. [`render`]   — pdfium access: text layer, rasterisation, metadata;
//!    runs in `spawn_blocking` because pdfium is not async-safe
//! 3. [`score`]    — the shared quality measure gating every candidate
//! 4. [`extract`]  — drives the method chains and selects the best candidate
//! 5. [`repair`]   — deterministic local JSON repairs (fences, commas, braces)
//! 6. [`normalize`]— the bounded request/validate/repair state machine

pub mod classify;
pub mod extract;
pub mod normalize;
pub mod render;
pub mod repair;
pub mod score;

/// The page marker inserted between pages of concatenated output.
/// `page_index` is 0-based; markers are 1-based for human readers.
pub fn page_marker(page_index: usize) -> String {
    format!("=== Page {} ===", page_index + 1)
}

/// Join per-page texts in ascending page order, each prefixed with its
/// page marker. Accepts pages in any completion order; blank pages are
/// dropped. Ascending order here is a correctness invariant — the model
/// reads the markers as document order.
pub fn join_pages(mut pages: Vec<(usize, String)>) -> String {
    pages.sort_by_key(|(idx, _)| *idx);
    let mut parts: Vec<String> = Vec::with_capacity(pages.len() * 2);
    for (idx, text) in pages {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            continue;
        }
        parts.push(page_marker(idx));
        parts.push(trimmed.to_string());
    }
    parts.join("\n")
}

/// Per-line cleanup applied to every extraction candidate: trim each line,
/// collapse inner runs of whitespace, drop blank lines.
pub fn clean_text(text: &str) -> String {
    text.lines()
        .filter_map(|line| {
            let stripped = line.trim();
            if stripped.is_empty() {
                None
            } else {
                Some(stripped.split_whitespace().collect::<Vec<_>>().join(" "))
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_text_trims_collapses_and_drops_blanks() {
        let input = "  hello   world  \n\n\t\n  a\tb  ";
        assert_eq!(clean_text(input), "hello world\na b");
    }

    #[test]
    fn clean_text_empty_input() {
        assert_eq!(clean_text(""), "");
        assert_eq!(clean_text("   \n  \n"), "");
    }

    #[test]
    fn join_pages_restores_page_order() {
        let pages = vec![
            (2, "third".to_string()),
            (0, "first".to_string()),
            (1, "second".to_string()),
        ];
        let joined = join_pages(pages);
        assert_eq!(
            joined,
            "=== Page 1 ===\nfirst\n=== Page 2 ===\nsecond\n=== Page 3 ===\nthird"
        );
    }

    #[test]
    fn join_pages_drops_blank_pages() {
        let pages = vec![(0, "text".to_string()), (1, "   ".to_string())];
        let joined = join_pages(pages);
        assert_eq!(joined, "=== Page 1 ===\ntext");
    }

    #[test]
    fn page_markers_appear_in_strictly_increasing_order() {
        let pages: Vec<(usize, String)> = (0..6).rev().map(|i| (i, format!("p{i}"))).collect();
        let joined = join_pages(pages);
        let positions: Vec<usize> = (0..6)
            .map(|i| joined.find(&page_marker(i)).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }
}
