//! Quality scoring: the shared measure that gates every extraction candidate.
//!
//! Every method in every chain is scored by the same function so candidates
//! from different methods (and different chains) are directly comparable.
//! The score is a heuristic in `[0, 1]` built from three observations:
//!
//! * **Length** — a dozen characters is not a usable document; the factor
//!   saturates so long documents are not unboundedly favoured.
//! * **Printable ratio** — binary garbage decoded as text (a classic
//!   text-layer false positive) is full of control and replacement
//!   characters.
//! * **Structure** — real text has word boundaries; a single unbroken blob
//!   usually means decode failure.
//!
//! OCR candidates additionally pass a noise gate: output dominated by
//! single-character "words" is recognition noise, not text, and is
//! penalized below any sensible acceptance threshold.

/// Character count at which the length factor saturates.
const LENGTH_SATURATION_CHARS: f64 = 400.0;

/// Penalty factor applied when the noise gate trips.
const NOISE_PENALTY: f64 = 0.25;

/// Score extracted text in `[0, 1]`. Empty or whitespace-only input is 0.
pub fn quality_score(text: &str) -> f64 {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return 0.0;
    }

    let total = trimmed.chars().count();
    let printable = trimmed
        .chars()
        .filter(|c| (!c.is_control() || c.is_whitespace()) && *c != '\u{FFFD}')
        .count();
    let printable_ratio = printable as f64 / total as f64;

    let length_factor = (total as f64 / LENGTH_SATURATION_CHARS).min(1.0);

    let words = trimmed.split_whitespace().count();
    let structure_factor = if words > 1 { 1.0 } else { 0.25 };

    0.4 * length_factor + 0.4 * printable_ratio + 0.2 * structure_factor
}

/// Fraction of whitespace-separated words that are a single character.
pub fn single_char_word_ratio(text: &str) -> f64 {
    let mut words = 0usize;
    let mut single = 0usize;
    for word in text.split_whitespace() {
        words += 1;
        if word.chars().count() == 1 {
            single += 1;
        }
    }
    if words == 0 {
        return 0.0;
    }
    single as f64 / words as f64
}

/// Apply the OCR noise gate: when single-character words dominate beyond
/// `max_ratio`, the score is cut below acceptance rather than zeroed, so a
/// noisy candidate can still win if literally everything else failed.
pub fn apply_noise_gate(score: f64, text: &str, max_ratio: f64) -> f64 {
    if single_char_word_ratio(text) > max_ratio {
        score * NOISE_PENALTY
    } else {
        score
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_scores_zero() {
        assert_eq!(quality_score(""), 0.0);
        assert_eq!(quality_score("   \n\t "), 0.0);
    }

    #[test]
    fn plain_paragraph_clears_default_threshold() {
        let text = "Invoice 2024-117\nVendor: OfficeMart Ltd\n\
                    Item: wooden stirrers, box of 500, amount 12.50\n\
                    Item: laptop stand, amount 45.00\nTotal: 57.50";
        assert!(quality_score(text) > 0.35, "got {}", quality_score(text));
    }

    #[test]
    fn replacement_char_garbage_scores_low() {
        let garbage: String = std::iter::repeat('\u{FFFD}').take(500).collect();
        let clean = "a reasonable sentence with several words ".repeat(12);
        assert!(quality_score(&garbage) < quality_score(&clean));
        assert!(quality_score(&garbage) < 0.35);
    }

    #[test]
    fn single_blob_scores_below_worded_text() {
        let blob = "x".repeat(500);
        let worded = "x ".repeat(250);
        assert!(quality_score(&blob) < quality_score(&worded));
    }

    #[test]
    fn longer_text_scores_at_least_as_high() {
        let short = "short text here";
        let long = "short text here ".repeat(40);
        assert!(quality_score(&long) >= quality_score(short));
    }

    #[test]
    fn single_char_ratio_counts_words() {
        assert_eq!(single_char_word_ratio("a b c d"), 1.0);
        assert_eq!(single_char_word_ratio("ab cd"), 0.0);
        assert_eq!(single_char_word_ratio("a bc"), 0.5);
        assert_eq!(single_char_word_ratio(""), 0.0);
    }

    #[test]
    fn noise_gate_rejects_single_char_dominated_output() {
        let noise = "l i | ; t . , ' - o ".repeat(60);
        let gated = apply_noise_gate(quality_score(&noise), &noise, 0.4);
        assert!(gated < 0.35, "got {gated}");
    }

    #[test]
    fn noise_gate_passes_normal_text_through() {
        let text = "a normal sentence with regular word lengths throughout";
        let score = quality_score(text);
        assert_eq!(apply_noise_gate(score, text, 0.4), score);
    }
}
