//! System prompts for the normalization model calls.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth** — changing the output rules (e.g. banning
//!    a new failure mode, tweaking category guidance) means editing exactly
//!    one place.
//!
//! 2. **Testability** — unit tests can build and inspect prompts directly
//!    without a live model, so prompt regressions are easy to catch.
//!
//! Both prompts embed the contract's prose description rather than the raw
//! schema: prose costs fewer tokens and models follow rules better than
//! they parse draft-07 keywords.

use crate::output::SchemaViolation;
use crate::schema::SchemaContract;
use std::fmt::Write;

const OUTPUT_RULES: &str = r#"Follow these rules precisely:

1. OUTPUT FORMAT
   - Output ONLY a single JSON value
   - Do NOT wrap it in ```json fences
   - Do NOT add commentary, explanations, or prose before or after
   - Do NOT leave trailing commas
   - Start directly with { or [

2. CONTENT
   - Extract values only from the provided document text; never invent data
   - Preserve amounts exactly as written, as JSON numbers
   - Use null for fields the document does not state
   - Assign each item the single best-fitting category; use
     "Miscellaneous" only when nothing else fits

3. CONSISTENCY
   - Every category appearing in "items" must also appear in
     "category_totals", and the totals must sum the item amounts"#;

/// Build the system prompt for the initial extraction call.
pub fn extraction_prompt(contract: &SchemaContract) -> String {
    format!(
        "You are an expert document-data extractor. The user message contains \
         the text of a document, possibly with `=== Page N ===` markers. \
         Convert it into a JSON value with this exact shape:\n\n{}\n\n{}",
        contract.description(),
        OUTPUT_RULES
    )
}

/// Build the system prompt for a repair call.
///
/// The invalid output and each violation (with its JSON path) are quoted so
/// the model corrects the specific defects instead of re-extracting from
/// scratch and possibly introducing new ones.
pub fn repair_prompt(
    contract: &SchemaContract,
    invalid_output: &str,
    violations: &[SchemaViolation],
) -> String {
    let mut prompt = format!(
        "Your previous JSON output did not satisfy the required shape:\n\n{}\n\n\
         Previous output:\n\"\"\"\n{}\n\"\"\"\n\nProblems found:\n",
        contract.description(),
        invalid_output
    );
    for violation in violations {
        let path = if violation.instance_path.is_empty() {
            "(root)"
        } else {
            &violation.instance_path
        };
        let _ = writeln!(prompt, "- at {}: {}", path, violation.message);
    }
    let _ = write!(
        prompt,
        "\nProduce a corrected JSON value that fixes every problem while \
         keeping all correct data unchanged. The user message repeats the \
         source document text for reference.\n\n{}",
        OUTPUT_RULES
    );
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extraction_prompt_embeds_contract_description() {
        let contract = SchemaContract::expense_report();
        let prompt = extraction_prompt(&contract);
        assert!(prompt.contains("category_totals"));
        assert!(prompt.contains("Do NOT wrap it in"));
    }

    #[test]
    fn repair_prompt_quotes_output_and_violations() {
        let contract = SchemaContract::expense_report();
        let violations = vec![SchemaViolation {
            instance_path: "/items/0/category".to_string(),
            message: "\"Snacks\" is not one of the allowed values".to_string(),
        }];
        let prompt = repair_prompt(&contract, "{\"items\": []}", &violations);
        assert!(prompt.contains("{\"items\": []}"));
        assert!(prompt.contains("- at /items/0/category:"));
        assert!(prompt.contains("Snacks"));
    }

    #[test]
    fn repair_prompt_labels_root_path() {
        let contract = SchemaContract::expense_report();
        let violations = vec![SchemaViolation {
            instance_path: String::new(),
            message: "output is not parseable JSON".to_string(),
        }];
        let prompt = repair_prompt(&contract, "not json", &violations);
        assert!(prompt.contains("- at (root):"));
    }
}
