//! Schema contracts: the JSON shape that normalized output must satisfy.
//!
//! A [`SchemaContract`] bundles a draft-07 JSON Schema, its compiled
//! validator, and a prompt-facing description of the required shape. The
//! contract is static configuration: compiled once, shared read-only across
//! every pipeline invocation via `Arc`. The core never computes a contract —
//! it only enforces one.

use crate::error::PipelineError;
use crate::output::SchemaViolation;
use once_cell::sync::Lazy;
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;

/// A compiled schema contract.
pub struct SchemaContract {
    name: String,
    schema: Value,
    description: String,
    validator: jsonschema::Validator,
}

impl SchemaContract {
    /// Compile a contract from a draft-07 schema value.
    ///
    /// `description` is the prose rendition of the shape that goes into the
    /// extraction prompt; keep it short and rule-like.
    pub fn new(
        name: impl Into<String>,
        schema: Value,
        description: impl Into<String>,
    ) -> Result<Self, PipelineError> {
        let validator = jsonschema::validator_for(&schema)
            .map_err(|e| PipelineError::InvalidConfig(format!("schema did not compile: {e}")))?;
        Ok(Self {
            name: name.into(),
            schema,
            description: description.into(),
            validator,
        })
    }

    /// Contract name, used in logs and in the final record.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The raw schema value.
    pub fn schema(&self) -> &Value {
        &self.schema
    }

    /// Prompt-facing description of the required shape.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Validate an instance, collecting every violation with its path.
    ///
    /// An empty vector means the instance satisfies the contract.
    pub fn validate(&self, instance: &Value) -> Vec<SchemaViolation> {
        self.validator
            .iter_errors(instance)
            .map(|e| SchemaViolation {
                instance_path: e.instance_path.to_string(),
                message: e.to_string(),
            })
            .collect()
    }

    /// The built-in expense-report contract.
    ///
    /// Line items with vendor/amount/category plus aggregated totals per
    /// category. This is the default when no contract is injected.
    pub fn expense_report() -> Arc<SchemaContract> {
        static CONTRACT: Lazy<Arc<SchemaContract>> = Lazy::new(|| {
            Arc::new(
                SchemaContract::new(
                    "expense-report",
                    expense_report_schema(),
                    EXPENSE_REPORT_DESCRIPTION,
                )
                .unwrap(),
            )
        });
        Arc::clone(&CONTRACT)
    }
}

impl fmt::Debug for SchemaContract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaContract")
            .field("name", &self.name)
            .field("validator", &"<compiled>")
            .finish()
    }
}

/// Expense categories the model may assign. "Miscellaneous" is the catch-all.
pub const EXPENSE_CATEGORIES: [&str; 9] = [
    "Stationary",
    "Travel",
    "Accommodation",
    "Electronics",
    "Entertainment",
    "Pantry expenses",
    "Utilities",
    "Tech invoices",
    "Miscellaneous",
];

const EXPENSE_REPORT_DESCRIPTION: &str = "\
A JSON object with:
- \"items\": array of expense line items. Each item is an object with
  \"item\" (string), \"description\" (string or null), \"vendor\" (string or null),
  \"amount\" (number), and \"category\" (one of: \"Stationary\", \"Travel\",
  \"Accommodation\", \"Electronics\", \"Entertainment\", \"Pantry expenses\",
  \"Utilities\", \"Tech invoices\", \"Miscellaneous\").
- \"category_totals\": object mapping each category that occurs in \"items\"
  to the aggregated total amount (number).
- \"sections\": object of any other logical sections found in the document;
  use null or empty values for sections that are not present.";

fn expense_report_schema() -> Value {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "type": "object",
        "required": ["items", "category_totals"],
        "properties": {
            "items": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["item", "amount", "category"],
                    "properties": {
                        "item": { "type": "string" },
                        "description": { "type": ["string", "null"] },
                        "vendor": { "type": ["string", "null"] },
                        "amount": { "type": "number" },
                        "category": { "enum": EXPENSE_CATEGORIES }
                    }
                }
            },
            "category_totals": {
                "type": "object",
                "additionalProperties": { "type": "number" }
            },
            "sections": {
                "type": ["object", "null"]
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_instance() -> Value {
        json!({
            "items": [
                {
                    "item": "Wooden stirrers",
                    "description": "box of 500",
                    "vendor": "OfficeMart",
                    "amount": 12.5,
                    "category": "Pantry expenses"
                }
            ],
            "category_totals": { "Pantry expenses": 12.5 }
        })
    }

    #[test]
    fn expense_contract_accepts_valid_instance() {
        let contract = SchemaContract::expense_report();
        assert!(contract.validate(&valid_instance()).is_empty());
    }

    #[test]
    fn missing_required_field_is_reported() {
        let contract = SchemaContract::expense_report();
        let violations = contract.validate(&json!({ "items": [] }));
        assert_eq!(violations.len(), 1);
        assert!(violations[0].message.contains("category_totals"));
    }

    #[test]
    fn illegal_category_is_reported_with_path() {
        let contract = SchemaContract::expense_report();
        let mut instance = valid_instance();
        instance["items"][0]["category"] = json!("Snacks");
        let violations = contract.validate(&instance);
        assert!(!violations.is_empty());
        assert!(violations
            .iter()
            .any(|v| v.instance_path.contains("/items/0/category")));
    }

    #[test]
    fn wrong_type_is_reported() {
        let contract = SchemaContract::expense_report();
        let mut instance = valid_instance();
        instance["items"][0]["amount"] = json!("12.50");
        let violations = contract.validate(&instance);
        assert!(violations.iter().any(|v| v.message.contains("number")));
    }

    #[test]
    fn bad_schema_fails_to_compile() {
        let result = SchemaContract::new("bad", json!({ "type": 42 }), "");
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn debug_redacts_validator() {
        let contract = SchemaContract::expense_report();
        let dbg = format!("{:?}", contract);
        assert!(dbg.contains("expense-report"));
        assert!(dbg.contains("<compiled>"));
    }
}
