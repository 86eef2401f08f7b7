//! Schema normalizer: the bounded request/validate/repair state machine.
//!
//! ```text
//! Requesting ──▶ Validating ──▶ Valid
//!                   │   ▲
//!                   ▼   │
//!                Repairing ──▶ Failed (budget exhausted)
//! ```
//!
//! The machine is an explicit state enum driven by a loop with a bounded
//! counter — never recursive retry — so the maximum cost and termination
//! are obvious and unit-testable with a stubbed model. Each model call
//! after the first consumes one unit of `max_repair_attempts`; transient
//! call failures consume budget like any other failed attempt, with
//! exponential backoff before the next transport retry. Deterministic
//! local repairs (fences, prose, commas, brackets) run inside Validating
//! and never consume budget.

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::model::{CompletionRequest, TextModel};
use crate::output::{
    truncate_at_char_boundary, AttemptOutcome, NormalizationAttempt, RepairStrategy,
    SchemaViolation,
};
use crate::pipeline::repair;
use crate::prompts;
use serde_json::Value;
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

/// Characters of raw model output kept in each attempt's preview.
const PREVIEW_CHARS: usize = 200;

enum State {
    /// Build the extraction prompt and make the initial model call.
    Requesting,
    /// Parse and validate one raw output.
    Validating {
        raw: String,
        strategy: RepairStrategy,
    },
    /// Ask the model to correct specific violations.
    Repairing {
        raw: String,
        violations: Vec<SchemaViolation>,
    },
}

/// Drive extracted text to a schema-valid JSON value.
///
/// Returns the validated value and the full attempt trail; on exhaustion,
/// the trail travels inside [`PipelineError::NormalizationFailed`].
pub async fn normalize(
    text: &str,
    config: &PipelineConfig,
    model: &Arc<dyn TextModel>,
) -> Result<(Value, Vec<NormalizationAttempt>), PipelineError> {
    let contract: &crate::schema::SchemaContract = &config.contract;
    let mut attempts: Vec<NormalizationAttempt> = Vec::new();
    let mut repairs_used: u32 = 0;
    let mut state = State::Requesting;

    loop {
        state = match state {
            State::Requesting => {
                let request = CompletionRequest {
                    system: prompts::extraction_prompt(contract),
                    user: text.to_string(),
                    temperature: config.temperature,
                    max_tokens: config.max_tokens,
                };
                match model.complete(request).await {
                    Ok(raw) => State::Validating {
                        raw,
                        strategy: RepairStrategy::None,
                    },
                    Err(e) => {
                        warn!("initial completion failed: {e}");
                        record_call_failure(&mut attempts, RepairStrategy::None, &e.to_string());
                        if repairs_used >= config.max_repair_attempts {
                            return Err(failed(attempts, e.to_string()));
                        }
                        repairs_used += 1;
                        sleep(backoff(config, repairs_used)).await;
                        State::Requesting
                    }
                }
            }

            State::Validating { raw, strategy } => {
                if let Some(ref cb) = config.progress_callback {
                    cb.on_normalization_attempt(attempts.len() + 1, strategy);
                }
                let (parsed, local_repair_applied) = parse_with_local_repairs(&raw);
                match parsed {
                    Ok(value) => {
                        let violations = contract.validate(&value);
                        if violations.is_empty() {
                            info!(
                                "normalization valid after {} attempt(s), {} repair(s)",
                                attempts.len() + 1,
                                repairs_used
                            );
                            attempts.push(NormalizationAttempt {
                                ordinal: attempts.len() + 1,
                                strategy,
                                local_repair_applied,
                                output_preview: preview(&raw),
                                outcome: AttemptOutcome::Valid,
                            });
                            return Ok((value, attempts));
                        }
                        debug!("{} schema violation(s)", violations.len());
                        attempts.push(NormalizationAttempt {
                            ordinal: attempts.len() + 1,
                            strategy,
                            local_repair_applied,
                            output_preview: preview(&raw),
                            outcome: AttemptOutcome::SchemaViolations {
                                violations: violations.clone(),
                            },
                        });
                        if repairs_used >= config.max_repair_attempts {
                            return Err(failed(
                                attempts,
                                format!("{} schema violation(s) remained", violations.len()),
                            ));
                        }
                        repairs_used += 1;
                        State::Repairing { raw, violations }
                    }
                    Err(parse_error) => {
                        attempts.push(NormalizationAttempt {
                            ordinal: attempts.len() + 1,
                            strategy,
                            local_repair_applied,
                            output_preview: preview(&raw),
                            outcome: AttemptOutcome::ParseFailed {
                                detail: parse_error.clone(),
                            },
                        });
                        if repairs_used >= config.max_repair_attempts {
                            return Err(failed(
                                attempts,
                                format!("output was not parseable JSON: {parse_error}"),
                            ));
                        }
                        repairs_used += 1;
                        let violations = vec![SchemaViolation {
                            instance_path: String::new(),
                            message: format!("output is not parseable JSON: {parse_error}"),
                        }];
                        State::Repairing { raw, violations }
                    }
                }
            }

            State::Repairing { raw, violations } => {
                let request = CompletionRequest {
                    system: prompts::repair_prompt(contract, &raw, &violations),
                    user: text.to_string(),
                    temperature: config.temperature,
                    max_tokens: config.max_tokens,
                };
                match model.complete(request).await {
                    Ok(new_raw) => State::Validating {
                        raw: new_raw,
                        strategy: RepairStrategy::Model,
                    },
                    Err(e) => {
                        warn!("repair completion failed: {e}");
                        record_call_failure(&mut attempts, RepairStrategy::Model, &e.to_string());
                        if repairs_used >= config.max_repair_attempts {
                            return Err(failed(attempts, e.to_string()));
                        }
                        repairs_used += 1;
                        sleep(backoff(config, repairs_used)).await;
                        State::Repairing { raw, violations }
                    }
                }
            }
        };
    }
}

/// Strict parse first; on failure apply the deterministic local repairs and
/// re-parse. The bool reports whether local repairs were what made the
/// output parse.
fn parse_with_local_repairs(raw: &str) -> (Result<Value, String>, bool) {
    match serde_json::from_str::<Value>(raw) {
        Ok(value) => (Ok(value), false),
        Err(first_error) => {
            let repaired = repair::apply_local_repairs(raw);
            match serde_json::from_str::<Value>(&repaired) {
                Ok(value) => {
                    debug!("local repairs recovered parseable JSON");
                    (Ok(value), true)
                }
                Err(_) => (Err(first_error.to_string()), false),
            }
        }
    }
}

fn record_call_failure(
    attempts: &mut Vec<NormalizationAttempt>,
    strategy: RepairStrategy,
    detail: &str,
) {
    attempts.push(NormalizationAttempt {
        ordinal: attempts.len() + 1,
        strategy,
        local_repair_applied: false,
        output_preview: String::new(),
        outcome: AttemptOutcome::CallFailed {
            detail: detail.to_string(),
        },
    });
}

fn failed(attempts: Vec<NormalizationAttempt>, detail: String) -> PipelineError {
    PipelineError::NormalizationFailed { attempts, detail }
}

/// Exponential backoff: `retry_backoff_ms · 2^(n−1)`.
fn backoff(config: &PipelineConfig, attempt: u32) -> Duration {
    Duration::from_millis(config.retry_backoff_ms * 2u64.pow(attempt.saturating_sub(1)))
}

fn preview(raw: &str) -> String {
    truncate_at_char_boundary(raw, PREVIEW_CHARS).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_per_attempt() {
        let config = PipelineConfig::builder().retry_backoff_ms(500).build().unwrap();
        assert_eq!(backoff(&config, 1), Duration::from_millis(500));
        assert_eq!(backoff(&config, 2), Duration::from_millis(1000));
        assert_eq!(backoff(&config, 3), Duration::from_millis(2000));
    }

    #[test]
    fn parse_prefers_strict_over_repaired() {
        let (result, repaired) = parse_with_local_repairs("{\"a\": 1}");
        assert!(result.is_ok());
        assert!(!repaired);
    }

    #[test]
    fn parse_falls_back_to_local_repairs() {
        let (result, repaired) = parse_with_local_repairs("```json\n{\"a\": 1,}\n```");
        assert_eq!(result.unwrap()["a"], 1);
        assert!(repaired);
    }

    #[test]
    fn parse_reports_original_error_when_unrepairable() {
        let (result, repaired) = parse_with_local_repairs("no json whatsoever");
        assert!(result.is_err());
        assert!(!repaired);
    }
}
