//! Per-sample classification.
//!
//! Checks run in a fixed order and the first one that applies wins, so each
//! failure is attributed to the earliest stage that produced it.

use crate::types::{EvaluationOutcome, GenerationSample};
use crate::validator::{Draft202012, SchemaValidator};
use serde_json::Value;
use std::panic::{self, AssertUnwindSafe};
use tracing::warn;

/// Classify a sample with the default Draft 2020-12 validator.
pub fn classify(sample: &GenerationSample) -> EvaluationOutcome {
    classify_with(sample, &Draft202012)
}

/// Classify a sample with an explicit validator.
///
/// Never panics: a panic raised while classifying is reported as
/// [`EvaluationOutcome::UnknownError`].
pub fn classify_with(
    sample: &GenerationSample,
    validator: &dyn SchemaValidator,
) -> EvaluationOutcome {
    panic::catch_unwind(AssertUnwindSafe(|| classify_checked(sample, validator))).unwrap_or_else(
        |_| {
            warn!(task = %sample.task, id = ?sample.id, "classification panicked");
            EvaluationOutcome::UnknownError
        },
    )
}

fn classify_checked(
    sample: &GenerationSample,
    validator: &dyn SchemaValidator,
) -> EvaluationOutcome {
    let Some(schema) = sample.schema.as_ref() else {
        return EvaluationOutcome::SchemaMissing;
    };

    let output = match sample.output.as_deref() {
        Some(output) if !output.is_empty() => output,
        _ => return EvaluationOutcome::EmptyOutput,
    };

    // serde_json also enforces its recursion limit here.
    let Ok(instance) = serde_json::from_str::<Value>(output) else {
        return EvaluationOutcome::SyntaxError;
    };

    if !validator.validate_instance(&instance, schema) {
        return EvaluationOutcome::SemanticError;
    }

    EvaluationOutcome::Match
}
