//! Tests for the metrics module.

use schemabench_core::metrics::{aggregate, aggregate_by_task, median};
use schemabench_core::{
    CompileStatus, CompileStatusCode, EvaluationOutcome, GenerationSample, PerfMetrics, TokenUsage,
};
use serde_json::json;

fn make_sample(task: &str, output: &str, declared_ok: bool) -> GenerationSample {
    let mut sample = GenerationSample::new(task, "prompt", Some(output.to_string()));
    sample.schema = Some(json!({"type": "object", "required": ["ok"]}));
    sample.compile_status = if declared_ok {
        CompileStatus::ok()
    } else {
        CompileStatus::new(CompileStatusCode::UnsupportedSchema, "rejected")
    };
    sample
}

fn close(a: Option<f64>, b: f64) -> bool {
    a.is_some_and(|a| (a - b).abs() < 1e-9)
}

#[test]
fn median_handles_odd_even_and_empty() {
    assert_eq!(median(&[]), None);
    assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
    assert_eq!(median(&[1.0, 2.0, 3.0, 4.0]), Some(2.5));
    assert_eq!(median(&[7.0]), Some(7.0));
}

#[test]
fn empty_task_has_no_numeric_values() {
    let summary = aggregate(&[]);
    assert_eq!(summary.total_samples, 0);
    assert_eq!(summary.declared_coverage, None);
    assert_eq!(summary.empirical_coverage, None);
    assert_eq!(summary.compliance, None);
    assert_eq!(summary.perf_metrics, PerfMetrics::default());
}

#[test]
fn coverage_and_compliance_ratios() {
    let mut samples = Vec::new();
    for _ in 0..4 {
        samples.push(make_sample("t", r#"{"ok": true}"#, true));
    }
    for _ in 0..2 {
        samples.push(make_sample("t", "{}", true));
    }
    for _ in 0..4 {
        samples.push(make_sample("t", "", false));
    }

    let summary = aggregate(&samples);
    assert_eq!(summary.total_samples, 10);
    assert_eq!(summary.declared_ok, 6);
    assert_eq!(summary.matches, 4);
    assert!(close(summary.declared_coverage, 0.6));
    assert!(close(summary.empirical_coverage, 0.4));
    assert!(close(summary.compliance, 4.0 / 6.0));
    assert_eq!(summary.outcomes.get(&EvaluationOutcome::Match), Some(&4));
    assert_eq!(summary.outcomes.get(&EvaluationOutcome::SemanticError), Some(&2));
    assert_eq!(summary.outcomes.get(&EvaluationOutcome::EmptyOutput), Some(&4));
}

#[test]
fn compliance_absent_without_declared_successes() {
    let samples = vec![make_sample("t", r#"{"ok": 1}"#, false)];
    let summary = aggregate(&samples);
    assert!(close(summary.empirical_coverage, 1.0));
    assert_eq!(summary.compliance, None);
}

#[test]
fn compliance_counts_matches_the_engine_did_not_declare() {
    let mut pending = make_sample("t", r#"{"ok": 1}"#, false);
    pending.compile_status = CompileStatus::new(CompileStatusCode::Pending, "");
    let samples = vec![make_sample("t", r#"{"ok": 1}"#, true), pending];

    let summary = aggregate(&samples);
    assert!(close(summary.declared_coverage, 0.5));
    assert!(close(summary.empirical_coverage, 1.0));
    // empirical / declared, so it may exceed 1.
    assert!(close(summary.compliance, 2.0));
}

#[test]
fn perf_medians_skip_absent_values() {
    let mut a = make_sample("t", "{}", true);
    a.perf_metrics = Some(PerfMetrics {
        ttft: Some(1.0),
        tgt: Some(4.0),
        ..Default::default()
    });
    let mut b = make_sample("t", "{}", true);
    b.perf_metrics = Some(PerfMetrics {
        ttft: Some(3.0),
        ..Default::default()
    });
    let c = make_sample("t", "{}", true);

    let summary = aggregate(&[a, b, c]);
    assert_eq!(summary.perf_metrics.ttft, Some(2.0));
    assert_eq!(summary.perf_metrics.tgt, Some(4.0));
    assert_eq!(summary.perf_metrics.gct, None);
}

#[test]
fn token_usage_is_summed() {
    let mut a = make_sample("t", "{}", true);
    a.token_usage = TokenUsage {
        input_tokens: 100,
        output_tokens: 20,
        ff_output_tokens: 0,
    };
    let mut b = a.clone();
    b.token_usage.output_tokens = 5;
    let summary = aggregate(&[a, b]);
    assert_eq!(summary.token_usage.input_tokens, 200);
    assert_eq!(summary.token_usage.output_tokens, 25);
}

#[test]
fn mixed_samples_group_by_first_appearance() {
    let samples = vec![
        make_sample("Snowplow", "{}", true),
        make_sample("Github_easy", r#"{"ok": 1}"#, true),
        make_sample("Snowplow", r#"{"ok": 1}"#, true),
    ];
    let grouped = aggregate_by_task(&samples);
    let names: Vec<&str> = grouped.iter().map(|(t, _)| t.as_str()).collect();
    assert_eq!(names, vec!["Snowplow", "Github_easy"]);
    assert_eq!(grouped[0].1.total_samples, 2);
    assert_eq!(grouped[0].1.matches, 1);
}

#[test]
fn aggregation_is_pure() {
    let samples = vec![make_sample("t", r#"{"ok": 1}"#, true), make_sample("t", "{", false)];
    assert_eq!(aggregate(&samples), aggregate(&samples));
}
