//! Per-task aggregation of classified samples.

use crate::evaluator::classify;
use crate::types::{EvaluationOutcome, GenerationSample, PerfMetrics, TaskSummary, TokenUsage};
use std::collections::{BTreeMap, HashMap};

/// Median of `values`; the mean of the two central values for even lengths.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let n = sorted.len();
    if n % 2 == 0 {
        Some((sorted[n / 2 - 1] + sorted[n / 2]) / 2.0)
    } else {
        Some(sorted[n / 2])
    }
}

fn ratio(numerator: u64, denominator: u64) -> Option<f64> {
    if denominator == 0 {
        None
    } else {
        Some(numerator as f64 / denominator as f64)
    }
}

fn field_median(
    metrics: &[PerfMetrics],
    field: impl Fn(&PerfMetrics) -> Option<f64>,
) -> Option<f64> {
    let values: Vec<f64> = metrics.iter().filter_map(field).collect();
    median(&values)
}

fn median_metrics(metrics: &[PerfMetrics]) -> PerfMetrics {
    PerfMetrics {
        ttft: field_median(metrics, |m| m.ttft),
        tpot: field_median(metrics, |m| m.tpot),
        tgt: field_median(metrics, |m| m.tgt),
        gct: field_median(metrics, |m| m.gct),
        prft: field_median(metrics, |m| m.prft),
    }
}

/// Reduce all samples of one task into a [`TaskSummary`].
///
/// Every ratio is absent when its denominator is zero, so an empty task
/// yields a summary with no numeric values at all.
pub fn aggregate(samples: &[GenerationSample]) -> TaskSummary {
    let total = samples.len() as u64;
    let mut declared_ok = 0u64;
    let mut matches = 0u64;
    let mut outcomes: BTreeMap<EvaluationOutcome, u64> = BTreeMap::new();
    let mut token_usage = TokenUsage::default();
    let mut metrics = Vec::with_capacity(samples.len());

    for sample in samples {
        let outcome = classify(sample);
        *outcomes.entry(outcome).or_default() += 1;

        if sample.compile_status.is_ok() {
            declared_ok += 1;
        }
        if outcome.is_match() {
            matches += 1;
        }

        token_usage += sample.token_usage;
        metrics.push(sample.metrics());
    }

    TaskSummary {
        total_samples: total,
        declared_ok,
        matches,
        declared_coverage: ratio(declared_ok, total),
        empirical_coverage: ratio(matches, total),
        // Every match counts, even one the engine did not report as compiled.
        compliance: ratio(matches, declared_ok),
        perf_metrics: median_metrics(&metrics),
        outcomes,
        token_usage,
    }
}

/// Group samples by task, keeping tasks in order of first appearance.
pub fn group_by_task(samples: &[GenerationSample]) -> Vec<(String, Vec<GenerationSample>)> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<(String, Vec<GenerationSample>)> = Vec::new();
    for sample in samples {
        let slot = *index.entry(sample.task.as_str()).or_insert_with(|| {
            groups.push((sample.task.clone(), Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(sample.clone());
    }
    groups
}

/// Aggregate a mixed sample list into one summary per task.
pub fn aggregate_by_task(samples: &[GenerationSample]) -> Vec<(String, TaskSummary)> {
    group_by_task(samples)
        .into_iter()
        .map(|(task, group)| {
            let summary = aggregate(&group);
            (task, summary)
        })
        .collect()
}
