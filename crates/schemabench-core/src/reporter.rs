//! Human-readable score tables.
//!
//! Output is meant for terminals and logs; there is no compatibility
//! contract beyond readability, except that an absent value always renders
//! as [`MISSING`].

use crate::types::{EvaluationOutcome, TaskSummary, TokenUsage};

/// Sentinel rendered for any absent numeric value.
pub const MISSING: &str = "n/a";

const SCORE_HEADERS: [&str; 9] = [
    "Task",
    "Declared coverage",
    "Empirical coverage",
    "Compliance",
    "TTFT (s)",
    "TPOT (ms)",
    "TGT (s)",
    "GCT (s)",
    "PRFT (s)",
];

/// Format an optional value with two decimals, or [`MISSING`].
pub fn format_optional(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:.2}"),
        None => MISSING.to_string(),
    }
}

/// Render one row per task with coverage, compliance and median perf metrics.
pub fn render(tasks: &[(String, TaskSummary)]) -> String {
    let rows: Vec<Vec<String>> = tasks
        .iter()
        .map(|(name, summary)| {
            let pm = &summary.perf_metrics;
            vec![
                name.clone(),
                format_optional(summary.declared_coverage),
                format_optional(summary.empirical_coverage),
                format_optional(summary.compliance),
                format_optional(pm.ttft),
                format_optional(pm.tpot),
                format_optional(pm.tgt),
                format_optional(pm.gct),
                format_optional(pm.prft),
            ]
        })
        .collect();
    draw_table(&SCORE_HEADERS, &rows)
}

/// Render the per-outcome sample counts for each task.
pub fn render_outcomes(tasks: &[(String, TaskSummary)]) -> String {
    let mut headers = vec!["Task", "Samples"];
    headers.extend(EvaluationOutcome::ALL.iter().map(|o| o.as_str()));

    let rows: Vec<Vec<String>> = tasks
        .iter()
        .map(|(name, summary)| {
            let mut row = vec![name.clone(), summary.total_samples.to_string()];
            row.extend(EvaluationOutcome::ALL.iter().map(|outcome| {
                summary
                    .outcomes
                    .get(outcome)
                    .copied()
                    .unwrap_or(0)
                    .to_string()
            }));
            row
        })
        .collect();
    draw_table(&headers, &rows)
}

pub fn render_usage(usage: &TokenUsage) -> String {
    usage.to_string()
}

fn draw_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let border = {
        let segments: Vec<String> = widths.iter().map(|w| "-".repeat(w + 2)).collect();
        format!("+{}+", segments.join("+"))
    };

    let mut out = String::new();
    out.push_str(&border);
    out.push('\n');
    out.push_str(&draw_row(headers.iter().copied(), &widths));
    out.push('\n');
    out.push_str(&border);
    out.push('\n');
    for row in rows {
        out.push_str(&draw_row(row.iter().map(String::as_str), &widths));
        out.push('\n');
    }
    if !rows.is_empty() {
        out.push_str(&border);
        out.push('\n');
    }
    out
}

fn draw_row<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    let cells: Vec<String> = cells
        .zip(widths)
        .map(|(cell, &width)| format!(" {cell:<width$} "))
        .collect();
    format!("|{}|", cells.join("|"))
}
