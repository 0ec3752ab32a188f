//! Timing capture and derived performance metrics.
//!
//! Every derived field is computed with "safe" arithmetic: a missing operand
//! or a zero divisor makes that one field absent without affecting the others.

use crate::engine::Engine;
use crate::types::{GenerationSample, PerfMetrics, Schema, Timestamps};
use chrono::Utc;

/// `a - b`, or `None` if either side is missing.
pub fn safe_subtract(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a - b).filter(|v| v.is_finite()),
        _ => None,
    }
}

/// `a / b`, or `None` if either side is missing or `b` is zero.
pub fn safe_divide(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(_), Some(b)) if b == 0.0 => None,
        (Some(a), Some(b)) => Some(a / b).filter(|v| v.is_finite()),
        _ => None,
    }
}

/// Derive [`PerfMetrics`] from raw timestamps and the output token count.
pub fn derive(ts: &Timestamps, output_tokens: u64) -> PerfMetrics {
    let start = Some(ts.request_start);
    let end = Some(ts.request_end);

    // The first token is already covered by ttft; tpot only spans the rest.
    let continuation_tokens = if output_tokens > 1 {
        Some((output_tokens - 1) as f64)
    } else {
        None
    };
    let tpot_seconds = safe_divide(
        safe_subtract(end, ts.first_token_arrival),
        continuation_tokens,
    );

    PerfMetrics {
        ttft: safe_subtract(ts.first_token_arrival, start),
        tpot: tpot_seconds.map(|s| s * 1000.0),
        tgt: safe_subtract(end, start),
        gct: safe_subtract(ts.grammar_compile_end, start),
        prft: safe_subtract(ts.first_token_arrival, ts.grammar_compile_end),
    }
}

impl PerfMetrics {
    pub fn from_timestamps(ts: &Timestamps, output_tokens: u64) -> Self {
        derive(ts, output_tokens)
    }
}

/// Current wall-clock time in seconds since the Unix epoch.
pub fn now_seconds() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// Records the request start and end around one generation call.
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    request_start: f64,
}

impl Stopwatch {
    pub fn start() -> Self {
        Self {
            request_start: now_seconds(),
        }
    }

    pub fn stop(
        self,
        grammar_compile_end: Option<f64>,
        first_token_arrival: Option<f64>,
    ) -> Timestamps {
        Timestamps {
            request_start: self.request_start,
            grammar_compile_end,
            first_token_arrival,
            request_end: now_seconds(),
        }
    }
}

/// Run one generation with timing capture and package the result as a sample.
///
/// The schema passed in is the one handed to the engine (already adapted), and
/// it is the one the output will be judged against.
pub async fn profile_generation(
    engine: &dyn Engine,
    task: &str,
    id: Option<String>,
    prompt: String,
    schema: Schema,
) -> GenerationSample {
    let watch = Stopwatch::start();
    let out = engine.generate(&prompt, &schema).await;
    let timestamps = watch.stop(out.grammar_compile_end, out.first_token_arrival);
    let perf_metrics = derive(&timestamps, out.token_usage.output_tokens);

    GenerationSample {
        id,
        task: task.to_string(),
        input: prompt,
        output: out.output,
        schema: Some(schema),
        token_usage: out.token_usage,
        compile_status: out.compile_status,
        decoding_status: out.decoding_status,
        timestamps: Some(timestamps),
        perf_metrics: Some(perf_metrics),
        system_fingerprint: out.system_fingerprint,
    }
}
