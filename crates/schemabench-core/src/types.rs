//! Shared data types for SchemaBench.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Add, AddAssign};

/// A JSON Schema document. Nothing about its validity is assumed.
pub type Schema = Value;

// ============================================================================
// STATUS CODES
// ============================================================================

/// Outcome of the engine's grammar/schema compilation step, as self-reported.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum CompileStatusCode {
    #[default]
    Pending,
    Ok,
    UnsupportedSchema,
    RuntimeGrammarError,
    BadApiResponse,
    PromptTooLong,
    CompileTimeout,
    RuntimeTimeout,
    UnknownError,
}

/// Outcome of the engine's decoding step, as self-reported.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum DecodingStatusCode {
    #[default]
    Pending,
    Ok,
    ExceedingMaxContext,
    DecodingTimeout,
    BadApiResponse,
    UnknownError,
}

fn default_status_message() -> String {
    "unknown".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompileStatus {
    #[serde(default)]
    pub code: CompileStatusCode,
    #[serde(default = "default_status_message")]
    pub message: String,
}

impl CompileStatus {
    pub fn new(code: CompileStatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn ok() -> Self {
        Self::new(CompileStatusCode::Ok, "ok")
    }

    pub fn is_ok(&self) -> bool {
        self.code == CompileStatusCode::Ok
    }
}

impl Default for CompileStatus {
    fn default() -> Self {
        Self::new(CompileStatusCode::Pending, default_status_message())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DecodingStatus {
    #[serde(default)]
    pub code: DecodingStatusCode,
    #[serde(default = "default_status_message")]
    pub message: String,
}

impl DecodingStatus {
    pub fn new(code: DecodingStatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn ok() -> Self {
        Self::new(DecodingStatusCode::Ok, "ok")
    }
}

impl Default for DecodingStatus {
    fn default() -> Self {
        Self::new(DecodingStatusCode::Pending, default_status_message())
    }
}

// ============================================================================
// TOKEN USAGE
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct TokenUsage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    /// Tokens emitted by grammar fast-forwarding rather than sampled.
    #[serde(default)]
    pub ff_output_tokens: u64,
}

impl Add for TokenUsage {
    type Output = TokenUsage;

    fn add(self, other: TokenUsage) -> TokenUsage {
        TokenUsage {
            input_tokens: self.input_tokens + other.input_tokens,
            output_tokens: self.output_tokens + other.output_tokens,
            ff_output_tokens: self.ff_output_tokens + other.ff_output_tokens,
        }
    }
}

impl AddAssign for TokenUsage {
    fn add_assign(&mut self, other: TokenUsage) {
        *self = *self + other;
    }
}

impl fmt::Display for TokenUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "token usage: {} input, {} output.",
            group_thousands(self.input_tokens),
            group_thousands(self.output_tokens)
        )
    }
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

// ============================================================================
// TIMING
// ============================================================================

/// Wall-clock timestamps (seconds since the Unix epoch) recorded around one
/// generation call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Timestamps {
    pub request_start: f64,
    #[serde(default)]
    pub grammar_compile_end: Option<f64>,
    #[serde(default)]
    pub first_token_arrival: Option<f64>,
    pub request_end: f64,
}

/// Performance metrics derived from [`Timestamps`]. Absent means "not computable".
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct PerfMetrics {
    /// Time to first token, seconds.
    #[serde(default)]
    pub ttft: Option<f64>,
    /// Time per output token, milliseconds.
    #[serde(default)]
    pub tpot: Option<f64>,
    /// Total generation time, seconds.
    #[serde(default)]
    pub tgt: Option<f64>,
    /// Grammar compilation time, seconds.
    #[serde(default)]
    pub gct: Option<f64>,
    /// Prefill time, seconds.
    #[serde(default)]
    pub prft: Option<f64>,
}

// ============================================================================
// EVALUATION OUTCOME
// ============================================================================

/// Classification of a single sample. Exactly one applies per sample.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvaluationOutcome {
    Match,
    SyntaxError,
    SemanticError,
    SchemaMissing,
    EmptyOutput,
    UnknownError,
}

impl EvaluationOutcome {
    pub const ALL: [EvaluationOutcome; 6] = [
        EvaluationOutcome::Match,
        EvaluationOutcome::SyntaxError,
        EvaluationOutcome::SemanticError,
        EvaluationOutcome::SchemaMissing,
        EvaluationOutcome::EmptyOutput,
        EvaluationOutcome::UnknownError,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EvaluationOutcome::Match => "MATCH",
            EvaluationOutcome::SyntaxError => "SYNTAX_ERROR",
            EvaluationOutcome::SemanticError => "SEMANTIC_ERROR",
            EvaluationOutcome::SchemaMissing => "SCHEMA_MISSING",
            EvaluationOutcome::EmptyOutput => "EMPTY_OUTPUT",
            EvaluationOutcome::UnknownError => "UNKNOWN_ERROR",
        }
    }

    pub fn is_match(&self) -> bool {
        matches!(self, EvaluationOutcome::Match)
    }
}

impl fmt::Display for EvaluationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// GENERATION SAMPLE
// ============================================================================

/// One engine generation for one dataset item: the unit that gets scored.
///
/// `input` and `output` must be present in persisted records (`output` may be
/// `null`); every other field defaults to absent when its key is missing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationSample {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub task: String,
    pub input: String,
    #[serde(deserialize_with = "required_nullable")]
    pub output: Option<String>,
    #[serde(default)]
    pub schema: Option<Schema>,
    #[serde(default)]
    pub token_usage: TokenUsage,
    #[serde(default)]
    pub compile_status: CompileStatus,
    #[serde(default)]
    pub decoding_status: DecodingStatus,
    #[serde(default)]
    pub timestamps: Option<Timestamps>,
    #[serde(default)]
    pub perf_metrics: Option<PerfMetrics>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_fingerprint: Option<String>,
}

/// Accepts `null` but, unlike a plain `Option`, rejects a missing key.
fn required_nullable<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer)
}

impl GenerationSample {
    pub fn new(task: impl Into<String>, input: impl Into<String>, output: Option<String>) -> Self {
        Self {
            id: None,
            task: task.into(),
            input: input.into(),
            output,
            schema: None,
            token_usage: TokenUsage::default(),
            compile_status: CompileStatus::default(),
            decoding_status: DecodingStatus::default(),
            timestamps: None,
            perf_metrics: None,
            system_fingerprint: None,
        }
    }

    /// Metrics recorded at capture time, or re-derived from the raw timestamps
    /// when a replayed record carries only those.
    pub fn metrics(&self) -> PerfMetrics {
        match (self.perf_metrics, self.timestamps) {
            (Some(metrics), _) => metrics,
            (None, Some(ts)) => crate::profile::derive(&ts, self.token_usage.output_tokens),
            (None, None) => PerfMetrics::default(),
        }
    }
}

// ============================================================================
// TASK SUMMARY
// ============================================================================

/// Aggregate statistics for all samples of one task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TaskSummary {
    #[serde(default)]
    pub total_samples: u64,
    #[serde(default)]
    pub declared_ok: u64,
    #[serde(default)]
    pub matches: u64,
    #[serde(default)]
    pub declared_coverage: Option<f64>,
    #[serde(default)]
    pub empirical_coverage: Option<f64>,
    #[serde(default)]
    pub compliance: Option<f64>,
    #[serde(default)]
    pub perf_metrics: PerfMetrics,
    #[serde(default)]
    pub outcomes: BTreeMap<EvaluationOutcome, u64>,
    #[serde(default)]
    pub token_usage: TokenUsage,
}
