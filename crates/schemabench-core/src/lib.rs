//! Core library for SchemaBench, a benchmark for JSON-Schema constrained
//! decoding engines.
//!
//! - [`validator`]: Draft 2020-12 validation with ipv4/ipv6/uuid format checks
//! - [`evaluator`]: per-sample classification into [`EvaluationOutcome`]s
//! - [`profile`]: timing capture and derived performance metrics
//! - [`metrics`]: per-task aggregation into [`TaskSummary`]s
//! - [`reporter`]: human-readable score tables
//! - [`engine`] / [`engines`]: the engine trait, registry and HTTP adapters
//! - [`datasets`]: JSONL task loading
//! - [`bench`]: the driver loop tying everything together
//! - [`persistence`]: NDJSON sample storage for replay
//!
//! # Architecture
//!
//! The scoring core (validator, evaluator, metrics, reporter) is synchronous
//! and does no I/O. Malformed outputs and schemas are outcomes rather than
//! errors, so a single bad sample never aborts a task. The driver runs on
//! tokio and streams progress over a broadcast channel.

// Foundation modules (no internal dependencies)
pub mod types;

// Configuration and errors
pub mod config;
pub mod error;

// Scoring core
pub mod evaluator;
pub mod metrics;
pub mod profile;
pub mod reporter;
pub mod validator;

// Engines and data
pub mod datasets;
pub mod engine;
pub mod engines;
pub mod prompts;

// Execution
pub mod bench;
pub mod events;
pub mod persistence;

pub use bench::{Bench, BenchOptions, BenchReport};
pub use config::{BenchConfig, ConfigOverrides, EngineSettings};
pub use datasets::{DatasetItem, DatasetLoader, LocalDataset};
pub use engine::{Engine, EngineOutput, EngineRegistry};
pub use error::{Result, SchemaBenchError};
pub use evaluator::classify;
pub use events::BenchEvent;
pub use metrics::{aggregate, aggregate_by_task};
pub use persistence::{load_samples, SampleStore};
pub use reporter::render;
pub use types::{
    CompileStatus, CompileStatusCode, DecodingStatus, DecodingStatusCode, EvaluationOutcome,
    GenerationSample, PerfMetrics, Schema, TaskSummary, Timestamps, TokenUsage,
};
