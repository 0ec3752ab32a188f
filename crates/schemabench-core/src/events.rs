//! Events emitted while a bench runs.
//!
//! The driver broadcasts these on a `tokio::sync::broadcast` channel; the CLI
//! subscribes to drive its progress bars. Nothing in the driver depends on a
//! subscriber being present.

use crate::types::{CompileStatusCode, EvaluationOutcome, TaskSummary, TokenUsage};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum BenchEvent {
    RunStarted {
        engine: String,
        run_id: Option<String>,
        tasks: Vec<String>,
    },

    /// Dataset loaded; `total_items` samples will follow.
    TaskStarted { task: String, total_items: u64 },

    SampleCompleted {
        task: String,
        id: Option<String>,
        outcome: EvaluationOutcome,
        compile_status: CompileStatusCode,
        tgt: Option<f64>,
    },

    TaskCompleted { task: String, summary: TaskSummary },

    RunCompleted {
        engine: String,
        run_id: Option<String>,
        total_samples: u64,
        total_usage: TokenUsage,
    },
}
