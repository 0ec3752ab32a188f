//! Bench - the main entry point for running a benchmark.
//!
//! For every task the driver loads the dataset, lets the engine adapt each
//! schema, profiles one generation per item, stores the resulting samples and
//! aggregates them once the task is complete.

use crate::config::{BenchConfig, ConfigError};
use crate::datasets::{DatasetItem, DatasetLoader};
use crate::engine::Engine;
use crate::error::{Result, SchemaBenchError};
use crate::evaluator::classify;
use crate::events::BenchEvent;
use crate::metrics::aggregate;
use crate::persistence::{iso_timestamp_now, SampleStore};
use crate::profile::profile_generation;
use crate::prompts::{FormatPrompt, DEFAULT_FORMAT_PROMPT};
use crate::reporter;
use crate::types::{GenerationSample, TaskSummary, TokenUsage};
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info};

#[derive(Clone)]
pub struct BenchOptions {
    pub tasks: Vec<String>,
    pub limit: Option<usize>,
    /// Maximum generations in flight per task.
    pub concurrency: usize,
    pub close_engine: bool,
    pub format_prompt: FormatPrompt,
}

impl Default for BenchOptions {
    fn default() -> Self {
        Self {
            tasks: Vec::new(),
            limit: None,
            concurrency: 1,
            close_engine: true,
            format_prompt: DEFAULT_FORMAT_PROMPT,
        }
    }
}

impl BenchOptions {
    pub fn from_config(config: &BenchConfig) -> Self {
        Self {
            tasks: config.tasks.clone(),
            limit: config.limit,
            concurrency: config.concurrency,
            close_engine: config.close_engine,
            format_prompt: DEFAULT_FORMAT_PROMPT,
        }
    }
}

/// Outcome of a bench run, one summary per task in configuration order.
#[derive(Debug, Clone, Serialize)]
pub struct BenchReport {
    pub engine: String,
    pub run_id: Option<String>,
    pub started_at: String,
    pub finished_at: String,
    pub tasks: Vec<(String, TaskSummary)>,
    pub total_usage: TokenUsage,
}

impl BenchReport {
    pub fn render(&self) -> String {
        reporter::render(&self.tasks)
    }

    pub fn total_samples(&self) -> u64 {
        self.tasks.iter().map(|(_, s)| s.total_samples).sum()
    }
}

pub struct Bench {
    engine: Box<dyn Engine>,
    loader: Box<dyn DatasetLoader>,
    options: BenchOptions,
    store: Option<SampleStore>,
    run_id: Option<String>,
    event_tx: broadcast::Sender<BenchEvent>,
}

impl Bench {
    pub fn new(
        engine: Box<dyn Engine>,
        loader: Box<dyn DatasetLoader>,
        options: BenchOptions,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(1024);
        Self {
            engine,
            loader,
            options,
            store: None,
            run_id: None,
            event_tx,
        }
    }

    /// Persist every sample (and the final report) under the store's run directory.
    pub fn with_store(mut self, run_id: impl Into<String>, store: SampleStore) -> Self {
        self.run_id = Some(run_id.into());
        self.store = Some(store);
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BenchEvent> {
        self.event_tx.subscribe()
    }

    /// Run every task. Dropping `self` at the end closes the event channel.
    pub async fn run(self) -> Result<BenchReport> {
        if self.options.tasks.is_empty() {
            return Err(ConfigError::Invalid("no tasks to run".into()).into());
        }
        let started_at = iso_timestamp_now();
        let engine_name = self.engine.name().to_string();
        info!(
            engine = %engine_name,
            tasks = ?self.options.tasks,
            run_id = ?self.run_id,
            "starting bench"
        );

        // Load everything up front so a missing task fails before any request is sent.
        let datasets = self.load_datasets()?;

        self.emit(BenchEvent::RunStarted {
            engine: engine_name.clone(),
            run_id: self.run_id.clone(),
            tasks: self.options.tasks.clone(),
        });

        let outcome = self.run_tasks(datasets).await;
        // Close even when a task failed.
        if self.options.close_engine {
            self.engine.close().await;
        }
        let (tasks, total_usage) = outcome?;

        let report = BenchReport {
            engine: engine_name,
            run_id: self.run_id.clone(),
            started_at,
            finished_at: iso_timestamp_now(),
            tasks,
            total_usage,
        };
        if let Some(store) = &self.store {
            store.write_summary(&report)?;
        }

        self.emit(BenchEvent::RunCompleted {
            engine: report.engine.clone(),
            run_id: report.run_id.clone(),
            total_samples: report.total_samples(),
            total_usage: report.total_usage,
        });
        Ok(report)
    }

    async fn run_tasks(
        &self,
        datasets: Vec<(String, Vec<DatasetItem>)>,
    ) -> Result<(Vec<(String, TaskSummary)>, TokenUsage)> {
        let mut tasks = Vec::with_capacity(datasets.len());
        let mut total_usage = TokenUsage::default();
        for (task, items) in datasets {
            let samples = self.run_task(&task, items).await?;
            let summary = aggregate(&samples);
            total_usage += summary.token_usage;
            info!(
                task = %task,
                samples = summary.total_samples,
                declared_coverage = ?summary.declared_coverage,
                empirical_coverage = ?summary.empirical_coverage,
                "task complete"
            );
            self.emit(BenchEvent::TaskCompleted {
                task: task.clone(),
                summary: summary.clone(),
            });
            tasks.push((task, summary));
        }
        Ok((tasks, total_usage))
    }

    fn load_datasets(&self) -> Result<Vec<(String, Vec<DatasetItem>)>> {
        self.options
            .tasks
            .iter()
            .map(|task| {
                let items = self.loader.load(task, self.options.limit)?;
                Ok::<_, SchemaBenchError>((task.clone(), items))
            })
            .collect()
    }

    async fn run_task(
        &self,
        task: &str,
        items: Vec<DatasetItem>,
    ) -> Result<Vec<GenerationSample>> {
        self.emit(BenchEvent::TaskStarted {
            task: task.to_string(),
            total_items: items.len() as u64,
        });

        let engine = self.engine.as_ref();
        let format_prompt = self.options.format_prompt;
        let generations = stream::iter(items)
            .map(move |item| {
                // The prompt shows the dataset schema; the engine gets its own dialect.
                let prompt = item.prompt(format_prompt);
                let schema = engine.adapt_schema(item.schema);
                profile_generation(engine, task, Some(item.id), prompt, schema)
            })
            .buffered(self.options.concurrency.max(1));
        let mut generations = std::pin::pin!(generations);

        let mut samples = Vec::new();
        while let Some(sample) = generations.next().await {
            if let Some(store) = &self.store {
                store.append(&sample)?;
            }
            let outcome = classify(&sample);
            debug!(
                task,
                id = ?sample.id,
                %outcome,
                compile = ?sample.compile_status.code,
                "sample complete"
            );
            self.emit(BenchEvent::SampleCompleted {
                task: task.to_string(),
                id: sample.id.clone(),
                outcome,
                compile_status: sample.compile_status.code,
                tgt: sample.metrics().tgt,
            });
            samples.push(sample);
        }
        Ok(samples)
    }

    fn emit(&self, event: BenchEvent) {
        let _ = self.event_tx.send(event);
    }
}
