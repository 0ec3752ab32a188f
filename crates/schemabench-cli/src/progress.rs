//! Indicatif-based progress display for the CLI.
//!
//! One bar per task, driven by [`BenchEvent`]s received over the bench's
//! broadcast channel. Everything here writes to the terminal only.

use console::style;
use dashmap::DashMap;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use parking_lot::Mutex;
use schemabench_core::reporter::format_optional;
use schemabench_core::{BenchEvent, CompileStatusCode, EvaluationOutcome};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

struct TaskState {
    bar: ProgressBar,
    matched: AtomicU64,
    failed: AtomicU64,
    rejected: AtomicU64,
}

impl TaskState {
    fn new(bar: ProgressBar) -> Self {
        Self {
            bar,
            matched: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }

    fn record(&self, outcome: EvaluationOutcome, compile_status: CompileStatusCode) {
        if compile_status != CompileStatusCode::Ok {
            self.rejected.fetch_add(1, Ordering::Relaxed);
        }
        if outcome.is_match() {
            self.matched.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
        self.bar.inc(1);
    }

    fn update_message(&self, start_time: Option<Instant>) {
        let elapsed = start_time.map(|t| t.elapsed().as_secs()).unwrap_or(0);
        let elapsed_str = if elapsed >= 60 {
            format!("{}m{}s", elapsed / 60, elapsed % 60)
        } else {
            format!("{elapsed}s")
        };

        let msg = format!(
            "{} {} {} {} {} {} {}",
            style("✓").green(),
            style(self.matched.load(Ordering::Relaxed)).green().bold(),
            style("✗").red(),
            style(self.failed.load(Ordering::Relaxed)).red().bold(),
            style("⊘").yellow(),
            style(self.rejected.load(Ordering::Relaxed)).yellow(),
            style(elapsed_str).dim(),
        );
        self.bar.set_message(msg);
    }
}

/// Progress display using indicatif for rich terminal output.
pub struct ProgressDisplay {
    multi: MultiProgress,
    tasks: DashMap<String, TaskState>,
    start_time: Mutex<Option<Instant>>,
    name_width: Mutex<usize>,
}

impl Default for ProgressDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressDisplay {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            tasks: DashMap::new(),
            start_time: Mutex::new(None),
            name_width: Mutex::new(10),
        }
    }

    /// Process events until the channel closes.
    pub async fn run(self, mut rx: broadcast::Receiver<BenchEvent>) {
        loop {
            match rx.recv().await {
                Ok(event) => self.handle_event(event),
                Err(broadcast::error::RecvError::Closed) => break,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
            }
        }
    }

    fn bar_style(&self) -> ProgressStyle {
        let width = *self.name_width.lock();
        ProgressStyle::with_template(&format!(
            "{{spinner:.green}} {{prefix:<{width}}} [{{bar:30.cyan/blue}}] {{pos}}/{{len}} {{msg}}"
        ))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓▒░  ")
    }

    fn handle_event(&self, event: BenchEvent) {
        match event {
            BenchEvent::RunStarted {
                engine,
                run_id,
                tasks,
            } => {
                *self.start_time.lock() = Some(Instant::now());
                *self.name_width.lock() = tasks.iter().map(String::len).max().unwrap_or(10);
                let label = run_id.unwrap_or_else(|| engine.clone());
                eprintln!(
                    "{} Starting {} ({} on {} task{})",
                    style("→").cyan().bold(),
                    style(&label).bold(),
                    engine,
                    tasks.len(),
                    if tasks.len() == 1 { "" } else { "s" }
                );
            }

            BenchEvent::TaskStarted { task, total_items } => {
                let bar = self.multi.add(ProgressBar::new(total_items));
                bar.set_style(self.bar_style());
                bar.set_prefix(task.clone());
                bar.enable_steady_tick(Duration::from_millis(100));
                let state = TaskState::new(bar);
                state.update_message(*self.start_time.lock());
                self.tasks.insert(task, state);
            }

            BenchEvent::SampleCompleted {
                task,
                outcome,
                compile_status,
                ..
            } => {
                if let Some(state) = self.tasks.get(&task) {
                    state.value().record(outcome, compile_status);
                    state.value().update_message(*self.start_time.lock());
                }
            }

            BenchEvent::TaskCompleted { task, summary } => {
                if let Some(state) = self.tasks.get(&task) {
                    state.value().update_message(*self.start_time.lock());
                    state.value().bar.finish_with_message(format!(
                        "empirical coverage {}",
                        style(format_optional(summary.empirical_coverage)).bold()
                    ));
                }
            }

            BenchEvent::RunCompleted {
                engine,
                run_id,
                total_samples,
                total_usage,
            } => {
                for entry in self.tasks.iter() {
                    entry.value().bar.finish_and_clear();
                }
                let elapsed = self
                    .start_time
                    .lock()
                    .map(|t| t.elapsed().as_secs_f64())
                    .unwrap_or(0.0);

                eprintln!();
                eprintln!(
                    "{} Run {} {}",
                    style("✓").green().bold(),
                    style(run_id.unwrap_or(engine)).bold(),
                    style("COMPLETED").green().bold()
                );
                eprintln!("  {} {}", style("Samples:").dim(), total_samples);
                eprintln!(
                    "  {} {}/{}",
                    style("Tokens in/out:").dim(),
                    total_usage.input_tokens,
                    total_usage.output_tokens
                );
                eprintln!("  {} {:.1}s", style("Duration:").dim(), elapsed);
                eprintln!();
            }
        }
    }
}
