//! Run directories and NDJSON sample storage.

use crate::error::{Result, SchemaBenchError};
use crate::types::GenerationSample;
use chrono::Utc;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const SAMPLES_FILE: &str = "samples.jsonl";
pub const SUMMARY_FILE: &str = "summary.json";

/// Append-only store for the samples of one run.
#[derive(Debug)]
pub struct SampleStore {
    run_dir: PathBuf,
    samples_path: PathBuf,
    summary_path: PathBuf,
}

impl SampleStore {
    pub fn new(run_dir: impl AsRef<Path>) -> Result<Self> {
        let run_dir = run_dir.as_ref().to_path_buf();
        fs::create_dir_all(&run_dir)?;
        Ok(Self {
            samples_path: run_dir.join(SAMPLES_FILE),
            summary_path: run_dir.join(SUMMARY_FILE),
            run_dir,
        })
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn samples_path(&self) -> &Path {
        &self.samples_path
    }

    pub fn append(&self, sample: &GenerationSample) -> Result<()> {
        let mut file = File::options()
            .create(true)
            .append(true)
            .open(&self.samples_path)?;
        let line = serde_json::to_string(sample)?;
        writeln!(file, "{line}")?;
        Ok(())
    }

    pub fn load(&self) -> Result<Vec<GenerationSample>> {
        if !self.samples_path.exists() {
            return Ok(Vec::new());
        }
        load_samples(&self.samples_path)
    }

    pub fn write_summary<T: Serialize>(&self, summary: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(summary)?;
        fs::write(&self.summary_path, json)?;
        debug!(path = %self.summary_path.display(), "wrote run summary");
        Ok(())
    }
}

/// Read every sample of an NDJSON file. Blank lines are skipped; a record
/// that does not decode fails the whole load with its 1-based line number.
pub fn load_samples(path: impl AsRef<Path>) -> Result<Vec<GenerationSample>> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path)?);

    let mut samples = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let sample =
            serde_json::from_str(&line).map_err(|source| SchemaBenchError::MalformedRecord {
                path: path.display().to_string(),
                line: idx + 1,
                source,
            })?;
        samples.push(sample);
    }
    Ok(samples)
}

pub fn iso_timestamp_now() -> String {
    Utc::now().to_rfc3339()
}

pub fn generate_run_id(engine: &str) -> String {
    let ts = Utc::now().format("%Y%m%dT%H%M%SZ");
    format!("{engine}-{ts}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_id_starts_with_engine_name() {
        let id = generate_run_id("openai");
        assert!(id.starts_with("openai-"));
        assert!(id.ends_with('Z'));
        assert!(!id.contains(':'));
    }
}
