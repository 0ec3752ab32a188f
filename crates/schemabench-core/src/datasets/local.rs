use super::{prepare_item, DatasetItem, DatasetLoader};
use crate::error::{Result, SchemaBenchError};
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Reads `<root>/<task>.jsonl`.
pub struct LocalDataset {
    root: PathBuf,
}

impl LocalDataset {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn task_path(&self, task: &str) -> PathBuf {
        self.root.join(format!("{task}.jsonl"))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl DatasetLoader for LocalDataset {
    fn load(&self, task: &str, limit: Option<usize>) -> Result<Vec<DatasetItem>> {
        let path = self.task_path(task);
        let file = File::open(&path)
            .map_err(|e| SchemaBenchError::dataset(task, format!("{}: {e}", path.display())))?;
        let reader = BufReader::new(file);

        let mut items = Vec::new();
        let mut skipped = 0usize;
        for (idx, line) in reader.lines().enumerate() {
            if limit.is_some_and(|limit| items.len() >= limit) {
                break;
            }
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let item = match serde_json::from_str::<Value>(&line) {
                Ok(Value::Object(map)) => prepare_item(&map, format!("{task}-{idx}")),
                _ => None,
            };
            match item {
                Some(item) => items.push(item),
                None => {
                    skipped += 1;
                    warn!(task, line = idx + 1, "skipping undecodable dataset record");
                }
            }
        }

        info!(task, items = items.len(), skipped, path = %path.display(), "loaded dataset");
        Ok(items)
    }
}
