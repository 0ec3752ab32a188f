//! Dataset loaders.
//!
//! A task is one split of JSON Schemas; each record carries its schema in the
//! [`DATASET_SCHEMA_COLUMN`] column.

use crate::error::Result;
use crate::prompts::FormatPrompt;
use crate::types::Schema;
use serde_json::{Map, Value};

mod local;
pub use local::LocalDataset;

pub const DATASET_SCHEMA_COLUMN: &str = "json_schema";

/// One schema to benchmark.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetItem {
    pub id: String,
    pub schema: Schema,
}

impl DatasetItem {
    pub fn prompt(&self, format_prompt: FormatPrompt) -> String {
        format_prompt(&self.schema)
    }
}

pub trait DatasetLoader: Send + Sync {
    fn load(&self, task: &str, limit: Option<usize>) -> Result<Vec<DatasetItem>>;
}

/// Build an item from one decoded record, or `None` when the schema column
/// is missing or holds undecodable text.
fn prepare_item(record: &Map<String, Value>, fallback_id: String) -> Option<DatasetItem> {
    let schema = match record.get(DATASET_SCHEMA_COLUMN)? {
        Value::String(text) => serde_json::from_str(text).ok()?,
        other => other.clone(),
    };

    let id = record
        .get("unique_id")
        .or_else(|| record.get("id"))
        .and_then(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .unwrap_or(fallback_id);

    Some(DatasetItem { id, schema })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn schema_column_accepts_text_or_object() {
        let text = record(json!({"json_schema": "{\"type\": \"string\"}", "unique_id": "a"}));
        let inline = record(json!({"json_schema": {"type": "string"}, "id": 7}));
        let a = prepare_item(&text, "x-0".into()).unwrap();
        let b = prepare_item(&inline, "x-1".into()).unwrap();
        assert_eq!(a.schema, b.schema);
        assert_eq!(a.id, "a");
        assert_eq!(b.id, "7");
    }

    #[test]
    fn missing_id_uses_fallback() {
        let item = prepare_item(&record(json!({"json_schema": true})), "task-3".into()).unwrap();
        assert_eq!(item.id, "task-3");
        assert!(prepare_item(&record(json!({"schema": {}})), "task-4".into()).is_none());
    }
}
