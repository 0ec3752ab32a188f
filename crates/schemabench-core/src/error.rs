//! Unified error types.
//!
//! Scoring never produces these: malformed outputs and schemas are
//! [`EvaluationOutcome`](crate::types::EvaluationOutcome)s. Errors cover the
//! surrounding machinery (configuration, datasets, persistence, engines).

use crate::config::ConfigError;
use std::fmt::Display;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaBenchError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("dataset '{name}': {message}")]
    Dataset { name: String, message: String },

    #[error("engine error: {0}")]
    Engine(String),

    #[error("persistence error: {0}")]
    Persistence(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("malformed sample record at {path}:{line}: {source}")]
    MalformedRecord {
        path: String,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl SchemaBenchError {
    pub fn dataset(name: impl Into<String>, message: impl Display) -> Self {
        Self::Dataset {
            name: name.into(),
            message: message.to_string(),
        }
    }

    pub fn engine(message: impl Display) -> Self {
        Self::Engine(message.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SchemaBenchError>;
