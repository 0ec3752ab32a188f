//! Engine abstraction and the name → constructor registry.

use crate::config::{ConfigError, EngineSettings};
use crate::engines::OpenAiEngine;
use crate::error::Result;
use crate::types::{CompileStatus, DecodingStatus, Schema, TokenUsage};
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Everything an engine reports about one generation call.
#[derive(Debug, Clone, Default)]
pub struct EngineOutput {
    pub output: Option<String>,
    pub token_usage: TokenUsage,
    pub compile_status: CompileStatus,
    pub decoding_status: DecodingStatus,
    pub grammar_compile_end: Option<f64>,
    pub first_token_arrival: Option<f64>,
    pub system_fingerprint: Option<String>,
}

/// A constrained-decoding backend.
///
/// `generate` never fails: transport problems, timeouts and rejected schemas
/// are reported through the compile and decoding statuses so the sample can
/// still be scored.
#[async_trait]
pub trait Engine: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, prompt: &str, schema: &Schema) -> EngineOutput;

    /// Rewrite a schema into the dialect this engine accepts.
    fn adapt_schema(&self, schema: Schema) -> Schema {
        schema
    }

    fn max_context_length(&self) -> Option<usize> {
        None
    }

    async fn close(&self) {}
}

pub type EngineConstructor = Box<dyn Fn(&EngineSettings) -> Result<Box<dyn Engine>> + Send + Sync>;

/// Explicit registry of engine constructors keyed by configuration name.
pub struct EngineRegistry {
    constructors: BTreeMap<String, EngineConstructor>,
}

impl Default for EngineRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self {
            constructors: BTreeMap::new(),
        }
    }

    /// Registry preloaded with the HTTP engines shipped in this crate.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register("openai", |settings| {
            Ok(Box::new(OpenAiEngine::openai(settings)?) as Box<dyn Engine>)
        });
        registry.register("gemini", |settings| {
            Ok(Box::new(OpenAiEngine::gemini(settings)?) as Box<dyn Engine>)
        });
        registry
    }

    pub fn register<F>(&mut self, name: impl Into<String>, constructor: F)
    where
        F: Fn(&EngineSettings) -> Result<Box<dyn Engine>> + Send + Sync + 'static,
    {
        self.constructors.insert(name.into(), Box::new(constructor));
    }

    pub fn names(&self) -> Vec<&str> {
        self.constructors.keys().map(String::as_str).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    pub fn create(&self, name: &str, settings: &EngineSettings) -> Result<Box<dyn Engine>> {
        match self.constructors.get(name) {
            Some(constructor) => constructor(settings),
            None => Err(ConfigError::Invalid(format!(
                "unknown engine '{name}' (available: {})",
                self.names().join(", ")
            ))
            .into()),
        }
    }
}
