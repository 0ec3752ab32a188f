//! Configuration loading and models for SchemaBench.
//!
//! Configuration is loaded via figment from multiple layers:
//! 1. YAML file (optional base configuration)
//! 2. Environment variables (SCHEMABENCH_ prefix, __ as nested separator)
//! 3. CLI overrides (passed programmatically)

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Figment(#[from] figment::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// DEFAULTS (all in one place)
// ============================================================================

fn default_engine() -> String {
    "openai".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> f64 {
    0.2
}

fn default_top_p() -> f64 {
    1.0
}

fn default_timeout_seconds() -> f64 {
    60.0
}

fn default_dataset_dir() -> String {
    "./data".to_string()
}

fn default_runs_dir() -> String {
    "./runs".to_string()
}

fn default_save_results() -> bool {
    true
}

fn default_close_engine() -> bool {
    true
}

fn default_concurrency() -> usize {
    1
}

// ============================================================================
// ENGINE SETTINGS
// ============================================================================

/// Settings handed to whichever engine constructor the registry selects.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineSettings {
    #[serde(default = "default_model")]
    pub model: String,
    /// Overrides the engine's default endpoint.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Name of the environment variable holding the API key.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_top_p")]
    pub top_p: f64,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: f64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: None,
            api_key_env: None,
            temperature: default_temperature(),
            top_p: default_top_p(),
            max_tokens: None,
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

// ============================================================================
// BENCH CONFIG
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BenchConfig {
    #[serde(default = "default_engine")]
    pub engine: String,
    #[serde(default)]
    pub tasks: Vec<String>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default = "default_dataset_dir")]
    pub dataset_dir: String,
    #[serde(default = "default_runs_dir")]
    pub runs_dir: String,
    #[serde(default = "default_save_results")]
    pub save_results: bool,
    #[serde(default = "default_close_engine")]
    pub close_engine: bool,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default)]
    pub engine_settings: EngineSettings,
    /// Directory relative paths are resolved against (the config file's).
    #[serde(skip)]
    pub root_dir: Option<PathBuf>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            engine: default_engine(),
            tasks: Vec::new(),
            limit: None,
            dataset_dir: default_dataset_dir(),
            runs_dir: default_runs_dir(),
            save_results: default_save_results(),
            close_engine: default_close_engine(),
            concurrency: default_concurrency(),
            engine_settings: EngineSettings::default(),
            root_dir: None,
        }
    }
}

impl BenchConfig {
    pub fn dataset_path(&self) -> PathBuf {
        self.resolve(&self.dataset_dir)
    }

    pub fn runs_path(&self) -> PathBuf {
        self.resolve(&self.runs_dir)
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let p = expand_home(path);
        if p.is_absolute() {
            return p;
        }
        match &self.root_dir {
            Some(root) => root.join(p),
            None => p,
        }
    }
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(path)
}

// ============================================================================
// CLI OVERRIDES
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tasks: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dataset_dir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runs_dir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub save_results: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,
}

// ============================================================================
// LOADING
// ============================================================================

pub fn load_config(path: Option<&Path>) -> Result<BenchConfig, ConfigError> {
    load_config_with_overrides(path, ConfigOverrides::default())
}

pub fn load_config_with_overrides(
    path: Option<&Path>,
    overrides: ConfigOverrides,
) -> Result<BenchConfig, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(BenchConfig::default()));

    if let Some(path) = path {
        let contents = std::fs::read_to_string(path)?;
        figment = figment.merge(Yaml::string(&interpolate_env_vars(&contents)));
    }

    figment = figment
        .merge(Env::prefixed("SCHEMABENCH_").split("__"))
        .merge(Serialized::defaults(overrides));

    let mut cfg: BenchConfig = figment.extract()?;
    cfg.root_dir = path.and_then(|p| p.parent()).map(Path::to_path_buf);
    validate_config(&cfg)?;
    Ok(cfg)
}

static ENV_VAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}").expect("valid regex")
});

/// Expand `${VAR}` and `${VAR:-default}` references; unset variables without
/// a default become empty strings.
pub fn interpolate_env_vars(input: &str) -> String {
    ENV_VAR_RE
        .replace_all(input, |caps: &regex::Captures| {
            let default_val = caps.get(2).map(|m| m.as_str());
            std::env::var(&caps[1]).unwrap_or_else(|_| default_val.unwrap_or("").to_string())
        })
        .to_string()
}

fn validate_config(cfg: &BenchConfig) -> Result<(), ConfigError> {
    if cfg.engine.trim().is_empty() {
        return Err(ConfigError::Invalid("engine name must not be empty".into()));
    }
    if cfg.tasks.is_empty() {
        return Err(ConfigError::Invalid("at least one task is required".into()));
    }
    if cfg.tasks.iter().any(|t| t.trim().is_empty()) {
        return Err(ConfigError::Invalid("task names must not be empty".into()));
    }
    if cfg.concurrency == 0 {
        return Err(ConfigError::Invalid("concurrency must be at least 1".into()));
    }
    if cfg.engine_settings.timeout_seconds <= 0.0 {
        return Err(ConfigError::Invalid("engine timeout must be positive".into()));
    }
    Ok(())
}
