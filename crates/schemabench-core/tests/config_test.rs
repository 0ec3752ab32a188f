//! Tests for the config module.

use schemabench_core::config::{
    interpolate_env_vars, load_config, load_config_with_overrides, ConfigOverrides,
};
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

#[test]
fn test_env_interpolation_basic() {
    std::env::set_var("SB_TEST_VAR_123", "hello");
    let result = interpolate_env_vars("value: ${SB_TEST_VAR_123}");
    assert_eq!(result, "value: hello");
    std::env::remove_var("SB_TEST_VAR_123");
}

#[test]
fn test_env_interpolation_with_default() {
    std::env::remove_var("SB_NONEXISTENT_VAR_XYZ");
    let result = interpolate_env_vars("value: ${SB_NONEXISTENT_VAR_XYZ:-default_value}");
    assert_eq!(result, "value: default_value");
}

#[test]
fn test_env_interpolation_missing_no_default() {
    std::env::remove_var("SB_NONEXISTENT_VAR_ABC");
    let result = interpolate_env_vars("value: ${SB_NONEXISTENT_VAR_ABC}");
    assert_eq!(result, "value: ");
}

#[test]
fn load_config_requires_tasks() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "engine: openai\ntasks: []").unwrap();

    let err = load_config(Some(file.path())).unwrap_err();
    assert!(format!("{err}").contains("at least one task"));
}

#[test]
fn load_config_applies_defaults() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "tasks: [Github_easy]").unwrap();

    let cfg = load_config(Some(file.path())).unwrap();
    assert_eq!(cfg.engine, "openai");
    assert_eq!(cfg.tasks, vec!["Github_easy"]);
    assert_eq!(cfg.limit, None);
    assert_eq!(cfg.concurrency, 1);
    assert!(cfg.save_results);
    assert_eq!(cfg.engine_settings.model, "gpt-4o-mini");
    assert_eq!(cfg.engine_settings.timeout_seconds, 60.0);
    assert_eq!(cfg.engine_settings.max_tokens, None);
}

#[test]
fn load_config_reads_nested_engine_settings() {
    std::env::set_var("SB_TEST_MODEL", "gemini-2.0-flash");
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
engine: gemini
tasks: [Snowplow, Github_easy]
limit: 5
engine_settings:
  model: ${{SB_TEST_MODEL}}
  max_tokens: 2048
  temperature: 0.0
"#
    )
    .unwrap();

    let cfg = load_config(Some(file.path())).unwrap();
    std::env::remove_var("SB_TEST_MODEL");
    assert_eq!(cfg.engine, "gemini");
    assert_eq!(cfg.limit, Some(5));
    assert_eq!(cfg.engine_settings.model, "gemini-2.0-flash");
    assert_eq!(cfg.engine_settings.max_tokens, Some(2048));
    assert_eq!(cfg.engine_settings.temperature, 0.0);
}

#[test]
fn overrides_win_over_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "tasks: [Snowplow]\nconcurrency: 2\nlimit: 10").unwrap();

    let cfg = load_config_with_overrides(
        Some(file.path()),
        ConfigOverrides {
            tasks: Some(vec!["Github_hard".into()]),
            limit: Some(3),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(cfg.tasks, vec!["Github_hard"]);
    assert_eq!(cfg.limit, Some(3));
    assert_eq!(cfg.concurrency, 2);
}

#[test]
fn no_file_uses_overrides_only() {
    let cfg = load_config_with_overrides(
        None,
        ConfigOverrides {
            tasks: Some(vec!["Kubernetes".into()]),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(cfg.tasks, vec!["Kubernetes"]);
    assert_eq!(cfg.dataset_path(), PathBuf::from("./data"));
}

#[test]
fn zero_concurrency_is_rejected() {
    let err = load_config_with_overrides(
        None,
        ConfigOverrides {
            tasks: Some(vec!["Kubernetes".into()]),
            concurrency: Some(0),
            ..Default::default()
        },
    )
    .unwrap_err();
    assert!(err.to_string().contains("concurrency"));
}

#[test]
fn relative_dirs_resolve_against_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bench.yaml");
    std::fs::write(&path, "tasks: [Snowplow]\ndataset_dir: data\n").unwrap();

    let cfg = load_config(Some(&path)).unwrap();
    assert_eq!(cfg.dataset_path(), dir.path().join("data"));
    assert_eq!(cfg.runs_path(), dir.path().join("./runs"));
}
