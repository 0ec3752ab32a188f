use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn schemabench() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("schemabench"));
    cmd.env_remove("RUST_LOG");
    cmd
}

fn write_samples(path: &Path) {
    let schema = json!({
        "type": "object",
        "properties": {"a": {"type": "integer"}},
        "required": ["a"]
    });
    let lines = [
        json!({
            "task": "Github_easy",
            "input": "p",
            "output": "{\"a\": 1}",
            "schema": schema,
            "compile_status": {"code": "ok", "message": "ok"},
            "token_usage": {"input_tokens": 1000, "output_tokens": 20},
            "timestamps": {"request_start": 10.0, "first_token_arrival": 10.5, "request_end": 12.5}
        }),
        json!({
            "task": "Github_easy",
            "input": "p",
            "output": "{\"a\": \"x\"}",
            "schema": schema,
            "compile_status": {"code": "ok", "message": "ok"},
            "token_usage": {"input_tokens": 500, "output_tokens": 5}
        }),
        json!({"task": "Snowplow", "input": "p", "output": null}),
    ];
    let text: Vec<String> = lines.iter().map(|l| l.to_string()).collect();
    fs::write(path, text.join("\n")).unwrap();
}

#[test]
fn analyze_prints_score_table_with_missing_values() {
    let dir = tempdir().unwrap();
    let samples = dir.path().join("samples.jsonl");
    write_samples(&samples);

    schemabench()
        .arg("analyze")
        .arg("--outputs")
        .arg(&samples)
        .assert()
        .success()
        .stdout(predicate::str::contains("Declared coverage"))
        .stdout(predicate::str::contains("Github_easy"))
        .stdout(predicate::str::contains("Snowplow"))
        .stdout(predicate::str::contains("0.50"))
        .stdout(predicate::str::contains("n/a"))
        .stdout(predicate::str::contains("token usage: 1,500 input, 25 output."));
}

#[test]
fn analyze_outcomes_adds_breakdown() {
    let dir = tempdir().unwrap();
    let samples = dir.path().join("samples.jsonl");
    write_samples(&samples);

    schemabench()
        .args(["analyze", "--outcomes", "--outputs"])
        .arg(&samples)
        .assert()
        .success()
        .stdout(predicate::str::contains("SEMANTIC_ERROR"))
        .stdout(predicate::str::contains("SCHEMA_MISSING"));
}

#[test]
fn analyze_reports_malformed_line() {
    let dir = tempdir().unwrap();
    let samples = dir.path().join("samples.jsonl");
    fs::write(&samples, "{\"input\": \"p\", \"output\": null}\n{\"output\": \"{}\"}\n").unwrap();

    schemabench()
        .arg("analyze")
        .arg("--outputs")
        .arg(&samples)
        .assert()
        .failure()
        .stderr(predicate::str::contains(":2"));
}

#[test]
fn bench_with_unknown_engine_lists_available() {
    let dir = tempdir().unwrap();

    schemabench()
        .current_dir(dir.path())
        .args(["bench", "--engine", "nope", "--tasks", "Snowplow", "--no-save"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown engine 'nope'"))
        .stderr(predicate::str::contains("openai"));
}

#[test]
fn bench_without_tasks_fails_validation() {
    let dir = tempdir().unwrap();

    schemabench()
        .current_dir(dir.path())
        .args(["bench", "--engine", "openai"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("at least one task"));
}

#[test]
fn show_config_prints_resolved_yaml() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("schemabench.yaml");
    fs::write(
        &config_path,
        "engine: gemini\ntasks: [Snowplow]\nengine_settings:\n  model: gemini-2.0-flash\n",
    )
    .unwrap();

    schemabench()
        .arg("--config")
        .arg(&config_path)
        .args(["show-config", "--limit", "7"])
        .assert()
        .success()
        .stdout(predicate::str::contains("engine: gemini"))
        .stdout(predicate::str::contains("model: gemini-2.0-flash"))
        .stdout(predicate::str::contains("limit: 7"));
}
