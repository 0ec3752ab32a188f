//! Tests for NDJSON sample storage and replay.

use schemabench_core::persistence::{load_samples, SampleStore};
use schemabench_core::{
    CompileStatus, CompileStatusCode, DecodingStatusCode, GenerationSample, SchemaBenchError,
    Timestamps,
};
use serde_json::json;
use std::fs;
use tempfile::tempdir;

#[test]
fn appended_samples_reload_in_order() {
    let dir = tempdir().unwrap();
    let store = SampleStore::new(dir.path().join("run-1")).unwrap();

    let mut first = GenerationSample::new("Github_easy", "p1", Some("{}".into()));
    first.id = Some("a".into());
    first.schema = Some(json!({"type": "object"}));
    first.compile_status = CompileStatus::ok();
    first.timestamps = Some(Timestamps {
        request_start: 1.0,
        grammar_compile_end: None,
        first_token_arrival: Some(1.5),
        request_end: 2.0,
    });
    let second = GenerationSample::new("Github_easy", "p2", None);

    store.append(&first).unwrap();
    store.append(&second).unwrap();

    let loaded = store.load().unwrap();
    assert_eq!(loaded, vec![first, second]);
    assert!(store.samples_path().starts_with(store.run_dir()));
}

#[test]
fn empty_store_loads_nothing() {
    let dir = tempdir().unwrap();
    let store = SampleStore::new(dir.path()).unwrap();
    assert!(store.load().unwrap().is_empty());
}

#[test]
fn minimal_record_defaults_every_optional_field() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("samples.jsonl");
    fs::write(&path, "{\"input\": \"p\", \"output\": null}\n\n").unwrap();

    let samples = load_samples(&path).unwrap();
    assert_eq!(samples.len(), 1);
    let s = &samples[0];
    assert_eq!(s.output, None);
    assert_eq!(s.schema, None);
    assert_eq!(s.timestamps, None);
    assert_eq!(s.perf_metrics, None);
    assert_eq!(s.compile_status.code, CompileStatusCode::Pending);
    assert_eq!(s.compile_status.message, "unknown");
    assert_eq!(s.decoding_status.code, DecodingStatusCode::Pending);
    assert_eq!(s.token_usage.output_tokens, 0);
}

#[test]
fn record_without_input_fails_with_line_number() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("samples.jsonl");
    fs::write(
        &path,
        "{\"input\": \"p\", \"output\": \"{}\"}\n{\"output\": \"{}\"}\n",
    )
    .unwrap();

    let err = load_samples(&path).unwrap_err();
    match err {
        SchemaBenchError::MalformedRecord { line, .. } => assert_eq!(line, 2),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn record_without_output_key_fails() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("samples.jsonl");
    fs::write(&path, "{\"input\": \"p\"}\n").unwrap();
    assert!(load_samples(&path).is_err());
}

#[test]
fn summary_is_written_next_to_samples() {
    let dir = tempdir().unwrap();
    let store = SampleStore::new(dir.path()).unwrap();
    store.write_summary(&json!({"engine": "openai"})).unwrap();
    let text = fs::read_to_string(dir.path().join("summary.json")).unwrap();
    assert!(text.contains("openai"));
}
