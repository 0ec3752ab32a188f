//! Streaming adapter for OpenAI-compatible chat-completion endpoints.
//!
//! Structured output is requested through `response_format: json_schema` in
//! strict mode. The response is consumed as server-sent events so the arrival
//! of the first content token can be timed.

use crate::config::EngineSettings;
use crate::engine::{Engine, EngineOutput};
use crate::error::{Result, SchemaBenchError};
use crate::profile::now_seconds;
use crate::types::{
    CompileStatus, CompileStatusCode, DecodingStatus, DecodingStatusCode, Schema, TokenUsage,
};
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, warn};

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

const SCHEMA_NAME: &str = "output";

pub struct OpenAiEngine {
    name: String,
    client: Client,
    base_url: String,
    api_key: Option<String>,
    settings: EngineSettings,
}

impl OpenAiEngine {
    pub fn openai(settings: &EngineSettings) -> Result<Self> {
        Self::build("openai", settings, OPENAI_BASE_URL, "OPENAI_API_KEY")
    }

    pub fn gemini(settings: &EngineSettings) -> Result<Self> {
        Self::build("gemini", settings, GEMINI_BASE_URL, "GEMINI_API_KEY")
    }

    fn build(
        name: &str,
        settings: &EngineSettings,
        default_base_url: &str,
        default_key_env: &str,
    ) -> Result<Self> {
        let key_env = settings
            .api_key_env
            .clone()
            .unwrap_or_else(|| default_key_env.to_string());
        let api_key = std::env::var(&key_env).ok().filter(|k| !k.is_empty());
        if api_key.is_none() {
            warn!(engine = name, env = %key_env, "API key not set; requests are unauthenticated");
        }

        let base_url = settings
            .base_url
            .clone()
            .unwrap_or_else(|| default_base_url.to_string())
            .trim_end_matches('/')
            .to_string();

        let client = Client::builder()
            .connect_timeout(request_timeout(settings))
            .build()
            .map_err(SchemaBenchError::engine)?;

        Ok(Self {
            name: name.to_string(),
            client,
            base_url,
            api_key,
            settings: settings.clone(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn request_body(&self, prompt: &str, schema: &Schema) -> Value {
        let mut body = json!({
            "model": self.settings.model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": self.settings.temperature,
            "top_p": self.settings.top_p,
            "stream": true,
            "stream_options": {"include_usage": true},
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": SCHEMA_NAME,
                    "schema": schema,
                    "strict": true,
                },
            },
        });
        if let Some(max_tokens) = self.settings.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        body
    }
}

#[async_trait]
impl Engine for OpenAiEngine {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, prompt: &str, schema: &Schema) -> EngineOutput {
        let deadline = Instant::now() + request_timeout(&self.settings);
        let mut out = EngineOutput::default();

        let mut request = self
            .client
            .post(self.endpoint())
            .json(&self.request_body(prompt, schema));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = match timeout_at(deadline, request.send()).await {
            Err(_) => {
                out.compile_status = CompileStatus::new(
                    CompileStatusCode::CompileTimeout,
                    "no response before timeout",
                );
                return out;
            }
            Ok(Err(err)) => {
                warn!(engine = %self.name, error = %err, "request failed");
                out.compile_status =
                    CompileStatus::new(CompileStatusCode::UnknownError, err.to_string());
                return out;
            }
            Ok(Ok(response)) => response,
        };

        let status = response.status();
        if !status.is_success() {
            let body = timeout_at(deadline, response.text())
                .await
                .ok()
                .and_then(|r| r.ok())
                .unwrap_or_default();
            warn!(engine = %self.name, status = %status, "request rejected");
            out.compile_status = rejected_status(status, &body);
            return out;
        }
        out.compile_status = CompileStatus::ok();

        let mut stream = response.bytes_stream();
        let mut events = SseBuffer::default();
        let mut state = StreamState::default();

        let decoding = loop {
            let bytes = match timeout_at(deadline, stream.next()).await {
                Err(_) => {
                    break DecodingStatus::new(
                        DecodingStatusCode::DecodingTimeout,
                        "stream did not finish before timeout",
                    )
                }
                Ok(None) => {
                    break state
                        .feed(events.finish())
                        .unwrap_or_else(DecodingStatus::ok)
                }
                Ok(Some(Err(err))) => {
                    break DecodingStatus::new(DecodingStatusCode::UnknownError, err.to_string())
                }
                Ok(Some(Ok(bytes))) => bytes,
            };
            if let Some(status) = state.feed(events.push(&bytes)) {
                break status;
            }
        };

        debug!(engine = %self.name, deltas = state.content_deltas, "stream finished");
        state.finish(decoding, out)
    }

    /// Strict structured outputs reject open objects.
    fn adapt_schema(&self, mut schema: Schema) -> Schema {
        close_objects(&mut schema);
        schema
    }

    fn max_context_length(&self) -> Option<usize> {
        known_context_length(&self.settings.model)
    }
}

fn request_timeout(settings: &EngineSettings) -> Duration {
    Duration::try_from_secs_f64(settings.timeout_seconds).unwrap_or(Duration::from_secs(60))
}

fn rejected_status(status: StatusCode, body: &str) -> CompileStatus {
    let message = format!("HTTP {status}: {body}");
    if status == StatusCode::BAD_REQUEST {
        if body.contains("context_length") {
            CompileStatus::new(CompileStatusCode::PromptTooLong, message)
        } else {
            CompileStatus::new(CompileStatusCode::UnsupportedSchema, message)
        }
    } else {
        CompileStatus::new(CompileStatusCode::BadApiResponse, message)
    }
}

fn known_context_length(model: &str) -> Option<usize> {
    let model = model.strip_prefix("models/").unwrap_or(model);
    match model {
        "gemini-2.0-flash"
        | "gemini-2.0-flash-lite"
        | "gemini-1.5-flash"
        | "gemini-1.5-flash-8b" => Some(1_048_576),
        "gemini-1.5-pro" => Some(2_097_152),
        m if m.starts_with("gpt-4o") => Some(128_000),
        _ => None,
    }
}

/// Recursively set `additionalProperties: false` on every object schema.
fn close_objects(schema: &mut Value) {
    match schema {
        Value::Object(map) => {
            let is_object = match map.get("type") {
                Some(Value::String(t)) => t == "object",
                Some(Value::Array(types)) => types.iter().any(|t| t == "object"),
                _ => map.contains_key("properties"),
            };
            if is_object {
                map.insert("additionalProperties".to_string(), Value::Bool(false));
            }
            for (key, child) in map.iter_mut() {
                match key.as_str() {
                    "additionalProperties" | "const" | "enum" | "default" | "examples" => {}
                    // Keyword maps: keys are names, values are schemas.
                    "properties"
                    | "patternProperties"
                    | "$defs"
                    | "definitions"
                    | "dependentSchemas" => {
                        if let Value::Object(named) = child {
                            named.values_mut().for_each(close_objects);
                        }
                    }
                    _ => close_objects(child),
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(close_objects),
        _ => {}
    }
}

// ============================================================================
// STREAM DECODING
// ============================================================================

#[derive(Debug, PartialEq)]
enum SseEvent {
    Data(String),
    Done,
}

/// Splits a byte stream into server-sent `data:` payloads.
#[derive(Default)]
struct SseBuffer {
    pending: Vec<u8>,
}

impl SseBuffer {
    fn push(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.pending.extend_from_slice(bytes);
        let mut events = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            events.extend(parse_line(&line));
        }
        events
    }

    /// Flush a final line the server did not terminate with a newline.
    fn finish(&mut self) -> Vec<SseEvent> {
        let line = std::mem::take(&mut self.pending);
        parse_line(&line).into_iter().collect()
    }
}

fn parse_line(line: &[u8]) -> Option<SseEvent> {
    let line = String::from_utf8_lossy(line);
    let payload = line.trim().strip_prefix("data:")?.trim();
    if payload == "[DONE]" {
        Some(SseEvent::Done)
    } else if payload.is_empty() {
        None
    } else {
        Some(SseEvent::Data(payload.to_string()))
    }
}

#[derive(Deserialize)]
struct ChatChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    usage: Option<ChunkUsage>,
    #[serde(default)]
    system_fingerprint: Option<String>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Default, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChunkUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

#[derive(Default)]
struct StreamState {
    text: String,
    content_deltas: u64,
    first_token_arrival: Option<f64>,
    finish_reason: Option<String>,
    usage: Option<TokenUsage>,
    system_fingerprint: Option<String>,
}

impl StreamState {
    /// Apply decoded events; returns the terminal status once the stream is done
    /// or a chunk cannot be decoded.
    fn feed(&mut self, events: Vec<SseEvent>) -> Option<DecodingStatus> {
        for event in events {
            let payload = match event {
                SseEvent::Done => return Some(DecodingStatus::ok()),
                SseEvent::Data(payload) => payload,
            };
            let chunk: ChatChunk = match serde_json::from_str(&payload) {
                Ok(chunk) => chunk,
                Err(err) => {
                    return Some(DecodingStatus::new(
                        DecodingStatusCode::BadApiResponse,
                        format!("malformed chunk: {err}"),
                    ))
                }
            };
            self.apply(chunk);
        }
        None
    }

    fn apply(&mut self, chunk: ChatChunk) {
        if chunk.system_fingerprint.is_some() {
            self.system_fingerprint = chunk.system_fingerprint;
        }
        if let Some(usage) = chunk.usage {
            self.usage = Some(TokenUsage {
                input_tokens: usage.prompt_tokens,
                output_tokens: usage.completion_tokens,
                ff_output_tokens: 0,
            });
        }
        for choice in chunk.choices {
            if let Some(content) = choice.delta.content.filter(|c| !c.is_empty()) {
                if self.first_token_arrival.is_none() {
                    self.first_token_arrival = Some(now_seconds());
                }
                self.content_deltas += 1;
                self.text.push_str(&content);
            }
            if choice.finish_reason.is_some() {
                self.finish_reason = choice.finish_reason;
            }
        }
    }

    fn finish(self, decoding: DecodingStatus, mut out: EngineOutput) -> EngineOutput {
        out.decoding_status = match self.finish_reason.as_deref() {
            Some("length") if decoding.code == DecodingStatusCode::Ok => DecodingStatus::new(
                DecodingStatusCode::ExceedingMaxContext,
                "generation stopped at the token limit",
            ),
            _ => decoding,
        };
        // Servers that ignore include_usage: count content deltas instead.
        out.token_usage = self.usage.unwrap_or(TokenUsage {
            input_tokens: 0,
            output_tokens: self.content_deltas,
            ff_output_tokens: 0,
        });
        out.first_token_arrival = self.first_token_arrival;
        out.system_fingerprint = self.system_fingerprint;
        out.output = Some(self.text);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sse_buffer_handles_split_lines() {
        let mut buf = SseBuffer::default();
        assert!(buf.push(b"data: {\"a\"").is_empty());
        assert_eq!(
            buf.push(b":1}\n\n: keep-alive\ndata: [DONE]\n"),
            vec![SseEvent::Data("{\"a\":1}".into()), SseEvent::Done]
        );
    }

    #[test]
    fn unterminated_last_line_is_kept_at_stream_end() {
        let mut buf = SseBuffer::default();
        let mut state = StreamState::default();
        let first =
            buf.push(b"data: {\"choices\":[{\"delta\":{\"content\":\"{\\\"a\\\":\"}}]}\n\n");
        assert_eq!(state.feed(first), None);
        let last = buf.push(b"data: {\"choices\":[{\"delta\":{\"content\":\"1}\"}}]}");
        assert!(last.is_empty());

        let status = state.feed(buf.finish()).unwrap_or_else(DecodingStatus::ok);
        let out = state.finish(status, EngineOutput::default());
        assert_eq!(out.decoding_status.code, DecodingStatusCode::Ok);
        assert_eq!(out.output.as_deref(), Some("{\"a\":1}"));
        assert!(buf.finish().is_empty());
    }

    #[test]
    fn close_objects_reaches_nested_schemas() {
        let mut schema = json!({
            "type": "object",
            "properties": {
                "inner": {"type": "object", "properties": {"x": {"type": "integer"}}},
                "list": {"type": "array", "items": {"properties": {"y": {}}}}
            }
        });
        close_objects(&mut schema);
        assert_eq!(schema["additionalProperties"], json!(false));
        assert_eq!(schema["properties"]["inner"]["additionalProperties"], json!(false));
        assert_eq!(
            schema["properties"]["list"]["items"]["additionalProperties"],
            json!(false)
        );
        assert!(schema["properties"]["inner"]["properties"]["x"]
            .get("additionalProperties")
            .is_none());
    }

    #[test]
    fn close_objects_leaves_property_names_alone() {
        let mut schema = json!({
            "type": "object",
            "properties": {"properties": {"type": "string"}, "type": {"type": "string"}}
        });
        close_objects(&mut schema);
        let props = schema["properties"].as_object().unwrap();
        assert_eq!(props.len(), 2);
        assert!(props["properties"].get("additionalProperties").is_none());
    }

    #[test]
    fn length_finish_reason_maps_to_exceeding_context() {
        let mut state = StreamState::default();
        let events = vec![
            SseEvent::Data(
                r#"{"choices":[{"delta":{"content":"{\"a\""},"finish_reason":null}]}"#.into(),
            ),
            SseEvent::Data(r#"{"choices":[{"delta":{},"finish_reason":"length"}]}"#.into()),
            SseEvent::Done,
        ];
        let status = state.feed(events).unwrap();
        let out = state.finish(status, EngineOutput::default());
        assert_eq!(out.decoding_status.code, DecodingStatusCode::ExceedingMaxContext);
        assert_eq!(out.token_usage.output_tokens, 1);
        assert_eq!(out.output.as_deref(), Some("{\"a\""));
    }

    #[test]
    fn bad_request_with_context_error_is_prompt_too_long() {
        let status = rejected_status(StatusCode::BAD_REQUEST, "context_length_exceeded");
        assert_eq!(status.code, CompileStatusCode::PromptTooLong);
        let status = rejected_status(StatusCode::BAD_REQUEST, "invalid schema");
        assert_eq!(status.code, CompileStatusCode::UnsupportedSchema);
        let status = rejected_status(StatusCode::INTERNAL_SERVER_ERROR, "");
        assert_eq!(status.code, CompileStatusCode::BadApiResponse);
    }

    #[test]
    fn gemini_models_report_context_length() {
        assert_eq!(known_context_length("models/gemini-1.5-pro"), Some(2_097_152));
        assert_eq!(known_context_length("unknown-model"), None);
    }
}
