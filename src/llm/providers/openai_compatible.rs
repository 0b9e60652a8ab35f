use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;

use crate::agent_engine::event_bus::{AgentMessage, EventBus};
use crate::errors::{PilotError, PilotResult};
use crate::llm::provider::LlmProvider;
use crate::llm::sse_parser;
use crate::llm::types::{CallConfig, ChatMessage, LlmResponse, StreamChunkKind};

pub struct OpenAiCompatibleProvider {
    id: String,
    api_base: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatibleProvider {
    pub fn new(id: String, api_base: String, api_key: String, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            id,
            api_base,
            api_key,
            client,
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.id
    }

    async fn chat(
        &self,
        messages: Vec<ChatMessage>,
        cfg: &CallConfig,
        bus: &EventBus,
    ) -> PilotResult<LlmResponse> {
        let body = request_body(&messages, cfg)?;

        tracing::debug!(
            provider = %self.id,
            model = %cfg.model,
            stream = cfg.stream,
            messages = messages.len(),
            "sending LLM request"
        );
        tracing::debug!(body = %sanitized_for_log(&body), "request body (sanitized, base64 omitted)");

        let mut request = self.client.post(&self.api_base).json(&body);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }
        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let err_body = response.text().await.unwrap_or_default();
            return Err(PilotError::LlmProvider(format!("{}: {}", status, err_body)));
        }

        if cfg.stream {
            self.handle_stream(response, bus).await
        } else {
            self.handle_json(response).await
        }
    }
}

impl OpenAiCompatibleProvider {
    /// Handle SSE streaming response.
    /// Forwards chunks to the event bus and accumulates the full response to return.
    async fn handle_stream(
        &self,
        response: reqwest::Response,
        bus: &EventBus,
    ) -> PilotResult<LlmResponse> {
        let mut byte_stream = response.bytes_stream();
        let mut pending: Vec<u8> = Vec::new();
        let mut resp = LlmResponse::default();

        'stream: while let Some(result) = byte_stream.next().await {
            pending.extend_from_slice(&result?);

            for line in take_complete_lines(&mut pending) {
                if apply_sse_line(&line, &mut resp, bus) {
                    break 'stream;
                }
            }
        }
        if !pending.is_empty() {
            let tail = String::from_utf8_lossy(&pending).trim().to_string();
            apply_sse_line(&tail, &mut resp, bus);
        }

        tracing::info!(
            content_len = resp.content.len(),
            reasoning_len = resp.reasoning.len(),
            "LLM stream complete"
        );
        Ok(resp)
    }

    /// Handle a non-streaming JSON response.
    async fn handle_json(&self, response: reqwest::Response) -> PilotResult<LlmResponse> {
        let json: serde_json::Value = response.json().await?;
        let resp = parse_completion(&json)?;
        tracing::info!(content_len = resp.content.len(), "LLM JSON response received");
        Ok(resp)
    }
}

/// Splits off every complete `\n`-terminated line. A multibyte character cut
/// by a chunk boundary stays in `pending` until its line is complete.
fn take_complete_lines(pending: &mut Vec<u8>) -> Vec<String> {
    let Some(last_newline) = pending.iter().rposition(|b| *b == b'\n') else {
        return Vec::new();
    };
    let rest = pending.split_off(last_newline + 1);
    let complete = std::mem::replace(pending, rest);
    complete
        .split(|b| *b == b'\n')
        .map(|line| String::from_utf8_lossy(line).trim().to_string())
        .filter(|line| !line.is_empty())
        .collect()
}

/// Folds one SSE line into `resp`. Returns true at end of stream.
fn apply_sse_line(line: &str, resp: &mut LlmResponse, bus: &EventBus) -> bool {
    match sse_parser::parse_sse_line(line) {
        Ok(Some(chunk)) => {
            match chunk.kind {
                StreamChunkKind::Reasoning => resp.reasoning.push_str(&chunk.content),
                StreamChunkKind::Content => resp.content.push_str(&chunk.content),
                StreamChunkKind::Done => {}
            }
            let done = chunk.kind == StreamChunkKind::Done;
            bus.publish(AgentMessage::InferenceChunk(chunk));
            done
        }
        Ok(None) => false,
        Err(e) => {
            tracing::debug!("SSE parse skipped: {e}");
            false
        }
    }
}

fn request_body(messages: &[ChatMessage], cfg: &CallConfig) -> PilotResult<serde_json::Value> {
    Ok(serde_json::json!({
        "model": cfg.model,
        "messages": serde_json::to_value(messages)?,
        "stream": cfg.stream,
        "temperature": cfg.temperature,
        "top_p": cfg.top_p,
        "n": 1,
    }))
}

fn parse_completion(json: &serde_json::Value) -> PilotResult<LlmResponse> {
    let message = &json["choices"][0]["message"];
    let content = message["content"].as_str().ok_or_else(|| {
        PilotError::LlmProvider(format!("no content in completion: {json}"))
    })?;
    Ok(LlmResponse {
        content: content.to_string(),
        reasoning: message["reasoning_content"].as_str().unwrap_or("").to_string(),
    })
}

/// Copy of the request body with image payloads replaced, for logging only.
fn sanitized_for_log(body: &serde_json::Value) -> String {
    let mut log_body = body.clone();
    if let Some(msgs) = log_body.get_mut("messages").and_then(|m| m.as_array_mut()) {
        for msg in msgs {
            let Some(parts) = msg.get_mut("content").and_then(|c| c.as_array_mut()) else {
                continue;
            };
            for part in parts {
                if part.get("type").and_then(|t| t.as_str()) == Some("image_url") {
                    if let Some(url) = part.get_mut("image_url").and_then(|i| i.get_mut("url")) {
                        *url = serde_json::Value::String("<omitted_base64_image>".to_string());
                    }
                }
            }
        }
    }
    serde_json::to_string(&log_body).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cfg() -> CallConfig {
        CallConfig {
            model: "AgentCPM-GUI".into(),
            stream: false,
            temperature: 0.1,
            top_p: 0.3,
        }
    }

    #[test]
    fn body_carries_sampling_params() {
        let body = request_body(&[ChatMessage::system("rules")], &cfg()).unwrap();
        assert_eq!(body["model"], "AgentCPM-GUI");
        assert_eq!(body["temperature"], 0.1);
        assert_eq!(body["top_p"], 0.3);
        assert_eq!(body["n"], 1);
        assert_eq!(body["messages"][0]["role"], "system");
    }

    #[test]
    fn log_copy_omits_images() {
        let msgs = vec![ChatMessage::user_with_image("q", "data:image/png;base64,SECRETPIXELS")];
        let body = request_body(&msgs, &cfg()).unwrap();
        let logged = sanitized_for_log(&body);
        assert!(!logged.contains("SECRETPIXELS"));
        assert!(logged.contains("<omitted_base64_image>"));
        assert_eq!(
            body["messages"][0]["content"][1]["image_url"]["url"],
            "data:image/png;base64,SECRETPIXELS"
        );
    }

    #[test]
    fn parses_completion_content() {
        let resp = parse_completion(&json!({
            "choices": [{"message": {"role": "assistant", "content": "{\"PRESS\":\"BACK\"}"}}]
        }))
        .unwrap();
        assert_eq!(resp.content, "{\"PRESS\":\"BACK\"}");
        assert!(resp.reasoning.is_empty());
    }

    #[test]
    fn missing_content_is_provider_error() {
        let err = parse_completion(&json!({"error": {"message": "overloaded"}})).unwrap_err();
        assert!(matches!(err, PilotError::LlmProvider(_)));
    }

    #[test]
    fn split_multibyte_characters_are_reassembled() {
        let line = "data: {\"choices\":[{\"delta\":{\"content\":\"李子柒\"}}]}\n".as_bytes();
        let cut = line.iter().position(|b| *b >= 0x80).unwrap() + 1;

        let bus = EventBus::new();
        let mut resp = LlmResponse::default();
        let mut pending = Vec::new();
        for part in [&line[..cut], &line[cut..], b"data: [DONE]\n".as_slice()] {
            pending.extend_from_slice(part);
            for l in take_complete_lines(&mut pending) {
                apply_sse_line(&l, &mut resp, &bus);
            }
        }
        assert_eq!(resp.content, "李子柒");
        assert!(pending.is_empty());
    }

    #[test]
    fn partial_line_is_kept_for_next_chunk() {
        let mut pending = b"data: one\ndata: tw".to_vec();
        assert_eq!(take_complete_lines(&mut pending), vec!["data: one".to_string()]);
        assert_eq!(pending, b"data: tw".to_vec());
        assert!(take_complete_lines(&mut pending).is_empty());
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_http_error() {
        let provider = OpenAiCompatibleProvider::new(
            "local".into(),
            "http://127.0.0.1:9/v1/chat/completions".into(),
            String::new(),
            Duration::from_secs(2),
        );
        let bus = EventBus::new();
        let err = provider
            .chat(vec![ChatMessage::system("rules")], &cfg(), &bus)
            .await
            .unwrap_err();
        assert!(matches!(err, PilotError::Http(_)));
    }
}
