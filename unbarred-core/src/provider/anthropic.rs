//! Anthropic Messages API provider.
//!
//! Streams completions over server-sent events and relays each text delta
//! to the caller as soon as its line is complete.

use super::types::*;
use crate::config::LlmConfig;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Anthropic HTTP API provider.
#[derive(Debug, Clone)]
pub struct AnthropicProvider {
    base_url: String,
    api_key: String,
    api_version: String,
    http_client: reqwest::Client,
}

impl AnthropicProvider {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            api_version: config.api_version.clone(),
            http_client,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.base_url)
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(self.api_key.trim())
                .map_err(|_| ProviderError::Api("invalid API key".to_string()))?,
        );
        headers.insert(
            "anthropic-version",
            HeaderValue::from_str(&self.api_version)
                .map_err(|_| ProviderError::Api("invalid API version".to_string()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    async fn send(&self, request: &ChatRequest, stream: bool) -> Result<reqwest::Response> {
        let body = MessagesRequest {
            model: &request.model,
            messages: &request.messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            stream,
        };

        let response = self
            .http_client
            .post(self.endpoint())
            .headers(self.headers()?)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            warn!(%status, body = %error_text, "Anthropic returned an error");
            return Err(ProviderError::Api(format!("status {}", status)));
        }

        Ok(response)
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    async fn chat<'a>(
        &'a self,
        request: ChatRequest,
        mut callback: Box<dyn FnMut(ChatResponse) + Send + 'a>,
    ) -> Result<()> {
        let response = self.send(&request, true).await?;

        let mut stream = response.bytes_stream();
        let mut buffer = Vec::new();

        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result?;
            buffer.extend_from_slice(&chunk);

            while let Some(newline_pos) = buffer.iter().position(|&b| b == b'\n') {
                let line = buffer.drain(..=newline_pos).collect::<Vec<_>>();
                let line_str = String::from_utf8_lossy(&line);

                match parse_event_line(line_str.trim_end())? {
                    Some(StreamEvent::Text(text)) => callback(ChatResponse::fragment(text)),
                    Some(StreamEvent::Stop) => {
                        callback(ChatResponse::done());
                        return Ok(());
                    }
                    None => {}
                }
            }
        }

        debug!("Event stream closed without message_stop");
        callback(ChatResponse::done());
        Ok(())
    }

    async fn complete(&self, request: ChatRequest) -> Result<String> {
        let response = self.send(&request, false).await?;
        let parsed: MessagesResponse = response.json().await?;

        let answer = parsed
            .content
            .into_iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
                ContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n");

        if answer.trim().is_empty() {
            return Err(ProviderError::Malformed("response missing text content".to_string()));
        }
        Ok(answer.trim().to_string())
    }
}

/// Decoded server-sent event relevant to the caller.
#[derive(Debug, PartialEq)]
enum StreamEvent {
    Text(String),
    Stop,
}

/// Decodes one SSE line. Only `data:` lines carry payloads; the `type` field
/// inside the JSON is authoritative, so `event:` lines are skipped.
fn parse_event_line(line: &str) -> Result<Option<StreamEvent>> {
    let Some(data) = line.strip_prefix("data:") else {
        return Ok(None);
    };
    let data = data.trim();
    if data.is_empty() {
        return Ok(None);
    }

    let event: SseData = serde_json::from_str(data)?;
    match event {
        SseData::ContentBlockDelta { delta } => match delta {
            Delta::TextDelta { text } if !text.is_empty() => Ok(Some(StreamEvent::Text(text))),
            _ => Ok(None),
        },
        SseData::MessageStop => Ok(Some(StreamEvent::Stop)),
        SseData::Error { error } => Err(ProviderError::Api(error.message)),
        SseData::Other => Ok(None),
    }
}

// Anthropic-specific request/response types (internal)

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    max_tokens: u32,
    temperature: f64,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum SseData {
    ContentBlockDelta {
        delta: Delta,
    },
    MessageStop,
    Error {
        error: ApiErrorBody,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Delta {
    TextDelta {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}
