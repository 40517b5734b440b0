//! OpenAI-compatible `/chat/completions` client.
//!
//! One `HttpClient` wraps one configured model endpoint. Streaming requests
//! use server-sent events and ask the endpoint to append usage totals to the
//! final increment (`stream_options.include_usage`); summarization uses the
//! non-streaming JSON-object mode.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use colloquy_core::config::ModelConfig;
use colloquy_core::types::{Message, ToolDefinition, UsageInfo};

use crate::traits::{
    CallFragment, ChatClient, ChatStream, ClientError, Completion, ResponseDelta,
};

// ─────────────────────────────────────────────
// HttpClient
// ─────────────────────────────────────────────

/// Talks to any OpenAI-compatible HTTP endpoint.
pub struct HttpClient {
    client: reqwest::Client,
    config: ModelConfig,
    max_tokens: u32,
    temperature: f64,
    extra_headers: HeaderMap,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("name", &self.config.name)
            .field("api_base", &self.config.api_base)
            .field("model", &self.config.model)
            .finish()
    }
}

impl HttpClient {
    /// Create a client for one configured endpoint.
    pub fn new(config: ModelConfig, max_tokens: u32, temperature: f64) -> Self {
        let mut extra_headers = HeaderMap::new();
        if let Some(ref headers) = config.extra_headers {
            for (key, value) in headers {
                if let (Ok(name), Ok(val)) = (
                    HeaderName::from_bytes(key.as_bytes()),
                    HeaderValue::from_str(value),
                ) {
                    extra_headers.insert(name, val);
                } else {
                    warn!("Invalid header: {}={}", key, value);
                }
            }
        }

        let client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("Failed to build HTTP client");

        HttpClient {
            client,
            config,
            max_tokens,
            temperature,
            extra_headers,
        }
    }

    /// Build the full chat completions URL.
    fn completions_url(&self) -> String {
        let base = self.config.api_base.trim_end_matches('/');
        format!("{}/chat/completions", base)
    }

    async fn post(
        &self,
        body: &ChatRequest<'_>,
    ) -> Result<reqwest::Response, ClientError> {
        let url = self.completions_url();
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .headers(self.extra_headers.clone())
            .json(body)
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read error body".to_string());
            return Err(ClientError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl ChatClient for HttpClient {
    async fn stream_chat(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<ChatStream, ClientError> {
        debug!(
            endpoint = %self.config.name,
            model = %self.config.model,
            messages = messages.len(),
            tools = tools.len(),
            "streaming chat request"
        );

        let body = ChatRequest {
            model: &self.config.model,
            messages,
            tools: if tools.is_empty() { None } else { Some(tools) },
            tool_choice: if tools.is_empty() { None } else { Some("auto") },
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            stream: Some(true),
            stream_options: Some(StreamOptions {
                include_usage: true,
            }),
            response_format: None,
        };

        let response = self.post(&body).await?;
        let mut bytes = Box::pin(response.bytes_stream());

        let stream = async_stream::stream! {
            // Byte buffer so multi-byte characters split across network
            // chunks reassemble before any lossy decode.
            let mut buffer: Vec<u8> = Vec::new();
            'outer: while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(b) => b,
                    Err(e) => {
                        yield Err(ClientError::Network(e.to_string()));
                        return;
                    }
                };
                buffer.extend_from_slice(&chunk);

                while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
                    let line_bytes: Vec<u8> = buffer.drain(..=pos).collect();
                    let line = String::from_utf8_lossy(&line_bytes);
                    let line = line.trim();
                    if line.is_empty() || line.starts_with(':') {
                        continue;
                    }
                    let Some(data) = line.strip_prefix("data:") else {
                        continue;
                    };
                    let data = data.trim_start();
                    if data == "[DONE]" {
                        break 'outer;
                    }
                    match serde_json::from_str::<StreamChunk>(data) {
                        Ok(chunk) => yield Ok(chunk.into_delta()),
                        Err(e) => {
                            yield Err(ClientError::Protocol(format!(
                                "unparseable stream chunk: {e}"
                            )));
                            return;
                        }
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }

    async fn complete_json(&self, messages: &[Message]) -> Result<Completion, ClientError> {
        debug!(
            endpoint = %self.config.name,
            model = %self.config.model,
            messages = messages.len(),
            "structured completion request"
        );

        let body = ChatRequest {
            model: &self.config.model,
            messages,
            tools: None,
            tool_choice: None,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            stream: None,
            stream_options: None,
            response_format: Some(ResponseFormat {
                format_type: "json_object",
            }),
        };

        let response = self.post(&body).await?;
        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ClientError::Protocol(format!("unparseable response: {e}")))?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        let completion_tokens = parsed.usage.map_or(0, |u| u.completion_tokens);

        Ok(Completion {
            text,
            completion_tokens,
        })
    }

    fn name(&self) -> &str {
        &self.config.name
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }

    fn window(&self) -> u32 {
        self.config.window
    }
}

// ─────────────────────────────────────────────
// Wire types (OpenAI-compatible)
// ─────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [ToolDefinition]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
    max_tokens: u32,
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_options: Option<StreamOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct StreamOptions {
    include_usage: bool,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<UsageInfo>,
}

impl StreamChunk {
    fn into_delta(self) -> ResponseDelta {
        let mut delta = ResponseDelta {
            usage: self.usage,
            ..Default::default()
        };
        if let Some(choice) = self.choices.into_iter().next() {
            delta.content = choice.delta.content;
            delta.fragments = choice
                .delta
                .tool_calls
                .unwrap_or_default()
                .into_iter()
                .map(|tc| CallFragment {
                    slot: tc.index.unwrap_or(0),
                    id: tc.id,
                    name: tc.function.as_ref().and_then(|f| f.name.clone()),
                    arguments: tc.function.and_then(|f| f.arguments),
                })
                .collect();
        }
        delta
    }
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<StreamToolCall>>,
}

#[derive(Debug, Deserialize)]
struct StreamToolCall {
    index: Option<usize>,
    id: Option<String>,
    function: Option<StreamFn>,
}

#[derive(Debug, Deserialize)]
struct StreamFn {
    name: Option<String>,
    arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ResponseChoice>,
    usage: Option<UsageInfo>,
}

#[derive(Debug, Deserialize)]
struct ResponseChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
