//! Anthropic messages API over server-sent events

use crate::provider::{LlmError, LlmProvider, LlmResult, LlmStream};
use crate::types::{merge_consecutive_roles, LlmMessage, LlmRequest, LlmTool, StreamDelta, ToolChoice, Usage};
use futures::StreamExt;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_RETRY_AFTER_MS: u64 = 60_000;

pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: ANTHROPIC_API_URL.to_string(),
        }
    }

    /// Full messages endpoint URL, e.g. a proxy in front of the API.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

#[async_trait::async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str { "anthropic" }

    async fn complete_stream(&self, request: LlmRequest) -> LlmResult<LlmStream> {
        let body = MessagesBody::from(&request);
        debug!(model = %body.model, messages = body.messages.len(), "Sending messages request");

        let response = self
            .client
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let retry_after_ms = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(|secs| secs * 1000);
            let text = response.text().await.unwrap_or_default();
            error!("Anthropic error {}: {}", status, text);
            return Err(status_error(status, text, retry_after_ms));
        }

        Ok(Box::pin(parse_sse_stream(response.bytes_stream())))
    }
}

fn status_error(status: StatusCode, text: String, retry_after_ms: Option<u64>) -> LlmError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => LlmError::AuthFailed(text),
        StatusCode::TOO_MANY_REQUESTS => LlmError::RateLimited {
            retry_after_ms: retry_after_ms.unwrap_or(DEFAULT_RETRY_AFTER_MS),
        },
        _ => LlmError::RequestFailed(format!("{}: {}", status, text)),
    }
}

// ============================================================
// Request body
// ============================================================

#[derive(Serialize)]
struct MessagesBody<'a> {
    model: &'a str,
    messages: Vec<LlmMessage>,
    max_tokens: u32,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [LlmTool]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'a ToolChoice>,
}

impl<'a> From<&'a LlmRequest> for MessagesBody<'a> {
    fn from(request: &'a LlmRequest) -> Self {
        Self {
            model: &request.model,
            messages: merge_consecutive_roles(&request.messages),
            max_tokens: request.max_tokens.unwrap_or(4096),
            stream: true,
            system: request.system.as_deref(),
            temperature: request.temperature,
            tools: request.tools.as_deref(),
            tool_choice: request.tool_choice.as_ref(),
        }
    }
}

// ============================================================
// Event stream
// ============================================================

/// Splits a byte stream into SSE frames. A frame, or a single multi-byte
/// character, may span chunks; bytes are decoded only once a frame is complete.
#[derive(Default)]
struct FrameBuffer {
    pending: Vec<u8>,
}

impl FrameBuffer {
    /// Feed one chunk and return the `data:` payload of every completed frame.
    fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut payloads = Vec::new();
        while let Some(end) = self.pending.windows(2).position(|w| w == b"\n\n") {
            let frame: Vec<u8> = self.pending.drain(..end + 2).collect();
            let frame = String::from_utf8_lossy(&frame);
            let data: Vec<&str> = frame.lines().filter_map(|l| l.strip_prefix("data: ")).collect();
            if !data.is_empty() {
                payloads.push(data.join("\n"));
            }
        }
        payloads
    }
}

/// The event payloads this client acts on. Every payload carries its own
/// `type`, so the `event:` line is redundant and ignored.
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamEvent {
    ContentBlockStart { content_block: BlockStart },
    ContentBlockDelta { delta: BlockDelta },
    ContentBlockStop,
    MessageDelta {
        delta: MessageDeltaBody,
        #[serde(default)]
        usage: Option<Usage>,
    },
    MessageStop,
    Error { error: ApiErrorBody },
    #[serde(other)]
    Ignored,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum BlockStart {
    ToolUse { id: String, name: String },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum BlockDelta {
    TextDelta { text: String },
    InputJsonDelta { partial_json: String },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct MessageDeltaBody {
    stop_reason: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// Per-message state carried between events.
#[derive(Default)]
struct EventState {
    open_tool: Option<String>,
    stop_reason: Option<String>,
    usage: Option<Usage>,
}

impl EventState {
    fn apply(&mut self, event: StreamEvent) -> Option<LlmResult<StreamDelta>> {
        match event {
            StreamEvent::ContentBlockStart { content_block: BlockStart::ToolUse { id, name } } => {
                self.open_tool = Some(id.clone());
                Some(Ok(StreamDelta::ToolCallStart { id, name }))
            }
            StreamEvent::ContentBlockDelta { delta: BlockDelta::TextDelta { text } } => {
                Some(Ok(StreamDelta::Text(text)))
            }
            StreamEvent::ContentBlockDelta { delta: BlockDelta::InputJsonDelta { partial_json } } => {
                self.open_tool
                    .clone()
                    .map(|id| Ok(StreamDelta::ToolCallDelta { id, arguments: partial_json }))
            }
            StreamEvent::ContentBlockStop => {
                self.open_tool.take().map(|id| Ok(StreamDelta::ToolCallEnd { id }))
            }
            StreamEvent::MessageDelta { delta, usage } => {
                if delta.stop_reason.is_some() {
                    self.stop_reason = delta.stop_reason;
                }
                self.usage = usage;
                None
            }
            StreamEvent::MessageStop => Some(Ok(StreamDelta::Done {
                stop_reason: self.stop_reason.take().or_else(|| Some("end_turn".to_string())),
                usage: self.usage.take(),
            })),
            StreamEvent::Error { error } => Some(Err(LlmError::StreamError(error.message))),
            _ => None,
        }
    }
}

fn parse_sse_stream(
    bytes_stream: impl futures::Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send + 'static,
) -> impl futures::Stream<Item = LlmResult<StreamDelta>> + Send {
    async_stream::stream! {
        let mut frames = FrameBuffer::default();
        let mut state = EventState::default();
        tokio::pin!(bytes_stream);

        while let Some(chunk) = bytes_stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    yield Err(LlmError::StreamError(e.to_string()));
                    break;
                }
            };

            for payload in frames.push(&chunk) {
                match serde_json::from_str::<StreamEvent>(&payload) {
                    Ok(event) => {
                        if let Some(delta) = state.apply(event) {
                            yield delta;
                        }
                    }
                    Err(e) => warn!("Skipping unreadable stream event: {}", e),
                }
            }
        }
    }
}
