//! LLM Provider trait

use crate::types::{AccumulatedToolCall, LlmRequest, StreamDelta};
use futures::{Stream, StreamExt};
use std::pin::Pin;
use tracing::debug;

/// Result type for LLM operations
pub type LlmResult<T> = Result<T, LlmError>;

/// LLM error types
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("rate limited: retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("stream error: {0}")]
    StreamError(String),

    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}

/// Stream type for LLM responses
pub type LlmStream = Pin<Box<dyn Stream<Item = LlmResult<StreamDelta>> + Send>>;

/// A fully received model response.
#[derive(Clone, Debug, Default)]
pub struct Completion {
    pub text: String,
    pub tool_calls: Vec<AccumulatedToolCall>,
    pub stop_reason: Option<String>,
}

impl Completion {
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// First tool call with the given name.
    pub fn tool_call(&self, name: &str) -> Option<&AccumulatedToolCall> {
        self.tool_calls.iter().find(|tc| tc.name == name)
    }
}

/// LLM Provider trait
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Stream a completion response.
    async fn complete_stream(&self, request: LlmRequest) -> LlmResult<LlmStream>;

    /// Drain the stream into a single [`Completion`].
    ///
    /// Stream errors abort the completion; a response is either whole or an error.
    async fn complete(&self, request: LlmRequest) -> LlmResult<Completion> {
        let stream = self.complete_stream(request).await?;
        collect_completion(stream).await
    }
}

pub async fn collect_completion(mut stream: LlmStream) -> LlmResult<Completion> {
    let mut completion = Completion::default();
    let mut current_tool: Option<AccumulatedToolCall> = None;

    while let Some(delta) = stream.next().await {
        match delta? {
            StreamDelta::Text(text) => completion.text.push_str(&text),
            StreamDelta::ToolCallStart { id, name } => {
                if let Some(tool) = current_tool.take() {
                    completion.tool_calls.push(tool);
                }
                current_tool = Some(AccumulatedToolCall { id, name, arguments: String::new() });
            }
            StreamDelta::ToolCallDelta { arguments, .. } => {
                if let Some(ref mut tool) = current_tool {
                    tool.arguments.push_str(&arguments);
                }
            }
            StreamDelta::ToolCallEnd { .. } => {
                if let Some(tool) = current_tool.take() {
                    completion.tool_calls.push(tool);
                }
            }
            StreamDelta::Done { stop_reason, .. } => {
                completion.stop_reason = stop_reason;
            }
            StreamDelta::Error(e) => return Err(LlmError::StreamError(e)),
        }
    }

    if let Some(tool) = current_tool.take() {
        completion.tool_calls.push(tool);
    }

    debug!(
        "Completion collected: {} chars, {} tool calls",
        completion.text.len(),
        completion.tool_calls.len()
    );
    Ok(completion)
}
