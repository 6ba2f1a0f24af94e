//! ScriptedProvider: deterministic LLM responses for testing
//!
//! Implements [`LlmProvider`] by replaying canned behaviors, either from a
//! sequence (one per call) or from a responder function over the request.

use crate::provider::{LlmError, LlmProvider, LlmResult, LlmStream};
use crate::types::{LlmRequest, StreamDelta};
use serde_json::{json, Value};
use std::collections::VecDeque;
use tokio::sync::Mutex;

/// Mock behavior configuration
#[derive(Clone, Debug)]
pub enum MockBehavior {
    /// Return a text-only response
    Text(String),
    /// Return a tool_use call with given name and args
    ToolCall { name: String, args: Value },
    /// Forced routing answer: a `route` call with `{"next": <choice>}`
    Route(String),
    /// Fail the request
    Error(String),
}

impl MockBehavior {
    pub fn text(s: impl Into<String>) -> Self { Self::Text(s.into()) }

    pub fn route(choice: impl Into<String>) -> Self { Self::Route(choice.into()) }

    pub fn tool_call(name: impl Into<String>, args: Value) -> Self {
        Self::ToolCall { name: name.into(), args }
    }
}

type Responder = Box<dyn Fn(&LlmRequest) -> MockBehavior + Send + Sync>;

/// Replays behaviors in order, then falls back to a default. A responder,
/// when set, answers every call instead.
pub struct ScriptedProvider {
    behaviors: Mutex<VecDeque<MockBehavior>>,
    fallback: MockBehavior,
    responder: Option<Responder>,
    requests: Mutex<Vec<LlmRequest>>,
}

impl ScriptedProvider {
    fn build(behaviors: Vec<MockBehavior>, fallback: MockBehavior, responder: Option<Responder>) -> Self {
        Self {
            behaviors: Mutex::new(behaviors.into()),
            fallback,
            responder,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Same behavior on every call.
    pub fn constant(behavior: MockBehavior) -> Self {
        Self::build(Vec::new(), behavior, None)
    }

    /// One behavior per call, in order.
    pub fn sequence(behaviors: Vec<MockBehavior>) -> Self {
        Self::build(behaviors, MockBehavior::Text("(mock: sequence exhausted)".into()), None)
    }

    /// Behavior computed from each request.
    pub fn responder(f: impl Fn(&LlmRequest) -> MockBehavior + Send + Sync + 'static) -> Self {
        Self::build(Vec::new(), MockBehavior::Text(String::new()), Some(Box::new(f)))
    }

    /// Get the number of calls made
    pub async fn call_count(&self) -> usize {
        self.requests.lock().await.len()
    }

    /// Every request received so far, in order.
    pub async fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().await.clone()
    }

    async fn next_behavior(&self, request: &LlmRequest) -> MockBehavior {
        self.requests.lock().await.push(request.clone());

        if let Some(responder) = &self.responder {
            return responder(request);
        }

        let next = self.behaviors.lock().await.pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }
}

#[async_trait::async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str { "scripted" }

    async fn complete_stream(&self, request: LlmRequest) -> LlmResult<LlmStream> {
        let behavior = self.next_behavior(&request).await;

        let deltas: Vec<LlmResult<StreamDelta>> = match behavior {
            MockBehavior::Text(text) => {
                let mut deltas: Vec<_> = text
                    .chars()
                    .collect::<Vec<_>>()
                    .chunks(20)
                    .map(|c| Ok(StreamDelta::Text(c.iter().collect())))
                    .collect();
                deltas.push(Ok(StreamDelta::Done { stop_reason: Some("end_turn".into()), usage: None }));
                deltas
            }
            MockBehavior::ToolCall { name, args } => tool_call_deltas(name, args),
            MockBehavior::Route(choice) => tool_call_deltas("route".into(), json!({ "next": choice })),
            MockBehavior::Error(e) => return Err(LlmError::RequestFailed(e)),
        };

        Ok(Box::pin(futures::stream::iter(deltas)))
    }
}

fn tool_call_deltas(name: String, args: Value) -> Vec<LlmResult<StreamDelta>> {
    let id = format!("toolu_mock_{}", uuid::Uuid::new_v4().simple());
    vec![
        Ok(StreamDelta::ToolCallStart { id: id.clone(), name }),
        Ok(StreamDelta::ToolCallDelta { id: id.clone(), arguments: args.to_string() }),
        Ok(StreamDelta::ToolCallEnd { id }),
        Ok(StreamDelta::Done { stop_reason: Some("tool_use".into()), usage: None }),
    ]
}
