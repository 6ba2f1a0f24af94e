//! Worker agent - a prompt, a capability set, and the tool-calling loop

use crate::graph::WorkerNode;
use crate::state::{ConversationState, StateUpdate};
use counsel_core::{AgentSettings, Turn};
use counsel_llm::{
    merge_consecutive_roles, ContentBlock, LlmError, LlmMessage, LlmProvider, ModelSettings, PromptError,
    PromptTemplate, PromptVars, ToolChoice,
};
use counsel_tools::{CapabilityRegistry, CapabilitySet, ToolContext};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const DEFAULT_MAX_ITERATIONS: usize = 15;

const MAX_TOOL_RESULT_CHARS: usize = 50_000;

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("prompt for agent '{agent}' could not be resolved: {source}")]
    PromptResolution {
        agent: String,
        #[source]
        source: PromptError,
    },

    #[error("agent '{agent}' failed: {source}")]
    Invocation {
        agent: String,
        #[source]
        source: LlmError,
    },
}

/// One tool call made during an invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceStep {
    pub tool: String,
    pub input: Value,
    pub output: String,
    pub is_error: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AgentOutput {
    pub output: String,
    pub trace: Vec<TraceStep>,
}

/// Stateless between invocations; everything it needs arrives in the state.
pub struct WorkerAgent {
    name: String,
    prompt: PromptTemplate,
    capabilities: CapabilitySet,
    provider: Arc<dyn LlmProvider>,
    model: ModelSettings,
    max_iterations: usize,
}

impl WorkerAgent {
    pub fn new(
        name: impl Into<String>,
        prompt: PromptTemplate,
        capabilities: CapabilitySet,
        provider: Arc<dyn LlmProvider>,
        model: ModelSettings,
    ) -> Self {
        Self {
            name: name.into(),
            prompt,
            capabilities,
            provider,
            model,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    /// Resolve the prompt named by `parent_settings.agent_id`, build the
    /// capability set, and bind the model client from `ctx`.
    ///
    /// Tool entries that fail to build are skipped; a missing prompt fails the
    /// whole agent.
    pub async fn build(
        name: &str,
        settings: &AgentSettings,
        registry: &CapabilityRegistry,
        ctx: &ToolContext,
    ) -> Result<Self, AgentError> {
        let prompt_id = &settings.parent_settings.agent_id;
        let prompt = ctx
            .prompts
            .get_prompt(prompt_id)
            .await
            .map_err(|source| AgentError::PromptResolution { agent: name.to_string(), source })?;
        debug!(agent = name, "Prompt fetched: {}", prompt_id);

        let capabilities = registry.build_capability_set(settings, ctx).await;
        info!(agent = name, tools = capabilities.len(), "Agent and tools initialized");

        let mut agent = Self::new(name, prompt, capabilities, ctx.provider.clone(), ctx.model.clone());
        if let Some(max) = settings.parent_settings.max_iterations {
            agent.max_iterations = max;
        }
        Ok(agent)
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Prompt placeholders: `{input}` is the run's query, `{agent}` this worker.
    fn prompt_vars(&self, state: &ConversationState) -> PromptVars {
        PromptVars::from([
            ("input".to_string(), state.query().to_string()),
            ("agent".to_string(), self.name.clone()),
        ])
    }

    /// Run the tool loop until the model answers in text.
    ///
    /// The rendered human template, when the prompt has one, closes the
    /// conversation. After `max_iterations` rounds of tool calls one more
    /// request is made with tool use disabled, so the agent always produces
    /// an answer.
    pub async fn invoke(&self, state: &ConversationState) -> Result<AgentOutput, AgentError> {
        let vars = self.prompt_vars(state);
        let system = self.prompt.render_system(&vars);
        let mut messages = state.to_llm_messages();
        if let Some(human) = self.prompt.render_human(&vars) {
            messages.push(LlmMessage::user(human));
            messages = merge_consecutive_roles(&messages);
        }
        let mut trace = Vec::new();
        let tools = self.capabilities.definitions();

        for iteration in 1..=self.max_iterations {
            let mut request = self.model.request();
            request.system = Some(system.clone());
            request.messages = messages.clone();
            if !tools.is_empty() {
                request.tools = Some(tools.clone());
            }

            let completion = self.provider.complete(request).await.map_err(|e| self.invocation(e))?;
            if !completion.has_tool_calls() {
                debug!(agent = %self.name, iteration, "Agent answered");
                return Ok(AgentOutput { output: completion.text, trace });
            }

            let mut blocks = Vec::new();
            if !completion.text.is_empty() {
                blocks.push(ContentBlock::Text { text: completion.text.clone() });
            }
            let mut results = Vec::new();
            for call in &completion.tool_calls {
                let args = call.parse_arguments().unwrap_or_default();
                blocks.push(ContentBlock::ToolUse {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    input: args.clone(),
                });

                debug!(agent = %self.name, tool = %call.name, "Executing tool");
                let result = self.capabilities.execute(&call.name, args.clone()).await;
                let is_error = result.is_error();
                let output = truncate(result.to_content_string());
                if is_error {
                    warn!(agent = %self.name, tool = %call.name, "Tool returned error: {}", output);
                }

                results.push(ContentBlock::ToolResult {
                    tool_use_id: call.id.clone(),
                    content: output.clone(),
                    is_error: is_error.then_some(true),
                });
                trace.push(TraceStep { tool: call.name.clone(), input: args, output, is_error });
            }
            messages.push(LlmMessage::assistant(blocks));
            messages.push(LlmMessage::user(results));
        }

        info!(agent = %self.name, max = self.max_iterations, "Iteration limit reached, generating final answer");
        let mut request = self.model.request();
        request.system = Some(system.clone());
        request.messages = messages;
        if !tools.is_empty() {
            request.tools = Some(tools);
            request.tool_choice = Some(ToolChoice::None);
        }
        let completion = self.provider.complete(request).await.map_err(|e| self.invocation(e))?;
        Ok(AgentOutput { output: completion.text, trace })
    }

    fn invocation(&self, source: LlmError) -> AgentError {
        AgentError::Invocation { agent: self.name.clone(), source }
    }
}

fn truncate(result: String) -> String {
    if result.len() <= MAX_TOOL_RESULT_CHARS {
        return result;
    }
    let mut end = MAX_TOOL_RESULT_CHARS;
    while !result.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...\n[truncated, {} total chars]", &result[..end], result.len())
}

#[async_trait::async_trait]
impl WorkerNode for WorkerAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, state: &ConversationState) -> Result<StateUpdate, AgentError> {
        let output = self.invoke(state).await?;
        info!(agent = %self.name, tool_calls = output.trace.len(), "Worker finished");
        Ok(StateUpdate::message(Turn::from_worker(&self.name, output.output)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_keeps_short_results() {
        assert_eq!(truncate("short".into()), "short");
    }

    #[test]
    fn truncate_cuts_long_results() {
        let long = "x".repeat(MAX_TOOL_RESULT_CHARS + 10);
        let cut = truncate(long);
        assert!(cut.starts_with(&"x".repeat(100)));
        assert!(cut.ends_with(&format!("[truncated, {} total chars]", MAX_TOOL_RESULT_CHARS + 10)));
    }
}
