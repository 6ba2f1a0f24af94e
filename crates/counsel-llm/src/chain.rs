//! Prompt chains: a resolved prompt piped into the model

use crate::prompt::{PromptError, PromptStore, PromptTemplate, PromptVars};
use crate::provider::{LlmProvider, LlmResult};
use crate::types::{LlmMessage, ModelSettings};
use std::sync::Arc;
use tracing::debug;

/// A prompt bound to a model. `invoke` renders the prompt with the given
/// variables and returns the model's text answer.
#[derive(Clone)]
pub struct PromptChain {
    prompt: PromptTemplate,
    provider: Arc<dyn LlmProvider>,
    model: ModelSettings,
}

impl PromptChain {
    pub fn new(prompt: PromptTemplate, provider: Arc<dyn LlmProvider>, model: ModelSettings) -> Self {
        Self { prompt, provider, model }
    }

    /// Resolve `prompt_id` from the store and bind it.
    pub async fn from_store(
        store: &dyn PromptStore,
        prompt_id: &str,
        provider: Arc<dyn LlmProvider>,
        model: ModelSettings,
    ) -> Result<Self, PromptError> {
        let prompt = store.get_prompt(prompt_id).await?;
        Ok(Self::new(prompt, provider, model))
    }

    pub fn prompt(&self) -> &PromptTemplate {
        &self.prompt
    }

    pub async fn invoke(&self, vars: &PromptVars) -> LlmResult<String> {
        // Without a human template the variables themselves become the input.
        let human = self.prompt.render_human(vars).unwrap_or_else(|| {
            vars.iter()
                .map(|(k, v)| format!("{}:\n{}", k, v))
                .collect::<Vec<_>>()
                .join("\n\n")
        });

        let mut request = self.model.request();
        request.system = Some(self.prompt.render_system(vars));
        request.messages = vec![LlmMessage::user(human)];

        debug!("Invoking chain for prompt {}", self.prompt.id);
        let completion = self.provider.complete(request).await?;
        Ok(completion.text)
    }
}
