//! Supervisor - forced-choice routing between workers
//!
//! The model is offered a single `route` tool whose `next` parameter is an
//! enum of the allowed options, and is required to call it. The answer is
//! validated against the same options before the graph follows it.

use crate::graph::Router;
use crate::state::{ConversationState, Route, StateUpdate};
use counsel_core::{ConfigurationError, SupervisorSettings, FINISH};
use counsel_llm::{LlmError, LlmMessage, LlmProvider, LlmTool, ModelSettings, ToolChoice};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

const ROUTE_TOOL: &str = "route";

/// What to do when the model picks something outside the options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvalidRoutePolicy {
    /// Treat it as FINISH.
    #[default]
    Finish,
    /// Fail the run.
    Fail,
}

#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("supervisor chose '{choice}', which is not one of {options:?}")]
    Invalid { choice: String, options: Vec<String> },

    #[error("supervisor did not call the route tool")]
    Missing,

    #[error("supervisor model failed: {0}")]
    Model(#[from] LlmError),
}

pub struct Supervisor {
    members: Vec<String>,
    options: Vec<String>,
    provider: Arc<dyn LlmProvider>,
    model: ModelSettings,
    policy: InvalidRoutePolicy,
}

impl Supervisor {
    /// Options default to the members plus FINISH. Any other option is rejected.
    pub fn from_settings(
        settings: &SupervisorSettings,
        provider: Arc<dyn LlmProvider>,
        model: ModelSettings,
    ) -> Result<Self, ConfigurationError> {
        let options = settings.resolved_options();
        if let Some(bad) = options.iter().find(|o| *o != FINISH && !settings.members.contains(o)) {
            return Err(ConfigurationError::InvalidOption(bad.clone()));
        }
        debug!("Initializing supervisor with members {:?}", settings.members);
        Ok(Self {
            members: settings.members.clone(),
            options,
            provider,
            model,
            policy: InvalidRoutePolicy::default(),
        })
    }

    pub fn with_policy(mut self, policy: InvalidRoutePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn options(&self) -> &[String] {
        &self.options
    }

    pub fn system_prompt(&self) -> String {
        format!(
            "You are a supervisor tasked with managing a conversation between the \
             following workers: {}. Given the following user request, respond with \
             the worker to act next. Each worker will perform a task and respond with \
             their results and status. When finished, respond with FINISH. Use your \
             workers frequently. Make sure you do research and quality assurance check \
             before providing a response.",
            self.members.join(", ")
        )
    }

    fn closing_instruction(&self) -> String {
        format!(
            "Given the conversation above, who should act next? Or should we FINISH? Select one of: [{}]",
            self.options.join(", ")
        )
    }

    pub fn route_tool(&self) -> LlmTool {
        LlmTool {
            name: ROUTE_TOOL.to_string(),
            description: "Select the next role.".to_string(),
            input_schema: json!({
                "title": "routeSchema",
                "type": "object",
                "properties": {
                    "next": {
                        "title": "Next",
                        "enum": self.options,
                    }
                },
                "required": ["next"],
            }),
        }
    }

    /// Ask the model for the next step and validate the answer.
    pub async fn decide(&self, state: &ConversationState) -> Result<Route, RouteError> {
        let mut messages = state.to_llm_messages();
        messages.push(LlmMessage::user(self.closing_instruction()));

        let mut request = self.model.request();
        request.system = Some(self.system_prompt());
        request.messages = counsel_llm::merge_consecutive_roles(&messages);
        request.tools = Some(vec![self.route_tool()]);
        request.tool_choice = Some(ToolChoice::tool(ROUTE_TOOL));

        let completion = self.provider.complete(request).await?;
        let choice = completion
            .tool_call(ROUTE_TOOL)
            .and_then(|call| call.parse_arguments().ok())
            .and_then(|args| args.get("next").and_then(Value::as_str).map(str::to_string));

        let choice = match choice {
            Some(choice) => choice,
            None => return self.reject(None),
        };
        match Route::from_choice(&choice, &self.options) {
            Some(route) => {
                info!(next = %route, "Supervisor routed");
                Ok(route)
            }
            None => self.reject(Some(choice)),
        }
    }

    fn reject(&self, choice: Option<String>) -> Result<Route, RouteError> {
        match self.policy {
            InvalidRoutePolicy::Finish => {
                warn!("Supervisor returned invalid choice {:?}, finishing", choice);
                Ok(Route::Finish)
            }
            InvalidRoutePolicy::Fail => {
                error!("Supervisor returned invalid choice {:?}", choice);
                Err(match choice {
                    Some(choice) => RouteError::Invalid { choice, options: self.options.clone() },
                    None => RouteError::Missing,
                })
            }
        }
    }
}

#[async_trait::async_trait]
impl Router for Supervisor {
    fn members(&self) -> &[String] {
        &self.members
    }

    async fn route(&self, state: &ConversationState) -> Result<StateUpdate, RouteError> {
        Ok(StateUpdate::route(self.decide(state).await?))
    }
}
