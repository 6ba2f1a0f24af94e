//! Tool trait, capabilities, and the per-agent capability set
//!
//! A `Tool` is an implementation; a `Capability` is a tool bound to the name
//! and description an agent's configuration gave it.

use counsel_core::ConfigurationError;
use counsel_llm::LlmTool;
use serde_json::Value;
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq)]
pub enum ToolResult {
    Text(String),
    Json(Value),
    Error(String),
}

impl ToolResult {
    pub fn text(s: impl Into<String>) -> Self { Self::Text(s.into()) }
    pub fn error(s: impl Into<String>) -> Self { Self::Error(s.into()) }

    pub fn to_content_string(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Json(v) => serde_json::to_string_pretty(v).unwrap_or_default(),
            Self::Error(e) => format!("Error: {}", e),
        }
    }

    pub fn is_error(&self) -> bool { matches!(self, Self::Error(_)) }
}

/// The Tool trait: implement this to add a new capability.
///
/// Tools never fail the caller: problems come back as `ToolResult::Error`
/// and are shown to the model.
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    /// Default name, used when configuration gives none.
    fn name(&self) -> &str;

    /// Default description sent to the LLM.
    fn description(&self) -> &str;

    /// JSON Schema for input parameters.
    fn input_schema(&self) -> Value;

    /// Execute the tool with the given arguments.
    async fn execute(&self, args: Value) -> ToolResult;
}

/// A tool as one agent sees it. Immutable once built.
#[derive(Clone)]
pub struct Capability {
    name: String,
    description: String,
    tool: Arc<dyn Tool>,
}

impl std::fmt::Debug for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capability")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish()
    }
}

impl Capability {
    pub fn new(tool: Arc<dyn Tool>) -> Self {
        Self {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
            tool,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn name(&self) -> &str { &self.name }
    pub fn description(&self) -> &str { &self.description }

    pub async fn invoke(&self, args: Value) -> ToolResult {
        self.tool.execute(args).await
    }

    /// Convert to the LLM tool definition format.
    pub fn to_llm_tool(&self) -> LlmTool {
        LlmTool {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self.tool.input_schema(),
        }
    }
}

/// Ordered capabilities of one agent, unique by name.
#[derive(Clone, Debug, Default)]
pub struct CapabilitySet {
    capabilities: Vec<Capability>,
}

impl CapabilitySet {
    pub fn new() -> Self { Self::default() }

    /// Add a capability. A name already present is rejected.
    pub fn push(&mut self, capability: Capability) -> Result<(), ConfigurationError> {
        if self.get(capability.name()).is_some() {
            return Err(ConfigurationError::DuplicateTool(capability.name().to_string()));
        }
        self.capabilities.push(capability);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Capability> {
        self.capabilities.iter().find(|c| c.name() == name)
    }

    pub async fn execute(&self, name: &str, args: Value) -> ToolResult {
        match self.get(name) {
            Some(capability) => capability.invoke(args).await,
            None => ToolResult::Error(format!("Tool not found: {}", name)),
        }
    }

    /// LLM tool definitions, in set order.
    pub fn definitions(&self) -> Vec<LlmTool> {
        self.capabilities.iter().map(Capability::to_llm_tool).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.capabilities.iter().map(|c| c.name()).collect()
    }

    pub fn len(&self) -> usize { self.capabilities.len() }
    pub fn is_empty(&self) -> bool { self.capabilities.is_empty() }

    pub fn iter(&self) -> impl Iterator<Item = &Capability> {
        self.capabilities.iter()
    }
}
