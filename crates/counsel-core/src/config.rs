//! Configuration Document: serde structs for per-application settings
//!
//! Pure types and validation only. Fetching, diffing, and caching live in
//! counsel-agent.

use crate::error::ConfigurationError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Terminal routing decision.
pub const FINISH: &str = "FINISH";

/// Node name of the supervisor in the execution graph.
pub const SUPERVISOR_NODE: &str = "agent_supervisor";

/// The full settings document for one application.
///
/// Besides `Agent_Supervisor` and `params`, the document holds one entry per
/// worker, keyed by the worker's name, next to any global parameters. Only
/// the keys listed in the supervisor's `members` are read as agent settings;
/// every other entry stays opaque.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigDocument {
    #[serde(
        rename = "Agent_Supervisor",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub supervisor: Option<SupervisorSettings>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub params: Map<String, Value>,
    #[serde(flatten)]
    pub entries: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentSettings {
    #[serde(default)]
    pub parent_settings: ParentSettings,
    /// Tool key → raw tool reference. Iterated in key order; each entry is
    /// parsed on its own so one malformed reference cannot sink the agent.
    #[serde(rename = "Tools", default)]
    pub tools: BTreeMap<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AgentSettings {
    pub fn with_tool(mut self, key: impl Into<String>, spec: &ToolSpec) -> Self {
        self.tools.insert(key.into(), spec.to_value());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParentSettings {
    /// Prompt identifier in the prompt store.
    #[serde(default)]
    pub agent_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<usize>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A declarative tool reference: which registry entry to build, plus the
/// free-form settings handed to the tool's constructor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub module: String,
    #[serde(rename = "class", default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    pub function: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub settings: Map<String, Value>,
}

impl ToolSpec {
    pub fn new(module: impl Into<String>, function: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            class: None,
            function: function.into(),
            name: None,
            description: None,
            settings: Map::new(),
        }
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.class = Some(class.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_setting(mut self, key: impl Into<String>, value: Value) -> Self {
        self.settings.insert(key.into(), value);
        self
    }

    /// Parse the reference stored under `key` in an agent's `Tools`.
    pub fn from_value(key: &str, value: &Value) -> Result<Self, ConfigurationError> {
        serde_json::from_value(value.clone()).map_err(|e| ConfigurationError::MalformedTool {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Registry key, e.g. `kb_search.KBSearchTool.kb_tool` or `echo.echo`.
    pub fn registry_key(&self) -> String {
        match &self.class {
            Some(class) => format!("{}.{}.{}", self.module, class, self.function),
            None => format!("{}.{}", self.module, self.function),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SupervisorSettings {
    pub members: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SupervisorSettings {
    pub fn new(members: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            members: members.into_iter().map(Into::into).collect(),
            options: None,
            extra: Map::new(),
        }
    }

    /// Options the router may choose from. Defaults to members + FINISH.
    pub fn resolved_options(&self) -> Vec<String> {
        match &self.options {
            Some(options) => options.clone(),
            None => {
                let mut options = self.members.clone();
                options.push(FINISH.to_string());
                options
            }
        }
    }
}

impl ConfigDocument {
    pub fn is_empty(&self) -> bool {
        self.supervisor.is_none() && self.entries.is_empty() && self.params.is_empty()
    }

    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Settings of the worker `name`.
    pub fn agent(&self, name: &str) -> Result<AgentSettings, ConfigurationError> {
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| ConfigurationError::MissingAgentSettings(name.to_string()))?;
        serde_json::from_value(entry.clone()).map_err(|e| ConfigurationError::InvalidAgentSettings {
            agent: name.to_string(),
            reason: e.to_string(),
        })
    }

    pub fn insert_agent(&mut self, name: impl Into<String>, settings: &AgentSettings) {
        let value = serde_json::to_value(settings).unwrap_or(Value::Null);
        self.entries.insert(name.into(), value);
    }

    /// Check the cross-references between supervisor and agents.
    pub fn validate(&self) -> Result<&SupervisorSettings, ConfigurationError> {
        let supervisor = self
            .supervisor
            .as_ref()
            .ok_or(ConfigurationError::MissingSupervisor)?;

        for member in &supervisor.members {
            self.agent(member)?;
        }

        for option in supervisor.resolved_options() {
            if option != FINISH && !supervisor.members.contains(&option) {
                return Err(ConfigurationError::InvalidOption(option));
            }
        }

        Ok(supervisor)
    }
}

/// String setting from a free-form settings map.
pub fn setting_str<'a>(settings: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    settings.get(key).and_then(Value::as_str)
}

/// Nested settings object, empty when absent or not an object.
pub fn setting_map(settings: &Map<String, Value>, key: &str) -> Map<String, Value> {
    settings
        .get(key)
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn registry_key_with_and_without_class() {
        let spec = ToolSpec::new("kb_search", "kb_tool").with_class("KBSearchTool");
        assert_eq!(spec.registry_key(), "kb_search.KBSearchTool.kb_tool");
        assert_eq!(ToolSpec::new("echo", "echo").registry_key(), "echo.echo");
    }

    #[test]
    fn members_are_read_as_agents() {
        let doc = ConfigDocument::from_value(json!({
            "Agent_Supervisor": {"members": ["research_agent"]},
            "research_agent": {"parent_settings": {"agent_id": "p"}, "Tools": {}},
            "version": "2024-05"
        }))
        .unwrap();
        assert_eq!(doc.entries.len(), 2);
        assert_eq!(doc.agent("research_agent").unwrap().parent_settings.agent_id, "p");
        assert!(doc.validate().is_ok());
    }

    #[test]
    fn malformed_member_settings_fail_validation() {
        let doc = ConfigDocument::from_value(json!({
            "Agent_Supervisor": {"members": ["research_agent"]},
            "research_agent": "not an object"
        }))
        .unwrap();
        assert!(matches!(
            doc.validate(),
            Err(ConfigurationError::InvalidAgentSettings { ref agent, .. }) if agent == "research_agent"
        ));
    }
}
