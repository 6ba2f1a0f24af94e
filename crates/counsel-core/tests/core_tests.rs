//! Tests for counsel-core: configuration documents, validation, and conversation types

use counsel_core::*;
use serde_json::json;

fn legal_document() -> serde_json::Value {
    json!({
        "Agent_Supervisor": {
            "members": ["research_agent", "drafting_agent"]
        },
        "params": {"model": "claude-haiku", "temperature": 0.2},
        "research_agent": {
            "parent_settings": {"agent_id": "firm/research-agent", "max_iterations": 6},
            "Tools": {
                "web": {
                    "module": "web_search_tool",
                    "class": "WebSearchTool",
                    "function": "wb_tool",
                    "name": "web_search",
                    "allowed_domains": ["courts.example.gov"]
                },
                "echo": {"module": "echo", "function": "echo"}
            }
        },
        "drafting_agent": {
            "parent_settings": {"agent_id": "firm/drafting-agent"},
            "Tools": {}
        }
    })
}

// ===========================================================================
// Document parsing
// ===========================================================================

#[test]
fn parses_supervisor_params_and_agents() {
    let doc = ConfigDocument::from_value(legal_document()).unwrap();
    let supervisor = doc.supervisor.as_ref().unwrap();
    assert_eq!(supervisor.members, vec!["research_agent", "drafting_agent"]);
    assert_eq!(doc.params["model"], json!("claude-haiku"));
    assert_eq!(doc.entries.len(), 2);
    assert!(!doc.entries.contains_key("params"));

    let research = doc.agent("research_agent").unwrap();
    assert_eq!(research.parent_settings.agent_id, "firm/research-agent");
    assert_eq!(research.parent_settings.max_iterations, Some(6));
    assert_eq!(doc.agent("drafting_agent").unwrap().parent_settings.max_iterations, None);
}

#[test]
fn tool_spec_keeps_class_and_extra_settings() {
    let doc = ConfigDocument::from_value(legal_document()).unwrap();
    let tools = doc.agent("research_agent").unwrap().tools;

    let web = ToolSpec::from_value("web", &tools["web"]).unwrap();
    assert_eq!(web.class.as_deref(), Some("WebSearchTool"));
    assert_eq!(web.name.as_deref(), Some("web_search"));
    assert_eq!(web.registry_key(), "web_search_tool.WebSearchTool.wb_tool");
    assert_eq!(web.settings["allowed_domains"], json!(["courts.example.gov"]));
    assert!(!web.settings.contains_key("module"));

    let echo = ToolSpec::from_value("echo", &tools["echo"]).unwrap();
    assert_eq!(echo.class, None);
    assert!(echo.settings.is_empty());
}

#[test]
fn document_survives_json_round_trip() {
    let doc = ConfigDocument::from_value(legal_document()).unwrap();
    let value = doc.to_value();
    assert_eq!(value["Agent_Supervisor"]["members"], json!(["research_agent", "drafting_agent"]));
    assert_eq!(value["research_agent"]["Tools"]["web"]["class"], json!("WebSearchTool"));
    assert_eq!(ConfigDocument::from_value(value).unwrap(), doc);
}

#[test]
fn equality_is_structural() {
    let a = ConfigDocument::from_value(legal_document()).unwrap();
    let mut reordered = legal_document();
    let drafting = reordered.as_object_mut().unwrap().remove("drafting_agent").unwrap();
    reordered.as_object_mut().unwrap().insert("drafting_agent".into(), drafting);
    assert_eq!(a, ConfigDocument::from_value(reordered).unwrap());

    let mut changed = legal_document();
    changed["research_agent"]["parent_settings"]["agent_id"] = json!("firm/other");
    assert_ne!(a, ConfigDocument::from_value(changed).unwrap());
}

#[test]
fn empty_document() {
    let doc = ConfigDocument::from_value(json!({})).unwrap();
    assert!(doc.is_empty());
    assert_eq!(doc.to_value(), json!({}));
}

#[test]
fn malformed_tool_entry_keeps_document_and_siblings() {
    let mut value = legal_document();
    value["research_agent"]["Tools"]["typo"] = json!({"module": "echo", "fn": "echo"});

    let doc = ConfigDocument::from_value(value).unwrap();
    assert!(doc.validate().is_ok());
    let tools = doc.agent("research_agent").unwrap().tools;
    assert_eq!(tools.len(), 3);

    let err = ToolSpec::from_value("typo", &tools["typo"]).unwrap_err();
    assert!(matches!(err, ConfigurationError::MalformedTool { ref key, ref reason }
        if key == "typo" && reason.contains("function")));
    assert!(ToolSpec::from_value("echo", &tools["echo"]).is_ok());
}

#[test]
fn global_parameters_stay_opaque() {
    let mut value = legal_document();
    value["version"] = json!("2024-05");
    value["jurisdiction"] = json!({"country": "US", "state": "NY"});

    let doc = ConfigDocument::from_value(value).unwrap();
    assert!(doc.validate().is_ok());
    assert_eq!(doc.entries["version"], json!("2024-05"));
    assert_eq!(doc.to_value()["jurisdiction"]["state"], json!("NY"));
    assert!(matches!(doc.agent("version"), Err(ConfigurationError::InvalidAgentSettings { .. })));
}

#[test]
fn agent_settings_builder_round_trips() {
    let spec = ToolSpec::new("echo", "echo").with_name("repeat");
    let mut doc = ConfigDocument::default();
    doc.insert_agent("worker", &AgentSettings::default().with_tool("r", &spec));

    let tools = doc.agent("worker").unwrap().tools;
    assert_eq!(ToolSpec::from_value("r", &tools["r"]).unwrap(), spec);
}

// ===========================================================================
// Validation
// ===========================================================================

#[test]
fn validate_accepts_default_options() {
    let doc = ConfigDocument::from_value(legal_document()).unwrap();
    let supervisor = doc.validate().unwrap();
    assert_eq!(supervisor.resolved_options(), vec!["research_agent", "drafting_agent", FINISH]);
}

#[test]
fn validate_requires_supervisor() {
    let mut value = legal_document();
    value.as_object_mut().unwrap().remove("Agent_Supervisor");
    let doc = ConfigDocument::from_value(value).unwrap();
    assert_eq!(doc.validate().unwrap_err(), ConfigurationError::MissingSupervisor);
}

#[test]
fn validate_requires_settings_for_every_member() {
    let mut value = legal_document();
    value.as_object_mut().unwrap().remove("drafting_agent");
    let doc = ConfigDocument::from_value(value).unwrap();
    assert_eq!(
        doc.validate().unwrap_err(),
        ConfigurationError::MissingAgentSettings("drafting_agent".into())
    );
}

#[test]
fn validate_rejects_unknown_option() {
    let mut value = legal_document();
    value["Agent_Supervisor"]["options"] = json!(["research_agent", "billing_agent", "FINISH"]);
    let doc = ConfigDocument::from_value(value).unwrap();
    assert_eq!(doc.validate().unwrap_err(), ConfigurationError::InvalidOption("billing_agent".into()));
}

#[test]
fn explicit_options_override_default() {
    let mut supervisor = SupervisorSettings::new(["a", "b"]);
    supervisor.options = Some(vec!["b".into(), FINISH.into()]);
    assert_eq!(supervisor.resolved_options(), vec!["b", FINISH]);
}

// ===========================================================================
// Settings helpers
// ===========================================================================

#[test]
fn setting_helpers() {
    let settings = json!({"prompt_id": "p", "k": 3, "wb_tool": {"allowed_domains": []}});
    let map = settings.as_object().unwrap();
    assert_eq!(setting_str(map, "prompt_id"), Some("p"));
    assert_eq!(setting_str(map, "k"), None);
    assert!(setting_map(map, "wb_tool").contains_key("allowed_domains"));
    assert!(setting_map(map, "missing").is_empty());
}

// ===========================================================================
// Sessions and turns
// ===========================================================================

#[test]
fn session_key_serializes_as_string() {
    let key = SessionKey::from("client-42");
    assert_eq!(serde_json::to_value(&key).unwrap(), json!("client-42"));
    let back: SessionKey = serde_json::from_value(json!("client-42")).unwrap();
    assert_eq!(back, key);
    assert_eq!(key.to_string(), "client-42");
}

#[test]
fn turn_serde_omits_missing_name() {
    assert_eq!(serde_json::to_value(Turn::ai("done")).unwrap(), json!({"role": "ai", "content": "done"}));

    let worker = Turn::from_worker("research_agent", "notes");
    assert_eq!(worker.role, TurnRole::Human);
    let value = serde_json::to_value(&worker).unwrap();
    assert_eq!(value["name"], json!("research_agent"));
    assert_eq!(serde_json::from_value::<Turn>(value).unwrap(), worker);
}

#[test]
fn configuration_error_messages() {
    let err = ConfigurationError::MissingMethod { class: "KBSearchTool".into(), function: "nope".into() };
    assert_eq!(err.to_string(), "function 'nope' not found in class 'KBSearchTool'");
    let wrapped: Error = err.into();
    assert!(wrapped.to_string().starts_with("configuration error:"));
}
