//! Tests for counsel-tools: capability registry, tool factory, and the built-in tools

use counsel_core::{AgentSettings, ConfigurationError, ToolSpec};
use counsel_llm::mock::{MockBehavior, ScriptedProvider};
use counsel_llm::{InMemoryPromptStore, PromptTemplate};
use counsel_tools::tools::memory::{MemoryActionTool, UpdateSchemaTool, FIELD_MISSING};
use counsel_tools::tools::web_search::WebSearchTool;
use counsel_tools::*;
use serde_json::json;
use std::sync::Arc;

struct FixedSearch(Vec<Document>);

#[async_trait::async_trait]
impl SearchProvider for FixedSearch {
    async fn search(&self, _query: &str) -> Result<Vec<Document>, ProviderError> {
        Ok(self.0.clone())
    }
}

fn prompts() -> Arc<InMemoryPromptStore> {
    Arc::new(
        InMemoryPromptStore::new()
            .with(PromptTemplate::new("kb-prompt", "Answer {query} using:\n{documents}"))
            .with(PromptTemplate::new("juris-prompt", "Question {input}. Sources:\n{documents}"))
            .with(PromptTemplate::new("qa-prompt", "Review {data} against {reference_data}. {instructions}"))
            .with(PromptTemplate::new("draft-prompt", "Draft from {information}. {drafting_instructions}")),
    )
}

fn context(provider: Arc<ScriptedProvider>) -> ToolContext {
    ToolContext::new(provider, prompts())
}

fn kb_spec() -> ToolSpec {
    ToolSpec::new("kb_search", "kb_tool")
        .with_class("KBSearchTool")
        .with_setting("index_name", json!("statutes"))
        .with_setting("prompt_id", json!("kb-prompt"))
}

fn agent_with(tools: Vec<(&str, ToolSpec)>) -> AgentSettings {
    tools
        .into_iter()
        .fold(AgentSettings::default(), |settings, (key, spec)| settings.with_tool(key, &spec))
}

// ===========================================================================
// ToolResult / CapabilitySet
// ===========================================================================

#[test]
fn tool_result_error_is_prefixed() {
    let r = ToolResult::error("boom");
    assert!(r.is_error());
    assert_eq!(r.to_content_string(), "Error: boom");
}

#[tokio::test]
async fn capability_set_rejects_duplicate_names() {
    let registry = CapabilityRegistry::builtin();
    let ctx = context(Arc::new(ScriptedProvider::constant(MockBehavior::text("ok"))));
    let spec = ToolSpec::new("echo", "echo").with_name("lookup");

    let mut set = CapabilitySet::new();
    set.push(registry.build_capability("a", &spec, &ctx).await.unwrap()).unwrap();
    let dup = set.push(registry.build_capability("b", &spec, &ctx).await.unwrap());
    assert_eq!(dup, Err(ConfigurationError::DuplicateTool("lookup".into())));
    assert_eq!(set.len(), 1);
}

#[tokio::test]
async fn capability_set_execute_missing_tool() {
    let set = CapabilitySet::new();
    let result = set.execute("nonexistent", json!({})).await;
    assert!(result.is_error());
    assert!(result.to_content_string().contains("not found"));
}

// ===========================================================================
// CapabilityRegistry
// ===========================================================================

#[test]
fn builtin_registry_keys() {
    let keys = CapabilityRegistry::builtin().keys();
    assert!(keys.contains(&"echo.echo".to_string()));
    assert!(keys.contains(&"kb_search.KBSearchTool.kb_tool".to_string()));
    assert!(keys.contains(&"memory_tool.MemoryTool.update_schema".to_string()));
    assert_eq!(keys.len(), 8);
}

#[test]
fn resolve_reports_each_failure_kind() {
    let registry = CapabilityRegistry::builtin();
    let err = |spec: ToolSpec| registry.resolve(&spec).err().unwrap();

    assert_eq!(
        err(ToolSpec::new("nowhere", "f")),
        ConfigurationError::UnknownModule { module: "nowhere".into() }
    );
    assert_eq!(
        err(ToolSpec::new("kb_search", "kb_tool").with_class("Missing")),
        ConfigurationError::UnknownClass { module: "kb_search".into(), class: "Missing".into() }
    );
    assert_eq!(
        err(ToolSpec::new("kb_search", "nope").with_class("KBSearchTool")),
        ConfigurationError::MissingMethod { class: "KBSearchTool".into(), function: "nope".into() }
    );
    assert_eq!(
        err(ToolSpec::new("echo", "shout")),
        ConfigurationError::UnknownFunction { module: "echo".into(), function: "shout".into() }
    );
}

#[tokio::test]
async fn capability_name_defaults_to_entry_key() {
    let registry = CapabilityRegistry::builtin();
    let ctx = context(Arc::new(ScriptedProvider::constant(MockBehavior::text("ok"))));
    let capability = registry
        .build_capability("repeat", &ToolSpec::new("echo", "echo").with_description("Repeat input"), &ctx)
        .await
        .unwrap();
    assert_eq!(capability.name(), "repeat");
    assert_eq!(capability.description(), "Repeat input");
    assert_eq!(capability.to_llm_tool().name, "repeat");
}

#[tokio::test]
async fn capability_set_skips_failing_entries() {
    let registry = CapabilityRegistry::builtin();
    let ctx = context(Arc::new(ScriptedProvider::constant(MockBehavior::text("ok"))));
    let settings = agent_with(vec![
        ("a_echo", ToolSpec::new("echo", "echo")),
        ("b_kb", kb_spec()),
        ("c_broken", ToolSpec::new("missing_module", "run")),
        ("d_no_prompt", ToolSpec::new("drafting_tool", "draft_tool").with_class("DraftTool")),
    ]);

    let set = registry.build_capability_set(&settings, &ctx).await;
    assert_eq!(set.names(), vec!["a_echo", "b_kb"]);
}

#[tokio::test]
async fn capability_set_skips_malformed_entry() {
    let registry = CapabilityRegistry::builtin();
    let ctx = context(Arc::new(ScriptedProvider::constant(MockBehavior::text("ok"))));
    let mut settings = agent_with(vec![("echo", ToolSpec::new("echo", "echo")), ("kb", kb_spec())]);
    settings.tools.insert("typo".into(), json!({"module": "echo", "fn": "echo"}));
    settings.tools.insert("scalar".into(), json!("echo.echo"));

    let set = registry.build_capability_set(&settings, &ctx).await;
    assert_eq!(set.names(), vec!["echo", "kb"]);
}

#[tokio::test]
async fn capability_set_all_failing_is_empty() {
    let registry = CapabilityRegistry::builtin();
    let ctx = context(Arc::new(ScriptedProvider::constant(MockBehavior::text("ok"))));
    let settings = agent_with(vec![
        ("x", ToolSpec::new("nowhere", "f")),
        ("y", ToolSpec::new("kb_search", "kb_tool").with_class("KBSearchTool")),
    ]);

    let set = registry.build_capability_set(&settings, &ctx).await;
    assert!(set.is_empty());
}

#[tokio::test]
async fn unknown_prompt_id_fails_build() {
    let registry = CapabilityRegistry::builtin();
    let ctx = context(Arc::new(ScriptedProvider::constant(MockBehavior::text("ok"))));
    let spec = kb_spec().with_setting("prompt_id", json!("missing"));
    let err = registry.build_capability("kb", &spec, &ctx).await.unwrap_err();
    assert!(matches!(err, ConfigurationError::Prompt { ref id, .. } if id == "missing"));
}

// ===========================================================================
// Research tools
// ===========================================================================

#[tokio::test]
async fn web_search_scopes_query_and_collects_urls() {
    let search = Arc::new(FixedSearch(vec![
        Document::new("Rule 1   applies.", "https://a.example"),
        Document::new("See [link](https://x) rule 2.", "https://b.example"),
        Document::new("Again.", "https://a.example"),
    ]));
    let settings = json!({"website_url": "site:law.example", "query_prefix": "statute "});
    let tool = WebSearchTool::from_settings(settings.as_object().unwrap(), search);

    assert_eq!(tool.scoped_query("limitation"), "site:law.example statute limitation");
    let output = tool.search("limitation").await.unwrap();
    assert_eq!(output.text, "Rule 1 applies. See rule 2. Again.");
    assert_eq!(output.urls, vec!["https://a.example", "https://b.example"]);
}

#[tokio::test]
async fn web_search_without_backend_reports_error() {
    let registry = CapabilityRegistry::builtin();
    let ctx = context(Arc::new(ScriptedProvider::constant(MockBehavior::text("ok"))));
    let spec = ToolSpec::new("web_search_tool", "wb_tool").with_class("WebSearchTool");
    let capability = registry.build_capability("web", &spec, &ctx).await.unwrap();

    let result = capability.invoke(json!({"query": "anything"})).await;
    assert!(result.is_error());
}

#[tokio::test]
async fn kb_search_feeds_ranked_documents_to_chain() {
    let provider = Arc::new(ScriptedProvider::constant(MockBehavior::text("summary")));
    let kb = Arc::new(
        InMemoryKnowledgeBase::new()
            .with("statutes", Document::new("tenancy notice period is two months", "act-1"))
            .with("statutes", Document::new("unrelated content", "act-2")),
    );
    let ctx = context(provider.clone()).with_knowledge_base(kb);
    let capability = CapabilityRegistry::builtin().build_capability("kb", &kb_spec(), &ctx).await.unwrap();

    let result = capability.invoke(json!({"query": "notice period"})).await;
    assert_eq!(result, ToolResult::text("summary"));

    let requests = provider.requests().await;
    let system = requests[0].system.clone().unwrap();
    assert!(system.contains("Answer notice period"));
    assert!(system.contains("(act-1)"));
    assert!(!system.contains("act-2"));
}

#[tokio::test]
async fn kb_search_chain_failure_degrades_to_message() {
    let provider = Arc::new(ScriptedProvider::constant(MockBehavior::Error("down".into())));
    let ctx = context(provider);
    let capability = CapabilityRegistry::builtin().build_capability("kb", &kb_spec(), &ctx).await.unwrap();

    let result = capability.invoke(json!("anything")).await;
    assert_eq!(result, ToolResult::text("Error executing Knowledge Base Search."));
}

#[tokio::test]
async fn juris_reference_combines_web_and_kb() {
    let provider = Arc::new(ScriptedProvider::constant(MockBehavior::text("reference")));
    let search = Arc::new(FixedSearch(vec![Document::new("web finding", "https://w.example")]));
    let ctx = context(provider.clone()).with_search(search);
    let spec = ToolSpec::new("juris_reference_tool", "juris_tool")
        .with_class("JurisReferenceTool")
        .with_setting("prompt_id", json!("juris-prompt"))
        .with_setting("wb_tool", json!({"website_url": "site:law.example"}))
        .with_setting("kb_search_tool", json!({"index_name": "statutes", "prompt_id": "kb-prompt"}));
    let capability = CapabilityRegistry::builtin().build_capability("juris", &spec, &ctx).await.unwrap();

    let result = capability.invoke(json!({"query": "eviction"})).await;
    assert_eq!(result, ToolResult::text("reference"));

    // kb chain first, then the juris chain
    let requests = provider.requests().await;
    assert_eq!(requests.len(), 2);
    let system = requests[1].system.clone().unwrap();
    assert!(system.starts_with("Question eviction."));
    assert!(system.contains("web finding"));
    assert!(system.contains("https://w.example"));
}

// ===========================================================================
// Drafting and QA
// ===========================================================================

#[tokio::test]
async fn drafting_uses_configured_instructions() {
    let provider = Arc::new(ScriptedProvider::constant(MockBehavior::text("Dear client,")));
    let ctx = context(provider.clone());
    let spec = ToolSpec::new("drafting_tool", "draft_tool")
        .with_class("DraftTool")
        .with_setting("prompt_id", json!("draft-prompt"))
        .with_setting("drafting_instructions", json!("Be formal."));
    let capability = CapabilityRegistry::builtin().build_capability("draft", &spec, &ctx).await.unwrap();

    let result = capability.invoke(json!({"information": "facts"})).await;
    assert_eq!(result, ToolResult::text("Dear client,"));
    let system = provider.requests().await[0].system.clone().unwrap();
    assert_eq!(system, "Draft from facts. Be formal.");
}

#[tokio::test]
async fn qa_failure_degrades_to_message() {
    let ctx = context(Arc::new(ScriptedProvider::constant(MockBehavior::Error("down".into()))));
    let spec = ToolSpec::new("QA_tool", "qa_tool")
        .with_class("QualityAssuranceTool")
        .with_setting("prompt_id", json!("qa-prompt"));
    let capability = CapabilityRegistry::builtin().build_capability("qa", &spec, &ctx).await.unwrap();

    let result = capability
        .invoke(json!({
            "query": "q",
            "reference_data": ["r1"],
            "instructions": ["check citations"],
            "generated_response": "draft"
        }))
        .await;
    assert_eq!(result, ToolResult::text("Error executing Quality Assurance Check"));
}

#[tokio::test]
async fn qa_renders_lists_into_prompt() {
    let provider = Arc::new(ScriptedProvider::constant(MockBehavior::text("looks good")));
    let ctx = context(provider.clone());
    let spec = ToolSpec::new("QA_tool", "qa_tool")
        .with_class("QualityAssuranceTool")
        .with_setting("prompt_id", json!("qa-prompt"));
    let capability = CapabilityRegistry::builtin().build_capability("qa", &spec, &ctx).await.unwrap();

    let result = capability
        .invoke(json!({
            "query": "q",
            "reference_data": ["r1", "r2"],
            "instructions": ["check citations"],
            "generated_response": "draft"
        }))
        .await;
    assert_eq!(result, ToolResult::text("looks good"));
    let system = provider.requests().await[0].system.clone().unwrap();
    assert_eq!(system, "Review draft against - r1\n- r2. - check citations");
}

// ===========================================================================
// Memory
// ===========================================================================

#[tokio::test]
async fn memory_tool_asks_before_adding_field() {
    let index = Arc::new(InMemoryDocumentIndex::new());
    let tool = MemoryActionTool::new(index.clone(), "client-memory");

    let reply = tool.perform("insert", &["prefers email".into()], "preferences").await;
    assert_eq!(reply, FIELD_MISSING);

    let schema = UpdateSchemaTool::new(index.clone(), "client-memory");
    assert_eq!(schema.update("preferences", "text").await, "Task done.");

    let reply = tool.perform("Insert", &["prefers email".into()], "preferences").await;
    assert_eq!(reply, "Insert operation completed.");
    assert_eq!(index.values("client-memory", "preferences"), vec!["prefers email"]);
}

#[tokio::test]
async fn memory_tool_bulk_and_delete() {
    let index = Arc::new(InMemoryDocumentIndex::new());
    index.add_field("m", "facts", "text").await.unwrap();
    let tool = MemoryActionTool::new(index.clone(), "m");

    let items: Vec<String> = vec!["a".into(), "b".into(), "c".into()];
    assert_eq!(tool.perform("insert bulk", &items, "facts").await, "Bulk insert operation completed.");
    assert_eq!(tool.perform("delete", &["b".into()], "facts").await, "Delete operation completed.");
    assert_eq!(index.values("m", "facts"), vec!["a", "c"]);
    assert_eq!(tool.perform("delete bulk", &items, "facts").await, "Bulk delete operation completed.");
    assert!(index.values("m", "facts").is_empty());
}

#[tokio::test]
async fn memory_tool_rejects_unknown_action() {
    let index = Arc::new(InMemoryDocumentIndex::new());
    index.add_field("m", "facts", "text").await.unwrap();
    let tool = MemoryActionTool::new(index, "m");

    let reply = tool.execute(json!({"action": "Purge", "items": ["x"], "location": "facts"})).await;
    assert_eq!(reply, ToolResult::text("Error: Invalid action 'purge'."));
}

#[tokio::test]
async fn memory_factory_requires_index_name() {
    let ctx = context(Arc::new(ScriptedProvider::constant(MockBehavior::text("ok"))));
    let spec = ToolSpec::new("memory_tool", "memory_tool").with_class("MemoryTool");
    let err = CapabilityRegistry::builtin().build_capability("memory", &spec, &ctx).await.unwrap_err();
    assert!(matches!(err, ConfigurationError::InvalidSetting { ref key, .. } if key == "index_name"));
}
