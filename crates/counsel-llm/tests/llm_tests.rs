//! Tests for counsel-llm: request types, completion collection, prompt store, chains, and the mock provider

use counsel_llm::mock::{MockBehavior, ScriptedProvider};
use counsel_llm::prompt::PromptVars;
use counsel_llm::*;
use serde_json::json;
use std::sync::Arc;

// ===========================================================================
// Request types
// ===========================================================================

#[test]
fn llm_request_default() {
    let req = LlmRequest::default();
    assert_eq!(req.model, DEFAULT_MODEL);
    assert!(req.messages.is_empty());
    assert!(req.tools.is_none());
    assert!(req.tool_choice.is_none());
    assert_eq!(req.max_tokens, Some(4096));
}

#[test]
fn model_settings_prefill_request() {
    let settings = ModelSettings { model: "claude-haiku".into(), max_tokens: 512, temperature: Some(0.0) };
    let req = settings.request();
    assert_eq!(req.model, "claude-haiku");
    assert_eq!(req.max_tokens, Some(512));
    assert_eq!(req.temperature, Some(0.0));
}

#[test]
fn tool_choice_serde() {
    assert_eq!(serde_json::to_value(ToolChoice::tool("route")).unwrap(), json!({"type": "tool", "name": "route"}));
    assert_eq!(serde_json::to_value(ToolChoice::Auto).unwrap(), json!({"type": "auto"}));
    assert_eq!(serde_json::to_value(ToolChoice::None).unwrap(), json!({"type": "none"}));
}

#[test]
fn content_block_tool_result_no_error_skipped() {
    let block = ContentBlock::ToolResult { tool_use_id: "t1".into(), content: "ok".into(), is_error: None };
    let json = serde_json::to_value(&block).unwrap();
    assert_eq!(json, json!({"type": "tool_result", "tool_use_id": "t1", "content": "ok"}));
}

#[test]
fn accumulated_tool_call_empty_arguments() {
    let call = AccumulatedToolCall { id: "t".into(), name: "route".into(), arguments: "  ".into() };
    assert_eq!(call.parse_arguments().unwrap(), json!({}));
    let bad = AccumulatedToolCall { arguments: "{not json".into(), ..Default::default() };
    assert!(bad.parse_arguments().is_err());
}

#[test]
fn merge_consecutive_roles_joins_text() {
    let merged = merge_consecutive_roles(&[
        LlmMessage::user("query"),
        LlmMessage::user("[research_agent]: notes"),
        LlmMessage::assistant("answer"),
    ]);
    assert_eq!(merged.len(), 2);
    assert_eq!(merged[0].text(), "query\n\n[research_agent]: notes");
    assert_eq!(merged[1].role, Role::Assistant);
}

#[test]
fn merge_consecutive_roles_mixes_blocks() {
    let merged = merge_consecutive_roles(&[
        LlmMessage::user(vec![ContentBlock::ToolResult { tool_use_id: "t".into(), content: "r".into(), is_error: None }]),
        LlmMessage::user("follow-up"),
    ]);
    assert_eq!(merged.len(), 1);
    match &merged[0].content {
        LlmContent::Blocks(blocks) => assert_eq!(blocks.len(), 2),
        other => panic!("expected blocks, got {:?}", other),
    }
}

// ===========================================================================
// ScriptedProvider + collect_completion
// ===========================================================================

#[tokio::test]
async fn scripted_text_is_collected_whole() {
    let long = "a".repeat(45);
    let provider = ScriptedProvider::constant(MockBehavior::text(long.clone()));
    let completion = provider.complete(LlmRequest::default()).await.unwrap();
    assert_eq!(completion.text, long);
    assert!(!completion.has_tool_calls());
    assert_eq!(completion.stop_reason.as_deref(), Some("end_turn"));
}

#[tokio::test]
async fn scripted_route_is_a_tool_call() {
    let provider = ScriptedProvider::constant(MockBehavior::route("research_agent"));
    let completion = provider.complete(LlmRequest::default()).await.unwrap();
    let call = completion.tool_call("route").unwrap();
    assert_eq!(call.parse_arguments().unwrap(), json!({"next": "research_agent"}));
    assert_eq!(completion.stop_reason.as_deref(), Some("tool_use"));
}

#[tokio::test]
async fn scripted_sequence_then_exhausted() {
    let provider = ScriptedProvider::sequence(vec![MockBehavior::text("one"), MockBehavior::Error("down".into())]);
    assert_eq!(provider.complete(LlmRequest::default()).await.unwrap().text, "one");
    assert!(matches!(provider.complete(LlmRequest::default()).await, Err(LlmError::RequestFailed(_))));
    assert!(provider.complete(LlmRequest::default()).await.unwrap().text.contains("exhausted"));
    assert_eq!(provider.call_count().await, 3);
}

#[tokio::test]
async fn stream_error_aborts_completion() {
    let stream: LlmStream = Box::pin(futures::stream::iter(vec![
        Ok(StreamDelta::Text("partial".into())),
        Ok(StreamDelta::Error("connection reset".into())),
    ]));
    let result = provider::collect_completion(stream).await;
    assert!(matches!(result, Err(LlmError::StreamError(_))));
}

// ===========================================================================
// Prompt store
// ===========================================================================

#[tokio::test]
async fn in_memory_prompt_store_not_found() {
    let store = InMemoryPromptStore::new().with(PromptTemplate::new("a", "system a"));
    assert_eq!(store.get_prompt("a").await.unwrap().system, "system a");
    assert_eq!(store.get_prompt("b").await.unwrap_err(), PromptError::NotFound("b".into()));
}

#[tokio::test]
async fn file_prompt_store_reads_toml() {
    let dir = tempfile::tempdir().unwrap();
    let store = FilePromptStore::new(dir.path());
    std::fs::write(
        store.path_for("owner/research-agent"),
        "system = \"You research {topic}.\"\nhuman = \"Question: {query}\"\n",
    )
    .unwrap();

    let prompt = store.get_prompt("owner/research-agent").await.unwrap();
    assert_eq!(prompt.id, "owner/research-agent");
    assert!(store.path_for("owner/research-agent").ends_with("owner__research-agent.toml"));

    let mut vars = PromptVars::new();
    vars.insert("topic".into(), "tenancy".into());
    vars.insert("query".into(), "notice?".into());
    assert_eq!(prompt.render_system(&vars), "You research tenancy.");
    assert_eq!(prompt.render_human(&vars).as_deref(), Some("Question: notice?"));
}

#[tokio::test]
async fn file_prompt_store_invalid_and_missing() {
    let dir = tempfile::tempdir().unwrap();
    let store = FilePromptStore::new(dir.path());
    std::fs::write(store.path_for("broken"), "no system key here = [").unwrap();

    assert!(matches!(store.get_prompt("broken").await, Err(PromptError::Invalid { .. })));
    assert_eq!(store.get_prompt("absent").await.unwrap_err(), PromptError::NotFound("absent".into()));
}

// ===========================================================================
// PromptChain
// ===========================================================================

#[tokio::test]
async fn chain_renders_system_and_human() {
    let provider = Arc::new(ScriptedProvider::constant(MockBehavior::text("drafted")));
    let prompt = PromptTemplate::new("p", "Draft for {client}.").with_human("{information}");
    let chain = PromptChain::new(prompt, provider.clone(), ModelSettings::default());

    let mut vars = PromptVars::new();
    vars.insert("client".into(), "Acme".into());
    vars.insert("information".into(), "facts".into());
    assert_eq!(chain.invoke(&vars).await.unwrap(), "drafted");

    let request = &provider.requests().await[0];
    assert_eq!(request.system.as_deref(), Some("Draft for Acme."));
    assert_eq!(request.messages.len(), 1);
    assert_eq!(request.messages[0].text(), "facts");
}

#[tokio::test]
async fn chain_without_human_sends_variables() {
    let provider = Arc::new(ScriptedProvider::constant(MockBehavior::text("ok")));
    let chain = PromptChain::new(PromptTemplate::new("p", "Review."), provider.clone(), ModelSettings::default());

    let mut vars = PromptVars::new();
    vars.insert("data".into(), "draft".into());
    vars.insert("query".into(), "q".into());
    chain.invoke(&vars).await.unwrap();

    assert_eq!(provider.requests().await[0].messages[0].text(), "data:\ndraft\n\nquery:\nq");
}

#[tokio::test]
async fn chain_from_store_missing_prompt() {
    let provider: Arc<dyn LlmProvider> = Arc::new(ScriptedProvider::constant(MockBehavior::text("ok")));
    let store = InMemoryPromptStore::new();
    let err = PromptChain::from_store(&store, "missing", provider, ModelSettings::default()).await.err().unwrap();
    assert_eq!(err, PromptError::NotFound("missing".into()));
}

// ===========================================================================
// AnthropicProvider
// ===========================================================================

#[tokio::test]
async fn anthropic_provider_unreachable_endpoint_fails() {
    let provider = AnthropicProvider::new("sk-test").with_base_url("http://127.0.0.1:9/v1/messages");
    assert_eq!(provider.name(), "anthropic");
    let request = LlmRequest { messages: vec![LlmMessage::user("hello")], ..Default::default() };
    assert!(provider.complete_stream(request).await.is_err());
}
