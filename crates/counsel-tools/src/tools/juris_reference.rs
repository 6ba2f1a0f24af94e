//! Jurisdiction reference tool: web and knowledge-base research combined

use super::kb_search::KbSearchTool;
use super::web_search::WebSearchTool;
use crate::factory::{ToolContext, ToolFactory};
use crate::registry::{Tool, ToolResult};
use counsel_core::{setting_map, ConfigurationError, ToolSpec};
use counsel_llm::prompt::PromptVars;
use counsel_llm::PromptChain;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::info;

pub struct JurisReferenceTool {
    web: WebSearchTool,
    kb: KbSearchTool,
    chain: PromptChain,
}

impl JurisReferenceTool {
    /// `wb_tool` and `kb_search_tool` hold the nested tools' settings.
    pub async fn from_settings(settings: &Map<String, Value>, ctx: &ToolContext) -> Result<Self, ConfigurationError> {
        let web = WebSearchTool::from_settings(&setting_map(settings, "wb_tool"), ctx.search.clone());
        let kb = KbSearchTool::from_settings(&setting_map(settings, "kb_search_tool"), ctx).await?;
        let chain = ctx.chain(settings).await?;
        Ok(Self { web, kb, chain })
    }
}

#[async_trait::async_trait]
impl Tool for JurisReferenceTool {
    fn name(&self) -> &str {
        "juris_tool"
    }

    fn description(&self) -> &str {
        "Research a legal question using web sources and the knowledge base."
    }

    fn input_schema(&self) -> Value {
        super::query_schema("The legal question to research")
    }

    async fn execute(&self, args: Value) -> ToolResult {
        let query = match super::query_arg(&args) {
            Some(q) => q,
            None => return ToolResult::error("Missing required parameter: query"),
        };
        info!("Executing Juris Reference search for query: {}", query);

        let web = match self.web.search(query).await {
            Ok(output) => output.render(),
            Err(e) => return ToolResult::error(format!("Web search failed: {}", e)),
        };
        let kb = self.kb.run(query).await;

        let mut vars = PromptVars::new();
        vars.insert("input".into(), query.to_string());
        vars.insert(
            "documents".into(),
            format!("Web results:\n{}\n\nKnowledge base:\n{}", web, kb),
        );

        match self.chain.invoke(&vars).await {
            Ok(text) => {
                info!("Juris Reference search and chain processing completed.");
                ToolResult::text(text)
            }
            Err(e) => ToolResult::error(format!("Juris reference chain failed: {}", e)),
        }
    }
}

pub struct JurisReferenceFactory;

#[async_trait::async_trait]
impl ToolFactory for JurisReferenceFactory {
    async fn build(&self, spec: &ToolSpec, ctx: &ToolContext) -> Result<Arc<dyn Tool>, ConfigurationError> {
        Ok(Arc::new(JurisReferenceTool::from_settings(&spec.settings, ctx).await?))
    }
}
