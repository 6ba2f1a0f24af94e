//! Knowledge-base search tool: similarity search summarised by a prompt chain

use crate::factory::{ToolContext, ToolFactory};
use crate::providers::KnowledgeBase;
use crate::registry::{Tool, ToolResult};
use counsel_core::{setting_str, ConfigurationError, ToolSpec};
use counsel_llm::prompt::PromptVars;
use counsel_llm::PromptChain;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{error, info, warn};

const DEFAULT_K: usize = 5;
pub const KB_SEARCH_FAILED: &str = "Error executing Knowledge Base Search.";

pub struct KbSearchTool {
    knowledge: Arc<dyn KnowledgeBase>,
    index_name: String,
    k: usize,
    chain: PromptChain,
}

impl KbSearchTool {
    pub async fn from_settings(settings: &Map<String, Value>, ctx: &ToolContext) -> Result<Self, ConfigurationError> {
        let index_name = setting_str(settings, "index_name")
            .ok_or_else(|| ConfigurationError::invalid_setting("index_name", "missing"))?
            .to_string();
        let k = settings
            .get("k")
            .and_then(Value::as_u64)
            .map(|k| k as usize)
            .unwrap_or(DEFAULT_K);
        Ok(Self {
            knowledge: ctx.knowledge.clone(),
            index_name,
            k,
            chain: ctx.chain(settings).await?,
        })
    }

    /// Search and summarise. Never fails: search errors yield no documents,
    /// chain errors yield [`KB_SEARCH_FAILED`].
    pub async fn run(&self, query: &str) -> String {
        info!("Executing Knowledge Base search for query: {}", query);
        let documents = match self.knowledge.similarity_search(&self.index_name, query, self.k).await {
            Ok(docs) => docs,
            Err(e) => {
                warn!("Error fetching Knowledge Base search results: {}", e);
                Vec::new()
            }
        };

        let mut vars = PromptVars::new();
        vars.insert("query".into(), query.to_string());
        vars.insert("documents".into(), super::format_documents(&documents));

        match self.chain.invoke(&vars).await {
            Ok(text) => text,
            Err(e) => {
                error!("Error executing Knowledge Base Search: {}", e);
                KB_SEARCH_FAILED.to_string()
            }
        }
    }
}

#[async_trait::async_trait]
impl Tool for KbSearchTool {
    fn name(&self) -> &str {
        "kb_tool"
    }

    fn description(&self) -> &str {
        "Search the knowledge base and summarise the matching documents."
    }

    fn input_schema(&self) -> Value {
        super::query_schema("What to look up in the knowledge base")
    }

    async fn execute(&self, args: Value) -> ToolResult {
        match super::query_arg(&args) {
            Some(q) => ToolResult::text(self.run(q).await),
            None => ToolResult::error("Missing required parameter: query"),
        }
    }
}

pub struct KbSearchFactory;

#[async_trait::async_trait]
impl ToolFactory for KbSearchFactory {
    async fn build(&self, spec: &ToolSpec, ctx: &ToolContext) -> Result<Arc<dyn Tool>, ConfigurationError> {
        Ok(Arc::new(KbSearchTool::from_settings(&spec.settings, ctx).await?))
    }
}
