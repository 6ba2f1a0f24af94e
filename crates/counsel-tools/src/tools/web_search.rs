//! Web search tool: scoped web search with cleaned text and source URLs

use crate::factory::{ToolContext, ToolFactory};
use crate::providers::{ProviderError, SearchProvider};
use crate::registry::{Tool, ToolResult};
use counsel_core::{setting_str, ConfigurationError, ToolSpec};
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::{Arc, OnceLock};
use tracing::{debug, info};

/// Cleaned search text plus the distinct source URLs, first-seen order.
#[derive(Debug, Clone, PartialEq)]
pub struct WebSearchOutput {
    pub text: String,
    pub urls: Vec<String>,
}

impl WebSearchOutput {
    pub fn render(&self) -> String {
        if self.urls.is_empty() {
            return self.text.clone();
        }
        let sources: Vec<String> = self.urls.iter().map(|u| format!("- {}", u)).collect();
        format!("{}\n\nSources:\n{}", self.text, sources.join("\n"))
    }
}

pub struct WebSearchTool {
    search: Arc<dyn SearchProvider>,
    website_url: String,
    query_prefix: String,
}

impl WebSearchTool {
    pub fn from_settings(settings: &Map<String, Value>, search: Arc<dyn SearchProvider>) -> Self {
        Self {
            search,
            website_url: setting_str(settings, "website_url").unwrap_or_default().to_string(),
            query_prefix: setting_str(settings, "query_prefix").unwrap_or_default().to_string(),
        }
    }

    /// The query actually sent: `<website_url> <query_prefix><query>`.
    pub fn scoped_query(&self, query: &str) -> String {
        format!("{} {}{}", self.website_url, self.query_prefix, query)
            .trim()
            .to_string()
    }

    pub async fn search(&self, query: &str) -> Result<WebSearchOutput, ProviderError> {
        let scoped = self.scoped_query(query);
        debug!("Performing search with query: {}", scoped);
        let documents = self.search.search(&scoped).await?;

        let raw: Vec<&str> = documents.iter().map(|d| d.content.as_str()).collect();
        let mut urls: Vec<String> = Vec::new();
        for d in &documents {
            if !d.source.is_empty() && !urls.contains(&d.source) {
                urls.push(d.source.clone());
            }
        }

        info!("Search performed successfully, extracted {} URLs.", urls.len());
        Ok(WebSearchOutput { text: clean_text(&raw.join(" ")), urls })
    }
}

/// Drop markdown links and collapse whitespace.
pub fn clean_text(text: &str) -> String {
    static MD_LINK: OnceLock<Regex> = OnceLock::new();
    static WHITESPACE: OnceLock<Regex> = OnceLock::new();
    let md_link = MD_LINK.get_or_init(|| Regex::new(r"\[.*?\]\(.*?\)").unwrap());
    let whitespace = WHITESPACE.get_or_init(|| Regex::new(r"\s+").unwrap());

    let without_links = md_link.replace_all(text, "");
    whitespace.replace_all(&without_links, " ").trim().to_string()
}

#[async_trait::async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "wb_tool"
    }

    fn description(&self) -> &str {
        "Search the web. Returns cleaned result text and the source URLs."
    }

    fn input_schema(&self) -> Value {
        super::query_schema("Search query")
    }

    async fn execute(&self, args: Value) -> ToolResult {
        let query = match super::query_arg(&args) {
            Some(q) => q,
            None => return ToolResult::error("Missing required parameter: query"),
        };
        info!("Executing web search for query: {}", query);
        match self.search(query).await {
            Ok(output) => ToolResult::text(output.render()),
            Err(e) => ToolResult::error(format!("Web search failed: {}", e)),
        }
    }
}

pub struct WebSearchFactory;

#[async_trait::async_trait]
impl ToolFactory for WebSearchFactory {
    async fn build(&self, spec: &ToolSpec, ctx: &ToolContext) -> Result<Arc<dyn Tool>, ConfigurationError> {
        Ok(Arc::new(WebSearchTool::from_settings(&spec.settings, ctx.search.clone())))
    }
}
