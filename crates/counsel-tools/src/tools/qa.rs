//! Quality assurance tool: review a generated answer against reference data

use super::web_search::WebSearchTool;
use crate::factory::{ToolContext, ToolFactory};
use crate::registry::{Tool, ToolResult};
use counsel_core::{setting_map, ConfigurationError, ToolSpec};
use counsel_llm::prompt::PromptVars;
use counsel_llm::PromptChain;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info, warn};

pub const QA_FAILED: &str = "Error executing Quality Assurance Check";

pub struct QualityAssuranceTool {
    web: WebSearchTool,
    chain: PromptChain,
}

impl QualityAssuranceTool {
    /// Review `generated_response`. Web results are added to the reference data.
    pub async fn review(&self, query: &str, reference_data: &Value, instructions: &Value, generated_response: &str) -> String {
        info!("Executing Quality Assurance check for data: {}", generated_response);

        let web = match self.web.search(query).await {
            Ok(output) => output.render(),
            Err(e) => {
                warn!("Quality Assurance web search failed: {}", e);
                String::new()
            }
        };

        let mut reference = super::value_to_text(reference_data);
        if !web.is_empty() {
            if !reference.is_empty() {
                reference.push_str("\n\n");
            }
            reference.push_str(&web);
        }

        let mut vars = PromptVars::new();
        vars.insert("query".into(), query.to_string());
        vars.insert("reference_data".into(), reference);
        vars.insert("instructions".into(), super::value_to_text(instructions));
        vars.insert("data".into(), generated_response.to_string());

        match self.chain.invoke(&vars).await {
            Ok(text) => {
                info!("Quality Assurance Check and Processing completed.");
                text
            }
            Err(e) => {
                error!("Error executing Quality Assurance Check: {}", e);
                QA_FAILED.to_string()
            }
        }
    }
}

#[async_trait::async_trait]
impl Tool for QualityAssuranceTool {
    fn name(&self) -> &str {
        "qa_tool"
    }

    fn description(&self) -> &str {
        "Check a generated response against reference data and instructions; returns recommendations."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "The user's original query" },
                "reference_data": { "type": "array", "items": { "type": "string" }, "description": "Reference material" },
                "instructions": { "type": "array", "items": { "type": "string" }, "description": "Checks to perform" },
                "generated_response": { "type": "string", "description": "The response to review" }
            },
            "required": ["query", "generated_response"]
        })
    }

    async fn execute(&self, args: Value) -> ToolResult {
        let query = match args.get("query").and_then(Value::as_str) {
            Some(q) => q,
            None => return ToolResult::error("Missing required parameter: query"),
        };
        let generated = match args.get("generated_response").and_then(Value::as_str) {
            Some(g) => g,
            None => return ToolResult::error("Missing required parameter: generated_response"),
        };
        let reference = args.get("reference_data").cloned().unwrap_or(Value::Null);
        let instructions = args.get("instructions").cloned().unwrap_or(Value::Null);

        ToolResult::text(self.review(query, &reference, &instructions, generated).await)
    }
}

pub struct QualityAssuranceFactory;

#[async_trait::async_trait]
impl ToolFactory for QualityAssuranceFactory {
    async fn build(&self, spec: &ToolSpec, ctx: &ToolContext) -> Result<Arc<dyn Tool>, ConfigurationError> {
        let web = WebSearchTool::from_settings(&setting_map(&spec.settings, "wb_tool"), ctx.search.clone());
        let chain = ctx.chain(&spec.settings).await?;
        Ok(Arc::new(QualityAssuranceTool { web, chain }))
    }
}
