//! Drafting tool

use crate::factory::{ToolContext, ToolFactory};
use crate::registry::{Tool, ToolResult};
use counsel_core::{setting_str, ConfigurationError, ToolSpec};
use counsel_llm::prompt::PromptVars;
use counsel_llm::PromptChain;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info};

pub const DRAFT_FAILED: &str = "Error executing Drafting Tool.";

pub struct DraftTool {
    chain: PromptChain,
    drafting_instructions: String,
}

impl DraftTool {
    pub async fn draft(&self, information: &Value) -> String {
        info!("Executing Drafting Tool with instructions: {} and reference data.", self.drafting_instructions);

        let mut vars = PromptVars::new();
        vars.insert("information".into(), super::value_to_text(information));
        vars.insert("drafting_instructions".into(), self.drafting_instructions.clone());

        match self.chain.invoke(&vars).await {
            Ok(text) => {
                info!("Drafting and chain processing completed.");
                text
            }
            Err(e) => {
                error!("Error executing Drafting Tool: {}", e);
                DRAFT_FAILED.to_string()
            }
        }
    }
}

#[async_trait::async_trait]
impl Tool for DraftTool {
    fn name(&self) -> &str {
        "draft_tool"
    }

    fn description(&self) -> &str {
        "Draft a response from the gathered information."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "information": {
                    "type": "object",
                    "description": "Everything the draft should be based on"
                }
            },
            "required": ["information"]
        })
    }

    async fn execute(&self, args: Value) -> ToolResult {
        let information = match &args {
            Value::Object(map) => map.get("information").cloned().unwrap_or_else(|| args.clone()),
            other => other.clone(),
        };
        ToolResult::text(self.draft(&information).await)
    }
}

pub struct DraftFactory;

#[async_trait::async_trait]
impl ToolFactory for DraftFactory {
    async fn build(&self, spec: &ToolSpec, ctx: &ToolContext) -> Result<Arc<dyn Tool>, ConfigurationError> {
        Ok(Arc::new(DraftTool {
            chain: ctx.chain(&spec.settings).await?,
            drafting_instructions: setting_str(&spec.settings, "drafting_instructions")
                .unwrap_or_default()
                .to_string(),
        }))
    }
}
