//! Echo tool: returns its input unchanged

use crate::registry::{Tool, ToolResult};
use serde_json::Value;

pub struct EchoTool;

#[async_trait::async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Return the query unchanged."
    }

    fn input_schema(&self) -> Value {
        super::query_schema("Text to echo back")
    }

    async fn execute(&self, args: Value) -> ToolResult {
        match super::query_arg(&args) {
            Some(q) => ToolResult::text(q),
            None => ToolResult::error("Missing required parameter: query"),
        }
    }
}
