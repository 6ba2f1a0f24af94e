//! Memory tool: long-term facts kept in a document index
//!
//! Two capabilities share one index: `memory_tool` performs an action on a
//! field, `update_schema` adds a missing field once the user agrees.

use crate::factory::{ToolContext, ToolFactory};
use crate::providers::DocumentIndex;
use crate::registry::{Tool, ToolResult};
use counsel_core::{setting_str, ConfigurationError, ToolSpec};
use serde_json::{json, Map, Value};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info, warn};

pub const FIELD_MISSING: &str = "The field is not in the index. Would you like me to add it?";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryAction {
    Insert,
    Delete,
    Add,
    Append,
    InsertBulk,
    DeleteBulk,
}

impl FromStr for MemoryAction {
    type Err = String;

    /// Case and surrounding whitespace are ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        match normalized.as_str() {
            "insert" => Ok(Self::Insert),
            "delete" => Ok(Self::Delete),
            "add" => Ok(Self::Add),
            "append" => Ok(Self::Append),
            "insert bulk" => Ok(Self::InsertBulk),
            "delete bulk" => Ok(Self::DeleteBulk),
            _ => Err(normalized),
        }
    }
}

impl MemoryAction {
    fn is_delete(self) -> bool {
        matches!(self, Self::Delete | Self::DeleteBulk)
    }

    fn success(self) -> &'static str {
        match self {
            Self::Insert | Self::Add | Self::Append => "Insert operation completed.",
            Self::Delete => "Delete operation completed.",
            Self::InsertBulk => "Bulk insert operation completed.",
            Self::DeleteBulk => "Bulk delete operation completed.",
        }
    }

    fn failure(self) -> &'static str {
        match self {
            Self::Insert | Self::Add | Self::Append => "Error inserting items.",
            Self::Delete => "Error deleting items.",
            Self::InsertBulk => "Error performing bulk insert.",
            Self::DeleteBulk => "Error performing bulk delete.",
        }
    }
}

fn index_name(settings: &Map<String, Value>) -> Result<String, ConfigurationError> {
    setting_str(settings, "index_name")
        .map(str::to_string)
        .ok_or_else(|| ConfigurationError::invalid_setting("index_name", "missing"))
}

fn string_items(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
            .collect(),
        Some(Value::String(s)) => vec![s.clone()],
        _ => Vec::new(),
    }
}

pub struct MemoryActionTool {
    index: Arc<dyn DocumentIndex>,
    index_name: String,
}

impl MemoryActionTool {
    pub fn new(index: Arc<dyn DocumentIndex>, index_name: impl Into<String>) -> Self {
        Self { index, index_name: index_name.into() }
    }

    /// Apply `action` to `items` under field `location`.
    pub async fn perform(&self, action: &str, items: &[String], location: &str) -> String {
        info!("MemoryTool action='{}', items={:?}, location='{}'", action, items, location);

        let exists = match self.index.field_exists(&self.index_name, location).await {
            Ok(exists) => exists,
            Err(e) => {
                error!("Error checking field existence in index: {}", e);
                false
            }
        };
        if !exists {
            warn!(
                "Field '{}' does not exist in index '{}'. Prompting user to add the field...",
                location, self.index_name
            );
            return FIELD_MISSING.to_string();
        }

        let action = match action.parse::<MemoryAction>() {
            Ok(action) => action,
            Err(name) => {
                error!("Invalid action '{}' requested.", name);
                return format!("Error: Invalid action '{}'.", name);
            }
        };

        let outcome = if action.is_delete() {
            self.index.delete(&self.index_name, location, items).await
        } else {
            self.index.insert(&self.index_name, location, items).await
        };
        match outcome {
            Ok(_) => action.success().to_string(),
            Err(e) => {
                error!("{} {}", action.failure(), e);
                action.failure().to_string()
            }
        }
    }
}

#[async_trait::async_trait]
impl Tool for MemoryActionTool {
    fn name(&self) -> &str {
        "memory_tool"
    }

    fn description(&self) -> &str {
        "Store or remove facts in long-term memory. Actions: insert, delete, add, append, insert bulk, delete bulk."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": { "type": "string", "description": "insert, delete, add, append, insert bulk or delete bulk" },
                "items": { "type": "array", "items": { "type": "string" } },
                "location": { "type": "string", "description": "Field the items belong to" }
            },
            "required": ["action", "items", "location"]
        })
    }

    async fn execute(&self, args: Value) -> ToolResult {
        let action = match args.get("action").and_then(Value::as_str) {
            Some(a) => a,
            None => return ToolResult::error("Missing required parameter: action"),
        };
        let location = match args.get("location").and_then(Value::as_str) {
            Some(l) => l,
            None => return ToolResult::error("Missing required parameter: location"),
        };
        let items = string_items(args.get("items"));
        ToolResult::text(self.perform(action, &items, location).await)
    }
}

pub struct UpdateSchemaTool {
    index: Arc<dyn DocumentIndex>,
    index_name: String,
}

impl UpdateSchemaTool {
    pub fn new(index: Arc<dyn DocumentIndex>, index_name: impl Into<String>) -> Self {
        Self { index, index_name: index_name.into() }
    }

    pub async fn update(&self, location: &str, field_type: &str) -> String {
        match self.index.add_field(&self.index_name, location, field_type).await {
            Ok(()) => {
                info!("Schema updated: added field '{}' to '{}'", location, self.index_name);
                "Task done.".to_string()
            }
            Err(e) => {
                error!("Schema update failed: {}", e);
                "Error updating schema.".to_string()
            }
        }
    }
}

#[async_trait::async_trait]
impl Tool for UpdateSchemaTool {
    fn name(&self) -> &str {
        "update_schema"
    }

    fn description(&self) -> &str {
        "Add a new field to long-term memory. Only call after the user agreed."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "location": { "type": "string", "description": "Name of the field to add" },
                "field_type": { "type": "string", "description": "Field type, default text" }
            },
            "required": ["location"]
        })
    }

    async fn execute(&self, args: Value) -> ToolResult {
        let location = match args.get("location").and_then(Value::as_str) {
            Some(l) => l,
            None => return ToolResult::error("Missing required parameter: location"),
        };
        let field_type = args.get("field_type").and_then(Value::as_str).unwrap_or("text");
        ToolResult::text(self.update(location, field_type).await)
    }
}

pub struct MemoryActionFactory;

#[async_trait::async_trait]
impl ToolFactory for MemoryActionFactory {
    async fn build(&self, spec: &ToolSpec, ctx: &ToolContext) -> Result<Arc<dyn Tool>, ConfigurationError> {
        Ok(Arc::new(MemoryActionTool::new(ctx.index.clone(), index_name(&spec.settings)?)))
    }
}

pub struct UpdateSchemaFactory;

#[async_trait::async_trait]
impl ToolFactory for UpdateSchemaFactory {
    async fn build(&self, spec: &ToolSpec, ctx: &ToolContext) -> Result<Arc<dyn Tool>, ConfigurationError> {
        Ok(Arc::new(UpdateSchemaTool::new(ctx.index.clone(), index_name(&spec.settings)?)))
    }
}
