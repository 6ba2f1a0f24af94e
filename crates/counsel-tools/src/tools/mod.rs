//! Individual tool implementations.
//!
//! Each tool is a self-contained module. To add a new tool:
//! 1. Create a new file in this directory
//! 2. Implement the Tool trait and a ToolFactory
//! 3. Add `pub mod <name>;` here
//! 4. Register the factory in CapabilityRegistry::builtin()

pub mod drafting;
pub mod echo;
pub mod juris_reference;
pub mod kb_search;
pub mod memory;
pub mod qa;
pub mod web_search;

use crate::providers::Document;
use serde_json::{json, Value};

/// The free-text input of a single-argument tool.
///
/// Models sometimes send a bare string instead of `{"query": ...}`; both work.
pub(crate) fn query_arg(args: &Value) -> Option<&str> {
    match args {
        Value::String(s) => Some(s.as_str()),
        _ => args
            .get("query")
            .or_else(|| args.get("input"))
            .and_then(Value::as_str),
    }
}

pub(crate) fn query_schema(description: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            "query": {
                "type": "string",
                "description": description
            }
        },
        "required": ["query"]
    })
}

/// Render any JSON value as prompt text.
pub(crate) fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|v| format!("- {}", value_to_text(v)))
            .collect::<Vec<_>>()
            .join("\n"),
        other => serde_json::to_string_pretty(other).unwrap_or_default(),
    }
}

pub(crate) fn format_documents(documents: &[Document]) -> String {
    documents
        .iter()
        .enumerate()
        .map(|(i, d)| format!("[{}] ({})\n{}", i + 1, d.source, d.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}
