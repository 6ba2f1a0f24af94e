//! Counsel Tools: capabilities, the tool factory, and the providers tools call
//!
//! Each tool is a self-contained file in src/tools/. Tools become reachable
//! from configuration by registering a factory in `CapabilityRegistry::builtin()`.

pub mod factory;
pub mod providers;
pub mod registry;
pub mod tools;

pub use factory::{CapabilityRegistry, FnFactory, ToolContext, ToolFactory};
pub use providers::{
    Document, DocumentIndex, InMemoryDocumentIndex, InMemoryKnowledgeBase, KnowledgeBase,
    ProviderError, SearchProvider, SerperSearch, UnconfiguredSearch,
};
pub use registry::{Capability, CapabilitySet, Tool, ToolResult};
