//! External search and storage capabilities, behind narrow traits.
//!
//! Tools only see these traits. Concrete SDK-backed implementations live in
//! sibling modules; the in-memory ones double as test fixtures.

pub mod memory;
pub mod serper;

pub use memory::{InMemoryDocumentIndex, InMemoryKnowledgeBase};
pub use serper::SerperSearch;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("not configured: {0}")]
    Unavailable(String),

    #[error("unknown index: {0}")]
    UnknownIndex(String),
}

/// A ranked search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub content: String,
    pub source: String,
}

impl Document {
    pub fn new(content: impl Into<String>, source: impl Into<String>) -> Self {
        Self { content: content.into(), source: source.into() }
    }
}

#[async_trait::async_trait]
pub trait SearchProvider: Send + Sync {
    /// Ranked results for a free-text web query.
    async fn search(&self, query: &str) -> Result<Vec<Document>, ProviderError>;
}

#[async_trait::async_trait]
pub trait KnowledgeBase: Send + Sync {
    /// Up to `k` documents from `index` ranked by similarity to `query`.
    async fn similarity_search(&self, index: &str, query: &str, k: usize) -> Result<Vec<Document>, ProviderError>;
}

/// Field-addressed document storage used by the memory tool.
#[async_trait::async_trait]
pub trait DocumentIndex: Send + Sync {
    async fn field_exists(&self, index: &str, field: &str) -> Result<bool, ProviderError>;
    async fn add_field(&self, index: &str, field: &str, field_type: &str) -> Result<(), ProviderError>;
    /// One document per item, each holding `field = item`.
    async fn insert(&self, index: &str, field: &str, items: &[String]) -> Result<usize, ProviderError>;
    /// Remove documents whose `field` matches any item.
    async fn delete(&self, index: &str, field: &str, items: &[String]) -> Result<usize, ProviderError>;
}

/// Stand-in used when no search backend is configured; every query fails.
pub struct UnconfiguredSearch;

#[async_trait::async_trait]
impl SearchProvider for UnconfiguredSearch {
    async fn search(&self, _query: &str) -> Result<Vec<Document>, ProviderError> {
        Err(ProviderError::Unavailable("web search".into()))
    }
}
