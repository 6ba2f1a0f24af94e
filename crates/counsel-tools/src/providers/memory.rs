//! In-process knowledge base and document index

use super::{Document, DocumentIndex, KnowledgeBase, ProviderError};
use dashmap::DashMap;
use std::collections::{BTreeMap, HashSet};

/// Knowledge base ranking documents by query-term overlap.
#[derive(Default)]
pub struct InMemoryKnowledgeBase {
    indexes: DashMap<String, Vec<Document>>,
}

impl InMemoryKnowledgeBase {
    pub fn new() -> Self { Self::default() }

    pub fn add(&self, index: &str, document: Document) {
        self.indexes.entry(index.to_string()).or_default().push(document);
    }

    pub fn with(self, index: &str, document: Document) -> Self {
        self.add(index, document);
        self
    }
}

fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

#[async_trait::async_trait]
impl KnowledgeBase for InMemoryKnowledgeBase {
    async fn similarity_search(&self, index: &str, query: &str, k: usize) -> Result<Vec<Document>, ProviderError> {
        let documents = self
            .indexes
            .get(index)
            .ok_or_else(|| ProviderError::UnknownIndex(index.to_string()))?;
        let query_terms = terms(query);

        let mut scored: Vec<(usize, &Document)> = documents
            .iter()
            .map(|d| (terms(&d.content).intersection(&query_terms).count(), d))
            .filter(|(score, _)| *score > 0)
            .collect();
        // Stable sort keeps insertion order among equal scores.
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        Ok(scored.into_iter().take(k).map(|(_, d)| d.clone()).collect())
    }
}

#[derive(Default)]
struct IndexData {
    fields: BTreeMap<String, String>,
    documents: Vec<BTreeMap<String, String>>,
}

#[derive(Default)]
pub struct InMemoryDocumentIndex {
    indexes: DashMap<String, IndexData>,
}

impl InMemoryDocumentIndex {
    pub fn new() -> Self { Self::default() }

    /// Values of `field` across all documents in `index`, in insertion order.
    pub fn values(&self, index: &str, field: &str) -> Vec<String> {
        self.indexes
            .get(index)
            .map(|data| data.documents.iter().filter_map(|d| d.get(field).cloned()).collect())
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl DocumentIndex for InMemoryDocumentIndex {
    async fn field_exists(&self, index: &str, field: &str) -> Result<bool, ProviderError> {
        Ok(self
            .indexes
            .get(index)
            .map(|data| data.fields.contains_key(field))
            .unwrap_or(false))
    }

    async fn add_field(&self, index: &str, field: &str, field_type: &str) -> Result<(), ProviderError> {
        self.indexes
            .entry(index.to_string())
            .or_default()
            .fields
            .insert(field.to_string(), field_type.to_string());
        Ok(())
    }

    async fn insert(&self, index: &str, field: &str, items: &[String]) -> Result<usize, ProviderError> {
        let mut data = self
            .indexes
            .get_mut(index)
            .ok_or_else(|| ProviderError::UnknownIndex(index.to_string()))?;
        for item in items {
            let mut doc = BTreeMap::new();
            doc.insert(field.to_string(), item.clone());
            data.documents.push(doc);
        }
        Ok(items.len())
    }

    async fn delete(&self, index: &str, field: &str, items: &[String]) -> Result<usize, ProviderError> {
        let mut data = self
            .indexes
            .get_mut(index)
            .ok_or_else(|| ProviderError::UnknownIndex(index.to_string()))?;
        let before = data.documents.len();
        data.documents
            .retain(|d| !d.get(field).map(|v| items.contains(v)).unwrap_or(false));
        Ok(before - data.documents.len())
    }
}
