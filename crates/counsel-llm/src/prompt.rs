//! Prompt store: resolve a prompt identifier to a structured template

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum PromptError {
    #[error("prompt not found: {0}")]
    NotFound(String),

    #[error("invalid prompt {id}: {reason}")]
    Invalid { id: String, reason: String },
}

/// A prompt with a system part and an optional human part.
///
/// Placeholders are written `{name}` and filled by [`PromptTemplate::render_system`]
/// and [`PromptTemplate::render_human`]. Unknown placeholders are left as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptTemplate {
    #[serde(default)]
    pub id: String,
    pub system: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub human: Option<String>,
}

pub type PromptVars = BTreeMap<String, String>;

impl PromptTemplate {
    pub fn new(id: impl Into<String>, system: impl Into<String>) -> Self {
        Self { id: id.into(), system: system.into(), human: None }
    }

    pub fn with_human(mut self, human: impl Into<String>) -> Self {
        self.human = Some(human.into());
        self
    }

    pub fn render_system(&self, vars: &PromptVars) -> String {
        render(&self.system, vars)
    }

    pub fn render_human(&self, vars: &PromptVars) -> Option<String> {
        self.human.as_deref().map(|h| render(h, vars))
    }
}

fn render(template: &str, vars: &PromptVars) -> String {
    vars.iter().fold(template.to_string(), |acc, (key, value)| {
        acc.replace(&format!("{{{}}}", key), value)
    })
}

#[async_trait::async_trait]
pub trait PromptStore: Send + Sync {
    async fn get_prompt(&self, id: &str) -> Result<PromptTemplate, PromptError>;
}

#[derive(Default)]
pub struct InMemoryPromptStore {
    prompts: DashMap<String, PromptTemplate>,
}

impl InMemoryPromptStore {
    pub fn new() -> Self { Self::default() }

    pub fn insert(&self, prompt: PromptTemplate) {
        self.prompts.insert(prompt.id.clone(), prompt);
    }

    pub fn with(self, prompt: PromptTemplate) -> Self {
        self.insert(prompt);
        self
    }
}

#[async_trait::async_trait]
impl PromptStore for InMemoryPromptStore {
    async fn get_prompt(&self, id: &str) -> Result<PromptTemplate, PromptError> {
        self.prompts
            .get(id)
            .map(|p| p.clone())
            .ok_or_else(|| PromptError::NotFound(id.to_string()))
    }
}

/// Prompts stored as `<dir>/<id>.toml`. A `/` in the id maps to `__`
/// (hub-style ids such as `owner/research-agent`).
pub struct FilePromptStore {
    dir: PathBuf,
}

impl FilePromptStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self { dir: dir.as_ref().to_path_buf() }
    }

    pub fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.toml", id.replace('/', "__")))
    }
}

#[async_trait::async_trait]
impl PromptStore for FilePromptStore {
    async fn get_prompt(&self, id: &str) -> Result<PromptTemplate, PromptError> {
        let path = self.path_for(id);
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|_| PromptError::NotFound(id.to_string()))?;
        let mut prompt: PromptTemplate = toml::from_str(&content).map_err(|e| PromptError::Invalid {
            id: id.to_string(),
            reason: e.to_string(),
        })?;
        if prompt.id.is_empty() {
            prompt.id = id.to_string();
        }
        debug!("Loaded prompt {} from {}", id, path.display());
        info!("Prompt fetched with ID: {}", id);
        Ok(prompt)
    }
}
