//! Settings store and change detection
//!
//! The store holds the authoritative document per application. The manager
//! keeps a snapshot of the last document it handed out so a caller only sees
//! settings when they actually changed.

use counsel_core::{ConfigDocument, Result};
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info};

#[async_trait::async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get(&self, app_id: &str) -> Result<Option<ConfigDocument>>;
    async fn set(&self, app_id: &str, settings: &ConfigDocument) -> Result<()>;
}

#[derive(Default)]
pub struct InMemorySettingsStore {
    documents: DashMap<String, ConfigDocument>,
}

impl InMemorySettingsStore {
    pub fn new() -> Self { Self::default() }
}

#[async_trait::async_trait]
impl SettingsStore for InMemorySettingsStore {
    async fn get(&self, app_id: &str) -> Result<Option<ConfigDocument>> {
        Ok(self.documents.get(app_id).map(|d| d.clone()))
    }

    async fn set(&self, app_id: &str, settings: &ConfigDocument) -> Result<()> {
        self.documents.insert(app_id.to_string(), settings.clone());
        Ok(())
    }
}

/// Documents stored as `<dir>/<app_id>/settings.json`.
pub struct FileSettingsStore {
    dir: PathBuf,
}

impl FileSettingsStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self { dir: dir.as_ref().to_path_buf() }
    }

    pub fn path_for(&self, app_id: &str) -> PathBuf {
        self.dir.join(app_id).join("settings.json")
    }
}

#[async_trait::async_trait]
impl SettingsStore for FileSettingsStore {
    async fn get(&self, app_id: &str) -> Result<Option<ConfigDocument>> {
        let path = self.path_for(app_id);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&content)?))
    }

    async fn set(&self, app_id: &str, settings: &ConfigDocument) -> Result<()> {
        let path = self.path_for(app_id);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, serde_json::to_vec_pretty(settings)?).await?;
        debug!("Settings written to {}", path.display());
        Ok(())
    }
}

pub struct SettingsManager {
    store: Arc<dyn SettingsStore>,
    last_seen: DashMap<String, ConfigDocument>,
}

impl SettingsManager {
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        Self { store, last_seen: DashMap::new() }
    }

    /// The stored document, if any.
    pub async fn fetch(&self, app_id: &str) -> Result<Option<ConfigDocument>> {
        let settings = self.store.get(app_id).await?;
        match &settings {
            Some(_) => debug!(app = app_id, "Settings retrieved"),
            None => info!(app = app_id, "No settings found"),
        }
        Ok(settings)
    }

    /// The stored document if it differs structurally from the one last
    /// returned here, otherwise `None`. Store failures are logged and read as
    /// "no change".
    pub async fn fetch_and_compare(&self, app_id: &str) -> Option<ConfigDocument> {
        let current = match self.store.get(app_id).await {
            Ok(Some(current)) => current,
            Ok(None) => {
                info!(app = app_id, "No settings found");
                return None;
            }
            Err(e) => {
                error!(app = app_id, "Failed to fetch and compare settings: {}", e);
                return None;
            }
        };

        if self.last_seen.get(app_id).map(|last| *last == current).unwrap_or(false) {
            debug!(app = app_id, "No changes detected for settings");
            return None;
        }
        self.last_seen.insert(app_id.to_string(), current.clone());
        debug!(app = app_id, "Settings changed or first-time fetch");
        Some(current)
    }

    /// Store a new document. The next `fetch_and_compare` reports it as changed.
    pub async fn upsert(&self, app_id: &str, settings: &ConfigDocument) -> Result<()> {
        self.store.set(app_id, settings).await?;
        info!(app = app_id, "Settings updated successfully");
        Ok(())
    }

    /// Forget the snapshot so the stored document is reported again, e.g.
    /// after it failed to build.
    pub fn forget(&self, app_id: &str) {
        self.last_seen.remove(app_id);
    }
}
