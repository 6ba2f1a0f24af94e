//! Service configuration
//!
//! Loaded from TOML at startup. A missing or unreadable file falls back to
//! defaults. Secrets never live here; they come from the environment.

use counsel_agent::DriverConfig;
use counsel_llm::{ModelSettings, DEFAULT_MODEL};
use serde::{Deserialize, Serialize};
use std::net::{AddrParseError, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CounselConfig {
    pub server: ServerConfig,
    pub model: ModelConfig,
    /// Hop cap, worker iteration limit, and invalid-route policy.
    pub graph: DriverConfig,
    pub memory: MemoryConfig,
    pub settings: SettingsConfig,
    pub prompts: PromptsConfig,
    pub search: SearchConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    /// Interface address, e.g. `127.0.0.1` or `0.0.0.0`.
    pub bind: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub name: String,
    pub max_tokens: u32,
    /// Messages endpoint override, e.g. for a local proxy.
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Session retention window, restarted on every append.
    pub ttl_secs: u64,
    /// How often expired sessions are swept. 0 disables the sweep.
    pub purge_interval_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsConfig {
    /// Holds `<app>/settings.json` per application.
    pub dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptsConfig {
    /// Holds `<prompt id>.toml` per prompt.
    pub dir: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub endpoint: Option<String>,
}

// ============================================================
// Defaults
// ============================================================

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 8080, bind: "127.0.0.1".to_string() }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self { name: DEFAULT_MODEL.to_string(), max_tokens: 4096, base_url: None }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self { ttl_secs: 600, purge_interval_secs: 60 }
    }
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self { dir: PathBuf::from("data/settings") }
    }
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self { dir: PathBuf::from("data/prompts") }
    }
}

impl CounselConfig {
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}, using defaults", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => {
                tracing::info!("No config at {}, using defaults", path.display());
                Self::default()
            }
        }
    }

    /// The current config as TOML, for writing a starter file.
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, AddrParseError> {
        format!("{}:{}", self.server.bind, self.server.port).parse()
    }

    pub fn model_settings(&self) -> ModelSettings {
        ModelSettings {
            model: self.model.name.clone(),
            max_tokens: self.model.max_tokens,
            temperature: None,
        }
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.memory.ttl_secs)
    }
}
