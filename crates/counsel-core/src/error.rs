//! Error types for Counsel

use thiserror::Error;

/// Malformed or unresolvable tool, agent, or supervisor settings.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("could not resolve module '{module}'")]
    UnknownModule { module: String },

    #[error("class '{class}' not found in module '{module}'")]
    UnknownClass { module: String, class: String },

    #[error("function '{function}' not found in class '{class}'")]
    MissingMethod { class: String, function: String },

    #[error("function '{function}' not found in module '{module}'")]
    UnknownFunction { module: String, function: String },

    #[error("duplicate tool name '{0}'")]
    DuplicateTool(String),

    #[error("malformed tool entry '{key}': {reason}")]
    MalformedTool { key: String, reason: String },

    #[error("no agent settings for member '{0}'")]
    MissingAgentSettings(String),

    #[error("invalid settings for agent '{agent}': {reason}")]
    InvalidAgentSettings { agent: String, reason: String },

    #[error("supervisor option '{0}' is neither a member nor FINISH")]
    InvalidOption(String),

    #[error("supervisor settings missing")]
    MissingSupervisor,

    #[error("prompt '{id}' could not be resolved: {reason}")]
    Prompt { id: String, reason: String },

    #[error("invalid setting '{key}': {reason}")]
    InvalidSetting { key: String, reason: String },
}

impl ConfigurationError {
    pub fn invalid_setting(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSetting {
            key: key.into(),
            reason: reason.into(),
        }
    }

    pub fn prompt(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Prompt {
            id: id.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("store error: {0}")]
    Store(String),

    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("json error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store(message.into())
    }
}
