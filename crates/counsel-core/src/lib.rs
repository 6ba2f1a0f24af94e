//! Counsel Core - Types, configuration documents, and error handling

pub mod config;
pub mod error;
pub mod types;

pub use config::*;
pub use error::{ConfigurationError, Error, Result};
pub use types::*;
