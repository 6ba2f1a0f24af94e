//! Counsel Gateway - HTTP boundary, TOML configuration, and service wiring

pub mod config;
pub mod server;

pub use config::CounselConfig;
pub use server::{router, start_server, AppState};
