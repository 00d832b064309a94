//! Shared vocabulary used across all tgsync crates.

pub mod types;

pub use types::{BotIdentity, ConnectionStatus, PluginStatus, SessionFilter, SessionKind};
