#![allow(clippy::must_use_candidate)]

pub mod chat;
pub mod client_identification;
pub mod cors;
mod env;
pub mod health;
mod loader;
pub mod server;
pub mod telemetry;

use serde::Deserialize;

pub use chat::*;
pub use client_identification::*;
pub use cors::*;
pub use health::*;
pub use server::*;
pub use telemetry::{OtlpConfig, OtlpProtocol, TelemetryConfig};

/// Top-level Counsel configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Chat streaming and answer source configuration
    #[serde(default)]
    pub chat: ChatConfig,
    /// Telemetry configuration
    #[serde(default)]
    pub telemetry: Option<TelemetryConfig>,
}
