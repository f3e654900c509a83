use std::net::SocketAddr;

use serde::Deserialize;

use crate::{client_identification::ClientIdentificationConfig, cors::CorsConfig, health::HealthConfig};

/// HTTP listener and middleware
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Defaults to `0.0.0.0:3000`
    pub listen_address: Option<SocketAddr>,
    #[serde(default)]
    pub health: HealthConfig,
    /// CORS layer; none is installed when absent
    #[serde(default)]
    pub cors: Option<CorsConfig>,
    /// Identity extraction; every caller is anonymous when absent
    #[serde(default)]
    pub client_identification: Option<ClientIdentificationConfig>,
}
