//! Programmatic configuration builder for integration tests

use std::net::SocketAddr;

use counsel_config::{
    ChatConfig, ClientIdentificationConfig, Config, CorsConfig, HealthConfig, PacingConfig, ServerConfig,
    UpstreamConfig,
};

/// Builder for constructing test configurations
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder with minimal defaults
    ///
    /// The answer source points at a closed port and pacing is shortened
    /// to a millisecond per chunk.
    pub fn new() -> Self {
        Self {
            config: Config {
                server: ServerConfig {
                    listen_address: Some(SocketAddr::from(([127, 0, 0, 1], 0))),
                    health: HealthConfig {
                        enabled: true,
                        ..HealthConfig::default()
                    },
                    ..ServerConfig::default()
                },
                chat: ChatConfig {
                    upstream: UpstreamConfig {
                        host: "http://127.0.0.1".to_owned(),
                        port: "9".to_owned(),
                        ..UpstreamConfig::default()
                    },
                    pacing: PacingConfig {
                        short_delay: "1ms".to_owned(),
                        long_delay: "1ms".to_owned(),
                        close_delay: "1ms".to_owned(),
                        ..PacingConfig::default()
                    },
                    ..ChatConfig::default()
                },
                telemetry: None,
            },
        }
    }

    /// Point the answer source at a mock listening on `addr`
    pub fn with_answer_source(mut self, addr: SocketAddr) -> Self {
        self.config.chat.upstream.host = format!("http://{}", addr.ip());
        self.config.chat.upstream.port = addr.port().to_string();
        self
    }

    /// Use the production pacing defaults
    pub fn with_default_pacing(mut self) -> Self {
        self.config.chat.pacing = PacingConfig::default();
        self
    }

    /// Set the answer source timeout
    pub fn with_upstream_timeout(mut self, timeout: &str) -> Self {
        self.config.chat.upstream.timeout = timeout.to_owned();
        self
    }

    /// Identify clients by `header`, forward the ID upstream, and require it
    pub fn with_required_identity(mut self, header: &str, forward_as: &str) -> Self {
        self.config.server.client_identification = Some(ClientIdentificationConfig::by_header(header));
        self.config.chat.upstream.identity_header = Some(forward_as.to_owned());
        self.config.chat.require_identity = true;
        self
    }

    /// Set CORS configuration
    pub fn with_cors(mut self, config: CorsConfig) -> Self {
        self.config.server.cors = Some(config);
        self
    }

    /// Disable health endpoint
    pub fn without_health(mut self) -> Self {
        self.config.server.health.enabled = false;
        self
    }

    /// Build the final config
    pub fn build(self) -> Config {
        self.config
    }
}
