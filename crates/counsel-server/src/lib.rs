//! HTTP server for Counsel
//!
//! Mounts the chat routes and the health probe behind request tracing,
//! optional CORS, and optional client identification.

mod client_id;
mod cors;
mod health;
mod request_context;

use std::net::SocketAddr;

use axum::Router;
use counsel_chat::ChatState;
use counsel_config::{Config, ServerConfig};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

const DEFAULT_LISTEN_ADDRESS: SocketAddr = SocketAddr::new(std::net::IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED), 3000);

/// Assembled server with all routes and middleware
pub struct Server {
    router: Router,
    listen_address: SocketAddr,
}

impl Server {
    /// Build the server from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the answer source client or relay cannot be
    /// built from the chat configuration
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let chat_state = ChatState::from_config(&config.chat)?;
        let router = with_middleware(routes(&config.server, chat_state), &config.server);

        Ok(Self {
            router,
            listen_address: config.server.listen_address.unwrap_or(DEFAULT_LISTEN_ADDRESS),
        })
    }

    /// Override the configured listen address
    #[must_use]
    pub const fn with_listen_address(mut self, listen_address: SocketAddr) -> Self {
        self.listen_address = listen_address;
        self
    }

    #[must_use]
    pub const fn listen_address(&self) -> SocketAddr {
        self.listen_address
    }

    /// Consume the server and return the inner router
    ///
    /// Useful for testing when the caller manages the listener
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Serve until `shutdown` is cancelled
    ///
    /// Open chat streams are dropped on shutdown, which stops their
    /// emission tasks.
    ///
    /// # Errors
    ///
    /// Returns an error if binding the TCP listener or serving fails
    pub async fn serve(self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.listen_address).await?;
        tracing::info!(local_addr = %listener.local_addr()?, "server listening");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                shutdown.cancelled().await;
                tracing::info!("graceful shutdown initiated");
            })
            .await?;

        Ok(())
    }
}

fn routes(config: &ServerConfig, chat_state: ChatState) -> Router {
    let app = counsel_chat::chat_router(chat_state);

    if config.health.enabled {
        app.route(&config.health.path, axum::routing::get(health::health_handler))
    } else {
        app
    }
}

/// Wrap `app` in middleware; layers added later run first
fn with_middleware(app: Router, config: &ServerConfig) -> Router {
    let mut app = app
        .layer(axum::middleware::from_fn(request_context::request_context_middleware))
        .layer(TraceLayer::new_for_http());

    if let Some(cors) = &config.cors {
        app = app.layer(cors::cors_layer(cors));
    }

    if let Some(identification) = &config.client_identification {
        let identification = identification.clone();
        app = app.layer(axum::middleware::from_fn(move |req, next| {
            client_id::client_id_middleware(identification.clone(), req, next)
        }));
    }

    app
}
