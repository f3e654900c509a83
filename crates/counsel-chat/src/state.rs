use std::sync::Arc;

use counsel_config::ChatConfig;
use counsel_core::RequestContext;

use crate::emitter::ChunkStream;
use crate::error::ChatError;
use crate::metrics::{ChatMetrics, ROUTE_RELAY, ROUTE_SIMULATED};
use crate::pacing::Pacing;
use crate::relay::{EventRelay, RelayStream};
use crate::simulator::Simulator;
use crate::source::{AnswerSource, HttpAnswerSource};
use crate::types::AnswerRequest;

/// Shared state behind the chat routes
#[derive(Clone)]
pub struct ChatState {
    inner: Arc<ChatStateInner>,
}

struct ChatStateInner {
    simulator: Simulator,
    relay: EventRelay,
    require_identity: bool,
    metrics: ChatMetrics,
}

impl ChatState {
    /// Build the HTTP answer source, relay, and pacing from configuration
    pub fn from_config(config: &ChatConfig) -> Result<Self, ChatError> {
        let source = HttpAnswerSource::from_config(&config.upstream)?;
        let relay = EventRelay::from_config(&config.upstream)?;
        let pacing = Pacing::from_config(&config.pacing)?;

        tracing::debug!(
            answer_url = %source.answer_url(),
            stream_url = %relay.stream_url(),
            ?pacing,
            "chat routes configured"
        );

        Ok(Self::new(Arc::new(source), relay, pacing, config.require_identity))
    }

    /// Assemble state from parts
    pub fn new(source: Arc<dyn AnswerSource>, relay: EventRelay, pacing: Pacing, require_identity: bool) -> Self {
        Self {
            inner: Arc::new(ChatStateInner {
                simulator: Simulator::new(source, pacing),
                relay,
                require_identity,
                metrics: ChatMetrics::default(),
            }),
        }
    }

    /// Start a simulated chat turn
    pub async fn simulate(&self, request: AnswerRequest, context: &RequestContext) -> Result<ChunkStream, ChatError> {
        let result = match self.authorize(context) {
            Ok(()) => self.inner.simulator.initiate(request, context).await,
            Err(e) => Err(e),
        };

        self.record(ROUTE_SIMULATED, result.as_ref().err());
        result
    }

    /// Open a relayed chat turn
    pub async fn relay(&self, request: AnswerRequest, context: &RequestContext) -> Result<RelayStream, ChatError> {
        let result = match self.authorize(context).and_then(|()| request.into_query()) {
            Ok(query) => self.inner.relay.open(&query, context).await,
            Err(e) => Err(e),
        };

        self.record(ROUTE_RELAY, result.as_ref().err());
        result
    }

    fn authorize(&self, context: &RequestContext) -> Result<(), ChatError> {
        if self.inner.require_identity && context.client_id().is_none() {
            tracing::debug!("rejecting chat request without client identity");
            return Err(ChatError::Unauthorized);
        }
        Ok(())
    }

    fn record(&self, route: &'static str, error: Option<&ChatError>) {
        let outcome = error.map_or("ok", ChatError::outcome);
        self.inner.metrics.record_request(route, outcome);
    }
}
